//! Library surface for the gateway server binary, split out so the router
//! and `AppState` wiring can be exercised directly in integration tests.

pub mod http;
pub mod state;
