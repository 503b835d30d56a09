//! Gateway Store - SQLite-backed persistence
//!
//! Provides the connection pool (`pool`), CRUD for drives (`drive_store`,
//! concrete — there is no port trait for it, only one implementation ever
//! makes sense), and implementations of the `StubStore` and `TaskRegistry`
//! ports defined in `gateway-core::ports`.

pub mod drive_store;
pub mod pool;
pub mod stub_store;
pub mod task_registry;

pub use drive_store::DriveStore;
pub use pool::{DatabasePool, StoreError};
pub use stub_store::SqliteStubStore;
pub use task_registry::SqliteTaskRegistry;
