//! Structured audit logging for the streaming-URL gateway
//!
//! Provides:
//! - `AuditLogger`, a non-fatal structured sink for sync-run, scheduler, and
//!   watcher lifecycle events, persisted to its own SQLite database.
//! - `ReasonCode`, a closed set of failure categories attached to failed
//!   events so `gateway logs` can filter and count by cause.

pub mod logger;
pub mod pool;
pub mod reason;

pub use logger::{AuditEvent, AuditEventKind, AuditLogger};
pub use pool::{AuditDb, AuditDbError};
pub use reason::ReasonCode;
