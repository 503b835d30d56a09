//! Gateway Core - domain model, ports, and provider pool
//!
//! This crate contains the hexagonal architecture core of the streaming-URL
//! gateway:
//! - **Domain entities** - `Drive`, `Credential`, `RemoteItem`, `Task`,
//!   `StubRecord`, `RunLog`, `AuthSession`, `WatcherState`
//! - **Port definitions** - Traits for adapters: `UpstreamClient`,
//!   `CredentialStore`, `StubRecordStore`, `TaskRegistry`
//! - **Provider pool** - per-drive cache of authenticated upstream clients
//!
//! The domain module contains pure business logic with no I/O. Ports define
//! trait interfaces that adapter crates (`gateway-drive115`, `gateway-cred`,
//! `gateway-store`) implement. Nothing in this crate talks to the network or
//! a database directly.

pub mod config;
pub mod domain;
pub mod pool;
pub mod ports;
