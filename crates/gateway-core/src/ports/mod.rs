//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the domain core depends on; implementations
//! live in adapter crates (`gateway-cred`, `gateway-drive115`,
//! `gateway-redirect`, `gateway-store`).
//!
//! ## Ports Overview
//!
//! - [`CredentialStore`] (C1) - per-drive credential persistence
//! - [`UpstreamClient`] (C2) - read-only upstream cloud backend access
//! - [`StubStore`] (C6) - persisted stub-record bookkeeping
//! - [`TaskRegistry`] (C8) - task definition CRUD and run-log history
//! - [`MediaSurface`] - placeholder seam for the out-of-scope FUSE/WebDAV projection

pub mod credential_store;
pub mod media_surface;
pub mod stub_store;
pub mod task_registry;
pub mod upstream_client;

pub use credential_store::{CredentialError, CredentialStore};
pub use media_surface::MediaSurface;
pub use stub_store::{StubStore, StubStoreError};
pub use task_registry::{TaskRegistry, TaskRegistryError};
pub use upstream_client::{ChildPage, EventPage, UpstreamClient, UpstreamError};
