//! Domain error types
//!
//! Errors raised by validation and state-transition logic inside the domain
//! module. Port-level and adapter errors (upstream failures, I/O) live in
//! their own crates (`gateway-drive115::UpstreamError`, `gateway-cred`,
//! `gateway-store`).

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid path format or content
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Invalid state transition attempt
    #[error("invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Generic validation failure
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// A task's output directory is not an absolute path
    #[error("output directory must be absolute: {0}")]
    OutputDirNotAbsolute(String),

    /// ID parsing error
    #[error("invalid ID format: {0}")]
    InvalidId(String),
}
