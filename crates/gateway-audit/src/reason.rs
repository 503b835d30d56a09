//! Reason codes for audit log entries
//!
//! Structured codes for categorizing why a sync run, scheduler tick, or
//! watcher poll failed. Used by `AuditLogger` to make failures queryable
//! and countable instead of free-text only.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Structured reason codes for gateway failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// Upstream reported the stored credential as invalid or expired.
    UpstreamUnauth,
    /// Upstream rejected a request due to rate limiting.
    UpstreamRateLimited,
    /// Transport-level failure talking to the upstream (timeout, DNS, TLS).
    UpstreamTransport,
    /// Upstream returned an opaque API error not covered by a known code.
    UpstreamApiError,
    /// Two remote items resolved to the same local stub path under a flat
    /// (non-preserving) layout.
    StubPathCollision,
    /// A task referenced a drive that no longer exists.
    MissingDrive,
    /// A scheduled or manual run was skipped because the task was already
    /// running.
    TaskConflict,
    /// A sidecar file failed to download or write.
    SidecarTransferFailed,
    /// The watcher's event cursor failed to persist back to the task.
    CursorPersistFailed,
    /// The stub record store rejected a read or write.
    StubStoreFailed,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReasonCode::UpstreamUnauth => "upstream_unauth",
            ReasonCode::UpstreamRateLimited => "upstream_rate_limited",
            ReasonCode::UpstreamTransport => "upstream_transport",
            ReasonCode::UpstreamApiError => "upstream_api_error",
            ReasonCode::StubPathCollision => "stub_path_collision",
            ReasonCode::MissingDrive => "missing_drive",
            ReasonCode::TaskConflict => "task_conflict",
            ReasonCode::SidecarTransferFailed => "sidecar_transfer_failed",
            ReasonCode::CursorPersistFailed => "cursor_persist_failed",
            ReasonCode::StubStoreFailed => "stub_store_failed",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_code_display() {
        assert_eq!(ReasonCode::UpstreamUnauth.to_string(), "upstream_unauth");
        assert_eq!(ReasonCode::TaskConflict.to_string(), "task_conflict");
        assert_eq!(ReasonCode::StubPathCollision.to_string(), "stub_path_collision");
    }

    #[test]
    fn reason_code_round_trips_through_json() {
        let code = ReasonCode::UpstreamRateLimited;
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"upstream_rate_limited\"");
        let back: ReasonCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, code);
    }
}
