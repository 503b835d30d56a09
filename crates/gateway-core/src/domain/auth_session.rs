//! AuthSession domain entity
//!
//! Tracks one in-flight device-grant QR login attempt. The PKCE verifier is
//! process-memory only and is never persisted or serialized (design note §4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::SessionId;

/// Upstream-reported status of a device-grant session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    NotScanned,
    Scanned,
    Confirmed,
    Expired,
}

/// An in-progress QR login session.
///
/// `verifier` is deliberately excluded from `Serialize`/`Deserialize` by
/// living only in the in-process session map (`gateway-drive115::auth`);
/// this struct only carries what is safe to hand back to a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub session_id: SessionId,
    /// Upstream device-code correlation fields (115's `uid`/`time`/`sign`).
    pub uid: String,
    pub time_val: String,
    pub sign: String,
    pub qr_payload: String,
    pub expires_at: DateTime<Utc>,
    pub status: AuthStatus,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at || matches!(self.status, AuthStatus::Expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn session_past_its_deadline_is_expired() {
        let session = AuthSession {
            session_id: SessionId::new("s1"),
            uid: "u".into(),
            time_val: "t".into(),
            sign: "sig".into(),
            qr_payload: "qr".into(),
            expires_at: Utc::now() - Duration::seconds(1),
            status: AuthStatus::NotScanned,
        };
        assert!(session.is_expired());
    }
}
