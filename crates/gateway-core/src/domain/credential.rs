//! Credential domain entity
//!
//! A `Credential` is the opaque byte payload a drive authenticates with,
//! plus its expiry and (for the bearer shape) a refresh handle.
//!
//! Two shapes exist upstream-side (design note §3): a long-lived cookie-like token
//! implicitly refreshed by the upstream on use, and a short-lived bearer
//! token with an explicit refresh handle. 115's device-grant flow always
//! yields the latter and always persists a refresh token, so `Cookie` has
//! no constructor here; it is kept as a documented variant for a future
//! drive kind that needs it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A credential handed to an `UpstreamClient` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Credential {
    /// Short-lived bearer token with an explicit refresh handle.
    Bearer {
        access_token: String,
        refresh_token: String,
        expires_at: DateTime<Utc>,
    },
    /// Long-lived cookie-like token, implicitly refreshed by the upstream
    /// on use. No drive kind in this gateway currently produces one.
    Cookie {
        value: String,
        expires_at: DateTime<Utc>,
    },
}

impl Credential {
    /// Builds a bearer credential.
    #[must_use]
    pub fn bearer(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self::Bearer {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
        }
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        match self {
            Credential::Bearer { expires_at, .. } => *expires_at,
            Credential::Cookie { expires_at, .. } => *expires_at,
        }
    }

    /// A credential handed out by the store is either currently valid or
    /// its expiry is in the past; callers must treat "upstream says
    /// unauthenticated" as an invalidation signal regardless of this check.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at()
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        match self {
            Credential::Bearer { access_token, .. } => access_token,
            Credential::Cookie { value, .. } => value,
        }
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        match self {
            Credential::Bearer { refresh_token, .. } => Some(refresh_token),
            Credential::Cookie { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn bearer_is_expired_past_its_deadline() {
        let cred = Credential::bearer("tok", "refresh", Utc::now() - Duration::seconds(1));
        assert!(cred.is_expired());
    }

    #[test]
    fn bearer_is_not_expired_before_its_deadline() {
        let cred = Credential::bearer("tok", "refresh", Utc::now() + Duration::hours(1));
        assert!(!cred.is_expired());
    }
}
