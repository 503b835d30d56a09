//! Device-grant QR login flow for the 115 open-platform API (C3)
//!
//! Split into a non-blocking begin/poll/exchange trio — a better fit for
//! an HTTP-driven state machine than a single blocking poll loop. PKCE
//! verifier/challenge generation uses
//! `oauth2::PkceCodeChallenge::new_random_sha256`; there is no
//! browser-redirect/local-callback-server machinery here since device-grant
//! never redirects a browser.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use oauth2::{PkceCodeChallenge, PkceCodeVerifier};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use gateway_core::domain::{AuthSession, AuthStatus, Credential, SessionId};

const AUTH_DEVICE_CODE_URL: &str = "https://passportapi.115.com/open/authDeviceCode";
const QRCODE_STATUS_URL: &str = "https://qrcodeapi.115.com/get/status/";
const DEVICE_CODE_TO_TOKEN_URL: &str = "https://passportapi.115.com/open/deviceCodeToToken";

/// Registered client id for this gateway's 115 open-platform app.
const CLIENT_ID: &str = "100196251";

/// A QR login session lives this long if never scanned.
const SESSION_TTL_SECONDS: i64 = 300;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no such auth session")]
    SessionNotFound,
    #[error("auth session expired; begin a new one")]
    SessionExpired,
    #[error("qr code has not been confirmed yet")]
    NotConfirmed,
    #[error("115 auth transport error: {0}")]
    Transport(String),
    #[error("115 auth API error {code}: {message}")]
    Upstream { code: i64, message: String },
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    code: i64,
    message: Option<String>,
    data: Option<DeviceCodeData>,
}

#[derive(Debug, Deserialize)]
struct DeviceCodeData {
    uid: String,
    qrcode: String,
    time: String,
    sign: String,
}

#[derive(Debug, Deserialize)]
struct QrStatusResponse {
    data: Option<QrStatusData>,
}

#[derive(Debug, Deserialize)]
struct QrStatusData {
    status: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    code: i64,
    message: Option<String>,
    data: Option<TokenData>,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    access_token: String,
    refresh_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    7200
}

struct PendingSession {
    auth: AuthSession,
    verifier: PkceCodeVerifier,
}

/// Drives the begin/poll/exchange device-grant state machine, holding
/// in-flight sessions (and their process-memory-only PKCE verifiers) in a
/// `DashMap` keyed by [`SessionId`].
pub struct DeviceGrantFlow {
    http: reqwest::Client,
    sessions: DashMap<SessionId, PendingSession>,
}

impl Default for DeviceGrantFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceGrantFlow {
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            sessions: DashMap::new(),
        }
    }

    /// Starts a new QR login session: fetches a device code and QR payload
    /// from 115, stores the PKCE verifier in memory, and returns the
    /// caller-facing [`AuthSession`].
    pub async fn begin(self: &Arc<Self>) -> Result<AuthSession, AuthError> {
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();

        let response = self
            .http
            .post(AUTH_DEVICE_CODE_URL)
            .form(&[
                ("client_id", CLIENT_ID),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "sha256"),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?
            .json::<DeviceCodeResponse>()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if response.code != 0 {
            return Err(AuthError::Upstream {
                code: response.code,
                message: response.message.unwrap_or_else(|| "failed to obtain device code".into()),
            });
        }
        let data = response.data.ok_or_else(|| AuthError::Transport("device code response missing data".into()))?;

        let session_id = SessionId::new(data.uid.clone());
        let auth = AuthSession {
            session_id: session_id.clone(),
            uid: data.uid,
            time_val: data.time,
            sign: data.sign,
            qr_payload: data.qrcode,
            expires_at: Utc::now() + ChronoDuration::seconds(SESSION_TTL_SECONDS),
            status: AuthStatus::NotScanned,
        };

        self.sessions.insert(session_id, PendingSession { auth: auth.clone(), verifier });
        info!("started device-grant session");
        Ok(auth)
    }

    /// Polls 115 for the current scan status of a session, updating and
    /// returning the session's stored status.
    pub async fn poll(&self, session_id: &SessionId) -> Result<AuthSession, AuthError> {
        let mut entry = self.sessions.get_mut(session_id).ok_or(AuthError::SessionNotFound)?;

        if entry.auth.is_expired() {
            entry.auth.status = AuthStatus::Expired;
            return Err(AuthError::SessionExpired);
        }

        let response = self
            .http
            .get(QRCODE_STATUS_URL)
            .query(&[("uid", &entry.auth.uid), ("time", &entry.auth.time_val), ("sign", &entry.auth.sign)])
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?
            .json::<QrStatusResponse>()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status_code = response.data.map(|d| d.status).unwrap_or(0);
        entry.auth.status = match status_code {
            1 => AuthStatus::Scanned,
            2 => AuthStatus::Confirmed,
            _ => AuthStatus::NotScanned,
        };
        debug!(session = %session_id, status = ?entry.auth.status, "polled qr status");
        Ok(entry.auth.clone())
    }

    /// Exchanges a confirmed session for a [`Credential`], consuming the
    /// session (and its PKCE verifier) from the in-memory map.
    pub async fn exchange(&self, session_id: &SessionId) -> Result<Credential, AuthError> {
        let (_, pending) = self.sessions.remove(session_id).ok_or(AuthError::SessionNotFound)?;

        if pending.auth.is_expired() {
            return Err(AuthError::SessionExpired);
        }
        if pending.auth.status != AuthStatus::Confirmed {
            return Err(AuthError::NotConfirmed);
        }

        let response = self
            .http
            .post(DEVICE_CODE_TO_TOKEN_URL)
            .form(&[("uid", pending.auth.uid.as_str()), ("code_verifier", pending.verifier.secret())])
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if response.code != 0 {
            return Err(AuthError::Upstream {
                code: response.code,
                message: response.message.unwrap_or_else(|| "failed to exchange device code".into()),
            });
        }
        let data = response.data.ok_or_else(|| AuthError::Transport("token response missing data".into()))?;

        info!(session = %session_id, "device-grant exchange succeeded");
        Ok(Credential::bearer(
            data.access_token,
            data.refresh_token,
            Utc::now() + ChronoDuration::seconds(data.expires_in),
        ))
    }

    /// Drops sessions past their deadline. Call periodically from a
    /// background sweep; never called from `begin`/`poll`/`exchange` so a
    /// caller racing a sweep always sees a consistent error instead of a
    /// session vanishing mid-call.
    pub fn gc_expired(&self) {
        self.sessions.retain(|_, pending| !pending.auth.is_expired());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gc_expired_removes_only_expired_sessions() {
        let flow = DeviceGrantFlow::new();
        let (_, verifier) = PkceCodeChallenge::new_random_sha256();
        let expired = AuthSession {
            session_id: SessionId::new("expired"),
            uid: "u1".into(),
            time_val: "t".into(),
            sign: "s".into(),
            qr_payload: "qr".into(),
            expires_at: Utc::now() - ChronoDuration::seconds(1),
            status: AuthStatus::NotScanned,
        };
        flow.sessions.insert(
            SessionId::new("expired"),
            PendingSession { auth: expired, verifier },
        );

        let (_, verifier2) = PkceCodeChallenge::new_random_sha256();
        let fresh = AuthSession {
            session_id: SessionId::new("fresh"),
            uid: "u2".into(),
            time_val: "t".into(),
            sign: "s".into(),
            qr_payload: "qr".into(),
            expires_at: Utc::now() + ChronoDuration::seconds(60),
            status: AuthStatus::NotScanned,
        };
        flow.sessions.insert(
            SessionId::new("fresh"),
            PendingSession { auth: fresh, verifier: verifier2 },
        );

        flow.gc_expired();
        assert!(flow.sessions.get(&SessionId::new("expired")).is_none());
        assert!(flow.sessions.get(&SessionId::new("fresh")).is_some());
    }

    #[tokio::test]
    async fn exchange_rejects_unconfirmed_session() {
        let flow = DeviceGrantFlow::new();
        let (_, verifier) = PkceCodeChallenge::new_random_sha256();
        let session = AuthSession {
            session_id: SessionId::new("pending"),
            uid: "u".into(),
            time_val: "t".into(),
            sign: "s".into(),
            qr_payload: "qr".into(),
            expires_at: Utc::now() + ChronoDuration::seconds(60),
            status: AuthStatus::Scanned,
        };
        flow.sessions.insert(SessionId::new("pending"), PendingSession { auth: session, verifier });

        let err = flow.exchange(&SessionId::new("pending")).await.unwrap_err();
        assert!(matches!(err, AuthError::NotConfirmed));
    }

    #[tokio::test]
    async fn poll_unknown_session_errors() {
        let flow = DeviceGrantFlow::new();
        let err = flow.poll(&SessionId::new("ghost")).await.unwrap_err();
        assert!(matches!(err, AuthError::SessionNotFound));
    }
}
