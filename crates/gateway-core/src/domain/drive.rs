//! Drive domain entity
//!
//! A `Drive` is one authenticated account against the upstream. At most one
//! drive in a store is marked `is_current`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::DriveId;

/// Tag selecting which `UpstreamClient` implementation serves a drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveKind {
    /// 115 network disk
    Drive115,
}

impl std::fmt::Display for DriveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriveKind::Drive115 => write!(f, "drive115"),
        }
    }
}

/// A configured upstream account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drive {
    pub id: DriveId,
    pub name: String,
    pub kind: DriveKind,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_current: bool,
}

impl Drive {
    /// Creates a new drive, not yet marked current.
    #[must_use]
    pub fn new(id: DriveId, name: impl Into<String>, kind: DriveKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            created_at: Utc::now(),
            last_used_at: None,
            is_current: false,
        }
    }

    /// Records that the drive was just used to serve a request.
    pub fn touch(&mut self) {
        self.last_used_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn new_drive_is_not_current_by_default() {
        let drive = Drive::new(
            DriveId::from_str("drive115_1").unwrap(),
            "my 115",
            DriveKind::Drive115,
        );
        assert!(!drive.is_current);
        assert!(drive.last_used_at.is_none());
    }

    #[test]
    fn touch_sets_last_used_at() {
        let mut drive = Drive::new(
            DriveId::from_str("drive115_1").unwrap(),
            "my 115",
            DriveKind::Drive115,
        );
        drive.touch();
        assert!(drive.last_used_at.is_some());
    }
}
