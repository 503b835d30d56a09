//! Domain newtypes with validation
//!
//! Strongly-typed wrappers around the opaque strings and integers the
//! upstream exchanges, so that a `PickHandle` can never be passed where a
//! `RemoteItemId` is expected even though both are plain strings on the
//! wire.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

/// Identifier for a configured drive, shape `{kind}_{monotonic-ms}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriveId(String);

impl DriveId {
    /// Builds a new drive id from a kind tag and a millisecond timestamp.
    #[must_use]
    pub fn new(kind: &str, now_ms: u128) -> Self {
        Self(format!("{kind}_{now_ms}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DriveId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DriveId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(DomainError::InvalidId("drive id is empty".into()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for DriveId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier for a task definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a new random task id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("invalid task id: {e}")))
    }
}

impl From<Uuid> for TaskId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Remote-upstream item identifier (stable across renames/moves).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteItemId(String);

impl RemoteItemId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemoteItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RemoteItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RemoteItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque upstream handle used to resolve a signed download URL. Distinct
/// from `RemoteItemId`: two handles can point at the same item over time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PickHandle(String);

impl PickHandle {
    #[must_use]
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PickHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PickHandle {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Natural key for a stub record: `task_id ⊕ item_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId {
    pub task_id: TaskId,
    pub item_id: RemoteItemId,
}

impl RecordId {
    #[must_use]
    pub fn new(task_id: TaskId, item_id: RemoteItemId) -> Self {
        Self { task_id, item_id }
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.task_id, self.item_id)
    }
}

/// Identifier for an in-progress device-grant login session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic upstream event cursor (the largest `event.id` observed so far).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventCursor(pub i64);

impl EventCursor {
    #[must_use]
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the larger of the two cursors, preserving monotonicity.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        if other.0 > self.0 {
            other
        } else {
            self
        }
    }
}

impl Display for EventCursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_id_formats_with_kind_prefix() {
        let id = DriveId::new("drive115", 1_700_000_000_000);
        assert_eq!(id.to_string(), "drive115_1700000000000");
    }

    #[test]
    fn drive_id_rejects_empty_string() {
        assert!(DriveId::from_str("").is_err());
    }

    #[test]
    fn event_cursor_max_is_non_decreasing() {
        let a = EventCursor(10);
        let b = EventCursor(3);
        assert_eq!(a.max(b), EventCursor(10));
        assert_eq!(b.max(a), EventCursor(10));
    }

    #[test]
    fn record_id_display_is_stable() {
        let id = RecordId::new(TaskId::new(), RemoteItemId::from("42"));
        assert!(id.to_string().ends_with(":42"));
    }

    #[test]
    fn task_id_round_trips_through_string() {
        let id = TaskId::new();
        let parsed: TaskId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
