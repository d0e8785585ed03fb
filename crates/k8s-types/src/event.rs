//! Watch events
//!
//! A watch stream is a sequence of `{"type": ..., "object": ...}` values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of change reported by a watch event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    /// Object was created (or already existed when the watch started)
    Added,
    /// Object was updated
    Modified,
    /// Object was removed
    Deleted,
    /// Server reported an error; the object carries the server's status payload
    Error,
}

impl EventType {
    /// Wire representation of the event type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Added => "ADDED",
            Self::Modified => "MODIFIED",
            Self::Deleted => "DELETED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a watch event carries a type outside the four known values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("got invalid watch event type: {0:?}")]
pub struct InvalidEventType(pub String);

impl FromStr for EventType {
    type Err = InvalidEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADDED" => Ok(Self::Added),
            "MODIFIED" => Ok(Self::Modified),
            "DELETED" => Ok(Self::Deleted),
            "ERROR" => Ok(Self::Error),
            other => Err(InvalidEventType(other.to_string())),
        }
    }
}

/// A single change to a watched resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event<T> {
    /// What happened to the object
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Full representation of the object after the change
    pub object: T,
}

impl<T> Event<T> {
    /// Create an event.
    pub fn new(event_type: EventType, object: T) -> Self {
        Self { event_type, object }
    }
}
