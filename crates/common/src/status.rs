//! Observation lifecycle status.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The status of an observation in its lifecycle.
///
/// State transitions:
/// ```text
/// Draft ──► Formed ──┬──► Finished
///   │         │      └──► Rejected
///   │         │              │
///   └─────────┴──────────────┴──► Deleted   (Finished too)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ObservationStatus {
    /// Being assembled by its creator; items can be added.
    #[default]
    Draft,

    /// Submitted and awaiting moderation.
    Formed,

    /// Approved by a moderator; carries a distance estimate (terminal).
    Finished,

    /// Rejected by a moderator (terminal).
    Rejected,

    /// Soft-deleted by its creator (terminal overlay).
    Deleted,
}

impl ObservationStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [ObservationStatus; 5] = [
        ObservationStatus::Draft,
        ObservationStatus::Formed,
        ObservationStatus::Finished,
        ObservationStatus::Rejected,
        ObservationStatus::Deleted,
    ];

    /// Returns true if the item collection can be edited in this status.
    pub fn can_edit_items(&self) -> bool {
        matches!(self, ObservationStatus::Draft | ObservationStatus::Formed)
    }

    /// Returns true if the observation can be submitted in this status.
    pub fn can_submit(&self) -> bool {
        matches!(self, ObservationStatus::Draft)
    }

    /// Returns true if a moderator can approve or reject in this status.
    pub fn can_moderate(&self) -> bool {
        matches!(self, ObservationStatus::Formed)
    }

    /// Returns true if the observation can be soft-deleted in this status.
    pub fn can_delete(&self) -> bool {
        !matches!(self, ObservationStatus::Deleted)
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationStatus::Draft => "draft",
            ObservationStatus::Formed => "formed",
            ObservationStatus::Finished => "finished",
            ObservationStatus::Rejected => "rejected",
            ObservationStatus::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for ObservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError(pub String);

impl std::fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown observation status: {}", self.0)
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for ObservationStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(ObservationStatus::Draft),
            "formed" => Ok(ObservationStatus::Formed),
            // "completed" is the legacy name for an approved observation.
            "finished" | "completed" => Ok(ObservationStatus::Finished),
            "rejected" => Ok(ObservationStatus::Rejected),
            "deleted" => Ok(ObservationStatus::Deleted),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}
