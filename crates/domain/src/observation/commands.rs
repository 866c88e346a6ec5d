//! Observation commands.
//!
//! Every command validates its own input before the service touches the
//! store.

use std::str::FromStr;

use common::{Coordinates, DayId, ObservationId};
use store::ItemPatch;

use super::ObservationError;

fn check_observation_id(id: ObservationId) -> Result<(), ObservationError> {
    if id.is_valid() {
        Ok(())
    } else {
        Err(ObservationError::InvalidId {
            field: "observation id",
            value: id.as_i64(),
        })
    }
}

fn check_day_id(id: DayId) -> Result<(), ObservationError> {
    if id.is_valid() {
        Ok(())
    } else {
        Err(ObservationError::InvalidId {
            field: "day id",
            value: id.as_i64(),
        })
    }
}

fn check_not_blank(field: &'static str, value: Option<&str>) -> Result<(), ObservationError> {
    match value {
        Some(text) if text.trim().is_empty() => Err(ObservationError::EmptyField { field }),
        _ => Ok(()),
    }
}

fn check_coordinates(coordinates: Option<Coordinates>) -> Result<(), ObservationError> {
    match coordinates {
        Some(c) if !c.is_valid() => Err(ObservationError::InvalidCoordinates {
            ra: c.ra,
            dec: c.dec,
        }),
        _ => Ok(()),
    }
}

/// Command to add a day to the actor's draft, creating the draft if needed.
#[derive(Debug, Clone, Copy)]
pub struct AddItem {
    /// The referenced day to add (or whose quantity to increment).
    pub day_id: DayId,
}

impl AddItem {
    /// Creates a new AddItem command.
    pub fn new(day_id: DayId) -> Self {
        Self { day_id }
    }

    pub fn validate(&self) -> Result<(), ObservationError> {
        check_day_id(self.day_id)
    }
}

/// Command to remove an item from an observation.
#[derive(Debug, Clone, Copy)]
pub struct RemoveItem {
    pub observation_id: ObservationId,
    pub day_id: DayId,
}

impl RemoveItem {
    /// Creates a new RemoveItem command.
    pub fn new(observation_id: ObservationId, day_id: DayId) -> Self {
        Self {
            observation_id,
            day_id,
        }
    }

    pub fn validate(&self) -> Result<(), ObservationError> {
        check_observation_id(self.observation_id)?;
        check_day_id(self.day_id)
    }
}

/// Command to partially update an item.
#[derive(Debug, Clone)]
pub struct UpdateItem {
    pub observation_id: ObservationId,
    pub day_id: DayId,

    /// Only the fields set here are written.
    pub patch: ItemPatch,
}

impl UpdateItem {
    /// Creates a new UpdateItem command.
    pub fn new(observation_id: ObservationId, day_id: DayId, patch: ItemPatch) -> Self {
        Self {
            observation_id,
            day_id,
            patch,
        }
    }

    pub fn validate(&self) -> Result<(), ObservationError> {
        check_observation_id(self.observation_id)?;
        check_day_id(self.day_id)?;
        if let Some(quantity) = self.patch.quantity
            && quantity < 1
        {
            return Err(ObservationError::InvalidQuantity { quantity });
        }
        check_coordinates(self.patch.coordinates)?;
        check_not_blank("note", self.patch.note.as_deref())
    }
}

/// Command to submit a draft for moderation.
#[derive(Debug, Clone, Copy)]
pub struct SubmitObservation {
    pub observation_id: ObservationId,
}

impl SubmitObservation {
    /// Creates a new SubmitObservation command.
    pub fn new(observation_id: ObservationId) -> Self {
        Self { observation_id }
    }

    pub fn validate(&self) -> Result<(), ObservationError> {
        check_observation_id(self.observation_id)
    }
}

/// A moderator's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    /// Returns the decision name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Decision {
    type Err = ObservationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" | "complete" => Ok(Decision::Approve),
            "reject" => Ok(Decision::Reject),
            other => Err(ObservationError::UnknownDecision(other.to_string())),
        }
    }
}

/// Command to approve or reject a formed observation.
#[derive(Debug, Clone)]
pub struct ModerateObservation {
    pub observation_id: ObservationId,
    pub decision: Decision,

    /// Optional moderator comment, written with the transition.
    pub comment: Option<String>,
}

impl ModerateObservation {
    /// Creates a new ModerateObservation command.
    pub fn new(observation_id: ObservationId, decision: Decision) -> Self {
        Self {
            observation_id,
            decision,
            comment: None,
        }
    }

    /// Attaches a moderator comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn validate(&self) -> Result<(), ObservationError> {
        check_observation_id(self.observation_id)?;
        check_not_blank("comment", self.comment.as_deref())
    }
}

/// Command to soft-delete an observation.
#[derive(Debug, Clone, Copy)]
pub struct DeleteObservation {
    pub observation_id: ObservationId,
}

impl DeleteObservation {
    /// Creates a new DeleteObservation command.
    pub fn new(observation_id: ObservationId) -> Self {
        Self { observation_id }
    }

    pub fn validate(&self) -> Result<(), ObservationError> {
        check_observation_id(self.observation_id)
    }
}

/// Command to set the creator's comment.
#[derive(Debug, Clone)]
pub struct UpdateComment {
    pub observation_id: ObservationId,
    pub comment: String,
}

impl UpdateComment {
    /// Creates a new UpdateComment command.
    pub fn new(observation_id: ObservationId, comment: impl Into<String>) -> Self {
        Self {
            observation_id,
            comment: comment.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ObservationError> {
        check_observation_id(self.observation_id)?;
        check_not_blank("comment", Some(&self.comment))
    }
}
