//! Observation aggregate: lifecycle, item collection and distance estimation.

mod commands;
mod distance;
mod items;
mod lifecycle;
mod service;
mod views;

pub use commands::*;
pub use distance::{
    DatedPoint, LINEAR_SPEED_M_PER_S, angular_separation, candidate_distances, dated_points,
    estimate_distance_km, median, parse_date_label,
};
pub use items::{AddItemOutcome, ItemCollectionManager};
pub use lifecycle::{LifecycleManager, Transition, TransitionOutcome};
pub use service::ObservationService;
pub use views::{DraftSummary, ItemView, ListFilter, ObservationDetails, ObservationView};

use common::ObservationStatus;
use thiserror::Error;

/// Errors that can occur during observation operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObservationError {
    /// The entity does not exist, is deleted, or belongs to someone else.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// Observation is not in the expected state.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: ObservationStatus,
        action: &'static str,
    },

    /// The action is reserved to moderators.
    #[error("Moderator role required to {action}")]
    ModeratorRequired { action: &'static str },

    /// Identifier is not a positive integer.
    #[error("Invalid {field}: {value} (must be greater than 0)")]
    InvalidId { field: &'static str, value: i64 },

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be at least 1)")]
    InvalidQuantity { quantity: u32 },

    /// Coordinates out of range or not finite.
    #[error("Invalid coordinates: ra={ra}, dec={dec}")]
    InvalidCoordinates { ra: f64, dec: f64 },

    /// A text field was supplied but blank.
    #[error("{field} must not be blank")]
    EmptyField { field: &'static str },

    /// Unknown moderation action.
    #[error("Unknown moderation action: {0}")]
    UnknownDecision(String),
}

/// Coarse classification of [`ObservationError`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Validation,
}

impl ObservationError {
    /// Returns the error class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ObservationError::NotFound { .. } => ErrorKind::NotFound,
            ObservationError::InvalidStateTransition { .. }
            | ObservationError::ModeratorRequired { .. } => ErrorKind::InvalidState,
            ObservationError::InvalidId { .. }
            | ObservationError::InvalidQuantity { .. }
            | ObservationError::InvalidCoordinates { .. }
            | ObservationError::EmptyField { .. }
            | ObservationError::UnknownDecision(_) => ErrorKind::Validation,
        }
    }

    pub(crate) fn observation_not_found(id: common::ObservationId) -> Self {
        ObservationError::NotFound {
            entity: "Observation",
            id: id.as_i64(),
        }
    }
}
