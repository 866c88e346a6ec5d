//! Domain layer for the observation moderation service.
//!
//! This crate provides:
//! - the observation lifecycle (draft → formed → finished | rejected, soft delete)
//! - the item collection of (observation, referenced day) pairs
//! - the distance estimator run on approval
//! - read models and the [`ObservationService`] facade

pub mod error;
pub mod observation;

pub use error::DomainError;
pub use observation::{
    AddItem, AddItemOutcome, DatedPoint, Decision, DeleteObservation, DraftSummary, ErrorKind,
    ItemCollectionManager, ItemView, LINEAR_SPEED_M_PER_S, LifecycleManager, ListFilter,
    ModerateObservation, ObservationDetails, ObservationError, ObservationService, ObservationView,
    RemoveItem, SubmitObservation, Transition, TransitionOutcome, UpdateComment, UpdateItem,
    angular_separation, candidate_distances, dated_points, estimate_distance_km, median,
    parse_date_label,
};
