//! Domain error types.

use store::StoreError;
use thiserror::Error;

use crate::observation::{ErrorKind, ObservationError};

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the observation store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A rule of the observation lifecycle was violated.
    #[error("Observation error: {0}")]
    Observation(ObservationError),
}

impl DomainError {
    /// Classifies rule violations; `None` for persistence failures.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            DomainError::Observation(err) => Some(err.kind()),
            DomainError::Store(_) => None,
        }
    }
}
