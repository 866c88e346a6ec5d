//! Shared types used across the observation service crates.

pub mod auth;
pub mod status;
pub mod types;

pub use auth::AuthContext;
pub use status::{ObservationStatus, ParseStatusError};
pub use types::{Coordinates, DayId, ObservationId, UserId};
