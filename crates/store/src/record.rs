//! Row-level records exchanged with the store.

use chrono::{DateTime, Utc};

use crate::{Coordinates, DayId, ObservationId, ObservationStatus, UserId};

/// A stored observation.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
    pub id: ObservationId,
    pub creator_id: UserId,
    pub moderator_id: Option<UserId>,
    pub status: ObservationStatus,
    pub comment: Option<String>,
    pub result_distance_km: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub formed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ObservationRecord {
    /// A fresh draft owned by `creator_id`.
    pub fn draft(id: ObservationId, creator_id: UserId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            creator_id,
            moderator_id: None,
            status: ObservationStatus::Draft,
            comment: None,
            result_distance_km: None,
            created_at,
            formed_at: None,
            completed_at: None,
        }
    }
}

/// One (observation, referenced event) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    pub observation_id: ObservationId,
    pub day_id: DayId,
    pub quantity: u32,
    pub sort_order: i32,
    pub is_primary: bool,
    pub note: Option<String>,

    /// Item-level override; `None` falls back to the event's baseline.
    pub coordinates: Option<Coordinates>,
}

impl ItemRecord {
    /// The row inserted on the first add of an event.
    pub fn first_add(observation_id: ObservationId, day_id: DayId) -> Self {
        Self {
            observation_id,
            day_id,
            quantity: 1,
            sort_order: 0,
            is_primary: false,
            note: None,
            coordinates: None,
        }
    }
}

/// A referenced event ("day"), read-only to the core.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencedEvent {
    pub id: DayId,
    pub date_label: String,
    pub baseline: Coordinates,
    pub is_deleted: bool,
}

impl ReferencedEvent {
    /// Creates a live event.
    pub fn new(id: DayId, date_label: impl Into<String>, baseline: Coordinates) -> Self {
        Self {
            id,
            date_label: date_label.into(),
            baseline,
            is_deleted: false,
        }
    }
}

/// A user, only needed to resolve logins for read models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub login: String,
    pub is_moderator: bool,
}

/// An item joined with the event it references.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemWithEvent {
    pub item: ItemRecord,
    pub event: ReferencedEvent,
}

impl ItemWithEvent {
    /// The override coordinates if set, else the event's baseline.
    pub fn effective_coordinates(&self) -> Coordinates {
        self.item.coordinates.unwrap_or(self.event.baseline)
    }
}

/// An observation joined with its creator's and moderator's logins.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationSummary {
    pub record: ObservationRecord,
    pub creator_login: String,
    pub moderator_login: Option<String>,
}
