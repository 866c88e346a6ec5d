use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Coordinates, DayId, ItemRecord, ItemWithEvent, ObservationId, ObservationQuery,
    ObservationRecord, ObservationStatus, ObservationSummary, Result, UserId,
};

/// Expected prior state of an observation row for a conditional write.
///
/// A write guarded by a filter only touches the row when the id matches,
/// the status is one of `expected_statuses`, and (if set) the creator matches.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationFilter {
    pub id: ObservationId,
    pub creator_id: Option<UserId>,
    pub expected_statuses: Vec<ObservationStatus>,
}

impl ObservationFilter {
    /// Matches the observation in any status.
    pub fn by_id(id: ObservationId) -> Self {
        Self {
            id,
            creator_id: None,
            expected_statuses: ObservationStatus::ALL.to_vec(),
        }
    }

    /// Additionally requires ownership by `creator_id`.
    pub fn owned_by(mut self, creator_id: UserId) -> Self {
        self.creator_id = Some(creator_id);
        self
    }

    /// Restricts the expected prior statuses.
    pub fn in_statuses(mut self, statuses: impl IntoIterator<Item = ObservationStatus>) -> Self {
        self.expected_statuses = statuses.into_iter().collect();
        self
    }

    /// Returns true if a record satisfies the filter.
    pub fn matches(&self, record: &ObservationRecord) -> bool {
        record.id == self.id
            && self.creator_id.is_none_or(|creator| record.creator_id == creator)
            && self.expected_statuses.contains(&record.status)
    }

    /// Status names bound as the SQL status array.
    pub fn status_names(&self) -> Vec<String> {
        self.expected_statuses
            .iter()
            .map(|s| s.as_str().to_string())
            .collect()
    }
}

/// Fields written by an observation transition. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationPatch {
    pub status: Option<ObservationStatus>,
    pub moderator_id: Option<UserId>,
    pub comment: Option<String>,
    pub formed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result_distance_km: Option<f64>,

    /// Resets `result_distance_km` to null; wins over `result_distance_km`.
    pub clear_result: bool,
}

impl ObservationPatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: ObservationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn moderator(mut self, moderator_id: UserId) -> Self {
        self.moderator_id = Some(moderator_id);
        self
    }

    pub fn comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }

    pub fn formed_at(mut self, at: DateTime<Utc>) -> Self {
        self.formed_at = Some(at);
        self
    }

    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    pub fn result_distance_km(mut self, km: f64) -> Self {
        self.result_distance_km = Some(km);
        self
    }

    pub fn clear_result(mut self) -> Self {
        self.clear_result = true;
        self
    }

    /// Writes the set fields into a record.
    pub fn apply_to(&self, record: &mut ObservationRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(moderator_id) = self.moderator_id {
            record.moderator_id = Some(moderator_id);
        }
        if let Some(comment) = &self.comment {
            record.comment = Some(comment.clone());
        }
        if let Some(at) = self.formed_at {
            record.formed_at = Some(at);
        }
        if let Some(at) = self.completed_at {
            record.completed_at = Some(at);
        }
        if self.clear_result {
            record.result_distance_km = None;
        } else if let Some(km) = self.result_distance_km {
            record.result_distance_km = Some(km);
        }
    }
}

/// Partial update of an item. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub quantity: Option<u32>,
    pub sort_order: Option<i32>,
    pub is_primary: Option<bool>,
    pub note: Option<String>,
    pub coordinates: Option<Coordinates>,
}

impl ItemPatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quantity(mut self, quantity: u32) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = Some(sort_order);
        self
    }

    pub fn primary(mut self, is_primary: bool) -> Self {
        self.is_primary = Some(is_primary);
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        self.quantity.is_none()
            && self.sort_order.is_none()
            && self.is_primary.is_none()
            && self.note.is_none()
            && self.coordinates.is_none()
    }

    /// Writes the set fields into an item.
    pub fn apply_to(&self, item: &mut ItemRecord) {
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
        if let Some(sort_order) = self.sort_order {
            item.sort_order = sort_order;
        }
        if let Some(is_primary) = self.is_primary {
            item.is_primary = is_primary;
        }
        if let Some(note) = &self.note {
            item.note = Some(note.clone());
        }
        if let Some(coordinates) = self.coordinates {
            item.coordinates = Some(coordinates);
        }
    }
}

/// Core trait for observation store implementations.
///
/// Every write reports the number of affected rows; callers treat zero as
/// "the guarded row was not in the expected state" and must never assume
/// success from the absence of an error. All implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Opens the transaction used to find-or-create a creator's draft and
    /// add an item to it.
    ///
    /// Implementations serialize draft transactions of the same creator, so
    /// concurrent adds can neither create two drafts nor lose an increment.
    async fn begin_draft(&self, creator_id: UserId) -> Result<Box<dyn DraftTransaction>>;

    /// Returns the creator's current draft, if any.
    async fn find_draft_by_creator(&self, creator_id: UserId)
    -> Result<Option<ObservationRecord>>;

    /// Returns an observation in any status.
    async fn find_observation(&self, id: ObservationId) -> Result<Option<ObservationRecord>>;

    /// Applies `patch` to the observation matched by `filter`.
    ///
    /// Returns the number of affected rows (0 or 1).
    async fn conditional_update(
        &self,
        filter: &ObservationFilter,
        patch: &ObservationPatch,
    ) -> Result<u64>;

    /// Applies `patch` to one item, provided its observation matches `guard`.
    ///
    /// An empty patch still reports the guarded row as affected.
    async fn update_item(
        &self,
        guard: &ObservationFilter,
        day_id: DayId,
        patch: &ItemPatch,
    ) -> Result<u64>;

    /// Deletes one item, provided its observation matches `guard`.
    async fn delete_item(&self, guard: &ObservationFilter, day_id: DayId) -> Result<u64>;

    /// Returns the observation's items joined with their referenced events,
    /// ordered by sort order then day.
    async fn fetch_items_with_events(&self, id: ObservationId) -> Result<Vec<ItemWithEvent>>;

    /// Returns the number of items in an observation.
    async fn count_items(&self, id: ObservationId) -> Result<u64>;

    /// Lists observations with resolved logins, newest first.
    async fn list_observations(&self, query: &ObservationQuery)
    -> Result<Vec<ObservationSummary>>;
}

/// Unit of work for the add-or-increment sequence.
///
/// Dropping the transaction without calling [`DraftTransaction::commit`]
/// discards every write made through it.
#[async_trait]
pub trait DraftTransaction: Send {
    /// Returns true if the referenced event exists and is not deleted.
    async fn event_exists(&mut self, day_id: DayId) -> Result<bool>;

    /// Returns the creator's current draft, if any, and keeps it a draft
    /// until the transaction ends.
    async fn find_draft(&mut self, creator_id: UserId) -> Result<Option<ObservationRecord>>;

    /// Creates a new draft for the creator.
    async fn create_draft(
        &mut self,
        creator_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Result<ObservationRecord>;

    /// Increments the quantity of an existing item of an open draft; returns
    /// affected rows.
    async fn increment_item(&mut self, observation_id: ObservationId, day_id: DayId)
    -> Result<u64>;

    /// Inserts a new item row.
    ///
    /// Fails with [`crate::StoreError::Conflict`] if the pair exists or the
    /// observation is no longer a draft.
    async fn insert_item(&mut self, item: &ItemRecord) -> Result<()>;

    /// Commits every write made through the transaction.
    async fn commit(self: Box<Self>) -> Result<()>;
}
