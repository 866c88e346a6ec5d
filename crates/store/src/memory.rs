use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::{
    DayId, ItemRecord, ItemWithEvent, ObservationId, ObservationQuery, ObservationRecord,
    ObservationStatus, ObservationSummary, ReferencedEvent, Result, StoreError, UserId, UserRecord,
    store::{DraftTransaction, ItemPatch, ObservationFilter, ObservationPatch, ObservationStore},
};

#[derive(Debug, Default)]
struct MemoryState {
    last_observation_id: i64,
    observations: BTreeMap<ObservationId, ObservationRecord>,
    items: BTreeMap<(ObservationId, DayId), ItemRecord>,
    events: HashMap<DayId, ReferencedEvent>,
    users: HashMap<UserId, UserRecord>,
}

impl MemoryState {
    fn find_draft(&self, creator_id: UserId) -> Option<ObservationRecord> {
        self.observations
            .values()
            .find(|o| o.creator_id == creator_id && o.status == ObservationStatus::Draft)
            .cloned()
    }

    fn guard_holds(&self, guard: &ObservationFilter) -> bool {
        self.observations
            .get(&guard.id)
            .is_some_and(|record| guard.matches(record))
    }

    fn summarize(&self, record: &ObservationRecord) -> Option<ObservationSummary> {
        // Inner join on the creator, left join on the moderator.
        let creator = self.users.get(&record.creator_id)?;
        let moderator_login = record
            .moderator_id
            .and_then(|id| self.users.get(&id))
            .map(|u| u.login.clone());

        Some(ObservationSummary {
            record: record.clone(),
            creator_login: creator.login.clone(),
            moderator_login,
        })
    }
}

/// In-memory observation store for tests and local runs.
///
/// Provides the same conditional-write semantics as the PostgreSQL
/// implementation. Draft transactions hold the store-wide write lock and
/// stage their writes, which are applied on commit.
#[derive(Clone, Default)]
pub struct InMemoryObservationStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryObservationStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user so read models can resolve its login.
    pub async fn add_user(&self, user: UserRecord) {
        self.state.write().await.users.insert(user.id, user);
    }

    /// Registers a referenced event.
    pub async fn add_event(&self, event: ReferencedEvent) {
        self.state.write().await.events.insert(event.id, event);
    }

    /// Returns the number of observations in any status.
    pub async fn observation_count(&self) -> usize {
        self.state.read().await.observations.len()
    }

    /// Returns the number of drafts held by a creator.
    pub async fn draft_count(&self, creator_id: UserId) -> usize {
        self.state
            .read()
            .await
            .observations
            .values()
            .filter(|o| o.creator_id == creator_id && o.status == ObservationStatus::Draft)
            .count()
    }
}

#[async_trait]
impl ObservationStore for InMemoryObservationStore {
    async fn begin_draft(&self, _creator_id: UserId) -> Result<Box<dyn DraftTransaction>> {
        let guard = self.state.clone().write_owned().await;
        Ok(Box::new(MemoryDraftTransaction {
            guard,
            created: None,
            items: BTreeMap::new(),
        }))
    }

    async fn find_draft_by_creator(
        &self,
        creator_id: UserId,
    ) -> Result<Option<ObservationRecord>> {
        Ok(self.state.read().await.find_draft(creator_id))
    }

    async fn find_observation(&self, id: ObservationId) -> Result<Option<ObservationRecord>> {
        Ok(self.state.read().await.observations.get(&id).cloned())
    }

    async fn conditional_update(
        &self,
        filter: &ObservationFilter,
        patch: &ObservationPatch,
    ) -> Result<u64> {
        let mut state = self.state.write().await;
        match state.observations.get_mut(&filter.id) {
            Some(record) if filter.matches(record) => {
                patch.apply_to(record);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn update_item(
        &self,
        guard: &ObservationFilter,
        day_id: DayId,
        patch: &ItemPatch,
    ) -> Result<u64> {
        let mut state = self.state.write().await;
        if !state.guard_holds(guard) {
            return Ok(0);
        }
        match state.items.get_mut(&(guard.id, day_id)) {
            Some(item) => {
                patch.apply_to(item);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_item(&self, guard: &ObservationFilter, day_id: DayId) -> Result<u64> {
        let mut state = self.state.write().await;
        if !state.guard_holds(guard) {
            return Ok(0);
        }
        Ok(state.items.remove(&(guard.id, day_id)).map_or(0, |_| 1))
    }

    async fn fetch_items_with_events(&self, id: ObservationId) -> Result<Vec<ItemWithEvent>> {
        let state = self.state.read().await;
        let mut rows: Vec<_> = state
            .items
            .values()
            .filter(|item| item.observation_id == id)
            .filter_map(|item| {
                state.events.get(&item.day_id).map(|event| ItemWithEvent {
                    item: item.clone(),
                    event: event.clone(),
                })
            })
            .collect();
        rows.sort_by_key(|row| (row.item.sort_order, row.item.day_id));
        Ok(rows)
    }

    async fn count_items(&self, id: ObservationId) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state
            .items
            .values()
            .filter(|item| item.observation_id == id)
            .count() as u64)
    }

    async fn list_observations(
        &self,
        query: &ObservationQuery,
    ) -> Result<Vec<ObservationSummary>> {
        let state = self.state.read().await;
        Ok(state
            .observations
            .values()
            .rev()
            .filter_map(|record| state.summarize(record))
            .filter(|summary| query.matches(summary))
            .collect())
    }
}

struct MemoryDraftTransaction {
    guard: OwnedRwLockWriteGuard<MemoryState>,

    /// Draft created by this transaction.
    created: Option<ObservationRecord>,

    /// Inserted or incremented items.
    items: BTreeMap<(ObservationId, DayId), ItemRecord>,
}

impl MemoryDraftTransaction {
    fn is_open_draft(&self, id: ObservationId) -> bool {
        self.created.as_ref().is_some_and(|draft| draft.id == id)
            || self
                .guard
                .observations
                .get(&id)
                .is_some_and(|o| o.status == ObservationStatus::Draft)
    }

    fn current_item(&self, key: &(ObservationId, DayId)) -> Option<&ItemRecord> {
        self.items.get(key).or_else(|| self.guard.items.get(key))
    }
}

#[async_trait]
impl DraftTransaction for MemoryDraftTransaction {
    async fn event_exists(&mut self, day_id: DayId) -> Result<bool> {
        Ok(self
            .guard
            .events
            .get(&day_id)
            .is_some_and(|event| !event.is_deleted))
    }

    async fn find_draft(&mut self, creator_id: UserId) -> Result<Option<ObservationRecord>> {
        let staged = self
            .created
            .as_ref()
            .filter(|draft| draft.creator_id == creator_id)
            .cloned();
        Ok(staged.or_else(|| self.guard.find_draft(creator_id)))
    }

    async fn create_draft(
        &mut self,
        creator_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Result<ObservationRecord> {
        // Same invariant as the partial unique index in PostgreSQL.
        if self.created.is_some() || self.guard.find_draft(creator_id).is_some() {
            return Err(StoreError::Conflict(format!(
                "creator {creator_id} already has a draft"
            )));
        }

        let record = ObservationRecord::draft(
            ObservationId::new(self.guard.last_observation_id + 1),
            creator_id,
            created_at,
        );
        self.created = Some(record.clone());
        Ok(record)
    }

    async fn increment_item(
        &mut self,
        observation_id: ObservationId,
        day_id: DayId,
    ) -> Result<u64> {
        let key = (observation_id, day_id);
        if !self.is_open_draft(observation_id) {
            return Ok(0);
        }
        let Some(mut item) = self.current_item(&key).cloned() else {
            return Ok(0);
        };

        item.quantity = item.quantity.checked_add(1).ok_or_else(|| {
            StoreError::OutOfRange(format!("item quantity of ({observation_id}, {day_id})"))
        })?;
        self.items.insert(key, item);
        Ok(1)
    }

    async fn insert_item(&mut self, item: &ItemRecord) -> Result<()> {
        let key = (item.observation_id, item.day_id);
        if !self.is_open_draft(item.observation_id) {
            return Err(StoreError::Conflict(format!(
                "observation {} is not an open draft",
                item.observation_id
            )));
        }
        if self.current_item(&key).is_some() {
            return Err(StoreError::Conflict(format!(
                "item ({}, {}) already exists",
                item.observation_id, item.day_id
            )));
        }
        self.items.insert(key, item.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryDraftTransaction {
            mut guard,
            created,
            items,
        } = *self;

        if let Some(draft) = created {
            guard.last_observation_id = draft.id.as_i64();
            guard.observations.insert(draft.id, draft);
        }
        guard.items.extend(items);
        Ok(())
    }
}
