//! Observation service providing the API used by adapters.

use std::sync::Arc;

use common::{AuthContext, ObservationId};
use store::{ObservationQuery, ObservationStore};

use crate::error::DomainError;

use super::{
    AddItem, AddItemOutcome, DeleteObservation, DraftSummary, ItemCollectionManager, ItemView,
    LifecycleManager, ListFilter, ModerateObservation, ObservationDetails, ObservationError,
    ObservationView, RemoveItem, SubmitObservation, TransitionOutcome, UpdateComment, UpdateItem,
};

impl From<ObservationError> for DomainError {
    fn from(e: ObservationError) -> Self {
        DomainError::Observation(e)
    }
}

/// Service for managing observations.
///
/// Validates commands, then delegates to the lifecycle and item collection
/// managers. Every operation takes the acting user's [`AuthContext`]
/// explicitly.
pub struct ObservationService<S: ObservationStore> {
    store: Arc<S>,
    lifecycle: LifecycleManager<S>,
    items: ItemCollectionManager<S>,
}

impl<S: ObservationStore> ObservationService<S> {
    /// Creates a new observation service with the given store.
    pub fn new(store: S) -> Self {
        let store = Arc::new(store);
        Self {
            lifecycle: LifecycleManager::new(Arc::clone(&store)),
            items: ItemCollectionManager::new(Arc::clone(&store)),
            store,
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Adds a day to the actor's draft (creating the draft on first add).
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        auth: AuthContext,
        cmd: AddItem,
    ) -> Result<AddItemOutcome, DomainError> {
        cmd.validate()?;
        self.items.add_or_increment(&auth, &cmd).await
    }

    /// Removes an item from one of the actor's editable observations.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(&self, auth: AuthContext, cmd: RemoveItem) -> Result<(), DomainError> {
        cmd.validate()?;
        self.items.remove(&auth, &cmd).await
    }

    /// Partially updates an item.
    #[tracing::instrument(skip(self))]
    pub async fn update_item(&self, auth: AuthContext, cmd: UpdateItem) -> Result<(), DomainError> {
        cmd.validate()?;
        self.items.update(&auth, &cmd).await
    }

    /// Submits the actor's draft for moderation.
    #[tracing::instrument(skip(self))]
    pub async fn submit(
        &self,
        auth: AuthContext,
        cmd: SubmitObservation,
    ) -> Result<TransitionOutcome, DomainError> {
        cmd.validate()?;
        self.lifecycle.submit(&auth, &cmd).await
    }

    /// Approves or rejects a formed observation.
    #[tracing::instrument(skip(self))]
    pub async fn moderate(
        &self,
        auth: AuthContext,
        cmd: ModerateObservation,
    ) -> Result<TransitionOutcome, DomainError> {
        cmd.validate()?;
        self.lifecycle.moderate(&auth, &cmd).await
    }

    /// Soft-deletes one of the actor's observations.
    #[tracing::instrument(skip(self))]
    pub async fn delete(
        &self,
        auth: AuthContext,
        cmd: DeleteObservation,
    ) -> Result<TransitionOutcome, DomainError> {
        cmd.validate()?;
        self.lifecycle.delete(&auth, &cmd).await
    }

    /// Sets the creator's comment.
    #[tracing::instrument(skip(self))]
    pub async fn update_comment(
        &self,
        auth: AuthContext,
        cmd: UpdateComment,
    ) -> Result<(), DomainError> {
        cmd.validate()?;
        self.lifecycle.update_comment(&auth, &cmd).await
    }

    /// Loads an observation with its items.
    ///
    /// Visible to its creator and to moderators; anyone else gets `NotFound`,
    /// as does a deleted observation.
    #[tracing::instrument(skip(self))]
    pub async fn get_observation(
        &self,
        auth: AuthContext,
        id: ObservationId,
    ) -> Result<ObservationDetails, DomainError> {
        if !id.is_valid() {
            return Err(ObservationError::InvalidId {
                field: "observation id",
                value: id.as_i64(),
            }
            .into());
        }

        let summary = self
            .store
            .list_observations(&ObservationQuery::for_observation(id))
            .await?
            .into_iter()
            .next()
            .filter(|s| auth.is_moderator || s.record.creator_id == auth.actor_id)
            .ok_or_else(|| ObservationError::observation_not_found(id))?;

        let rows = self.store.fetch_items_with_events(id).await?;
        Ok(ObservationDetails {
            observation: summary.into(),
            items: rows.iter().map(ItemView::from).collect(),
        })
    }

    /// Lists non-draft, non-deleted observations, newest first.
    ///
    /// Moderators see everyone's; other actors only their own.
    #[tracing::instrument(skip(self))]
    pub async fn list_observations(
        &self,
        auth: AuthContext,
        filter: ListFilter,
    ) -> Result<Vec<ObservationView>, DomainError> {
        let mut query = filter.to_query();
        if !auth.is_moderator {
            query = query.creator(auth.actor_id);
        }

        let rows = self.store.list_observations(&query).await?;
        Ok(rows.into_iter().map(ObservationView::from).collect())
    }

    /// Returns the actor's draft id and item count.
    #[tracing::instrument(skip(self))]
    pub async fn draft_summary(&self, auth: AuthContext) -> Result<DraftSummary, DomainError> {
        let Some(draft) = self.store.find_draft_by_creator(auth.actor_id).await? else {
            return Ok(DraftSummary::default());
        };

        let item_count = self.store.count_items(draft.id).await?;
        Ok(DraftSummary {
            draft_id: Some(draft.id),
            item_count,
        })
    }
}
