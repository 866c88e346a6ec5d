//! Item collection of an observation: (observation, day) pairs with
//! quantity, ordering, note and optional coordinate override.

use std::sync::Arc;

use chrono::Utc;
use common::{AuthContext, DayId, ObservationId};
use serde::Serialize;
use store::{ItemRecord, ObservationStore};

use crate::error::DomainError;

use super::{AddItem, ObservationError, RemoveItem, Transition, UpdateItem};

/// Result of [`ItemCollectionManager::add_or_increment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemOutcome {
    /// The creator's draft the item landed in.
    pub draft_id: ObservationId,
    pub day_id: DayId,

    /// True if this call opened the draft.
    pub created_draft: bool,

    /// True if the pair was inserted rather than incremented.
    pub created_item: bool,
}

/// Edits the item collection of observations.
pub struct ItemCollectionManager<S: ObservationStore> {
    store: Arc<S>,
}

impl<S: ObservationStore> Clone for ItemCollectionManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

fn item_not_found(day_id: DayId) -> ObservationError {
    ObservationError::NotFound {
        entity: "Item",
        id: day_id.as_i64(),
    }
}

impl<S: ObservationStore> ItemCollectionManager<S> {
    /// Creates an item collection manager over a shared store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Adds a day to the actor's draft, opening the draft if there is none.
    ///
    /// Runs as one draft transaction: the day is checked, the draft found or
    /// created, then the pair's quantity incremented or the pair inserted.
    /// Concurrent calls of the same creator are serialized by the store.
    pub async fn add_or_increment(
        &self,
        auth: &AuthContext,
        cmd: &AddItem,
    ) -> Result<AddItemOutcome, DomainError> {
        let creator_id = auth.actor_id;
        let day_id = cmd.day_id;

        let mut tx = self.store.begin_draft(creator_id).await?;

        if !tx.event_exists(day_id).await? {
            return Err(ObservationError::NotFound {
                entity: "Day",
                id: day_id.as_i64(),
            }
            .into());
        }

        let existing = tx.find_draft(creator_id).await?;
        let created_draft = existing.is_none();
        let draft = match existing {
            Some(draft) => draft,
            None => tx.create_draft(creator_id, Utc::now()).await?,
        };

        let created_item = tx.increment_item(draft.id, day_id).await? == 0;
        if created_item {
            tx.insert_item(&ItemRecord::first_add(draft.id, day_id))
                .await?;
        }

        tx.commit().await?;

        metrics::counter!("observation_items_added_total").increment(1);
        tracing::info!(
            draft_id = %draft.id,
            day_id = %day_id,
            created_draft,
            created_item,
            "item added to draft"
        );

        Ok(AddItemOutcome {
            draft_id: draft.id,
            day_id,
            created_draft,
            created_item,
        })
    }

    /// Removes one pair from an editable observation owned by the actor.
    pub async fn remove(&self, auth: &AuthContext, cmd: &RemoveItem) -> Result<(), DomainError> {
        let guard = Transition::EditItems.guard(cmd.observation_id, auth);
        if self.store.delete_item(&guard, cmd.day_id).await? == 0 {
            return Err(item_not_found(cmd.day_id).into());
        }

        tracing::info!(
            observation_id = %cmd.observation_id,
            day_id = %cmd.day_id,
            "item removed"
        );
        Ok(())
    }

    /// Writes the supplied fields of one pair.
    ///
    /// An update with no fields succeeds without changes as long as the
    /// guard holds.
    pub async fn update(&self, auth: &AuthContext, cmd: &UpdateItem) -> Result<(), DomainError> {
        let guard = Transition::EditItems.guard(cmd.observation_id, auth);
        if self
            .store
            .update_item(&guard, cmd.day_id, &cmd.patch)
            .await?
            == 0
        {
            return Err(item_not_found(cmd.day_id).into());
        }

        tracing::debug!(
            observation_id = %cmd.observation_id,
            day_id = %cmd.day_id,
            empty = cmd.patch.is_empty(),
            "item updated"
        );
        Ok(())
    }
}
