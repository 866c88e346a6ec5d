//! Observation lifecycle: the transition table and the manager that applies
//! transitions as conditional updates.

use std::sync::Arc;

use chrono::Utc;
use common::{AuthContext, ObservationId, ObservationStatus};
use serde::Serialize;
use store::{ObservationFilter, ObservationPatch, ObservationStore};

use crate::error::DomainError;

use super::distance::{dated_points, estimate_distance_km};
use super::{
    Decision, DeleteObservation, ModerateObservation, ObservationError, SubmitObservation,
    UpdateComment,
};

/// Every guarded change an actor can request on an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// draft → formed, by the creator.
    Submit,
    /// formed → finished, by a moderator.
    Approve,
    /// formed → rejected, by a moderator.
    Reject,
    /// any live status → deleted, by the creator.
    Delete,
    /// Item add/update/remove while the collection is editable.
    EditItems,
    /// Creator comment while the collection is editable.
    UpdateComment,
}

impl Transition {
    /// Verb used in error messages.
    pub fn action(&self) -> &'static str {
        match self {
            Transition::Submit => "submit",
            Transition::Approve => "approve",
            Transition::Reject => "reject",
            Transition::Delete => "delete",
            Transition::EditItems => "edit items",
            Transition::UpdateComment => "update comment",
        }
    }

    /// Returns true if the transition may start from `status`.
    pub fn permits(&self, status: ObservationStatus) -> bool {
        match self {
            Transition::Submit => status.can_submit(),
            Transition::Approve | Transition::Reject => status.can_moderate(),
            Transition::Delete => status.can_delete(),
            Transition::EditItems | Transition::UpdateComment => status.can_edit_items(),
        }
    }

    /// The prior statuses a conditional update expects.
    pub fn allowed_statuses(&self) -> Vec<ObservationStatus> {
        ObservationStatus::ALL
            .into_iter()
            .filter(|status| self.permits(*status))
            .collect()
    }

    /// Status written by the transition, if it changes status at all.
    pub fn target(&self) -> Option<ObservationStatus> {
        match self {
            Transition::Submit => Some(ObservationStatus::Formed),
            Transition::Approve => Some(ObservationStatus::Finished),
            Transition::Reject => Some(ObservationStatus::Rejected),
            Transition::Delete => Some(ObservationStatus::Deleted),
            Transition::EditItems | Transition::UpdateComment => None,
        }
    }

    /// Starts the patch the transition writes, carrying its target status.
    pub fn patch(&self) -> ObservationPatch {
        match self.target() {
            Some(status) => ObservationPatch::new().status(status),
            None => ObservationPatch::new(),
        }
    }

    /// Moderator-only transitions are not scoped to the creator.
    pub fn requires_moderator(&self) -> bool {
        matches!(self, Transition::Approve | Transition::Reject)
    }

    /// Builds the conditional-write guard for `id` acted on by `auth`.
    pub fn guard(&self, id: ObservationId, auth: &AuthContext) -> ObservationFilter {
        let filter = ObservationFilter::by_id(id).in_statuses(self.allowed_statuses());
        if self.requires_moderator() {
            filter
        } else {
            filter.owned_by(auth.actor_id)
        }
    }
}

impl From<Decision> for Transition {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approve => Transition::Approve,
            Decision::Reject => Transition::Reject,
        }
    }
}

/// Result of a successful transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionOutcome {
    pub observation_id: ObservationId,
    pub status: ObservationStatus,

    /// Set on approval only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_distance_km: Option<f64>,
}

impl TransitionOutcome {
    fn new(observation_id: ObservationId, status: ObservationStatus) -> Self {
        Self {
            observation_id,
            status,
            result_distance_km: None,
        }
    }
}

/// Applies lifecycle transitions.
///
/// Each transition is a single conditional update guarded by the expected
/// prior statuses and, for creator transitions, the owner. A miss is never
/// treated as success: the manager reads the row once and reports either
/// `NotFound` or an invalid state.
pub struct LifecycleManager<S: ObservationStore> {
    store: Arc<S>,
}

impl<S: ObservationStore> Clone for LifecycleManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ObservationStore> LifecycleManager<S> {
    /// Creates a lifecycle manager over a shared store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Moves the creator's draft to `formed`.
    pub async fn submit(
        &self,
        auth: &AuthContext,
        cmd: &SubmitObservation,
    ) -> Result<TransitionOutcome, DomainError> {
        let id = cmd.observation_id;
        let patch = Transition::Submit.patch().formed_at(Utc::now());

        self.apply(Transition::Submit, id, auth, &patch).await?;

        metrics::counter!("observations_submitted_total").increment(1);
        tracing::info!(observation_id = %id, creator_id = %auth.actor_id, "observation submitted");
        Ok(TransitionOutcome::new(id, ObservationStatus::Formed))
    }

    /// Approves or rejects a formed observation.
    ///
    /// Approval runs the distance estimator over the current items and
    /// writes the result in the same conditional update as the status.
    pub async fn moderate(
        &self,
        auth: &AuthContext,
        cmd: &ModerateObservation,
    ) -> Result<TransitionOutcome, DomainError> {
        let transition = Transition::from(cmd.decision);
        if !auth.is_moderator {
            return Err(ObservationError::ModeratorRequired {
                action: transition.action(),
            }
            .into());
        }

        let id = cmd.observation_id;
        let mut patch = transition
            .patch()
            .moderator(auth.actor_id)
            .completed_at(Utc::now())
            .comment(cmd.comment.clone());

        let mut outcome = TransitionOutcome::new(id, ObservationStatus::Rejected);
        if cmd.decision == Decision::Approve {
            let rows = self.store.fetch_items_with_events(id).await?;
            let distance_km = estimate_distance_km(&dated_points(&rows));
            patch = patch.result_distance_km(distance_km);
            outcome = TransitionOutcome {
                observation_id: id,
                status: ObservationStatus::Finished,
                result_distance_km: Some(distance_km),
            };
        }

        self.apply(transition, id, auth, &patch).await?;

        metrics::counter!("observations_moderated_total", "decision" => cmd.decision.as_str())
            .increment(1);
        if let Some(km) = outcome.result_distance_km {
            metrics::histogram!("observation_distance_km").record(km);
        }
        tracing::info!(
            observation_id = %id,
            moderator_id = %auth.actor_id,
            decision = %cmd.decision,
            result_distance_km = ?outcome.result_distance_km,
            "observation moderated"
        );
        Ok(outcome)
    }

    /// Soft-deletes one of the creator's observations.
    ///
    /// Deleting an already deleted observation of the same creator is a
    /// no-op success.
    pub async fn delete(
        &self,
        auth: &AuthContext,
        cmd: &DeleteObservation,
    ) -> Result<TransitionOutcome, DomainError> {
        let id = cmd.observation_id;
        let guard = Transition::Delete.guard(id, auth);
        let patch = Transition::Delete.patch().clear_result();

        if self.store.conditional_update(&guard, &patch).await? == 0 {
            return match self.store.find_observation(id).await? {
                Some(record)
                    if record.creator_id == auth.actor_id
                        && record.status == ObservationStatus::Deleted =>
                {
                    tracing::debug!(observation_id = %id, "observation already deleted");
                    Ok(TransitionOutcome::new(id, ObservationStatus::Deleted))
                }
                _ => Err(ObservationError::observation_not_found(id).into()),
            };
        }

        metrics::counter!("observations_deleted_total").increment(1);
        tracing::info!(observation_id = %id, creator_id = %auth.actor_id, "observation deleted");
        Ok(TransitionOutcome::new(id, ObservationStatus::Deleted))
    }

    /// Sets the creator's comment while the observation is editable.
    pub async fn update_comment(
        &self,
        auth: &AuthContext,
        cmd: &UpdateComment,
    ) -> Result<(), DomainError> {
        let patch = Transition::UpdateComment
            .patch()
            .comment(Some(cmd.comment.clone()));
        self.apply(Transition::UpdateComment, cmd.observation_id, auth, &patch)
            .await
    }

    async fn apply(
        &self,
        transition: Transition,
        id: ObservationId,
        auth: &AuthContext,
        patch: &ObservationPatch,
    ) -> Result<(), DomainError> {
        let guard = transition.guard(id, auth);
        if self.store.conditional_update(&guard, patch).await? == 0 {
            return Err(self.explain_miss(transition, id, auth).await?.into());
        }
        Ok(())
    }

    /// Classifies a conditional update that matched no row.
    async fn explain_miss(
        &self,
        transition: Transition,
        id: ObservationId,
        auth: &AuthContext,
    ) -> Result<ObservationError, DomainError> {
        let record = self.store.find_observation(id).await?;
        let error = match record {
            Some(record)
                if record.status != ObservationStatus::Deleted
                    && (transition.requires_moderator() || record.creator_id == auth.actor_id) =>
            {
                tracing::warn!(
                    observation_id = %id,
                    status = %record.status,
                    action = transition.action(),
                    "transition rejected"
                );
                ObservationError::InvalidStateTransition {
                    current_state: record.status,
                    action: transition.action(),
                }
            }
            _ => ObservationError::observation_not_found(id),
        };
        Ok(error)
    }
}
