//! Observation endpoints: draft assembly, lifecycle transitions and reads.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use common::{Coordinates, DayId, ObservationId, ObservationStatus};
use domain::{
    AddItem, AddItemOutcome, Decision, DeleteObservation, DraftSummary, ListFilter,
    ModerateObservation, ObservationDetails, ObservationService, ObservationView, RemoveItem,
    SubmitObservation, TransitionOutcome, UpdateComment, UpdateItem,
};
use serde::Deserialize;
use store::{ItemPatch, ObservationStore};

use crate::auth::Actor;
use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: ObservationStore> {
    pub service: ObservationService<S>,
}

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub day_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct ModerateRequest {
    pub action: String,
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub quantity: Option<u32>,
    pub sort_order: Option<i32>,
    pub is_primary: Option<bool>,
    pub note: Option<String>,
    pub ra: Option<f64>,
    pub dec: Option<f64>,
}

impl UpdateItemRequest {
    fn into_patch(self) -> Result<ItemPatch, ApiError> {
        let mut patch = ItemPatch::new();
        if let Some(quantity) = self.quantity {
            patch = patch.quantity(quantity);
        }
        if let Some(sort_order) = self.sort_order {
            patch = patch.sort_order(sort_order);
        }
        if let Some(is_primary) = self.is_primary {
            patch = patch.primary(is_primary);
        }
        if let Some(note) = self.note {
            patch = patch.note(note);
        }
        match (self.ra, self.dec) {
            (Some(ra), Some(dec)) => patch = patch.coordinates(Coordinates::new(ra, dec)),
            (None, None) => {}
            _ => {
                return Err(ApiError::BadRequest(
                    "ra and dec must be supplied together".to_string(),
                ));
            }
        }
        Ok(patch)
    }
}

// -- Handlers --

/// GET /observations: list submitted observations, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: ObservationStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Actor(auth): Actor,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ObservationView>>, ApiError> {
    let status = params
        .status
        .as_deref()
        .map(|s| s.parse::<ObservationStatus>())
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let formed_from = params
        .from
        .as_deref()
        .map(|raw| parse_day(raw, "from"))
        .transpose()?
        .map(start_of_day);
    let formed_to = params
        .to
        .as_deref()
        .map(|raw| parse_day(raw, "to"))
        .transpose()?
        .map(|day| start_of_day(day) + Duration::days(1) - Duration::nanoseconds(1));

    let filter = ListFilter {
        status,
        formed_from,
        formed_to,
    };
    let observations = state.service.list_observations(auth, filter).await?;
    Ok(Json(observations))
}

/// GET /observations/draft: the actor's open draft and its item count.
#[tracing::instrument(skip(state))]
pub async fn draft<S: ObservationStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Actor(auth): Actor,
) -> Result<Json<DraftSummary>, ApiError> {
    Ok(Json(state.service.draft_summary(auth).await?))
}

/// POST /observations/draft/items: add a day to the draft.
#[tracing::instrument(skip(state))]
pub async fn add_item<S: ObservationStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Actor(auth): Actor,
    Json(req): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<AddItemOutcome>), ApiError> {
    let outcome = state
        .service
        .add_item(auth, AddItem::new(DayId::new(req.day_id)))
        .await?;

    let status = if outcome.created_item {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}

/// GET /observations/{id}: an observation with its items.
#[tracing::instrument(skip(state))]
pub async fn get<S: ObservationStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Actor(auth): Actor,
    Path(id): Path<String>,
) -> Result<Json<ObservationDetails>, ApiError> {
    let id = parse_observation_id(&id)?;
    Ok(Json(state.service.get_observation(auth, id).await?))
}

/// PUT /observations/{id}: set the creator's comment.
#[tracing::instrument(skip(state, req))]
pub async fn update_comment<S: ObservationStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Actor(auth): Actor,
    Path(id): Path<String>,
    Json(req): Json<UpdateCommentRequest>,
) -> Result<StatusCode, ApiError> {
    let id = parse_observation_id(&id)?;
    state
        .service
        .update_comment(auth, UpdateComment::new(id, req.comment))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /observations/{id}: soft delete.
#[tracing::instrument(skip(state))]
pub async fn delete<S: ObservationStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Actor(auth): Actor,
    Path(id): Path<String>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    let id = parse_observation_id(&id)?;
    Ok(Json(
        state
            .service
            .delete(auth, DeleteObservation::new(id))
            .await?,
    ))
}

/// PUT /observations/{id}/submit: send the draft to moderation.
#[tracing::instrument(skip(state))]
pub async fn submit<S: ObservationStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Actor(auth): Actor,
    Path(id): Path<String>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    let id = parse_observation_id(&id)?;
    Ok(Json(
        state
            .service
            .submit(auth, SubmitObservation::new(id))
            .await?,
    ))
}

/// PUT /observations/{id}/moderate: approve (`complete`) or reject.
#[tracing::instrument(skip(state, req))]
pub async fn moderate<S: ObservationStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Actor(auth): Actor,
    Path(id): Path<String>,
    Json(req): Json<ModerateRequest>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    let id = parse_observation_id(&id)?;
    let decision: Decision = req.action.parse()?;

    let mut cmd = ModerateObservation::new(id, decision);
    if let Some(comment) = req.comment {
        cmd = cmd.with_comment(comment);
    }
    Ok(Json(state.service.moderate(auth, cmd).await?))
}

/// PUT /observations/{id}/items/{dayId}: partial item update.
#[tracing::instrument(skip(state, req))]
pub async fn update_item<S: ObservationStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Actor(auth): Actor,
    Path((id, day_id)): Path<(String, String)>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<StatusCode, ApiError> {
    let id = parse_observation_id(&id)?;
    let day_id = parse_day_id(&day_id)?;
    let patch = req.into_patch()?;

    state
        .service
        .update_item(auth, UpdateItem::new(id, day_id, patch))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /observations/{id}/items/{dayId}: remove an item.
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: ObservationStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Actor(auth): Actor,
    Path((id, day_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let id = parse_observation_id(&id)?;
    let day_id = parse_day_id(&day_id)?;

    state
        .service
        .remove_item(auth, RemoveItem::new(id, day_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Helpers --

fn parse_observation_id(raw: &str) -> Result<ObservationId, ApiError> {
    raw.parse::<i64>()
        .map(ObservationId::new)
        .map_err(|e| ApiError::BadRequest(format!("Invalid observation id: {e}")))
}

fn parse_day_id(raw: &str) -> Result<DayId, ApiError> {
    raw.parse::<i64>()
        .map(DayId::new)
        .map_err(|e| ApiError::BadRequest(format!("Invalid day id: {e}")))
}

fn parse_day(raw: &str, field: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid {field} date: {raw} (expected YYYY-MM-DD)")))
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}
