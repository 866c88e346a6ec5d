//! Read models returned to callers.

use chrono::{DateTime, Utc};
use common::{DayId, ObservationId, ObservationStatus};
use serde::Serialize;
use store::{ItemWithEvent, ObservationQuery, ObservationSummary};

/// An observation with resolved creator and moderator logins.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationView {
    pub id: ObservationId,
    pub status: ObservationStatus,
    pub creator_login: String,
    pub moderator_login: Option<String>,
    pub comment: Option<String>,
    pub result_distance_km: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub formed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<ObservationSummary> for ObservationView {
    fn from(summary: ObservationSummary) -> Self {
        let record = summary.record;
        Self {
            id: record.id,
            status: record.status,
            creator_login: summary.creator_login,
            moderator_login: summary.moderator_login,
            comment: record.comment,
            result_distance_km: record.result_distance_km,
            created_at: record.created_at,
            formed_at: record.formed_at,
            completed_at: record.completed_at,
        }
    }
}

/// One item, with the coordinates the estimator would use.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    pub event_id: DayId,
    pub date_label: String,
    pub quantity: u32,
    pub sort_order: i32,
    pub is_primary: bool,
    pub note: Option<String>,
    pub ra: f64,
    pub dec: f64,
}

impl From<&ItemWithEvent> for ItemView {
    fn from(row: &ItemWithEvent) -> Self {
        let coordinates = row.effective_coordinates();
        Self {
            event_id: row.event.id,
            date_label: row.event.date_label.clone(),
            quantity: row.item.quantity,
            sort_order: row.item.sort_order,
            is_primary: row.item.is_primary,
            note: row.item.note.clone(),
            ra: coordinates.ra,
            dec: coordinates.dec,
        }
    }
}

/// An observation together with its items.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationDetails {
    pub observation: ObservationView,
    pub items: Vec<ItemView>,
}

/// The creator's open draft, if any, and how many items it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSummary {
    pub draft_id: Option<ObservationId>,
    pub item_count: u64,
}

/// Optional criteria for listing observations.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<ObservationStatus>,
    pub formed_from: Option<DateTime<Utc>>,
    pub formed_to: Option<DateTime<Utc>>,
}

impl ListFilter {
    /// Turns the filter into a listing query (drafts and deleted excluded).
    pub fn to_query(&self) -> ObservationQuery {
        let mut query =
            ObservationQuery::listing().formed_between(self.formed_from, self.formed_to);
        if let Some(status) = self.status {
            query = query.status(status);
        }
        query
    }
}
