use chrono::{DateTime, Utc};

use crate::{ObservationId, ObservationStatus, ObservationSummary, UserId};

/// Builder for listing observations.
///
/// Allows filtering by observation ID, status, creator and formation time.
/// Statuses in `excluded` never match, whatever the other criteria say.
#[derive(Debug, Clone, Default)]
pub struct ObservationQuery {
    /// Filter by observation ID.
    pub id: Option<ObservationId>,

    /// Filter by exact status.
    pub status: Option<ObservationStatus>,

    /// Statuses that are never returned.
    pub excluded: Vec<ObservationStatus>,

    /// Filter by creator.
    pub creator_id: Option<UserId>,

    /// Filter by observations formed at or after this timestamp.
    pub formed_from: Option<DateTime<Utc>>,

    /// Filter by observations formed at or before this timestamp.
    pub formed_to: Option<DateTime<Utc>>,
}

impl ObservationQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// The moderation queue listing: everything but drafts and deleted rows.
    pub fn listing() -> Self {
        Self {
            excluded: vec![ObservationStatus::Draft, ObservationStatus::Deleted],
            ..Default::default()
        }
    }

    /// A single live (non-deleted) observation.
    pub fn for_observation(id: ObservationId) -> Self {
        Self {
            id: Some(id),
            excluded: vec![ObservationStatus::Deleted],
            ..Default::default()
        }
    }

    /// Filters by status.
    pub fn status(mut self, status: ObservationStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Filters by creator.
    pub fn creator(mut self, creator_id: UserId) -> Self {
        self.creator_id = Some(creator_id);
        self
    }

    /// Filters by formation timestamp range (inclusive).
    pub fn formed_between(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.formed_from = from;
        self.formed_to = to;
        self
    }

    /// Returns true if a summary satisfies every criterion.
    ///
    /// Used by the in-memory store; the PostgreSQL store expresses the same
    /// predicate in SQL.
    pub fn matches(&self, summary: &ObservationSummary) -> bool {
        let record = &summary.record;
        if self.excluded.contains(&record.status) {
            return false;
        }
        if let Some(id) = self.id
            && record.id != id
        {
            return false;
        }
        if let Some(status) = self.status
            && record.status != status
        {
            return false;
        }
        if let Some(creator) = self.creator_id
            && record.creator_id != creator
        {
            return false;
        }
        if let Some(from) = self.formed_from
            && !record.formed_at.is_some_and(|at| at >= from)
        {
            return false;
        }
        if let Some(to) = self.formed_to
            && !record.formed_at.is_some_and(|at| at <= to)
        {
            return false;
        }
        true
    }

    /// Status names bound as the SQL exclusion array.
    pub fn excluded_names(&self) -> Vec<String> {
        self.excluded.iter().map(|s| s.as_str().to_string()).collect()
    }
}
