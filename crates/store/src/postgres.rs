use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::{
    Coordinates, DayId, ItemRecord, ItemWithEvent, ObservationId, ObservationQuery,
    ObservationRecord, ObservationStatus, ObservationSummary, ReferencedEvent, Result, StoreError,
    UserId,
    store::{DraftTransaction, ItemPatch, ObservationFilter, ObservationPatch, ObservationStore},
};

const OBSERVATION_COLUMNS: &str = "id, creator_id, moderator_id, status, comment, \
     result_distance_km, created_at, formed_at, completed_at";

/// PostgreSQL-backed observation store implementation.
#[derive(Clone)]
pub struct PostgresObservationStore {
    pool: PgPool,
}

impl PostgresObservationStore {
    /// Creates a new PostgreSQL observation store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn row_to_observation(row: &PgRow) -> Result<ObservationRecord> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<ObservationStatus>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

    Ok(ObservationRecord {
        id: ObservationId::new(row.try_get("id")?),
        creator_id: UserId::new(row.try_get("creator_id")?),
        moderator_id: row.try_get::<Option<i64>, _>("moderator_id")?.map(UserId::new),
        status,
        comment: row.try_get("comment")?,
        result_distance_km: row.try_get("result_distance_km")?,
        created_at: row.try_get("created_at")?,
        formed_at: row.try_get("formed_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

fn row_to_item_with_event(row: &PgRow) -> Result<ItemWithEvent> {
    let quantity: i32 = row.try_get("quantity")?;
    let quantity = u32::try_from(quantity)
        .map_err(|_| StoreError::Corrupt(format!("negative item quantity {quantity}")))?;

    let override_ra: Option<f64> = row.try_get("override_ra")?;
    let override_dec: Option<f64> = row.try_get("override_dec")?;
    let day_id = DayId::new(row.try_get("day_id")?);

    let item = ItemRecord {
        observation_id: ObservationId::new(row.try_get("observation_id")?),
        day_id,
        quantity,
        sort_order: row.try_get("sort_order")?,
        is_primary: row.try_get("is_primary")?,
        note: row.try_get("note")?,
        coordinates: override_ra
            .zip(override_dec)
            .map(|(ra, dec)| Coordinates::new(ra, dec)),
    };
    let event = ReferencedEvent {
        id: day_id,
        date_label: row.try_get("date_label")?,
        baseline: Coordinates::new(row.try_get("baseline_ra")?, row.try_get("baseline_dec")?),
        is_deleted: row.try_get("is_deleted")?,
    };

    Ok(ItemWithEvent { item, event })
}

fn quantity_to_db(quantity: u32) -> Result<i32> {
    i32::try_from(quantity)
        .map_err(|_| StoreError::OutOfRange(format!("item quantity {quantity}")))
}

/// Maps a unique violation on `constraint` to [`StoreError::Conflict`].
fn conflict_on(constraint: &'static str, message: String) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.constraint() == Some(constraint)
        {
            return StoreError::Conflict(message);
        }
        StoreError::Database(e)
    }
}

#[async_trait]
impl ObservationStore for PostgresObservationStore {
    async fn begin_draft(&self, creator_id: UserId) -> Result<Box<dyn DraftTransaction>> {
        let mut tx = self.pool.begin().await?;

        // Serializes draft transactions of one creator until commit/rollback.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(creator_id.as_i64())
            .execute(&mut *tx)
            .await?;

        tracing::trace!(creator_id = %creator_id, "draft transaction started");
        Ok(Box::new(PgDraftTransaction { tx }))
    }

    async fn find_draft_by_creator(
        &self,
        creator_id: UserId,
    ) -> Result<Option<ObservationRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {OBSERVATION_COLUMNS} FROM observations \
             WHERE creator_id = $1 AND status = 'draft'"
        ))
        .bind(creator_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_observation).transpose()
    }

    async fn find_observation(&self, id: ObservationId) -> Result<Option<ObservationRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {OBSERVATION_COLUMNS} FROM observations WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_observation).transpose()
    }

    async fn conditional_update(
        &self,
        filter: &ObservationFilter,
        patch: &ObservationPatch,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE observations SET
                status = COALESCE($4, status),
                moderator_id = COALESCE($5, moderator_id),
                comment = COALESCE($6, comment),
                formed_at = COALESCE($7, formed_at),
                completed_at = COALESCE($8, completed_at),
                result_distance_km = CASE
                    WHEN $9 THEN NULL
                    ELSE COALESCE($10, result_distance_km)
                END
            WHERE id = $1
              AND status = ANY($2)
              AND ($3::BIGINT IS NULL OR creator_id = $3)
            "#,
        )
        .bind(filter.id.as_i64())
        .bind(filter.status_names())
        .bind(filter.creator_id.map(|id| id.as_i64()))
        .bind(patch.status.map(|s| s.as_str()))
        .bind(patch.moderator_id.map(|id| id.as_i64()))
        .bind(patch.comment.as_deref())
        .bind(patch.formed_at)
        .bind(patch.completed_at)
        .bind(patch.clear_result)
        .bind(patch.result_distance_km)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn update_item(
        &self,
        guard: &ObservationFilter,
        day_id: DayId,
        patch: &ItemPatch,
    ) -> Result<u64> {
        let quantity = patch.quantity.map(quantity_to_db).transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE observation_items i SET
                quantity = COALESCE($5, i.quantity),
                sort_order = COALESCE($6, i.sort_order),
                is_primary = COALESCE($7, i.is_primary),
                note = COALESCE($8, i.note),
                override_ra = COALESCE($9, i.override_ra),
                override_dec = COALESCE($10, i.override_dec)
            FROM observations o
            WHERE i.observation_id = $1
              AND i.day_id = $2
              AND o.id = i.observation_id
              AND o.status = ANY($3)
              AND ($4::BIGINT IS NULL OR o.creator_id = $4)
            "#,
        )
        .bind(guard.id.as_i64())
        .bind(day_id.as_i64())
        .bind(guard.status_names())
        .bind(guard.creator_id.map(|id| id.as_i64()))
        .bind(quantity)
        .bind(patch.sort_order)
        .bind(patch.is_primary)
        .bind(patch.note.as_deref())
        .bind(patch.coordinates.map(|c| c.ra))
        .bind(patch.coordinates.map(|c| c.dec))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_item(&self, guard: &ObservationFilter, day_id: DayId) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM observation_items i
            USING observations o
            WHERE i.observation_id = $1
              AND i.day_id = $2
              AND o.id = i.observation_id
              AND o.status = ANY($3)
              AND ($4::BIGINT IS NULL OR o.creator_id = $4)
            "#,
        )
        .bind(guard.id.as_i64())
        .bind(day_id.as_i64())
        .bind(guard.status_names())
        .bind(guard.creator_id.map(|id| id.as_i64()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn fetch_items_with_events(&self, id: ObservationId) -> Result<Vec<ItemWithEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT i.observation_id, i.day_id, i.quantity, i.sort_order, i.is_primary, i.note,
                   i.override_ra, i.override_dec,
                   d.date_label, d.baseline_ra, d.baseline_dec, d.is_deleted
            FROM observation_items i
            JOIN astro_days d ON d.id = i.day_id
            WHERE i.observation_id = $1
            ORDER BY i.sort_order ASC, i.day_id ASC
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_item_with_event).collect()
    }

    async fn count_items(&self, id: ObservationId) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM observation_items WHERE observation_id = $1")
                .bind(id.as_i64())
                .fetch_one(&self.pool)
                .await?;

        Ok(count.max(0) as u64)
    }

    async fn list_observations(
        &self,
        query: &ObservationQuery,
    ) -> Result<Vec<ObservationSummary>> {
        let mut sql = String::from(
            "SELECT o.id, o.creator_id, o.moderator_id, o.status, o.comment, \
             o.result_distance_km, o.created_at, o.formed_at, o.completed_at, \
             c.login AS creator_login, m.login AS moderator_login \
             FROM observations o \
             JOIN users c ON c.id = o.creator_id \
             LEFT JOIN users m ON m.id = o.moderator_id \
             WHERE NOT (o.status = ANY($1))",
        );
        let mut param_count = 1;

        // Build dynamic query
        if query.id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND o.id = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND o.status = ${param_count}"));
        }
        if query.creator_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND o.creator_id = ${param_count}"));
        }
        if query.formed_from.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND o.formed_at >= ${param_count}"));
        }
        if query.formed_to.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND o.formed_at <= ${param_count}"));
        }

        sql.push_str(" ORDER BY o.id DESC");

        let mut sqlx_query = sqlx::query(&sql).bind(query.excluded_names());

        if let Some(id) = query.id {
            sqlx_query = sqlx_query.bind(id.as_i64());
        }
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(creator_id) = query.creator_id {
            sqlx_query = sqlx_query.bind(creator_id.as_i64());
        }
        if let Some(from) = query.formed_from {
            sqlx_query = sqlx_query.bind(from);
        }
        if let Some(to) = query.formed_to {
            sqlx_query = sqlx_query.bind(to);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<ObservationSummary> {
                Ok(ObservationSummary {
                    record: row_to_observation(row)?,
                    creator_login: row.try_get("creator_login")?,
                    moderator_login: row.try_get("moderator_login")?,
                })
            })
            .collect()
    }
}

/// Draft transaction over one pooled connection, holding the creator's
/// advisory lock. Dropping it rolls back.
struct PgDraftTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl DraftTransaction for PgDraftTransaction {
    async fn event_exists(&mut self, day_id: DayId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM astro_days WHERE id = $1 AND NOT is_deleted)",
        )
        .bind(day_id.as_i64())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    /// Locks the draft row until commit, so submit and delete wait for the
    /// item writes of this transaction.
    async fn find_draft(&mut self, creator_id: UserId) -> Result<Option<ObservationRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {OBSERVATION_COLUMNS} FROM observations \
             WHERE creator_id = $1 AND status = 'draft' FOR UPDATE"
        ))
        .bind(creator_id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_observation).transpose()
    }

    async fn create_draft(
        &mut self,
        creator_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Result<ObservationRecord> {
        let row = sqlx::query(&format!(
            "INSERT INTO observations (creator_id, status, created_at) \
             VALUES ($1, 'draft', $2) RETURNING {OBSERVATION_COLUMNS}"
        ))
        .bind(creator_id.as_i64())
        .bind(created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(conflict_on(
            "observations_one_draft_per_creator",
            format!("creator {creator_id} already has a draft"),
        ))?;

        row_to_observation(&row)
    }

    async fn increment_item(
        &mut self,
        observation_id: ObservationId,
        day_id: DayId,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE observation_items i SET quantity = i.quantity + 1
            FROM observations o
            WHERE i.observation_id = $1 AND i.day_id = $2
              AND o.id = i.observation_id AND o.status = 'draft'
            "#,
        )
        .bind(observation_id.as_i64())
        .bind(day_id.as_i64())
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_item(&mut self, item: &ItemRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO observation_items
                (observation_id, day_id, quantity, sort_order, is_primary, note, override_ra, override_dec)
            SELECT o.id, $2, $3, $4, $5, $6, $7::DOUBLE PRECISION, $8::DOUBLE PRECISION
            FROM observations o
            WHERE o.id = $1 AND o.status = 'draft'
            "#,
        )
        .bind(item.observation_id.as_i64())
        .bind(item.day_id.as_i64())
        .bind(quantity_to_db(item.quantity)?)
        .bind(item.sort_order)
        .bind(item.is_primary)
        .bind(item.note.as_deref())
        .bind(item.coordinates.map(|c| c.ra))
        .bind(item.coordinates.map(|c| c.dec))
        .execute(&mut *self.tx)
        .await
        .map_err(conflict_on(
            "observation_items_pkey",
            format!(
                "item ({}, {}) already exists",
                item.observation_id, item.day_id
            ),
        ))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "observation {} is not an open draft",
                item.observation_id
            )));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let PgDraftTransaction { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}
