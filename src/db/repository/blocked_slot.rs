use chrono::{NaiveDate, Utc};

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Blocked Slot Repository
// ============================================================================

pub struct BlockedSlotRepository;

impl BlockedSlotRepository {
    pub async fn find_full_day(
        pool: &SqlitePool,
        date: NaiveDate,
    ) -> AppResult<Option<BlockedSlot>> {
        let row = sqlx::query(
            r#"
            SELECT
                id, blocked_date, is_full_day, start_time, end_time, reason,
                created_at, updated_at
            FROM blocked_slots
            WHERE blocked_date = ? AND is_full_day = TRUE
            "#,
        )
        .bind(date)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| Self::map_row(&r)))
    }

    pub async fn find_partial(pool: &SqlitePool, date: NaiveDate) -> AppResult<Vec<BlockedSlot>> {
        let rows = sqlx::query(
            r#"
            SELECT
                id, blocked_date, is_full_day, start_time, end_time, reason,
                created_at, updated_at
            FROM blocked_slots
            WHERE blocked_date = ? AND is_full_day = FALSE
            "#,
        )
        .bind(date)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows.iter().map(Self::map_row).collect())
    }

    /// Find-or-create for the full-day marker. The partial unique index on
    /// `blocked_date WHERE is_full_day` makes the insert a no-op when a
    /// concurrent reconciliation got there first.
    pub async fn create_full_day(
        pool: &SqlitePool,
        date: NaiveDate,
        reason: &str,
    ) -> AppResult<BlockedSlot> {
        if let Some(existing) = Self::find_full_day(pool, date).await? {
            return Ok(existing);
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO blocked_slots (
                id, blocked_date, is_full_day, start_time, end_time, reason,
                created_at, updated_at
            )
            VALUES (?, ?, TRUE, NULL, NULL, ?, ?, ?)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(date)
        .bind(reason)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        // Re-read so the caller always gets the persisted row, whichever
        // writer won the insert.
        Self::find_full_day(pool, date)
            .await?
            .ok_or_else(|| AppError::NotFound("Full-day block not found after insert".to_string()))
    }

    pub async fn create(pool: &SqlitePool, create: CreateBlockedSlot) -> AppResult<BlockedSlot> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let row = sqlx::query(
            r#"
            INSERT INTO blocked_slots (
                id, blocked_date, is_full_day, start_time, end_time, reason,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING
                id, blocked_date, is_full_day, start_time, end_time, reason,
                created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(create.blocked_date)
        .bind(create.is_full_day)
        .bind(&create.start_time)
        .bind(&create.end_time)
        .bind(&create.reason)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(Self::map_row(&row))
    }

    pub async fn list(pool: &SqlitePool, date: Option<NaiveDate>) -> AppResult<Vec<BlockedSlot>> {
        let rows = match date {
            Some(date) => sqlx::query(
                r#"
                SELECT
                    id, blocked_date, is_full_day, start_time, end_time, reason,
                    created_at, updated_at
                FROM blocked_slots
                WHERE blocked_date = ?
                ORDER BY blocked_date ASC, is_full_day DESC
                "#,
            )
            .bind(date)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)?,
            None => sqlx::query(
                r#"
                SELECT
                    id, blocked_date, is_full_day, start_time, end_time, reason,
                    created_at, updated_at
                FROM blocked_slots
                ORDER BY blocked_date ASC, is_full_day DESC
                "#,
            )
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)?,
        };

        Ok(rows.iter().map(Self::map_row).collect())
    }

    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM blocked_slots WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    fn map_row(row: &SqliteRow) -> BlockedSlot {
        BlockedSlot {
            id: row.get("id"),
            blocked_date: row.get("blocked_date"),
            is_full_day: row.get("is_full_day"),
            start_time: row.get("start_time"),
            end_time: row.get("end_time"),
            reason: row.get("reason"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}
