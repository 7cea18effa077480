use chrono::Utc;

use sqlx::Row;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Availability Repository
// ============================================================================

pub struct AvailabilityRepository;

impl AvailabilityRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Availability>> {
        let row = sqlx::query(
            r#"
            SELECT
                id, day_of_week,
                morning_start_time, morning_end_time,
                evening_start_time, evening_end_time,
                slot_duration, is_active,
                created_at, updated_at
            FROM availability
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| Availability {
            id: r.get("id"),
            day_of_week: r.get("day_of_week"),
            morning_start_time: r.get("morning_start_time"),
            morning_end_time: r.get("morning_end_time"),
            evening_start_time: r.get("evening_start_time"),
            evening_end_time: r.get("evening_end_time"),
            slot_duration: r.get("slot_duration"),
            is_active: r.get("is_active"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    pub async fn find_by_day(
        pool: &SqlitePool,
        day: DayOfWeek,
    ) -> AppResult<Option<Availability>> {
        let row = sqlx::query(
            r#"
            SELECT
                id, day_of_week,
                morning_start_time, morning_end_time,
                evening_start_time, evening_end_time,
                slot_duration, is_active,
                created_at, updated_at
            FROM availability
            WHERE day_of_week = ?
            "#,
        )
        .bind(day)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| Availability {
            id: r.get("id"),
            day_of_week: r.get("day_of_week"),
            morning_start_time: r.get("morning_start_time"),
            morning_end_time: r.get("morning_end_time"),
            evening_start_time: r.get("evening_start_time"),
            evening_end_time: r.get("evening_end_time"),
            slot_duration: r.get("slot_duration"),
            is_active: r.get("is_active"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    /// The scheduling engine only ever consults the active template for a day.
    pub async fn find_active_by_day(
        pool: &SqlitePool,
        day: DayOfWeek,
    ) -> AppResult<Option<Availability>> {
        let row = sqlx::query(
            r#"
            SELECT
                id, day_of_week,
                morning_start_time, morning_end_time,
                evening_start_time, evening_end_time,
                slot_duration, is_active,
                created_at, updated_at
            FROM availability
            WHERE day_of_week = ? AND is_active = TRUE
            "#,
        )
        .bind(day)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| Availability {
            id: r.get("id"),
            day_of_week: r.get("day_of_week"),
            morning_start_time: r.get("morning_start_time"),
            morning_end_time: r.get("morning_end_time"),
            evening_start_time: r.get("evening_start_time"),
            evening_end_time: r.get("evening_end_time"),
            slot_duration: r.get("slot_duration"),
            is_active: r.get("is_active"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    pub async fn list(
        pool: &SqlitePool,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Availability>> {
        let rows = sqlx::query(
            r#"
            SELECT
                id, day_of_week,
                morning_start_time, morning_end_time,
                evening_start_time, evening_end_time,
                slot_duration, is_active,
                created_at, updated_at
            FROM availability
            ORDER BY created_at ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| Availability {
                id: r.get("id"),
                day_of_week: r.get("day_of_week"),
                morning_start_time: r.get("morning_start_time"),
                morning_end_time: r.get("morning_end_time"),
                evening_start_time: r.get("evening_start_time"),
                evening_end_time: r.get("evening_end_time"),
                slot_duration: r.get("slot_duration"),
                is_active: r.get("is_active"),
                created_at: r.get("created_at"),
                updated_at: r.get("updated_at"),
            })
            .collect())
    }

    pub async fn count(pool: &SqlitePool) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM availability")
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(row.get("count"))
    }

    pub async fn create(
        pool: &SqlitePool,
        create: CreateAvailability,
    ) -> AppResult<Availability> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let row = sqlx::query(
            r#"
            INSERT INTO availability (
                id, day_of_week,
                morning_start_time, morning_end_time,
                evening_start_time, evening_end_time,
                slot_duration, is_active,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING
                id, day_of_week,
                morning_start_time, morning_end_time,
                evening_start_time, evening_end_time,
                slot_duration, is_active,
                created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(create.day_of_week)
        .bind(&create.morning_start_time)
        .bind(&create.morning_end_time)
        .bind(&create.evening_start_time)
        .bind(&create.evening_end_time)
        .bind(create.slot_duration)
        .bind(create.is_active.unwrap_or(true))
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(Availability {
            id: row.get("id"),
            day_of_week: row.get("day_of_week"),
            morning_start_time: row.get("morning_start_time"),
            morning_end_time: row.get("morning_end_time"),
            evening_start_time: row.get("evening_start_time"),
            evening_end_time: row.get("evening_end_time"),
            slot_duration: row.get("slot_duration"),
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    /// Partial update: absent fields keep their stored values.
    pub async fn update(
        pool: &SqlitePool,
        id: &str,
        update: UpdateAvailability,
    ) -> AppResult<Option<Availability>> {
        let Some(existing) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let now = Utc::now().naive_utc();

        let row = sqlx::query(
            r#"
            UPDATE availability
            SET
                day_of_week = ?,
                morning_start_time = ?,
                morning_end_time = ?,
                evening_start_time = ?,
                evening_end_time = ?,
                slot_duration = ?,
                is_active = ?,
                updated_at = ?
            WHERE id = ?
            RETURNING
                id, day_of_week,
                morning_start_time, morning_end_time,
                evening_start_time, evening_end_time,
                slot_duration, is_active,
                created_at, updated_at
            "#,
        )
        .bind(update.day_of_week.unwrap_or(existing.day_of_week))
        .bind(update.morning_start_time.or(existing.morning_start_time))
        .bind(update.morning_end_time.or(existing.morning_end_time))
        .bind(update.evening_start_time.or(existing.evening_start_time))
        .bind(update.evening_end_time.or(existing.evening_end_time))
        .bind(update.slot_duration.unwrap_or(existing.slot_duration))
        .bind(update.is_active.unwrap_or(existing.is_active))
        .bind(now)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(Some(Availability {
            id: row.get("id"),
            day_of_week: row.get("day_of_week"),
            morning_start_time: row.get("morning_start_time"),
            morning_end_time: row.get("morning_end_time"),
            evening_start_time: row.get("evening_start_time"),
            evening_end_time: row.get("evening_end_time"),
            slot_duration: row.get("slot_duration"),
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }

    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM availability WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
