use chrono::{NaiveDate, Utc};

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Appointment Repository
// ============================================================================

pub struct AppointmentRepository;

impl AppointmentRepository {
    /// Insert a new appointment. Takes a generic executor so the booking
    /// flow can run it inside the same transaction as the payment record.
    pub async fn create<'e, E>(executor: E, create: CreateAppointment) -> AppResult<Appointment>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let row = sqlx::query(
            r#"
            INSERT INTO appointments (
                id, user_id, appointment_date, appointment_time,
                status, description, duration,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING
                id, user_id, appointment_date, appointment_time,
                status, description, duration,
                created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(&create.user_id)
        .bind(create.appointment_date)
        .bind(&create.appointment_time)
        .bind(AppointmentStatus::Pending)
        .bind(&create.description)
        .bind(create.duration)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(Self::map_row(&row))
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Appointment>> {
        let row = sqlx::query(
            r#"
            SELECT
                id, user_id, appointment_date, appointment_time,
                status, description, duration,
                created_at, updated_at
            FROM appointments
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| Self::map_row(&r)))
    }

    /// Exact-time collision lookup over active (pending/confirmed) rows.
    pub async fn find_active_at(
        pool: &SqlitePool,
        date: NaiveDate,
        time: &str,
    ) -> AppResult<Option<Appointment>> {
        let row = sqlx::query(
            r#"
            SELECT
                id, user_id, appointment_date, appointment_time,
                status, description, duration,
                created_at, updated_at
            FROM appointments
            WHERE appointment_date = ?
              AND appointment_time = ?
              AND status IN ('pending', 'confirmed')
            "#,
        )
        .bind(date)
        .bind(time)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| Self::map_row(&r)))
    }

    /// Same as [`find_active_at`] but ignoring one appointment id, so a
    /// reschedule doesn't collide with the slot it currently holds.
    pub async fn find_active_at_excluding(
        pool: &SqlitePool,
        date: NaiveDate,
        time: &str,
        exclude_id: &str,
    ) -> AppResult<Option<Appointment>> {
        let row = sqlx::query(
            r#"
            SELECT
                id, user_id, appointment_date, appointment_time,
                status, description, duration,
                created_at, updated_at
            FROM appointments
            WHERE appointment_date = ?
              AND appointment_time = ?
              AND status IN ('pending', 'confirmed')
              AND id != ?
            "#,
        )
        .bind(date)
        .bind(time)
        .bind(exclude_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| Self::map_row(&r)))
    }

    pub async fn count_active_on(pool: &SqlitePool, date: NaiveDate) -> AppResult<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS count
            FROM appointments
            WHERE appointment_date = ? AND status IN ('pending', 'confirmed')
            "#,
        )
        .bind(date)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.get("count"))
    }

    pub async fn count_on(pool: &SqlitePool, date: NaiveDate) -> AppResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM appointments WHERE appointment_date = ?",
        )
        .bind(date)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.get("count"))
    }

    pub async fn count_all(pool: &SqlitePool) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM appointments")
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(row.get("count"))
    }

    /// Booked start times for a date, active rows only.
    pub async fn list_active_times(pool: &SqlitePool, date: NaiveDate) -> AppResult<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT appointment_time
            FROM appointments
            WHERE appointment_date = ? AND status IN ('pending', 'confirmed')
            "#,
        )
        .bind(date)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| r.get("appointment_time"))
            .collect())
    }

    /// The reschedule flow targets the caller's most recently created
    /// appointment, by creation order.
    pub async fn find_latest_by_user(
        pool: &SqlitePool,
        user_id: &str,
    ) -> AppResult<Option<Appointment>> {
        let row = sqlx::query(
            r#"
            SELECT
                id, user_id, appointment_date, appointment_time,
                status, description, duration,
                created_at, updated_at
            FROM appointments
            WHERE user_id = ?
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| Self::map_row(&r)))
    }

    pub async fn update_schedule(
        pool: &SqlitePool,
        id: &str,
        date: NaiveDate,
        time: &str,
        status: AppointmentStatus,
    ) -> AppResult<Appointment> {
        let now = Utc::now().naive_utc();

        let row = sqlx::query(
            r#"
            UPDATE appointments
            SET
                appointment_date = ?,
                appointment_time = ?,
                status = ?,
                updated_at = ?
            WHERE id = ?
            RETURNING
                id, user_id, appointment_date, appointment_time,
                status, description, duration,
                created_at, updated_at
            "#,
        )
        .bind(date)
        .bind(time)
        .bind(status)
        .bind(now)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(Self::map_row(&row))
    }

    pub async fn update_status(
        pool: &SqlitePool,
        id: &str,
        status: AppointmentStatus,
    ) -> AppResult<Appointment> {
        let now = Utc::now().naive_utc();

        let row = sqlx::query(
            r#"
            UPDATE appointments
            SET status = ?, updated_at = ?
            WHERE id = ?
            RETURNING
                id, user_id, appointment_date, appointment_time,
                status, description, duration,
                created_at, updated_at
            "#,
        )
        .bind(status)
        .bind(now)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(Self::map_row(&row))
    }

    pub async fn find_with_details(
        pool: &SqlitePool,
        id: &str,
    ) -> AppResult<Option<AppointmentWithDetails>> {
        let row = sqlx::query(&Self::detailed_select(
            "LEFT JOIN",
            "WHERE a.id = ?",
            "",
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| Self::map_detailed_row(&r)))
    }

    /// Admin listing with optional date / status / payment-status filters.
    /// A payment-status filter requires a payment record, so the join on
    /// transactions becomes inner.
    pub async fn list_detailed(
        pool: &SqlitePool,
        date: Option<NaiveDate>,
        status: Option<AppointmentStatus>,
        payment_status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<AppointmentWithDetails>> {
        let join = if payment_status.is_some() {
            "INNER JOIN"
        } else {
            "LEFT JOIN"
        };

        let mut conditions = String::from("WHERE 1 = 1");
        if date.is_some() {
            conditions.push_str(" AND a.appointment_date = ?");
        }
        if status.is_some() {
            conditions.push_str(" AND a.status = ?");
        }
        if payment_status.is_some() {
            conditions.push_str(" AND t.status = ?");
        }

        let sql = Self::detailed_select(
            join,
            &conditions,
            "ORDER BY a.created_at DESC LIMIT ? OFFSET ?",
        );

        let mut query = sqlx::query(&sql);
        if let Some(date) = date {
            query = query.bind(date);
        }
        if let Some(status) = status {
            query = query.bind(status);
        }
        if let Some(payment_status) = payment_status {
            query = query.bind(payment_status);
        }
        query = query.bind(limit).bind(offset);

        let rows = query.fetch_all(pool).await.map_err(AppError::Database)?;

        Ok(rows.iter().map(Self::map_detailed_row).collect())
    }

    pub async fn count_detailed(
        pool: &SqlitePool,
        date: Option<NaiveDate>,
        status: Option<AppointmentStatus>,
        payment_status: Option<&str>,
    ) -> AppResult<i64> {
        let join = if payment_status.is_some() {
            "INNER JOIN"
        } else {
            "LEFT JOIN"
        };

        let mut sql = format!(
            "SELECT COUNT(*) AS count FROM appointments a {} transactions t ON t.appointment_id = a.id WHERE 1 = 1",
            join
        );
        if date.is_some() {
            sql.push_str(" AND a.appointment_date = ?");
        }
        if status.is_some() {
            sql.push_str(" AND a.status = ?");
        }
        if payment_status.is_some() {
            sql.push_str(" AND t.status = ?");
        }

        let mut query = sqlx::query(&sql);
        if let Some(date) = date {
            query = query.bind(date);
        }
        if let Some(status) = status {
            query = query.bind(status);
        }
        if let Some(payment_status) = payment_status {
            query = query.bind(payment_status);
        }

        let row = query.fetch_one(pool).await.map_err(AppError::Database)?;

        Ok(row.get("count"))
    }

    fn detailed_select(transaction_join: &str, conditions: &str, tail: &str) -> String {
        format!(
            r#"
            SELECT
                a.id, a.user_id, a.appointment_date, a.appointment_time,
                a.status, a.description, a.duration,
                a.created_at, a.updated_at,
                u.id AS user_row_id, u.name AS user_name, u.mobile AS user_mobile,
                u.email AS user_email, u.role AS user_role,
                u.created_at AS user_created_at, u.updated_at AS user_updated_at,
                t.id AS transaction_id, t.amount AS transaction_amount,
                t.payment_method AS transaction_payment_method,
                t.status AS transaction_status,
                t.transaction_reference AS transaction_reference,
                t.notes AS transaction_notes,
                t.created_at AS transaction_created_at,
                t.updated_at AS transaction_updated_at
            FROM appointments a
            LEFT JOIN users u ON u.id = a.user_id
            {} transactions t ON t.appointment_id = a.id
            {}
            {}
            "#,
            transaction_join, conditions, tail
        )
    }

    fn map_row(row: &SqliteRow) -> Appointment {
        Appointment {
            id: row.get("id"),
            user_id: row.get("user_id"),
            appointment_date: row.get("appointment_date"),
            appointment_time: row.get("appointment_time"),
            status: row.get("status"),
            description: row.get("description"),
            duration: row.get("duration"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    fn map_detailed_row(row: &SqliteRow) -> AppointmentWithDetails {
        let user = row
            .get::<Option<String>, _>("user_row_id")
            .map(|user_id| User {
                id: user_id,
                name: row.get("user_name"),
                mobile: row.get("user_mobile"),
                email: row.get("user_email"),
                password_hash: None,
                role: row.get("user_role"),
                created_at: row.get("user_created_at"),
                updated_at: row.get("user_updated_at"),
            });

        let transaction = row
            .get::<Option<String>, _>("transaction_id")
            .map(|transaction_id| Transaction {
                id: transaction_id,
                user_id: row.get("user_id"),
                appointment_id: row.get("id"),
                amount: row.get("transaction_amount"),
                payment_method: row.get("transaction_payment_method"),
                status: row.get("transaction_status"),
                transaction_reference: row.get("transaction_reference"),
                notes: row.get("transaction_notes"),
                created_at: row.get("transaction_created_at"),
                updated_at: row.get("transaction_updated_at"),
            });

        AppointmentWithDetails {
            appointment: Self::map_row(row),
            user,
            transaction,
        }
    }
}
