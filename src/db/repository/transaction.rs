use chrono::Utc;

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Payment Transaction Repository
// ============================================================================

pub struct TransactionRepository;

impl TransactionRepository {
    /// Insert a payment record. Generic executor so Book can write the
    /// appointment and its payment in one database transaction.
    pub async fn create<'e, E>(executor: E, create: CreateTransaction) -> AppResult<Transaction>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let row = sqlx::query(
            r#"
            INSERT INTO transactions (
                id, user_id, appointment_id, amount, payment_method,
                status, transaction_reference, notes,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING
                id, user_id, appointment_id, amount, payment_method,
                status, transaction_reference, notes,
                created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(&create.user_id)
        .bind(&create.appointment_id)
        .bind(create.amount)
        .bind(&create.payment_method)
        .bind(&create.status)
        .bind(&create.transaction_reference)
        .bind(&create.notes)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(Self::map_row(&row))
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            SELECT
                id, user_id, appointment_id, amount, payment_method,
                status, transaction_reference, notes,
                created_at, updated_at
            FROM transactions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| Self::map_row(&r)))
    }

    pub async fn find_by_appointment(
        pool: &SqlitePool,
        appointment_id: &str,
    ) -> AppResult<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            SELECT
                id, user_id, appointment_id, amount, payment_method,
                status, transaction_reference, notes,
                created_at, updated_at
            FROM transactions
            WHERE appointment_id = ?
            "#,
        )
        .bind(appointment_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| Self::map_row(&r)))
    }

    pub async fn list(
        pool: &SqlitePool,
        status: Option<&str>,
        payment_method: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Transaction>> {
        let mut sql = String::from(
            r#"
            SELECT
                id, user_id, appointment_id, amount, payment_method,
                status, transaction_reference, notes,
                created_at, updated_at
            FROM transactions
            WHERE 1 = 1
            "#,
        );
        if status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if payment_method.is_some() {
            sql.push_str(" AND payment_method = ?");
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query(&sql);
        if let Some(status) = status {
            query = query.bind(status);
        }
        if let Some(payment_method) = payment_method {
            query = query.bind(payment_method);
        }
        query = query.bind(limit).bind(offset);

        let rows = query.fetch_all(pool).await.map_err(AppError::Database)?;

        Ok(rows.iter().map(Self::map_row).collect())
    }

    pub async fn count(
        pool: &SqlitePool,
        status: Option<&str>,
        payment_method: Option<&str>,
    ) -> AppResult<i64> {
        let mut sql = String::from("SELECT COUNT(*) AS count FROM transactions WHERE 1 = 1");
        if status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if payment_method.is_some() {
            sql.push_str(" AND payment_method = ?");
        }

        let mut query = sqlx::query(&sql);
        if let Some(status) = status {
            query = query.bind(status);
        }
        if let Some(payment_method) = payment_method {
            query = query.bind(payment_method);
        }

        let row = query.fetch_one(pool).await.map_err(AppError::Database)?;

        Ok(row.get("count"))
    }

    /// Partial update: absent fields keep their stored values.
    pub async fn update(
        pool: &SqlitePool,
        id: &str,
        update: UpdateTransaction,
    ) -> AppResult<Option<Transaction>> {
        let Some(existing) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let now = Utc::now().naive_utc();

        let row = sqlx::query(
            r#"
            UPDATE transactions
            SET
                amount = ?,
                payment_method = ?,
                status = ?,
                transaction_reference = ?,
                notes = ?,
                updated_at = ?
            WHERE id = ?
            RETURNING
                id, user_id, appointment_id, amount, payment_method,
                status, transaction_reference, notes,
                created_at, updated_at
            "#,
        )
        .bind(update.amount.unwrap_or(existing.amount))
        .bind(update.payment_method.unwrap_or(existing.payment_method))
        .bind(update.status.unwrap_or(existing.status))
        .bind(update.transaction_reference.or(existing.transaction_reference))
        .bind(update.notes.or(existing.notes))
        .bind(now)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(Some(Self::map_row(&row)))
    }

    pub async fn count_by_status(pool: &SqlitePool, status: &str) -> AppResult<i64> {
        Self::count(pool, Some(status), None).await
    }

    fn map_row(row: &SqliteRow) -> Transaction {
        Transaction {
            id: row.get("id"),
            user_id: row.get("user_id"),
            appointment_id: row.get("appointment_id"),
            amount: row.get("amount"),
            payment_method: row.get("payment_method"),
            status: row.get("status"),
            transaction_reference: row.get("transaction_reference"),
            notes: row.get("notes"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}
