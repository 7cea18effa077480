use chrono::Utc;

use sqlx::Row;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// User Repository
// ============================================================================

pub struct UserRepository;

impl UserRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, mobile, email, password_hash, role, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| User {
            id: r.get("id"),
            name: r.get("name"),
            mobile: r.get("mobile"),
            email: r.get("email"),
            password_hash: r.get("password_hash"),
            role: r.get("role"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, mobile, email, password_hash, role, created_at, updated_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| User {
            id: r.get("id"),
            name: r.get("name"),
            mobile: r.get("mobile"),
            email: r.get("email"),
            password_hash: r.get("password_hash"),
            role: r.get("role"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    pub async fn find_by_mobile(pool: &SqlitePool, mobile: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, mobile, email, password_hash, role, created_at, updated_at
            FROM users
            WHERE mobile = ?
            "#,
        )
        .bind(mobile)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| User {
            id: r.get("id"),
            name: r.get("name"),
            mobile: r.get("mobile"),
            email: r.get("email"),
            password_hash: r.get("password_hash"),
            role: r.get("role"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    pub async fn create(pool: &SqlitePool, create: CreateUser) -> AppResult<User> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let row = sqlx::query(
            r#"
            INSERT INTO users (id, name, mobile, email, password_hash, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, name, mobile, email, password_hash, role, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(&create.name)
        .bind(&create.mobile)
        .bind(&create.email)
        .bind(&create.password_hash)
        .bind(create.role)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(User {
            id: row.get("id"),
            name: row.get("name"),
            mobile: row.get("mobile"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            role: row.get("role"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    /// Booking requests identify patients by mobile number; reuse the
    /// existing user when one exists, otherwise register a bare record.
    pub async fn find_or_create_by_mobile(
        pool: &SqlitePool,
        name: &str,
        mobile: &str,
    ) -> AppResult<User> {
        if let Some(user) = Self::find_by_mobile(pool, mobile).await? {
            return Ok(user);
        }

        Self::create(
            pool,
            CreateUser {
                name: name.to_string(),
                mobile: Some(mobile.to_string()),
                email: None,
                password_hash: None,
                role: UserRole::User,
            },
        )
        .await
    }

    pub async fn count(pool: &SqlitePool) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM users")
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(row.get("count"))
    }
}
