use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, State},
    http::request::Parts,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::models::User;
use crate::db::{AppointmentRepository, TransactionRepository, UserRepository};
use crate::error::{AppError, AppResult};
use crate::services::auth::AuthService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/profile", get(profile))
        .route("/dashboard", get(dashboard))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub mobile: Option<String>,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub total_users: i64,
    pub total_appointments: i64,
    pub appointments_today: i64,
    pub pending_transactions: i64,
}

// ============================================================================
// Handlers
// ============================================================================

async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<Json<AuthResponse>> {
    let (user, token) = AuthService::register(
        &state.db,
        &state.config,
        &request.name,
        request.mobile,
        &request.email,
        &request.password,
    )
    .await?;

    Ok(Json(AuthResponse {
        id: user.id,
        name: user.name,
        email: user.email,
        token,
    }))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let (user, token) =
        AuthService::login(&state.db, &state.config, &request.email, &request.password).await?;

    Ok(Json(AuthResponse {
        id: user.id,
        name: user.name,
        email: user.email,
        token,
    }))
}

/// Logged-in user's own record, password hash excluded by serialization.
async fn profile(AuthUser(user): AuthUser) -> AppResult<Json<User>> {
    Ok(Json(user))
}

/// Summary counts for the admin dashboard.
async fn dashboard(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<DashboardResponse>> {
    let today = Utc::now().date_naive();

    Ok(Json(DashboardResponse {
        total_users: UserRepository::count(&state.db).await?,
        total_appointments: AppointmentRepository::count_all(&state.db).await?,
        appointments_today: AppointmentRepository::count_on(&state.db, today).await?,
        pending_transactions: TransactionRepository::count_by_status(&state.db, "pending").await?,
    }))
}

// ============================================================================
// Extractors
// ============================================================================

/// Extractor that authenticates the request from its bearer token.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Extract Authorization header (Bearer token)
        let auth_header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                tracing::debug!("Missing or invalid Authorization header");
                AppError::Unauthorized
            })?;

        if !auth_header.to_ascii_lowercase().starts_with("bearer ") {
            tracing::debug!("Authorization header doesn't start with 'Bearer '");
            return Err(AppError::Unauthorized);
        }

        let token = auth_header[7..].trim();
        if token.is_empty() {
            return Err(AppError::Unauthorized);
        }

        let user = AuthService::user_from_token(&state.db, &state.config, token)
            .await
            .map_err(|e| {
                tracing::debug!("Failed to resolve user from token: {:?}", e);
                e
            })?;

        Ok(AuthUser(user))
    }
}

/// Extractor for admin-only endpoints; rejects non-admin users.
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            tracing::warn!("User {} attempted to access an admin endpoint", user.id);
            return Err(AppError::Forbidden);
        }

        Ok(AdminUser(user))
    }
}
