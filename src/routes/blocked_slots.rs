use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::db::models::{BlockedSlot, CreateBlockedSlot};
use crate::db::BlockedSlotRepository;
use crate::error::{AppError, AppResult};
use crate::routes::auth::AdminUser;
use crate::routes::ApiResponse;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_blocked_slots).post(create_blocked_slot))
        .route("/:id", axum::routing::delete(delete_blocked_slot))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub date: Option<NaiveDate>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_blocked_slots(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<Vec<BlockedSlot>>>> {
    let blocks = BlockedSlotRepository::list(&state.db, query.date).await?;

    Ok(Json(ApiResponse::ok(
        "Blocked slots retrieved successfully",
        blocks,
    )))
}

/// Create a block by hand: either a whole date or a partial interval. A
/// partial block needs both bounds.
async fn create_blocked_slot(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Json(request): Json<CreateBlockedSlot>,
) -> AppResult<Json<ApiResponse<BlockedSlot>>> {
    let block = if request.is_full_day {
        BlockedSlotRepository::create_full_day(
            &state.db,
            request.blocked_date,
            request.reason.as_deref().unwrap_or("Blocked by admin"),
        )
        .await?
    } else {
        // Validate the bounds before persisting so junk times never reach
        // the slot arithmetic.
        let (Some(start), Some(end)) = (&request.start_time, &request.end_time) else {
            return Err(AppError::Validation(
                "A partial block requires start_time and end_time".to_string(),
            ));
        };
        crate::services::slots::parse_clock_minutes(start)?;
        crate::services::slots::parse_clock_minutes(end)?;
        BlockedSlotRepository::create(&state.db, request).await?
    };

    Ok(Json(ApiResponse::ok(
        "Blocked slot created successfully",
        block,
    )))
}

/// Explicit administrative unblock; the engine never removes blocks itself.
async fn delete_blocked_slot(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    if !BlockedSlotRepository::delete(&state.db, &id).await? {
        return Err(AppError::NotFound("Blocked slot not found".to_string()));
    }

    Ok(Json(ApiResponse {
        success: true,
        message: "Blocked slot deleted successfully".to_string(),
        data: None,
    }))
}
