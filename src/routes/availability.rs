use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::db::models::{Availability, CreateAvailability, UpdateAvailability};
use crate::db::AvailabilityRepository;
use crate::error::{AppError, AppResult};
use crate::routes::auth::AdminUser;
use crate::routes::{resolve_page, ApiResponse, Paginated};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_availabilities).post(create_availability))
        .route(
            "/:id",
            get(get_availability)
                .put(update_availability)
                .delete(delete_availability),
        )
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create the weekly template for one weekday. At most one template per
/// weekday may exist.
async fn create_availability(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Json(request): Json<CreateAvailability>,
) -> AppResult<Json<ApiResponse<Availability>>> {
    if request.slot_duration <= 0 {
        return Err(AppError::Validation(
            "Slot duration must be positive".to_string(),
        ));
    }

    if AvailabilityRepository::find_by_day(&state.db, request.day_of_week)
        .await?
        .is_some()
    {
        return Err(AppError::BadRequest(format!(
            "Availability for {} already exists",
            request.day_of_week.as_str()
        )));
    }

    let availability = AvailabilityRepository::create(&state.db, request).await?;

    Ok(Json(ApiResponse::ok(
        "Availability created successfully",
        availability,
    )))
}

async fn list_availabilities(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<Paginated<Availability>>>> {
    let (limit, offset, page) = resolve_page(query.page, query.limit);

    let rows = AvailabilityRepository::list(&state.db, limit, offset).await?;
    let total = AvailabilityRepository::count(&state.db).await?;

    Ok(Json(ApiResponse::ok(
        "Availabilities retrieved successfully",
        Paginated::new(rows, total, page, limit),
    )))
}

async fn get_availability(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Availability>>> {
    let availability = AvailabilityRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Availability not found".to_string()))?;

    Ok(Json(ApiResponse::ok(
        "Availability retrieved successfully",
        availability,
    )))
}

async fn update_availability(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateAvailability>,
) -> AppResult<Json<ApiResponse<Availability>>> {
    if matches!(request.slot_duration, Some(d) if d <= 0) {
        return Err(AppError::Validation(
            "Slot duration must be positive".to_string(),
        ));
    }

    let availability = AvailabilityRepository::update(&state.db, &id, request)
        .await?
        .ok_or_else(|| AppError::NotFound("Availability not found".to_string()))?;

    Ok(Json(ApiResponse::ok(
        "Availability updated successfully",
        availability,
    )))
}

async fn delete_availability(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    if !AvailabilityRepository::delete(&state.db, &id).await? {
        return Err(AppError::NotFound("Availability not found".to_string()));
    }

    Ok(Json(ApiResponse {
        success: true,
        message: "Availability deleted successfully".to_string(),
        data: None,
    }))
}
