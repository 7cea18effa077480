use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::models::{Appointment, AppointmentStatus, AppointmentWithDetails, Transaction};
use crate::db::AppointmentRepository;
use crate::error::{AppError, AppResult};
use crate::routes::auth::AdminUser;
use crate::routes::{resolve_page, ApiResponse, Paginated};
use crate::services::booking::{BookingOutcome, BookingRequest, BookingService, RescheduleOutcome};
use crate::services::scheduling::{DaySchedule, SchedulingService};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        // Patient-facing endpoints
        .route("/", post(book_appointment).get(list_appointments))
        .route("/reschedule", post(reschedule_appointment))
        .route("/available-slots", post(available_slots))
        // Admin endpoints
        .route("/status", put(update_status))
        .route("/:id", get(appointment_details))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct BookAppointmentRequest {
    pub username: String,
    pub mobile: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub description: Option<String>,
    pub duration: i64,
    pub amount: f64,
    pub payment_method: Option<String>,
    /// Payment status reported by the gateway, defaults to pending.
    pub status: Option<String>,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookedData {
    pub appointment: Appointment,
    pub transaction: Transaction,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub user_id: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
}

#[derive(Debug, Deserialize)]
pub struct AvailableSlotsRequest {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
    pub payment_status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub appointment_id: String,
    pub status: AppointmentStatus,
}

// ============================================================================
// Handlers
// ============================================================================

/// Book: conflict guard, then appointment + payment persisted as one unit,
/// then full-day reconciliation. Rejections are business outcomes, not
/// errors.
async fn book_appointment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BookAppointmentRequest>,
) -> AppResult<Json<ApiResponse<BookedData>>> {
    let outcome = BookingService::book(
        &state.db,
        BookingRequest {
            username: request.username,
            mobile: request.mobile,
            appointment_date: request.appointment_date,
            appointment_time: request.appointment_time,
            description: request.description,
            duration: request.duration,
            amount: request.amount,
            payment_method: request.payment_method.unwrap_or_else(|| "Online".to_string()),
            payment_status: request.status,
            transaction_reference: request.transaction_id,
        },
    )
    .await?;

    match outcome {
        BookingOutcome::Booked {
            appointment,
            transaction,
        } => Ok(Json(ApiResponse::ok(
            "Appointment created successfully",
            BookedData {
                appointment,
                transaction,
            },
        ))),
        BookingOutcome::Rejected { reason } => Ok(Json(ApiResponse::rejected(&reason))),
    }
}

async fn reschedule_appointment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RescheduleRequest>,
) -> AppResult<Json<ApiResponse<Appointment>>> {
    let outcome = BookingService::reschedule_latest(
        &state.db,
        &request.user_id,
        request.appointment_date,
        &request.appointment_time,
    )
    .await?;

    match outcome {
        RescheduleOutcome::Rescheduled { appointment } => Ok(Json(ApiResponse::ok(
            "Appointment rescheduled successfully",
            appointment,
        ))),
        RescheduleOutcome::Rejected { reason } => Ok(Json(ApiResponse::rejected(&reason))),
    }
}

/// Per-slot availability for a date, split into morning and evening.
async fn available_slots(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AvailableSlotsRequest>,
) -> AppResult<Json<DaySchedule>> {
    let schedule = SchedulingService::available_slots(&state.db, request.date).await?;
    Ok(Json(schedule))
}

/// Admin listing with date / status / payment-status filters.
async fn list_appointments(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<Paginated<AppointmentWithDetails>>>> {
    let (limit, offset, page) = resolve_page(query.page, query.limit);

    let rows = AppointmentRepository::list_detailed(
        &state.db,
        query.date,
        query.status,
        query.payment_status.as_deref(),
        limit,
        offset,
    )
    .await?;
    let total = AppointmentRepository::count_detailed(
        &state.db,
        query.date,
        query.status,
        query.payment_status.as_deref(),
    )
    .await?;

    Ok(Json(ApiResponse::ok(
        "Appointments retrieved successfully",
        Paginated::new(rows, total, page, limit),
    )))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Json(request): Json<UpdateStatusRequest>,
) -> AppResult<Json<ApiResponse<Appointment>>> {
    let appointment =
        BookingService::update_status(&state.db, &request.appointment_id, request.status).await?;

    Ok(Json(ApiResponse::ok(
        "Appointment status updated successfully",
        appointment,
    )))
}

async fn appointment_details(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<AppointmentWithDetails>>> {
    let details = AppointmentRepository::find_with_details(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))?;

    Ok(Json(ApiResponse::ok(
        "Appointment details retrieved successfully",
        details,
    )))
}
