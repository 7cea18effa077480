use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::models::{CreateTransaction, Transaction, UpdateTransaction};
use crate::db::{AppointmentRepository, TransactionRepository, UserRepository};
use crate::error::{AppError, AppResult};
use crate::routes::{resolve_page, ApiResponse, Paginated};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_transactions).post(create_transaction))
        .route("/:id", get(get_transaction).put(update_transaction))
        .route("/:id/invoice", get(get_invoice))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub appointment_id: String,
    pub amount: f64,
    pub payment_method: String,
    pub status: Option<String>,
    pub transaction_reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub payment_method: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Invoice as a structured document; rendering is the caller's concern.
#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub invoice_number: String,
    pub date: String,
    pub status: String,
    pub patient: InvoicePatient,
    pub booking: InvoiceBooking,
    pub payment: InvoicePayment,
}

#[derive(Debug, Serialize)]
pub struct InvoicePatient {
    pub name: String,
    pub email: Option<String>,
    pub mobile: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceBooking {
    pub appointment_id: String,
    pub date: String,
    pub time: String,
    pub duration_minutes: i64,
    pub status: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InvoicePayment {
    pub description: String,
    pub method: String,
    pub amount: f64,
    pub total: f64,
}

// ============================================================================
// Handlers
// ============================================================================

/// Record a payment against an appointment. One payment record per
/// appointment; a duplicate is an expected rejection, not a fault.
async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateTransactionRequest>,
) -> AppResult<Json<ApiResponse<Transaction>>> {
    let appointment = AppointmentRepository::find_by_id(&state.db, &request.appointment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))?;

    if TransactionRepository::find_by_appointment(&state.db, &appointment.id)
        .await?
        .is_some()
    {
        return Ok(Json(ApiResponse::rejected(
            "Transaction already exists for this appointment",
        )));
    }

    let transaction = TransactionRepository::create(
        &state.db,
        CreateTransaction {
            user_id: appointment.user_id,
            appointment_id: request.appointment_id,
            amount: request.amount,
            payment_method: request.payment_method,
            status: request.status.unwrap_or_else(|| "pending".to_string()),
            transaction_reference: request.transaction_reference,
            notes: request.notes,
        },
    )
    .await?;

    Ok(Json(ApiResponse::ok(
        "Transaction created successfully",
        transaction,
    )))
}

async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<Paginated<Transaction>>>> {
    let (limit, offset, page) = resolve_page(query.page, query.limit);

    let rows = TransactionRepository::list(
        &state.db,
        query.status.as_deref(),
        query.payment_method.as_deref(),
        limit,
        offset,
    )
    .await?;
    let total = TransactionRepository::count(
        &state.db,
        query.status.as_deref(),
        query.payment_method.as_deref(),
    )
    .await?;

    Ok(Json(ApiResponse::ok(
        "Transactions retrieved successfully",
        Paginated::new(rows, total, page, limit),
    )))
}

async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Transaction>>> {
    let transaction = TransactionRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))?;

    Ok(Json(ApiResponse::ok(
        "Transaction retrieved successfully",
        transaction,
    )))
}

async fn update_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateTransaction>,
) -> AppResult<Json<ApiResponse<Transaction>>> {
    let transaction = TransactionRepository::update(&state.db, &id, request)
        .await?
        .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))?;

    Ok(Json(ApiResponse::ok(
        "Transaction updated successfully",
        transaction,
    )))
}

/// Assemble the invoice document for a payment: patient, booking summary
/// and the payment line.
async fn get_invoice(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<InvoiceResponse>>> {
    let transaction = TransactionRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))?;

    let appointment = AppointmentRepository::find_by_id(&state.db, &transaction.appointment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))?;

    let user = UserRepository::find_by_id(&state.db, &appointment.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    // Short numeric suffix of the uuid keeps the familiar INV-XXXXX shape.
    let suffix: String = transaction
        .id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(5)
        .collect::<String>()
        .to_uppercase();

    let invoice = InvoiceResponse {
        invoice_number: format!("INV-{}", suffix),
        date: transaction.created_at.date().to_string(),
        status: transaction.status.to_uppercase(),
        patient: InvoicePatient {
            name: user.name,
            email: user.email,
            mobile: user.mobile,
        },
        booking: InvoiceBooking {
            appointment_id: appointment.id,
            date: appointment.appointment_date.to_string(),
            time: appointment.appointment_time,
            duration_minutes: appointment.duration,
            status: appointment.status.as_str().to_string(),
            description: appointment.description,
        },
        payment: InvoicePayment {
            description: "Consultation Fee".to_string(),
            method: transaction.payment_method.clone(),
            amount: transaction.amount,
            total: transaction.amount,
        },
    };

    Ok(Json(ApiResponse::ok(
        "Invoice generated successfully",
        invoice,
    )))
}
