use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Payment Transaction Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub appointment_id: String,
    pub amount: f64,
    pub payment_method: String,
    pub status: String,
    pub transaction_reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransaction {
    pub user_id: String,
    pub appointment_id: String,
    pub amount: f64,
    pub payment_method: String,
    pub status: String,
    pub transaction_reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTransaction {
    pub amount: Option<f64>,
    pub payment_method: Option<String>,
    pub status: Option<String>,
    pub transaction_reference: Option<String>,
    pub notes: Option<String>,
}
