use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{Transaction, User};

// ============================================================================
// Appointment Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Rescheduled,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    /// Only pending and confirmed appointments occupy a slot.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Rescheduled => "rescheduled",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub user_id: String,
    pub appointment_date: NaiveDate,
    /// Start of the booked slot, normalized to `HH:MM:SS`.
    pub appointment_time: String,
    pub status: AppointmentStatus,
    pub description: Option<String>,
    pub duration: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointment {
    pub user_id: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub description: Option<String>,
    pub duration: i64,
}

/// Admin listing row: appointment joined with its user and payment record.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentWithDetails {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub user: Option<User>,
    pub transaction: Option<Transaction>,
}
