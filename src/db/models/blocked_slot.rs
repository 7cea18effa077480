use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Blocked Slot Models
// ============================================================================

/// A full-day record (`is_full_day`) makes the whole date unbookable; a
/// partial record marks the `start_time..=end_time` interval unavailable
/// without blocking the day.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BlockedSlot {
    pub id: String,
    pub blocked_date: NaiveDate,
    pub is_full_day: bool,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBlockedSlot {
    pub blocked_date: NaiveDate,
    pub is_full_day: bool,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub reason: Option<String>,
}
