use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Availability Template Models (weekly schedule configuration)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "PascalCase")]
pub enum DayOfWeek {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayOfWeek {
    /// Weekday for a calendar date, Sunday = 0 convention.
    pub fn from_date(date: NaiveDate) -> Self {
        match date.weekday().num_days_from_sunday() {
            0 => DayOfWeek::Sunday,
            1 => DayOfWeek::Monday,
            2 => DayOfWeek::Tuesday,
            3 => DayOfWeek::Wednesday,
            4 => DayOfWeek::Thursday,
            5 => DayOfWeek::Friday,
            _ => DayOfWeek::Saturday,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Sunday => "Sunday",
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
        }
    }
}

/// Weekly availability template for one weekday. Morning and evening windows
/// are independent; a missing bound (or the `00:00:00` sentinel) means the
/// window contributes no slots.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Availability {
    pub id: String,
    pub day_of_week: DayOfWeek,
    pub morning_start_time: Option<String>,
    pub morning_end_time: Option<String>,
    pub evening_start_time: Option<String>,
    pub evening_end_time: Option<String>,
    pub slot_duration: i64,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAvailability {
    pub day_of_week: DayOfWeek,
    pub morning_start_time: Option<String>,
    pub morning_end_time: Option<String>,
    pub evening_start_time: Option<String>,
    pub evening_end_time: Option<String>,
    pub slot_duration: i64,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAvailability {
    pub day_of_week: Option<DayOfWeek>,
    pub morning_start_time: Option<String>,
    pub morning_end_time: Option<String>,
    pub evening_start_time: Option<String>,
    pub evening_end_time: Option<String>,
    pub slot_duration: Option<i64>,
    pub is_active: Option<bool>,
}
