use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::db::models::*;
use crate::db::{
    AppointmentRepository, AvailabilityRepository, BlockedSlotRepository, TransactionRepository,
    UserRepository,
};
use crate::error::{AppError, AppResult};
use crate::services::scheduling::SchedulingService;
use crate::services::slots;

// ============================================================================
// Booking Conflict Guard + Appointment Lifecycle
// ============================================================================

/// Outcome of the admission checks. A rejection is an expected business
/// outcome carried as a value, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected(String),
}

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub username: String,
    pub mobile: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub description: Option<String>,
    pub duration: i64,
    pub amount: f64,
    pub payment_method: String,
    pub payment_status: Option<String>,
    pub transaction_reference: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BookingOutcome {
    Booked {
        appointment: Appointment,
        transaction: Transaction,
    },
    Rejected {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RescheduleOutcome {
    Rescheduled { appointment: Appointment },
    Rejected { reason: String },
}

pub struct BookingService;

impl BookingService {
    /// Ordered admission checks for a requested `(date, time)`; the first
    /// failing check wins. Partial blocks deliberately do not gate
    /// admission, only availability display and full-day reconciliation.
    pub async fn admit(pool: &SqlitePool, date: NaiveDate, time: &str) -> AppResult<Admission> {
        Self::admit_excluding(pool, date, time, None).await
    }

    async fn admit_excluding(
        pool: &SqlitePool,
        date: NaiveDate,
        time: &str,
        exclude_appointment: Option<&str>,
    ) -> AppResult<Admission> {
        let day = DayOfWeek::from_date(date);

        if AvailabilityRepository::find_active_by_day(pool, day)
            .await?
            .is_none()
        {
            return Ok(Admission::Rejected(
                "No availability for this day".to_string(),
            ));
        }

        if BlockedSlotRepository::find_full_day(pool, date).await?.is_some() {
            return Ok(Admission::Rejected(
                "This day is fully booked and not available".to_string(),
            ));
        }

        let collision = match exclude_appointment {
            Some(id) => AppointmentRepository::find_active_at_excluding(pool, date, time, id).await?,
            None => AppointmentRepository::find_active_at(pool, date, time).await?,
        };
        if collision.is_some() {
            return Ok(Admission::Rejected(
                "This time slot is already booked".to_string(),
            ));
        }

        Ok(Admission::Admitted)
    }

    /// Book: guard, then persist the appointment and its payment record as
    /// one database transaction, then reconcile the date's full-day state.
    pub async fn book(pool: &SqlitePool, request: BookingRequest) -> AppResult<BookingOutcome> {
        let time = slots::normalize_time(&request.appointment_time)?;

        if request.duration <= 0 {
            return Err(AppError::Validation(
                "Appointment duration must be at least one minute".to_string(),
            ));
        }

        if let Admission::Rejected(reason) =
            Self::admit(pool, request.appointment_date, &time).await?
        {
            return Ok(BookingOutcome::Rejected { reason });
        }

        let user =
            UserRepository::find_or_create_by_mobile(pool, &request.username, &request.mobile)
                .await?;

        let mut tx = pool.begin().await.map_err(AppError::Database)?;

        let appointment = match AppointmentRepository::create(
            &mut *tx,
            CreateAppointment {
                user_id: user.id.clone(),
                appointment_date: request.appointment_date,
                appointment_time: time.clone(),
                description: request.description.clone(),
                duration: request.duration,
            },
        )
        .await
        {
            Ok(appointment) => appointment,
            // A concurrent booking can win the slot between the guard and
            // the insert; the active-slot unique index turns that race into
            // the same rejection the guard would have produced.
            Err(AppError::Database(e)) if is_unique_violation(&e) => {
                return Ok(BookingOutcome::Rejected {
                    reason: "This time slot is already booked".to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let transaction = TransactionRepository::create(
            &mut *tx,
            CreateTransaction {
                user_id: user.id,
                appointment_id: appointment.id.clone(),
                amount: request.amount,
                payment_method: request.payment_method.clone(),
                status: request
                    .payment_status
                    .clone()
                    .unwrap_or_else(|| "pending".to_string()),
                transaction_reference: request.transaction_reference.clone(),
                notes: Some(format!(
                    "Payment for appointment on {} at {}",
                    request.appointment_date, time
                )),
            },
        )
        .await?;

        tx.commit().await.map_err(AppError::Database)?;

        info!(
            "Booked appointment {} on {} at {}",
            appointment.id, appointment.appointment_date, appointment.appointment_time
        );

        // Derived state: recompute the full-day marker from source counts
        // after every successful booking.
        let day = DayOfWeek::from_date(request.appointment_date);
        if let Some(availability) = AvailabilityRepository::find_active_by_day(pool, day).await? {
            SchedulingService::reconcile_full_day(pool, request.appointment_date, &availability)
                .await?;
        }

        Ok(BookingOutcome::Booked {
            appointment,
            transaction,
        })
    }

    /// Move the caller's most recently created appointment to a new slot.
    /// The new slot passes the same guard as an initial booking, minus the
    /// collision with the slot being vacated.
    pub async fn reschedule_latest(
        pool: &SqlitePool,
        user_id: &str,
        new_date: NaiveDate,
        new_time: &str,
    ) -> AppResult<RescheduleOutcome> {
        let time = slots::normalize_time(new_time)?;

        let appointment = AppointmentRepository::find_latest_by_user(pool, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))?;

        if let Admission::Rejected(reason) =
            Self::admit_excluding(pool, new_date, &time, Some(&appointment.id)).await?
        {
            return Ok(RescheduleOutcome::Rejected { reason });
        }

        let updated = AppointmentRepository::update_schedule(
            pool,
            &appointment.id,
            new_date,
            &time,
            AppointmentStatus::Rescheduled,
        )
        .await?;

        info!(
            "Rescheduled appointment {} to {} at {}",
            updated.id, updated.appointment_date, updated.appointment_time
        );

        let day = DayOfWeek::from_date(new_date);
        if let Some(availability) = AvailabilityRepository::find_active_by_day(pool, day).await? {
            SchedulingService::reconcile_full_day(pool, new_date, &availability).await?;
        }

        Ok(RescheduleOutcome::Rescheduled {
            appointment: updated,
        })
    }

    /// Admin status overwrite. Any status may be set to any other; the
    /// status set is open by design.
    pub async fn update_status(
        pool: &SqlitePool,
        appointment_id: &str,
        status: AppointmentStatus,
    ) -> AppResult<Appointment> {
        if AppointmentRepository::find_by_id(pool, appointment_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound("Appointment not found".to_string()));
        }

        AppointmentRepository::update_status(pool, appointment_id, status).await
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("migrations");
        pool
    }

    async fn seed_template(
        pool: &SqlitePool,
        day: DayOfWeek,
        morning: Option<(&str, &str)>,
        duration: i64,
    ) {
        AvailabilityRepository::create(
            pool,
            CreateAvailability {
                day_of_week: day,
                morning_start_time: morning.map(|(s, _)| s.to_string()),
                morning_end_time: morning.map(|(_, e)| e.to_string()),
                evening_start_time: None,
                evening_end_time: None,
                slot_duration: duration,
                is_active: Some(true),
            },
        )
        .await
        .expect("seed template");
    }

    fn request(mobile: &str, date: NaiveDate, time: &str) -> BookingRequest {
        BookingRequest {
            username: "Test Patient".to_string(),
            mobile: mobile.to_string(),
            appointment_date: date,
            appointment_time: time.to_string(),
            description: None,
            duration: 30,
            amount: 500.0,
            payment_method: "Online".to_string(),
            payment_status: None,
            transaction_reference: None,
        }
    }

    // 2024-01-01 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn booking_without_template_is_rejected() {
        let pool = test_pool().await;

        let outcome = BookingService::book(&pool, request("111", monday(), "10:00"))
            .await
            .unwrap();

        match outcome {
            BookingOutcome::Rejected { reason } => {
                assert_eq!(reason, "No availability for this day")
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn exact_collision_is_rejected_and_free_slot_admitted() {
        let pool = test_pool().await;
        seed_template(&pool, DayOfWeek::Monday, Some(("09:00:00", "12:00:00")), 30).await;

        let outcome = BookingService::book(&pool, request("111", monday(), "10:00"))
            .await
            .unwrap();
        assert!(matches!(outcome, BookingOutcome::Booked { .. }));

        let taken = BookingService::admit(&pool, monday(), "10:00:00").await.unwrap();
        assert_eq!(
            taken,
            Admission::Rejected("This time slot is already booked".to_string())
        );

        let free = BookingService::admit(&pool, monday(), "10:30:00").await.unwrap();
        assert_eq!(free, Admission::Admitted);
    }

    #[tokio::test]
    async fn booking_persists_appointment_with_payment_record() {
        let pool = test_pool().await;
        seed_template(&pool, DayOfWeek::Monday, Some(("09:00:00", "12:00:00")), 30).await;

        let outcome = BookingService::book(&pool, request("111", monday(), "9:30"))
            .await
            .unwrap();

        let BookingOutcome::Booked {
            appointment,
            transaction,
        } = outcome
        else {
            panic!("expected booked outcome");
        };

        assert_eq!(appointment.appointment_time, "09:30:00");
        assert_eq!(appointment.status, AppointmentStatus::Pending);
        assert_eq!(transaction.appointment_id, appointment.id);
        assert_eq!(transaction.status, "pending");
        assert_eq!(
            transaction.notes.as_deref(),
            Some("Payment for appointment on 2024-01-01 at 09:30:00")
        );
    }

    #[tokio::test]
    async fn exhausting_capacity_blocks_the_day() {
        let pool = test_pool().await;
        // Exactly two candidate slots.
        seed_template(&pool, DayOfWeek::Monday, Some(("09:00:00", "10:00:00")), 30).await;

        let first = BookingService::book(&pool, request("111", monday(), "09:00"))
            .await
            .unwrap();
        assert!(matches!(first, BookingOutcome::Booked { .. }));

        let second = BookingService::book(&pool, request("222", monday(), "09:30"))
            .await
            .unwrap();
        assert!(matches!(second, BookingOutcome::Booked { .. }));

        let block = BlockedSlotRepository::find_full_day(&pool, monday())
            .await
            .unwrap()
            .expect("full-day block created");
        assert_eq!(block.reason.as_deref(), Some("All slots booked"));

        let outcome = BookingService::book(&pool, request("333", monday(), "11:00"))
            .await
            .unwrap();
        match outcome {
            BookingOutcome::Rejected { reason } => {
                assert_eq!(reason, "This day is fully booked and not available")
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn full_day_block_outlives_cancellations() {
        let pool = test_pool().await;
        seed_template(&pool, DayOfWeek::Monday, Some(("09:00:00", "10:00:00")), 30).await;

        let outcome = BookingService::book(&pool, request("111", monday(), "09:00"))
            .await
            .unwrap();
        let BookingOutcome::Booked { appointment, .. } = outcome else {
            panic!("expected booked outcome");
        };
        BookingService::book(&pool, request("222", monday(), "09:30"))
            .await
            .unwrap();

        // Cancelling frees the slot, but the full-day marker only ever moves
        // one way.
        BookingService::update_status(&pool, &appointment.id, AppointmentStatus::Cancelled)
            .await
            .unwrap();

        let admission = BookingService::admit(&pool, monday(), "09:00:00").await.unwrap();
        assert_eq!(
            admission,
            Admission::Rejected("This day is fully booked and not available".to_string())
        );
    }

    #[tokio::test]
    async fn reschedule_runs_the_guard_but_skips_own_slot() {
        let pool = test_pool().await;
        seed_template(&pool, DayOfWeek::Monday, Some(("09:00:00", "11:00:00")), 30).await;

        BookingService::book(&pool, request("111", monday(), "09:00"))
            .await
            .unwrap();
        let second = BookingService::book(&pool, request("222", monday(), "09:30"))
            .await
            .unwrap();
        let BookingOutcome::Booked { appointment, .. } = second else {
            panic!("expected booked outcome");
        };

        // Moving onto an occupied slot is refused.
        let onto_taken =
            BookingService::reschedule_latest(&pool, &appointment.user_id, monday(), "09:00")
                .await
                .unwrap();
        assert!(matches!(
            onto_taken,
            RescheduleOutcome::Rejected { reason } if reason == "This time slot is already booked"
        ));

        // Re-confirming the currently held slot is not a collision.
        let onto_own =
            BookingService::reschedule_latest(&pool, &appointment.user_id, monday(), "09:30")
                .await
                .unwrap();
        assert!(matches!(onto_own, RescheduleOutcome::Rescheduled { .. }));

        // Moving to a free slot updates schedule and status.
        let moved =
            BookingService::reschedule_latest(&pool, &appointment.user_id, monday(), "10:00")
                .await
                .unwrap();
        let RescheduleOutcome::Rescheduled { appointment: moved } = moved else {
            panic!("expected reschedule");
        };
        assert_eq!(moved.appointment_time, "10:00:00");
        assert_eq!(moved.status, AppointmentStatus::Rescheduled);
    }

    #[tokio::test]
    async fn reschedule_without_history_is_not_found() {
        let pool = test_pool().await;
        seed_template(&pool, DayOfWeek::Monday, Some(("09:00:00", "11:00:00")), 30).await;

        let result =
            BookingService::reschedule_latest(&pool, "missing-user", monday(), "09:00").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn malformed_time_is_a_validation_error() {
        let pool = test_pool().await;
        seed_template(&pool, DayOfWeek::Monday, Some(("09:00:00", "11:00:00")), 30).await;

        let result = BookingService::book(&pool, request("111", monday(), "half past nine")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
