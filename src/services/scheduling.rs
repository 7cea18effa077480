use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::db::models::{Availability, BlockedSlot, DayOfWeek};
use crate::db::{AppointmentRepository, AvailabilityRepository, BlockedSlotRepository};
use crate::error::AppResult;
use crate::services::slots::{self, TimeSlot};

pub const FULL_DAY_REASON: &str = "All slots booked";

// ============================================================================
// Slot Availability Evaluator + Full-Day Block Resolver
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SlotAvailability {
    pub time: String,
    pub is_available: bool,
}

/// Per-date availability: morning and evening slot lists, or empty lists
/// with a message when the day has no template or is fully blocked.
#[derive(Debug, Clone, Serialize)]
pub struct DaySchedule {
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub morning: Vec<SlotAvailability>,
    pub evening: Vec<SlotAvailability>,
}

impl DaySchedule {
    fn empty(date: NaiveDate, message: &str) -> Self {
        DaySchedule {
            date,
            message: Some(message.to_string()),
            morning: Vec::new(),
            evening: Vec::new(),
        }
    }
}

pub struct SchedulingService;

impl SchedulingService {
    /// Evaluate per-slot availability for a date: generated template slots
    /// minus booked appointments and partial blocks. Short-circuits on a
    /// missing template or a full-day block.
    pub async fn available_slots(pool: &SqlitePool, date: NaiveDate) -> AppResult<DaySchedule> {
        let day = DayOfWeek::from_date(date);

        let Some(availability) = AvailabilityRepository::find_active_by_day(pool, day).await?
        else {
            return Ok(DaySchedule::empty(date, "No availability for this day"));
        };

        if BlockedSlotRepository::find_full_day(pool, date).await?.is_some() {
            return Ok(DaySchedule::empty(date, "This day is not available"));
        }

        let morning = Self::window_slots(
            &availability.morning_start_time,
            &availability.morning_end_time,
            availability.slot_duration,
        )?;
        let evening = Self::window_slots(
            &availability.evening_start_time,
            &availability.evening_end_time,
            availability.slot_duration,
        )?;

        let booked: HashSet<u32> = AppointmentRepository::list_active_times(pool, date)
            .await?
            .iter()
            .map(|time| slots::parse_clock_minutes(time))
            .collect::<AppResult<_>>()?;

        let partial_blocks = BlockedSlotRepository::find_partial(pool, date).await?;

        Ok(DaySchedule {
            date,
            message: None,
            morning: Self::mark_slots(morning, &booked, &partial_blocks)?,
            evening: Self::mark_slots(evening, &booked, &partial_blocks)?,
        })
    }

    /// Recompute whether `date` has any capacity left and persist the
    /// full-day marker when it doesn't. Invoked after every mutating booking
    /// event; the find-or-create keeps repeated runs idempotent. Nothing
    /// here ever removes the marker.
    pub async fn reconcile_full_day(
        pool: &SqlitePool,
        date: NaiveDate,
        availability: &Availability,
    ) -> AppResult<()> {
        let candidates = Self::candidate_slots(availability)?;
        if candidates.is_empty() {
            return Ok(());
        }

        let booked_count = AppointmentRepository::count_active_on(pool, date).await?;

        let partial_blocks = BlockedSlotRepository::find_partial(pool, date).await?;
        let mut blocked_count: i64 = 0;
        for slot in &candidates {
            if slots::is_slot_blocked(slot, &partial_blocks)? {
                blocked_count += 1;
            }
        }

        if booked_count + blocked_count >= candidates.len() as i64 {
            BlockedSlotRepository::create_full_day(pool, date, FULL_DAY_REASON).await?;
            info!(
                "Date {} is fully booked ({} booked, {} blocked of {} slots)",
                date,
                booked_count,
                blocked_count,
                candidates.len()
            );
        }

        Ok(())
    }

    /// All bookable slots a template yields for one date, morning then
    /// evening.
    pub fn candidate_slots(availability: &Availability) -> AppResult<Vec<TimeSlot>> {
        let mut candidates = Self::window_slots(
            &availability.morning_start_time,
            &availability.morning_end_time,
            availability.slot_duration,
        )?;
        candidates.extend(Self::window_slots(
            &availability.evening_start_time,
            &availability.evening_end_time,
            availability.slot_duration,
        )?);
        Ok(candidates)
    }

    fn window_slots(
        start: &Option<String>,
        end: &Option<String>,
        duration: i64,
    ) -> AppResult<Vec<TimeSlot>> {
        if !slots::is_valid_window_bound(start) || !slots::is_valid_window_bound(end) {
            return Ok(Vec::new());
        }

        slots::generate_time_slots(
            start.as_deref().unwrap_or_default(),
            end.as_deref().unwrap_or_default(),
            duration,
        )
    }

    fn mark_slots(
        candidates: Vec<TimeSlot>,
        booked: &HashSet<u32>,
        partial_blocks: &[BlockedSlot],
    ) -> AppResult<Vec<SlotAvailability>> {
        candidates
            .into_iter()
            .map(|slot| {
                let blocked = slots::is_slot_blocked(&slot, partial_blocks)?;
                let is_available = !booked.contains(&slot.start_minutes()) && !blocked;
                Ok(SlotAvailability {
                    time: slot.label(),
                    is_available,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{
        CreateAppointment, CreateAvailability, CreateBlockedSlot, CreateTransaction, CreateUser,
        UserRole,
    };
    use crate::db::{TransactionRepository, UserRepository};
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
        evening: Option<(&str, &str)>,
        duration: i64,
    ) -> Availability {
        AvailabilityRepository::create(
            pool,
            CreateAvailability {
                day_of_week: day,
                morning_start_time: morning.map(|(s, _)| s.to_string()),
                morning_end_time: morning.map(|(_, e)| e.to_string()),
                evening_start_time: evening.map(|(s, _)| s.to_string()),
                evening_end_time: evening.map(|(_, e)| e.to_string()),
                slot_duration: duration,
                is_active: Some(true),
            },
        )
        .await
        .expect("seed template")
    }

    async fn seed_booking(pool: &SqlitePool, date: NaiveDate, time: &str) {
        let user = UserRepository::create(
            pool,
            CreateUser {
                name: "Test Patient".to_string(),
                mobile: Some(format!("99{}", time.replace(':', ""))),
                email: None,
                password_hash: None,
                role: UserRole::User,
            },
        )
        .await
        .expect("seed user");

        let appointment = AppointmentRepository::create(
            pool,
            CreateAppointment {
                user_id: user.id.clone(),
                appointment_date: date,
                appointment_time: crate::services::slots::normalize_time(time).unwrap(),
                description: None,
                duration: 30,
            },
        )
        .await
        .expect("seed appointment");

        TransactionRepository::create(
            pool,
            CreateTransaction {
                user_id: user.id,
                appointment_id: appointment.id,
                amount: 500.0,
                payment_method: "Online".to_string(),
                status: "pending".to_string(),
                transaction_reference: None,
                notes: None,
            },
        )
        .await
        .expect("seed transaction");
    }

    // 2024-01-01 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn no_template_yields_empty_schedule_with_message() {
        let pool = test_pool().await;

        let schedule = SchedulingService::available_slots(&pool, monday())
            .await
            .unwrap();

        assert_eq!(
            schedule.message.as_deref(),
            Some("No availability for this day")
        );
        assert!(schedule.morning.is_empty());
        assert!(schedule.evening.is_empty());
    }

    #[tokio::test]
    async fn booked_slot_is_marked_unavailable() {
        let pool = test_pool().await;
        seed_template(&pool, DayOfWeek::Monday, Some(("09:00:00", "10:00:00")), None, 30).await;
        seed_booking(&pool, monday(), "09:30").await;

        let schedule = SchedulingService::available_slots(&pool, monday())
            .await
            .unwrap();

        assert!(schedule.message.is_none());
        let morning: Vec<(String, bool)> = schedule
            .morning
            .iter()
            .map(|s| (s.time.clone(), s.is_available))
            .collect();
        assert_eq!(
            morning,
            vec![
                ("09:00-09:30".to_string(), true),
                ("09:30-10:00".to_string(), false),
            ]
        );
        assert!(schedule.evening.is_empty());
    }

    #[tokio::test]
    async fn partial_block_hides_slots_by_start_minute() {
        let pool = test_pool().await;
        seed_template(&pool, DayOfWeek::Monday, Some(("09:00:00", "11:00:00")), None, 30).await;

        BlockedSlotRepository::create(
            &pool,
            CreateBlockedSlot {
                blocked_date: monday(),
                is_full_day: false,
                start_time: Some("09:30".to_string()),
                end_time: Some("10:00".to_string()),
                reason: Some("Equipment maintenance".to_string()),
            },
        )
        .await
        .unwrap();

        let schedule = SchedulingService::available_slots(&pool, monday())
            .await
            .unwrap();

        let flags: Vec<bool> = schedule.morning.iter().map(|s| s.is_available).collect();
        // 09:00 free, 09:30 and 10:00 inside the inclusive block, 10:30 free.
        assert_eq!(flags, vec![true, false, false, true]);
    }

    #[tokio::test]
    async fn full_day_block_short_circuits() {
        let pool = test_pool().await;
        seed_template(&pool, DayOfWeek::Monday, Some(("09:00:00", "10:00:00")), None, 30).await;
        BlockedSlotRepository::create_full_day(&pool, monday(), FULL_DAY_REASON)
            .await
            .unwrap();

        let schedule = SchedulingService::available_slots(&pool, monday())
            .await
            .unwrap();

        assert_eq!(schedule.message.as_deref(), Some("This day is not available"));
        assert!(schedule.morning.is_empty());
    }

    #[tokio::test]
    async fn reconcile_is_idempotent() {
        let pool = test_pool().await;
        let availability =
            seed_template(&pool, DayOfWeek::Monday, Some(("09:00:00", "10:00:00")), None, 30)
                .await;

        seed_booking(&pool, monday(), "09:00").await;
        seed_booking(&pool, monday(), "09:30").await;

        SchedulingService::reconcile_full_day(&pool, monday(), &availability)
            .await
            .unwrap();
        SchedulingService::reconcile_full_day(&pool, monday(), &availability)
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM blocked_slots WHERE blocked_date = ? AND is_full_day = TRUE",
        )
        .bind(monday())
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn reconcile_counts_partial_blocks_toward_capacity() {
        let pool = test_pool().await;
        let availability =
            seed_template(&pool, DayOfWeek::Monday, Some(("09:00:00", "10:00:00")), None, 30)
                .await;

        // One of two slots booked, the other partial-blocked: day is full.
        seed_booking(&pool, monday(), "09:00").await;
        BlockedSlotRepository::create(
            &pool,
            CreateBlockedSlot {
                blocked_date: monday(),
                is_full_day: false,
                start_time: Some("09:30".to_string()),
                end_time: Some("09:30".to_string()),
                reason: None,
            },
        )
        .await
        .unwrap();

        SchedulingService::reconcile_full_day(&pool, monday(), &availability)
            .await
            .unwrap();

        assert!(BlockedSlotRepository::find_full_day(&pool, monday())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn reconcile_with_no_candidate_slots_is_a_noop() {
        let pool = test_pool().await;
        let availability = seed_template(&pool, DayOfWeek::Monday, None, None, 30).await;

        SchedulingService::reconcile_full_day(&pool, monday(), &availability)
            .await
            .unwrap();

        assert!(BlockedSlotRepository::find_full_day(&pool, monday())
            .await
            .unwrap()
            .is_none());
    }
}
