//! Pure slot arithmetic: turning a template window into fixed-width time
//! slots and testing slots against partial blocks. No I/O lives here.

use crate::db::models::BlockedSlot;
use crate::error::{AppError, AppResult};

const MINUTES_PER_DAY: u32 = 24 * 60;

/// A bookable interval derived from an availability window. Never persisted;
/// rendered as `"HH:MM-HH:MM"` on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlot {
    pub start: String,
    pub end: String,
    start_minutes: u32,
}

impl TimeSlot {
    pub fn label(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }

    /// Wrapped start offset, minutes from midnight.
    pub fn start_minutes(&self) -> u32 {
        self.start_minutes
    }
}

/// Parse `HH:MM` (seconds tolerated and ignored) into minutes from midnight.
/// Malformed values are an error, never a silently wrong boundary.
pub fn parse_clock_minutes(time: &str) -> AppResult<u32> {
    let parts: Vec<&str> = time.split(':').collect();
    if parts.len() != 2 && parts.len() != 3 {
        return Err(AppError::Validation(format!(
            "Malformed time value: {}",
            time
        )));
    }

    let hours: u32 = parts[0]
        .trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("Malformed time value: {}", time)))?;
    let minutes: u32 = parts[1]
        .trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("Malformed time value: {}", time)))?;

    if hours >= 24 || minutes >= 60 {
        return Err(AppError::Validation(format!(
            "Time value out of range: {}",
            time
        )));
    }

    Ok(hours * 60 + minutes)
}

/// Canonical `HH:MM:SS` form used for stored appointment times.
pub fn normalize_time(time: &str) -> AppResult<String> {
    let minutes = parse_clock_minutes(time)?;
    Ok(format!("{:02}:{:02}:00", minutes / 60, minutes % 60))
}

fn format_clock(minutes: u32) -> String {
    let wrapped = minutes % MINUTES_PER_DAY;
    format!("{:02}:{:02}", wrapped / 60, wrapped % 60)
}

/// Generate fixed-width slots covering `[start, end)`. An `end` at or before
/// `start` is treated as crossing midnight. Every emitted slot is a full
/// `duration_minutes` wide; the window is never closed out with a shorter
/// remainder slot.
pub fn generate_time_slots(
    start: &str,
    end: &str,
    duration_minutes: i64,
) -> AppResult<Vec<TimeSlot>> {
    if duration_minutes <= 0 {
        return Err(AppError::Validation(format!(
            "Slot duration must be positive, got {}",
            duration_minutes
        )));
    }
    let duration = duration_minutes as u32;

    let start_minutes = parse_clock_minutes(start)?;
    let mut end_minutes = parse_clock_minutes(end)?;

    // A zero-length window yields nothing; an end strictly before the start
    // is a window crossing midnight.
    if end_minutes == start_minutes {
        return Ok(Vec::new());
    }
    if end_minutes < start_minutes {
        end_minutes += MINUTES_PER_DAY;
    }

    let mut slots = Vec::new();
    let mut current = start_minutes;
    while current < end_minutes {
        let next = current + duration;
        slots.push(TimeSlot {
            start: format_clock(current),
            end: format_clock(next),
            start_minutes: current % MINUTES_PER_DAY,
        });
        current = next;
    }

    Ok(slots)
}

/// Window bounds equal to the `00:00:00` sentinel (or absent) contribute no
/// slots.
pub fn is_valid_window_bound(bound: &Option<String>) -> bool {
    match bound {
        Some(value) => !value.is_empty() && value != "00:00:00",
        None => false,
    }
}

/// A slot is blocked when its start minute falls inside a partial block,
/// bounds inclusive on both ends. Interval overlap of the slot's full width
/// does not count. Blocks without both bounds block nothing.
pub fn is_slot_blocked(slot: &TimeSlot, blocks: &[BlockedSlot]) -> AppResult<bool> {
    for block in blocks {
        let (Some(block_start), Some(block_end)) = (&block.start_time, &block.end_time) else {
            continue;
        };

        let block_start = parse_clock_minutes(block_start)?;
        let block_end = parse_clock_minutes(block_end)?;

        if block_start <= slot.start_minutes() && slot.start_minutes() <= block_end {
            return Ok(true);
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn labels(slots: &[TimeSlot]) -> Vec<String> {
        slots.iter().map(|s| s.label()).collect()
    }

    fn partial_block(start: &str, end: &str) -> BlockedSlot {
        let now = Utc::now().naive_utc();
        BlockedSlot {
            id: "b1".to_string(),
            blocked_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            is_full_day: false,
            start_time: Some(start.to_string()),
            end_time: Some(end.to_string()),
            reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn generates_fixed_width_slots() {
        let slots = generate_time_slots("09:00", "10:00", 30).unwrap();
        assert_eq!(labels(&slots), vec!["09:00-09:30", "09:30-10:00"]);
    }

    #[test]
    fn zero_width_window_is_empty() {
        let slots = generate_time_slots("09:00", "09:00", 30).unwrap();
        assert!(slots.is_empty());
    }

    #[test]
    fn window_crossing_midnight_wraps_labels() {
        let slots = generate_time_slots("23:00", "01:00", 60).unwrap();
        assert_eq!(labels(&slots), vec!["23:00-00:00", "00:00-01:00"]);
    }

    #[test]
    fn remainder_shorter_than_duration_still_gets_full_slot() {
        let slots = generate_time_slots("09:00", "10:00", 45).unwrap();
        assert_eq!(labels(&slots), vec!["09:00-09:45", "09:45-10:30"]);
    }

    #[test]
    fn malformed_times_fail_fast() {
        assert!(generate_time_slots("9am", "10:00", 30).is_err());
        assert!(generate_time_slots("09:00", "25:00", 30).is_err());
        assert!(generate_time_slots("09:00", "10:00", 0).is_err());
        assert!(parse_clock_minutes("10:61").is_err());
    }

    #[test]
    fn seconds_are_tolerated_and_dropped() {
        assert_eq!(parse_clock_minutes("09:30:00").unwrap(), 570);
        assert_eq!(normalize_time("9:5").unwrap(), "09:05:00");
        assert_eq!(normalize_time("10:00:30").unwrap(), "10:00:00");
    }

    #[test]
    fn window_bound_sentinel() {
        assert!(is_valid_window_bound(&Some("09:00:00".to_string())));
        assert!(!is_valid_window_bound(&Some("00:00:00".to_string())));
        assert!(!is_valid_window_bound(&Some(String::new())));
        assert!(!is_valid_window_bound(&None));
    }

    #[test]
    fn block_check_is_inclusive_on_both_bounds() {
        let blocks = vec![partial_block("09:00", "10:00")];
        let slots = generate_time_slots("08:30", "11:00", 30).unwrap();

        // 08:30 before the block, 09:00/09:30/10:00 inside (end-inclusive),
        // 10:30 past it.
        let flags: Vec<bool> = slots
            .iter()
            .map(|s| is_slot_blocked(s, &blocks).unwrap())
            .collect();
        assert_eq!(flags, vec![false, true, true, true, false]);
    }

    #[test]
    fn block_without_bounds_blocks_nothing() {
        let mut block = partial_block("09:00", "10:00");
        block.start_time = None;
        let slots = generate_time_slots("09:00", "10:00", 30).unwrap();
        for slot in &slots {
            assert!(!is_slot_blocked(slot, std::slice::from_ref(&block)).unwrap());
        }
    }
}
