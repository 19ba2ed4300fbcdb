use chrono::{NaiveTime, Timelike};
use serde::Serialize;

use crate::config::TimeBlocks;

/// A candidate bookable window of exactly one service duration. The end time
/// is customer-facing and never includes the inter-appointment buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayPart {
    Morning,
    Afternoon,
    Evening,
}

impl DayPart {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayPart::Morning => "morning",
            DayPart::Afternoon => "afternoon",
            DayPart::Evening => "evening",
        }
    }
}

fn minutes_from_midnight(t: NaiveTime) -> i64 {
    (t.num_seconds_from_midnight() / 60) as i64
}

fn time_from_minutes(m: i64) -> NaiveTime {
    // Callers keep m within the day; clamp rather than wrap if they don't.
    let m = m.clamp(0, 24 * 60 - 1);
    NaiveTime::from_num_seconds_from_midnight_opt(m as u32 * 60, 0).expect("minutes within a day")
}

/// Generate the fixed grid of candidate slots for one service duration.
///
/// Starting at `open`, each slot spans exactly `duration_minutes`; the cursor
/// then advances by `duration_minutes + buffer_minutes`, so consecutive slots
/// are spaced to leave the buffer idle even though the emitted end times
/// exclude it. Generation stops once a slot would run past `close`.
pub fn generate_slots(
    duration_minutes: i64,
    buffer_minutes: i64,
    open: NaiveTime,
    close: NaiveTime,
) -> Vec<Slot> {
    if duration_minutes < 1 || buffer_minutes < 0 {
        return vec![];
    }

    let close_m = minutes_from_midnight(close);
    let mut cursor = minutes_from_midnight(open);
    let mut slots = vec![];

    while cursor + duration_minutes <= close_m {
        slots.push(Slot {
            start: time_from_minutes(cursor),
            end: time_from_minutes(cursor + duration_minutes),
        });
        cursor += duration_minutes + buffer_minutes;
    }

    slots
}

/// Classify a slot start into a day part by half-open band membership.
/// A start outside every configured band falls back to evening.
pub fn day_part(start: NaiveTime, blocks: &TimeBlocks) -> DayPart {
    let bands = [
        (DayPart::Morning, blocks.morning),
        (DayPart::Afternoon, blocks.afternoon),
        (DayPart::Evening, blocks.evening),
    ];
    for (part, (band_start, band_end)) in bands {
        if start >= band_start && start < band_end {
            return part;
        }
    }
    DayPart::Evening
}

/// Service end plus the reserved buffer, used by every availability check.
/// The result is never stored on a booking.
pub fn end_with_buffer(start: NaiveTime, duration_minutes: i64, buffer_minutes: i64) -> NaiveTime {
    time_from_minutes(minutes_from_midnight(start) + duration_minutes + buffer_minutes)
}

/// Service end without the buffer, as persisted and shown to customers.
pub fn service_end(start: NaiveTime, duration_minutes: i64) -> NaiveTime {
    time_from_minutes(minutes_from_midnight(start) + duration_minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    #[test]
    fn test_grid_is_buffer_spaced() {
        let slots = generate_slots(60, 10, t("08:00"), t("22:00"));
        assert_eq!(slots[0], Slot { start: t("08:00"), end: t("09:00") });
        assert_eq!(slots[1], Slot { start: t("09:10"), end: t("10:10") });
    }

    #[test]
    fn test_slots_have_exact_duration_and_fit_hours() {
        let open = t("08:00");
        let close = t("22:00");
        let slots = generate_slots(45, 10, open, close);
        assert!(!slots.is_empty());

        for pair in slots.windows(2) {
            let spacing = pair[1].start.signed_duration_since(pair[0].start);
            assert!(spacing >= chrono::Duration::minutes(45 + 10));
        }
        for slot in &slots {
            assert_eq!(
                slot.end.signed_duration_since(slot.start),
                chrono::Duration::minutes(45)
            );
            assert!(slot.start >= open);
            assert!(slot.end <= close);
        }
    }

    #[test]
    fn test_last_slot_never_exceeds_close() {
        // 08:00-09:30 with 50-minute services: 08:00-08:50 fits, the next
        // cursor (08:55) would end 09:45 and must not be emitted.
        let slots = generate_slots(50, 5, t("08:00"), t("09:30"));
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].end, t("08:50"));
    }

    #[test]
    fn test_duration_longer_than_day_yields_nothing() {
        assert!(generate_slots(15 * 60, 10, t("08:00"), t("22:00")).is_empty());
        assert!(generate_slots(0, 10, t("08:00"), t("22:00")).is_empty());
    }

    #[test]
    fn test_zero_buffer_packs_back_to_back() {
        let slots = generate_slots(60, 0, t("08:00"), t("10:00"));
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].start, t("09:00"));
    }

    #[test]
    fn test_day_part_classification() {
        let blocks = crate::config::TimeBlocks::default();
        assert_eq!(day_part(t("08:00"), &blocks), DayPart::Morning);
        assert_eq!(day_part(t("11:59"), &blocks), DayPart::Morning);
        assert_eq!(day_part(t("12:00"), &blocks), DayPart::Afternoon);
        assert_eq!(day_part(t("17:00"), &blocks), DayPart::Evening);
        assert_eq!(day_part(t("21:30"), &blocks), DayPart::Evening);
        // Outside every band: defaults to evening.
        assert_eq!(day_part(t("07:00"), &blocks), DayPart::Evening);
    }

    #[test]
    fn test_end_helpers() {
        assert_eq!(service_end(t("09:00"), 45), t("09:45"));
        assert_eq!(end_with_buffer(t("09:00"), 45, 10), t("09:55"));
    }
}
