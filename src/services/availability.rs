use chrono::{NaiveDate, NaiveTime};
use rusqlite::Connection;

use crate::db::queries;
use crate::models::{Service, StaffMember};

/// Decide whether one staff member can take a booking in `[start, end)` on
/// `date`. Read-only snapshot of committed state; races are the caller's
/// problem at commit time.
///
/// Checks run cheapest-first and short-circuit:
/// 1. effective active flag
/// 2. the date's weekday is one of the staff member's work days
///    (malformed work-day data fails closed)
/// 3. `[start, end)` is contained in the working hours, not merely
///    overlapping them
/// 4. when a service is given, the staff member must be skilled in it
/// 5. no slot-holding booking for this staff member overlaps `[start, end)`
///    under the half-open rule; `exclude_booking` removes one row from
///    consideration (a reschedule must not conflict with itself)
pub fn is_available(
    conn: &Connection,
    staff: &StaffMember,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    service: Option<&Service>,
    exclude_booking: Option<&str>,
) -> anyhow::Result<bool> {
    if !staff.is_active() {
        return Ok(false);
    }

    if !staff.works_on(date) {
        return Ok(false);
    }

    if start < staff.work_start || end > staff.work_end {
        return Ok(false);
    }

    if let Some(service) = service {
        if !queries::staff_has_skill(conn, staff.id, service.id)? {
            return Ok(false);
        }
    }

    if queries::has_overlapping_booking(conn, staff.id, date, start, end, exclude_booking)? {
        return Ok(false);
    }

    Ok(true)
}
