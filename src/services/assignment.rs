use chrono::{NaiveDate, NaiveTime};
use rand::seq::SliceRandom;
use rand::Rng;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::{Service, StaffMember};
use crate::services::availability;

/// Pick a staff member for a requested window, or `None` when nobody can
/// take it.
///
/// A preferred staff member wins outright when available; no comparison
/// against the rest of the pool. Otherwise all skilled staff are tried in
/// randomized order so the first-listed member does not absorb every
/// unpreferenced booking. The RNG is injected so tests can seed it.
///
/// `end` must already include the inter-appointment buffer: the buffer is
/// reserved in every conflict check even though bookings never store it.
pub fn assign<R: Rng + ?Sized>(
    conn: &Connection,
    service: &Service,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    preferred_staff: Option<i64>,
    exclude_booking: Option<&str>,
    rng: &mut R,
) -> anyhow::Result<Option<StaffMember>> {
    if let Some(preferred_id) = preferred_staff {
        if let Some(staff) = queries::get_staff(conn, preferred_id)? {
            if availability::is_available(
                conn,
                &staff,
                date,
                start,
                end,
                Some(service),
                exclude_booking,
            )? {
                return Ok(Some(staff));
            }
        }
    }

    let mut pool = queries::staff_with_skill(conn, service.id)?;
    pool.shuffle(rng);

    for staff in pool {
        if availability::is_available(
            conn,
            &staff,
            date,
            start,
            end,
            Some(service),
            exclude_booking,
        )? {
            return Ok(Some(staff));
        }
    }

    Ok(None)
}
