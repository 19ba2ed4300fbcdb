use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::{params, Connection};

use crate::models::{Booking, BookingStatus, Category, Customer, Service, StaffMember};

const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

fn fallback_time() -> NaiveTime {
    NaiveTime::from_hms_opt(0, 0, 0).expect("midnight")
}

fn parse_time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, TIME_FMT).unwrap_or_else(|_| fallback_time())
}

fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, DATE_FMT)
        .unwrap_or_else(|_| NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch"))
}

fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT)
        .unwrap_or_else(|_| NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch").and_time(fallback_time()))
}

// ── Categories ──

pub fn create_category(conn: &Connection, name: &str) -> anyhow::Result<i64> {
    conn.execute("INSERT INTO categories (name) VALUES (?1)", params![name])?;
    Ok(conn.last_insert_rowid())
}

pub fn get_category(conn: &Connection, id: i64) -> anyhow::Result<Option<Category>> {
    let result = conn.query_row(
        "SELECT id, name, is_active FROM categories WHERE id = ?1",
        params![id],
        |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                is_active: row.get::<_, i64>(2)? != 0,
            })
        },
    );

    match result {
        Ok(category) => Ok(Some(category)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Services ──

pub fn create_service(
    conn: &Connection,
    title: &str,
    description: Option<&str>,
    price: f64,
    duration_minutes: i64,
    category_id: i64,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO services (title, description, price, duration_minutes, category_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![title, description, price, duration_minutes, category_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_service(conn: &Connection, id: i64) -> anyhow::Result<Option<Service>> {
    let result = conn.query_row(
        "SELECT id, title, description, price, duration_minutes, is_active, category_id, created_at
         FROM services WHERE id = ?1",
        params![id],
        |row| Ok(parse_service_row(row)),
    );

    match result {
        Ok(service) => Ok(Some(service?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_services(conn: &Connection) -> anyhow::Result<Vec<Service>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, description, price, duration_minutes, is_active, category_id, created_at
         FROM services ORDER BY title ASC",
    )?;
    let rows = stmt.query_map([], |row| Ok(parse_service_row(row)))?;

    let mut services = vec![];
    for row in rows {
        services.push(row??);
    }
    Ok(services)
}

fn parse_service_row(row: &rusqlite::Row) -> anyhow::Result<Service> {
    let created_at_str: String = row.get(7)?;
    Ok(Service {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        duration_minutes: row.get(4)?,
        is_active: row.get::<_, i64>(5)? != 0,
        category_id: row.get(6)?,
        created_at: parse_datetime(&created_at_str),
    })
}

// ── Customers ──

pub fn create_customer(conn: &Connection, name: &str, email: &str) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO customers (name, email) VALUES (?1, ?2)",
        params![name, email],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_customer(conn: &Connection, id: i64) -> anyhow::Result<Option<Customer>> {
    let result = conn.query_row(
        "SELECT id, name, email FROM customers WHERE id = ?1",
        params![id],
        |row| {
            Ok(Customer {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
            })
        },
    );

    match result {
        Ok(customer) => Ok(Some(customer)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Staff ──

pub fn create_staff(
    conn: &Connection,
    full_name: &str,
    work_days: &str,
    work_start: NaiveTime,
    work_end: NaiveTime,
    active: bool,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO staff (full_name, work_days, work_start, work_end, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            full_name,
            work_days,
            work_start.format(TIME_FMT).to_string(),
            work_end.format(TIME_FMT).to_string(),
            active as i64,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_staff(conn: &Connection, id: i64) -> anyhow::Result<Option<StaffMember>> {
    let result = conn.query_row(
        "SELECT id, full_name, work_days, work_start, work_end, is_active, override_active
         FROM staff WHERE id = ?1",
        params![id],
        |row| Ok(parse_staff_row(row)),
    );

    match result {
        Ok(staff) => Ok(Some(staff?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_staff(conn: &Connection) -> anyhow::Result<Vec<StaffMember>> {
    let mut stmt = conn.prepare(
        "SELECT id, full_name, work_days, work_start, work_end, is_active, override_active
         FROM staff ORDER BY full_name ASC",
    )?;
    let rows = stmt.query_map([], |row| Ok(parse_staff_row(row)))?;

    let mut staff = vec![];
    for row in rows {
        staff.push(row??);
    }
    Ok(staff)
}

pub fn save_staff(conn: &Connection, staff: &StaffMember) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE staff SET full_name = ?1, work_days = ?2, work_start = ?3, work_end = ?4,
                          is_active = ?5, override_active = ?6
         WHERE id = ?7",
        params![
            staff.full_name,
            staff.work_days,
            staff.work_start.format(TIME_FMT).to_string(),
            staff.work_end.format(TIME_FMT).to_string(),
            staff.active as i64,
            staff.override_active.map(|v| v as i64),
            staff.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn set_staff_skills(conn: &Connection, staff_id: i64, service_ids: &[i64]) -> anyhow::Result<()> {
    conn.execute("DELETE FROM staff_skills WHERE staff_id = ?1", params![staff_id])?;
    let mut stmt =
        conn.prepare("INSERT INTO staff_skills (staff_id, service_id) VALUES (?1, ?2)")?;
    for service_id in service_ids {
        stmt.execute(params![staff_id, service_id])?;
    }
    Ok(())
}

pub fn staff_has_skill(conn: &Connection, staff_id: i64, service_id: i64) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM staff_skills WHERE staff_id = ?1 AND service_id = ?2",
        params![staff_id, service_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn skills_for_staff(conn: &Connection, staff_id: i64) -> anyhow::Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT service_id FROM staff_skills WHERE staff_id = ?1 ORDER BY service_id ASC",
    )?;
    let rows = stmt.query_map(params![staff_id], |row| row.get(0))?;

    let mut ids = vec![];
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

pub fn staff_with_skill(conn: &Connection, service_id: i64) -> anyhow::Result<Vec<StaffMember>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.full_name, s.work_days, s.work_start, s.work_end, s.is_active, s.override_active
         FROM staff s
         INNER JOIN staff_skills sk ON sk.staff_id = s.id
         WHERE sk.service_id = ?1
         ORDER BY s.id ASC",
    )?;
    let rows = stmt.query_map(params![service_id], |row| Ok(parse_staff_row(row)))?;

    let mut staff = vec![];
    for row in rows {
        staff.push(row??);
    }
    Ok(staff)
}

fn parse_staff_row(row: &rusqlite::Row) -> anyhow::Result<StaffMember> {
    let work_start_str: String = row.get(3)?;
    let work_end_str: String = row.get(4)?;
    let override_active: Option<i64> = row.get(6)?;

    Ok(StaffMember {
        id: row.get(0)?,
        full_name: row.get(1)?,
        work_days: row.get(2)?,
        work_start: parse_time(&work_start_str),
        work_end: parse_time(&work_end_str),
        active: row.get::<_, i64>(5)? != 0,
        override_active: override_active.map(|v| v != 0),
    })
}

// ── Bookings ──

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, customer_id, service_id, staff_id, date, start_time, end_time,
                               price, status, reminder_sent, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            booking.id,
            booking.customer_id,
            booking.service_id,
            booking.staff_id,
            booking.date.format(DATE_FMT).to_string(),
            booking.start_time.format(TIME_FMT).to_string(),
            booking.end_time.format(TIME_FMT).to_string(),
            booking.price,
            booking.status.as_str(),
            booking.reminder_sent as i64,
            booking.created_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("{BOOKING_SELECT} WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn bookings_for_customer(
    conn: &Connection,
    customer_id: i64,
    status_filter: Option<&str>,
) -> anyhow::Result<Vec<Booking>> {
    let mut bookings = vec![];
    match status_filter {
        Some(status) => {
            let mut stmt = conn.prepare(&format!(
                "{BOOKING_SELECT} WHERE customer_id = ?1 AND status = ?2
                 ORDER BY date DESC, start_time DESC"
            ))?;
            let rows = stmt.query_map(params![customer_id, status], |row| Ok(parse_booking_row(row)))?;
            for row in rows {
                bookings.push(row??);
            }
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "{BOOKING_SELECT} WHERE customer_id = ?1 ORDER BY date DESC, start_time DESC"
            ))?;
            let rows = stmt.query_map(params![customer_id], |row| Ok(parse_booking_row(row)))?;
            for row in rows {
                bookings.push(row??);
            }
        }
    }
    Ok(bookings)
}

/// Half-open overlap test against slot-holding bookings for one staff member
/// on one date: an existing booking conflicts iff
/// `existing.start < end AND start < existing.end`. Touching endpoints do
/// not conflict. `exclude` removes one booking id from consideration so a
/// reschedule never collides with its own row.
pub fn has_overlapping_booking(
    conn: &Connection,
    staff_id: i64,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    exclude: Option<&str>,
) -> anyhow::Result<bool> {
    let date_str = date.format(DATE_FMT).to_string();
    let start_str = start.format(TIME_FMT).to_string();
    let end_str = end.format(TIME_FMT).to_string();

    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE staff_id = ?1 AND date = ?2
           AND status IN ('confirmed', 'in_progress')
           AND start_time < ?4 AND end_time > ?3
           AND id != ?5",
        params![staff_id, date_str, start_str, end_str, exclude.unwrap_or("")],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn mark_started(conn: &Connection, id: &str, now: NaiveDateTime) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = 'in_progress', started_at = ?1 WHERE id = ?2",
        params![now.format(DATETIME_FMT).to_string(), id],
    )?;
    Ok(count > 0)
}

pub fn mark_completed(
    conn: &Connection,
    id: &str,
    now: NaiveDateTime,
    completed_by: &str,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = 'completed', completed_at = ?1, completed_by = ?2
         WHERE id = ?3",
        params![now.format(DATETIME_FMT).to_string(), completed_by, id],
    )?;
    Ok(count > 0)
}

pub fn set_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(count > 0)
}

/// Rewrite a booking's schedule in place: new date/time/staff, status reset
/// to rescheduled, reminder flag cleared so the new time gets its own
/// reminder.
pub fn apply_reschedule(
    conn: &Connection,
    id: &str,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    staff_id: i64,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET date = ?1, start_time = ?2, end_time = ?3, staff_id = ?4,
                             status = 'rescheduled', reminder_sent = 0
         WHERE id = ?5",
        params![
            date.format(DATE_FMT).to_string(),
            start.format(TIME_FMT).to_string(),
            end.format(TIME_FMT).to_string(),
            staff_id,
            id,
        ],
    )?;
    Ok(count > 0)
}

// ── Sweep queries ──

/// Reminder candidates: unsent, still-live bookings whose date falls in the
/// given range. The caller narrows to the precise 23-25h datetime window.
pub fn reminder_candidates(
    conn: &Connection,
    from_date: NaiveDate,
    to_date: NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "{BOOKING_SELECT}
         WHERE status IN ('confirmed', 'pending') AND reminder_sent = 0
           AND date >= ?1 AND date <= ?2
         ORDER BY date ASC, start_time ASC"
    ))?;
    let rows = stmt.query_map(
        params![
            from_date.format(DATE_FMT).to_string(),
            to_date.format(DATE_FMT).to_string(),
        ],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn mark_reminders_sent(conn: &Connection, ids: &[String]) -> anyhow::Result<usize> {
    let mut stmt = conn.prepare("UPDATE bookings SET reminder_sent = 1 WHERE id = ?1")?;
    let mut updated = 0;
    for id in ids {
        updated += stmt.execute(params![id])?;
    }
    Ok(updated)
}

/// Delete bookings whose end datetime is before the cutoff and whose status
/// never reached a kept terminal state. Completed and rescheduled history is
/// retained.
pub fn delete_expired_bookings(
    conn: &Connection,
    cutoff: NaiveDateTime,
) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM bookings
         WHERE (date < ?1 OR (date = ?1 AND end_time < ?2))
           AND status NOT IN ('completed', 'rescheduled')",
        params![
            cutoff.date().format(DATE_FMT).to_string(),
            cutoff.time().format(TIME_FMT).to_string(),
        ],
    )?;
    Ok(count)
}

pub fn count_expired_bookings(conn: &Connection, cutoff: NaiveDateTime) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE (date < ?1 OR (date = ?1 AND end_time < ?2))
           AND status NOT IN ('completed', 'rescheduled')",
        params![
            cutoff.date().format(DATE_FMT).to_string(),
            cutoff.time().format(TIME_FMT).to_string(),
        ],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn list_in_progress(conn: &Connection) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "{BOOKING_SELECT} WHERE status = 'in_progress' ORDER BY date ASC, start_time ASC"
    ))?;
    let rows = stmt.query_map([], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

const BOOKING_SELECT: &str =
    "SELECT id, customer_id, service_id, staff_id, date, start_time, end_time, price, status,
            reminder_sent, created_at, started_at, completed_at, completed_by
     FROM bookings";

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let date_str: String = row.get(4)?;
    let start_str: String = row.get(5)?;
    let end_str: String = row.get(6)?;
    let status_str: String = row.get(8)?;
    let created_at_str: String = row.get(10)?;
    let started_at_str: Option<String> = row.get(11)?;
    let completed_at_str: Option<String> = row.get(12)?;

    Ok(Booking {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        service_id: row.get(2)?,
        staff_id: row.get(3)?,
        date: parse_date(&date_str),
        start_time: parse_time(&start_str),
        end_time: parse_time(&end_str),
        price: row.get(7)?,
        status: BookingStatus::parse(&status_str),
        reminder_sent: row.get::<_, i64>(9)? != 0,
        created_at: parse_datetime(&created_at_str),
        started_at: started_at_str.as_deref().map(parse_datetime),
        completed_at: completed_at_str.as_deref().map(parse_datetime),
        completed_by: row.get(13)?,
    })
}
