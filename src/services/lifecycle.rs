use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rand::Rng;
use rusqlite::Connection;

use crate::config::AppConfig;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, Service, StaffMember};
use crate::services::{assignment, slots};

/// A successfully created or rescheduled booking together with the rows the
/// response needs to describe it.
#[derive(Debug)]
pub struct BookingOutcome {
    pub booking: Booking,
    pub staff: StaffMember,
    pub service: Service,
}

fn parse_date(s: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
        AppError::Validation("invalid date or time format, use YYYY-MM-DD and HH:MM".to_string())
    })
}

fn parse_time(s: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| {
        AppError::Validation("invalid date or time format, use YYYY-MM-DD and HH:MM".to_string())
    })
}

/// Shared create/reschedule validation: the requested window must not lie in
/// the past and must fit the salon's operating hours. The closing-hour check
/// uses the non-buffered service end; the buffer only matters to staff
/// availability.
fn validate_window(
    config: &AppConfig,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    now: NaiveDateTime,
) -> Result<(), AppError> {
    if date < now.date() || (date == now.date() && start < now.time()) {
        return Err(AppError::Validation(
            "cannot book appointments in the past".to_string(),
        ));
    }

    if start < config.salon_open {
        return Err(AppError::Validation(format!(
            "salon opens at {}",
            config.salon_open.format("%H:%M")
        )));
    }

    if end > config.salon_close {
        return Err(AppError::Validation(format!(
            "salon closes at {}, this appointment would exceed closing time",
            config.salon_close.format("%H:%M")
        )));
    }

    Ok(())
}

fn enforce_reschedule_cutoff(
    booking: &Booking,
    now: NaiveDateTime,
    cutoff_hours: i64,
    action: &str,
) -> Result<(), AppError> {
    if booking.start_datetime() - now < Duration::hours(cutoff_hours) {
        return Err(AppError::Validation(format!(
            "bookings can only be {action} at least {cutoff_hours} hours in advance"
        )));
    }
    Ok(())
}

/// Create a booking: validate the requested window, resolve a staff member
/// (buffer reserved in the availability check), persist as confirmed with a
/// price snapshot. Assignment and insert share one transaction so the
/// overlap re-read and the write commit together.
#[allow(clippy::too_many_arguments)]
pub fn create_booking<R: Rng + ?Sized>(
    conn: &Connection,
    config: &AppConfig,
    customer_id: i64,
    service_id: i64,
    date_str: &str,
    start_str: &str,
    preferred_staff: Option<i64>,
    now: NaiveDateTime,
    rng: &mut R,
) -> Result<BookingOutcome, AppError> {
    let date = parse_date(date_str)?;
    let start = parse_time(start_str)?;

    if queries::get_customer(conn, customer_id)?.is_none() {
        return Err(AppError::NotFound(format!("customer {customer_id}")));
    }

    let service = queries::get_service(conn, service_id)?
        .ok_or_else(|| AppError::NotFound(format!("service {service_id}")))?;

    let end = slots::service_end(start, service.duration_minutes);
    validate_window(config, date, start, end, now)?;

    let end_buffered = slots::end_with_buffer(start, service.duration_minutes, config.buffer_minutes);

    let tx = conn.unchecked_transaction()?;

    let staff = assignment::assign(&tx, &service, date, start, end_buffered, preferred_staff, None, rng)?
        .ok_or_else(|| AppError::Conflict("no staff available for this time slot".to_string()))?;

    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        customer_id,
        service_id: service.id,
        staff_id: staff.id,
        date,
        start_time: start,
        end_time: end,
        price: service.price,
        status: BookingStatus::Confirmed,
        reminder_sent: false,
        created_at: now,
        started_at: None,
        completed_at: None,
        completed_by: None,
    };
    queries::create_booking(&tx, &booking)?;
    tx.commit()?;

    Ok(BookingOutcome { booking, staff, service })
}

/// Start service delivery: confirmed → in_progress, assigned staff only.
pub fn start_booking(
    conn: &Connection,
    booking_id: &str,
    staff_id: i64,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let booking = queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    if booking.staff_id != staff_id {
        return Err(AppError::Forbidden(
            "only the assigned staff member can start this booking".to_string(),
        ));
    }
    if booking.status != BookingStatus::Confirmed {
        return Err(AppError::Conflict(
            "only confirmed bookings can be started".to_string(),
        ));
    }

    let tx = conn.unchecked_transaction()?;
    queries::mark_started(&tx, booking_id, now)?;
    tx.commit()?;

    Ok(Booking {
        status: BookingStatus::InProgress,
        started_at: Some(now),
        ..booking
    })
}

/// Finish service delivery: in_progress → completed, assigned staff only.
/// Records who completed it; receipt delivery is the caller's side effect.
pub fn complete_booking(
    conn: &Connection,
    booking_id: &str,
    staff_id: i64,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let booking = queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    if booking.staff_id != staff_id {
        return Err(AppError::Forbidden(
            "only the assigned staff member can complete this booking".to_string(),
        ));
    }
    if booking.status != BookingStatus::InProgress {
        return Err(AppError::Conflict(
            "only in-progress bookings can be completed".to_string(),
        ));
    }

    let completed_by = queries::get_staff(conn, staff_id)?
        .map(|s| s.full_name)
        .unwrap_or_else(|| format!("staff {staff_id}"));

    let tx = conn.unchecked_transaction()?;
    queries::mark_completed(&tx, booking_id, now, &completed_by)?;
    tx.commit()?;

    Ok(Booking {
        status: BookingStatus::Completed,
        completed_at: Some(now),
        completed_by: Some(completed_by),
        ..booking
    })
}

/// Cancel: confirmed or rescheduled → cancelled, owning customer only,
/// rejected inside the cutoff window before the appointment start.
pub fn cancel_booking(
    conn: &Connection,
    config: &AppConfig,
    booking_id: &str,
    customer_id: i64,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let booking = queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    if booking.customer_id != customer_id {
        return Err(AppError::Forbidden(
            "only the booking's customer can cancel it".to_string(),
        ));
    }
    if !matches!(
        booking.status,
        BookingStatus::Confirmed | BookingStatus::Rescheduled
    ) {
        return Err(AppError::Conflict(
            "only confirmed bookings can be cancelled".to_string(),
        ));
    }

    enforce_reschedule_cutoff(&booking, now, config.reschedule_hours_before, "cancelled")?;

    let tx = conn.unchecked_transaction()?;
    queries::set_booking_status(&tx, booking_id, BookingStatus::Cancelled)?;
    tx.commit()?;

    Ok(Booking {
        status: BookingStatus::Cancelled,
        ..booking
    })
}

/// Reschedule: confirmed only, owning customer only, cutoff computed against
/// the current start. The new window is validated like a create, staff is
/// re-resolved (preferred-first, the booking's own row excluded from overlap
/// checks), and the row is rewritten in place with the reminder flag cleared.
#[allow(clippy::too_many_arguments)]
pub fn reschedule_booking<R: Rng + ?Sized>(
    conn: &Connection,
    config: &AppConfig,
    booking_id: &str,
    customer_id: i64,
    date_str: &str,
    start_str: &str,
    preferred_staff: Option<i64>,
    now: NaiveDateTime,
    rng: &mut R,
) -> Result<BookingOutcome, AppError> {
    let booking = queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    if booking.customer_id != customer_id {
        return Err(AppError::Forbidden(
            "only the booking's customer can reschedule it".to_string(),
        ));
    }
    if booking.status != BookingStatus::Confirmed {
        return Err(AppError::Conflict(
            "only confirmed bookings can be rescheduled".to_string(),
        ));
    }

    enforce_reschedule_cutoff(&booking, now, config.reschedule_hours_before, "rescheduled")?;

    let date = parse_date(date_str)?;
    let start = parse_time(start_str)?;

    let service = queries::get_service(conn, booking.service_id)?
        .ok_or_else(|| AppError::NotFound(format!("service {}", booking.service_id)))?;

    let end = slots::service_end(start, service.duration_minutes);
    validate_window(config, date, start, end, now)?;

    let end_buffered = slots::end_with_buffer(start, service.duration_minutes, config.buffer_minutes);

    let tx = conn.unchecked_transaction()?;

    let staff = assignment::assign(
        &tx,
        &service,
        date,
        start,
        end_buffered,
        preferred_staff,
        Some(booking_id),
        rng,
    )?
    .ok_or_else(|| AppError::Conflict("no staff available for this time slot".to_string()))?;

    queries::apply_reschedule(&tx, booking_id, date, start, end, staff.id)?;
    tx.commit()?;

    let booking = Booking {
        date,
        start_time: start,
        end_time: end,
        staff_id: staff.id,
        status: BookingStatus::Rescheduled,
        reminder_sent: false,
        ..booking
    };
    Ok(BookingOutcome { booking, staff, service })
}

/// Auto-complete in-progress bookings whose end passed more than the grace
/// period ago; the assigned staff member presumably forgot to close them out.
pub fn complete_overdue(
    conn: &Connection,
    now: NaiveDateTime,
    grace_minutes: i64,
) -> anyhow::Result<usize> {
    let tx = conn.unchecked_transaction()?;

    let mut completed = 0;
    for booking in queries::list_in_progress(&tx)? {
        if booking.end_datetime() + Duration::minutes(grace_minutes) < now {
            queries::mark_completed(&tx, &booking.id, now, "auto")?;
            completed += 1;
        }
    }

    tx.commit()?;
    if completed > 0 {
        tracing::info!("auto-completed {completed} overdue booking(s)");
    }
    Ok(completed)
}
