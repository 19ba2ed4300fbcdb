use std::sync::Arc;

use chrono::{Duration, NaiveDateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::db::queries;
use crate::models::Booking;
use crate::services::lifecycle;
use crate::state::AppState;

/// Reminders go out for bookings starting between 23 and 25 hours from now,
/// so an hourly pass cannot miss the 24-hour mark.
const REMINDER_WINDOW_START_HOURS: i64 = 23;
const REMINDER_WINDOW_END_HOURS: i64 = 25;

/// Bookings are purged once their end is this far in the past, unless their
/// status is a kept terminal state.
const EXPIRY_AGE_HOURS: i64 = 24;

#[derive(Debug, Default, Serialize)]
pub struct SweepOutcome {
    pub reminders_sent: usize,
    pub bookings_deleted: usize,
    pub overdue_completed: usize,
}

struct ReminderItem {
    booking_id: String,
    email: String,
    subject: String,
    body: String,
}

fn reminder_window(now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    (
        now + Duration::hours(REMINDER_WINDOW_START_HOURS),
        now + Duration::hours(REMINDER_WINDOW_END_HOURS),
    )
}

fn reminder_item(
    conn: &rusqlite::Connection,
    booking: &Booking,
) -> anyhow::Result<Option<ReminderItem>> {
    let Some(customer) = queries::get_customer(conn, booking.customer_id)? else {
        return Ok(None);
    };
    let service_title = queries::get_service(conn, booking.service_id)?
        .map(|s| s.title)
        .unwrap_or_else(|| "your service".to_string());
    let staff_name = queries::get_staff(conn, booking.staff_id)?
        .map(|s| s.full_name)
        .unwrap_or_else(|| "our team".to_string());

    let body = format!(
        "Hello {},\n\nThis is a reminder that your appointment is tomorrow:\n\n\
         Service: {service_title}\nWith: {staff_name}\nDate: {}\nTime: {} - {}\nPrice: {:.2}\n\n\
         Please arrive 5-10 minutes early. If you need to reschedule or cancel,\n\
         please contact us as soon as possible.",
        customer.name,
        booking.date.format("%B %d, %Y"),
        booking.start_time.format("%H:%M"),
        booking.end_time.format("%H:%M"),
        booking.price,
    );

    Ok(Some(ReminderItem {
        booking_id: booking.id.clone(),
        email: customer.email,
        subject: "Booking reminder - your appointment is tomorrow".to_string(),
        body,
    }))
}

/// Send 24-hour reminders for unsent, still-live bookings.
///
/// The date range narrows candidates in SQL; the precise 23-25h window is
/// checked on the combined date+time. One notification failure never blocks
/// the rest: only successfully sent bookings get their flag set, in a single
/// transaction, so failures are retried on the next run.
pub async fn run_reminder_pass(state: &AppState, now: NaiveDateTime) -> anyhow::Result<usize> {
    let (window_start, window_end) = reminder_window(now);

    let items = {
        let db = state.db.lock().unwrap();
        let candidates =
            queries::reminder_candidates(&db, window_start.date(), window_end.date())?;

        let mut items = vec![];
        for booking in candidates {
            let starts = booking.start_datetime();
            if starts < window_start || starts > window_end {
                continue;
            }
            if let Some(item) = reminder_item(&db, &booking)? {
                items.push(item);
            }
        }
        items
    };

    let mut sent_ids = vec![];
    for item in &items {
        match state.notifier.send(&item.email, &item.subject, &item.body).await {
            Ok(()) => sent_ids.push(item.booking_id.clone()),
            Err(e) => {
                tracing::warn!(
                    "failed to send reminder for booking {}: {e}",
                    item.booking_id
                );
            }
        }
    }

    if !sent_ids.is_empty() {
        let db = state.db.lock().unwrap();
        let tx = db.unchecked_transaction()?;
        queries::mark_reminders_sent(&tx, &sent_ids)?;
        tx.commit()?;
    }

    tracing::info!(
        "reminder pass: {} sent of {} due",
        sent_ids.len(),
        items.len()
    );
    Ok(sent_ids.len())
}

/// Delete abandoned bookings whose end passed more than a day ago.
/// Completed and rescheduled rows are history and stay. Idempotent.
pub fn run_expiry_pass(state: &AppState, now: NaiveDateTime) -> anyhow::Result<usize> {
    let cutoff = now - Duration::hours(EXPIRY_AGE_HOURS);

    let db = state.db.lock().unwrap();
    let tx = db.unchecked_transaction()?;
    let deleted = queries::delete_expired_bookings(&tx, cutoff)?;
    tx.commit()?;

    if deleted > 0 {
        tracing::info!("expiry pass: deleted {deleted} stale booking(s)");
    }
    Ok(deleted)
}

pub fn run_overdue_pass(state: &AppState, now: NaiveDateTime) -> anyhow::Result<usize> {
    let db = state.db.lock().unwrap();
    lifecycle::complete_overdue(&db, now, state.config.overdue_grace_minutes)
}

/// Run every pass once; the manual trigger endpoint uses this. Each pass is
/// isolated: a failing pass is logged and reported as zero effect while the
/// others still run.
pub async fn run_all(state: &AppState, now: NaiveDateTime) -> SweepOutcome {
    let reminders_sent = run_reminder_pass(state, now).await.unwrap_or_else(|e| {
        tracing::error!("reminder pass failed: {e}");
        0
    });
    let overdue_completed = run_overdue_pass(state, now).unwrap_or_else(|e| {
        tracing::error!("overdue pass failed: {e}");
        0
    });
    let bookings_deleted = run_expiry_pass(state, now).unwrap_or_else(|e| {
        tracing::error!("expiry pass failed: {e}");
        0
    });

    SweepOutcome {
        reminders_sent,
        bookings_deleted,
        overdue_completed,
    }
}

/// Counts reported by the sweep status endpoint.
pub fn pending_counts(state: &AppState, now: NaiveDateTime) -> anyhow::Result<(i64, i64)> {
    let (window_start, window_end) = reminder_window(now);

    let db = state.db.lock().unwrap();
    let candidates = queries::reminder_candidates(&db, window_start.date(), window_end.date())?;
    let pending_reminders = candidates
        .iter()
        .filter(|b| {
            let starts = b.start_datetime();
            starts >= window_start && starts <= window_end
        })
        .count() as i64;

    let to_delete = queries::count_expired_bookings(&db, now - Duration::hours(EXPIRY_AGE_HOURS))?;
    Ok((pending_reminders, to_delete))
}

/// Owns the two background sweep loops. Start and stop are idempotent; stop
/// only prevents new triggers, an in-flight pass always finishes.
pub struct SweepScheduler {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Default for SweepScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl SweepScheduler {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            handles: vec![],
        }
    }

    pub fn start(&mut self, state: Arc<AppState>) {
        if !self.handles.is_empty() {
            return;
        }

        let reminder_period = std::time::Duration::from_secs(state.config.reminder_interval_secs);
        let cleanup_period = std::time::Duration::from_secs(state.config.cleanup_interval_secs);

        // Hourly: the first reminder tick fires immediately so a restart
        // never skips a reminder window.
        let mut rx = self.shutdown.subscribe();
        let hourly_state = state.clone();
        self.handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(reminder_period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let now = Utc::now().naive_utc();
                        if let Err(e) = run_reminder_pass(&hourly_state, now).await {
                            tracing::error!("reminder pass failed: {e}");
                        }
                        if let Err(e) = run_overdue_pass(&hourly_state, now) {
                            tracing::error!("overdue pass failed: {e}");
                        }
                    }
                    _ = rx.changed() => break,
                }
            }
        }));

        // Every six hours: cleanup waits a full period before its first run.
        let mut rx = self.shutdown.subscribe();
        self.handles.push(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + cleanup_period;
            let mut interval = tokio::time::interval_at(start, cleanup_period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let now = Utc::now().naive_utc();
                        if let Err(e) = run_expiry_pass(&state, now) {
                            tracing::error!("expiry pass failed: {e}");
                        }
                    }
                    _ = rx.changed() => break,
                }
            }
        }));

        tracing::info!("sweep scheduler started");
    }

    pub async fn stop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        let _ = self.shutdown.send(true);
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
        tracing::info!("sweep scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db;
    use crate::models::{Booking, BookingStatus};
    use crate::services::notifications::NotificationProvider;
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime};
    use std::sync::Mutex;

    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl NotificationProvider for RecordingNotifier {
        async fn send(&self, to: &str, _subject: &str, _body: &str) -> anyhow::Result<()> {
            if self.fail_for.as_deref() == Some(to) {
                anyhow::bail!("smtp unreachable");
            }
            self.sent.lock().unwrap().push(to.to_string());
            Ok(())
        }
    }

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn test_state(fail_for: Option<&str>) -> Arc<AppState> {
        let conn = db::init_db(":memory:").unwrap();
        let config = AppConfig {
            port: 0,
            database_url: ":memory:".to_string(),
            salon_open: t("08:00"),
            salon_close: t("22:00"),
            buffer_minutes: 10,
            reschedule_hours_before: 24,
            overdue_grace_minutes: 15,
            time_blocks: crate::config::TimeBlocks::default(),
            reminder_interval_secs: 3600,
            cleanup_interval_secs: 6 * 3600,
        };
        Arc::new(AppState {
            db: Arc::new(std::sync::Mutex::new(conn)),
            config,
            notifier: Box::new(RecordingNotifier {
                sent: Mutex::new(vec![]),
                fail_for: fail_for.map(|s| s.to_string()),
            }),
        })
    }

    fn seed_booking(
        state: &AppState,
        email: &str,
        date: &str,
        start: &str,
        end: &str,
        status: BookingStatus,
    ) -> String {
        let db = state.db.lock().unwrap();
        let category_id = queries::create_category(&db, &format!("cat-{email}-{start}")).unwrap();
        let service_id = queries::create_service(
            &db,
            &format!("svc-{email}-{date}-{start}"),
            None,
            35.0,
            45,
            category_id,
        )
        .unwrap();
        let staff_id = queries::create_staff(
            &db,
            "Dana",
            "0,1,2,3,4,5,6",
            t("08:00"),
            t("22:00"),
            true,
        )
        .unwrap();
        let customer_id = queries::create_customer(
            &db,
            "Alice",
            &format!("{email}+{date}{start}@x.test"),
        )
        .unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let booking = Booking {
            id: id.clone(),
            customer_id,
            service_id,
            staff_id,
            date: d(date),
            start_time: t(start),
            end_time: t(end),
            price: 35.0,
            status,
            reminder_sent: false,
            created_at: dt("2025-06-01 10:00"),
            started_at: None,
            completed_at: None,
            completed_by: None,
        };
        queries::create_booking(&db, &booking).unwrap();
        id
    }

    const NOW: &str = "2025-06-16 10:00";

    #[tokio::test]
    async fn test_reminder_pass_marks_only_window_matches() {
        let state = test_state(None);
        // 24h out: due. 2h out: not due. 48h out: not due.
        let due = seed_booking(&state, "due", "2025-06-17", "10:00", "10:45", BookingStatus::Confirmed);
        let soon = seed_booking(&state, "soon", "2025-06-16", "12:00", "12:45", BookingStatus::Confirmed);
        let far = seed_booking(&state, "far", "2025-06-18", "10:00", "10:45", BookingStatus::Confirmed);

        let sent = run_reminder_pass(&state, dt(NOW)).await.unwrap();
        assert_eq!(sent, 1);

        let db = state.db.lock().unwrap();
        assert!(queries::get_booking(&db, &due).unwrap().unwrap().reminder_sent);
        assert!(!queries::get_booking(&db, &soon).unwrap().unwrap().reminder_sent);
        assert!(!queries::get_booking(&db, &far).unwrap().unwrap().reminder_sent);
    }

    #[tokio::test]
    async fn test_reminder_pass_skips_already_sent_and_dead_statuses() {
        let state = test_state(None);
        let sent_already =
            seed_booking(&state, "a", "2025-06-17", "10:00", "10:45", BookingStatus::Confirmed);
        seed_booking(&state, "b", "2025-06-17", "10:00", "10:45", BookingStatus::Cancelled);
        {
            let db = state.db.lock().unwrap();
            queries::mark_reminders_sent(&db, &[sent_already]).unwrap();
        }

        let sent = run_reminder_pass(&state, dt(NOW)).await.unwrap();
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn test_reminder_send_failure_is_isolated() {
        // The "fail" customer's address errors out; the other still gets its
        // reminder and only that one is marked.
        let state = test_state(Some("fail+2025-06-1710:00@x.test"));
        let failing =
            seed_booking(&state, "fail", "2025-06-17", "10:00", "10:45", BookingStatus::Confirmed);
        let ok =
            seed_booking(&state, "ok", "2025-06-17", "11:00", "11:45", BookingStatus::Confirmed);

        let sent = run_reminder_pass(&state, dt(NOW)).await.unwrap();
        assert_eq!(sent, 1);

        let db = state.db.lock().unwrap();
        assert!(!queries::get_booking(&db, &failing).unwrap().unwrap().reminder_sent);
        assert!(queries::get_booking(&db, &ok).unwrap().unwrap().reminder_sent);
    }

    #[tokio::test]
    async fn test_expiry_pass_deletes_stale_and_is_idempotent() {
        let state = test_state(None);
        // Ended two days ago, never progressed: purged.
        let stale =
            seed_booking(&state, "x", "2025-06-14", "10:00", "10:45", BookingStatus::Confirmed);
        // Ended two days ago but completed: kept.
        let done =
            seed_booking(&state, "y", "2025-06-14", "11:00", "11:45", BookingStatus::Completed);
        // Rescheduled history: kept.
        let moved =
            seed_booking(&state, "z", "2025-06-14", "12:00", "12:45", BookingStatus::Rescheduled);
        // Ended an hour ago, within the 24h retention: kept for now.
        let recent =
            seed_booking(&state, "w", "2025-06-16", "08:00", "08:45", BookingStatus::Confirmed);

        assert_eq!(run_expiry_pass(&state, dt(NOW)).unwrap(), 1);
        assert_eq!(run_expiry_pass(&state, dt(NOW)).unwrap(), 0);

        let db = state.db.lock().unwrap();
        assert!(queries::get_booking(&db, &stale).unwrap().is_none());
        assert!(queries::get_booking(&db, &done).unwrap().is_some());
        assert!(queries::get_booking(&db, &moved).unwrap().is_some());
        assert!(queries::get_booking(&db, &recent).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_pending_counts() {
        let state = test_state(None);
        seed_booking(&state, "due", "2025-06-17", "10:00", "10:45", BookingStatus::Confirmed);
        seed_booking(&state, "old", "2025-06-14", "10:00", "10:45", BookingStatus::Confirmed);

        let (reminders, to_delete) = pending_counts(&state, dt(NOW)).unwrap();
        assert_eq!(reminders, 1);
        assert_eq!(to_delete, 1);
    }

    #[tokio::test]
    async fn test_run_all_reports_counts() {
        let state = test_state(None);
        seed_booking(&state, "due", "2025-06-17", "10:00", "10:45", BookingStatus::Confirmed);
        seed_booking(&state, "old", "2025-06-14", "10:00", "10:45", BookingStatus::Confirmed);

        let outcome = run_all(&state, dt(NOW)).await;
        assert_eq!(outcome.reminders_sent, 1);
        assert_eq!(outcome.bookings_deleted, 1);
        assert_eq!(outcome.overdue_completed, 0);
    }

    #[tokio::test]
    async fn test_scheduler_start_stop_idempotent() {
        let state = test_state(None);
        let mut scheduler = SweepScheduler::new();
        scheduler.start(state.clone());
        scheduler.start(state);
        assert_eq!(scheduler.handles.len(), 2);

        scheduler.stop().await;
        scheduler.stop().await;
        assert!(scheduler.handles.is_empty());
    }
}
