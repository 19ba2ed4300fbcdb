use std::env;

use chrono::NaiveTime;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub salon_open: NaiveTime,
    pub salon_close: NaiveTime,
    pub buffer_minutes: i64,
    pub reschedule_hours_before: i64,
    pub overdue_grace_minutes: i64,
    pub time_blocks: TimeBlocks,
    pub reminder_interval_secs: u64,
    pub cleanup_interval_secs: u64,
}

/// Half-open day-part bands used to group available slots. The three bands
/// are expected to tile the open/close range; a start time outside all of
/// them falls back to evening.
#[derive(Clone, Debug)]
pub struct TimeBlocks {
    pub morning: (NaiveTime, NaiveTime),
    pub afternoon: (NaiveTime, NaiveTime),
    pub evening: (NaiveTime, NaiveTime),
}

impl Default for TimeBlocks {
    fn default() -> Self {
        Self {
            morning: (hm(8, 0), hm(12, 0)),
            afternoon: (hm(12, 0), hm(17, 0)),
            evening: (hm(17, 0), hm(22, 0)),
        }
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("static time literal")
}

fn env_time(key: &str, default: NaiveTime) -> NaiveTime {
    env::var(key)
        .ok()
        .and_then(|v| NaiveTime::parse_from_str(&v, "%H:%M").ok())
        .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "salonbook.db".to_string()),
            salon_open: env_time("SALON_OPEN", hm(8, 0)),
            salon_close: env_time("SALON_CLOSE", hm(22, 0)),
            buffer_minutes: env_i64("BUFFER_MINUTES", 10),
            reschedule_hours_before: env_i64("RESCHEDULE_HOURS_BEFORE", 24),
            overdue_grace_minutes: env_i64("OVERDUE_GRACE_MINUTES", 15),
            time_blocks: TimeBlocks::default(),
            reminder_interval_secs: env_i64("REMINDER_INTERVAL_SECS", 3600) as u64,
            cleanup_interval_secs: env_i64("CLEANUP_INTERVAL_SECS", 6 * 3600) as u64,
        }
    }
}
