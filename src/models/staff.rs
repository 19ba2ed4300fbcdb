use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// A staff member who performs services during their working hours.
///
/// `work_days` is stored as a comma-separated list of weekday numbers
/// (0 = Monday .. 6 = Sunday), matching the persisted column format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: i64,
    pub full_name: String,
    pub work_days: String,
    pub work_start: NaiveTime,
    pub work_end: NaiveTime,
    pub active: bool,
    pub override_active: Option<bool>,
}

impl StaffMember {
    /// Effective activity: the admin override, when set, supersedes the
    /// persisted flag until it is explicitly cleared.
    pub fn is_active(&self) -> bool {
        self.override_active.unwrap_or(self.active)
    }

    /// Parse the stored work-day list. Returns `None` when the stored value
    /// is malformed; callers treat that as "never working" (fail closed).
    pub fn work_day_numbers(&self) -> Option<Vec<u32>> {
        let mut days = Vec::new();
        for part in self.work_days.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let n: u32 = part.parse().ok()?;
            if n > 6 {
                return None;
            }
            days.push(n);
        }
        Some(days)
    }

    pub fn works_on(&self, date: NaiveDate) -> bool {
        use chrono::Datelike;
        let weekday = date.weekday().num_days_from_monday();
        match self.work_day_numbers() {
            Some(days) => days.contains(&weekday),
            None => false,
        }
    }
}
