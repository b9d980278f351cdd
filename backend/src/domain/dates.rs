//! Date helpers for due dates and month navigation.
//!
//! Every "today"-relative calculation takes the date explicitly; services get
//! it from a [`Clock`] so tests can pin the calendar.

use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use shared::Period;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// The user's calendar date
    fn today(&self) -> NaiveDate;

    fn current_period(&self) -> Period {
        Period::from_date(self.today())
    }
}

/// Wall clock; "today" follows the device's local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// Noon UTC on the given date
    pub fn on(date: NaiveDate) -> Self {
        Self {
            now: date.and_hms_opt(12, 0, 0).unwrap_or_default().and_utc(),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }
}

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Full month name for a 0-based month index
pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get(month as usize)
        .copied()
        .unwrap_or("Invalid Month")
}

pub fn short_month_name(month: u32) -> &'static str {
    let name = month_name(month);
    if name.len() > 3 && month < 12 {
        &name[..3]
    } else {
        name
    }
}

pub fn days_in_month(month: u32, year: i32) -> u32 {
    Period::new(month, year)
        .map(|period| period.days_in_month())
        .unwrap_or(0)
}

/// The due date of a bill in `period`, with the due day clamped to the
/// month's length (a bill due on the 31st falls on Feb 28/29).
pub fn due_date_for_month(due_day: u32, period: Period) -> NaiveDate {
    let day = due_day.clamp(1, period.days_in_month());
    period.day(day).unwrap_or_else(|| period.first_day())
}

/// Whole days from `today` to `due`; negative when overdue, zero when due today.
pub fn days_until_due(due: NaiveDate, today: NaiveDate) -> i64 {
    (due - today).num_days()
}

pub fn is_overdue(due: NaiveDate, today: NaiveDate) -> bool {
    days_until_due(due, today) < 0
}

/// Human description of a due date relative to today.
pub fn format_due_date(due: NaiveDate, today: NaiveDate) -> String {
    match days_until_due(due, today) {
        0 => "Due today".to_string(),
        1 => "Due tomorrow".to_string(),
        -1 => "Due yesterday".to_string(),
        n if n < -1 => format!("{} days overdue", -n),
        n if n <= 7 => format!("Due in {} days", n),
        _ => format!("{} {}", short_month_name(due.month0()), due.day()),
    }
}

pub fn ordinal_suffix(day: u32) -> &'static str {
    if (4..=20).contains(&day) {
        return "th";
    }
    match day % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// "1st", "22nd", "13th"
pub fn format_day_of_month(day: u32) -> String {
    format!("{}{}", day, ordinal_suffix(day))
}
