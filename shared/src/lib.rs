use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A calendar month. `month` is 0-based (0 = January, 11 = December) to
/// match the month index stored on payment rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawPeriod")]
pub struct Period {
    month: u32,
    year: i32,
}

/// Unchecked wire form of [`Period`]; deserialization goes through
/// [`Period::new`] so an out-of-range month is rejected.
#[derive(Deserialize)]
struct RawPeriod {
    month: u32,
    year: i32,
}

impl TryFrom<RawPeriod> for Period {
    type Error = String;

    fn try_from(raw: RawPeriod) -> Result<Self, Self::Error> {
        Period::new(raw.month, raw.year)
            .ok_or_else(|| format!("invalid period: month {} of {}", raw.month, raw.year))
    }
}

impl Period {
    /// Returns `None` when the month index is out of range or the year is
    /// outside the supported calendar.
    pub fn new(month: u32, year: i32) -> Option<Self> {
        if month > 11 {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month + 1, 1)?;
        Some(Self { month, year })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            month: date.month0(),
            year: date.year(),
        }
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month + 1, 1).unwrap_or_default()
    }

    /// The date of `day` within this month, `None` past the last day.
    pub fn day(&self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month + 1, day)
    }

    pub fn days_in_month(&self) -> u32 {
        match self.month {
            1 => {
                if is_leap_year(self.year) {
                    29
                } else {
                    28
                }
            }
            3 | 5 | 8 | 10 => 30,
            _ => 31,
        }
    }

    /// Decrementing from January wraps to December of the previous year.
    pub fn previous(&self) -> Self {
        if self.month == 0 {
            Self {
                month: 11,
                year: self.year - 1,
            }
        } else {
            Self {
                month: self.month - 1,
                year: self.year,
            }
        }
    }

    /// Incrementing from December wraps to January of the next year.
    pub fn next(&self) -> Self {
        if self.month == 11 {
            Self {
                month: 0,
                year: self.year + 1,
            }
        } else {
            Self {
                month: self.month + 1,
                year: self.year,
            }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month0() == self.month
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month + 1)
    }
}

pub fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Entity ID in format: "<epoch_millis>_<9 hex chars>"
pub fn generate_entity_id(now_millis: i64) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", now_millis, &random[..9])
}

// ---------------------------------------------------------------------------
// Bills
// ---------------------------------------------------------------------------

/// How often a bill recurs. Only `Monthly` drives any calculation today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BillFrequency {
    #[default]
    Monthly,
    Weekly,
    Biweekly,
    Quarterly,
    Yearly,
}

/// A recurring obligation due on a day of each month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: String,
    pub name: String,
    /// Day of month (1-31); clamped to the month length when computing due dates
    pub due_day: u32,
    pub frequency: BillFrequency,
    pub expected_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub notifications_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bill {
    pub fn from_draft(draft: NewBill, id: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            due_day: draft.due_day,
            frequency: draft.frequency,
            expected_amount: draft.expected_amount,
            category: draft.category,
            notifications_enabled: draft.notifications_enabled,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge the fields present in `patch` and refresh `updated_at`.
    pub fn apply_patch(&mut self, patch: BillPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(due_day) = patch.due_day {
            self.due_day = due_day;
        }
        if let Some(frequency) = patch.frequency {
            self.frequency = frequency;
        }
        if let Some(expected_amount) = patch.expected_amount {
            self.expected_amount = expected_amount;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(enabled) = patch.notifications_enabled {
            self.notifications_enabled = enabled;
        }
        self.updated_at = now;
    }
}

/// User-supplied fields for a new bill; id and timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBill {
    pub name: String,
    pub due_day: u32,
    pub frequency: BillFrequency,
    pub expected_amount: f64,
    #[serde(default)]
    pub category: Option<String>,
    pub notifications_enabled: bool,
}

/// Partial update for a bill. `category: Some(None)` clears the category.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BillPatch {
    pub name: Option<String>,
    pub due_day: Option<u32>,
    pub frequency: Option<BillFrequency>,
    pub expected_amount: Option<f64>,
    pub category: Option<Option<String>>,
    pub notifications_enabled: Option<bool>,
}

/// Records that a bill was paid for one (month, year).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillPayment {
    pub id: String,
    pub bill_id: String,
    /// 0-based month index
    pub month: u32,
    pub year: i32,
    pub is_paid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl BillPayment {
    pub fn matches(&self, bill_id: &str, period: Period) -> bool {
        self.bill_id == bill_id && self.month == period.month() && self.year == period.year()
    }
}

/// A bill joined with its payment status for one target month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyBillView {
    #[serde(flatten)]
    pub bill: Bill,
    pub payment: Option<BillPayment>,
    pub is_paid_this_month: bool,
    /// Actual amount when paid with an override, expected amount otherwise
    pub amount_due: f64,
    pub due_date: NaiveDate,
    pub is_overdue: bool,
    /// Negative when overdue, zero when due today
    pub days_until_due: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub month: u32,
    pub year: i32,
    pub total_income: f64,
    pub total_bills_scheduled: f64,
    pub total_bills_paid: f64,
    pub total_bills_remaining: f64,
    pub remaining_balance: f64,
    pub upcoming_bills_count: usize,
    pub paid_bills_count: usize,
}

/// Bills split by whether their category is a fixed commitment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BillCategorySplit {
    pub fixed: Vec<Bill>,
    pub flexible: Vec<Bill>,
}

// ---------------------------------------------------------------------------
// Income
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayFrequency {
    Weekly,
    Biweekly,
    Monthly,
}

impl PayFrequency {
    /// Factor that turns one paycheck into a monthly amount.
    pub fn multiplier(&self) -> f64 {
        match self {
            PayFrequency::Weekly => 4.33,
            PayFrequency::Biweekly => 2.17,
            PayFrequency::Monthly => 1.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PayFrequency::Weekly => "Weekly",
            PayFrequency::Biweekly => "Bi-weekly",
            PayFrequency::Monthly => "Monthly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedIncome {
    pub amount: f64,
    pub frequency: PayFrequency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_pay_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableIncome {
    pub min_amount: f64,
    pub max_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// The user's declared income shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum IncomeProfile {
    Fixed(FixedIncome),
    Variable(VariableIncome),
}

/// Device-wide singleton holding income and notification preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Legacy flat income; also caches the estimate of `income_profile`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_income: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income_profile: Option<IncomeProfile>,
    pub notifications_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            monthly_income: None,
            income_profile: None,
            notifications_enabled: true,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for UserProfile {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

// ---------------------------------------------------------------------------
// Savings
// ---------------------------------------------------------------------------

pub const SAVINGS_ICONS: [&str; 10] = [
    "piggy-bank",
    "home",
    "car",
    "plane",
    "gift",
    "heart",
    "graduation-cap",
    "briefcase",
    "umbrella",
    "shield",
];

pub const SAVINGS_COLORS: [&str; 8] = [
    "#4A6FA5", "#2E7D5A", "#D4A853", "#9B59B6", "#E67E22", "#1ABC9C", "#E74C3C", "#3498DB",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsGoal {
    pub id: String,
    pub name: String,
    pub target_amount: f64,
    pub current_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SavingsGoal {
    pub fn from_draft(draft: NewSavingsGoal, id: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            target_amount: draft.target_amount,
            current_amount: draft.current_amount,
            icon: draft.icon,
            color: draft.color,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_patch(&mut self, patch: SavingsGoalPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(target_amount) = patch.target_amount {
            self.target_amount = target_amount;
        }
        if let Some(current_amount) = patch.current_amount {
            self.current_amount = current_amount;
        }
        if let Some(icon) = patch.icon {
            self.icon = icon;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        self.updated_at = now;
    }

    /// Percentage saved, capped at 100. Zero when the target is not positive.
    pub fn progress_percent(&self) -> f64 {
        if self.target_amount > 0.0 {
            (self.current_amount / self.target_amount * 100.0).min(100.0)
        } else {
            0.0
        }
    }

    pub fn is_complete(&self) -> bool {
        self.current_amount >= self.target_amount
    }

    pub fn remaining(&self) -> f64 {
        (self.target_amount - self.current_amount).max(0.0)
    }

    pub fn icon_or_default(&self) -> &str {
        self.icon.as_deref().unwrap_or(SAVINGS_ICONS[0])
    }

    pub fn color_or_default(&self) -> &str {
        self.color.as_deref().unwrap_or(SAVINGS_COLORS[0])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSavingsGoal {
    pub name: String,
    pub target_amount: f64,
    #[serde(default)]
    pub current_amount: f64,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Partial update for a savings goal. `Some(None)` clears icon or color.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SavingsGoalPatch {
    pub name: Option<String>,
    pub target_amount: Option<f64>,
    pub current_amount: Option<f64>,
    pub icon: Option<Option<String>>,
    pub color: Option<Option<String>>,
}

// ---------------------------------------------------------------------------
// Calendar and forecast
// ---------------------------------------------------------------------------

/// Type of calendar cell for explicit rendering logic
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CalendarDayType {
    /// Trailing day of the previous month
    PaddingBefore,
    /// Actual day within the month
    MonthDay,
    /// Leading day of the next month
    PaddingAfter,
}

/// A single cell of the calendar grid
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    pub day: u32,
    pub date: NaiveDate,
    pub day_type: CalendarDayType,
    pub is_today: bool,
    pub bills: Vec<MonthlyBillView>,
    pub total_amount: f64,
    pub has_paid_bills: bool,
    pub has_unpaid_bills: bool,
}

/// A six-week grid starting on a Sunday
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarMonth {
    pub month: u32,
    pub year: i32,
    pub days: Vec<CalendarDay>,
    /// 0 = Sunday, 1 = Monday, etc.
    pub first_day_of_week: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashFlowDay {
    pub day: u32,
    pub date: NaiveDate,
    pub bills: Vec<MonthlyBillView>,
    /// Expected amounts of the unpaid bills due this day
    pub outflow: f64,
    /// Balance after this day's outflow
    pub running_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashFlowForecast {
    pub month: u32,
    pub year: i32,
    pub starting_balance: f64,
    pub days: Vec<CashFlowDay>,
    pub total_bills: f64,
    pub total_paid: f64,
    pub total_remaining: f64,
    pub paid_count: usize,
    pub unpaid_count: usize,
    pub end_of_month_balance: f64,
}
