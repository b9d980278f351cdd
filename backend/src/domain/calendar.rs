//! Calendar grid and cash-flow forecast.
//!
//! The calendar is a fixed six-week grid starting on a Sunday, padded with the
//! tail of the previous month and the head of the next. The forecast walks
//! the target month day by day, subtracting unpaid bills from a starting
//! balance.

use chrono::{Datelike, NaiveDate};
use log::debug;
use shared::{
    CalendarDay, CalendarDayType, CalendarMonth, CashFlowDay, CashFlowForecast, MonthlyBillView,
    Period,
};
use std::sync::{Arc, Mutex, MutexGuard};

use super::dates::{Clock, SystemClock};

/// Cells in the six-week grid
pub const CALENDAR_GRID_CELLS: usize = 42;

/// Calendar service that owns the navigation focus and builds month views
#[derive(Clone)]
pub struct CalendarService {
    /// Month currently shown by the calendar screen; kept in memory only
    focus: Arc<Mutex<Period>>,
}

impl CalendarService {
    /// Focus starts on the current month of the system clock.
    pub fn new() -> Self {
        Self::with_clock(&SystemClock)
    }

    pub fn with_clock(clock: &dyn Clock) -> Self {
        Self::starting_at(clock.current_period())
    }

    pub fn starting_at(period: Period) -> Self {
        Self {
            focus: Arc::new(Mutex::new(period)),
        }
    }

    fn lock_focus(&self) -> MutexGuard<'_, Period> {
        self.focus.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn focus_period(&self) -> Period {
        *self.lock_focus()
    }

    /// Set the focus month. `month` is 0-based.
    pub fn set_focus_period(&self, month: u32, year: i32) -> Result<Period, String> {
        let period = Period::new(month, year)
            .ok_or_else(|| format!("Invalid month: {}. Must be between 0 and 11", month))?;
        *self.lock_focus() = period;
        debug!("Calendar focus moved to {}", period);
        Ok(period)
    }

    pub fn navigate_previous_month(&self) -> Period {
        let mut focus = self.lock_focus();
        *focus = previous_month(*focus);
        *focus
    }

    pub fn navigate_next_month(&self) -> Period {
        let mut focus = self.lock_focus();
        *focus = next_month(*focus);
        *focus
    }

    /// Build the 42-cell grid for `period`.
    ///
    /// `views` should be the month's bill views for `period`; each in-month
    /// cell collects the bills whose due date falls on it.
    pub fn generate_calendar_month(
        &self,
        period: Period,
        views: &[MonthlyBillView],
        today: NaiveDate,
    ) -> CalendarMonth {
        let first_day = first_day_of_month(period);
        let days_in_month = period.days_in_month();
        let mut days = Vec::with_capacity(CALENDAR_GRID_CELLS);

        let previous = previous_month(period);
        let previous_len = previous.days_in_month();
        for offset in 0..first_day {
            let day = previous_len - first_day + 1 + offset;
            days.push(padding_cell(previous, day, CalendarDayType::PaddingBefore, today));
        }

        for day in 1..=days_in_month {
            let date = period.day(day).unwrap_or_else(|| period.first_day());
            let bills: Vec<MonthlyBillView> = views
                .iter()
                .filter(|v| v.due_date == date)
                .cloned()
                .collect();
            days.push(CalendarDay {
                day,
                date,
                day_type: CalendarDayType::MonthDay,
                is_today: date == today,
                total_amount: bills.iter().map(|v| v.amount_due).sum(),
                has_paid_bills: bills.iter().any(|v| v.is_paid_this_month),
                has_unpaid_bills: bills.iter().any(|v| !v.is_paid_this_month),
                bills,
            });
        }

        let following = next_month(period);
        let mut day = 1;
        while days.len() < CALENDAR_GRID_CELLS {
            days.push(padding_cell(following, day, CalendarDayType::PaddingAfter, today));
            day += 1;
        }

        debug!(
            "Generated calendar for {} ({} days, first weekday {})",
            period, days_in_month, first_day
        );

        CalendarMonth {
            month: period.month(),
            year: period.year(),
            days,
            first_day_of_week: first_day,
        }
    }

    /// Day-by-day running balance for `period`.
    ///
    /// Only unpaid bills reduce the running balance; paid bills are already
    /// spent and show up in the totals only.
    pub fn cash_flow_forecast(
        &self,
        period: Period,
        views: &[MonthlyBillView],
        starting_balance: f64,
    ) -> CashFlowForecast {
        let mut running_balance = starting_balance;
        let mut days = Vec::with_capacity(period.days_in_month() as usize);

        for day in 1..=period.days_in_month() {
            let date = period.day(day).unwrap_or_else(|| period.first_day());
            let bills: Vec<MonthlyBillView> = views
                .iter()
                .filter(|v| v.due_date == date)
                .cloned()
                .collect();
            let outflow: f64 = bills
                .iter()
                .filter(|v| !v.is_paid_this_month)
                .map(|v| v.bill.expected_amount)
                .sum();
            running_balance -= outflow;
            days.push(CashFlowDay {
                day,
                date,
                bills,
                outflow,
                running_balance,
            });
        }

        let total_bills: f64 = views.iter().map(|v| v.bill.expected_amount).sum();
        let total_paid: f64 = views
            .iter()
            .filter(|v| v.is_paid_this_month)
            .map(|v| v.amount_due)
            .sum();
        let total_remaining: f64 = views
            .iter()
            .filter(|v| !v.is_paid_this_month)
            .map(|v| v.bill.expected_amount)
            .sum();
        let paid_count = views.iter().filter(|v| v.is_paid_this_month).count();

        CashFlowForecast {
            month: period.month(),
            year: period.year(),
            starting_balance,
            days,
            total_bills,
            total_paid,
            total_remaining,
            paid_count,
            unpaid_count: views.len() - paid_count,
            end_of_month_balance: starting_balance - total_bills,
        }
    }
}

impl Default for CalendarService {
    fn default() -> Self {
        Self::new()
    }
}

fn padding_cell(
    period: Period,
    day: u32,
    day_type: CalendarDayType,
    today: NaiveDate,
) -> CalendarDay {
    let date = period.day(day).unwrap_or_else(|| period.first_day());
    CalendarDay {
        day,
        date,
        day_type,
        is_today: date == today,
        bills: Vec::new(),
        total_amount: 0.0,
        has_paid_bills: false,
        has_unpaid_bills: false,
    }
}

/// Weekday of the 1st (0 = Sunday, 1 = Monday, etc.)
pub fn first_day_of_month(period: Period) -> u32 {
    period.first_day().weekday().num_days_from_sunday()
}

/// January wraps to December of the previous year.
pub fn previous_month(period: Period) -> Period {
    period.previous()
}

/// December wraps to January of the next year.
pub fn next_month(period: Period) -> Period {
    period.next()
}
