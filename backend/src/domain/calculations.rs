//! Derived-state calculations.
//!
//! Pure functions that turn the stored entities into the values the screens
//! render. Nothing here is cached; callers recompute from the latest
//! collections on every read.

use chrono::NaiveDate;
use shared::{
    Bill, BillCategorySplit, BillPayment, IncomeProfile, MonthlyBillView, MonthlySummary, Period,
    SavingsGoal, UserProfile,
};

use super::dates::{days_until_due, due_date_for_month};
use super::money::round_to_cents;

/// Categories that count as fixed commitments (compared lowercase).
pub const FIXED_CATEGORIES: [&str; 5] = ["rent", "mortgage", "insurance", "subscription", "loan"];

/// Join each bill with its payment for `period`.
///
/// The due date is always the bill's day clamped into `period`, whatever the
/// payment state.
pub fn bills_for_month(
    bills: &[Bill],
    payments: &[BillPayment],
    period: Period,
    today: NaiveDate,
) -> Vec<MonthlyBillView> {
    bills
        .iter()
        .map(|bill| {
            let payment = payments
                .iter()
                .find(|p| p.matches(&bill.id, period))
                .cloned();
            let is_paid_this_month = payment.as_ref().map(|p| p.is_paid).unwrap_or(false);
            let amount_due = payment
                .as_ref()
                .and_then(|p| p.actual_amount)
                .unwrap_or(bill.expected_amount);
            let due_date = due_date_for_month(bill.due_day, period);
            let days_until_due = days_until_due(due_date, today);

            MonthlyBillView {
                bill: bill.clone(),
                payment,
                is_paid_this_month,
                amount_due,
                due_date,
                is_overdue: !is_paid_this_month && due_date < today,
                days_until_due,
            }
        })
        .collect()
}

/// Unpaid bills, soonest due first.
pub fn upcoming_bills(views: &[MonthlyBillView]) -> Vec<MonthlyBillView> {
    let mut upcoming: Vec<MonthlyBillView> = views
        .iter()
        .filter(|v| !v.is_paid_this_month)
        .cloned()
        .collect();
    upcoming.sort_by_key(|v| v.days_until_due);
    upcoming
}

pub fn paid_bills(views: &[MonthlyBillView]) -> Vec<MonthlyBillView> {
    views
        .iter()
        .filter(|v| v.is_paid_this_month)
        .cloned()
        .collect()
}

/// Roll the month's views up against income.
///
/// Paid bills count at the amount actually paid, unpaid bills at their
/// expected amount.
pub fn calculate_monthly_summary(
    views: &[MonthlyBillView],
    monthly_income: f64,
    period: Period,
) -> MonthlySummary {
    let (paid, unpaid): (Vec<&MonthlyBillView>, Vec<&MonthlyBillView>) =
        views.iter().partition(|v| v.is_paid_this_month);

    let total_bills_scheduled: f64 = views.iter().map(|v| v.bill.expected_amount).sum();
    let total_bills_paid: f64 = paid.iter().map(|v| v.amount_due).sum();
    let total_bills_remaining: f64 = unpaid.iter().map(|v| v.bill.expected_amount).sum();

    MonthlySummary {
        month: period.month(),
        year: period.year(),
        total_income: monthly_income,
        total_bills_scheduled,
        total_bills_paid,
        total_bills_remaining,
        remaining_balance: monthly_income - total_bills_paid - total_bills_remaining,
        upcoming_bills_count: unpaid.len(),
        paid_bills_count: paid.len(),
    }
}

/// Total expected outlay of all bills in one month.
///
/// Every bill recurs monthly, so the monthly total is also the average month;
/// this deliberately returns the sum, not a per-bill mean.
pub fn calculate_average_monthly_bills(bills: &[Bill]) -> f64 {
    bills.iter().map(|b| b.expected_amount).sum()
}

/// Monthly income implied by an income profile.
///
/// Fixed pay is scaled by its frequency multiplier and rounded to cents;
/// variable income uses the bottom of its range.
pub fn calculate_estimated_monthly_income(income_profile: Option<&IncomeProfile>) -> f64 {
    match income_profile {
        None => 0.0,
        Some(IncomeProfile::Fixed(fixed)) => {
            round_to_cents(fixed.amount * fixed.frequency.multiplier())
        }
        Some(IncomeProfile::Variable(variable)) => variable.min_amount,
    }
}

/// Income used for the summary: the profile estimate, else the legacy flat
/// amount, else zero.
pub fn estimated_monthly_income_for(profile: &UserProfile) -> f64 {
    match &profile.income_profile {
        Some(income_profile) => calculate_estimated_monthly_income(Some(income_profile)),
        None => profile.monthly_income.unwrap_or(0.0),
    }
}

pub fn is_fixed_category(category: Option<&str>) -> bool {
    category
        .map(|c| FIXED_CATEGORIES.contains(&c.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Split bills into fixed commitments and flexible spending. Uncategorized
/// bills are flexible.
pub fn categorize_fixed_vs_flexible(bills: &[Bill]) -> BillCategorySplit {
    let (fixed, flexible): (Vec<Bill>, Vec<Bill>) = bills
        .iter()
        .cloned()
        .partition(|b| is_fixed_category(b.category.as_deref()));
    BillCategorySplit { fixed, flexible }
}

pub fn total_savings(goals: &[SavingsGoal]) -> f64 {
    goals.iter().map(|g| g.current_amount).sum()
}

pub fn total_savings_target(goals: &[SavingsGoal]) -> f64 {
    goals.iter().map(|g| g.target_amount).sum()
}

/// Combined progress across all goals, capped at 100.
pub fn overall_savings_progress(goals: &[SavingsGoal]) -> f64 {
    let target = total_savings_target(goals);
    if target > 0.0 {
        (total_savings(goals) / target * 100.0).min(100.0)
    } else {
        0.0
    }
}
