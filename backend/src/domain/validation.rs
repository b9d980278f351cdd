//! Form validation.
//!
//! Raw text from the bill, income and savings forms is checked here before any
//! store call, so the store only ever sees well-formed drafts.

use shared::{
    BillFrequency, BillPatch, FixedIncome, IncomeProfile, NewBill, NewSavingsGoal, PayFrequency,
    SavingsGoal, SavingsGoalPatch, VariableIncome,
};

use super::money::parse_currency_input;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BillValidationError {
    #[error("Please enter a name for this bill.")]
    MissingName,
    #[error("Please enter a valid amount.")]
    InvalidAmount,
    #[error("Please enter a day between 1 and 31.")]
    InvalidDueDay,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IncomeValidationError {
    #[error("Please enter a valid income amount")]
    InvalidAmount,
    #[error("Please enter valid minimum and maximum amounts")]
    InvalidRange,
    #[error("Minimum cannot exceed maximum")]
    MinimumExceedsMaximum,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SavingsValidationError {
    #[error("Please enter a name for this goal.")]
    MissingName,
    #[error("Please enter a valid target amount.")]
    InvalidTarget,
    #[error("Please enter a valid amount.")]
    InvalidAmount,
    #[error("You can't withdraw more than your current savings.")]
    InsufficientFunds,
}

/// Which way a savings adjustment moves money.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavingsAdjustment {
    Deposit,
    Withdraw,
}

/// Raw input of the income form.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomeForm<'a> {
    Fixed {
        amount: &'a str,
        frequency: PayFrequency,
        next_pay_date: Option<String>,
    },
    Variable {
        min_amount: &'a str,
        max_amount: &'a str,
        notes: Option<String>,
    },
}

/// Validate the bill form and build a monthly bill draft.
pub fn validate_bill_form(
    name: &str,
    amount_input: &str,
    due_day_input: &str,
    category: Option<String>,
    notifications_enabled: bool,
) -> Result<NewBill, BillValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BillValidationError::MissingName);
    }

    let expected_amount = parse_currency_input(amount_input);
    if expected_amount <= 0.0 {
        return Err(BillValidationError::InvalidAmount);
    }

    let due_day = parse_day_input(due_day_input)
        .filter(|day| (1..=31).contains(day))
        .ok_or(BillValidationError::InvalidDueDay)?;

    Ok(NewBill {
        name: name.to_string(),
        due_day,
        frequency: BillFrequency::Monthly,
        expected_amount,
        category: category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
        notifications_enabled,
    })
}

/// The edit screen submits the whole form; every field becomes part of the patch.
pub fn bill_patch_from_form(draft: NewBill) -> BillPatch {
    BillPatch {
        name: Some(draft.name),
        due_day: Some(draft.due_day),
        frequency: Some(draft.frequency),
        expected_amount: Some(draft.expected_amount),
        category: Some(draft.category),
        notifications_enabled: Some(draft.notifications_enabled),
    }
}

pub fn validate_income_form(form: IncomeForm<'_>) -> Result<IncomeProfile, IncomeValidationError> {
    match form {
        IncomeForm::Fixed {
            amount,
            frequency,
            next_pay_date,
        } => {
            let amount = parse_currency_input(amount);
            if amount <= 0.0 {
                return Err(IncomeValidationError::InvalidAmount);
            }
            Ok(IncomeProfile::Fixed(FixedIncome {
                amount,
                frequency,
                next_pay_date,
            }))
        }
        IncomeForm::Variable {
            min_amount,
            max_amount,
            notes,
        } => {
            let min_amount = parse_currency_input(min_amount);
            let max_amount = parse_currency_input(max_amount);
            if min_amount <= 0.0 || max_amount <= 0.0 {
                return Err(IncomeValidationError::InvalidRange);
            }
            if min_amount > max_amount {
                return Err(IncomeValidationError::MinimumExceedsMaximum);
            }
            Ok(IncomeProfile::Variable(VariableIncome {
                min_amount,
                max_amount,
                notes: notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            }))
        }
    }
}

/// Validate the new-goal form. A blank starting amount means zero.
pub fn validate_savings_form(
    name: &str,
    target_input: &str,
    current_input: &str,
    icon: Option<String>,
    color: Option<String>,
) -> Result<NewSavingsGoal, SavingsValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(SavingsValidationError::MissingName);
    }

    let target_amount = parse_currency_input(target_input);
    if target_amount <= 0.0 {
        return Err(SavingsValidationError::InvalidTarget);
    }

    Ok(NewSavingsGoal {
        name: name.to_string(),
        target_amount,
        current_amount: parse_currency_input(current_input),
        icon,
        color,
    })
}

/// Validate the goal edit form (name and target only).
pub fn validate_savings_edit(
    name: &str,
    target_input: &str,
) -> Result<SavingsGoalPatch, SavingsValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(SavingsValidationError::MissingName);
    }
    let target_amount = parse_currency_input(target_input);
    if target_amount <= 0.0 {
        return Err(SavingsValidationError::InvalidTarget);
    }
    Ok(SavingsGoalPatch {
        name: Some(name.to_string()),
        target_amount: Some(target_amount),
        ..Default::default()
    })
}

/// Validate a deposit or withdrawal and return the signed delta for
/// `add_to_savings`.
pub fn validate_savings_adjustment(
    goal: &SavingsGoal,
    amount_input: &str,
    adjustment: SavingsAdjustment,
) -> Result<f64, SavingsValidationError> {
    let amount = parse_currency_input(amount_input);
    if amount <= 0.0 {
        return Err(SavingsValidationError::InvalidAmount);
    }
    match adjustment {
        SavingsAdjustment::Deposit => Ok(amount),
        SavingsAdjustment::Withdraw if amount > goal.current_amount => {
            Err(SavingsValidationError::InsufficientFunds)
        }
        SavingsAdjustment::Withdraw => Ok(-amount),
    }
}

/// Integer prefix of the input after trimming, e.g. "15th" -> 15.
fn parse_day_input(input: &str) -> Option<u32> {
    let digits: String = input
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
