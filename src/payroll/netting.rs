use serde::Serialize;

use super::period::SalaryMonth;
use crate::entity::{salary_advance, salary_payment};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Netting {
    pub advances_total: i64,
    /// Earned salary minus advances. Negative when advances exceed earnings.
    pub net_payable: f64,
    pub paid_amount: i64,
    pub is_paid: bool,
    /// Still owed; negative means overpaid
    pub balance: f64,
}

impl Netting {
    pub fn new(earned_salary: f64, advances_total: i64, paid_amount: i64) -> Self {
        let net_payable = earned_salary - advances_total as f64;

        Self {
            advances_total,
            net_payable,
            paid_amount,
            is_paid: net_payable > 0.0 && paid_amount as f64 >= net_payable,
            balance: net_payable - paid_amount as f64,
        }
    }

    /// Same figures with an extra payment on top
    pub fn with_payment(&self, earned_salary: f64, amount: i64) -> Self {
        Self::new(earned_salary, self.advances_total, self.paid_amount + amount)
    }
}

/// Nets advances and payments against what was earned in `month`
///
/// Advances outside the month's advance window and payments attributed to another
/// month are skipped, so callers may pass a wider set.
pub fn net<'r>(
    earned_salary: f64,
    month: SalaryMonth,
    advances: impl IntoIterator<Item = &'r salary_advance::Model>,
    payments: impl IntoIterator<Item = &'r salary_payment::Model>,
) -> Netting {
    let (window_start, window_end) = month.advance_window();

    let advances_total = advances
        .into_iter()
        .filter(|advance| (window_start..=window_end).contains(&advance.date))
        .map(|advance| advance.amount)
        .sum();

    let paid_amount = payments
        .into_iter()
        .filter(|payment| payment.for_year == month.year() && payment.for_month as u32 == month.month())
        .map(|payment| payment.amount_paid)
        .sum();

    Netting::new(earned_salary, advances_total, paid_amount)
}
