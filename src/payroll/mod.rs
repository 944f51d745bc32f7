//! Payroll and attendance computations
//!
//! Everything here except [`view`] is pure: holidays, attendance, advances and
//! payments go in, working-day counts and salary figures come out. [`view`] keeps
//! those inputs current through store subscriptions and re-derives the report
//! whenever any of them changes.

use chrono::NaiveDate;

use crate::entity::user;

pub mod attendance;
pub mod calendar;
pub mod netting;
pub mod period;
pub mod report;
pub mod salary;
pub mod view;

pub fn employed_on(staff: &user::Model, date: NaiveDate) -> bool {
    staff.joining_date.is_none_or(|joining| joining <= date) && staff.exit_date.is_none_or(|exit| date <= exit)
}
