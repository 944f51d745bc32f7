use chrono::{Datelike as _, Months, NaiveDate};
use serde::Serialize;

use crate::{consts::ADVANCE_CUTOFF_DAY, utils};

/// A calendar month salaries are computed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SalaryMonth {
    year: i32,
    month: u32,
}

impl SalaryMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if !(1..=9999).contains(&year) || !(1..=12).contains(&month) {
            return None;
        }

        Some(Self { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).expect("month is validated on construction")
    }

    pub fn last_day(self) -> NaiveDate {
        self.next()
            .first_day()
            .pred_opt()
            .expect("the first of a month always has a predecessor")
    }

    pub fn next(self) -> Self {
        Self::containing(self.first_day() + Months::new(1))
    }

    /// Advances disbursed from the 1st of this month through the 15th of the next one
    /// are netted against this month's salary
    pub fn advance_window(self) -> (NaiveDate, NaiveDate) {
        let next = self.next();
        let cutoff = NaiveDate::from_ymd_opt(next.year, next.month, ADVANCE_CUTOFF_DAY)
            .expect("every month has a 15th");

        (self.first_day(), cutoff)
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        Self::containing(date) == self
    }
}

/// The days a payroll report covers, always inside a single salary month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportWindow {
    pub month: SalaryMonth,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportWindow {
    pub fn whole(month: SalaryMonth) -> Self {
        Self {
            month,
            start: month.first_day(),
            end: month.last_day(),
        }
    }

    /// A sub-range report. The salary month is the one holding `start`, and `end`
    /// is cut back to that month's last day so the daily rate never drifts.
    pub fn within(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        if start > end {
            return None;
        }

        let month = SalaryMonth::containing(start);

        Some(Self {
            month,
            start,
            end: end.min(month.last_day()),
        })
    }

    /// The part of the window an employee was actually employed for. May be inverted.
    pub fn effective(&self, joining_date: Option<NaiveDate>, exit_date: Option<NaiveDate>) -> (NaiveDate, NaiveDate) {
        utils::clamp_range(self.start, self.end, joining_date, exit_date)
    }
}
