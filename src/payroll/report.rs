use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use super::{
    attendance::{summarize, AttendanceSummary},
    calendar::HolidayCalendar,
    netting::{net, Netting},
    period::{ReportWindow, SalaryMonth},
    salary::{daily_rate, earned_salary},
};
use crate::entity::{attendance, salary_advance, salary_payment, sea_orm_active_enums::RoleType, user};

/// Per-employee records a payroll row is derived from
pub trait StaffRecords {
    fn attendance(&self, staff_id: Uuid) -> &[attendance::Model];
    fn advances(&self, staff_id: Uuid) -> &[salary_advance::Model];
    fn payments(&self, staff_id: Uuid) -> &[salary_payment::Model];
}

/// Plain maps keyed by staff id, as returned by one-shot batched fetches
#[derive(Debug, Default)]
pub struct Records {
    pub attendance: HashMap<Uuid, Vec<attendance::Model>>,
    pub advances: HashMap<Uuid, Vec<salary_advance::Model>>,
    pub payments: HashMap<Uuid, Vec<salary_payment::Model>>,
}

fn slice_of<V>(map: &HashMap<Uuid, Vec<V>>, staff_id: Uuid) -> &[V] {
    map.get(&staff_id).map(Vec::as_slice).unwrap_or_default()
}

impl StaffRecords for Records {
    fn attendance(&self, staff_id: Uuid) -> &[attendance::Model] {
        slice_of(&self.attendance, staff_id)
    }

    fn advances(&self, staff_id: Uuid) -> &[salary_advance::Model] {
        slice_of(&self.advances, staff_id)
    }

    fn payments(&self, staff_id: Uuid) -> &[salary_payment::Model] {
        slice_of(&self.payments, staff_id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PayrollRow {
    pub staff_id: Uuid,
    pub username: String,
    pub role: RoleType,
    pub site_id: Option<Uuid>,
    pub base_salary: i64,
    /// Working days in the whole salary month, the denominator of the daily rate
    pub month_working_days: u32,
    /// Working days inside the report window the employee was employed for
    pub working_days: u32,
    pub attendance: AttendanceSummary,
    pub daily_rate: f64,
    pub earned_salary: f64,
    #[serde(flatten)]
    pub netting: Netting,
}

pub fn compute_row(
    staff: &user::Model,
    window: &ReportWindow,
    calendar: &HolidayCalendar<'_>,
    records: &impl StaffRecords,
) -> PayrollRow {
    let month = window.month;
    let site_id = staff.site_id;
    let base_salary = staff.salary as f64;

    let month_working_days = calendar.working_days(month.first_day(), month.last_day(), site_id);

    let (start, end) = window.effective(staff.joining_date, staff.exit_date);
    let working_days = calendar.working_days(start, end, site_id);
    let attendance = summarize(records.attendance(staff.id), calendar, site_id, start, end);

    let earned = earned_salary(base_salary, month_working_days, attendance.present_days);
    let netting = net(earned, month, records.advances(staff.id), records.payments(staff.id));

    PayrollRow {
        staff_id: staff.id,
        username: staff.username.clone(),
        role: staff.role,
        site_id,
        base_salary: staff.salary,
        month_working_days,
        working_days,
        attendance,
        daily_rate: daily_rate(base_salary, month_working_days),
        earned_salary: earned,
        netting,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PayrollTotals {
    pub earned_salary: f64,
    pub advances_total: i64,
    pub net_payable: f64,
    pub paid_amount: i64,
    pub paid_count: usize,
}

impl PayrollTotals {
    fn of(rows: &[PayrollRow]) -> Self {
        rows.iter().fold(Self::default(), |mut totals, row| {
            totals.earned_salary += row.earned_salary;
            totals.advances_total += row.netting.advances_total;
            totals.net_payable += row.netting.net_payable;
            totals.paid_amount += row.netting.paid_amount;
            totals.paid_count += row.netting.is_paid as usize;
            totals
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PayrollReport {
    pub window: ReportWindow,
    pub rows: Vec<PayrollRow>,
    pub totals: PayrollTotals,
    /// False while some subscription has not delivered its first snapshot yet
    pub complete: bool,
}

impl PayrollReport {
    pub fn empty(window: ReportWindow) -> Self {
        Self {
            window,
            rows: Vec::new(),
            totals: PayrollTotals::default(),
            complete: false,
        }
    }

    pub fn compute(
        window: ReportWindow,
        staff: &[user::Model],
        calendar: &HolidayCalendar<'_>,
        records: &impl StaffRecords,
        complete: bool,
    ) -> Self {
        let rows = staff
            .iter()
            .map(|member| compute_row(member, &window, calendar, records))
            .collect::<Vec<_>>();

        Self {
            window,
            totals: PayrollTotals::of(&rows),
            rows,
            complete,
        }
    }

    pub fn row(&self, staff_id: Uuid) -> Option<&PayrollRow> {
        self.rows.iter().find(|row| row.staff_id == staff_id)
    }

    /// Counts a payment that has not reached the store yet
    ///
    /// Returns false, changing nothing, when the payment is for another month or
    /// for someone not on this report.
    pub fn apply_payment(&mut self, staff_id: Uuid, month: SalaryMonth, amount: i64) -> bool {
        if month != self.window.month {
            return false;
        }

        let Some(row) = self.rows.iter_mut().find(|row| row.staff_id == staff_id) else {
            return false;
        };

        row.netting = row.netting.with_payment(row.earned_salary, amount);
        self.totals = PayrollTotals::of(&self.rows);

        true
    }
}
