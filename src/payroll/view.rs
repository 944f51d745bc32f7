//! A payroll report kept current by store subscriptions

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    calendar::HolidayCalendar,
    period::ReportWindow,
    report::{PayrollReport, StaffRecords},
};
use crate::{
    command::Optimistic,
    entity::{attendance, holiday, salary_advance, salary_payment, user},
    error::Error,
    fanout::{
        feed::{Collection, Interest},
        subscription::LiveQuery,
        Applied, BatchFailure, FanOut,
    },
    store::{NewPayment, PayrollSource},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub collection: Collection,
    #[serde(flatten)]
    pub failure: BatchFailure,
}

/// Subscribes to everything a payroll report for one window is derived from
///
/// The report is re-derived from the accumulated snapshots each time one arrives,
/// so it is always consistent with whatever has been delivered so far. The staff
/// set and their salaries are fixed at [`open`](Self::open); re-open to pick up
/// salary changes or new hires.
pub struct PayrollView<S: PayrollSource> {
    source: S,
    window: ReportWindow,
    staff: Vec<user::Model>,
    holidays: LiveQuery<Vec<holiday::Model>>,
    attendance: FanOut<Vec<attendance::Model>>,
    advances: FanOut<Vec<salary_advance::Model>>,
    payments: FanOut<Vec<salary_payment::Model>>,
    report: Optimistic<PayrollReport>,
}

impl<S: PayrollSource> PayrollView<S> {
    pub fn new(source: S, batch_size: usize, window: ReportWindow, staff: Vec<user::Model>) -> Self {
        let mut view = Self {
            source,
            window,
            staff: Vec::new(),
            holidays: LiveQuery::new(),
            attendance: FanOut::new(batch_size),
            advances: FanOut::new(batch_size),
            payments: FanOut::new(batch_size),
            report: Optimistic::new(PayrollReport::empty(window)),
        };

        view.open(window, staff);
        view
    }

    /// Drops every running subscription and subscribes for `window` and `staff`
    pub fn open(&mut self, window: ReportWindow, staff: Vec<user::Model>) {
        let month = window.month;
        let ids = staff.iter().map(|member| member.id).collect::<Vec<_>>();
        let feed = self.source.feed().clone();

        debug!(year = month.year(), month = month.month(), staff = ids.len(), "opening payroll view");

        self.window = window;
        self.staff = staff;
        self.report.replace(PayrollReport::empty(window));

        let source = self.source.clone();
        self.holidays.subscribe(&feed, Interest::collection(Collection::Holidays), move || {
            source.holidays_between(month.first_day(), month.last_day())
        });

        let source = self.source.clone();
        let (start, end) = (window.start, window.end);
        self.attendance.subscribe(&feed, Collection::Attendance, &ids, move |batch| source.attendance_for(batch, start, end));

        let source = self.source.clone();
        let (from, until) = month.advance_window();
        self.advances.subscribe(&feed, Collection::Advances, &ids, move |batch| source.advances_for(batch, from, until));

        let source = self.source.clone();
        self.payments.subscribe(&feed, Collection::Payments, &ids, move |batch| source.payments_for(batch, month));
    }

    pub fn dispose(&mut self) {
        self.holidays.dispose();
        self.attendance.dispose();
        self.advances.dispose();
        self.payments.dispose();
    }

    /// Waits for the next snapshot from any subscription and re-derives the report
    pub async fn pump(&mut self) -> Applied {
        let applied = tokio::select! {
            applied = self.holidays.next() => applied,
            applied = self.attendance.next() => applied,
            applied = self.advances.next() => applied,
            applied = self.payments.next() => applied,
        };

        if applied != Applied::Stale {
            self.rederive();
        }

        applied
    }

    /// Pumps until every subscription has delivered once
    pub async fn ready(&mut self) -> &PayrollReport {
        while !self.is_ready() {
            self.pump().await;
        }

        self.report()
    }

    pub fn is_ready(&self) -> bool {
        self.holidays.is_ready() && self.attendance.is_complete() && self.advances.is_complete() && self.payments.is_complete()
    }

    pub fn report(&self) -> &PayrollReport {
        self.report.current()
    }

    pub fn failures(&self) -> Vec<SourceFailure> {
        let holidays = self
            .holidays
            .failure()
            .map(|error| BatchFailure { batch: 0, error: error.to_string() })
            .map(|failure| SourceFailure { collection: Collection::Holidays, failure });

        let batched = [
            (Collection::Attendance, self.attendance.failures()),
            (Collection::Advances, self.advances.failures()),
            (Collection::Payments, self.payments.failures()),
        ]
        .into_iter()
        .flat_map(|(collection, failures)| failures.into_iter().map(move |failure| SourceFailure { collection, failure }));

        holidays.into_iter().chain(batched).collect()
    }

    /// Records a payment, showing it in the report before the store confirms it
    pub async fn record_payment(&mut self, payment: NewPayment, author: Uuid) -> Result<salary_payment::Model, Error> {
        let (staff_id, month, amount) = (payment.staff_id, payment.month, payment.amount_paid);

        if !self.report.apply(|report| report.apply_payment(staff_id, month, amount)) {
            debug!(%staff_id, "payment is outside this view, not applied locally");
        }

        match self.source.record_payment(payment, author).await {
            Ok(model) => {
                self.report.commit();
                Ok(model)
            }
            Err(err) => {
                warn!(%staff_id, %err, "payment failed, rolling back");
                self.report.rollback();
                Err(err)
            }
        }
    }

    fn rederive(&mut self) {
        let holidays = self.holidays.value().map(Vec::as_slice).unwrap_or_default();
        let calendar = HolidayCalendar::new(holidays);
        let report = PayrollReport::compute(self.window, &self.staff, &calendar, &*self, self.is_ready());

        self.report.replace(report);
    }
}

impl<S: PayrollSource> StaffRecords for PayrollView<S> {
    fn attendance(&self, staff_id: Uuid) -> &[attendance::Model] {
        self.attendance.get(staff_id).map(Vec::as_slice).unwrap_or_default()
    }

    fn advances(&self, staff_id: Uuid) -> &[salary_advance::Model] {
        self.advances.get(staff_id).map(Vec::as_slice).unwrap_or_default()
    }

    fn payments(&self, staff_id: Uuid) -> &[salary_payment::Model] {
        self.payments.get(staff_id).map(Vec::as_slice).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        collections::HashMap,
        future::{self, Future},
        rc::Rc,
    };

    use chrono::NaiveDate;
    use sea_orm::DbErr;

    use super::*;
    use crate::{
        entity::sea_orm_active_enums::AttendanceStatus,
        fanout::feed::{Change, ChangeFeed},
        payroll::{
            attendance::tests::record,
            calendar::tests::{date, holiday},
            netting::tests::payment,
            period::SalaryMonth,
            report::tests::staff,
        },
        store::group_by_staff,
    };

    #[derive(Default)]
    struct Tables {
        holidays: Vec<holiday::Model>,
        attendance: Vec<attendance::Model>,
        advances: Vec<salary_advance::Model>,
        payments: Vec<salary_payment::Model>,
        /// Attendance batches containing this id fail to load
        unreadable: Option<Uuid>,
        reject_payments: bool,
    }

    #[derive(Clone)]
    struct Memory {
        tables: Rc<RefCell<Tables>>,
        feed: ChangeFeed,
    }

    impl Memory {
        fn new() -> Self {
            Self {
                tables: Rc::default(),
                feed: ChangeFeed::new(64),
            }
        }

        fn mark(&self, row: attendance::Model) {
            let staff_id = row.staff_id;
            self.tables.borrow_mut().attendance.push(row);
            self.feed.publish(Change::of(Collection::Attendance, staff_id));
        }

        fn add_holiday(&self, row: holiday::Model) {
            self.tables.borrow_mut().holidays.push(row);
            self.feed.publish(Change::of(Collection::Holidays, None));
        }
    }

    fn denied() -> Error {
        Error::from(DbErr::Custom("permission denied".into()))
    }

    impl PayrollSource for Memory {
        fn feed(&self) -> &ChangeFeed {
            &self.feed
        }

        fn holidays_between(&self, start: NaiveDate, end: NaiveDate) -> impl Future<Output = Result<Vec<holiday::Model>, Error>> + 'static + use<> {
            let tables = self.tables.borrow();
            let rows = tables.holidays.iter().filter(|row| (start..=end).contains(&row.date)).cloned().collect::<Vec<_>>();

            future::ready(Ok::<_, Error>(rows))
        }

        fn attendance_for(
            &self,
            staff_ids: Vec<Uuid>,
            start: NaiveDate,
            end: NaiveDate,
        ) -> impl Future<Output = Result<HashMap<Uuid, Vec<attendance::Model>>, Error>> + 'static + use<> {
            let tables = self.tables.borrow();

            if tables.unreadable.is_some_and(|id| staff_ids.contains(&id)) {
                return future::ready(Err(denied()));
            }

            let rows = tables
                .attendance
                .iter()
                .filter(|row| staff_ids.contains(&row.staff_id) && (start..=end).contains(&row.date))
                .cloned()
                .collect();

            future::ready(Ok::<_, Error>(group_by_staff(&staff_ids, rows, |row| row.staff_id)))
        }

        fn advances_for(
            &self,
            staff_ids: Vec<Uuid>,
            start: NaiveDate,
            end: NaiveDate,
        ) -> impl Future<Output = Result<HashMap<Uuid, Vec<salary_advance::Model>>, Error>> + 'static + use<> {
            let tables = self.tables.borrow();
            let rows = tables
                .advances
                .iter()
                .filter(|row| staff_ids.contains(&row.staff_id) && (start..=end).contains(&row.date))
                .cloned()
                .collect();

            future::ready(Ok::<_, Error>(group_by_staff(&staff_ids, rows, |row| row.staff_id)))
        }

        fn payments_for(
            &self,
            staff_ids: Vec<Uuid>,
            month: SalaryMonth,
        ) -> impl Future<Output = Result<HashMap<Uuid, Vec<salary_payment::Model>>, Error>> + 'static + use<> {
            let tables = self.tables.borrow();
            let rows = tables
                .payments
                .iter()
                .filter(|row| {
                    staff_ids.contains(&row.staff_id) && row.for_month as u32 == month.month() && row.for_year == month.year()
                })
                .cloned()
                .collect();

            future::ready(Ok::<_, Error>(group_by_staff(&staff_ids, rows, |row| row.staff_id)))
        }

        fn record_payment(&self, new: NewPayment, _author: Uuid) -> impl Future<Output = Result<salary_payment::Model, Error>> + 'static + use<> {
            if self.tables.borrow().reject_payments {
                return future::ready(Err(denied()));
            }

            let model = payment(new.staff_id, new.amount_paid, new.month);
            self.tables.borrow_mut().payments.push(model.clone());
            self.feed.publish(Change::of(Collection::Payments, new.staff_id));

            future::ready(Ok(model))
        }
    }

    fn june() -> SalaryMonth {
        SalaryMonth::new(2024, 6).unwrap()
    }

    /// Marks `member` present on every weekday of June 2024
    fn full_month(memory: &Memory, member: &user::Model) {
        let month = june();
        let mut tables = memory.tables.borrow_mut();

        tables.attendance.extend(
            HolidayCalendar::default()
                .working_dates(month.first_day(), month.last_day(), None)
                .map(|day| record(member.id, day, AttendanceStatus::Present)),
        );
    }

    fn new_payment(staff_id: Uuid, amount_paid: i64) -> NewPayment {
        NewPayment {
            staff_id,
            amount_paid,
            month: june(),
            payment_date: date(2024, 7, 1),
        }
    }

    #[actix_web::test]
    async fn test_ready_derives_full_report() {
        let memory = Memory::new();
        let members = vec![staff("a", 20_000, None), staff("b", 10_000, None)];
        full_month(&memory, &members[0]);

        let mut view = PayrollView::new(memory.clone(), 30, ReportWindow::whole(june()), members.clone());
        assert!(!view.report().complete);

        let report = view.ready().await;
        assert!(report.complete);
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.row(members[0].id).unwrap().earned_salary, 20_000.0);
        assert_eq!(report.row(members[1].id).unwrap().earned_salary, 0.0);
        assert!(view.failures().is_empty());
    }

    #[actix_web::test]
    async fn test_writes_flow_into_report() {
        let memory = Memory::new();
        let member = staff("a", 20_000, None);

        let mut view = PayrollView::new(memory.clone(), 30, ReportWindow::whole(june()), vec![member.clone()]);
        view.ready().await;

        memory.mark(record(member.id, date(2024, 6, 3), AttendanceStatus::Present));
        assert_eq!(view.pump().await, Applied::Merged { batch: 0 });
        assert_eq!(view.report().row(member.id).unwrap().attendance.present_days, 1.0);

        // one holiday less in the month raises the daily rate
        memory.add_holiday(holiday(date(2024, 6, 4), "Founders day", None));
        view.pump().await;

        let row = view.report().row(member.id).unwrap();
        assert_eq!(row.month_working_days, 19);
        assert!((row.earned_salary - 20_000.0 / 19.0).abs() < 1e-9);
    }

    #[actix_web::test]
    async fn test_payment_is_visible_before_refetch() {
        let memory = Memory::new();
        let member = staff("a", 20_000, None);
        full_month(&memory, &member);

        let mut view = PayrollView::new(memory.clone(), 30, ReportWindow::whole(june()), vec![member.clone()]);
        view.ready().await;

        view.record_payment(new_payment(member.id, 20_000), Uuid::new_v4()).await.unwrap();
        assert!(view.report().row(member.id).unwrap().netting.is_paid);

        assert_eq!(view.pump().await, Applied::Merged { batch: 0 });
        let row = view.report().row(member.id).unwrap();
        assert!(row.netting.is_paid);
        assert_eq!(row.netting.paid_amount, 20_000);
    }

    #[actix_web::test]
    async fn test_failed_payment_rolls_back() {
        let memory = Memory::new();
        let member = staff("a", 20_000, None);
        full_month(&memory, &member);
        memory.tables.borrow_mut().reject_payments = true;

        let mut view = PayrollView::new(memory.clone(), 30, ReportWindow::whole(june()), vec![member.clone()]);
        view.ready().await;

        assert!(view.record_payment(new_payment(member.id, 20_000), Uuid::new_v4()).await.is_err());

        let row = view.report().row(member.id).unwrap();
        assert!(!row.netting.is_paid);
        assert_eq!(row.netting.paid_amount, 0);
        assert_eq!(view.report().totals.paid_count, 0);
    }

    #[actix_web::test]
    async fn test_failed_batch_leaves_others_intact() {
        let memory = Memory::new();
        let members = (0..35).map(|n| staff(&format!("staff-{n:02}"), 20_000, None)).collect::<Vec<_>>();
        for member in &members {
            full_month(&memory, member);
        }
        memory.tables.borrow_mut().unreadable = Some(members[34].id);

        let mut view = PayrollView::new(memory.clone(), 30, ReportWindow::whole(june()), members.clone());
        let report = view.ready().await;

        assert!(report.complete);
        assert_eq!(report.rows.len(), 35);
        assert_eq!(report.row(members[0].id).unwrap().attendance.present_days, 20.0);
        assert_eq!(report.row(members[34].id).unwrap().attendance.present_days, 0.0);

        let failures = view.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].collection, Collection::Attendance);
        assert_eq!(failures[0].failure.batch, 1);
    }

    #[actix_web::test]
    async fn test_reopen_switches_window() {
        let memory = Memory::new();
        let june_staff = staff("a", 20_000, None);
        let july_staff = staff("b", 31_000, None);

        let mut view = PayrollView::new(memory.clone(), 30, ReportWindow::whole(june()), vec![june_staff]);
        view.ready().await;

        view.open(ReportWindow::whole(june().next()), vec![july_staff.clone()]);
        assert!(!view.is_ready());

        let report = view.ready().await;
        assert_eq!(report.window.month, june().next());
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].staff_id, july_staff.id);
        assert_eq!(report.rows[0].month_working_days, 23);
    }
}
