use std::{collections::HashMap, ops::AddAssign};

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use super::{calendar::{DayKind, HolidayCalendar}, employed_on, period::ReportWindow};
use crate::{entity::{attendance, sea_orm_active_enums::AttendanceStatus, user}, utils};

impl AttendanceStatus {
    /// How much of a working day the status is paid for
    pub fn present_weight(self) -> f64 {
        match self {
            AttendanceStatus::Present => 1.0,
            AttendanceStatus::HalfDay => 0.5,
            AttendanceStatus::Absent | AttendanceStatus::Leave => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AttendanceSummary {
    pub present: u32,
    pub absent: u32,
    pub leave: u32,
    pub half_day: u32,
    /// Working days nobody recorded anything for. Not the same as absent.
    pub unmarked: u32,
    pub present_days: f64,
}

impl AttendanceSummary {
    fn record(&mut self, status: Option<AttendanceStatus>) {
        match status {
            Some(AttendanceStatus::Present) => self.present += 1,
            Some(AttendanceStatus::Absent) => self.absent += 1,
            Some(AttendanceStatus::Leave) => self.leave += 1,
            Some(AttendanceStatus::HalfDay) => self.half_day += 1,
            None => self.unmarked += 1,
        }

        self.present_days += status.map_or(0.0, AttendanceStatus::present_weight);
    }
}

impl AddAssign for AttendanceSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.present += rhs.present;
        self.absent += rhs.absent;
        self.leave += rhs.leave;
        self.half_day += rhs.half_day;
        self.unmarked += rhs.unmarked;
        self.present_days += rhs.present_days;
    }
}

/// One record per date; when the store holds duplicates the last updated one wins
fn latest_by_date<'r>(records: impl IntoIterator<Item = &'r attendance::Model>) -> HashMap<NaiveDate, &'r attendance::Model> {
    let mut by_date = HashMap::<NaiveDate, &attendance::Model>::new();

    for record in records {
        by_date
            .entry(record.date)
            .and_modify(|current| {
                if record.updated_at > current.updated_at {
                    *current = record;
                }
            })
            .or_insert(record);
    }

    by_date
}

/// Aggregates attendance over the working days of `[start, end]`
///
/// Records outside the range or on weekends and applicable holidays are ignored.
pub fn summarize<'r>(
    records: impl IntoIterator<Item = &'r attendance::Model>,
    calendar: &HolidayCalendar<'_>,
    site_id: Option<Uuid>,
    start: NaiveDate,
    end: NaiveDate,
) -> AttendanceSummary {
    let by_date = latest_by_date(records);
    let mut summary = AttendanceSummary::default();

    for date in calendar.working_dates(start, end, site_id) {
        summary.record(by_date.get(&date).map(|record| record.status));
    }

    summary
}

pub fn present_day_count<'r>(
    records: impl IntoIterator<Item = &'r attendance::Model>,
    calendar: &HolidayCalendar<'_>,
    site_id: Option<Uuid>,
    start: NaiveDate,
    end: NaiveDate,
) -> f64 {
    summarize(records, calendar, site_id, start, end).present_days
}

#[derive(Debug, Serialize)]
pub struct RegisterCell<'a> {
    pub date: NaiveDate,
    pub day: DayKind<'a>,
    pub employed: bool,
    pub status: Option<AttendanceStatus>,
}

#[derive(Debug, Serialize)]
pub struct RegisterRow<'a> {
    pub staff_id: Uuid,
    pub username: String,
    pub site_id: Option<Uuid>,
    pub cells: Vec<RegisterCell<'a>>,
    pub summary: AttendanceSummary,
}

/// Day-by-day attendance grid for one employee over the report window
pub fn register_row<'a>(
    staff: &user::Model,
    calendar: &HolidayCalendar<'a>,
    records: &[attendance::Model],
    window: &ReportWindow,
) -> RegisterRow<'a> {
    let by_date = latest_by_date(records);

    let cells = utils::days(window.start, window.end)
        .map(|date| RegisterCell {
            date,
            day: calendar.day_kind(date, staff.site_id),
            employed: employed_on(staff, date),
            status: by_date.get(&date).map(|record| record.status),
        })
        .collect();

    let (start, end) = window.effective(staff.joining_date, staff.exit_date);

    RegisterRow {
        staff_id: staff.id,
        username: staff.username.clone(),
        site_id: staff.site_id,
        cells,
        summary: summarize(records, calendar, staff.site_id, start, end),
    }
}

#[derive(Debug, Serialize)]
pub struct DailyOverview {
    pub date: NaiveDate,
    /// Staff for whom `date` is a working day
    pub expected: u32,
    pub summary: AttendanceSummary,
}

/// Attendance across every employee for one day
pub fn daily_overview(
    date: NaiveDate,
    staff: &[user::Model],
    calendar: &HolidayCalendar<'_>,
    records: &HashMap<Uuid, Vec<attendance::Model>>,
) -> DailyOverview {
    let mut overview = DailyOverview {
        date,
        expected: 0,
        summary: AttendanceSummary::default(),
    };

    for member in staff.iter().filter(|member| employed_on(member, date)) {
        if !calendar.is_working_day(date, member.site_id) {
            continue;
        }

        let member_records = records.get(&member.id).map(Vec::as_slice).unwrap_or_default();

        overview.expected += 1;
        overview.summary += summarize(member_records, calendar, member.site_id, date, date);
    }

    overview
}
