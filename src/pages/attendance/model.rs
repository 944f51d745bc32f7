use super::*;

/// Fields left out keep their stored value
#[derive(Debug, Default, Serialize, Deserialize)]
pub(super) struct RecordAttendance {
    #[serde(default)]
    pub(super) status: Option<AttendanceStatus>,
    #[serde(default)]
    pub(super) note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct BulkAttendance {
    pub(super) date: NaiveDate,
    #[serde(default)]
    pub(super) site_id: Option<Uuid>,
    pub(super) entries: Vec<BulkEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct BulkEntry {
    pub(super) staff_id: Uuid,
    pub(super) status: AttendanceStatus,
}

/// A write either happens or is skipped with a reason; skipping is not an error
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub(super) enum Outcome<T> {
    Recorded { record: T },
    Skipped { reason: &'static str },
}

#[derive(Debug, Serialize)]
pub(super) struct BulkRecorded {
    pub(super) recorded: Vec<attendance::Model>,
    pub(super) skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Serialize)]
pub(super) struct SkippedEntry {
    pub(super) staff_id: Uuid,
    pub(super) reason: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct MonthQuery {
    pub(super) year: i32,
    pub(super) month: u32,
    pub(super) site_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct DailyQuery {
    pub(super) date: NaiveDate,
    pub(super) site_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub(super) struct Register<'a> {
    pub(super) window: ReportWindow,
    pub(super) rows: Vec<RegisterRow<'a>>,
    pub(super) failures: Vec<BatchFailure>,
}

#[derive(Debug, Serialize)]
pub(super) struct Daily {
    #[serde(flatten)]
    pub(super) overview: DailyOverview,
    pub(super) failures: Vec<BatchFailure>,
}
