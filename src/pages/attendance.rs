use std::collections::HashMap;

use actix_web::{get, post, put, web, HttpResponse, Responder};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
    auth::Manager,
    config::Settings,
    entity::{attendance, sea_orm_active_enums::AttendanceStatus, user},
    error::Error,
    fanout::{fetch_batched, BatchFailure},
    pages::extractor::StaffMember,
    payroll::{
        attendance::{daily_overview, register_row, DailyOverview, RegisterRow},
        calendar::HolidayCalendar,
        employed_on,
        period::{ReportWindow, SalaryMonth},
    },
    store::{AttendancePatch, PayrollSource, Store},
};

use model::*;

mod model;

pub(super) fn config(cfg: &mut web::ServiceConfig) {
    cfg
        .service(record_bulk)
        .service(register)
        .service(daily)
        .service(record_attendance);
}

/// Why attendance for `staff` on `date` cannot be recorded, if it cannot
async fn skip_reason(store: &Store, staff: &user::Model, date: NaiveDate) -> Result<Option<&'static str>, Error> {
    let Some(site_id) = staff.site_id else {
        return Ok(Some("staff has no site"));
    };

    if !employed_on(staff, date) {
        return Ok(Some("outside employment"));
    }

    let holidays = store.holidays_between(date, date).await?;
    if !HolidayCalendar::new(&holidays).is_working_day(date, Some(site_id)) {
        return Ok(Some("not a working day"));
    }

    Ok(None)
}

#[put("/{staff_id}/{date}")]
async fn record_attendance(
    store: web::Data<Store>,
    manager: Manager,
    staff: StaffMember,
    path: web::Path<(Uuid, NaiveDate)>,
    payload: web::Json<RecordAttendance>,
) -> Result<impl Responder, Error> {
    let (_, date) = path.into_inner();

    if let Some(reason) = skip_reason(&store, &staff, date).await? {
        debug!(staff = %staff.id, %date, reason, "skipping attendance");
        return Ok(web::Json(Outcome::Skipped { reason }));
    }

    let payload = payload.into_inner();
    let patch = AttendancePatch {
        status: payload.status,
        note: payload.note,
    };

    let record = store.upsert_attendance(staff.id, date, patch, manager.id).await?;

    Ok(web::Json(Outcome::Recorded { record }))
}

#[post("/bulk")]
async fn record_bulk(store: web::Data<Store>, manager: Manager, payload: web::Json<BulkAttendance>) -> Result<impl Responder, Error> {
    let BulkAttendance { date, site_id, entries } = payload.into_inner();

    let Some(site_id) = site_id else {
        return Ok(web::Json(Outcome::Skipped { reason: "no site selected" }));
    };

    let holidays = store.holidays_between(date, date).await?;
    if !HolidayCalendar::new(&holidays).is_working_day(date, Some(site_id)) {
        return Ok(web::Json(Outcome::Skipped { reason: "not a working day" }));
    }

    let staff = store
        .payroll_staff(SalaryMonth::containing(date), Some(site_id))
        .await?
        .into_iter()
        .map(|member| (member.id, member))
        .collect::<HashMap<_, _>>();

    let mut accepted = Vec::new();
    let mut skipped = Vec::new();

    for BulkEntry { staff_id, status } in entries {
        let reason = match staff.get(&staff_id) {
            None => Some("not on this site"),
            Some(member) if !employed_on(member, date) => Some("outside employment"),
            Some(_) => None,
        };

        if let Some(reason) = reason {
            skipped.push(SkippedEntry { staff_id, reason });
            continue;
        }

        accepted.push((staff_id, AttendancePatch { status: Some(status), note: None }));
    }

    let recorded = store.upsert_attendance_many(date, accepted, manager.id).await?;

    debug!(%site_id, %date, recorded = recorded.len(), skipped = skipped.len(), "bulk attendance");

    Ok(web::Json(Outcome::Recorded {
        record: BulkRecorded { recorded, skipped },
    }))
}

#[get("/register")]
async fn register(
    store: web::Data<Store>,
    settings: web::Data<Settings>,
    _manager: Manager,
    query: web::Query<MonthQuery>,
) -> Result<HttpResponse, Error> {
    let Some(month) = SalaryMonth::new(query.year, query.month) else {
        return Err(Error::bad_request("invalid year or month"));
    };
    let window = ReportWindow::whole(month);

    let staff = store.payroll_staff(month, query.site_id).await?;
    let holidays = store.holidays_between(month.first_day(), month.last_day()).await?;
    let calendar = HolidayCalendar::new(&holidays);

    let ids = staff.iter().map(|member| member.id).collect::<Vec<_>>();
    let (attendance, failures) = fetch_batched(&ids, settings.batch_size, |batch| {
        store.attendance_for(batch, window.start, window.end)
    })
    .await;

    let rows = staff
        .iter()
        .map(|member| {
            let records = attendance.get(&member.id).map(Vec::as_slice).unwrap_or_default();

            register_row(member, &calendar, records, &window)
        })
        .collect();

    Ok(HttpResponse::Ok().json(Register { window, rows, failures }))
}

#[get("/daily")]
async fn daily(
    store: web::Data<Store>,
    settings: web::Data<Settings>,
    _manager: Manager,
    query: web::Query<DailyQuery>,
) -> Result<impl Responder, Error> {
    let date = query.date;

    let staff = store.payroll_staff(SalaryMonth::containing(date), query.site_id).await?;
    let holidays = store.holidays_between(date, date).await?;
    let calendar = HolidayCalendar::new(&holidays);

    let ids = staff.iter().map(|member| member.id).collect::<Vec<_>>();
    let (attendance, failures) = fetch_batched(&ids, settings.batch_size, |batch| store.attendance_for(batch, date, date)).await;

    Ok(web::Json(Daily {
        overview: daily_overview(date, &staff, &calendar, &attendance),
        failures,
    }))
}

#[cfg(test)]
mod tests {
    use actix_web::{http::Method, test, App};
    use sea_orm::{DatabaseBackend, MockDatabase};

    use crate::{
        auth::{tests::{bearer, user}, Authority},
        entity::{holiday, sea_orm_active_enums::RoleType},
        fanout::feed::ChangeFeed,
        payroll::{attendance::tests::record, calendar::tests::date, report::tests::staff},
    };

    use super::*;

    macro_rules! app {
        ($db:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(Authority::new(b"secret")))
                    .app_data(web::Data::new(Store::new($db.into_connection(), ChangeFeed::new(16))))
                    .app_data(web::Data::new(Settings::default()))
                    .service(web::scope("/attendance").configure(config))
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_record_attendance_inserts() {
        let member = staff("Ayu", 20_000, Some(Uuid::new_v4()));
        let created = record(member.id, date(2024, 6, 3), AttendanceStatus::Present);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![member.clone()]])
            .append_query_results([Vec::<holiday::Model>::new()])
            .append_query_results([Vec::<attendance::Model>::new(), vec![created.clone()]]);
        let app = app!(db);

        let req = test::TestRequest::default()
            .uri(&format!("/attendance/{}/2024-06-03", member.id))
            .method(Method::PUT)
            .insert_header(bearer(&user(RoleType::Manager)))
            .set_json(RecordAttendance { status: Some(AttendanceStatus::Present), note: None })
            .to_request();

        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["outcome"], "recorded");
        assert_eq!(body["record"]["id"], created.id.to_string());
        assert_eq!(body["record"]["status"], "present");
    }

    #[actix_web::test]
    async fn test_record_attendance_guards() {
        let without_site = staff("Budi", 20_000, None);
        let with_site = staff("Citra", 20_000, Some(Uuid::new_v4()));

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![without_site.clone()]])
            .append_query_results([vec![with_site.clone()]])
            .append_query_results([Vec::<holiday::Model>::new()]);
        let app = app!(db);

        // 2024-06-08 is a Saturday
        for (member, uri_date, reason) in [(&without_site, "2024-06-03", "staff has no site"), (&with_site, "2024-06-08", "not a working day")] {
            let req = test::TestRequest::default()
                .uri(&format!("/attendance/{}/{uri_date}", member.id))
                .method(Method::PUT)
                .insert_header(bearer(&user(RoleType::Manager)))
                .set_json(RecordAttendance { status: Some(AttendanceStatus::Present), note: None })
                .to_request();

            let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body["outcome"], "skipped");
            assert_eq!(body["reason"], reason);
        }
    }

    #[actix_web::test]
    async fn test_record_attendance_requires_manager() {
        let app = app!(MockDatabase::new(DatabaseBackend::Postgres));

        let req = test::TestRequest::default()
            .uri(&format!("/attendance/{}/2024-06-03", Uuid::new_v4()))
            .method(Method::PUT)
            .insert_header(bearer(&user(RoleType::Staff)))
            .set_json(RecordAttendance::default())
            .to_request();

        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), actix_web::http::StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_bulk_without_site_is_skipped() {
        let app = app!(MockDatabase::new(DatabaseBackend::Postgres));

        let req = test::TestRequest::default()
            .uri("/attendance/bulk")
            .method(Method::POST)
            .insert_header(bearer(&user(RoleType::Manager)))
            .set_json(BulkAttendance {
                date: date(2024, 6, 3),
                site_id: None,
                entries: vec![BulkEntry { staff_id: Uuid::new_v4(), status: AttendanceStatus::Present }],
            })
            .to_request();

        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["outcome"], "skipped");
        assert_eq!(body["reason"], "no site selected");
    }

    #[actix_web::test]
    async fn test_bulk_skips_other_sites() {
        let site = Uuid::new_v4();
        let member = staff("Dewi", 20_000, Some(site));
        let created = record(member.id, date(2024, 6, 3), AttendanceStatus::HalfDay);
        let stranger = Uuid::new_v4();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<holiday::Model>::new()])
            .append_query_results([vec![member.clone()]])
            .append_query_results([Vec::<attendance::Model>::new(), vec![created.clone()]]);
        let app = app!(db);

        let req = test::TestRequest::default()
            .uri("/attendance/bulk")
            .method(Method::POST)
            .insert_header(bearer(&user(RoleType::Manager)))
            .set_json(BulkAttendance {
                date: date(2024, 6, 3),
                site_id: Some(site),
                entries: vec![
                    BulkEntry { staff_id: member.id, status: AttendanceStatus::HalfDay },
                    BulkEntry { staff_id: stranger, status: AttendanceStatus::Present },
                ],
            })
            .to_request();

        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["outcome"], "recorded");
        assert_eq!(body["record"]["recorded"].as_array().unwrap().len(), 1);
        assert_eq!(body["record"]["skipped"][0]["staff_id"], stranger.to_string());
        assert_eq!(body["record"]["skipped"][0]["reason"], "not on this site");
    }

    #[actix_web::test]
    async fn test_bulk_failure_writes_nothing() {
        let site = Uuid::new_v4();
        let members = vec![staff("Fajar", 20_000, Some(site)), staff("Gita", 20_000, Some(site))];
        let created = record(members[0].id, date(2024, 6, 3), AttendanceStatus::Present);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<holiday::Model>::new()])
            .append_query_results([members.clone()])
            .append_query_results([Vec::<attendance::Model>::new(), vec![created]])
            .append_query_errors([sea_orm::DbErr::Custom("connection reset".into())]);

        let feed = ChangeFeed::new(16);
        let mut changes = feed.subscribe();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Authority::new(b"secret")))
                .app_data(web::Data::new(Store::new(db.into_connection(), feed)))
                .app_data(web::Data::new(Settings::default()))
                .service(web::scope("/attendance").configure(config))
        )
        .await;

        let req = test::TestRequest::default()
            .uri("/attendance/bulk")
            .method(Method::POST)
            .insert_header(bearer(&user(RoleType::Manager)))
            .set_json(BulkAttendance {
                date: date(2024, 6, 3),
                site_id: Some(site),
                entries: members
                    .iter()
                    .map(|member| BulkEntry { staff_id: member.id, status: AttendanceStatus::Present })
                    .collect(),
            })
            .to_request();

        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);

        // the first entry was rolled back with the rest, so nobody hears about it
        assert!(changes.try_recv().is_err());
    }

    #[actix_web::test]
    async fn test_register() {
        let member = staff("Eko", 20_000, None);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![member.clone()]])
            .append_query_results([Vec::<holiday::Model>::new()])
            .append_query_results([vec![
                record(member.id, date(2024, 6, 3), AttendanceStatus::Present),
                record(member.id, date(2024, 6, 4), AttendanceStatus::Leave),
            ]]);
        let app = app!(db);

        let req = test::TestRequest::default()
            .uri("/attendance/register?year=2024&month=6")
            .insert_header(bearer(&user(RoleType::Manager)))
            .to_request();

        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let row = &body["rows"][0];
        assert_eq!(row["cells"].as_array().unwrap().len(), 30);
        assert_eq!(row["cells"][0]["day"]["kind"], "weekend");
        assert_eq!(row["cells"][2]["status"], "present");
        assert_eq!(row["summary"]["present"], 1);
        assert_eq!(row["summary"]["leave"], 1);
        assert_eq!(row["summary"]["unmarked"], 18);
        assert!(body["failures"].as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_register_rejects_bad_month() {
        let app = app!(MockDatabase::new(DatabaseBackend::Postgres));

        let req = test::TestRequest::default()
            .uri("/attendance/register?year=2024&month=13")
            .insert_header(bearer(&user(RoleType::Manager)))
            .to_request();

        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_daily() {
        let members = vec![staff("a", 20_000, None), staff("b", 20_000, None)];

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([members.clone()])
            .append_query_results([Vec::<holiday::Model>::new()])
            .append_query_results([vec![record(members[0].id, date(2024, 6, 3), AttendanceStatus::Absent)]]);
        let app = app!(db);

        let req = test::TestRequest::default()
            .uri("/attendance/daily?date=2024-06-03")
            .insert_header(bearer(&user(RoleType::Admin)))
            .to_request();

        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["date"], "2024-06-03");
        assert_eq!(body["expected"], 2);
        assert_eq!(body["summary"]["absent"], 1);
        assert_eq!(body["summary"]["unmarked"], 1);
    }
}
