use actix_web::{delete, get, post, web, HttpResponse, Responder};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::Admin,
    entity::user,
    error::Error,
    store::{NewHoliday, PayrollSource, Store},
};

pub(super) fn config(cfg: &mut web::ServiceConfig) {
    cfg
        .service(list_holidays)
        .service(create_holiday)
        .service(delete_holiday);
}

#[derive(Debug, Serialize, Deserialize)]
struct HolidayRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize)]
struct CreateHoliday {
    date: NaiveDate,
    name: String,
    #[serde(default)]
    site_id: Option<Uuid>,
}

#[get("")]
async fn list_holidays(store: web::Data<Store>, _user: user::Model, range: web::Query<HolidayRange>) -> Result<impl Responder, Error> {
    if range.end < range.start {
        return Err(Error::bad_request("end is before start"));
    }

    Ok(web::Json(store.holidays_between(range.start, range.end).await?))
}

#[post("")]
async fn create_holiday(store: web::Data<Store>, admin: Admin, payload: web::Json<CreateHoliday>) -> Result<impl Responder, Error> {
    let CreateHoliday { date, name, site_id } = payload.into_inner();

    let name = name.trim();
    if name.is_empty() {
        return Err(Error::bad_request("a holiday needs a name"));
    }

    let holiday = store
        .insert_holiday(NewHoliday { date, name: name.to_string(), site_id }, admin.id)
        .await?;

    Ok(HttpResponse::Created().json(holiday))
}

#[delete("/{holiday_id}")]
async fn delete_holiday(store: web::Data<Store>, _admin: Admin, holiday_id: web::Path<Uuid>) -> Result<impl Responder, Error> {
    store.delete_holiday(holiday_id.into_inner()).await?;

    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use actix_web::{http::{Method, StatusCode}, test, App};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    use crate::{
        auth::{tests::{bearer, user}, Authority},
        entity::{holiday, sea_orm_active_enums::RoleType},
        fanout::feed::ChangeFeed,
        payroll::calendar::tests::{date, holiday},
    };

    use super::*;

    macro_rules! app {
        ($db:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(Authority::new(b"secret")))
                    .app_data(web::Data::new(Store::new($db.into_connection(), ChangeFeed::new(16))))
                    .service(web::scope("/holidays").configure(config))
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_list_holidays() {
        let holidays = vec![holiday(date(2024, 6, 12), "Founders day", None)];
        let app = app!(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([holidays.clone()]));

        let req = test::TestRequest::default()
            .uri("/holidays?start=2024-06-01&end=2024-06-30")
            .insert_header(bearer(&user(RoleType::Staff)))
            .to_request();

        let returned: Vec<holiday::Model> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(returned, holidays);

        let req = test::TestRequest::default()
            .uri("/holidays?start=2024-06-30&end=2024-06-01")
            .insert_header(bearer(&user(RoleType::Staff)))
            .to_request();

        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_create_holiday() {
        let created = holiday(date(2024, 6, 12), "Founders day", None);
        let app = app!(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![created.clone()]]));

        let payload = || CreateHoliday { date: created.date, name: created.name.clone(), site_id: None };

        let req = test::TestRequest::default()
            .uri("/holidays")
            .method(Method::POST)
            .insert_header(bearer(&user(RoleType::Manager)))
            .set_json(payload())
            .to_request();

        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::default()
            .uri("/holidays")
            .method(Method::POST)
            .insert_header(bearer(&user(RoleType::Admin)))
            .set_json(payload())
            .to_request();

        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let returned: holiday::Model = test::read_body_json(response).await;
        assert_eq!(returned, created);
    }

    #[actix_web::test]
    async fn test_delete_holiday() {
        let app = app!(
            MockDatabase::new(DatabaseBackend::Postgres).append_exec_results([
                MockExecResult { last_insert_id: 0, rows_affected: 1 },
                MockExecResult { last_insert_id: 0, rows_affected: 0 },
            ])
        );

        for status in [StatusCode::NO_CONTENT, StatusCode::NOT_FOUND] {
            let req = test::TestRequest::default()
                .uri(&format!("/holidays/{}", Uuid::new_v4()))
                .method(Method::DELETE)
                .insert_header(bearer(&user(RoleType::Admin)))
                .to_request();

            let response = test::call_service(&app, req).await;
            assert_eq!(response.status(), status);
        }
    }
}
