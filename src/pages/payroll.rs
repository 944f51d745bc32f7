use actix_web::{get, post, put, web, HttpResponse, Responder};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{Admin, Manager},
    config::Settings,
    entity::{salary_history, salary_payment, sea_orm_active_enums::RoleType, user},
    error::Error,
    pages::extractor::StaffMember,
    payroll::{
        period::{ReportWindow, SalaryMonth},
        report::{PayrollReport, PayrollRow},
        view::{PayrollView, SourceFailure},
    },
    store::{NewAdvance, NewPayment, Store},
    utils,
};

use model::*;

mod model;

pub(super) fn config(cfg: &mut web::ServiceConfig) {
    cfg
        .service(payroll_report)
        .service(record_advance)
        .service(record_payment)
        .service(update_salary)
        .service(list_salary_history);
}

/// Looks up someone who is on payroll
async fn payroll_member(store: &Store, staff_id: Uuid) -> Result<user::Model, Error> {
    store
        .staff(staff_id)
        .await?
        .filter(|staff| staff.role != RoleType::Admin)
        .ok_or(Error::NotFound("staff"))
}

#[get("")]
async fn payroll_report(
    store: web::Data<Store>,
    settings: web::Data<Settings>,
    _manager: Manager,
    query: web::Query<PayrollQuery>,
) -> Result<impl Responder, Error> {
    let window = query.window()?;
    let staff = store.payroll_staff(window.month, query.site_id).await?;

    let mut view = PayrollView::new(store.get_ref().clone(), settings.batch_size, window, staff);
    let report = timeout(settings.report_timeout, view.ready())
        .await
        .map_err(|_| Error::Timeout("payroll report"))?
        .clone();

    let failures = view.failures();
    view.dispose();

    Ok(web::Json(PayrollResponse { report, failures }))
}

#[post("/advances")]
async fn record_advance(store: web::Data<Store>, manager: Manager, payload: web::Json<CreateAdvance>) -> Result<impl Responder, Error> {
    let CreateAdvance { staff_id, amount, date, note } = payload.into_inner();

    if amount <= 0 {
        return Err(Error::bad_request("amount must be positive"));
    }

    payroll_member(&store, staff_id).await?;

    let advance = NewAdvance {
        staff_id,
        amount,
        date: date.unwrap_or_else(utils::today),
        note,
    };
    let advance = store.insert_advance(advance, manager.id).await?;

    info!(%staff_id, amount, "salary advance recorded");

    Ok(HttpResponse::Created().json(advance))
}

#[post("/payments")]
async fn record_payment(
    store: web::Data<Store>,
    settings: web::Data<Settings>,
    admin: Admin,
    payload: web::Json<CreatePayment>,
) -> Result<impl Responder, Error> {
    let CreatePayment { staff_id, amount_paid, year, month, payment_date } = payload.into_inner();

    if amount_paid <= 0 {
        return Err(Error::bad_request("amount must be positive"));
    }

    let Some(month) = SalaryMonth::new(year, month) else {
        return Err(Error::bad_request("invalid year or month"));
    };

    let staff = payroll_member(&store, staff_id).await?;

    let mut view = PayrollView::new(store.get_ref().clone(), settings.batch_size, ReportWindow::whole(month), vec![staff]);
    timeout(settings.report_timeout, view.ready())
        .await
        .map_err(|_| Error::Timeout("payroll report"))?;

    let payment = NewPayment {
        staff_id,
        amount_paid,
        month,
        payment_date: payment_date.unwrap_or_else(utils::today),
    };
    let payment = view.record_payment(payment, admin.id).await?;
    let row = view.report().row(staff_id).cloned();
    view.dispose();

    Ok(HttpResponse::Created().json(PaymentReceipt { payment, row }))
}

#[put("/staff/{staff_id}/salary")]
async fn update_salary(store: web::Data<Store>, admin: Admin, staff: StaffMember, payload: web::Json<UpdateSalary>) -> Result<impl Responder, Error> {
    let UpdateSalary { salary, effective_date } = payload.into_inner();

    if salary <= 0 {
        return Err(Error::bad_request("salary must be positive"));
    }

    let (staff, history) = store
        .update_salary(staff.id, salary, effective_date.unwrap_or_else(utils::today), admin.id)
        .await?;

    Ok(web::Json(SalaryChange { staff, history }))
}

#[get("/staff/{staff_id}/salary_history")]
async fn list_salary_history(store: web::Data<Store>, _manager: Manager, staff: StaffMember) -> Result<impl Responder, Error> {
    Ok(web::Json(store.salary_history(staff.id).await?))
}
