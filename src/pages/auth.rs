use actix_web::{get, post, web, Responder};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{auth::{hash_password, Authority}, entity::user, store::Store};

pub(super) fn config(cfg: &mut web::ServiceConfig) {
    cfg
        .service(login)
        .service(whoami);
}

#[derive(Debug, Serialize, Deserialize)]
struct Login {
    username: String,
    password: String,
}

#[post("/login")]
async fn login(store: web::Data<Store>, authority: web::Data<Authority>, credentials: web::Json<Login>) -> Result<impl Responder, actix_web::Error> {
    let hashed_password = hash_password(&credentials.username, &credentials.password);

    let Some(user) = store.user_by_credentials(&credentials.username, &hashed_password).await? else {
        return Err(actix_web::error::ErrorForbidden("invalid credentials"));
    };

    info!(user = %user.id, role = ?user.role, "issued token");

    Ok(authority.issue_for(&user)?)
}

#[get("")]
async fn whoami(user: user::Model) -> impl Responder {
    web::Json(user)
}
