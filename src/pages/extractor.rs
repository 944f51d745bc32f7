use std::{ops::Deref, str::FromStr};

use actix_web::{dev, web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use uuid::Uuid;

use crate::{entity::{sea_orm_active_enums::RoleType, user}, error::Error, store::Store};

/// The employee named by the `staff_id` path segment
///
/// Admins are not employees and are reported as not found.
pub(super) struct StaffMember(pub(super) user::Model);

impl Deref for StaffMember {
    type Target = user::Model;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for StaffMember {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let req = req.clone();

        Box::pin(async move {
            let Some(staff_id) = req.match_info().get("staff_id") else {
                return Err(actix_web::error::ErrorInternalServerError("`StaffMember` must be used under a `staff_id` path"))
            };
            let Ok(staff_id) = Uuid::from_str(staff_id) else {
                return Err(actix_web::error::ErrorBadRequest("invalid `staff_id`"))
            };

            let Some(store) = req.app_data::<web::Data<Store>>() else {
                return Err(actix_web::error::ErrorInternalServerError("store is not configured"))
            };

            match store.staff(staff_id).await? {
                Some(staff) if staff.role != RoleType::Admin => Ok(Self(staff)),
                _ => Err(Error::NotFound("staff").into()),
            }
        })
    }
}
