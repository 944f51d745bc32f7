use actix_web::{body, http::{header::ContentType, StatusCode}, HttpResponse};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error")]
    Database(#[from] sea_orm::DbErr),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
}

impl Error {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }
}

impl actix_web::error::ResponseError for Error {
    fn error_response(&self) -> HttpResponse<body::BoxBody> {
        if let Error::Database(err) = self {
            error!(%err, "database error while handling request");
        }

        HttpResponse::build(self.status_code())
            .insert_header(ContentType::plaintext())
            .body(self.to_string())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}
