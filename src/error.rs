use crate::form::FormErrors;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use derive_more::Display;
use sea_orm::DbErr;

/// Failures an operation can report to the web layer.
///
/// Hidden and absent records share `NotFound` so a response never reveals that
/// a record exists.
#[derive(Debug, Display)]
pub enum BlogError {
    #[display(fmt = "Not found.")]
    NotFound,
    #[display(fmt = "You do not have permission to do that.")]
    Forbidden,
    #[display(fmt = "Database error: {}", _0)]
    Database(DbErr),
    #[display(fmt = "Password hashing failed: {}", _0)]
    Password(String),
    #[display(fmt = "Could not store upload: {}", _0)]
    Storage(String),
}

impl From<DbErr> for BlogError {
    fn from(err: DbErr) -> Self {
        BlogError::Database(err)
    }
}

impl ResponseError for BlogError {
    fn status_code(&self) -> StatusCode {
        match self {
            BlogError::NotFound => StatusCode::NOT_FOUND,
            BlogError::Forbidden => StatusCode::FORBIDDEN,
            BlogError::Database(_) | BlogError::Password(_) | BlogError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            log::error!("{}", self);
        }
        HttpResponse::build(self.status_code()).body(self.to_string())
    }
}

/// What a successful or rejected mutation asks the web layer to do next.
#[derive(Debug)]
pub enum Outcome {
    /// Send the client elsewhere: success targets and the post ownership fallback.
    Redirect(String),
    /// Re-render the originating form. Nothing was written.
    Invalid(FormErrors),
}

impl Outcome {
    pub fn redirect_location(&self) -> Option<&str> {
        match self {
            Outcome::Redirect(location) => Some(location),
            Outcome::Invalid(_) => None,
        }
    }
}
