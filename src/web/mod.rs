pub mod account;
pub mod comment;
pub mod error;
pub mod index;
pub mod pages;
pub mod post;
pub mod profile;

use crate::error::Outcome;
use crate::form::FormErrors;
use crate::middleware::ClientCtx;
use crate::url;
use crate::user::ClientUser;
use actix_web::error::InternalError;
use actix_web::{Error, HttpRequest, HttpResponse};
use chrono::{NaiveDateTime, Utc};
use serde::Deserialize;

/// Configures the web app
///
/// @see https://docs.rs/actix-web/4.0.1/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // Fixed paths go before patterns they would otherwise match.
    account::configure(conf);
    pages::configure(conf);
    post::configure(conf);
    comment::configure(conf);
    profile::configure(conf);
    index::configure(conf);
}

/// `?page=N` on listings. Kept as text so a malformed value becomes a 404, not a 400.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

pub(crate) fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub(crate) fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .append_header(("Location", location))
        .finish()
}

/// Returns the signed-in user, or an error response that sends a guest to the
/// login page and back.
pub(crate) fn require_user(client: &ClientCtx, req: &HttpRequest) -> Result<ClientUser, Error> {
    match client.get_user() {
        Some(user) => Ok(user),
        None => Err(InternalError::from_response(
            "Login required.",
            redirect(&url::login_with_next(req.path())),
        )
        .into()),
    }
}

/// Turns a mutation outcome into a response, re-rendering the form when it was rejected.
pub(crate) fn respond<F>(outcome: Outcome, render: F) -> HttpResponse
where
    F: FnOnce(FormErrors) -> HttpResponse,
{
    match outcome {
        Outcome::Redirect(location) => redirect(&location),
        Outcome::Invalid(errors) => render(errors),
    }
}
