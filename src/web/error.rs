use crate::middleware::ClientCtx;
use actix_web::body::{BoxBody, EitherBody};
use actix_web::dev::ServiceResponse;
use actix_web::http::{header, header::HeaderValue, StatusCode};
use actix_web::middleware::ErrorHandlerResponse;
use actix_web::Result;
use askama_actix::Template;

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    client: ClientCtx,
    status: StatusCode,
    message: String,
}

impl ErrorTemplate {
    fn title(&self) -> &str {
        self.status.canonical_reason().unwrap_or("Error")
    }
}

/// Default copy for each status. Server errors never expose their cause.
fn message_for(status: StatusCode) -> String {
    match status {
        StatusCode::FORBIDDEN => "You do not have permission to do that.".to_owned(),
        StatusCode::NOT_FOUND => "The page you were looking for does not exist.".to_owned(),
        s if s.is_server_error() => "Something went wrong on our side.".to_owned(),
        _ => "The request could not be handled.".to_owned(),
    }
}

pub fn error_document<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    let client = ClientCtx::get_from_request(res.request());
    let body = BoxBody::new(
        ErrorTemplate {
            client,
            status: res.status(),
            message: message_for(res.status()),
        }
        .to_string(),
    );
    let mut res: ServiceResponse<EitherBody<B>> =
        res.map_body(|_, _| EitherBody::<B, BoxBody>::right(body));

    // Headers must be manually set because Actix-Web renders no content by default.
    let headers = res.response_mut().headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    // Error pages must never be cached by proxies.
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    Ok(ErrorHandlerResponse::Response(res))
}

pub fn render_403<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    error_document::<B>(res)
}

pub fn render_404<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    error_document::<B>(res)
}

pub fn render_500<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    error_document::<B>(res)
}
