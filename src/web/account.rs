use super::{now, redirect, respond};
use crate::form::{FormErrors, LoginFormData, RegistrationFormData};
use crate::middleware::ClientCtx;
use crate::session;
use crate::url;
use crate::user::{authenticate, register};
use actix_session::Session;
use actix_web::{get, post, route, web, Error, Responder};
use askama_actix::{Template, TemplateToResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_login)
        .service(post_login)
        .service(view_logout)
        .service(view_registration)
        .service(post_registration);
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub client: ClientCtx,
    pub form: LoginFormData,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "logged_out.html")]
pub struct LoggedOutTemplate {
    pub client: ClientCtx,
}

#[derive(Template)]
#[template(path = "registration_form.html")]
pub struct RegistrationTemplate {
    pub client: ClientCtx,
    pub form: RegistrationFormData,
    pub errors: FormErrors,
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    #[serde(default)]
    pub next: String,
}

#[get("/auth/login/")]
async fn view_login(client: ClientCtx, query: web::Query<NextQuery>) -> impl Responder {
    if client.is_user() {
        return redirect(&client.profile_url());
    }

    LoginTemplate {
        client,
        form: LoginFormData {
            next: query.into_inner().next,
            ..Default::default()
        },
        errors: FormErrors::default(),
    }
    .to_response()
}

#[post("/auth/login/")]
async fn post_login(
    client: ClientCtx,
    session: Session,
    db: web::Data<DatabaseConnection>,
    form: web::Form<LoginFormData>,
) -> Result<impl Responder, Error> {
    let mut form = form.into_inner();

    match authenticate(&db, &form.username, &form.password).await? {
        Ok(user) => {
            session::login(&session, user.id)?;
            log::info!("user {} logged in", user.id);
            let location = url::safe_next(&form.next)
                .map(str::to_owned)
                .unwrap_or_else(|| url::profile(&user.username));
            Ok(redirect(&location))
        }
        Err(errors) => {
            // Never echo the password back.
            form.password.clear();
            Ok(LoginTemplate {
                client,
                form,
                errors,
            }
            .to_response())
        }
    }
}

#[route("/auth/logout/", method = "GET", method = "POST")]
async fn view_logout(client: ClientCtx, session: Session) -> impl Responder {
    session::logout(&session);
    // The request context still holds the old user; render as a guest.
    LoggedOutTemplate {
        client: ClientCtx::from_user(None, client.site_time()),
    }
    .to_response()
}

#[get("/auth/registration/")]
async fn view_registration(client: ClientCtx) -> impl Responder {
    RegistrationTemplate {
        client,
        form: RegistrationFormData::default(),
        errors: FormErrors::default(),
    }
    .to_response()
}

#[post("/auth/registration/")]
async fn post_registration(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Form<RegistrationFormData>,
) -> Result<impl Responder, Error> {
    let mut form = form.into_inner();
    let outcome = register(&db, &form, now()).await?;

    form.password1.clear();
    form.password2.clear();
    Ok(respond(outcome, |errors| {
        RegistrationTemplate {
            client,
            form,
            errors,
        }
        .to_response()
    }))
}
