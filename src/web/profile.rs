use super::{now, require_user, respond, PageQuery};
use crate::form::{FormErrors, ProfileFormData};
use crate::listing::{parse_page, profile_page, PostPage};
use crate::middleware::ClientCtx;
use crate::template::PaginatorToHtml;
use crate::user::{get_own_account, update_profile, UserProfile};
use actix_web::{get, post, web, Error, HttpRequest, Responder};
use askama_actix::{Template, TemplateToResponse};
use chrono::NaiveDateTime;
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_profile)
        .service(edit_profile)
        .service(update_profile_post);
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub client: ClientCtx,
    pub profile: UserProfile,
    pub page: PostPage,
    pub now: NaiveDateTime,
}

impl ProfileTemplate {
    pub fn is_owner(&self) -> bool {
        self.client.actor().is(self.profile.id)
    }

    pub fn joined(&self) -> String {
        self.client
            .site_time()
            .to_local(self.profile.created_at)
            .format("%d %B %Y")
            .to_string()
    }
}

#[derive(Template)]
#[template(path = "user.html")]
pub struct ProfileFormTemplate {
    pub client: ClientCtx,
    pub form: ProfileFormData,
    pub errors: FormErrors,
}

#[get("/profile/{username}/")]
async fn view_profile(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<impl Responder, Error> {
    let page = parse_page(query.page.as_deref())?;
    let now = now();
    let (author, page) = profile_page(&db, client.actor(), &path.into_inner(), now, page).await?;

    Ok(ProfileTemplate {
        client,
        profile: author.into(),
        page,
        now,
    }
    .to_response())
}

#[get("/edit_profile/")]
async fn edit_profile(
    client: ClientCtx,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
) -> Result<impl Responder, Error> {
    let user = require_user(&client, &req)?;
    let account = get_own_account(&db, user.id).await?;

    Ok(ProfileFormTemplate {
        client,
        form: ProfileFormData {
            username: account.username,
            email: account.email,
            first_name: account.first_name,
            last_name: account.last_name,
        },
        errors: FormErrors::default(),
    }
    .to_response())
}

#[post("/edit_profile/")]
async fn update_profile_post(
    client: ClientCtx,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    form: web::Form<ProfileFormData>,
) -> Result<impl Responder, Error> {
    let user = require_user(&client, &req)?;
    let form = form.into_inner();
    let outcome = update_profile(&db, user.id, &form).await?;

    Ok(respond(outcome, |errors| {
        ProfileFormTemplate {
            client,
            form,
            errors,
        }
        .to_response()
    }))
}
