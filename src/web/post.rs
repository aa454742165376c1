use super::{now, redirect, require_user};
use crate::comment::{get_comments_for_post, CommentForTemplate};
use crate::error::{BlogError, Outcome};
use crate::form::{CommentFormData, FormErrors, PostFormData};
use crate::middleware::ClientCtx;
use crate::orm::{categories, locations, posts};
use crate::post::{
    check_post_access, create_post, delete_post, get_category_choices, get_location_choices,
    get_visible_post, update_post, PostAccess, PostForTemplate,
};
use crate::site_time::SiteTime;
use crate::upload::{read_post_form, MediaStore};
use crate::url;
use actix_multipart::Multipart;
use actix_web::{get, post, web, Error, HttpRequest, HttpResponse, Responder};
use askama_actix::{Template, TemplateToResponse};
use chrono::NaiveDateTime;
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(create_post_form)
        .service(create_post_post)
        .service(view_post)
        .service(edit_post)
        .service(update_post_post)
        .service(delete_post_form)
        .service(destroy_post);
}

#[derive(Template)]
#[template(path = "detail.html")]
pub struct PostDetailTemplate {
    pub client: ClientCtx,
    pub post: PostForTemplate,
    pub comments: Vec<CommentForTemplate>,
    pub form: CommentFormData,
    pub errors: FormErrors,
    pub now: NaiveDateTime,
}

impl PostDetailTemplate {
    pub fn comment_action(&self) -> String {
        url::comment_create(self.post.id)
    }

    pub fn can_edit(&self) -> bool {
        self.client.can_edit_post(&self.post)
    }

    pub fn edit_url(&self) -> String {
        url::post_edit(self.post.id)
    }

    pub fn delete_url(&self) -> String {
        url::post_delete(self.post.id)
    }
}

/// Shared by creation and editing. `editing` swaps the date input for the location select.
#[derive(Template)]
#[template(path = "create.html")]
pub struct PostFormTemplate {
    pub client: ClientCtx,
    pub action: String,
    pub editing: bool,
    pub form: PostFormData,
    pub errors: FormErrors,
    pub categories: Vec<categories::Model>,
    pub locations: Vec<locations::Model>,
    /// Stored image of the post being edited.
    pub current_image: Option<String>,
}

impl PostFormTemplate {
    async fn new(
        db: &DatabaseConnection,
        client: ClientCtx,
        action: String,
        editing: Option<&posts::Model>,
        form: PostFormData,
        errors: FormErrors,
    ) -> Result<Self, Error> {
        Ok(Self {
            client,
            action,
            editing: editing.is_some(),
            current_image: editing.and_then(|post| post.image.to_owned()),
            form,
            errors,
            categories: get_category_choices(db)
                .await
                .map_err(BlogError::from)?,
            locations: get_location_choices(db)
                .await
                .map_err(BlogError::from)?,
        })
    }

    pub fn is_selected_category(&self, id: i32) -> bool {
        self.form.category.trim() == id.to_string()
    }

    pub fn is_selected_location(&self, id: i32) -> bool {
        self.form.location.trim() == id.to_string()
    }

    pub fn has_current_image(&self) -> bool {
        self.current_image.is_some()
    }

    pub fn current_image_src(&self) -> String {
        url::media(self.current_image.as_deref().unwrap_or(""))
    }
}

#[derive(Template)]
#[template(path = "delete.html")]
pub struct PostDeleteTemplate {
    pub client: ClientCtx,
    pub post: posts::Model,
}

impl PostDeleteTemplate {
    pub fn action(&self) -> String {
        url::post_delete(self.post.id)
    }

    pub fn cancel_url(&self) -> String {
        url::post(self.post.id)
    }
}

/// Prefills the edit form from a stored post.
fn form_from_post(post: &posts::Model, site_time: SiteTime) -> PostFormData {
    PostFormData {
        title: post.title.to_owned(),
        text: post.text.to_owned(),
        pub_date: site_time.input_value(post.pub_date),
        category: post.category_id.map(|id| id.to_string()).unwrap_or_default(),
        location: post.location_id.map(|id| id.to_string()).unwrap_or_default(),
        ..Default::default()
    }
}

/// Renders a visible post with its comments. Used for the detail page and for
/// rejected comment submissions.
pub(super) async fn render_post_detail(
    db: &DatabaseConnection,
    client: ClientCtx,
    post_id: i32,
    form: CommentFormData,
    errors: FormErrors,
) -> Result<HttpResponse, Error> {
    let now = now();
    let post = get_visible_post(db, client.actor(), post_id, now).await?;
    let comments = get_comments_for_post(db, post.id)
        .await
        .map_err(BlogError::from)?;

    Ok(PostDetailTemplate {
        client,
        post,
        comments,
        form,
        errors,
        now,
    }
    .to_response())
}

#[get("/posts/{pk}/")]
async fn view_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, Error> {
    render_post_detail(
        &db,
        client,
        path.into_inner(),
        CommentFormData::default(),
        FormErrors::default(),
    )
    .await
}

#[get("/posts/create/")]
async fn create_post_form(
    client: ClientCtx,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
) -> Result<impl Responder, Error> {
    require_user(&client, &req)?;
    let template = PostFormTemplate::new(
        &db,
        client,
        url::post_create(),
        None,
        PostFormData::default(),
        FormErrors::default(),
    )
    .await?;

    Ok(template.to_response())
}

#[post("/posts/create/")]
async fn create_post_post(
    client: ClientCtx,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    media: web::Data<MediaStore>,
    payload: Multipart,
) -> Result<impl Responder, Error> {
    let user = require_user(&client, &req)?;
    let form = read_post_form(payload).await?;

    match create_post(&db, &media, &user, &form, client.site_time(), now()).await? {
        Outcome::Redirect(location) => Ok(redirect(&location)),
        Outcome::Invalid(errors) => Ok(PostFormTemplate::new(
            &db,
            client,
            url::post_create(),
            None,
            form,
            errors,
        )
        .await?
        .to_response()),
    }
}

#[get("/posts/{pk}/edit/")]
async fn edit_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, Error> {
    let post = match check_post_access(&db, client.actor(), path.into_inner()).await? {
        PostAccess::Author(post) => post,
        PostAccess::Redirect(location) => return Ok(redirect(&location)),
    };

    let form = form_from_post(&post, client.site_time());
    let template = PostFormTemplate::new(
        &db,
        client,
        url::post_edit(post.id),
        Some(&post),
        form,
        FormErrors::default(),
    )
    .await?;
    Ok(template.to_response())
}

#[post("/posts/{pk}/edit/")]
async fn update_post_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    media: web::Data<MediaStore>,
    path: web::Path<i32>,
    payload: Multipart,
) -> Result<impl Responder, Error> {
    let id = path.into_inner();
    let form = read_post_form(payload).await?;

    match update_post(&db, &media, client.actor(), id, &form, now()).await? {
        Outcome::Redirect(location) => Ok(redirect(&location)),
        Outcome::Invalid(errors) => {
            // Only the author gets this far; reload for the current image.
            let post = match check_post_access(&db, client.actor(), id).await? {
                PostAccess::Author(post) => post,
                PostAccess::Redirect(location) => return Ok(redirect(&location)),
            };
            Ok(PostFormTemplate::new(
                &db,
                client,
                url::post_edit(id),
                Some(&post),
                form,
                errors,
            )
            .await?
            .to_response())
        }
    }
}

#[get("/posts/{pk}/delete/")]
async fn delete_post_form(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, Error> {
    match check_post_access(&db, client.actor(), path.into_inner()).await? {
        PostAccess::Author(post) => Ok(PostDeleteTemplate { client, post }.to_response()),
        PostAccess::Redirect(location) => Ok(redirect(&location)),
    }
}

#[post("/posts/{pk}/delete/")]
async fn destroy_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, Error> {
    let outcome = delete_post(&db, client.actor(), path.into_inner()).await?;
    Ok(redirect(outcome.redirect_location().unwrap_or("/")))
}
