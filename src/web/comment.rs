use super::post::render_post_detail;
use super::{now, redirect, require_user};
use crate::comment::{
    create_comment, delete_comment, get_comment_for_delete, get_own_comment, update_comment,
};
use crate::error::Outcome;
use crate::form::{CommentFormData, FormErrors};
use crate::middleware::ClientCtx;
use crate::orm::comments;
use crate::url;
use actix_web::{get, post, web, Error, HttpRequest, Responder};
use askama_actix::{Template, TemplateToResponse};
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(create_comment_post)
        .service(edit_comment)
        .service(update_comment_post)
        .service(delete_comment_form)
        .service(destroy_comment);
}

/// Comment edit form, or the delete confirmation when `deleting` is set.
#[derive(Template)]
#[template(path = "comment.html")]
pub struct CommentTemplate {
    pub client: ClientCtx,
    pub comment: comments::Model,
    pub deleting: bool,
    pub form: CommentFormData,
    pub errors: FormErrors,
}

impl CommentTemplate {
    pub fn action(&self) -> String {
        if self.deleting {
            url::comment_delete(self.comment.post_id, self.comment.id)
        } else {
            url::comment_edit(self.comment.post_id, self.comment.id)
        }
    }

    pub fn post_url(&self) -> String {
        url::post(self.comment.post_id)
    }
}

#[post("/posts/{pk}/comment/")]
async fn create_comment_post(
    client: ClientCtx,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Form<CommentFormData>,
) -> Result<impl Responder, Error> {
    let user = require_user(&client, &req)?;
    let post_id = path.into_inner();
    let form = form.into_inner();

    match create_comment(&db, user.id, post_id, &form, now()).await? {
        Outcome::Redirect(location) => Ok(redirect(&location)),
        Outcome::Invalid(errors) => render_post_detail(&db, client, post_id, form, errors).await,
    }
}

#[get("/posts/{pk}/edit_comment/{comment_id}/")]
async fn edit_comment(
    client: ClientCtx,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    path: web::Path<(i32, i32)>,
) -> Result<impl Responder, Error> {
    require_user(&client, &req)?;
    let (_, comment_id) = path.into_inner();
    let comment = get_own_comment(&db, client.actor(), comment_id).await?;

    Ok(CommentTemplate {
        client,
        form: CommentFormData {
            text: comment.text.to_owned(),
        },
        comment,
        deleting: false,
        errors: FormErrors::default(),
    }
    .to_response())
}

#[post("/posts/{pk}/edit_comment/{comment_id}/")]
async fn update_comment_post(
    client: ClientCtx,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    path: web::Path<(i32, i32)>,
    form: web::Form<CommentFormData>,
) -> Result<impl Responder, Error> {
    require_user(&client, &req)?;
    let (_, comment_id) = path.into_inner();
    let form = form.into_inner();

    match update_comment(&db, client.actor(), comment_id, &form).await? {
        Outcome::Redirect(location) => Ok(redirect(&location)),
        Outcome::Invalid(errors) => {
            // Rejected: reload the comment so the form can be shown again.
            let comment = get_own_comment(&db, client.actor(), comment_id).await?;
            Ok(CommentTemplate {
                client,
                comment,
                deleting: false,
                form,
                errors,
            }
            .to_response())
        }
    }
}

#[get("/posts/{pk}/delete_comment/{comment_id}/")]
async fn delete_comment_form(
    client: ClientCtx,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    path: web::Path<(i32, i32)>,
) -> Result<impl Responder, Error> {
    require_user(&client, &req)?;
    let (_, comment_id) = path.into_inner();
    let comment = get_comment_for_delete(&db, client.actor(), comment_id).await?;

    Ok(CommentTemplate {
        client,
        form: CommentFormData {
            text: comment.text.to_owned(),
        },
        comment,
        deleting: true,
        errors: FormErrors::default(),
    }
    .to_response())
}

#[post("/posts/{pk}/delete_comment/{comment_id}/")]
async fn destroy_comment(
    client: ClientCtx,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    path: web::Path<(i32, i32)>,
) -> Result<impl Responder, Error> {
    require_user(&client, &req)?;
    let (_, comment_id) = path.into_inner();
    let outcome = delete_comment(&db, client.actor(), comment_id).await?;

    Ok(redirect(outcome.redirect_location().unwrap_or("/")))
}
