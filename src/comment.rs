use crate::error::{BlogError, Outcome};
use crate::form::CommentFormData;
use crate::orm::{comments, posts, users};
use crate::policy::{Actor, Authored, CommentPolicy, Policy};
use crate::url;
use chrono::NaiveDateTime;
use sea_orm::{entity::*, query::*, sea_query::Expr, DatabaseConnection, DbErr, FromQueryResult};

/// A comment joined with its author's username.
#[derive(Clone, Debug, FromQueryResult)]
pub struct CommentForTemplate {
    pub id: i32,
    pub author_id: i32,
    pub post_id: i32,
    pub text: String,
    pub created_at: NaiveDateTime,
    pub username: Option<String>,
}

impl Authored for CommentForTemplate {
    fn author_id(&self) -> i32 {
        self.author_id
    }
}

impl CommentForTemplate {
    pub fn author_name(&self) -> &str {
        self.username.as_deref().unwrap_or("")
    }

    pub fn author_url(&self) -> String {
        url::profile(self.author_name())
    }

    pub fn edit_url(&self) -> String {
        url::comment_edit(self.post_id, self.id)
    }

    pub fn delete_url(&self) -> String {
        url::comment_delete(self.post_id, self.id)
    }
}

/// Comments of a post, oldest first. Callers must already have decided the post is viewable.
pub async fn get_comments_for_post(
    db: &DatabaseConnection,
    post_id: i32,
) -> Result<Vec<CommentForTemplate>, DbErr> {
    comments::Entity::find()
        .left_join(users::Entity)
        .column_as(users::Column::Username, "username")
        .filter(comments::Column::PostId.eq(post_id))
        .order_by_asc(comments::Column::CreatedAt)
        .order_by_asc(comments::Column::Id)
        .into_model::<CommentForTemplate>()
        .all(db)
        .await
}

/// Adds a comment to a published post.
///
/// The form is checked before the post is looked up, so an invalid submission
/// against a missing post still reports the form errors.
pub async fn create_comment(
    db: &DatabaseConnection,
    author_id: i32,
    post_id: i32,
    form: &CommentFormData,
    now: NaiveDateTime,
) -> Result<Outcome, BlogError> {
    let text = match form.validate() {
        Ok(text) => text,
        Err(errors) => return Ok(Outcome::Invalid(errors)),
    };

    // Only the published flag gates commenting.
    let post = posts::Entity::find()
        .filter(posts::Column::Id.eq(post_id))
        .filter(posts::Column::IsPublished.eq(true))
        .one(db)
        .await?
        .ok_or(BlogError::NotFound)?;

    comments::ActiveModel {
        author_id: Set(author_id),
        post_id: Set(post.id),
        text: Set(text),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(Outcome::Redirect(url::post(post.id)))
}

/// Fetches a comment only if the actor wrote it. Anything else is NotFound.
pub async fn get_own_comment(
    db: &DatabaseConnection,
    actor: Actor,
    comment_id: i32,
) -> Result<comments::Model, BlogError> {
    let author_id = actor.id().ok_or(BlogError::NotFound)?;
    comments::Entity::find()
        .filter(comments::Column::Id.eq(comment_id))
        .filter(comments::Column::AuthorId.eq(author_id))
        .one(db)
        .await?
        .ok_or(BlogError::NotFound)
}

pub async fn update_comment(
    db: &DatabaseConnection,
    actor: Actor,
    comment_id: i32,
    form: &CommentFormData,
) -> Result<Outcome, BlogError> {
    let comment = get_own_comment(db, actor, comment_id).await?;
    let text = match form.validate() {
        Ok(text) => text,
        Err(errors) => return Ok(Outcome::Invalid(errors)),
    };

    comments::Entity::update_many()
        .col_expr(comments::Column::Text, Expr::value(text))
        .filter(comments::Column::Id.eq(comment.id))
        .exec(db)
        .await?;

    Ok(Outcome::Redirect(url::post(comment.post_id)))
}

/// Fetches a comment for deletion. Missing is NotFound; somebody else's is Forbidden.
pub async fn get_comment_for_delete(
    db: &DatabaseConnection,
    actor: Actor,
    comment_id: i32,
) -> Result<comments::Model, BlogError> {
    let comment = comments::Entity::find_by_id(comment_id)
        .one(db)
        .await?
        .ok_or(BlogError::NotFound)?;

    if (CommentPolicy { post_visible: true }).can_delete(actor, &comment) {
        Ok(comment)
    } else {
        Err(BlogError::Forbidden)
    }
}

pub async fn delete_comment(
    db: &DatabaseConnection,
    actor: Actor,
    comment_id: i32,
) -> Result<Outcome, BlogError> {
    let comment = get_comment_for_delete(db, actor, comment_id).await?;
    comments::Entity::delete_by_id(comment.id).exec(db).await?;

    Ok(Outcome::Redirect(url::post(comment.post_id)))
}
