use crate::error::{BlogError, Outcome};
use crate::form::{CleanPost, FormErrors, ImageChange, PostFormData, PostFormKind, INVALID_CHOICE};
use crate::orm::{categories, locations, posts, users};
use crate::policy::{is_author, Actor, Authored, Policy, PostPolicy, Publishable};
use crate::site_time::SiteTime;
use crate::upload::MediaStore;
use crate::url;
use crate::user::ClientUser;
use chrono::NaiveDateTime;
use sea_orm::{entity::*, query::*, sea_query::Expr, DatabaseConnection, DbErr, FromQueryResult};

/// Correlated count of the comments currently stored for each selected post.
pub const COMMENT_COUNT_SQL: &str =
    r#"(SELECT COUNT(*) FROM "comments" WHERE "comments"."post_id" = "posts"."id")"#;

/// A fully joined struct representing the post model and its relational data.
#[derive(Clone, Debug, FromQueryResult)]
pub struct PostForTemplate {
    pub id: i32,
    pub title: String,
    pub text: String,
    pub pub_date: NaiveDateTime,
    pub author_id: i32,
    pub location_id: Option<i32>,
    pub category_id: Option<i32>,
    pub is_published: bool,
    pub created_at: NaiveDateTime,
    pub image: Option<String>,
    // join users
    pub username: Option<String>,
    // join categories
    pub category_title: Option<String>,
    pub category_slug: Option<String>,
    pub category_is_published: Option<bool>,
    // join locations
    pub location_name: Option<String>,
    pub location_is_published: Option<bool>,
    // aggregate
    pub comment_count: i64,
}

impl Authored for PostForTemplate {
    fn author_id(&self) -> i32 {
        self.author_id
    }
}

impl Publishable for PostForTemplate {
    fn is_published(&self) -> bool {
        self.is_published
    }

    fn pub_date(&self) -> NaiveDateTime {
        self.pub_date
    }

    fn category_is_published(&self) -> Option<bool> {
        self.category_is_published
    }
}

impl PostForTemplate {
    pub fn url(&self) -> String {
        url::post(self.id)
    }

    pub fn author_name(&self) -> &str {
        self.username.as_deref().unwrap_or("")
    }

    pub fn author_url(&self) -> String {
        url::profile(self.author_name())
    }

    /// Category links are only shown for published categories.
    pub fn has_visible_category(&self) -> bool {
        self.category_is_published == Some(true) && self.category_slug.is_some()
    }

    pub fn category_name(&self) -> &str {
        self.category_title.as_deref().unwrap_or("")
    }

    pub fn category_url(&self) -> String {
        url::category(self.category_slug.as_deref().unwrap_or(""))
    }

    pub fn has_visible_location(&self) -> bool {
        self.location_is_published == Some(true) && self.location_name.is_some()
    }

    pub fn location_label(&self) -> &str {
        self.location_name.as_deref().unwrap_or("")
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    pub fn image_src(&self) -> String {
        url::media(self.image.as_deref().unwrap_or(""))
    }

    /// Shown to the author so drafts and scheduled posts are recognizable.
    pub fn status_label(&self, now: NaiveDateTime) -> &'static str {
        if !self.is_published {
            "Unpublished"
        } else if self.pub_date > now {
            "Scheduled"
        } else if self.category_is_published != Some(true) {
            "Hidden category"
        } else {
            ""
        }
    }
}

/// Returns a selector for posts with author, category, location and comment count attached.
pub fn select_posts_for_template() -> Select<posts::Entity> {
    posts::Entity::find()
        .left_join(users::Entity)
        .column_as(users::Column::Username, "username")
        .left_join(categories::Entity)
        .column_as(categories::Column::Title, "category_title")
        .column_as(categories::Column::Slug, "category_slug")
        .column_as(categories::Column::IsPublished, "category_is_published")
        .left_join(locations::Entity)
        .column_as(locations::Column::Name, "location_name")
        .column_as(locations::Column::IsPublished, "location_is_published")
        .column_as(Expr::cust(COMMENT_COUNT_SQL), "comment_count")
}

/// Returns the result of a query selecting for a post by id with adjoined templating data.
pub async fn get_post_for_template(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<PostForTemplate>, DbErr> {
    select_posts_for_template()
        .filter(posts::Column::Id.eq(id))
        .into_model::<PostForTemplate>()
        .one(db)
        .await
}

/// Fetches a post for its detail page. Absent and hidden posts are both NotFound.
pub async fn get_visible_post(
    db: &DatabaseConnection,
    actor: Actor,
    id: i32,
    now: NaiveDateTime,
) -> Result<PostForTemplate, BlogError> {
    let post = get_post_for_template(db, id)
        .await?
        .ok_or(BlogError::NotFound)?;

    if PostPolicy::at(now).can_view(actor, &post) {
        Ok(post)
    } else {
        Err(BlogError::NotFound)
    }
}

/// Result of the ownership gate shared by post edit and delete.
#[derive(Debug)]
pub enum PostAccess {
    Author(posts::Model),
    /// Non-authors are sent back to the detail page instead of being refused.
    Redirect(String),
}

pub async fn check_post_access(
    db: &DatabaseConnection,
    actor: Actor,
    id: i32,
) -> Result<PostAccess, BlogError> {
    let post = posts::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(BlogError::NotFound)?;

    if is_author(actor, &post) {
        Ok(PostAccess::Author(post))
    } else {
        Ok(PostAccess::Redirect(url::post(post.id)))
    }
}

/// Records INVALID_CHOICE for any referenced category or location that does not exist.
async fn check_choices(
    db: &DatabaseConnection,
    post: &CleanPost,
) -> Result<FormErrors, DbErr> {
    let mut errors = FormErrors::default();
    if categories::Entity::find_by_id(post.category_id)
        .one(db)
        .await?
        .is_none()
    {
        errors.add("category", INVALID_CHOICE);
    }
    if let Some(location_id) = post.location_id {
        if locations::Entity::find_by_id(location_id)
            .one(db)
            .await?
            .is_none()
        {
            errors.add("location", INVALID_CHOICE);
        }
    }
    Ok(errors)
}

/// Writes a replacement image. `None` leaves the stored image as it is.
async fn store_image(
    media: &MediaStore,
    change: &ImageChange,
    now: NaiveDateTime,
) -> Result<Option<Option<String>>, BlogError> {
    match change {
        ImageChange::Keep => Ok(None),
        ImageChange::Clear => Ok(Some(None)),
        ImageChange::Replace(upload) => Ok(Some(Some(media.save(upload, now).await?))),
    }
}

/// Publication date to store: the submitted site-local date in UTC, or now.
pub fn publication_date(clean: &CleanPost, site_time: SiteTime, now: NaiveDateTime) -> NaiveDateTime {
    clean
        .pub_date
        .map(|local| site_time.to_utc(local))
        .unwrap_or(now)
}

/// Creates a post authored by the acting user and sends them to their profile.
pub async fn create_post(
    db: &DatabaseConnection,
    media: &MediaStore,
    author: &ClientUser,
    form: &PostFormData,
    site_time: SiteTime,
    now: NaiveDateTime,
) -> Result<Outcome, BlogError> {
    let clean = match form.validate(PostFormKind::Create) {
        Ok(clean) => clean,
        Err(errors) => return Ok(Outcome::Invalid(errors)),
    };
    let errors = check_choices(db, &clean).await?;
    if !errors.is_empty() {
        return Ok(Outcome::Invalid(errors));
    }

    let pub_date = publication_date(&clean, site_time, now);
    let image = store_image(media, &clean.image, now).await?.flatten();
    let post = posts::ActiveModel {
        title: Set(clean.title),
        text: Set(clean.text),
        pub_date: Set(pub_date),
        author_id: Set(author.id),
        location_id: Set(None),
        category_id: Set(Some(clean.category_id)),
        is_published: Set(true),
        created_at: Set(now),
        image: Set(image),
        ..Default::default()
    }
    .insert(db)
    .await?;

    log::info!("user {} created post {}", author.id, post.id);
    Ok(Outcome::Redirect(url::profile(&author.name)))
}

/// Applies an edit. Non-authors are redirected to the detail page and nothing is written.
pub async fn update_post(
    db: &DatabaseConnection,
    media: &MediaStore,
    actor: Actor,
    id: i32,
    form: &PostFormData,
    now: NaiveDateTime,
) -> Result<Outcome, BlogError> {
    let post = match check_post_access(db, actor, id).await? {
        PostAccess::Author(post) => post,
        PostAccess::Redirect(location) => return Ok(Outcome::Redirect(location)),
    };

    let clean = match form.validate(PostFormKind::Edit) {
        Ok(clean) => clean,
        Err(errors) => return Ok(Outcome::Invalid(errors)),
    };
    let errors = check_choices(db, &clean).await?;
    if !errors.is_empty() {
        return Ok(Outcome::Invalid(errors));
    }

    // pub_date is never written; it is fixed at creation.
    let mut update = posts::Entity::update_many()
        .col_expr(posts::Column::Title, Expr::value(clean.title))
        .col_expr(posts::Column::Text, Expr::value(clean.text))
        .col_expr(posts::Column::CategoryId, Expr::value(Some(clean.category_id)))
        .col_expr(posts::Column::LocationId, Expr::value(clean.location_id));
    if let Some(image) = store_image(media, &clean.image, now).await? {
        update = update.col_expr(posts::Column::Image, Expr::value(image));
    }
    update
        .filter(posts::Column::Id.eq(post.id))
        .exec(db)
        .await?;

    Ok(Outcome::Redirect(url::index()))
}

/// Hard-deletes a post; its comments go with it through the foreign key.
pub async fn delete_post(
    db: &DatabaseConnection,
    actor: Actor,
    id: i32,
) -> Result<Outcome, BlogError> {
    let post = match check_post_access(db, actor, id).await? {
        PostAccess::Author(post) => post,
        PostAccess::Redirect(location) => return Ok(Outcome::Redirect(location)),
    };

    posts::Entity::delete_by_id(post.id).exec(db).await?;
    log::info!("post {} deleted by its author", post.id);

    Ok(Outcome::Redirect(url::index()))
}

/// Choices for the category select, published or not.
pub async fn get_category_choices(
    db: &DatabaseConnection,
) -> Result<Vec<categories::Model>, DbErr> {
    categories::Entity::find()
        .order_by_asc(categories::Column::Title)
        .all(db)
        .await
}

pub async fn get_location_choices(
    db: &DatabaseConnection,
) -> Result<Vec<locations::Model>, DbErr> {
    locations::Entity::find()
        .order_by_asc(locations::Column::Name)
        .all(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::DatabaseBackend;

    #[test]
    fn test_select_joins_and_counts() {
        let sql = select_posts_for_template()
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(sql.contains(r#"LEFT JOIN "users""#));
        assert!(sql.contains(r#"LEFT JOIN "categories""#));
        assert!(sql.contains(r#"LEFT JOIN "locations""#));
        assert!(sql.contains(r#""categories"."is_published" AS "category_is_published""#));
        assert!(sql.contains(COMMENT_COUNT_SQL));
        assert!(sql.contains(r#"AS "comment_count""#));
    }
}
