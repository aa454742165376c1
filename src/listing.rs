//! Filtered, ordered and paginated post listings.

use crate::error::BlogError;
use crate::orm::{categories, posts, users};
use crate::policy::Actor;
use crate::post::{select_posts_for_template, PostForTemplate};
use crate::template::Paginator;
use crate::url;
use chrono::NaiveDateTime;
use sea_orm::{entity::*, query::*, DatabaseConnection};

pub const POSTS_PER_PAGE: usize = 10;

/// Store-side form of [`crate::policy::is_publicly_visible`].
///
/// Must be applied to a select that joins `categories`. A post without a
/// category joins to NULL, which never equals TRUE, so it is dropped.
pub fn public_condition(now: NaiveDateTime) -> Condition {
    Condition::all()
        .add(posts::Column::IsPublished.eq(true))
        .add(posts::Column::PubDate.lte(now))
        .add(categories::Column::IsPublished.eq(true))
}

/// Which posts a listing shows.
#[derive(Clone, Debug)]
pub enum Scope {
    Index,
    Category(i32),
    /// `owner` lifts the visibility filter: authors see all of their own posts.
    Profile { author_id: i32, owner: bool },
}

/// Builds the listing query for a scope, newest publication first.
pub fn select_for_scope(scope: &Scope, now: NaiveDateTime) -> Select<posts::Entity> {
    let select = select_posts_for_template();
    let select = match *scope {
        Scope::Index => select.filter(public_condition(now)),
        Scope::Category(category_id) => select
            .filter(posts::Column::CategoryId.eq(category_id))
            .filter(public_condition(now)),
        Scope::Profile {
            author_id,
            owner: true,
        } => select.filter(posts::Column::AuthorId.eq(author_id)),
        Scope::Profile {
            author_id,
            owner: false,
        } => select
            .filter(posts::Column::AuthorId.eq(author_id))
            .filter(public_condition(now)),
    };
    // id breaks ties so pages never overlap.
    select
        .order_by_desc(posts::Column::PubDate)
        .order_by_desc(posts::Column::Id)
}

/// Reads `?page=N`. Absent means the first page; anything but a positive integer is NotFound.
pub fn parse_page(raw: Option<&str>) -> Result<usize, BlogError> {
    match raw {
        None => Ok(1),
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(page) if page >= 1 => Ok(page),
            _ => Err(BlogError::NotFound),
        },
    }
}

#[derive(Debug)]
pub struct PostPage {
    pub posts: Vec<PostForTemplate>,
    pub paginator: Paginator,
}

/// Fetches one page of a listing. Pages past the end are NotFound, but an
/// empty listing still has a first page.
pub async fn fetch_page(
    db: &DatabaseConnection,
    select: Select<posts::Entity>,
    page: usize,
    base_url: String,
) -> Result<PostPage, BlogError> {
    let pages = select
        .into_model::<PostForTemplate>()
        .paginate(db, POSTS_PER_PAGE);
    let page_count = pages.num_pages().await?.max(1);
    if page > page_count {
        return Err(BlogError::NotFound);
    }

    let posts = pages.fetch_page(page - 1).await?;
    Ok(PostPage {
        posts,
        paginator: Paginator {
            base_url,
            this_page: page as i32,
            page_count: page_count as i32,
        },
    })
}

pub async fn index_page(
    db: &DatabaseConnection,
    now: NaiveDateTime,
    page: usize,
) -> Result<PostPage, BlogError> {
    fetch_page(db, select_for_scope(&Scope::Index, now), page, url::index()).await
}

/// Unknown and unpublished categories are both NotFound.
pub async fn category_page(
    db: &DatabaseConnection,
    slug: &str,
    now: NaiveDateTime,
    page: usize,
) -> Result<(categories::Model, PostPage), BlogError> {
    let category = categories::Entity::find()
        .filter(categories::Column::Slug.eq(slug))
        .one(db)
        .await?
        .filter(|category| category.is_published)
        .ok_or(BlogError::NotFound)?;

    let select = select_for_scope(&Scope::Category(category.id), now);
    let posts = fetch_page(db, select, page, url::category(&category.slug)).await?;
    Ok((category, posts))
}

pub async fn profile_page(
    db: &DatabaseConnection,
    actor: Actor,
    username: &str,
    now: NaiveDateTime,
    page: usize,
) -> Result<(users::Model, PostPage), BlogError> {
    let author = crate::user::get_user_by_name(db, username)
        .await?
        .ok_or(BlogError::NotFound)?;

    let scope = Scope::Profile {
        author_id: author.id,
        owner: actor.is(author.id),
    };
    let posts = fetch_page(
        db,
        select_for_scope(&scope, now),
        page,
        url::profile(&author.username),
    )
    .await?;
    Ok((author, posts))
}
