use super::{now, PageQuery};
use crate::listing::{category_page, index_page, parse_page, PostPage};
use crate::middleware::ClientCtx;
use crate::orm::categories;
use crate::template::PaginatorToHtml;
use actix_web::{get, web, Error, Responder};
use askama_actix::{Template, TemplateToResponse};
use chrono::NaiveDateTime;
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_category).service(view_index);
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub client: ClientCtx,
    pub page: PostPage,
    pub now: NaiveDateTime,
}

#[derive(Template)]
#[template(path = "category.html")]
pub struct CategoryTemplate {
    pub client: ClientCtx,
    pub category: categories::Model,
    pub page: PostPage,
    pub now: NaiveDateTime,
}

#[get("/")]
async fn view_index(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    query: web::Query<PageQuery>,
) -> Result<impl Responder, Error> {
    let page = parse_page(query.page.as_deref())?;
    let now = now();
    let page = index_page(&db, now, page).await?;

    Ok(IndexTemplate { client, page, now }.to_response())
}

#[get("/category/{category_slug}/")]
async fn view_category(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<impl Responder, Error> {
    let page = parse_page(query.page.as_deref())?;
    let now = now();
    let (category, page) = category_page(&db, &path.into_inner(), now, page).await?;

    Ok(CategoryTemplate {
        client,
        category,
        page,
        now,
    }
    .to_response())
}
