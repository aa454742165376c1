use chrono::{Duration, NaiveDate, NaiveDateTime};
use quill::comment::{get_comment_for_delete, get_own_comment, update_comment};
use quill::error::{BlogError, Outcome};
use quill::form::{CommentFormData, PostFormData};
use quill::orm::{categories, comments, posts};
use quill::policy::Actor;
use quill::post::{create_post, delete_post, get_visible_post, update_post};
use quill::site_time::SiteTime;
use quill::upload::{ImageUpload, MediaStore};
use quill::user::ClientUser;
use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Transaction, Value};
use std::collections::BTreeMap;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .unwrap()
}

/// A media root of its own for each test.
fn media() -> MediaStore {
    MediaStore::new(std::env::temp_dir().join(format!("quill-test-{}", uuid::Uuid::new_v4())))
}

fn ann() -> ClientUser {
    ClientUser {
        id: 1,
        name: "ann".to_owned(),
    }
}

/// Logged statements with the SQL quotes unescaped.
fn logged(log: &[Transaction]) -> Vec<String> {
    log.iter()
        .map(|txn| format!("{:?}", txn).replace(r#"\""#, "\""))
        .collect()
}

fn post_model(id: i32, author_id: i32, pub_date: NaiveDateTime) -> posts::Model {
    posts::Model {
        id,
        title: "Spring".to_owned(),
        text: "The ice is gone.".to_owned(),
        pub_date,
        author_id,
        location_id: None,
        category_id: Some(1),
        is_published: true,
        created_at: now(),
        image: None,
    }
}

fn comment_model(id: i32, author_id: i32, post_id: i32) -> comments::Model {
    comments::Model {
        id,
        author_id,
        post_id,
        text: "Nice.".to_owned(),
        created_at: now(),
    }
}

fn category_model() -> categories::Model {
    categories::Model {
        id: 1,
        title: "Travel".to_owned(),
        description: "Trips.".to_owned(),
        slug: "travel".to_owned(),
        is_published: true,
        created_at: now(),
    }
}

/// A joined post row as the detail query returns it.
fn post_row(id: i32, author_id: i32, pub_date: NaiveDateTime) -> BTreeMap<&'static str, Value> {
    let mut row = BTreeMap::new();
    row.insert("id", id.into());
    row.insert("title", "Spring".into());
    row.insert("text", "The ice is gone.".into());
    row.insert("pub_date", pub_date.into());
    row.insert("author_id", author_id.into());
    row.insert("location_id", Option::<i32>::None.into());
    row.insert("category_id", Some(1).into());
    row.insert("is_published", true.into());
    row.insert("created_at", now().into());
    row.insert("image", Option::<String>::None.into());
    row.insert("username", Some("ann".to_owned()).into());
    row.insert("category_title", Some("Travel".to_owned()).into());
    row.insert("category_slug", Some("travel".to_owned()).into());
    row.insert("category_is_published", Some(true).into());
    row.insert("location_name", Option::<String>::None.into());
    row.insert("location_is_published", Option::<bool>::None.into());
    row.insert("comment_count", 0i64.into());
    row
}

fn edit_form() -> PostFormData {
    PostFormData {
        title: "Changed".to_owned(),
        text: "Changed text".to_owned(),
        category: "1".to_owned(),
        ..Default::default()
    }
}

#[actix_rt::test]
async fn test_non_author_edit_redirects_without_writing() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![vec![post_model(5, 1, now())]])
        .into_connection();

    let outcome = update_post(&db, &media(), Actor::User(2), 5, &edit_form(), now())
        .await
        .unwrap();
    assert_eq!(outcome.redirect_location(), Some("/posts/5/"));

    // Only the ownership lookup ran.
    let log = db.into_transaction_log();
    assert_eq!(log.len(), 1);
    assert!(format!("{:?}", log[0]).contains("SELECT"));
}

#[actix_rt::test]
async fn test_anonymous_delete_redirects_to_post() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![vec![post_model(5, 1, now())]])
        .into_connection();

    let outcome = delete_post(&db, Actor::Anonymous, 5).await.unwrap();
    assert_eq!(outcome.redirect_location(), Some("/posts/5/"));
    assert_eq!(db.into_transaction_log().len(), 1);
}

#[actix_rt::test]
async fn test_edit_of_missing_post_is_not_found() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![Vec::<posts::Model>::new()])
        .into_connection();

    let result = update_post(&db, &media(), Actor::User(1), 999, &edit_form(), now()).await;
    assert!(matches!(result, Err(BlogError::NotFound)));
}

#[actix_rt::test]
async fn test_author_edit_with_blank_title_is_rejected() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![vec![post_model(5, 1, now())]])
        .into_connection();

    let form = PostFormData {
        title: "  ".to_owned(),
        ..edit_form()
    };
    match update_post(&db, &media(), Actor::User(1), 5, &form, now())
        .await
        .unwrap()
    {
        Outcome::Invalid(errors) => assert!(errors.has("title")),
        other => panic!("expected form errors, got {:?}", other),
    }
    assert_eq!(db.into_transaction_log().len(), 1);
}

#[actix_rt::test]
async fn test_scheduled_post_is_visible_to_its_author_only() {
    let tomorrow = now() + Duration::days(1);
    let author = ClientUser {
        id: 1,
        name: "ann".to_owned(),
    };
    let form = PostFormData {
        title: "Spring".to_owned(),
        text: "The ice is gone.".to_owned(),
        pub_date: tomorrow.format("%Y-%m-%dT%H:%M").to_string(),
        category: "1".to_owned(),
        ..Default::default()
    };

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![vec![category_model()]])
        .append_query_results(vec![vec![post_model(7, 1, tomorrow)]])
        .append_query_results(vec![vec![post_row(7, 1, tomorrow)]])
        .append_query_results(vec![vec![post_row(7, 1, tomorrow)]])
        .append_query_results(vec![vec![post_row(7, 1, tomorrow)]])
        .into_connection();

    let outcome = create_post(&db, &media(), &author, &form, SiteTime::utc(), now())
        .await
        .unwrap();
    assert_eq!(outcome.redirect_location(), Some("/profile/ann/"));

    let post = get_visible_post(&db, Actor::User(1), 7, now()).await.unwrap();
    assert_eq!(post.pub_date, tomorrow);

    let stranger = get_visible_post(&db, Actor::User(2), 7, now()).await;
    assert!(matches!(stranger, Err(BlogError::NotFound)));

    let guest = get_visible_post(&db, Actor::Anonymous, 7, now()).await;
    assert!(matches!(guest, Err(BlogError::NotFound)));
}

#[actix_rt::test]
async fn test_create_with_unknown_category_is_rejected() {
    let author = ClientUser {
        id: 1,
        name: "ann".to_owned(),
    };
    let form = PostFormData {
        pub_date: "2024-03-01T10:00".to_owned(),
        category: "42".to_owned(),
        ..edit_form()
    };
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![Vec::<categories::Model>::new()])
        .into_connection();

    match create_post(&db, &media(), &author, &form, SiteTime::utc(), now())
        .await
        .unwrap()
    {
        Outcome::Invalid(errors) => assert!(errors.has("category")),
        other => panic!("expected form errors, got {:?}", other),
    }
}

#[actix_rt::test]
async fn test_deleting_another_users_comment_is_forbidden() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![vec![comment_model(3, 1, 5)]])
        .into_connection();

    let result = get_comment_for_delete(&db, Actor::User(2), 3).await;
    assert!(matches!(result, Err(BlogError::Forbidden)));
}

#[actix_rt::test]
async fn test_editing_another_users_comment_is_not_found() {
    // The lookup is scoped to the actor, so someone else's comment never matches.
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![Vec::<comments::Model>::new()])
        .into_connection();

    let result = get_own_comment(&db, Actor::User(2), 3).await;
    assert!(matches!(result, Err(BlogError::NotFound)));

    // Bound as the second parameter, after the comment id.
    let log = logged(&db.into_transaction_log()).concat();
    assert!(log.contains(r#""comments"."author_id" = $2"#));
    assert!(log.contains("Int(Some(3)), Int(Some(2))"));
}

#[actix_rt::test]
async fn test_comment_edit_returns_to_its_post() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![vec![comment_model(3, 1, 5)]])
        .append_exec_results(vec![MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .into_connection();

    let form = CommentFormData {
        text: "Edited.".to_owned(),
    };
    let outcome = update_comment(&db, Actor::User(1), 3, &form).await.unwrap();
    assert_eq!(outcome.redirect_location(), Some("/posts/5/"));
}

#[actix_rt::test]
async fn test_author_edit_keeps_pub_date_and_returns_to_index() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![vec![post_model(5, 1, now())]])
        .append_query_results(vec![vec![category_model()]])
        .append_exec_results(vec![MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .into_connection();

    let form = PostFormData {
        pub_date: "2030-01-01T00:00".to_owned(),
        ..edit_form()
    };
    let outcome = update_post(&db, &media(), Actor::User(1), 5, &form, now())
        .await
        .unwrap();
    assert_eq!(outcome.redirect_location(), Some("/"));

    let log = logged(&db.into_transaction_log());
    assert_eq!(log.len(), 3);
    let update = &log[2];
    assert!(update.contains(r#"UPDATE "posts""#));
    assert!(update.contains("Changed text"));
    assert!(!update.contains("pub_date"));
    // No image was sent, so the stored one is left alone.
    assert!(!update.contains(r#""image""#));
}

#[actix_rt::test]
async fn test_create_stores_upload_in_dated_directory() {
    let media = media();
    let form = PostFormData {
        image: Some(ImageUpload {
            filename: "cover.png".to_owned(),
            data: PNG.to_vec(),
        }),
        pub_date: "2024-03-01T10:00".to_owned(),
        ..edit_form()
    };
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![vec![category_model()]])
        .append_query_results(vec![vec![post_model(7, 1, now())]])
        .into_connection();

    let outcome = create_post(&db, &media, &ann(), &form, SiteTime::utc(), now())
        .await
        .unwrap();
    assert_eq!(outcome.redirect_location(), Some("/profile/ann/"));

    let insert = &logged(&db.into_transaction_log())[1];
    assert!(insert.contains(r#"INSERT INTO "posts""#));
    assert!(insert.contains("blog/2024/03/01/"));

    let stored: Vec<_> = std::fs::read_dir(media.root().join("blog/2024/03/01"))
        .unwrap()
        .collect();
    assert_eq!(stored.len(), 1);
    std::fs::remove_dir_all(media.root()).unwrap();
}

#[actix_rt::test]
async fn test_invalid_upload_writes_nothing() {
    let media = media();
    let form = PostFormData {
        image: Some(ImageUpload {
            filename: "cover.png".to_owned(),
            data: b"not an image".to_vec(),
        }),
        pub_date: "2024-03-01T10:00".to_owned(),
        ..edit_form()
    };
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

    match create_post(&db, &media, &ann(), &form, SiteTime::utc(), now())
        .await
        .unwrap()
    {
        Outcome::Invalid(errors) => assert!(errors.has("image")),
        other => panic!("expected form errors, got {:?}", other),
    }
    assert!(db.into_transaction_log().is_empty());
    assert!(!media.root().exists());
}

#[actix_rt::test]
async fn test_submitted_date_is_site_local() {
    let form = PostFormData {
        pub_date: "2024-03-05T15:00".to_owned(),
        ..edit_form()
    };
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![vec![category_model()]])
        .append_query_results(vec![vec![post_model(7, 1, now())]])
        .into_connection();

    let site_time = SiteTime::parse("+03:00").unwrap();
    create_post(&db, &media(), &ann(), &form, site_time, now())
        .await
        .unwrap();

    let insert = &logged(&db.into_transaction_log())[1];
    assert!(insert.contains("2024-03-05T12:00:00"));
    assert!(!insert.contains("2024-03-05T15:00:00"));
}
