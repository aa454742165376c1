//! Canonical paths for every routed page.

use url::form_urlencoded::byte_serialize;

pub const LOGIN: &str = "/auth/login/";

pub fn index() -> String {
    "/".to_owned()
}

pub fn category(slug: &str) -> String {
    format!("/category/{}/", encode(slug))
}

pub fn profile(username: &str) -> String {
    format!("/profile/{}/", encode(username))
}

pub fn post_create() -> String {
    "/posts/create/".to_owned()
}

pub fn post(id: i32) -> String {
    format!("/posts/{}/", id)
}

pub fn post_edit(id: i32) -> String {
    format!("/posts/{}/edit/", id)
}

pub fn post_delete(id: i32) -> String {
    format!("/posts/{}/delete/", id)
}

pub fn comment_create(post_id: i32) -> String {
    format!("/posts/{}/comment/", post_id)
}

pub fn comment_edit(post_id: i32, comment_id: i32) -> String {
    format!("/posts/{}/edit_comment/{}/", post_id, comment_id)
}

pub fn comment_delete(post_id: i32, comment_id: i32) -> String {
    format!("/posts/{}/delete_comment/{}/", post_id, comment_id)
}

/// Public address of a file stored under the media root.
pub fn media(relative: &str) -> String {
    format!("/media/{}", relative)
}

/// Login page that sends the client back to `next` afterwards.
pub fn login_with_next(next: &str) -> String {
    format!("{}?next={}", LOGIN, encode(next))
}

/// Only same-site absolute paths are honored as post-login targets.
pub fn safe_next(next: &str) -> Option<&str> {
    if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') {
        Some(next)
    } else {
        None
    }
}

fn encode(segment: &str) -> String {
    byte_serialize(segment.as_bytes()).collect()
}
