//! Read/write eligibility for posts and comments.
//!
//! Every predicate takes the acting client and, where time matters, the
//! current instant explicitly. Nothing here touches the database.

use crate::orm::{comments, posts};
use chrono::NaiveDateTime;

/// The client initiating an operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Actor {
    #[default]
    Anonymous,
    User(i32),
}

impl Actor {
    pub fn from_id(id: Option<i32>) -> Self {
        match id {
            Some(id) => Actor::User(id),
            None => Actor::Anonymous,
        }
    }

    pub fn id(self) -> Option<i32> {
        match self {
            Actor::User(id) => Some(id),
            Actor::Anonymous => None,
        }
    }

    pub fn is_user(self) -> bool {
        matches!(self, Actor::User(_))
    }

    /// True only for an authenticated actor with this exact user id.
    pub fn is(self, user_id: i32) -> bool {
        self.id() == Some(user_id)
    }
}

/// Records owned by a single user.
pub trait Authored {
    fn author_id(&self) -> i32;
}

/// Records carrying the data needed to decide public visibility.
pub trait Publishable {
    fn is_published(&self) -> bool;
    fn pub_date(&self) -> NaiveDateTime;
    /// `None` when the record has no category.
    fn category_is_published(&self) -> Option<bool>;
}

impl Authored for posts::Model {
    fn author_id(&self) -> i32 {
        self.author_id
    }
}

impl Authored for comments::Model {
    fn author_id(&self) -> i32 {
        self.author_id
    }
}

pub fn is_author<T: Authored + ?Sized>(actor: Actor, item: &T) -> bool {
    actor.is(item.author_id())
}

/// Published, not scheduled in the future, and filed under a published category.
///
/// A post without a category fails this check. Listings apply the same rule
/// through [`crate::listing::public_condition`].
pub fn is_publicly_visible(
    is_published: bool,
    pub_date: NaiveDateTime,
    category_is_published: Option<bool>,
    now: NaiveDateTime,
) -> bool {
    is_published && pub_date <= now && category_is_published == Some(true)
}

/// Read and write rules for one kind of record.
pub trait Policy<T: ?Sized> {
    fn can_view(&self, actor: Actor, item: &T) -> bool;
    fn can_edit(&self, actor: Actor, item: &T) -> bool;

    fn can_delete(&self, actor: Actor, item: &T) -> bool {
        self.can_edit(actor, item)
    }
}

/// Post rules evaluated at a fixed instant.
#[derive(Clone, Copy, Debug)]
pub struct PostPolicy {
    pub now: NaiveDateTime,
}

impl PostPolicy {
    pub fn at(now: NaiveDateTime) -> Self {
        Self { now }
    }
}

impl<T: Authored + Publishable + ?Sized> Policy<T> for PostPolicy {
    /// Authors always see their own posts; everybody else needs public visibility.
    fn can_view(&self, actor: Actor, post: &T) -> bool {
        is_author(actor, post)
            || is_publicly_visible(
                post.is_published(),
                post.pub_date(),
                post.category_is_published(),
                self.now,
            )
    }

    fn can_edit(&self, actor: Actor, post: &T) -> bool {
        is_author(actor, post)
    }
}

/// Comment rules. Viewing a comment is decided by its post, so `can_view`
/// expects the caller to have already established that the post is visible.
#[derive(Clone, Copy, Debug)]
pub struct CommentPolicy {
    pub post_visible: bool,
}

impl<T: Authored + ?Sized> Policy<T> for CommentPolicy {
    fn can_view(&self, _actor: Actor, _comment: &T) -> bool {
        self.post_visible
    }

    fn can_edit(&self, actor: Actor, comment: &T) -> bool {
        is_author(actor, comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    struct TestPost {
        author_id: i32,
        is_published: bool,
        pub_date: NaiveDateTime,
        category: Option<bool>,
    }

    impl Authored for TestPost {
        fn author_id(&self) -> i32 {
            self.author_id
        }
    }

    impl Publishable for TestPost {
        fn is_published(&self) -> bool {
            self.is_published
        }
        fn pub_date(&self) -> NaiveDateTime {
            self.pub_date
        }
        fn category_is_published(&self) -> Option<bool> {
            self.category
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 11, 10)
            .and_then(|d| d.and_hms_opt(10, 22, 0))
            .unwrap()
    }

    fn public_post() -> TestPost {
        TestPost {
            author_id: 1,
            is_published: true,
            pub_date: now() - Duration::days(1),
            category: Some(true),
        }
    }

    #[test]
    fn test_public_post_is_visible_to_everyone() {
        let policy = PostPolicy::at(now());
        let post = public_post();
        assert!(policy.can_view(Actor::Anonymous, &post));
        assert!(policy.can_view(Actor::User(2), &post));
        assert!(policy.can_view(Actor::User(1), &post));
    }

    #[test]
    fn test_unpublished_post_is_visible_only_to_author() {
        let policy = PostPolicy::at(now());
        let post = TestPost {
            is_published: false,
            ..public_post()
        };
        assert!(!policy.can_view(Actor::Anonymous, &post));
        assert!(!policy.can_view(Actor::User(2), &post));
        assert!(policy.can_view(Actor::User(1), &post));
    }

    #[test]
    fn test_scheduled_post_is_hidden_until_pub_date() {
        let post = TestPost {
            pub_date: now() + Duration::hours(1),
            ..public_post()
        };
        assert!(!PostPolicy::at(now()).can_view(Actor::User(2), &post));
        assert!(PostPolicy::at(now()).can_view(Actor::User(1), &post));
        // No transition event: the same record becomes visible once time passes.
        assert!(PostPolicy::at(now() + Duration::hours(1)).can_view(Actor::User(2), &post));
    }

    #[test]
    fn test_post_in_unpublished_category_is_hidden() {
        let post = TestPost {
            category: Some(false),
            ..public_post()
        };
        assert!(!PostPolicy::at(now()).can_view(Actor::Anonymous, &post));
        assert!(PostPolicy::at(now()).can_view(Actor::User(1), &post));
    }

    #[test]
    fn test_post_without_category_is_not_publicly_visible() {
        // Posts lacking a category are hidden from non-authors, same as in listings.
        let post = TestPost {
            category: None,
            ..public_post()
        };
        assert!(!PostPolicy::at(now()).can_view(Actor::Anonymous, &post));
        assert!(!PostPolicy::at(now()).can_view(Actor::User(2), &post));
        assert!(PostPolicy::at(now()).can_view(Actor::User(1), &post));
    }

    #[test]
    fn test_only_author_can_edit_or_delete_post() {
        let policy = PostPolicy::at(now());
        let post = TestPost {
            is_published: false,
            pub_date: now() + Duration::days(30),
            ..public_post()
        };
        for actor in [Actor::Anonymous, Actor::User(2), Actor::User(1)] {
            assert_eq!(policy.can_edit(actor, &post), actor == Actor::User(1));
            assert_eq!(policy.can_delete(actor, &post), actor == Actor::User(1));
        }
    }

    #[test]
    fn test_toggling_publication_twice_restores_visibility() {
        let policy = PostPolicy::at(now());
        let mut post = TestPost {
            is_published: false,
            ..public_post()
        };
        let before = policy.can_view(Actor::Anonymous, &post);
        post.is_published = !post.is_published;
        assert!(policy.can_view(Actor::Anonymous, &post));
        post.is_published = !post.is_published;
        assert_eq!(policy.can_view(Actor::Anonymous, &post), before);
    }

    #[test]
    fn test_comment_edit_requires_authorship() {
        let comment = comments::Model {
            id: 3,
            author_id: 5,
            post_id: 1,
            text: "hello".to_owned(),
            created_at: now(),
        };
        let policy = CommentPolicy { post_visible: true };
        assert!(policy.can_edit(Actor::User(5), &comment));
        assert!(!policy.can_edit(Actor::User(6), &comment));
        assert!(!policy.can_delete(Actor::Anonymous, &comment));
        assert!(policy.can_view(Actor::Anonymous, &comment));
        assert!(!CommentPolicy { post_visible: false }.can_view(Actor::User(5), &comment));
    }

    #[test]
    fn test_actor_identity() {
        assert_eq!(Actor::from_id(None), Actor::Anonymous);
        assert_eq!(Actor::from_id(Some(4)), Actor::User(4));
        assert!(!Actor::Anonymous.is(0));
        assert!(Actor::User(4).is(4));
        assert!(Actor::User(4).is_user());
    }
}
