//! Raw form payloads and their validation.
//!
//! Every field defaults to empty so a missing input is reported as a field
//! error on the re-rendered page instead of a bare 400.

use crate::upload::ImageUpload;
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

pub const NON_FIELD: &str = "__all__";
const REQUIRED: &str = "This field is required.";

static USERNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("username pattern is valid"));

/// Simplified RFC 5322 address; the domain needs at least one dot.
static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
    )
    .expect("email pattern is valid")
});

/// Field-keyed validation messages, in the order they were found.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormErrors {
    errors: Vec<(&'static str, String)>,
}

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push((field, message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|(f, _)| *f == field)
    }

    pub fn for_field(&self, field: &str) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|(f, _)| *f == field)
            .map(|(_, m)| m.as_str())
            .collect()
    }

    pub fn non_field(&self) -> Vec<&str> {
        self.for_field(NON_FIELD)
    }

    /// Ok(value) when nothing was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

fn required(errors: &mut FormErrors, field: &'static str, value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, REQUIRED);
    }
    value.to_owned()
}

fn max_chars(errors: &mut FormErrors, field: &'static str, value: &str, max: usize) {
    let len = value.chars().count();
    if len > max {
        errors.add(
            field,
            format!(
                "Ensure this value has at most {} characters (it has {}).",
                max, len
            ),
        );
    }
}

fn choice(errors: &mut FormErrors, field: &'static str, value: &str) -> Option<i32> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match value.parse::<i32>() {
        Ok(id) => Some(id),
        Err(_) => {
            errors.add(field, INVALID_CHOICE);
            None
        }
    }
}

pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";

/// Accepts the `datetime-local` input format and the common ISO variants.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d %H:%M:%S",
    ];
    let value = value.trim();
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Post form as submitted. Read from a multipart body, so the image travels
/// alongside the text fields.
#[derive(Clone, Debug, Default)]
pub struct PostFormData {
    pub title: String,
    pub text: String,
    pub pub_date: String,
    pub category: String,
    pub location: String,
    pub image: Option<ImageUpload>,
    /// The "clear" checkbox next to an existing image.
    pub clear_image: bool,
}

impl PostFormData {
    /// Assigns a text part by its form name. Unknown names are ignored.
    pub fn set_field(&mut self, name: &str, value: String) {
        match name {
            "title" => self.title = value,
            "text" => self.text = value,
            "pub_date" => self.pub_date = value,
            "category" => self.category = value,
            "location" => self.location = value,
            "image_clear" => self.clear_image = !value.is_empty(),
            _ => {}
        }
    }
}

/// What to do with the post's image column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageChange {
    Keep,
    Clear,
    Replace(ImageUpload),
}

/// Which post form is being submitted. Creation sets the publication date;
/// editing may change the location but never the publication date.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostFormKind {
    Create,
    Edit,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CleanPost {
    pub title: String,
    pub text: String,
    /// Always `Some` for [`PostFormKind::Create`], always `None` for edits.
    pub pub_date: Option<NaiveDateTime>,
    pub category_id: i32,
    pub location_id: Option<i32>,
    pub image: ImageChange,
}

impl PostFormData {
    /// Checks shape only. Whether the chosen category and location exist is
    /// decided against the store by the caller.
    pub fn validate(&self, kind: PostFormKind) -> Result<CleanPost, FormErrors> {
        let mut errors = FormErrors::default();

        let title = required(&mut errors, "title", &self.title);
        max_chars(&mut errors, "title", &title, 256);
        let text = required(&mut errors, "text", &self.text);

        let pub_date = match kind {
            PostFormKind::Create => {
                if self.pub_date.trim().is_empty() {
                    errors.add("pub_date", REQUIRED);
                    None
                } else {
                    let parsed = parse_datetime(&self.pub_date);
                    if parsed.is_none() {
                        errors.add("pub_date", "Enter a valid date/time.");
                    }
                    parsed
                }
            }
            PostFormKind::Edit => None,
        };

        if self.category.trim().is_empty() {
            errors.add("category", REQUIRED);
        }
        let category_id = choice(&mut errors, "category", &self.category);

        let location_id = match kind {
            PostFormKind::Create => None,
            PostFormKind::Edit => choice(&mut errors, "location", &self.location),
        };

        let image = match (&self.image, self.clear_image) {
            (Some(_), true) => {
                errors.add(
                    "image",
                    "Please either submit a file or check the clear checkbox, not both.",
                );
                ImageChange::Keep
            }
            (Some(upload), false) => {
                upload.validate(&mut errors);
                ImageChange::Replace(upload.clone())
            }
            (None, true) => ImageChange::Clear,
            (None, false) => ImageChange::Keep,
        };

        match category_id {
            Some(category_id) => errors.into_result(CleanPost {
                title,
                text,
                pub_date,
                category_id,
                location_id,
                image,
            }),
            None => Err(errors),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CommentFormData {
    #[serde(default)]
    pub text: String,
}

impl CommentFormData {
    pub fn validate(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::default();
        let text = required(&mut errors, "text", &self.text);
        errors.into_result(text)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RegistrationFormData {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CleanRegistration {
    pub username: String,
    pub password: String,
}

fn validate_username(errors: &mut FormErrors, value: &str) -> String {
    let username = required(errors, "username", value);
    max_chars(errors, "username", &username, 150);
    if !username.is_empty() && !USERNAME.is_match(&username) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
    username
}

impl RegistrationFormData {
    /// Uniqueness of the username is checked against the store by the caller.
    pub fn validate(&self) -> Result<CleanRegistration, FormErrors> {
        let mut errors = FormErrors::default();
        let username = validate_username(&mut errors, &self.username);

        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        }
        if self.password2.is_empty() {
            errors.add("password2", REQUIRED);
        }
        if !self.password1.is_empty() && !self.password2.is_empty() {
            if self.password1 != self.password2 {
                errors.add("password2", "The two password fields didn't match.");
            } else {
                if self.password1.chars().count() < 8 {
                    errors.add(
                        "password2",
                        "This password is too short. It must contain at least 8 characters.",
                    );
                }
                if self.password1.chars().all(|c| c.is_ascii_digit()) {
                    errors.add("password2", "This password is entirely numeric.");
                }
            }
        }

        errors.into_result(CleanRegistration {
            username,
            password: self.password1.to_owned(),
        })
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LoginFormData {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProfileFormData {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CleanProfile {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl ProfileFormData {
    pub fn validate(&self) -> Result<CleanProfile, FormErrors> {
        let mut errors = FormErrors::default();
        let username = validate_username(&mut errors, &self.username);

        let email = self.email.trim().to_owned();
        max_chars(&mut errors, "email", &email, 254);
        if !email.is_empty() && !EMAIL.is_match(&email) {
            errors.add("email", "Enter a valid email address.");
        }

        let first_name = self.first_name.trim().to_owned();
        max_chars(&mut errors, "first_name", &first_name, 150);
        let last_name = self.last_name.trim().to_owned();
        max_chars(&mut errors, "last_name", &last_name, 150);

        errors.into_result(CleanProfile {
            username,
            email,
            first_name,
            last_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_form() -> PostFormData {
        PostFormData {
            title: " Title ".to_owned(),
            text: "Body".to_owned(),
            pub_date: "2030-01-02T03:04".to_owned(),
            category: "3".to_owned(),
            location: "".to_owned(),
            image: None,
            clear_image: false,
        }
    }

    #[test]
    fn test_create_post_form_is_cleaned() {
        let clean = post_form().validate(PostFormKind::Create).unwrap();
        assert_eq!(clean.title, "Title");
        assert_eq!(clean.category_id, 3);
        assert_eq!(clean.pub_date, parse_datetime("2030-01-02 03:04"));
        assert_eq!(clean.location_id, None);
        assert_eq!(clean.image, ImageChange::Keep);
    }

    #[test]
    fn test_create_post_form_requires_pub_date_and_category() {
        let form = PostFormData {
            pub_date: "".to_owned(),
            category: "".to_owned(),
            ..post_form()
        };
        let errors = form.validate(PostFormKind::Create).unwrap_err();
        assert!(errors.has("pub_date"));
        assert!(errors.has("category"));
        assert!(!errors.has("title"));
    }

    #[test]
    fn test_edit_post_form_ignores_pub_date() {
        let form = PostFormData {
            pub_date: "not a date".to_owned(),
            location: "7".to_owned(),
            ..post_form()
        };
        let clean = form.validate(PostFormKind::Edit).unwrap();
        assert_eq!(clean.pub_date, None);
        assert_eq!(clean.location_id, Some(7));
    }

    #[test]
    fn test_post_form_rejects_bad_choice_and_long_title() {
        let form = PostFormData {
            title: "x".repeat(257),
            category: "news".to_owned(),
            ..post_form()
        };
        let errors = form.validate(PostFormKind::Create).unwrap_err();
        assert_eq!(errors.for_field("category"), vec![INVALID_CHOICE]);
        assert!(errors.has("title"));
    }

    #[test]
    fn test_post_form_image_change() {
        let png = ImageUpload {
            filename: "cat.png".to_owned(),
            data: b"\x89PNG\r\n\x1a\n".to_vec(),
        };
        let form = PostFormData {
            image: Some(png.clone()),
            ..post_form()
        };
        let clean = form.validate(PostFormKind::Create).unwrap();
        assert_eq!(clean.image, ImageChange::Replace(png.clone()));

        let form = PostFormData {
            clear_image: true,
            ..post_form()
        };
        assert_eq!(form.validate(PostFormKind::Edit).unwrap().image, ImageChange::Clear);

        let form = PostFormData {
            image: Some(png),
            clear_image: true,
            ..post_form()
        };
        assert!(form.validate(PostFormKind::Edit).unwrap_err().has("image"));
    }

    #[test]
    fn test_set_field_by_name() {
        let mut form = PostFormData::default();
        form.set_field("title", "Hello".to_owned());
        form.set_field("image_clear", "on".to_owned());
        form.set_field("csrf", "ignored".to_owned());
        assert_eq!(form.title, "Hello");
        assert!(form.clear_image);
    }

    #[test]
    fn test_comment_form_rejects_blank_text() {
        let form = CommentFormData {
            text: "   ".to_owned(),
        };
        assert_eq!(form.validate().unwrap_err().for_field("text"), vec![REQUIRED]);
        let form = CommentFormData {
            text: " hi ".to_owned(),
        };
        assert_eq!(form.validate().unwrap(), "hi");
    }

    #[test]
    fn test_registration_password_rules() {
        let mismatch = RegistrationFormData {
            username: "ann".to_owned(),
            password1: "correct horse".to_owned(),
            password2: "battery staple".to_owned(),
        };
        assert!(mismatch.validate().unwrap_err().has("password2"));

        let numeric = RegistrationFormData {
            username: "ann".to_owned(),
            password1: "12345678".to_owned(),
            password2: "12345678".to_owned(),
        };
        assert_eq!(
            numeric.validate().unwrap_err().for_field("password2"),
            vec!["This password is entirely numeric."]
        );

        let ok = RegistrationFormData {
            username: "ann.lee+blog".to_owned(),
            password1: "correct horse".to_owned(),
            password2: "correct horse".to_owned(),
        };
        assert_eq!(ok.validate().unwrap().username, "ann.lee+blog");
    }

    #[test]
    fn test_username_pattern() {
        let form = ProfileFormData {
            username: "has space".to_owned(),
            ..Default::default()
        };
        assert!(form.validate().unwrap_err().has("username"));
    }

    #[test]
    fn test_profile_email() {
        let mut form = ProfileFormData {
            username: "ann".to_owned(),
            email: "ann@example".to_owned(),
            ..Default::default()
        };
        assert!(form.validate().unwrap_err().has("email"));
        form.email = "ann @example.com".to_owned();
        assert!(form.validate().unwrap_err().has("email"));
        form.email = "ann@@example.com".to_owned();
        assert!(form.validate().unwrap_err().has("email"));
        form.email = "ann@.example.com".to_owned();
        assert!(form.validate().unwrap_err().has("email"));
        form.email = "ann@example.com".to_owned();
        assert_eq!(form.validate().unwrap().email, "ann@example.com");
        form.email = "".to_owned();
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_parse_datetime_formats() {
        let expected = chrono::NaiveDate::from_ymd_opt(2024, 11, 10)
            .and_then(|d| d.and_hms_opt(10, 22, 0));
        assert_eq!(parse_datetime("2024-11-10T10:22"), expected);
        assert_eq!(parse_datetime("2024-11-10 10:22:00"), expected);
        assert!(parse_datetime("10/11/2024").is_none());
        assert_eq!(
            parse_datetime("2024-11-10"),
            chrono::NaiveDate::from_ymd_opt(2024, 11, 10).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
    }
}
