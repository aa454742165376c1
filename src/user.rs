use crate::error::{BlogError, Outcome};
use crate::form::{
    CleanProfile, CleanRegistration, FormErrors, ProfileFormData, RegistrationFormData, NON_FIELD,
};
use crate::orm::users;
use crate::url;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::NaiveDateTime;
use sea_orm::{entity::*, query::*, sea_query::Expr, DatabaseConnection, DbErr, FromQueryResult};

/// A mini struct for holding only what information we need about a client.
#[derive(Clone, Debug, FromQueryResult)]
pub struct ClientUser {
    pub id: i32,
    pub name: String,
}

pub async fn get_client_user_by_id(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<ClientUser>, DbErr> {
    users::Entity::find_by_id(id)
        .select_only()
        .column(users::Column::Id)
        .column_as(users::Column::Username, "name")
        .into_model::<ClientUser>()
        .one(db)
        .await
}

pub async fn get_user_by_name(
    db: &DatabaseConnection,
    username: &str,
) -> Result<Option<users::Model>, DbErr> {
    users::Entity::find()
        .filter(users::Column::Username.eq(username))
        .one(db)
        .await
}

/// Public face of an account on its profile page.
#[derive(Clone, Debug)]
pub struct UserProfile {
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: NaiveDateTime,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_owned()
    }
}

impl From<users::Model> for UserProfile {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            created_at: user.created_at,
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, BlogError> {
    Argon2::default()
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))
        .map(|hash| hash.to_string())
        .map_err(|e| BlogError::Password(e.to_string()))
}

/// False for a wrong password and for a stored hash that cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::warn!("verify_password: unreadable hash: {}", e);
            false
        }
    }
}

/// Creates an account and sends the client to the login page.
pub async fn register(
    db: &DatabaseConnection,
    form: &RegistrationFormData,
    now: NaiveDateTime,
) -> Result<Outcome, BlogError> {
    let CleanRegistration { username, password } = match form.validate() {
        Ok(clean) => clean,
        Err(errors) => return Ok(Outcome::Invalid(errors)),
    };

    if get_user_by_name(db, &username).await?.is_some() {
        let mut errors = FormErrors::default();
        errors.add("username", "A user with that username already exists.");
        return Ok(Outcome::Invalid(errors));
    }

    let password = hash_password(&password)?;
    let user = users::ActiveModel {
        username: Set(username),
        email: Set(String::new()),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        password: Set(password),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    log::info!("registered user {} ({})", user.username, user.id);
    Ok(Outcome::Redirect(url::LOGIN.to_owned()))
}

/// Returns the account when the credentials match.
pub async fn authenticate(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
) -> Result<Result<users::Model, FormErrors>, BlogError> {
    let user = get_user_by_name(db, username.trim()).await?;
    match user {
        Some(user) if verify_password(password, &user.password) => Ok(Ok(user)),
        _ => {
            let mut errors = FormErrors::default();
            errors.add(
                NON_FIELD,
                "Please enter a correct username and password. Note that both fields may be case-sensitive.",
            );
            Ok(Err(errors))
        }
    }
}

/// Loads the acting user's own account for the edit form.
pub async fn get_own_account(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<users::Model, BlogError> {
    users::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(BlogError::NotFound)
}

/// Updates the acting user's own account. The target is always `user_id`;
/// no path parameter can point this at somebody else.
pub async fn update_profile(
    db: &DatabaseConnection,
    user_id: i32,
    form: &ProfileFormData,
) -> Result<Outcome, BlogError> {
    let CleanProfile {
        username,
        email,
        first_name,
        last_name,
    } = match form.validate() {
        Ok(clean) => clean,
        Err(errors) => return Ok(Outcome::Invalid(errors)),
    };

    let taken = users::Entity::find()
        .filter(users::Column::Username.eq(username.as_str()))
        .filter(users::Column::Id.ne(user_id))
        .one(db)
        .await?;
    if taken.is_some() {
        let mut errors = FormErrors::default();
        errors.add("username", "A user with that username already exists.");
        return Ok(Outcome::Invalid(errors));
    }

    let res = users::Entity::update_many()
        .col_expr(users::Column::Username, Expr::value(username.as_str()))
        .col_expr(users::Column::Email, Expr::value(email))
        .col_expr(users::Column::FirstName, Expr::value(first_name))
        .col_expr(users::Column::LastName, Expr::value(last_name))
        .filter(users::Column::Id.eq(user_id))
        .exec(db)
        .await?;

    if res.rows_affected == 0 {
        return Err(BlogError::NotFound);
    }

    Ok(Outcome::Redirect(url::profile(&username)))
}
