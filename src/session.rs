use crate::user::{get_client_user_by_id, ClientUser};
use actix_session::Session;
use sea_orm::DatabaseConnection;

const SESSION_USER_KEY: &str = "user_id";

/// Resolves the signed-in user from the cookie session, if any.
/// A session pointing at a deleted account is treated as a guest.
pub async fn authenticate_client_by_session(
    session: &Session,
    db: &DatabaseConnection,
) -> Option<ClientUser> {
    let user_id = match session.get::<i32>(SESSION_USER_KEY) {
        Ok(Some(user_id)) => user_id,
        Ok(None) => return None,
        Err(e) => {
            log::warn!("authenticate_client_by_session: bad session value: {}", e);
            return None;
        }
    };

    match get_client_user_by_id(db, user_id).await {
        Ok(user) => user,
        Err(e) => {
            log::warn!("authenticate_client_by_session: {}", e);
            None
        }
    }
}

/// Binds the session to a user. The session id is renewed to prevent fixation.
pub fn login(session: &Session, user_id: i32) -> Result<(), actix_web::Error> {
    session.renew();
    session.insert(SESSION_USER_KEY, user_id)?;
    Ok(())
}

pub fn logout(session: &Session) {
    session.purge();
}
