use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use super::jwt::{verify_jwt_session, SessionData};
use crate::{
    actions::users::get_user_by_id,
    constants::AUTHORIZATION_SCHEMES,
    error::Error,
    state::{with_state, State},
};

/// Pulls the token out of an `Authorization: Token <key>` (or `Bearer`) header.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();

    if token.is_empty() {
        return None;
    }

    AUTHORIZATION_SCHEMES
        .iter()
        .any(|s| s.eq_ignore_ascii_case(scheme))
        .then_some(token)
}

async fn resolve_session(header: Option<String>, state: Arc<State>) -> Result<SessionData, Error> {
    let header = header.ok_or(Error::NotAuthenticated)?;
    let token = bearer_token(&header).ok_or(Error::NotAuthenticated)?;
    let claims = verify_jwt_session(token, &state.config.secret_key)?;

    match get_user_by_id(claims.user_id, &state.pool).await? {
        Some(user) if user.is_active => Ok(user.into()),
        _ => Err(Error::InvalidSession("User inactive or deleted")),
    }
}

pub fn with_session(
    state: Arc<State>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(state))
        .and_then(|header: Option<String>, state: Arc<State>| async move {
            resolve_session(header, state)
                .await
                .map_err(Rejection::from)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_and_bearer_schemes() {
        assert_eq!(bearer_token("Token abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
    }

    #[test]
    fn other_headers_are_ignored() {
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token("Token"), None);
        assert_eq!(bearer_token("Token "), None);
        assert_eq!(bearer_token(""), None);
    }
}
