use std::sync::Arc;

use serde_json::json;
use warp::{filters::BoxedFilter, http::StatusCode, reject::Rejection, reply::Response, Filter};

use super::routes::{json_form, reply};
use crate::{
    actions::users::{create_user, get_user_by_id, login_user, update_user, UserChanges, UserExtra},
    constants::MIN_PASSWORD_LENGTH,
    error::Error,
    form::Form,
    jwt::SessionData,
    middleware::with_session,
    schema::UserProfile,
    state::{with_state, State},
};

pub fn routes(state: Arc<State>) -> BoxedFilter<(Response,)> {
    let create = warp::path!("user" / "create")
        .and(warp::post())
        .and(json_form())
        .and(with_state(state.clone()))
        .and_then(register);

    let token = warp::path!("user" / "token")
        .and(warp::post())
        .and(json_form())
        .and(with_state(state.clone()))
        .and_then(issue_token);

    let me = warp::path!("user" / "me")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(get_profile);

    let patch_me = warp::path!("user" / "me")
        .and(warp::patch())
        .and(with_session(state.clone()))
        .and(json_form())
        .and(with_state(state.clone()))
        .and_then(|session: SessionData, form: Form, state: Arc<State>| {
            update_profile(session, form, state, true)
        });

    let put_me = warp::path!("user" / "me")
        .and(warp::put())
        .and(with_session(state.clone()))
        .and(json_form())
        .and(with_state(state))
        .and_then(|session: SessionData, form: Form, state: Arc<State>| {
            update_profile(session, form, state, false)
        });

    create
        .or(token)
        .unify()
        .or(me)
        .unify()
        .or(patch_me)
        .unify()
        .or(put_me)
        .unify()
        .boxed()
}

async fn register(mut form: Form, state: Arc<State>) -> Result<Response, Rejection> {
    let email = form.get_email("email", true);
    let password = form.get_password("password", true, MIN_PASSWORD_LENGTH);
    let name = form.get_str("name", true);
    form.finish()?;

    let (Some(email), Some(password), Some(name)) = (email, password, name) else {
        return Err(Error::validation("non_field_errors", "Invalid input.").into());
    };

    let user = create_user(Some(&email), &password, UserExtra::named(&name), &state.pool).await?;

    Ok(reply(&UserProfile::from(user), StatusCode::CREATED))
}

async fn issue_token(mut form: Form, state: Arc<State>) -> Result<Response, Rejection> {
    let email = form.get_str("email", true);
    let password = form.get_password("password", true, 0);
    form.finish()?;

    let (Some(email), Some(password)) = (email, password) else {
        return Err(Error::InvalidCredentials.into());
    };

    let token = login_user(
        &email,
        &password,
        &state.config.secret_key,
        state.config.token_lifetime,
        &state.pool,
    )
    .await?;

    Ok(reply(&json!({ "token": token }), StatusCode::OK))
}

async fn get_profile(session: SessionData, state: Arc<State>) -> Result<Response, Rejection> {
    let user = get_user_by_id(session.user_id, &state.pool)
        .await?
        .ok_or(Error::NotFound)?;

    Ok(reply(&UserProfile::from(user), StatusCode::OK))
}

async fn update_profile(
    session: SessionData,
    mut form: Form,
    state: Arc<State>,
    partial: bool,
) -> Result<Response, Rejection> {
    let changes = UserChanges {
        email: form.get_email("email", !partial),
        name: form.get_str("name", !partial),
        password: form.get_password("password", !partial, MIN_PASSWORD_LENGTH),
        ..UserChanges::default()
    };
    form.finish()?;

    let user = update_user(session.user_id, changes, &state.pool).await?;

    Ok(reply(&UserProfile::from(user), StatusCode::OK))
}
