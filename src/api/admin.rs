use std::sync::Arc;

use warp::{filters::BoxedFilter, http::StatusCode, reject::Rejection, reply::Response, Filter};

use super::routes::{json_form, reply};
use crate::{
    actions::users::{create_user, get_user_by_id, list_users, update_user, UserChanges, UserExtra},
    constants::MIN_PASSWORD_LENGTH,
    error::Error,
    form::Form,
    jwt::SessionData,
    middleware::with_session,
    permissions::ActionType,
    schema::{AdminUser, Id},
    state::{with_state, State},
};

/// User administration. Staff may look, only superusers may touch.
pub fn routes(state: Arc<State>) -> BoxedFilter<(Response,)> {
    let list = warp::path!("admin" / "users")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(list);

    let retrieve = warp::path!("admin" / "users" / Id)
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(retrieve);

    let create = warp::path!("admin" / "users")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_form())
        .and(with_state(state.clone()))
        .and_then(create);

    let patch = warp::path!("admin" / "users" / Id)
        .and(warp::patch())
        .and(with_session(state.clone()))
        .and(json_form())
        .and(with_state(state))
        .and_then(patch);

    list.or(retrieve)
        .unify()
        .or(create)
        .unify()
        .or(patch)
        .unify()
        .boxed()
}

async fn list(session: SessionData, state: Arc<State>) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ViewUsers)?;

    let users: Vec<AdminUser> = list_users(&state.pool)
        .await?
        .into_iter()
        .map(AdminUser::from)
        .collect();

    Ok(reply(&users, StatusCode::OK))
}

async fn retrieve(id: Id, session: SessionData, state: Arc<State>) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ViewUsers)?;

    let user = get_user_by_id(id, &state.pool)
        .await?
        .ok_or(Error::NotFound)?;

    Ok(reply(&AdminUser::from(user), StatusCode::OK))
}

async fn create(session: SessionData, mut form: Form, state: Arc<State>) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageUsers)?;

    let email = form.get_email("email", true);
    let password = form.get_password("password", true, MIN_PASSWORD_LENGTH);
    let name = form.get_str("name", true);
    let is_active = form.get_bool("is_active", false);
    let is_staff = form.get_bool("is_staff", false);
    let is_superuser = form.get_bool("is_superuser", false);
    form.finish()?;

    let (Some(email), Some(password), Some(name)) = (email, password, name) else {
        return Err(Error::validation("non_field_errors", "Invalid input.").into());
    };

    let extra = UserExtra {
        is_active: is_active.unwrap_or(true),
        is_staff: is_staff.unwrap_or(false),
        is_superuser: is_superuser.unwrap_or(false),
        ..UserExtra::named(&name)
    };
    let user = create_user(Some(&email), &password, extra, &state.pool).await?;

    Ok(reply(&AdminUser::from(user), StatusCode::CREATED))
}

async fn patch(
    id: Id,
    session: SessionData,
    mut form: Form,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageUsers)?;

    let changes = UserChanges {
        email: form.get_email("email", false),
        name: form.get_str("name", false),
        password: form.get_password("password", false, MIN_PASSWORD_LENGTH),
        is_active: form.get_bool("is_active", false),
        is_staff: form.get_bool("is_staff", false),
        is_superuser: form.get_bool("is_superuser", false),
    };
    form.finish()?;

    let user = update_user(id, changes, &state.pool).await?;

    Ok(reply(&AdminUser::from(user), StatusCode::OK))
}
