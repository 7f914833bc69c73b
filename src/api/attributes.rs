use std::sync::Arc;

use serde::Deserialize;
use warp::{filters::BoxedFilter, http::StatusCode, reject::Rejection, reply::Response, Filter};

use super::routes::{json_form, no_content, reply};
use crate::{
    actions::attributes::{
        create_attribute, delete_attribute, get_attribute, list_attributes, rename_attribute,
    },
    error::Error,
    form::{parse_flag, Form},
    jwt::SessionData,
    middleware::with_session,
    schema::{AttributeKind, Id},
    state::{with_state, State},
};

#[derive(Debug, Deserialize)]
struct AttributeQuery {
    assigned_only: Option<String>,
}

/// `/recipe/tags` or `/recipe/ingredients`, depending on `kind`.
pub fn routes(kind: AttributeKind, state: Arc<State>) -> BoxedFilter<(Response,)> {
    let collection = warp::path("recipe")
        .and(warp::path(kind.plural()))
        .and(warp::path::end());
    let item = warp::path("recipe")
        .and(warp::path(kind.plural()))
        .and(warp::path::param::<Id>())
        .and(warp::path::end());

    let list = collection
        .clone()
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(warp::query::<AttributeQuery>())
        .and(with_state(state.clone()))
        .and_then(move |session: SessionData, query: AttributeQuery, state: Arc<State>| {
            list(kind, session, query, state)
        });

    let create = collection
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_form())
        .and(with_state(state.clone()))
        .and_then(move |session: SessionData, form: Form, state: Arc<State>| {
            create(kind, session, form, state)
        });

    let retrieve = item
        .clone()
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(move |id: Id, session: SessionData, state: Arc<State>| {
            retrieve(kind, id, session, state)
        });

    let put = item
        .clone()
        .and(warp::put())
        .and(with_session(state.clone()))
        .and(json_form())
        .and(with_state(state.clone()))
        .and_then(move |id: Id, session: SessionData, form: Form, state: Arc<State>| {
            update(kind, id, session, form, state, false)
        });

    let patch = item
        .clone()
        .and(warp::patch())
        .and(with_session(state.clone()))
        .and(json_form())
        .and(with_state(state.clone()))
        .and_then(move |id: Id, session: SessionData, form: Form, state: Arc<State>| {
            update(kind, id, session, form, state, true)
        });

    let delete = item
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(move |id: Id, session: SessionData, state: Arc<State>| {
            remove(kind, id, session, state)
        });

    list.or(create)
        .unify()
        .or(retrieve)
        .unify()
        .or(put)
        .unify()
        .or(patch)
        .unify()
        .or(delete)
        .unify()
        .boxed()
}

async fn list(
    kind: AttributeKind,
    session: SessionData,
    query: AttributeQuery,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let assigned_only = match query.assigned_only.as_deref() {
        Some(value) => parse_flag(value)
            .ok_or_else(|| Error::validation("assigned_only", "Must be a valid boolean."))?,
        None => false,
    };

    let rows = list_attributes(kind, session.user_id, assigned_only, &state.pool).await?;

    Ok(reply(&rows, StatusCode::OK))
}

async fn create(
    kind: AttributeKind,
    session: SessionData,
    mut form: Form,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let name = form.get_str("name", true);
    form.finish()?;
    let Some(name) = name else {
        return Err(Error::validation("name", "This field is required.").into());
    };

    let row = create_attribute(kind, session.user_id, &name, &state.pool).await?;

    Ok(reply(&row, StatusCode::CREATED))
}

async fn retrieve(
    kind: AttributeKind,
    id: Id,
    session: SessionData,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let row = get_attribute(kind, session.user_id, id, &state.pool)
        .await?
        .ok_or(Error::NotFound)?;

    Ok(reply(&row, StatusCode::OK))
}

async fn update(
    kind: AttributeKind,
    id: Id,
    session: SessionData,
    mut form: Form,
    state: Arc<State>,
    partial: bool,
) -> Result<Response, Rejection> {
    let name = form.get_str("name", !partial);
    form.finish()?;

    let row = match name {
        Some(name) => rename_attribute(kind, session.user_id, id, &name, &state.pool).await?,
        None => get_attribute(kind, session.user_id, id, &state.pool)
            .await?
            .ok_or(Error::NotFound)?,
    };

    Ok(reply(&row, StatusCode::OK))
}

async fn remove(
    kind: AttributeKind,
    id: Id,
    session: SessionData,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    delete_attribute(kind, session.user_id, id, &state.pool).await?;

    Ok(no_content())
}
