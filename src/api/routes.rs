use std::{convert::Infallible, sync::Arc};

use log::{error, warn};
use serde::Serialize;
use serde_json::json;
use warp::{
    filters::body::BodyDeserializeError,
    http::StatusCode,
    reject::{
        InvalidQuery, LengthRequired, MethodNotAllowed, PayloadTooLarge, Rejection,
        UnsupportedMediaType,
    },
    reply::Response,
    Filter, Reply,
};

use super::{admin, attributes, recipes, users};
use crate::{
    constants::JSON_BODY_LIMIT,
    error::Error,
    form::{Form, FormData},
    schema::AttributeKind,
    state::State,
};

/// The whole HTTP surface: every endpoint, error rendering and access logs.
pub fn api(state: Arc<State>) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    users::routes(state.clone())
        .or(attributes::routes(AttributeKind::Tag, state.clone()))
        .unify()
        .or(attributes::routes(AttributeKind::Ingredient, state.clone()))
        .unify()
        .or(recipes::routes(state.clone()))
        .unify()
        .or(admin::routes(state.clone()))
        .unify()
        .or(media(state))
        .unify()
        .recover(handle_rejection)
        .with(warp::log("recipe_app::api"))
}

fn media(state: Arc<State>) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path("media")
        .and(warp::get())
        .and(warp::fs::dir(state.config.media_root.clone()))
        .map(|file: warp::fs::File| file.into_response())
}

/// JSON object body, size limited.
pub fn json_form() -> impl Filter<Extract = (Form,), Error = Rejection> + Clone {
    warp::body::content_length_limit(JSON_BODY_LIMIT)
        .and(warp::body::json::<FormData>())
        .map(Form::from_data)
}

pub fn reply<T: Serialize>(value: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(value), status).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, body) = if let Some(e) = err.find::<Error>() {
        if e.status().is_server_error() {
            error!("{e}");
        }
        (e.status(), e.body())
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            json!({ "detail": format!("JSON parse error - {e}") }),
        )
    } else if err.find::<PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            json!({ "detail": "Request body is too large." }),
        )
    } else if err.find::<LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            json!({ "detail": "A content-length header is required." }),
        )
    } else if err.find::<UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            json!({ "detail": "Unsupported media type in request." }),
        )
    } else if err.find::<InvalidQuery>().is_some() {
        (
            StatusCode::BAD_REQUEST,
            json!({ "detail": "Invalid query string." }),
        )
    } else if err.find::<MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            json!({ "detail": "Method not allowed." }),
        )
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, json!({ "detail": "Not found." }))
    } else {
        warn!("Unhandled rejection: {err:?}");
        (
            StatusCode::BAD_REQUEST,
            json!({ "detail": "Malformed request." }),
        )
    };

    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}
