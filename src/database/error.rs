use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use warp::http::StatusCode;

/// Validation messages keyed by the offending field.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors {
    inner: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.inner
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.inner.get(field).map(Vec::as_slice)
    }

    pub fn into_result(self) -> Result<(), Error> {
        if self.is_empty() {
            return Ok(());
        }
        Err(Error::Validation(self))
    }
}

impl Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .inner
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(" ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input ({0})")]
    Validation(FieldErrors),

    #[error("Unable to authenticate with provided credentials")]
    InvalidCredentials,

    #[error("Authentication credentials were not provided.")]
    NotAuthenticated,

    #[error("Invalid session; {0}")]
    InvalidSession(&'static str),

    #[error("You do not have permission to perform this action.")]
    Forbidden,

    #[error("Not found.")]
    NotFound,

    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Token signing failed: {0}")]
    Token(String),
}

impl Error {
    pub fn validation(field: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        Self::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::InvalidCredentials => StatusCode::BAD_REQUEST,
            Error::NotAuthenticated | Error::InvalidSession(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::Query(_)
            | Error::Migrate(_)
            | Error::Io(_)
            | Error::PasswordHash(_)
            | Error::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body sent back to the client. Internal failures never leak their cause.
    pub fn body(&self) -> Value {
        match self {
            Error::Validation(errors) => json!(errors),
            Error::InvalidCredentials => json!({ "non_field_errors": [self.to_string()] }),
            Error::InvalidSession(_) => json!({ "detail": "Invalid token." }),
            Error::NotAuthenticated | Error::Forbidden | Error::NotFound => {
                json!({ "detail": self.to_string() })
            }
            _ => json!({ "detail": "Internal server error." }),
        }
    }
}

impl warp::reject::Reject for Error {}

impl From<argon2::password_hash::Error> for Error {
    fn from(value: argon2::password_hash::Error) -> Self {
        Self::PasswordHash(format!("{value}"))
    }
}

impl From<jwt::Error> for Error {
    fn from(value: jwt::Error) -> Self {
        Self::Token(format!("{value}"))
    }
}

/// Turns a unique-constraint violation on `field` into a validation error.
pub fn unique_violation(error: sqlx::Error, field: &str, message: &str) -> Error {
    match &error {
        sqlx::Error::Database(e) if e.is_unique_violation() => Error::validation(field, message),
        _ => Error::Query(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_field_errors_pass() {
        assert!(FieldErrors::new().into_result().is_ok());
    }

    #[test]
    fn field_errors_collect_per_field() {
        let mut errors = FieldErrors::new();
        errors.add("name", "This field is required.");
        errors.add("name", "Too long.");
        errors.add("price", "A valid number is required.");

        assert_eq!(errors.get("name").map(<[String]>::len), Some(2));
        let body = Error::Validation(errors).body();
        assert_eq!(body["price"][0], "A valid number is required.");
    }

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(Error::validation("x", "y").status(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::InvalidCredentials.status(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::NotAuthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(Error::NotFound.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn errors_convert_into_rejections() {
        let rejection: warp::reject::Rejection = Error::Forbidden.into();
        assert!(matches!(rejection.find::<Error>(), Some(Error::Forbidden)));
    }

    #[test]
    fn internal_errors_hide_details() {
        let error = Error::PasswordHash("salt too short".to_string());
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.body(), json!({ "detail": "Internal server error." }));
    }
}
