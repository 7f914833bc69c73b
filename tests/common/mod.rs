#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use recipe_app::{
    actions::users::{create_user, UserExtra},
    api,
    config::Config,
    jwt::generate_jwt_session,
    schema::User,
    state::State,
};
use serde_json::Value;
use tempfile::TempDir;
use warp::http::StatusCode;

pub const PASSWORD: &str = "testpass123";
const SECRET: &str = "integration-test-secret";

pub struct TestApp {
    pub state: Arc<State>,
    pub media: TempDir,
}

/// Fresh in-memory database and media directory for every test.
pub async fn setup() -> TestApp {
    let media = tempfile::tempdir().unwrap();
    let config = Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "sqlite::memory:".to_string(),
        database_max_connections: 1,
        secret_key: SECRET.to_string(),
        token_lifetime: Duration::from_secs(60 * 60),
        media_root: media.path().to_path_buf(),
        max_upload_bytes: 1024 * 1024,
    };
    let state = State::new(config).await.unwrap();

    TestApp { state, media }
}

impl TestApp {
    async fn create_with(&self, email: &str, extra: UserExtra) -> (User, String) {
        let user = create_user(Some(email), PASSWORD, extra, &self.state.pool)
            .await
            .unwrap();
        let token =
            generate_jwt_session(&user, &self.state.config.secret_key, self.state.config.token_lifetime)
                .unwrap();
        (user, token)
    }

    /// A regular user and a valid token for them.
    pub async fn user(&self, email: &str) -> (User, String) {
        self.create_with(email, UserExtra::named("Test Name")).await
    }

    pub async fn staff(&self, email: &str) -> (User, String) {
        let extra = UserExtra {
            is_staff: true,
            ..UserExtra::named("Staff")
        };
        self.create_with(email, extra).await
    }

    pub async fn superuser(&self, email: &str) -> (User, String) {
        let extra = UserExtra {
            is_staff: true,
            is_superuser: true,
            ..UserExtra::named("Admin")
        };
        self.create_with(email, extra).await
    }

    pub async fn send(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = warp::test::request().method(method).path(path);
        if let Some(token) = token {
            request = request.header("authorization", format!("Token {token}"));
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.reply(&api(self.state.clone())).await;
        (response.status(), body_json(response.body()))
    }

    pub async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.send("GET", path, Some(token), None).await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send("POST", path, Some(token), Some(body)).await
    }
}

pub fn body_json(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body).unwrap()
}

/// Id list out of a JSON array of objects or plain ids.
pub fn ids(value: &Value) -> Vec<i64> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item.get("id").unwrap_or(item).as_i64().unwrap())
        .collect()
}
