mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod api {
    pub mod admin;
    pub mod attributes;
    pub mod recipes;
    pub mod routes;
    pub mod users;
}
mod constants;

pub mod config;
pub mod media;
pub mod state;

pub use api::routes::api;
pub use authentication::*;
pub use constants::*;
pub use database::*;
