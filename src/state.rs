use std::{convert::Infallible, str::FromStr, sync::Arc};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};
use warp::Filter;

use crate::{config::Config, error::Error};

pub struct State {
    pub config: Config,
    pub pool: Pool<Sqlite>,
}

impl State {
    /// Opens the pool and brings the schema up to date.
    pub async fn new(config: Config) -> Result<Arc<Self>, Error> {
        let pool = connect(&config).await?;
        migrate(&pool).await?;

        Ok(Arc::new(Self { config, pool }))
    }
}

pub async fn connect(config: &Config) -> Result<Pool<Sqlite>, Error> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    info!("Connecting to {}", config.database_url);
    let pool = SqlitePoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

pub async fn migrate(pool: &Pool<Sqlite>) -> Result<(), Error> {
    sqlx::migrate!().run(pool).await?;
    info!("Database schema is up to date");
    Ok(())
}

pub fn with_state(state: Arc<State>) -> impl Filter<Extract = (Arc<State>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}
