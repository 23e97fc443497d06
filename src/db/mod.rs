pub(crate) mod models;

use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};

use crate::core::config::Settings;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Pool for the exam record store. Statement logging stays off: every save
/// carries a full answer map.
pub(crate) async fn init_pool(settings: &Settings) -> Result<PgPool, sqlx::Error> {
    let database = settings.database();
    let options = database
        .url
        .parse::<PgConnectOptions>()?
        .application_name(env!("CARGO_PKG_NAME"))
        .log_statements(tracing::log::LevelFilter::Off);

    let pool = PgPoolOptions::new()
        .max_connections(database.max_connections)
        .min_connections(1)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .test_before_acquire(true)
        .connect_with(options)
        .await?;

    tracing::info!(max_connections = database.max_connections, "Database pool ready");
    Ok(pool)
}

pub(crate) async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}
