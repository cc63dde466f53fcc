use crate::error::DbError;
use dotenvy::dotenv;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::env;
use std::time::Duration;

/// Establishes a connection pool to the PostgreSQL database.
///
/// Reads `DATABASE_URL` from the environment (loading `.env` when present)
/// and returns a pool shared across the whole application. A failure here is
/// fatal at boot: the process must exit non-zero rather than trade without
/// storage.
pub async fn connect() -> Result<PgPool, DbError> {
    // A missing .env file is fine in production; the variable may be set
    // directly in the environment.
    let _ = dotenv();

    let database_url = env::var("DATABASE_URL")
        .map_err(|_| DbError::ConnectionConfig("DATABASE_URL must be set.".to_string()))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&database_url)
        .await?;

    Ok(pool)
}

/// Applies pending migrations, ensuring the schema is up-to-date at startup.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
