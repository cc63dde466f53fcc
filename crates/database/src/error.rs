use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to load environment variables for database connection: {0}")]
    ConnectionConfig(String),

    #[error("Database query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Stored bot document is invalid: {0}")]
    InvalidDocument(#[from] core_types::CoreError),

    #[error("An error occurred during JSON serialization/deserialization: {0}")]
    Json(#[from] serde_json::Error),

    #[error("The requested data was not found in the database.")]
    NotFound,
}
