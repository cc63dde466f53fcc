use crate::error::DbError;
use core_types::Credentials;
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

/// Resolves per-user exchange credentials, hiding the storage schema.
///
/// Credentials are resolved fresh for every work unit and never cached here;
/// a user who removes their keys is observed by the next tick.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    pool: PgPool,
}

impl CredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the user's key pair, or `None` when either half is missing.
    /// Absent credentials are a gating condition for the engines, not an
    /// error.
    pub async fn resolve(&self, user_id: Uuid) -> Result<Option<Credentials>, DbError> {
        let row = sqlx::query(
            "SELECT api_key, api_secret FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let api_key: Option<String> = row.try_get("api_key")?;
        let api_secret: Option<String> = row.try_get("api_secret")?;
        match (api_key, api_secret) {
            (Some(api_key), Some(api_secret))
                if !api_key.is_empty() && !api_secret.is_empty() =>
            {
                Ok(Some(Credentials { api_key, api_secret }))
            }
            _ => Ok(None),
        }
    }
}
