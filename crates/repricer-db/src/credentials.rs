//! Database operations for the `store_credentials` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `store_credentials` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoreCredentialRow {
    pub id: i64,
    pub store_id: String,
    pub access_token: String,
    pub created_at: DateTime<Utc>,
}

/// Fetches the stored credential for a store, if one exists.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_credential(
    pool: &PgPool,
    store_id: &str,
) -> Result<Option<StoreCredentialRow>, DbError> {
    let row = sqlx::query_as::<_, StoreCredentialRow>(
        "SELECT id, store_id, access_token, created_at \
         FROM store_credentials \
         WHERE store_id = $1",
    )
    .bind(store_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Inserts a credential for a store unless one already exists.
///
/// First write wins: an existing row is left untouched. Returns `true` if a
/// row was inserted, `false` if the store already had one.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_credential_if_absent(
    pool: &PgPool,
    store_id: &str,
    access_token: &str,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "INSERT INTO store_credentials (store_id, access_token) \
         VALUES ($1, $2) \
         ON CONFLICT (store_id) DO NOTHING",
    )
    .bind(store_id)
    .bind(access_token)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}
