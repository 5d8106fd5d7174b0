//! Session-scoped storage for the shopping bag.
//!
//! Writes are whole-value upserts, so concurrent tabs on one session resolve
//! last-write-wins.

use boutique_core::Bag;
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub bag: Bag,
    pub save_info: bool,
}

/// Loads a session's bag. An unknown session is an empty bag.
///
/// # Errors
///
/// Returns [`DbError::Core`] if the stored bag is malformed, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn load_session(pool: &PgPool, session_id: &str) -> Result<SessionState, DbError> {
    let row: Option<(serde_json::Value, bool)> =
        sqlx::query_as("SELECT bag, save_info FROM sessions WHERE id = $1")
            .bind(session_id)
            .fetch_optional(pool)
            .await?;

    match row {
        None => Ok(SessionState::default()),
        Some((bag, save_info)) => Ok(SessionState {
            bag: Bag::from_value(bag)?,
            save_info,
        }),
    }
}

/// Writes the bag for a session, creating the session if needed.
///
/// # Errors
///
/// Returns [`DbError::Json`] if the bag cannot be encoded, or
/// [`DbError::Sqlx`] if the upsert fails.
pub async fn save_bag(pool: &PgPool, session_id: &str, bag: &Bag) -> Result<(), DbError> {
    let value = serde_json::to_value(bag)?;
    sqlx::query(
        "INSERT INTO sessions (id, bag) VALUES ($1, $2) \
         ON CONFLICT (id) DO UPDATE SET bag = EXCLUDED.bag, updated_at = NOW()",
    )
    .bind(session_id)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Records whether the customer asked to save their details at checkout.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn set_save_info(pool: &PgPool, session_id: &str, save_info: bool) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO sessions (id, save_info) VALUES ($1, $2) \
         ON CONFLICT (id) DO UPDATE SET save_info = EXCLUDED.save_info, updated_at = NOW()",
    )
    .bind(session_id)
    .bind(save_info)
    .execute(pool)
    .await?;

    Ok(())
}

/// Empties the bag after a successful checkout.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn clear_bag(pool: &PgPool, session_id: &str) -> Result<(), DbError> {
    sqlx::query("UPDATE sessions SET bag = '{}'::jsonb, updated_at = NOW() WHERE id = $1")
        .bind(session_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Deletes sessions untouched for more than `ttl_days`. Returns the number
/// removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn purge_stale_sessions(pool: &PgPool, ttl_days: u32) -> Result<u64, DbError> {
    let result = sqlx::query(
        "DELETE FROM sessions WHERE updated_at < NOW() - make_interval(days => $1)",
    )
    .bind(i32::try_from(ttl_days).unwrap_or(i32::MAX))
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
