//! Database operations for `data_syncs` bookkeeping rows.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `data_syncs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncRunRow {
    pub id: i64,
    /// `full`, `category`, `retry`, or `import`.
    pub sync_type: String,
    pub status: String,
    pub records_processed: i32,
    pub records_failed: i32,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

const SYNC_COLUMNS: &str = "id, sync_type, status, records_processed, records_failed, \
     error_message, started_at, completed_at";

/// Creates a new sync run in `running` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_sync_run(pool: &PgPool, sync_type: &str) -> Result<SyncRunRow, DbError> {
    let row = sqlx::query_as::<_, SyncRunRow>(&format!(
        "INSERT INTO data_syncs (sync_type) VALUES ($1) RETURNING {SYNC_COLUMNS}"
    ))
    .bind(sync_type)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `success` with its final counters.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn complete_sync_run(
    pool: &PgPool,
    id: i64,
    records_processed: i32,
    records_failed: i32,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE data_syncs \
         SET status = 'success', records_processed = $1, records_failed = $2, \
             completed_at = NOW() \
         WHERE id = $3",
    )
    .bind(records_processed)
    .bind(records_failed)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Marks a run as `failed` with its error and whatever counters it reached.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn fail_sync_run(
    pool: &PgPool,
    id: i64,
    error_message: &str,
    records_processed: i32,
    records_failed: i32,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE data_syncs \
         SET status = 'failed', error_message = $1, records_processed = $2, \
             records_failed = $3, completed_at = NOW() \
         WHERE id = $4",
    )
    .bind(error_message)
    .bind(records_processed)
    .bind(records_failed)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetches a single run by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_sync_run(pool: &PgPool, id: i64) -> Result<SyncRunRow, DbError> {
    let row = sqlx::query_as::<_, SyncRunRow>(&format!(
        "SELECT {SYNC_COLUMNS} FROM data_syncs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}
