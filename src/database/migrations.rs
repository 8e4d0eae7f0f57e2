use crate::error::AppError;
use sqlx::{Executor, Pool, Sqlite};
use tracing::{info, instrument};

use super::schema::{CURRENT_SCHEMA, SCHEMA_VERSION};

/// Applies `CURRENT_SCHEMA` and records its version. Returns true when the
/// version was not recorded before, i.e. on a fresh database.
#[instrument(skip(pool))]
pub async fn migrate(pool: &Pool<Sqlite>) -> Result<bool, AppError> {
    info!("Starting database migration");

    let mut tx = pool.begin().await?;

    (&mut *tx)
        .execute(sqlx::raw_sql(CURRENT_SCHEMA))
        .await
        .map_err(|e| AppError::Internal(format!("Failed to apply schema: {}", e)))?;

    let recorded = sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    if recorded > 0 {
        info!(version = SCHEMA_VERSION, "Schema version recorded");
    } else {
        info!("No schema changes needed");
    }

    Ok(recorded > 0)
}

#[instrument(skip(pool))]
pub async fn current_version(pool: &Pool<Sqlite>) -> Result<Option<i64>, AppError> {
    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await?;

    Ok(version)
}
