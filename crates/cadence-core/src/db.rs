use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::CoreError;

// Re-export the pool for use in other parts of the core crate
pub use sqlx::SqlitePool as DbPool;

/// Establishes a connection pool to the SQLite database and runs migrations.
///
/// # Arguments
///
/// * `db_path` - The path to the SQLite database file.
///
/// # Returns
///
/// A `Result` containing the `SqlitePool` or a `CoreError` if the connection fails
/// or migrations cannot be run.
pub async fn establish_connection(db_path: &str) -> Result<SqlitePool, CoreError> {
    establish_connection_with(&EngineConfig {
        database_path: db_path.to_string(),
        ..EngineConfig::default()
    })
    .await
}

/// Same as [`establish_connection`] with the pool sized from `config`.
pub async fn establish_connection_with(config: &EngineConfig) -> Result<SqlitePool, CoreError> {
    let db_path = Path::new(&config.database_path);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    debug!(path = %config.database_path, "database ready");

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_missing_directories_and_runs_migrations() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("calendar.db");

        let tables: Vec<(String,)> = tokio_test::block_on(async {
            let pool = establish_connection(&db_path.to_string_lossy()).await.unwrap();
            let tables = sqlx::query_as(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'series_%' ORDER BY name",
            )
            .fetch_all(&pool)
            .await
            .unwrap();
            pool.close().await;
            tables
        });

        assert!(db_path.exists());
        let names: Vec<&str> = tables.iter().map(|(name,)| name.as_str()).collect();
        assert_eq!(names, ["series_exceptions", "series_exclusions", "series_masters"]);
    }
}
