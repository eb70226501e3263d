// src/db.rs
use std::{str::FromStr, time::Duration};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::config::Config;
use crate::error::AppResult;

pub async fn create_pool(config: &Config) -> AppResult<SqlitePool> {
    let pool = connect(&config.database_url, config.max_connections).await?;
    migrate(&pool).await?;
    info!(url = %config.database_url, "database ready");
    Ok(pool)
}

/// Opens a pool with foreign keys enforced on every connection. WAL and the
/// busy timeout let concurrent vote updates queue on the write lock.
pub async fn connect(database_url: &str, max_connections: u32) -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(10));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> AppResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// A migrated database file that is removed, with its WAL sidecars, on drop.
#[cfg(test)]
pub struct TestDb {
    pub pool: SqlitePool,
    path: std::path::PathBuf,
}

#[cfg(test)]
impl Drop for TestDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

#[cfg(test)]
pub async fn test_db() -> TestDb {
    let path = std::env::temp_dir().join(format!("polls-test-{}.db", uuid::Uuid::new_v4()));
    let url = format!("sqlite://{}", path.display());
    let pool = connect(&url, 8).await.expect("open test database");
    migrate(&pool).await.expect("migrate test database");
    TestDb { pool, path }
}
