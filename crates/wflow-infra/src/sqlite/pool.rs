//! Database pool with split reader/writer connections in WAL mode.
//!
//! SQLite allows only one writer at a time. `DatabasePool` keeps a
//! multi-connection reader pool for queries and a single-connection writer
//! pool so checkpoint writes are serialized.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

/// Database file location relative to the root directory.
pub const DATABASE_FILE: &str = "data/wf.sqlite3";

/// Split read/write pool for SQLite with WAL mode.
///
/// - `reader`: Multi-connection pool (up to 8) for concurrent SELECT queries.
/// - `writer`: Single-connection pool for serialized INSERT/UPDATE/DELETE.
#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Connect to `database_url` and run migrations on the writer.
    ///
    /// Both pools use WAL journal mode, foreign key enforcement and a
    /// 5-second busy timeout.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let base_opts = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(5))
            .create_if_missing(true);

        let read_opts = base_opts.clone().read_only(true);
        let write_opts = base_opts;

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(write_opts)
            .await?;

        // Migrate before the reader pool opens so it sees the schema.
        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(read_opts)
            .await?;

        tracing::debug!(url = database_url, "database pool ready");
        Ok(Self { reader, writer })
    }

    /// Open the database file at `path`, creating its parent directory.
    pub async fn open(path: &Path) -> Result<Self, sqlx::Error> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Self::new(&database_url(path)).await
    }
}

/// `{root}/data/wf.sqlite3`.
pub fn default_database_path(root: &Path) -> PathBuf {
    root.join(DATABASE_FILE)
}

pub fn database_url(path: &Path) -> String {
    format!("sqlite://{}?mode=rwc", path.display())
}
