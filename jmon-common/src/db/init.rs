//! Database initialization
//!
//! Creates the SQLite file on first run and the four entity tables. Every
//! statement is idempotent, so `init_database` is safe to call on each start.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub const SCHEMA_VERSION: i64 = 1;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Connection-level pragmas go through the options so every pooled connection gets them
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_tables(&pool).await?;

    Ok(pool)
}

/// Create every table (idempotent)
///
/// Also used directly by tests against in-memory pools.
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    create_schema_version_table(pool).await?;
    create_parties_table(pool).await?;
    create_processes_table(pool).await?;
    create_actions_table(pool).await?;
    create_documents_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_parties_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS parties (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nit TEXT UNIQUE,
            name TEXT NOT NULL,
            person_type TEXT NOT NULL DEFAULT 'jur',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_parties_name ON parties(name)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_processes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            process_id TEXT NOT NULL UNIQUE,
            process_key TEXT,
            filing_date TEXT,
            last_action_date TEXT,
            office TEXT,
            department TEXT,
            parties_summary TEXT,
            process_class TEXT,
            process_type TEXT,
            process_subtype TEXT,
            file_location TEXT,
            is_private INTEGER NOT NULL DEFAULT 0,
            claimants TEXT,
            respondents TEXT,
            summary TEXT,
            fetched_at TEXT NOT NULL,
            party_ref INTEGER REFERENCES parties(id) ON DELETE SET NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_processes_key ON processes(process_key)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_processes_party ON processes(party_ref)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_actions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS actions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            action_id TEXT NOT NULL UNIQUE,
            process_ref INTEGER NOT NULL REFERENCES processes(id) ON DELETE CASCADE,
            sequence INTEGER,
            action_date TEXT,
            label TEXT,
            annotation TEXT,
            initial_date TEXT,
            final_date TEXT,
            registration_date TEXT,
            has_documents INTEGER NOT NULL DEFAULT 0,
            urgency TEXT,
            category TEXT,
            action_required INTEGER NOT NULL DEFAULT 0,
            justification TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_actions_process ON actions(process_ref)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_documents_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id TEXT NOT NULL UNIQUE,
            action_ref INTEGER NOT NULL REFERENCES actions(id) ON DELETE CASCADE,
            name TEXT,
            document_date TEXT,
            publication_date TEXT,
            download_url TEXT NOT NULL,
            local_path TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_action ON documents(action_ref)")
        .execute(pool)
        .await?;

    Ok(())
}
