use redb::{Database, CommitError, StorageError, TableError, TransactionError};
use rusqlite::{Connection, Result as RusqliteResult, Transaction};
use thiserror::Error;
use crate::models::db_operations::posts_db_operations::{METADATA, POSTS, SLUG_INDEX};

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("Redb storage error: {0}")]
    RedbStorage(#[from] StorageError),
    #[error("Redb transaction error: {0}")]
    RedbTransaction(#[from] TransactionError),
    #[error("Redb table error: {0}")]
    RedbTable(#[from] TableError),
    #[error("Redb commit error: {0}")]
    RedbCommit(#[from] CommitError),
}

pub fn setup_site_db(conn: &mut Connection) -> Result<(), SetupError> {
    let tx = conn.transaction()?;
    log::info!("Creating 'settings' table");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    log::info!("Creating 'post_meta' table");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS post_meta (
            post_id TEXT NOT NULL,
            meta_key TEXT NOT NULL,
            meta_value TEXT NOT NULL,
            PRIMARY KEY (post_id, meta_key)
        )",
        [],
    )?;

    log::info!("Creating 'media' table");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS media (
            id INTEGER PRIMARY KEY,
            file_path TEXT NOT NULL,
            alt_text TEXT NOT NULL DEFAULT '',
            width INTEGER,
            height INTEGER,
            can_distribute INTEGER -- NULL means the credit was never filled in
        )",
        [],
    )?;

    log::info!("Creating 'republish_views' table");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS republish_views (
            post_id TEXT NOT NULL,
            referrer TEXT NOT NULL DEFAULT '',
            views INTEGER NOT NULL DEFAULT 0,
            last_viewed_at TEXT NOT NULL,
            PRIMARY KEY (post_id, referrer)
        )",
        [],
    )?;

    seed_initial_settings(&tx)?;

    tx.commit()?;
    Ok(())
}

fn seed_initial_settings(tx: &Transaction) -> RusqliteResult<()> {
    let defaults = [
        ("license_statement", ""),
        ("allowed_tags", ""),
        ("republish_post_types", "post"),
        ("footer_template", ""),
        ("timezone_string", "UTC"),
        ("shortcode_tags", ""),
        ("ga_tracking_id", ""),
    ];

    for (key, value) in defaults {
        tx.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
            [key, value],
        )?;
        log::debug!("Seeded setting '{}' = '{}'", key, value);
    }

    Ok(())
}

pub fn setup_posts_db(db: &Database) -> Result<(), SetupError> {
    let write_txn = db.begin_write()?;
    {
        log::info!("Creating 'posts', 'metadata' and 'slug_index' tables in Redb");
        write_txn.open_table(POSTS)?;
        write_txn.open_table(METADATA)?;
        write_txn.open_table(SLUG_INDEX)?;
    }
    write_txn.commit()?;
    Ok(())
}
