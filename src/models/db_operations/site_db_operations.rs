use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension};
use chrono::Utc;
use crate::models::MediaAttachment;

// --- Site options ---

pub fn read_setting(conn: &Connection, key: &str) -> Option<String> {
    conn.query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| row.get(0))
        .optional()
        .unwrap_or(None)
}

pub fn update_setting(conn: &Connection, key: &str, value: &str) -> Result<(), RusqliteError> {
    conn.execute(
        "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
        [key, value],
    )?;
    Ok(())
}

pub fn read_all_settings(conn: &Connection) -> Result<Vec<(String, String)>, RusqliteError> {
    let mut stmt = conn.prepare("SELECT key, value FROM settings ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

// --- Post meta ---

pub fn read_post_meta(conn: &Connection, post_id: &str, meta_key: &str) -> Result<Option<String>, RusqliteError> {
    conn.query_row(
        "SELECT meta_value FROM post_meta WHERE post_id = ?1 AND meta_key = ?2",
        [post_id, meta_key],
        |row| row.get(0),
    )
    .optional()
}

pub fn update_post_meta(conn: &Connection, post_id: &str, meta_key: &str, meta_value: &str) -> Result<(), RusqliteError> {
    conn.execute(
        "INSERT OR REPLACE INTO post_meta (post_id, meta_key, meta_value) VALUES (?1, ?2, ?3)",
        [post_id, meta_key, meta_value],
    )?;
    Ok(())
}

pub fn delete_post_meta(conn: &Connection, post_id: &str, meta_key: &str) -> Result<usize, RusqliteError> {
    conn.execute(
        "DELETE FROM post_meta WHERE post_id = ?1 AND meta_key = ?2",
        [post_id, meta_key],
    )
}

// --- Media ---

pub fn create_media(conn: &Connection, media: &MediaAttachment) -> Result<(), RusqliteError> {
    conn.execute(
        "INSERT OR REPLACE INTO media (id, file_path, alt_text, width, height, can_distribute)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            media.id,
            media.file_path,
            media.alt_text,
            media.width,
            media.height,
            media.can_distribute,
        ],
    )?;
    Ok(())
}

pub fn read_media(conn: &Connection, media_id: i64) -> Result<Option<MediaAttachment>, RusqliteError> {
    conn.query_row(
        "SELECT id, file_path, alt_text, width, height, can_distribute FROM media WHERE id = ?1",
        [media_id],
        |row| {
            Ok(MediaAttachment {
                id: row.get(0)?,
                file_path: row.get(1)?,
                alt_text: row.get(2)?,
                width: row.get(3)?,
                height: row.get(4)?,
                can_distribute: row.get(5)?,
            })
        },
    )
    .optional()
}

// --- Republish views ---

/// Counts one pixel hit for a post, grouped by the page the copy was republished on.
pub fn record_view(conn: &Connection, post_id: &str, referrer: &str) -> Result<(), RusqliteError> {
    conn.execute(
        "INSERT INTO republish_views (post_id, referrer, views, last_viewed_at) VALUES (?1, ?2, 1, ?3)
         ON CONFLICT(post_id, referrer) DO UPDATE SET
            views = views + 1,
            last_viewed_at = excluded.last_viewed_at",
        params![post_id, referrer, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

pub fn read_view_count(conn: &Connection, post_id: &str) -> Result<i64, RusqliteError> {
    conn.query_row(
        "SELECT COALESCE(SUM(views), 0) FROM republish_views WHERE post_id = ?1",
        [post_id],
        |row| row.get(0),
    )
}

/// Per-referrer view counts for a post, busiest first.
pub fn read_views_by_referrer(conn: &Connection, post_id: &str) -> Result<Vec<(String, i64)>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT referrer, views FROM republish_views WHERE post_id = ?1 ORDER BY views DESC, referrer",
    )?;
    let rows = stmt.query_map([post_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}
