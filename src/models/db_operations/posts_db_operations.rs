use redb::{Database, ReadableTable, TableDefinition, CommitError, StorageError, TableError, TransactionError};
use crate::models::{FullPost, PostMetadata};
use uuid::Uuid;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Redb storage error: {0}")]
    RedbStorage(#[from] StorageError),
    #[error("Redb transaction error: {0}")]
    RedbTransaction(#[from] TransactionError),
    #[error("Redb table error: {0}")]
    RedbTable(#[from] TableError),
    #[error("Redb commit error: {0}")]
    RedbCommit(#[from] CommitError),
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("R2D2 pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("UUID parse error: {0}")]
    Uuid(#[from] uuid::Error),
    #[error("Item not found in database: {0}")]
    NotFound(String),
    #[error("Slug already in use: {0}")]
    SlugTaken(String),
}

pub const POSTS: TableDefinition<&[u8; 16], &str> = TableDefinition::new("posts");
pub const METADATA: TableDefinition<&[u8; 16], &str> = TableDefinition::new("metadata");
pub const SLUG_INDEX: TableDefinition<&str, &[u8; 16]> = TableDefinition::new("slug_index");

/// Normalizes a slug the same way on write and on lookup.
pub fn normalize_slug(slug: &str) -> String {
    slug.trim().trim_matches('/').to_lowercase()
}

pub fn create_post(db: &Database, metadata: &PostMetadata, content: &str) -> Result<String, DbError> {
    let post_uuid = Uuid::new_v4();
    let slug = normalize_slug(&metadata.slug);

    let mut stored_meta = metadata.clone();
    stored_meta.slug = slug.clone();
    let metadata_json = serde_json::to_string(&stored_meta)?;

    let write_txn = db.begin_write()?;
    {
        let mut slug_table = write_txn.open_table(SLUG_INDEX)?;
        if slug_table.get(slug.as_str())?.is_some() {
            return Err(DbError::SlugTaken(slug));
        }

        let mut posts_table = write_txn.open_table(POSTS)?;
        let mut metadata_table = write_txn.open_table(METADATA)?;

        let post_id_bytes = post_uuid.into_bytes();
        posts_table.insert(&post_id_bytes, content)?;
        metadata_table.insert(&post_id_bytes, metadata_json.as_str())?;
        slug_table.insert(slug.as_str(), &post_id_bytes)?;
    }
    write_txn.commit()?;

    Ok(post_uuid.to_string())
}

/// Reads a published post. A malformed id is reported as "not there", not as an error.
pub fn read_post(db: &Database, id: &str) -> Result<Option<FullPost>, DbError> {
    let post_uuid = match Uuid::parse_str(id) {
        Ok(uuid) => uuid,
        Err(_) => return Ok(None),
    };
    let post_id_bytes = post_uuid.into_bytes();

    let read_txn = db.begin_read()?;
    let posts_table = read_txn.open_table(POSTS)?;
    let metadata_table = read_txn.open_table(METADATA)?;

    let content = match posts_table.get(&post_id_bytes)? {
        Some(guard) => guard.value().to_string(),
        None => return Ok(None),
    };
    let metadata: PostMetadata = match metadata_table.get(&post_id_bytes)? {
        Some(guard) => serde_json::from_str(guard.value())?,
        None => return Ok(None),
    };

    Ok(Some(FullPost {
        id: post_uuid.to_string(),
        metadata,
        content,
    }))
}

pub fn find_post_id_by_slug(db: &Database, slug: &str) -> Result<Option<String>, DbError> {
    let slug = normalize_slug(slug);
    if slug.is_empty() {
        return Ok(None);
    }

    let read_txn = db.begin_read()?;
    let slug_table = read_txn.open_table(SLUG_INDEX)?;
    let id = slug_table
        .get(slug.as_str())?
        .map(|guard| Uuid::from_bytes(*guard.value()).to_string());
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn open_db(dir: &tempfile::TempDir) -> Database {
        let db = Database::create(dir.path().join("posts.db")).unwrap();
        crate::setup::db_setup::setup_posts_db(&db).unwrap();
        db
    }

    fn metadata(slug: &str) -> PostMetadata {
        PostMetadata {
            title: "Hello".to_string(),
            slug: slug.to_string(),
            post_type: "post".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
            author_byline: String::new(),
            featured_media_id: None,
        }
    }

    #[test]
    fn created_post_is_readable_by_id_and_slug() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);

        let id = create_post(&db, &metadata("/Hello-World/"), "<p>World</p>").unwrap();

        let post = read_post(&db, &id).unwrap().unwrap();
        assert_eq!(post.content, "<p>World</p>");
        assert_eq!(post.metadata.slug, "hello-world");
        assert_eq!(find_post_id_by_slug(&db, "hello-world").unwrap(), Some(id));
    }

    #[test]
    fn duplicate_slug_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);

        create_post(&db, &metadata("same"), "a").unwrap();
        let err = create_post(&db, &metadata("same"), "b").unwrap_err();
        assert!(matches!(err, DbError::SlugTaken(_)));
    }

    #[test]
    fn unknown_or_malformed_ids_read_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);

        assert!(read_post(&db, "not-a-uuid").unwrap().is_none());
        assert!(read_post(&db, &Uuid::new_v4().to_string()).unwrap().is_none());
        assert!(find_post_id_by_slug(&db, "").unwrap().is_none());
    }
}
