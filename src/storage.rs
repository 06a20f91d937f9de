//! Persisted image records backed by SQLite.

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
    Row,
};
use tracing::debug;

use crate::error::Result;

/// One stored image URL taken from a note.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRecord {
    /// Row id assigned by the store.
    pub id: i64,
    /// Collection name, without the `画像` suffix.
    pub name: String,
    /// `note1…` identifier of the note the image came from.
    pub note: String,
    /// Image or video URL.
    pub image: String,
    /// `created_at` of the source note.
    pub created_at: i64,
}

/// A record about to be inserted.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub name: String,
    pub note: String,
    pub image: String,
    pub created_at: i64,
}

/// Query shapes the bot needs from its record collection.
///
/// `insert` does not deduplicate; callers check [`RecordStore::exists_for_note`]
/// first. The check and the insert are separate round trips, so two commands
/// racing on the same `(name, note)` can both insert.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Distinct collection names, sorted.
    async fn list_names(&self) -> Result<Vec<String>>;
    /// All records of a collection by ascending id.
    async fn list_by_name(&self, name: &str) -> Result<Vec<ImageRecord>>;
    /// A uniformly chosen record of the collection, if any.
    async fn pick_random(&self, name: &str) -> Result<Option<ImageRecord>>;
    /// Whether any record exists for `(name, note)`.
    async fn exists_for_note(&self, name: &str, note: &str) -> Result<bool>;
    async fn insert(&self, record: &NewImage) -> Result<()>;
    /// Remove every record for `(name, note)`, returning how many were removed.
    async fn delete(&self, name: &str, note: &str) -> Result<u64>;
}

/// [`RecordStore`] over an `images` table in SQLite.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url`, e.g. `sqlite://gazobot.db`.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Ok(Self { pool })
    }

    /// Private in-memory database; a single connection keeps it alive.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Ensure the `images` table and its lookup index exist.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                note TEXT NOT NULL,
                image TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS images_name_note ON images (name, note)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn record_from_row(row: SqliteRow) -> ImageRecord {
    ImageRecord {
        id: row.get("id"),
        name: row.get("name"),
        note: row.get("note"),
        image: row.get("image"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn list_names(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT name FROM images ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|row| row.get("name")).collect())
    }

    async fn list_by_name(&self, name: &str) -> Result<Vec<ImageRecord>> {
        let rows = sqlx::query("SELECT * FROM images WHERE name = ? ORDER BY id")
            .bind(name)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(record_from_row).collect())
    }

    async fn pick_random(&self, name: &str) -> Result<Option<ImageRecord>> {
        let row = sqlx::query("SELECT * FROM images WHERE name = ? ORDER BY RANDOM() LIMIT 1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(record_from_row))
    }

    async fn exists_for_note(&self, name: &str, note: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM images WHERE name = ? AND note = ? LIMIT 1")
            .bind(name)
            .bind(note)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn insert(&self, record: &NewImage) -> Result<()> {
        sqlx::query("INSERT INTO images (name, note, image, created_at) VALUES (?, ?, ?, ?)")
            .bind(&record.name)
            .bind(&record.note)
            .bind(&record.image)
            .bind(record.created_at)
            .execute(&self.pool)
            .await?;
        debug!(name = %record.name, note = %record.note, image = %record.image, "stored image");
        Ok(())
    }

    async fn delete(&self, name: &str, note: &str) -> Result<u64> {
        let done = sqlx::query("DELETE FROM images WHERE name = ? AND note = ?")
            .bind(name)
            .bind(note)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteStore {
        let store = SqliteStore::in_memory().await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    fn image(name: &str, note: &str, url: &str) -> NewImage {
        NewImage {
            name: name.into(),
            note: note.into(),
            image: url.into(),
            created_at: 1700000000,
        }
    }

    #[tokio::test]
    async fn insert_and_list() {
        let store = store().await;
        store.insert(&image("cat", "note1a", "https://x/1.png")).await.unwrap();
        store.insert(&image("cat", "note1b", "https://x/2.png")).await.unwrap();
        store.insert(&image("dog", "note1c", "https://x/3.png")).await.unwrap();

        assert_eq!(store.list_names().await.unwrap(), vec!["cat", "dog"]);
        let cats = store.list_by_name("cat").await.unwrap();
        assert_eq!(cats.len(), 2);
        assert!(cats[0].id < cats[1].id);
        assert_eq!(cats[0].image, "https://x/1.png");
        assert_eq!(cats[0].created_at, 1700000000);
    }

    #[tokio::test]
    async fn exists_for_note_matches_pair() {
        let store = store().await;
        store.insert(&image("cat", "note1a", "https://x/1.png")).await.unwrap();
        assert!(store.exists_for_note("cat", "note1a").await.unwrap());
        assert!(!store.exists_for_note("dog", "note1a").await.unwrap());
        assert!(!store.exists_for_note("cat", "note1b").await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_all_rows_for_pair() {
        let store = store().await;
        store.insert(&image("cat", "note1a", "https://x/1.png")).await.unwrap();
        store.insert(&image("cat", "note1a", "https://x/2.png")).await.unwrap();
        store.insert(&image("cat", "note1b", "https://x/3.png")).await.unwrap();
        assert_eq!(store.delete("cat", "note1a").await.unwrap(), 2);
        assert_eq!(store.list_by_name("cat").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_without_match_is_ok() {
        let store = store().await;
        assert_eq!(store.delete("cat", "note1zzz").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn pick_random_from_collection() {
        let store = store().await;
        assert!(store.pick_random("cat").await.unwrap().is_none());
        store.insert(&image("cat", "note1a", "https://x/1.png")).await.unwrap();
        store.insert(&image("dog", "note1b", "https://x/2.png")).await.unwrap();
        let picked = store.pick_random("cat").await.unwrap().unwrap();
        assert_eq!(picked.name, "cat");
        assert_eq!(picked.image, "https://x/1.png");
    }

    #[tokio::test]
    async fn migrate_is_repeatable() {
        let store = store().await;
        store.migrate().await.unwrap();
        assert!(store.list_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn connect_creates_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("images.db");
        let store = SqliteStore::connect(&format!("sqlite://{}", path.display()))
            .await
            .unwrap();
        store.migrate().await.unwrap();
        assert!(path.exists());
    }
}
