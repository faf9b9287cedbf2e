//! SQLite-based catalog store implementation.
//!
//! One connection behind a mutex, acquired per logical operation. Upsert
//! correctness under concurrent writers relies on the UNIQUE constraint on
//! the path column.

use super::{CatalogItem, CatalogStore, TagFields};
use crate::error::{LydtagError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS songs (
        id TEXT PRIMARY KEY,
        path TEXT NOT NULL UNIQUE,
        filename TEXT NOT NULL,
        title TEXT,
        artist TEXT,
        album TEXT,
        genre TEXT,
        year TEXT,
        comment TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_songs_filename ON songs(filename);
"#;

/// SQLite-based catalog store.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Open (or create) the catalog database at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL mode: the watcher and the API server write and read the same
        // file from separate processes.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Opened catalog store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory catalog (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LydtagError::Catalog(format!("Failed to acquire lock: {}", e)))
    }

    fn row_to_item(row: &Row<'_>) -> rusqlite::Result<CatalogItem> {
        let id_str: String = row.get(0)?;
        let created_str: String = row.get(9)?;
        let updated_str: String = row.get(10)?;

        Ok(CatalogItem {
            id: Uuid::parse_str(&id_str).unwrap_or_default(),
            path: row.get(1)?,
            filename: row.get(2)?,
            fields: TagFields {
                title: row.get(3)?,
                artist: row.get(4)?,
                album: row.get(5)?,
                genre: row.get(6)?,
                year: row.get(7)?,
                comment: row.get(8)?,
            },
            created_at: parse_timestamp(&created_str),
            updated_at: parse_timestamp(&updated_str),
        })
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

const SELECT_COLUMNS: &str =
    "id, path, filename, title, artist, album, genre, year, comment, created_at, updated_at";

#[async_trait]
impl CatalogStore for SqliteCatalog {
    #[instrument(skip(self, fields), fields(path = %path))]
    async fn upsert(&self, path: &str, filename: &str, fields: &TagFields) -> Result<CatalogItem> {
        let conn = self.lock()?;
        let now = Utc::now();

        let tx = conn.unchecked_transaction()?;

        let existing: Option<(String, String)> = tx
            .query_row(
                "SELECT id, created_at FROM songs WHERE path = ?1",
                params![path],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        let item = match existing {
            Some((id, created_at)) => {
                tx.execute(
                    r#"
                    UPDATE songs
                    SET filename = ?2, title = ?3, artist = ?4, album = ?5,
                        genre = ?6, year = ?7, comment = ?8, updated_at = ?9
                    WHERE path = ?1
                    "#,
                    params![
                        path,
                        filename,
                        fields.title,
                        fields.artist,
                        fields.album,
                        fields.genre,
                        fields.year,
                        fields.comment,
                        now.to_rfc3339(),
                    ],
                )?;

                CatalogItem {
                    id: Uuid::parse_str(&id).unwrap_or_default(),
                    path: path.to_string(),
                    filename: filename.to_string(),
                    fields: fields.clone(),
                    created_at: parse_timestamp(&created_at),
                    updated_at: now,
                }
            }
            None => {
                let id = Uuid::new_v4();
                tx.execute(
                    r#"
                    INSERT INTO songs
                    (id, path, filename, title, artist, album, genre, year, comment,
                     created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                    "#,
                    params![
                        id.to_string(),
                        path,
                        filename,
                        fields.title,
                        fields.artist,
                        fields.album,
                        fields.genre,
                        fields.year,
                        fields.comment,
                        now.to_rfc3339(),
                        now.to_rfc3339(),
                    ],
                )?;

                CatalogItem {
                    id,
                    path: path.to_string(),
                    filename: filename.to_string(),
                    fields: fields.clone(),
                    created_at: now,
                    updated_at: now,
                }
            }
        };

        tx.commit()?;

        debug!("Upserted catalog item {}", item.id);
        Ok(item)
    }

    #[instrument(skip(self))]
    async fn get_by_path(&self, path: &str) -> Result<Option<CatalogItem>> {
        let conn = self.lock()?;

        let result = conn.query_row(
            &format!("SELECT {} FROM songs WHERE path = ?1", SELECT_COLUMNS),
            params![path],
            Self::row_to_item,
        );

        match result {
            Ok(item) => Ok(Some(item)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<CatalogItem>> {
        let conn = self.lock()?;

        let mut stmt =
            conn.prepare(&format!("SELECT {} FROM songs ORDER BY rowid", SELECT_COLUMNS))?;

        let items = stmt.query_map([], Self::row_to_item)?;
        let result: Vec<CatalogItem> = items.filter_map(|i| i.ok()).collect();

        debug!("Listed {} catalog items", result.len());
        Ok(result)
    }

    async fn count(&self) -> Result<usize> {
        let conn = self.lock()?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM songs", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
