//! # Document Store
//!
//! A minimal document store on SQLite. Every collection lives in one table:
//!
//! ```text
//! documents(collection TEXT, id TEXT, body TEXT, PRIMARY KEY (collection, id))
//! ```
//!
//! Bodies are JSON objects without the `_id` member. The connection sits
//! behind a mutex and every call runs on tokio's blocking pool.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

const STORE_SCHEMA_VERSION: i32 = 1;

const CREATE_DOCUMENTS: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id         TEXT NOT NULL,
    body       TEXT NOT NULL,
    PRIMARY KEY (collection, id)
)
"#;

const CREATE_METADATA: &str = r#"
CREATE TABLE IF NOT EXISTS store_metadata (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
"#;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unsupported database uri `{0}`, expected sqlite::memory: or sqlite://<path>")]
    UnsupportedUri(String),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("stored document is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("store schema version mismatch: found {found}, expected {expected}")]
    SchemaVersion { found: String, expected: i32 },

    #[error("blocking task failed: {0}")]
    Join(String),
}

/// Where the database lives.
#[derive(Debug, Clone, PartialEq)]
pub enum DbLocation {
    Memory,
    File(PathBuf),
}

impl DbLocation {
    pub fn parse(uri: &str) -> Result<Self, StoreError> {
        if uri == "sqlite::memory:" || uri == "sqlite://:memory:" {
            return Ok(DbLocation::Memory);
        }
        match uri.strip_prefix("sqlite://") {
            Some(path) if !path.is_empty() => Ok(DbLocation::File(PathBuf::from(path))),
            _ => Err(StoreError::UnsupportedUri(uri.to_string())),
        }
    }
}

/// Shared handle to the store. Cloning is cheap.
#[derive(Clone)]
pub struct Database {
    uri: String,
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("uri", &self.uri).finish()
    }
}

impl Database {
    /// Opens the database at `uri` and creates the schema.
    pub async fn connect(uri: &str) -> Result<Self, StoreError> {
        let location = DbLocation::parse(uri)?;
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, StoreError> {
            let conn = match location {
                DbLocation::Memory => Connection::open_in_memory()?,
                DbLocation::File(path) => Connection::open(path)?,
            };
            init_schema(&conn)?;
            Ok(conn)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))??;

        tracing::info!(uri, "database connected");
        Ok(Self {
            uri: uri.to_string(),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn insert(&self, collection: &str, id: &str, body: &Value) -> Result<(), StoreError> {
        let (collection, id, body) = (collection.to_string(), id.to_string(), body.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)",
                params![collection, id, body],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let (collection, id) = (collection.to_string(), id.to_string());
        self.with_conn(move |conn| {
            let body: Option<String> = conn
                .query_row(
                    "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection, id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(body.map(|b| serde_json::from_str(&b)).transpose()?)
        })
        .await
    }

    /// Every document of a collection in insertion order.
    pub async fn all(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let collection = collection.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT id, body FROM documents WHERE collection = ?1 ORDER BY rowid")?;
            let rows = stmt.query_map(params![collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut documents = Vec::new();
            for row in rows {
                let (id, body) = row?;
                documents.push((id, serde_json::from_str(&body)?));
            }
            Ok(documents)
        })
        .await
    }

    /// Replaces a document body. Returns false when the document is missing.
    pub async fn replace(&self, collection: &str, id: &str, body: &Value) -> Result<bool, StoreError> {
        let (collection, id, body) = (collection.to_string(), id.to_string(), body.to_string());
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE documents SET body = ?3 WHERE collection = ?1 AND id = ?2",
                params![collection, id, body],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    pub async fn delete(&self, collection: &str, id: &str) -> Result<usize, StoreError> {
        let (collection, id) = (collection.to_string(), id.to_string());
        self.with_conn(move |conn| {
            Ok(conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )?)
        })
        .await
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch("PRAGMA journal_mode = WAL")?;
    conn.execute_batch("PRAGMA synchronous = NORMAL")?;
    conn.execute_batch(CREATE_DOCUMENTS)?;
    conn.execute_batch(CREATE_METADATA)?;

    let version: Option<String> = conn
        .query_row(
            "SELECT value FROM store_metadata WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match version {
        Some(found) if found != STORE_SCHEMA_VERSION.to_string() => Err(StoreError::SchemaVersion {
            found,
            expected: STORE_SCHEMA_VERSION,
        }),
        Some(_) => Ok(()),
        None => {
            conn.execute(
                "INSERT INTO store_metadata (key, value) VALUES ('schema_version', ?1)",
                [STORE_SCHEMA_VERSION.to_string()],
            )?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_uri() {
        assert_eq!(DbLocation::parse("sqlite::memory:").unwrap(), DbLocation::Memory);
        assert_eq!(
            DbLocation::parse("sqlite://data/app.db").unwrap(),
            DbLocation::File(PathBuf::from("data/app.db"))
        );
        assert!(matches!(
            DbLocation::parse("mongodb://localhost/app"),
            Err(StoreError::UnsupportedUri(_))
        ));
    }

    #[tokio::test]
    async fn test_document_lifecycle() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.insert("car", "1", &json!({ "model": "Volvo" })).await.unwrap();
        db.insert("car", "2", &json!({ "model": "Saab" })).await.unwrap();
        db.insert("owner", "1", &json!({ "name": "Ann" })).await.unwrap();

        assert_eq!(db.all("car").await.unwrap().len(), 2);
        assert_eq!(db.get("car", "1").await.unwrap(), Some(json!({ "model": "Volvo" })));

        assert!(db.replace("car", "1", &json!({ "model": "V70" })).await.unwrap());
        assert!(!db.replace("car", "9", &json!({})).await.unwrap());
        assert_eq!(db.delete("car", "2").await.unwrap(), 1);
        assert_eq!(db.delete("car", "2").await.unwrap(), 0);
        assert_eq!(db.all("car").await.unwrap(), vec![("1".to_string(), json!({ "model": "V70" }))]);
    }

    #[tokio::test]
    async fn test_file_database_survives_reopen() {
        let temp = tempfile::TempDir::new().unwrap();
        let uri = format!("sqlite://{}", temp.path().join("app.db").display());

        let db = Database::connect(&uri).await.unwrap();
        db.insert("car", "1", &json!({ "model": "Volvo" })).await.unwrap();
        drop(db);

        let db = Database::connect(&uri).await.unwrap();
        assert!(db.get("car", "1").await.unwrap().is_some());
    }
}
