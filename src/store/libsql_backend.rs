//! libSQL store: wizard drafts plus an offline table backend.
//!
//! Drafts live in `drafts(key, value)`. In offline mode every logical table
//! shares one `records` table; rows are stored as JSON and get UUID ids.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::{BackendError, DatabaseError};
use crate::store::migrations;
use crate::store::traits::{DataBackend, DraftStore};

/// libSQL-backed store.
///
/// `libsql::Connection` is `Send + Sync`, so one connection serves all calls.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db)?;
        migrations::run_migrations(store.conn()).await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let store = Self::from_database(db)?;
        migrations::run_migrations(store.conn()).await?;
        Ok(store)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Fetch an offline record's JSON by table and id.
    pub async fn get_record(&self, table: &str, id: &str) -> Result<Option<Value>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT data FROM records WHERE table_name = ?1 AND id = ?2",
                params![table, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_record: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let data: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("get_record: {e}")))?;
                let value = serde_json::from_str(&data)
                    .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_record: {e}"))),
        }
    }

    /// Number of offline records in a logical table.
    pub async fn count_records(&self, table: &str) -> Result<usize, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM records WHERE table_name = ?1",
                params![table],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("count_records: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).unwrap_or(0) as usize),
            _ => Ok(0),
        }
    }
}

// ── Drafts ──────────────────────────────────────────────────────────

#[async_trait]
impl DraftStore for LibSqlStore {
    async fn save(&self, key: &str, value: &Value) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let value_str =
            serde_json::to_string(value).map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                "INSERT INTO drafts (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (key) DO UPDATE SET value = ?2, updated_at = ?3",
                params![key, value_str, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_draft: {e}")))?;

        debug!(key, "Draft row written");
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Value>, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT value FROM drafts WHERE key = ?1", params![key])
            .await
            .map_err(|e| DatabaseError::Query(format!("load_draft: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let value_str: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("load_draft: {e}")))?;
                let value = serde_json::from_str(&value_str)
                    .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("load_draft: {e}"))),
        }
    }

    async fn clear(&self, key: &str) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute("DELETE FROM drafts WHERE key = ?1", params![key])
            .await
            .map_err(|e| DatabaseError::Query(format!("clear_draft: {e}")))?;
        Ok(count > 0)
    }
}

// ── Offline records ─────────────────────────────────────────────────

#[async_trait]
impl DataBackend for LibSqlStore {
    async fn insert(
        &self,
        table: &str,
        row: &Map<String, Value>,
        auth: &AuthContext,
    ) -> Result<String, BackendError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let created_by = auth.user_id().map(str::to_string);

        let mut data = row.clone();
        data.insert("id".to_string(), Value::String(id.clone()));
        let data_str = serde_json::to_string(&data)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                "INSERT INTO records (id, table_name, data, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![id.as_str(), table, data_str, created_by, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_record: {e}")))?;

        Ok(id)
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        patch: &Map<String, Value>,
        _auth: &AuthContext,
    ) -> Result<(), BackendError> {
        let Some(Value::Object(mut data)) = self.get_record(table, id).await? else {
            return Err(BackendError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            });
        };
        for (key, value) in patch {
            data.insert(key.clone(), value.clone());
        }
        let data_str = serde_json::to_string(&data)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                "UPDATE records SET data = ?1, updated_at = ?2 WHERE table_name = ?3 AND id = ?4",
                params![data_str, Utc::now().to_rfc3339(), table, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_record: {e}")))?;
        Ok(())
    }
}
