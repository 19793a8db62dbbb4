//! Collaborator traits: the table backend submissions write to, and the
//! key-value store drafts live in.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::auth::AuthContext;
use crate::error::{BackendError, DatabaseError};

/// Hosted relational-table API, one call per logical entity.
#[async_trait]
pub trait DataBackend: Send + Sync {
    /// Insert a row and return the id the backend generated for it.
    async fn insert(
        &self,
        table: &str,
        row: &Map<String, Value>,
        auth: &AuthContext,
    ) -> Result<String, BackendError>;

    /// Patch an existing row.
    async fn update(
        &self,
        table: &str,
        id: &str,
        patch: &Map<String, Value>,
        auth: &AuthContext,
    ) -> Result<(), BackendError>;
}

/// Durable key-value store for wizard drafts.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Write (or overwrite) the draft under `key`.
    async fn save(&self, key: &str, value: &Value) -> Result<(), DatabaseError>;

    /// Load the draft under `key`, if any.
    async fn load(&self, key: &str) -> Result<Option<Value>, DatabaseError>;

    /// Delete the draft. Returns whether one existed.
    async fn clear(&self, key: &str) -> Result<bool, DatabaseError>;
}
