/// Record store abstraction
///
/// Entities are JSON documents addressed by `(collection, id)`. The engine
/// only lists, reads and merges observations into check documents; creation
/// and deletion belong to whoever manages the checks.
pub mod file;

pub use file::FileStore;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Collection holding check documents
pub const CHECKS: &str = "checks";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("Record {collection}/{id} already exists")]
    AlreadyExists { collection: String, id: String },

    #[error("Record {collection}/{id} is not a JSON object")]
    NotAnObject { collection: String, id: String },

    #[error("Invalid record identifier: {0:?}")]
    InvalidId(String),

    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable key-value-per-entity store
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Ids of every record in a collection
    async fn list(&self, collection: &str) -> Result<Vec<String>, StoreError>;

    /// Read one record
    async fn read(&self, collection: &str, id: &str) -> Result<Value, StoreError>;

    /// Create a record, failing if the id is taken
    async fn create(&self, collection: &str, id: &str, document: &Value) -> Result<(), StoreError>;

    /// Overwrite an existing record as a whole
    async fn update(&self, collection: &str, id: &str, document: &Value) -> Result<(), StoreError>;

    /// Set top-level fields of an existing record. Every other field keeps
    /// its currently stored value.
    async fn merge(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), StoreError>;

    /// Delete a record
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}
