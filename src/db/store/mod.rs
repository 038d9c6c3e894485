//! Persistence adapters for the request collection.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::clearance::ClearanceRequest;

pub mod json_file;
pub mod memory;
pub mod postgres;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("request {0} already exists")]
    Duplicate(Uuid),
    #[error("request {0} does not exist")]
    Missing(Uuid),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Owner of the persisted request collection.
///
/// Implementations keep insertion order. Callers serialize writes; a store
/// does not arbitrate between concurrent read-modify-write cycles.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn list(&self) -> StoreResult<Vec<ClearanceRequest>>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<ClearanceRequest>>;

    async fn insert(&self, request: &ClearanceRequest) -> StoreResult<()>;

    /// Overwrites an existing request.
    async fn replace(&self, request: &ClearanceRequest) -> StoreResult<()>;

    /// Cheap liveness probe used by the readiness check.
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
