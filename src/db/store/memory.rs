use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RequestStore, StoreError, StoreResult};
use crate::db::models::clearance::ClearanceRequest;

/// Volatile store, mainly for tests and demos.
#[derive(Debug, Default)]
pub struct MemoryStore {
    requests: RwLock<Vec<ClearanceRequest>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn list(&self) -> StoreResult<Vec<ClearanceRequest>> {
        Ok(self.requests.read().await.clone())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<ClearanceRequest>> {
        Ok(self.requests.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn insert(&self, request: &ClearanceRequest) -> StoreResult<()> {
        let mut requests = self.requests.write().await;
        if requests.iter().any(|r| r.id == request.id) {
            return Err(StoreError::Duplicate(request.id));
        }
        requests.push(request.clone());
        Ok(())
    }

    async fn replace(&self, request: &ClearanceRequest) -> StoreResult<()> {
        let mut requests = self.requests.write().await;
        let slot = requests
            .iter_mut()
            .find(|r| r.id == request.id)
            .ok_or(StoreError::Missing(request.id))?;
        *slot = request.clone();
        Ok(())
    }
}
