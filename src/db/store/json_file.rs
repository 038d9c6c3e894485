use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{RequestStore, StoreError, StoreResult};
use crate::db::models::clearance::ClearanceRequest;

/// Keeps the whole collection as one JSON array in a single file.
///
/// Every mutation rewrites the full array, through a sibling temp file and a
/// rename so a crash never leaves a half-written collection behind.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    file_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file_lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> StoreResult<Vec<ClearanceRequest>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, requests: &[ClearanceRequest]) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(requests)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Wrote {} requests to {}", requests.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl RequestStore for JsonFileStore {
    async fn list(&self) -> StoreResult<Vec<ClearanceRequest>> {
        let _guard = self.file_lock.lock().await;
        self.read_all().await
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<ClearanceRequest>> {
        let _guard = self.file_lock.lock().await;
        Ok(self.read_all().await?.into_iter().find(|r| r.id == id))
    }

    async fn insert(&self, request: &ClearanceRequest) -> StoreResult<()> {
        let _guard = self.file_lock.lock().await;
        let mut requests = self.read_all().await?;
        if requests.iter().any(|r| r.id == request.id) {
            return Err(StoreError::Duplicate(request.id));
        }
        requests.push(request.clone());
        self.write_all(&requests).await
    }

    async fn replace(&self, request: &ClearanceRequest) -> StoreResult<()> {
        let _guard = self.file_lock.lock().await;
        let mut requests = self.read_all().await?;
        let slot = requests
            .iter_mut()
            .find(|r| r.id == request.id)
            .ok_or(StoreError::Missing(request.id))?;
        *slot = request.clone();
        self.write_all(&requests).await
    }

    async fn ping(&self) -> StoreResult<()> {
        let _guard = self.file_lock.lock().await;
        self.read_all().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::clearance::{ApproverRole, ClearanceType, RequestState};
    use crate::workflow::lifecycle::approve;
    use chrono::Utc;
    use tokio_test::{assert_err, assert_ok};

    fn sample(chain: &[ApproverRole]) -> ClearanceRequest {
        ClearanceRequest {
            id: Uuid::new_v4(),
            clearance_type: ClearanceType::LibraryClearance,
            user_id: "t-7".into(),
            user_name: "Hanna Tesfaye".into(),
            user_program: None,
            submitted_at: Utc::now(),
            state: RequestState::Pending { current: chain[0] },
            approval_chain: chain.to_vec(),
            approvals: Vec::new(),
            documents: vec!["borrowing-history.pdf".into()],
            priority: None,
            reason: None,
        }
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("requests.json"));
        assert!(store.list().await.unwrap().is_empty());
        assert_ok!(store.ping().await);
    }

    #[tokio::test]
    async fn persists_whole_array_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.json");
        let store = JsonFileStore::new(&path);

        let first = sample(&[ApproverRole::Library, ApproverRole::Finance]);
        let second = sample(&[ApproverRole::Library]);
        store.insert(&first).await.unwrap();
        store.insert(&second).await.unwrap();
        assert_err!(store.insert(&first).await);

        let advanced = approve(&first, ApproverRole::Library, None, Utc::now()).unwrap();
        store.replace(&advanced).await.unwrap();

        let reopened = JsonFileStore::new(&path);
        let all = reopened.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], advanced);
        assert_eq!(all[1], second);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[0]["currentApprover"], "Finance");
        assert_eq!(raw[1]["status"], "Pending");
    }

    #[tokio::test]
    async fn replace_of_unknown_request_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("requests.json"));
        let err = store.replace(&sample(&[ApproverRole::Library])).await.unwrap_err();
        assert!(matches!(err, StoreError::Missing(_)));
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.json");
        std::fs::write(&path, r#"[{"id": "not-a-request"}]"#).unwrap();
        let store = JsonFileStore::new(&path);
        assert!(matches!(store.list().await, Err(StoreError::Serialization(_))));
    }
}
