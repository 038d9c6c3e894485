use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{RequestStore, StoreError, StoreResult};
use crate::db::models::clearance::{ClearanceRecord, ClearanceRequest};

/// PostgreSQL-backed store. Each row carries the full JSON record.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects, then applies pending migrations.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(2)
            .idle_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Connected to PostgreSQL and applied migrations");
        Ok(Self::new(pool))
    }

    /// Scalar columns shadowing the JSON body: status and approver as they appear on the wire.
    fn columns(request: &ClearanceRequest) -> StoreResult<(String, String)> {
        let record = serde_json::to_value(ClearanceRecord::from(request.clone()))?;
        let text = |key: &str| {
            record
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        Ok((text("status"), text("currentApprover")))
    }
}

/// A body that no longer decodes is a serialization fault, not a database one.
fn decode_body(body: Value) -> StoreResult<ClearanceRequest> {
    Ok(serde_json::from_value(body)?)
}

#[async_trait]
impl RequestStore for PgStore {
    async fn list(&self) -> StoreResult<Vec<ClearanceRequest>> {
        let rows: Vec<(Json<Value>,)> =
            sqlx::query_as("SELECT body FROM clearance_requests ORDER BY seq")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(|(Json(body),)| decode_body(body)).collect()
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<ClearanceRequest>> {
        let row: Option<(Json<Value>,)> =
            sqlx::query_as("SELECT body FROM clearance_requests WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(Json(body),)| decode_body(body)).transpose()
    }

    async fn insert(&self, request: &ClearanceRequest) -> StoreResult<()> {
        let (status, current_approver) = Self::columns(request)?;
        let result = sqlx::query(
            r#"
            INSERT INTO clearance_requests (id, user_id, status, current_approver, submitted_at, body)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(request.id)
        .bind(&request.user_id)
        .bind(status)
        .bind(current_approver)
        .bind(request.submitted_at)
        .bind(Json(request))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate(request.id));
        }
        Ok(())
    }

    async fn replace(&self, request: &ClearanceRequest) -> StoreResult<()> {
        let (status, current_approver) = Self::columns(request)?;
        let result = sqlx::query(
            r#"
            UPDATE clearance_requests
            SET status = $2, current_approver = $3, body = $4
            WHERE id = $1
            "#,
        )
        .bind(request.id)
        .bind(status)
        .bind(current_approver)
        .bind(Json(request))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing(request.id));
        }
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn corrupt_body_is_a_serialization_error() {
        let err = decode_body(json!({ "id": "not-a-request" })).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[test]
    fn stored_body_decodes() {
        let request = decode_body(json!({
            "id": "7f1c1a7e-52a4-4bd4-9f0e-3f1c2d8b9a10",
            "type": "Library Clearance",
            "userId": "t-7",
            "userName": "Hanna Tesfaye",
            "submittedAt": "2025-05-10T09:30:00Z",
            "status": "Pending",
            "approvalChain": ["Library"],
            "currentApprover": "Library",
            "approvals": []
        }))
        .unwrap();
        assert_eq!(request.user_id, "t-7");
    }
}
