use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::db::models::clearance::{ApproverRole, Submitter, SubmitterKind};
use crate::utils::api_response::ApiResponse;

/// Account kind issued by the auth service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Teacher,
    Approver,
    Admin,
}

/// JWT Claims used for authentication.
///
/// Tokens are minted by the external auth service with the shared `JWT_SECRET`.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Subject - User ID as String
    pub sub: String,
    /// The username of the authenticated user.
    pub username: String,
    pub role: UserRole,
    /// Office the user signs for; present on approver tokens only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver_role: Option<ApproverRole>,
    /// Study program or department, shown on submitted requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    /// Expiration timestamp (UNIX TIME)
    pub exp: usize,
}

impl Claims {
    /// Identity to record on a submission, if this account may submit.
    pub fn submitter(&self) -> Option<Submitter> {
        let kind = match self.role {
            UserRole::Student => SubmitterKind::Student,
            UserRole::Teacher => SubmitterKind::Teacher,
            UserRole::Approver | UserRole::Admin => return None,
        };
        Some(Submitter {
            user_id: self.sub.clone(),
            user_name: self.username.clone(),
            program: self.program.clone(),
            kind,
        })
    }
}

fn unauthorized(status: StatusCode, message: &str, errors: Option<serde_json::Value>) -> Response {
    ApiResponse::<()>::error(status, message, errors).into_response()
}

/// ✅ **JWT Middleware** (Handles Token Authentication)
pub async fn jwt_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    // Step 1: Extract Authorization header
    let auth_header = req.headers().get("Authorization").ok_or_else(|| {
        tracing::warn!("Missing Authorization header");
        unauthorized(StatusCode::UNAUTHORIZED, "Missing Authorization header", None)
    })?;

    // Step 2: Convert header to string
    let token_str = auth_header.to_str().map_err(|_| {
        tracing::warn!("Invalid Authorization header format");
        unauthorized(StatusCode::BAD_REQUEST, "Invalid Authorization header format", None)
    })?;

    // Step 3: Strip "Bearer " prefix
    let token = token_str.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::warn!("Invalid token format (missing 'Bearer ' prefix)");
        unauthorized(
            StatusCode::BAD_REQUEST,
            "Invalid token format (missing 'Bearer ' prefix)",
            None,
        )
    })?;

    // Step 4: Decode the JWT token
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::warn!("JWT decoding failed: {:?}", e);
        unauthorized(
            StatusCode::UNAUTHORIZED,
            "Invalid token",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    // Step 5: Approver tokens must say which office they sign for
    let claims = token_data.claims;
    if claims.role == UserRole::Approver && claims.approver_role.is_none() {
        tracing::warn!("Approver token for {} carries no approver role", claims.username);
        return Err(unauthorized(
            StatusCode::FORBIDDEN,
            "Approver token carries no approver role",
            None,
        ));
    }

    // Step 6: Insert claims into request extensions
    tracing::debug!("JWT accepted for {} ({:?})", claims.username, claims.role);
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_students_and_teachers_submit() {
        let mut claims = Claims {
            sub: "t-3".into(),
            username: "Selam".into(),
            role: UserRole::Teacher,
            approver_role: None,
            program: Some("Physics".into()),
            exp: 0,
        };
        let submitter = claims.submitter().unwrap();
        assert_eq!(submitter.kind, SubmitterKind::Teacher);
        assert_eq!(submitter.program.as_deref(), Some("Physics"));

        claims.role = UserRole::Admin;
        assert!(claims.submitter().is_none());
    }

    #[test]
    fn claims_wire_format() {
        let claims: Claims = serde_json::from_value(json!({
            "sub": "a-1",
            "username": "librarian",
            "role": "approver",
            "approverRole": "Library",
            "exp": 1_900_000_000u64
        }))
        .unwrap();
        assert_eq!(claims.approver_role, Some(ApproverRole::Library));
        assert!(claims.program.is_none());
    }
}
