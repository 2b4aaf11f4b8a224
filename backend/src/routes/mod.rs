// backend/src/routes/mod.rs

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::error::CoreError;
use crate::models::Role;
use crate::scope::{Caller, ScopeResolver};
use crate::AppState;

pub mod agents;
pub mod areas;
pub mod bonus;
pub mod health;
pub mod planner;
pub mod reports;
pub mod schedule;

pub const CALLER_HEADER: &str = "x-agent-id";

/// Core errors as HTTP responses: status from the error kind, body is the
/// `{kind, message, details?}` envelope.
#[derive(Debug)]
pub struct ApiError(pub CoreError);

pub type ApiResult<T> = Result<Json<T>, ApiError>;

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        Self(e)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        Self(CoreError::from(e))
    }
}

pub fn status_of(e: &CoreError) -> StatusCode {
    match e {
        CoreError::InvalidFilter(_) | CoreError::InvalidAssignment { .. } => StatusCode::BAD_REQUEST,
        CoreError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Conflict(_) => StatusCode::CONFLICT,
        CoreError::Invariant(_) => StatusCode::INTERNAL_SERVER_ERROR,
        CoreError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_of(&self.0);
        if status.is_server_error() {
            error!(kind = self.0.kind(), "{}", self.0);
        }
        (status, Json(self.0.envelope())).into_response()
    }
}

/// The calling agent, identified by the `x-agent-id` header and loaded with
/// its role assignments.
pub struct AuthCaller(pub Caller);

#[async_trait]
impl FromRequestParts<AppState> for AuthCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(CALLER_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or_else(|| CoreError::denied(format!("missing or malformed {CALLER_HEADER} header")))?;
        let caller = ScopeResolver::new(state.store.as_ref()).load_caller(id).await?;
        Ok(Self(caller))
    }
}

/// Ingestion endpoints are reserved to administrators.
pub fn require_admin(caller: &Caller) -> Result<(), ApiError> {
    if caller.role() == Role::Administrator {
        Ok(())
    } else {
        Err(CoreError::denied("administrator role required").into())
    }
}

/// Agents may act on their own records; jefatura or above on anyone's.
pub fn require_self_or_jefatura(caller: &Caller, agent_id: i64) -> Result<(), ApiError> {
    if agent_id == caller.id() || caller.role() >= Role::Jefatura {
        Ok(())
    } else {
        Err(CoreError::denied(format!("agent {agent_id} is outside the caller's scope")).into())
    }
}
