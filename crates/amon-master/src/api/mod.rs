//! The versioned REST surface.
//!
//! Every error body is `{"code": <PascalCaseKind>, "message": <human>}`
//! with the HTTP status derived from the kind ([`MasterError`]).

pub mod agent_probes;
pub mod events;
pub mod maintenances;
pub mod probe_groups;
pub mod probes;
pub mod system;
pub mod users;

use crate::model::user::User;
use crate::state::AppState;
use amon_common::error::MasterError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

/// REST 错误响应
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    /// 错误类别（PascalCase）
    pub code: String,
    /// 错误信息
    pub message: String,
}

/// A [`MasterError`] leaving the process as an HTTP response.
pub struct ApiError(pub MasterError);

impl From<MasterError> for ApiError {
    fn from(err: MasterError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (
            status,
            Json(ErrorBody {
                code: self.0.code().to_string(),
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Resolve the `{user}` path segment or fail the request with 404.
/// Handlers behind this may assume the user exists.
pub(crate) async fn require_user(state: &AppState, key: &str) -> Result<User, ApiError> {
    match state.users.resolve(key).await? {
        Some(user) => Ok(user),
        None => Err(ApiError(MasterError::ResourceNotFound(format!(
            "no such user: \"{key}\""
        )))),
    }
}

pub(crate) fn parse_uuid(what: &str, raw: &str) -> Result<uuid::Uuid, ApiError> {
    uuid::Uuid::parse_str(raw).map_err(|_| {
        ApiError(MasterError::invalid(format!(
            "invalid {what} uuid: \"{raw}\""
        )))
    })
}

/// All endpoint groups, merged.
pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .merge(system::routes())
        .merge(users::routes())
        .merge(probes::routes())
        .merge(probe_groups::routes())
        .merge(maintenances::routes())
        .merge(events::routes())
        .merge(agent_probes::routes())
}
