use crate::api::require_user;
use crate::api::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use utoipa_axum::{router::OpenApiRouter, routes};

/// 用户公开资料。`{user}` 可以是 UUID 或登录名。
#[utoipa::path(
    get,
    path = "/pub/{user}",
    tag = "Users",
    params(
        ("user" = String, Path, description = "用户 UUID 或登录名")
    ),
    responses(
        (status = 200, description = "用户资料", body = serde_json::Value),
        (status = 404, description = "用户不存在", body = crate::api::ErrorBody)
    )
)]
async fn get_user(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Response, ApiError> {
    let user = require_user(&state, &user).await?;
    Ok((StatusCode::OK, Json(user.public_json())).into_response())
}

pub(crate) fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(get_user))
}
