use crate::api::{require_user, ApiError};
use crate::maint::MaintenanceInput;
use crate::state::AppState;
use amon_common::error::MasterError;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use utoipa::IntoParams;
use utoipa_axum::{router::OpenApiRouter, routes};

fn parse_input(body: Value) -> Result<MaintenanceInput, ApiError> {
    serde_json::from_value(body)
        .map_err(|e| ApiError(MasterError::invalid(format!("invalid maintenance: {e}"))))
}

fn parse_id(raw: &str) -> Result<u64, ApiError> {
    raw.parse::<u64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| {
            ApiError(MasterError::invalid(format!(
                "invalid maintenance id: \"{raw}\""
            )))
        })
}

/// 列出用户的维护窗口。
#[utoipa::path(
    get,
    path = "/pub/{user}/maintenances",
    tag = "Maintenances",
    params(("user" = String, Path, description = "用户 UUID 或登录名")),
    responses(
        (status = 200, description = "维护窗口列表", body = Vec<serde_json::Value>),
        (status = 404, description = "用户不存在", body = crate::api::ErrorBody)
    )
)]
async fn list_maintenances(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Response, ApiError> {
    let user = require_user(&state, &user).await?;
    let windows = state.maintenance.list(user.uuid).await?;
    let body: Vec<Value> = windows.iter().map(|w| w.to_json()).collect();
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// 创建维护窗口。`start` 默认 "now"；`end` 支持 "Nm"/"Nh"/"Nd"。
#[utoipa::path(
    post,
    path = "/pub/{user}/maintenances",
    tag = "Maintenances",
    params(("user" = String, Path, description = "用户 UUID 或登录名")),
    request_body = serde_json::Value,
    responses(
        (status = 201, description = "维护窗口已创建", body = serde_json::Value),
        (status = 409, description = "参数缺失或非法", body = crate::api::ErrorBody)
    )
)]
async fn create_maintenance(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let user = require_user(&state, &user).await?;
    let input = parse_input(body)?;
    let maint = state.maintenance.create(user.uuid, input).await?;
    Ok((StatusCode::CREATED, Json(maint.to_json())).into_response())
}

/// 读取单个维护窗口。曾经存在但已删除/过期的 id 返回 410。
#[utoipa::path(
    get,
    path = "/pub/{user}/maintenances/{id}",
    tag = "Maintenances",
    params(
        ("user" = String, Path, description = "用户 UUID 或登录名"),
        ("id" = u64, Path, description = "窗口 id")
    ),
    responses(
        (status = 200, description = "维护窗口", body = serde_json::Value),
        (status = 404, description = "从未签发过的 id", body = crate::api::ErrorBody),
        (status = 410, description = "已删除或过期", body = crate::api::ErrorBody)
    )
)]
async fn get_maintenance(
    State(state): State<AppState>,
    Path((user, id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let user = require_user(&state, &user).await?;
    let id = parse_id(&id)?;
    let maint = state.maintenance.get(user.uuid, id).await?;
    Ok((StatusCode::OK, Json(maint.to_json())).into_response())
}

/// 删除维护窗口。
#[utoipa::path(
    delete,
    path = "/pub/{user}/maintenances/{id}",
    tag = "Maintenances",
    params(
        ("user" = String, Path, description = "用户 UUID 或登录名"),
        ("id" = u64, Path, description = "窗口 id")
    ),
    responses(
        (status = 204, description = "已删除"),
        (status = 410, description = "已删除或过期", body = crate::api::ErrorBody)
    )
)]
async fn delete_maintenance(
    State(state): State<AppState>,
    Path((user, id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let user = require_user(&state, &user).await?;
    let id = parse_id(&id)?;
    // Existence check carries the Gone/NotFound distinction.
    state.maintenance.get(user.uuid, id).await?;
    state.maintenance.delete(user.uuid, id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[derive(Deserialize, IntoParams)]
struct FlatListParams {
    /// 发起请求的 operator（UUID 或登录名）。
    user: Option<String>,
}

/// 跨用户列出全部维护窗口（仅 operator）。
#[utoipa::path(
    get,
    path = "/maintenances",
    tag = "Maintenances",
    params(FlatListParams),
    responses(
        (status = 200, description = "全部维护窗口", body = Vec<serde_json::Value>),
        (status = 409, description = "非 operator", body = crate::api::ErrorBody)
    )
)]
async fn list_all_maintenances(
    State(state): State<AppState>,
    Query(params): Query<FlatListParams>,
) -> Result<Response, ApiError> {
    let key = params
        .user
        .ok_or_else(|| ApiError(MasterError::missing("user")))?;
    let actor = require_user(&state, &key).await?;
    if !actor.operator {
        return Err(ApiError(MasterError::invalid(
            "operator access required to list maintenances across users",
        )));
    }

    let windows = state.maintenance.list_all().await?;
    let body: Vec<Value> = windows.iter().map(|w| w.to_json()).collect();
    Ok((StatusCode::OK, Json(body)).into_response())
}

pub(crate) fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_maintenances, create_maintenance))
        .routes(routes!(get_maintenance, delete_maintenance))
        .routes(routes!(list_all_maintenances))
}
