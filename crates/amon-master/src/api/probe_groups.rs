use crate::api::{parse_uuid, require_user, ApiError};
use crate::model::probe_group::ProbeGroupInput;
use crate::state::AppState;
use amon_common::error::MasterError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

fn parse_input(body: Value) -> Result<ProbeGroupInput, ApiError> {
    serde_json::from_value(body)
        .map_err(|e| ApiError(MasterError::invalid(format!("invalid probe group: {e}"))))
}

/// 列出用户的所有探针组。
#[utoipa::path(
    get,
    path = "/pub/{user}/probegroups",
    tag = "ProbeGroups",
    params(("user" = String, Path, description = "用户 UUID 或登录名")),
    responses(
        (status = 200, description = "探针组列表", body = Vec<serde_json::Value>),
        (status = 404, description = "用户不存在", body = crate::api::ErrorBody)
    )
)]
async fn list_probe_groups(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Response, ApiError> {
    let user = require_user(&state, &user).await?;
    let groups = state.groups.list(user.uuid).await?;
    let body: Vec<Value> = groups.iter().map(|g| g.to_json()).collect();
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// 创建探针组（服务端分配 UUID）。
#[utoipa::path(
    post,
    path = "/pub/{user}/probegroups",
    tag = "ProbeGroups",
    params(("user" = String, Path, description = "用户 UUID 或登录名")),
    request_body = serde_json::Value,
    responses(
        (status = 201, description = "探针组已创建", body = serde_json::Value),
        (status = 409, description = "参数缺失或非法", body = crate::api::ErrorBody)
    )
)]
async fn create_probe_group(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let user = require_user(&state, &user).await?;
    let input = parse_input(body)?;
    let group = state.groups.put(user.uuid, Uuid::new_v4(), input).await?;
    Ok((StatusCode::CREATED, Json(group.to_json())).into_response())
}

/// 读取单个探针组。
#[utoipa::path(
    get,
    path = "/pub/{user}/probegroups/{uuid}",
    tag = "ProbeGroups",
    params(
        ("user" = String, Path, description = "用户 UUID 或登录名"),
        ("uuid" = String, Path, description = "探针组 UUID")
    ),
    responses(
        (status = 200, description = "探针组", body = serde_json::Value),
        (status = 404, description = "不存在", body = crate::api::ErrorBody)
    )
)]
async fn get_probe_group(
    State(state): State<AppState>,
    Path((user, uuid)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let user = require_user(&state, &user).await?;
    let uuid = parse_uuid("probe group", &uuid)?;
    match state.groups.get(user.uuid, uuid).await? {
        Some(group) => Ok((StatusCode::OK, Json(group.to_json())).into_response()),
        None => Err(ApiError(MasterError::ResourceNotFound(format!(
            "probe group {uuid} not found"
        )))),
    }
}

/// 创建或替换指定 UUID 的探针组。
#[utoipa::path(
    put,
    path = "/pub/{user}/probegroups/{uuid}",
    tag = "ProbeGroups",
    params(
        ("user" = String, Path, description = "用户 UUID 或登录名"),
        ("uuid" = String, Path, description = "探针组 UUID")
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "探针组已写入", body = serde_json::Value),
        (status = 409, description = "参数缺失或非法", body = crate::api::ErrorBody)
    )
)]
async fn put_probe_group(
    State(state): State<AppState>,
    Path((user, uuid)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let user = require_user(&state, &user).await?;
    let uuid = parse_uuid("probe group", &uuid)?;
    let input = parse_input(body)?;
    let group = state.groups.put(user.uuid, uuid, input).await?;
    Ok((StatusCode::OK, Json(group.to_json())).into_response())
}

/// 删除探针组。
#[utoipa::path(
    delete,
    path = "/pub/{user}/probegroups/{uuid}",
    tag = "ProbeGroups",
    params(
        ("user" = String, Path, description = "用户 UUID 或登录名"),
        ("uuid" = String, Path, description = "探针组 UUID")
    ),
    responses(
        (status = 204, description = "已删除"),
        (status = 404, description = "不存在", body = crate::api::ErrorBody)
    )
)]
async fn delete_probe_group(
    State(state): State<AppState>,
    Path((user, uuid)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let user = require_user(&state, &user).await?;
    let uuid = parse_uuid("probe group", &uuid)?;
    state.groups.delete(user.uuid, uuid).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_probe_groups, create_probe_group))
        .routes(routes!(get_probe_group, put_probe_group, delete_probe_group))
}
