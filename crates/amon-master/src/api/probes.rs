use crate::api::{parse_uuid, require_user, ApiError};
use crate::model::probe::ProbeInput;
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
use uuid::Uuid;

#[derive(Deserialize, IntoParams)]
struct WriteParams {
    /// 引导期逃生口：仅当用户为配置的 admin UUID 时生效。
    #[serde(default)]
    skipauthz: bool,
}

fn parse_input(body: Value) -> Result<ProbeInput, ApiError> {
    serde_json::from_value(body)
        .map_err(|e| ApiError(MasterError::invalid(format!("invalid probe: {e}"))))
}

/// 列出用户的所有探针。
#[utoipa::path(
    get,
    path = "/pub/{user}/probes",
    tag = "Probes",
    params(("user" = String, Path, description = "用户 UUID 或登录名")),
    responses(
        (status = 200, description = "探针列表", body = Vec<serde_json::Value>),
        (status = 404, description = "用户不存在", body = crate::api::ErrorBody)
    )
)]
async fn list_probes(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Response, ApiError> {
    let user = require_user(&state, &user).await?;
    let probes = state.probes.list(user.uuid).await?;
    let body: Vec<Value> = probes.iter().map(|p| p.public_json()).collect();
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// 创建探针（服务端分配 UUID）。
#[utoipa::path(
    post,
    path = "/pub/{user}/probes",
    tag = "Probes",
    params(
        ("user" = String, Path, description = "用户 UUID 或登录名"),
        WriteParams
    ),
    request_body = serde_json::Value,
    responses(
        (status = 201, description = "探针已创建", body = serde_json::Value),
        (status = 404, description = "用户不存在", body = crate::api::ErrorBody),
        (status = 409, description = "参数缺失或非法", body = crate::api::ErrorBody)
    )
)]
async fn create_probe(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Query(params): Query<WriteParams>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let user = require_user(&state, &user).await?;
    let input = parse_input(body)?;
    let probe = state
        .probes
        .put(&user, Uuid::new_v4(), input, params.skipauthz)
        .await?;
    Ok((StatusCode::CREATED, Json(probe.public_json())).into_response())
}

/// 读取单个探针。
#[utoipa::path(
    get,
    path = "/pub/{user}/probes/{uuid}",
    tag = "Probes",
    params(
        ("user" = String, Path, description = "用户 UUID 或登录名"),
        ("uuid" = String, Path, description = "探针 UUID")
    ),
    responses(
        (status = 200, description = "探针", body = serde_json::Value),
        (status = 404, description = "不存在", body = crate::api::ErrorBody)
    )
)]
async fn get_probe(
    State(state): State<AppState>,
    Path((user, uuid)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let user = require_user(&state, &user).await?;
    let uuid = parse_uuid("probe", &uuid)?;
    match state.probes.get(user.uuid, uuid).await? {
        Some(probe) => Ok((StatusCode::OK, Json(probe.public_json())).into_response()),
        None => Err(ApiError(MasterError::ResourceNotFound(format!(
            "probe {uuid} not found"
        )))),
    }
}

/// 创建或替换指定 UUID 的探针。
#[utoipa::path(
    put,
    path = "/pub/{user}/probes/{uuid}",
    tag = "Probes",
    params(
        ("user" = String, Path, description = "用户 UUID 或登录名"),
        ("uuid" = String, Path, description = "探针 UUID"),
        WriteParams
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "探针已写入", body = serde_json::Value),
        (status = 409, description = "参数缺失或非法", body = crate::api::ErrorBody)
    )
)]
async fn put_probe(
    State(state): State<AppState>,
    Path((user, uuid)): Path<(String, String)>,
    Query(params): Query<WriteParams>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let user = require_user(&state, &user).await?;
    let uuid = parse_uuid("probe", &uuid)?;
    let input = parse_input(body)?;
    let probe = state
        .probes
        .put(&user, uuid, input, params.skipauthz)
        .await?;
    Ok((StatusCode::OK, Json(probe.public_json())).into_response())
}

/// 删除探针（所有者或 operator）。
#[utoipa::path(
    delete,
    path = "/pub/{user}/probes/{uuid}",
    tag = "Probes",
    params(
        ("user" = String, Path, description = "用户 UUID 或登录名"),
        ("uuid" = String, Path, description = "探针 UUID")
    ),
    responses(
        (status = 204, description = "已删除"),
        (status = 404, description = "不存在", body = crate::api::ErrorBody)
    )
)]
async fn delete_probe(
    State(state): State<AppState>,
    Path((user, uuid)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let user = require_user(&state, &user).await?;
    let uuid = parse_uuid("probe", &uuid)?;
    state.probes.delete(&user, user.uuid, uuid).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_probes, create_probe))
        .routes(routes!(get_probe, put_probe, delete_probe))
}
