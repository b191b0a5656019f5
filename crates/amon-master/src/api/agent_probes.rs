use crate::api::ApiError;
use crate::model::AgentManifest;
use crate::state::AppState;
use amon_common::error::MasterError;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use utoipa::IntoParams;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

#[derive(Deserialize, IntoParams)]
struct AgentProbesParams {
    /// 目标 agent 的 UUID。
    agent: Option<String>,
}

/// 按 agent 下发探针清单（内部序列化，含 runInVmHost）。
///
/// 响应带内容摘要 `Etag`；relay 用 HEAD 轮询摘要，变化时才 GET。
/// 清单按 agent UUID 缓存，相关探针的任何写入都会使其失效。
#[utoipa::path(
    get,
    path = "/agentprobes",
    tag = "AgentProbes",
    params(AgentProbesParams),
    responses(
        (status = 200, description = "探针清单", body = Vec<serde_json::Value>),
        (status = 409, description = "缺少或非法的 agent 参数", body = crate::api::ErrorBody)
    )
)]
async fn get_agent_probes(
    State(state): State<AppState>,
    Query(params): Query<AgentProbesParams>,
) -> Result<Response, ApiError> {
    let raw = params
        .agent
        .ok_or_else(|| ApiError(MasterError::missing("agent")))?;
    let agent = Uuid::parse_str(&raw)
        .map_err(|_| ApiError(MasterError::invalid(format!("invalid agent uuid: \"{raw}\""))))?;

    let cache_key = agent.to_string();
    let manifest = match state.caches.agent_probes.get(&cache_key) {
        Some(manifest) => manifest,
        None => {
            let probes = state.probes.list_by_agent(agent).await?;
            let body_json: Vec<Value> = probes.iter().map(|p| p.internal_json()).collect();
            let body = serde_json::to_string(&body_json)
                .map_err(|e| ApiError(MasterError::internal(e.to_string())))?;
            let digest = hex::encode(Sha256::digest(body.as_bytes()));
            let manifest = AgentManifest { body, digest };
            state.caches.agent_probes.set(&cache_key, manifest.clone());
            manifest
        }
    };

    let mut response = (StatusCode::OK, manifest.body).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    if let Ok(etag) = HeaderValue::from_str(&manifest.digest) {
        response.headers_mut().insert(header::ETAG, etag);
    }
    Ok(response)
}

pub(crate) fn routes() -> OpenApiRouter<AppState> {
    // axum serves HEAD from the GET route, minus the body.
    OpenApiRouter::new().routes(routes!(get_agent_probes))
}
