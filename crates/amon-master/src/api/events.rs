use crate::api::ApiError;
use crate::state::AppState;
use amon_common::error::MasterError;
use amon_common::types::Event;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use utoipa_axum::{router::OpenApiRouter, routes};

/// 接收 relay 上报的事件（单个对象或数组）。
///
/// 事件彼此独立处理；全部成功返回 202，否则返回聚合错误
/// （单个错误原样返回，多个错误包装为 MultiError）。
#[utoipa::path(
    post,
    path = "/events",
    tag = "Events",
    request_body = serde_json::Value,
    responses(
        (status = 202, description = "全部事件已接受"),
        (status = 404, description = "探针或用户不存在", body = crate::api::ErrorBody),
        (status = 409, description = "事件校验失败", body = crate::api::ErrorBody),
        (status = 500, description = "处理失败", body = crate::api::ErrorBody)
    )
)]
async fn post_events(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let events: Vec<Event> = match body {
        Value::Array(_) => serde_json::from_value(body)
            .map_err(|e| ApiError(MasterError::invalid(format!("invalid events: {e}"))))?,
        other => vec![serde_json::from_value(other)
            .map_err(|e| ApiError(MasterError::invalid(format!("invalid event: {e}"))))?],
    };

    if events.is_empty() {
        return Err(ApiError(MasterError::missing("events")));
    }

    state.router.route(&events).await?;
    Ok(StatusCode::ACCEPTED.into_response())
}

pub(crate) fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(post_events))
}
