use crate::state::AppState;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// 健康检查响应
#[derive(Serialize, ToSchema)]
struct Pong {
    ping: String,
    version: String,
}

/// 健康检查。
#[utoipa::path(
    get,
    path = "/ping",
    tag = "System",
    responses(
        (status = 200, description = "服务存活", body = Pong)
    )
)]
async fn ping() -> Json<Pong> {
    Json(Pong {
        ping: "pong".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub(crate) fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(ping))
}
