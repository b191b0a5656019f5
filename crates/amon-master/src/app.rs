use crate::state::AppState;
use crate::{api, logging, middleware};
use axum::middleware as axum_middleware;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Amon Master API",
        description = "监控系统 master 节点 REST API",
    ),
    tags(
        (name = "System", description = "服务健康检查"),
        (name = "Users", description = "用户资料（只读）"),
        (name = "Probes", description = "探针管理"),
        (name = "ProbeGroups", description = "探针组管理"),
        (name = "Maintenances", description = "维护窗口管理"),
        (name = "Events", description = "事件接收与路由"),
        (name = "AgentProbes", description = "面向 relay/agent 的探针清单")
    )
)]
struct ApiDoc;

pub fn build_http_app(state: AppState) -> Router {
    let (router, api_spec) = api::routes().split_for_parts();

    let mut spec = ApiDoc::openapi();
    spec.merge(api_spec);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .layer(axum_middleware::from_fn(middleware::api_version_middleware))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", spec))
        .layer(cors)
        .layer(axum_middleware::from_fn(logging::request_logging))
}
