use axum::body::Body;
use axum::http::{HeaderName, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::ApiError;
use amon_common::error::MasterError;

/// The API version header relays and clients send.
static API_VERSION_HEADER: HeaderName = HeaderName::from_static("x-api-version");

/// Supported major version.
const SUPPORTED_MAJOR: u32 = 1;

/// Middleware that validates the `X-Api-Version` request header.
///
/// An absent header means "current". A present header must carry a
/// `major[.minor[.patch]]` version whose major is supported; anything
/// else is rejected before the handler runs.
pub async fn api_version_middleware(req: Request<Body>, next: Next) -> Response {
    let Some(raw) = req.headers().get(&API_VERSION_HEADER) else {
        return next.run(req).await;
    };

    let version = raw.to_str().unwrap_or("");
    match version.split('.').next().and_then(|m| m.parse::<u32>().ok()) {
        Some(major) if major == SUPPORTED_MAJOR => next.run(req).await,
        _ => {
            tracing::warn!(version = %version, "unsupported api version requested");
            ApiError(MasterError::invalid(format!(
                "unsupported api version \"{version}\" (supported: {SUPPORTED_MAJOR}.x)"
            )))
            .into_response()
        }
    }
}
