//! The `/v1/resource` application served by the `quota-server` binary.
//!
//! Every answer, including rejections, is wrapped in an [`ApiResponse`].

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use quota_bucket::Admission;
use serde::Deserialize;
use serde::Serialize;
use tower::BoxError;
use tower::ServiceBuilder;
use tracing::error;

use crate::ConnectInfoKey;
use crate::QuotaError;
use crate::ServiceBuilderExt;

pub const RESOURCE_PATH: &str = "/v1/resource";

const RESOURCE: &str = "You will get resource";
const METHOD_NOT_ALLOWED: &str = "Only `GET` method is supported";
const INTERNAL_ERROR: &str = "Internal Service Error";

/// JSON envelope for every response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn ok(data: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data.into()),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

async fn resource() -> Json<ApiResponse> {
    Json(ApiResponse::ok(RESOURCE))
}

async fn method_not_allowed() -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ApiResponse::error(METHOD_NOT_ALLOWED)),
    )
}

/// Turns errors from the quota stack into JSON responses.
///
/// Rejections become `429` and keep their `Retry-After` and
/// `X-RateLimit-Limit` headers. Anything else is a `500`.
pub async fn handle_quota_error(err: BoxError) -> Response {
    match err.downcast_ref::<QuotaError>() {
        Some(quota_err @ QuotaError::QuotaExceeded { .. }) => (
            StatusCode::TOO_MANY_REQUESTS,
            quota_err.rate_limit_headers(),
            Json(ApiResponse::error(quota_err.to_string())),
        )
            .into_response(),
        _ => {
            error!(%err, "unhandled service error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(INTERNAL_ERROR)),
            )
                .into_response()
        }
    }
}

/// Builds the application: `GET /v1/resource` behind a per-client quota.
///
/// Other methods on the route get a `405` and are counted against the
/// client's quota like any other request.
pub fn router(admission: Arc<Admission>) -> Router {
    Router::new()
        .route(RESOURCE_PATH, get(resource).fallback(method_not_allowed))
        .layer(
            ServiceBuilder::new()
                // 1. The outermost layer: catches BoxError and returns Response
                .layer(HandleErrorLayer::new(handle_quota_error))
                // 2. The quota check: introduces BoxError
                .quota(admission, ConnectInfoKey)
                // 3. Converts the Route's Infallible to BoxError
                .map_err(BoxError::from),
        )
}
