mod ai;
mod catalog;
mod sync;

use std::sync::Arc;

use axum::{
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use brewpick_sync::SyncService;

use crate::ark::ArkClient;
use crate::middleware::{request_id, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<SyncService>,
    pub ark: Arc<ArkClient>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-request-id")])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/youzan/products", get(catalog::get_products))
        .route("/api/youzan/sync", post(sync::trigger_sync))
        .route("/api/youzan/sync/status", get(sync::sync_status))
        .route("/api/youzan/sync/events", get(sync::sync_events))
        .route("/api/ai/intro", post(ai::intro))
        .route("/api/ai/pro-intro", post(ai::pro_intro))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(Extension(req_id): Extension<RequestId>) -> impl IntoResponse {
    Json(ApiResponse {
        data: HealthData { status: "ok" },
        meta: ResponseMeta::new(req_id.0),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use axum::Router;
    use brewpick_core::{AiSettings, AppConfig, Environment, SyncSettings, YouzanSettings};
    use tower::ServiceExt;

    use super::{build_app, AppState};
    use crate::ark::ArkClient;
    use brewpick_sync::SyncService;

    pub(crate) fn config(dir: &Path, youzan: YouzanSettings, ai: AiSettings) -> AppConfig {
        AppConfig {
            env: Environment::Test,
            bind_addr: "127.0.0.1:0".parse().expect("bind addr"),
            log_level: "info".to_string(),
            catalog_path: dir.join("data/youzan_local.json"),
            images_dir: dir.join("images"),
            http_timeout_secs: 5,
            user_agent: "brewpick-test/0.1".to_string(),
            sync: SyncSettings {
                backoff_base_ms: 0,
                resolve_links: false,
                ..SyncSettings::default()
            },
            youzan,
            ai,
        }
    }

    pub(crate) fn app(config: &AppConfig) -> Router {
        let sync = SyncService::from_config(config).expect("sync service");
        let ark = ArkClient::new(config.ai.clone(), config.http_timeout_secs).expect("ark client");
        build_app(AppState {
            sync: Arc::new(sync),
            ark: Arc::new(ark),
        })
    }

    pub(crate) async fn send(
        app: Router,
        request: Request<Body>,
    ) -> (axum::http::StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).expect("json body")
        };
        (status, json)
    }

    pub(crate) fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).expect("request")
    }

    pub(crate) fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use brewpick_core::{AiSettings, YouzanSettings};
    use tower::ServiceExt;

    use super::test_support::{app, config, get, send};
    use super::*;

    #[test]
    fn api_error_validation_error_maps_to_bad_request() {
        let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn api_error_bad_request_maps_to_bad_request() {
        let response = ApiError::new("req-1", "bad_request", "missing name").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn api_error_unknown_code_maps_to_internal_error() {
        let response = ApiError::new("req-1", "sync_failed", "boom").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn health_returns_ok_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), YouzanSettings::default(), AiSettings::default());

        let (status, json) = send(app(&config), get("/api/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "ok");
        assert!(json["meta"]["request_id"].is_string());
    }

    #[tokio::test]
    async fn incoming_request_id_is_echoed() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), YouzanSettings::default(), AiSettings::default());

        let request = axum::http::Request::builder()
            .uri("/api/health")
            .header("x-request-id", "req-abc")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = app(&config).oneshot(request).await.unwrap();

        assert_eq!(
            response.headers().get("x-request-id").unwrap(),
            "req-abc"
        );
    }
}
