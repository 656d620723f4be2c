mod discount;
mod rollback;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::request_id;
use repricer_engine::EngineError;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub engine: repricer_engine::Engine,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

/// Maps an engine failure to the plain-text error contract: client-fixable
/// failures are 400s, an unknown batch is a 404, remote-dependency and store
/// failures are 500s.
pub(crate) fn engine_error_response(request_id: &str, error: &EngineError) -> (StatusCode, String) {
    let status = match error {
        EngineError::MissingField { .. }
        | EngineError::InvalidField { .. }
        | EngineError::DuplicateBatch { .. }
        | EngineError::CredentialMissing { .. }
        | EngineError::EmptyPlan
        | EngineError::MutationRejected { .. } => StatusCode::BAD_REQUEST,
        EngineError::BatchNotFound { .. } => StatusCode::NOT_FOUND,
        EngineError::Bulk(_) | EngineError::Gateway(_) | EngineError::Db(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if status.is_server_error() {
        tracing::error!(request_id = %request_id, error = %error, "request failed");
    } else {
        tracing::warn!(request_id = %request_id, error = %error, "request rejected");
    }
    (status, error.to_string())
}

pub(crate) fn map_db_error(request_id: &str, error: &repricer_db::DbError) -> (StatusCode, String) {
    tracing::error!(request_id = %request_id, error = %error, "database query failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "database query failed".to_owned(),
    )
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/check-existing-batch",
            post(discount::check_existing_batch),
        )
        .route("/apply-discount", post(discount::apply_discount))
        .route("/get-batch-info", post(rollback::get_batch_info))
        .route("/rollback-discount", post(rollback::rollback_discount))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match repricer_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthData {
                status: "ok",
                database: "ok",
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthData {
                    status: "degraded",
                    database: "unavailable",
                }),
            )
        }
    }
}
