//! Handlers for the rollback path: batch lookup and rollback execution.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use repricer_db::LedgerEntryRow;
use repricer_engine::RollbackRequest;

use crate::middleware::RequestId;

use super::{engine_error_response, AppState};

#[derive(Debug, Deserialize)]
pub(crate) struct BatchInfoRequest {
    shop: Option<String>,
    price_updation_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchInfoResponse {
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    batch: Option<LedgerEntryRow>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RollbackDiscountRequest {
    shop: Option<String>,
    price_updation_name: Option<String>,
}

/// POST /get-batch-info — fetch one ledger row describing a named batch.
pub(crate) async fn get_batch_info(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<BatchInfoRequest>,
) -> Response {
    let (Some(shop), Some(batch_name)) = (body.shop, body.price_updation_name) else {
        return (
            StatusCode::NOT_FOUND,
            Json(BatchInfoResponse {
                exists: false,
                batch: None,
            }),
        )
            .into_response();
    };

    match repricer_db::find_batch_entry(&state.pool, &shop, &batch_name).await {
        Ok(Some(row)) => Json(BatchInfoResponse {
            exists: true,
            batch: Some(row),
        })
        .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(BatchInfoResponse {
                exists: false,
                batch: None,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(request_id = %req_id.0, error = %e, "batch info lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server error while fetching batch info.".to_owned(),
            )
                .into_response()
        }
    }
}

/// POST /rollback-discount — restore a batch's original prices and purge it.
pub(crate) async fn rollback_discount(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<RollbackDiscountRequest>,
) -> Response {
    let request = RollbackRequest {
        shop: body.shop,
        batch_name: body.price_updation_name,
    };

    match state.engine.rollback_batch(request).await {
        Ok(outcome) => {
            tracing::info!(
                request_id = %req_id.0,
                products = outcome.products_restored,
                variants = outcome.variants_restored,
                "rollback finished"
            );
            (StatusCode::OK, "Rollback completed successfully.".to_owned()).into_response()
        }
        Err(e) => engine_error_response(&req_id.0, &e).into_response(),
    }
}
