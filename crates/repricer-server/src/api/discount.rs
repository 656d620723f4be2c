//! Handlers for the discount path: batch existence check and discount
//! application.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use repricer_engine::DiscountRequest;

use crate::middleware::RequestId;

use super::{engine_error_response, map_db_error, AppState};

#[derive(Debug, Deserialize)]
pub(crate) struct CheckBatchRequest {
    shop: Option<String>,
    collection_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct CheckBatchResponse {
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    percentage: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApplyDiscountRequest {
    shop: Option<String>,
    token: Option<String>,
    collection_id: Option<String>,
    percentage: Option<f64>,
    price_updation_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApplyDiscountResponse {
    message: String,
    discount: f64,
}

/// POST /check-existing-batch — has any batch already touched this
/// collection for this store?
pub(crate) async fn check_existing_batch(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CheckBatchRequest>,
) -> Response {
    let (Some(shop), Some(collection_id)) = (body.shop, body.collection_id) else {
        return Json(CheckBatchResponse {
            exists: false,
            percentage: None,
        })
        .into_response();
    };

    match repricer_db::find_collection_entry(&state.pool, &shop, &collection_id).await {
        Ok(Some(row)) => Json(CheckBatchResponse {
            exists: true,
            percentage: row.percentage.to_f64(),
        })
        .into_response(),
        Ok(None) => Json(CheckBatchResponse {
            exists: false,
            percentage: None,
        })
        .into_response(),
        Err(e) => map_db_error(&req_id.0, &e).into_response(),
    }
}

/// POST /apply-discount — run the full discount workflow.
pub(crate) async fn apply_discount(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<ApplyDiscountRequest>,
) -> Response {
    let request = DiscountRequest {
        shop: body.shop,
        token: body.token,
        collection_id: body.collection_id,
        percentage: body.percentage,
        batch_name: body.price_updation_name,
    };

    match state.engine.apply_discount(request).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(ApplyDiscountResponse {
                message: format!(
                    "Discount applied to {} of {} products.",
                    outcome.products_updated, outcome.products_attempted
                ),
                discount: outcome.percentage.to_f64().unwrap_or_default(),
            }),
        )
            .into_response(),
        Err(e) => engine_error_response(&req_id.0, &e).into_response(),
    }
}
