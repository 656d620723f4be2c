//! Batch discount orchestration.
//!
//! Drives the full discount workflow — validate, guard against duplicate
//! batches, bulk-read the collection, plan the price changes, persist the
//! pre-discount ledger, apply per-product mutations — and the symmetric
//! rollback that restores a named batch from the ledger and purges it.

mod discount;
mod error;
mod plan;
mod rollback;

pub use discount::{DiscountOutcome, DiscountRequest};
pub use error::EngineError;
pub use plan::{
    build_discount_plan, build_restore_plan, PlannedVariant, RestoreRecord, UpdatePlan,
};
pub use rollback::{RollbackOutcome, RollbackRequest};

use repricer_shopify::{PollPolicy, ShopifyClient};
use sqlx::PgPool;

/// The discount/rollback workflow engine: one instance per process, shared
/// across requests.
#[derive(Clone)]
pub struct Engine {
    pub(crate) pool: PgPool,
    pub(crate) shopify: ShopifyClient,
    pub(crate) poll: PollPolicy,
}

impl Engine {
    #[must_use]
    pub fn new(pool: PgPool, shopify: ShopifyClient, poll: PollPolicy) -> Self {
        Self {
            pool,
            shopify,
            poll,
        }
    }
}

/// Pulls a required string field out of a request, treating blank values as
/// missing the way the form UI submits them.
pub(crate) fn required_field(
    value: Option<String>,
    field: &'static str,
) -> Result<String, EngineError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(EngineError::MissingField { field }),
    }
}
