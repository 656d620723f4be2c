//! Update-plan construction.
//!
//! Turns raw bulk-read records (or ledger rows on rollback) into per-product
//! groups of variant price changes. Grouping is always by the variant's
//! owning product because the remote mutation updates one product's variants
//! per call. All arithmetic is `Decimal`; prices round to two places,
//! half-up.

use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};

use repricer_shopify::VariantRecord;

use crate::error::EngineError;

/// One variant's planned price change.
#[derive(Debug, Clone)]
pub struct PlannedVariant {
    pub variant_id: String,
    /// The price the mutation will set.
    pub price: Decimal,
    /// `Some` to advertise the pre-discount price, `None` to clear it.
    pub compare_at_price: Option<Decimal>,
    /// The recorded pre-change price, kept for ledger writes.
    pub original_price: Decimal,
}

/// Variant price changes grouped by owning product.
///
/// `BTreeMap` keeps product order deterministic, which makes the serial
/// apply loop and its logs reproducible.
#[derive(Debug, Clone, Default)]
pub struct UpdatePlan {
    pub products: BTreeMap<String, Vec<PlannedVariant>>,
}

impl UpdatePlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    #[must_use]
    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    #[must_use]
    pub fn variant_count(&self) -> usize {
        self.products.values().map(Vec::len).sum()
    }
}

/// A ledger row resolved to its current owning product, ready for restore
/// planning.
#[derive(Debug, Clone)]
pub struct RestoreRecord {
    pub product_id: String,
    pub variant_id: String,
    pub original_price: Decimal,
}

fn round_price(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Builds the discount plan: for each variant,
/// `price = round(original × (1 − p/100), 2)` and the compare-at price is
/// the original, rounded to two places.
///
/// # Errors
///
/// Returns [`EngineError::EmptyPlan`] if no records survive — the caller
/// must surface this, not report success.
pub fn build_discount_plan(
    records: &[VariantRecord],
    percentage: Decimal,
) -> Result<UpdatePlan, EngineError> {
    let factor = (Decimal::ONE_HUNDRED - percentage) / Decimal::ONE_HUNDRED;

    let mut plan = UpdatePlan::default();
    for record in records {
        let original = round_price(record.price);
        plan.products
            .entry(record.product_id.clone())
            .or_default()
            .push(PlannedVariant {
                variant_id: record.variant_id.clone(),
                price: round_price(record.price * factor),
                compare_at_price: Some(original),
                original_price: original,
            });
    }

    if plan.is_empty() {
        return Err(EngineError::EmptyPlan);
    }
    Ok(plan)
}

/// Builds the restore plan: each variant goes back to its recorded original
/// price and the compare-at price is explicitly cleared.
///
/// # Errors
///
/// Returns [`EngineError::EmptyPlan`] if no records survive parent
/// resolution.
pub fn build_restore_plan(records: &[RestoreRecord]) -> Result<UpdatePlan, EngineError> {
    let mut plan = UpdatePlan::default();
    for record in records {
        plan.products
            .entry(record.product_id.clone())
            .or_default()
            .push(PlannedVariant {
                variant_id: record.variant_id.clone(),
                price: record.original_price,
                compare_at_price: None,
                original_price: record.original_price,
            });
    }

    if plan.is_empty() {
        return Err(EngineError::EmptyPlan);
    }
    Ok(plan)
}
