//! The discount workflow: bulk-read a collection, record original prices,
//! apply discounted prices product by product.

use rust_decimal::{Decimal, RoundingStrategy};

use repricer_db::{DbError, NewLedgerEntry};
use repricer_shopify::{
    await_completion, parse_jsonl_variants, submit_collection_query, CollectionId, StoreAuth,
    UserError, VariantPriceInput,
};

use crate::error::EngineError;
use crate::plan::build_discount_plan;
use crate::{required_field, Engine};

/// A raw discount request as it arrives over the wire. Field presence is the
/// engine's concern, not the HTTP layer's.
#[derive(Debug, Clone, Default)]
pub struct DiscountRequest {
    pub shop: Option<String>,
    pub token: Option<String>,
    pub collection_id: Option<String>,
    pub percentage: Option<f64>,
    pub batch_name: Option<String>,
}

/// What the discount run accomplished.
#[derive(Debug, Clone)]
pub struct DiscountOutcome {
    pub products_updated: usize,
    pub products_attempted: usize,
    pub variants_planned: usize,
    pub percentage: Decimal,
}

/// The validated, immutable per-request context every stage reads from.
#[derive(Debug)]
struct DiscountContext {
    auth: StoreAuth,
    collection: CollectionId,
    collection_id: String,
    percentage: Decimal,
    batch_name: String,
}

fn validate(request: DiscountRequest) -> Result<DiscountContext, EngineError> {
    let shop = required_field(request.shop, "shop")?;
    let token = required_field(request.token, "token")?;
    let collection_id = required_field(request.collection_id, "collection_id")?;
    let batch_name = required_field(request.batch_name, "price_updation_name")?;

    let collection = CollectionId::parse(&collection_id).ok_or(EngineError::InvalidField {
        field: "collection_id",
        reason: "must be a numeric collection id",
    })?;

    let raw_percentage = request.percentage.ok_or(EngineError::MissingField {
        field: "percentage",
    })?;
    let percentage =
        Decimal::from_f64_retain(raw_percentage).ok_or(EngineError::InvalidField {
            field: "percentage",
            reason: "must be a finite number",
        })?;
    if percentage <= Decimal::ZERO || percentage > Decimal::ONE_HUNDRED {
        return Err(EngineError::InvalidField {
            field: "percentage",
            reason: "must be greater than 0 and at most 100",
        });
    }
    let percentage = percentage.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    Ok(DiscountContext {
        auth: StoreAuth { shop, token },
        collection,
        collection_id,
        percentage,
        batch_name,
    })
}

fn joined_messages(errors: &[UserError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Engine {
    /// Runs the full discount workflow for one request.
    ///
    /// Original prices are written to the ledger before any remote mutation,
    /// so a crash mid-apply leaves the batch rollback-capable. Per-product
    /// mutation failures are tolerated: their ledger rows stay with
    /// `applied = false` and the remaining products proceed.
    ///
    /// # Errors
    ///
    /// See [`EngineError`]; everything up to the ledger write aborts with no
    /// persistent state.
    pub async fn apply_discount(
        &self,
        request: DiscountRequest,
    ) -> Result<DiscountOutcome, EngineError> {
        let ctx = validate(request)?;
        let store = ctx.auth.shop.clone();

        if repricer_db::find_batch_entry(&self.pool, &store, &ctx.batch_name)
            .await?
            .is_some()
        {
            return Err(EngineError::DuplicateBatch {
                batch: ctx.batch_name,
            });
        }

        // First write wins; a later request's token never replaces the
        // stored one, but a mismatch is worth surfacing.
        let inserted =
            repricer_db::insert_credential_if_absent(&self.pool, &store, &ctx.auth.token).await?;
        if !inserted {
            if let Some(existing) = repricer_db::get_credential(&self.pool, &store).await? {
                if existing.access_token != ctx.auth.token {
                    tracing::warn!(
                        store = %store,
                        "supplied token differs from stored credential; keeping the stored one"
                    );
                }
            }
        }

        let handle = submit_collection_query(&self.shopify, &ctx.auth, ctx.collection).await?;
        let outcome = await_completion(&self.shopify, &ctx.auth, &handle, self.poll).await?;

        // A completed job with no result URL means the query matched nothing.
        let records = match outcome.result_url.as_deref() {
            Some(url) => {
                let body = self.shopify.fetch_bulk_result(url).await?;
                parse_jsonl_variants(&body)
            }
            None => Vec::new(),
        };

        let plan = build_discount_plan(&records, ctx.percentage)?;
        tracing::info!(
            store = %store,
            batch = %ctx.batch_name,
            products = plan.product_count(),
            variants = plan.variant_count(),
            "discount plan built"
        );

        let entries: Vec<NewLedgerEntry<'_>> = plan
            .products
            .values()
            .flatten()
            .map(|variant| NewLedgerEntry {
                store_id: &store,
                variant_id: &variant.variant_id,
                original_price: variant.original_price,
                batch_name: &ctx.batch_name,
                collection_id: &ctx.collection_id,
                percentage: ctx.percentage,
            })
            .collect();
        match repricer_db::insert_batch_entries(&self.pool, &entries).await {
            Ok(_) => {}
            Err(DbError::UniqueViolation) => {
                return Err(EngineError::DuplicateBatch {
                    batch: ctx.batch_name.clone(),
                })
            }
            Err(e) => return Err(e.into()),
        }

        let mut products_updated = 0usize;
        for (product_id, variants) in &plan.products {
            let inputs: Vec<VariantPriceInput> = variants
                .iter()
                .map(|v| VariantPriceInput {
                    id: v.variant_id.clone(),
                    price: v.price,
                    compare_at_price: v.compare_at_price,
                })
                .collect();

            match self
                .shopify
                .update_variant_prices(&ctx.auth, product_id, &inputs)
                .await
            {
                Ok(errors) if errors.is_empty() => {
                    let ids: Vec<String> =
                        variants.iter().map(|v| v.variant_id.clone()).collect();
                    if let Err(e) =
                        repricer_db::mark_entries_applied(&self.pool, &store, &ctx.batch_name, &ids)
                            .await
                    {
                        tracing::warn!(
                            store = %store,
                            batch = %ctx.batch_name,
                            product = %product_id,
                            error = %e,
                            "price update landed but ledger rows could not be flagged applied"
                        );
                    }
                    products_updated += 1;
                    tracing::info!(
                        product = %product_id,
                        variants = inputs.len(),
                        "variant prices updated"
                    );
                }
                Ok(errors) => {
                    tracing::warn!(
                        product = %product_id,
                        errors = %joined_messages(&errors),
                        "product rejected the price update; continuing with the rest"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        product = %product_id,
                        error = %e,
                        "price update call failed; continuing with the rest"
                    );
                }
            }
        }

        tracing::info!(
            store = %store,
            batch = %ctx.batch_name,
            updated = products_updated,
            attempted = plan.product_count(),
            "discount batch finished"
        );
        Ok(DiscountOutcome {
            products_updated,
            products_attempted: plan.product_count(),
            variants_planned: plan.variant_count(),
            percentage: ctx.percentage,
        })
    }
}
