//! The rollback workflow: restore a named batch's original prices from the
//! ledger and purge the record.

use repricer_shopify::{StoreAuth, UserError, VariantPriceInput};

use crate::error::EngineError;
use crate::plan::{build_restore_plan, RestoreRecord};
use crate::{required_field, Engine};

/// A raw rollback request as it arrives over the wire.
#[derive(Debug, Clone, Default)]
pub struct RollbackRequest {
    pub shop: Option<String>,
    pub batch_name: Option<String>,
}

/// What the rollback run accomplished.
#[derive(Debug, Clone)]
pub struct RollbackOutcome {
    pub products_restored: usize,
    pub variants_restored: usize,
}

fn joined_messages(errors: &[UserError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Engine {
    /// Restores every variant of a named batch to its recorded original
    /// price, clears compare-at prices, and deletes the ledger rows.
    ///
    /// Parent lookups run concurrently (read-only); mutations run serially,
    /// one product at a time. The ledger is purged product by product as
    /// each restore lands, so an abort on a rejected mutation leaves only
    /// the unrestored remainder — a second call finishes the job. Variants
    /// that no longer exist remotely are skipped and their rows swept at the
    /// end.
    ///
    /// # Errors
    ///
    /// - [`EngineError::CredentialMissing`] when the store has no saved token.
    /// - [`EngineError::BatchNotFound`] when the batch has no ledger rows —
    ///   including a second rollback of an already-restored batch.
    /// - [`EngineError::MutationRejected`] when a product reports
    ///   `userErrors`; the rollback stops there.
    /// - [`EngineError::EmptyPlan`] when no ledger row resolves to a live
    ///   variant.
    pub async fn rollback_batch(
        &self,
        request: RollbackRequest,
    ) -> Result<RollbackOutcome, EngineError> {
        let shop = required_field(request.shop, "shop")?;
        let batch_name = required_field(request.batch_name, "price_updation_name")?;

        let credential = repricer_db::get_credential(&self.pool, &shop)
            .await?
            .ok_or_else(|| EngineError::CredentialMissing {
                store: shop.clone(),
            })?;
        let auth = StoreAuth {
            shop: shop.clone(),
            token: credential.access_token,
        };

        let rows = repricer_db::list_batch_entries(&self.pool, &shop, &batch_name).await?;
        if rows.is_empty() {
            return Err(EngineError::BatchNotFound { batch: batch_name });
        }
        tracing::info!(store = %shop, batch = %batch_name, variants = rows.len(), "rollback started");

        // Resolve each variant's current owning product. Side-effect-free,
        // so the fan-out is safe; the write side below stays serial.
        let client = &self.shopify;
        let auth_ref = &auth;
        let resolved = futures::future::join_all(rows.iter().map(|row| async move {
            (row, client.variant_with_product(auth_ref, &row.variant_id).await)
        }))
        .await;

        let mut records = Vec::with_capacity(rows.len());
        for (row, lookup) in resolved {
            match lookup {
                Ok(Some(parent)) => records.push(RestoreRecord {
                    product_id: parent.product_id,
                    variant_id: row.variant_id.clone(),
                    original_price: row.original_price,
                }),
                Ok(None) => {
                    tracing::warn!(
                        variant = %row.variant_id,
                        "variant no longer exists remotely; skipping its restore"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        variant = %row.variant_id,
                        error = %e,
                        "parent lookup failed; skipping its restore"
                    );
                }
            }
        }

        let plan = build_restore_plan(&records)?;

        let mut products_restored = 0usize;
        let mut variants_restored = 0usize;
        for (product_id, variants) in &plan.products {
            let inputs: Vec<VariantPriceInput> = variants
                .iter()
                .map(|v| VariantPriceInput {
                    id: v.variant_id.clone(),
                    price: v.price,
                    compare_at_price: None,
                })
                .collect();

            let errors = self
                .shopify
                .update_variant_prices(&auth, product_id, &inputs)
                .await?;
            if !errors.is_empty() {
                tracing::error!(
                    product = %product_id,
                    errors = %joined_messages(&errors),
                    "product rejected the restore; aborting rollback"
                );
                return Err(EngineError::MutationRejected {
                    product_id: product_id.clone(),
                    errors: joined_messages(&errors),
                });
            }

            let ids: Vec<String> = variants.iter().map(|v| v.variant_id.clone()).collect();
            repricer_db::delete_entries_for_variants(&self.pool, &shop, &batch_name, &ids).await?;
            products_restored += 1;
            variants_restored += inputs.len();
            tracing::info!(product = %product_id, variants = inputs.len(), "product restored");
        }

        // Rows for variants we skipped can never be restored; drop them so
        // the batch does not linger as half-deleted history.
        let swept = repricer_db::delete_batch(&self.pool, &shop, &batch_name).await?;
        if swept > 0 {
            tracing::info!(
                store = %shop,
                batch = %batch_name,
                count = swept,
                "purged ledger rows for variants missing remotely"
            );
        }

        tracing::info!(
            store = %shop,
            batch = %batch_name,
            products = products_restored,
            variants = variants_restored,
            "rollback completed"
        );
        Ok(RollbackOutcome {
            products_restored,
            variants_restored,
        })
    }
}
