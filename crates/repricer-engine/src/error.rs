use repricer_db::DbError;
use repricer_shopify::{BulkError, ShopifyError};
use thiserror::Error;

/// Failures of the discount and rollback workflows.
///
/// The first six variants are precondition/input failures the caller can
/// fix; the rest are remote-dependency or store failures. The server maps
/// each variant to an HTTP status.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A required request field was missing.
    #[error("{field} is required")]
    MissingField { field: &'static str },

    /// A request field was present but malformed.
    #[error("{field} is invalid: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },

    /// A batch with this name already has ledger rows for the store.
    #[error("batch name '{batch}' already exists")]
    DuplicateBatch { batch: String },

    /// No ledger rows exist for the named batch.
    #[error("no batch named '{batch}' for this store")]
    BatchNotFound { batch: String },

    /// The store has no saved access token; a discount must run first.
    #[error("no stored credential for '{store}'")]
    CredentialMissing { store: String },

    /// The update plan came out empty: nothing qualifies for the change.
    #[error("no variants found to update")]
    EmptyPlan,

    /// Submitting or waiting on the bulk read failed.
    #[error(transparent)]
    Bulk(#[from] BulkError),

    /// A product rejected its price mutation during rollback.
    #[error("product {product_id} rejected the update: {errors}")]
    MutationRejected { product_id: String, errors: String },

    /// A gateway call outside the bulk-job path failed.
    #[error(transparent)]
    Gateway(#[from] ShopifyError),

    /// A ledger or credential store operation failed.
    #[error(transparent)]
    Db(#[from] DbError),
}
