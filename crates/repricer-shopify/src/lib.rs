//! Client for the Shopify Admin GraphQL API.
//!
//! Wraps `reqwest` with typed request/response models for the operations the
//! discount engine needs: submitting an asynchronous bulk read of a
//! collection's variants, polling it to completion, fetching its JSONL
//! result, per-product variant price mutations, and point lookups of a
//! variant's owning product. Caller-supplied identifiers never reach a query
//! document as raw strings — collection ids go through [`CollectionId`] and
//! everything else is passed as GraphQL variables.

mod bulk;
mod client;
mod error;
mod types;

pub use bulk::{await_completion, submit_collection_query, BulkError, BulkJobHandle,
    BulkJobOutcome, PollPolicy};
pub use client::{ShopifyClient, StoreAuth};
pub use error::ShopifyError;
pub use types::{
    parse_jsonl_variants, BulkOperationStatus, BulkStatus, CollectionId, UserError,
    VariantParent, VariantPriceInput, VariantRecord,
};
