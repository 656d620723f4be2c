//! Typed models for the Admin GraphQL surface the engine consumes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// A numeric Shopify collection id, validated before it is ever formatted
/// into a GID. Rejecting non-numeric input here keeps caller-controlled
/// strings out of the bulk query document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionId(u64);

impl CollectionId {
    /// Parses a raw collection id. Accepts decimal digits only.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        trimmed.parse::<u64>().ok().map(Self)
    }

    /// The global id form the Admin API expects, e.g.
    /// `gid://shopify/Collection/42`.
    #[must_use]
    pub fn gid(&self) -> String {
        format!("gid://shopify/Collection/{}", self.0)
    }
}

impl std::fmt::Display for CollectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// GraphQL envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlEnvelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlError {
    pub message: String,
}

/// A mutation-level `userError` as Shopify reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserError {
    #[serde(default)]
    pub field: Option<Vec<String>>,
    pub message: String,
}

// ---------------------------------------------------------------------------
// bulkOperationRunQuery
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct BulkOperationRunQueryData {
    #[serde(rename = "bulkOperationRunQuery")]
    pub run: BulkOperationRunQueryPayload,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkOperationRunQueryPayload {
    #[serde(rename = "bulkOperation")]
    pub bulk_operation: Option<BulkOperationRef>,
    #[serde(rename = "userErrors", default)]
    pub user_errors: Vec<UserError>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BulkOperationRef {
    pub id: String,
}

// ---------------------------------------------------------------------------
// currentBulkOperation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct CurrentBulkOperationData {
    #[serde(rename = "currentBulkOperation")]
    pub current: Option<BulkOperationStatus>,
}

/// One poll observation of the shop's current bulk operation.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkOperationStatus {
    pub id: String,
    pub status: BulkStatus,
    pub url: Option<String>,
    #[serde(rename = "errorCode")]
    pub error_code: Option<String>,
}

/// Lifecycle states the Admin API reports for a bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BulkStatus {
    Created,
    Running,
    Completed,
    Failed,
    Canceling,
    Canceled,
    Expired,
}

// ---------------------------------------------------------------------------
// productVariantsBulkUpdate
// ---------------------------------------------------------------------------

/// One variant's price change in a per-product mutation.
///
/// `compare_at_price: None` serializes as an explicit JSON `null`, which is
/// how the Admin API clears a compare-at price; omitting the key would leave
/// it untouched.
#[derive(Debug, Clone, Serialize)]
pub struct VariantPriceInput {
    pub id: String,
    pub price: Decimal,
    #[serde(rename = "compareAtPrice")]
    pub compare_at_price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VariantsBulkUpdateData {
    #[serde(rename = "productVariantsBulkUpdate")]
    pub payload: Option<VariantsBulkUpdatePayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VariantsBulkUpdatePayload {
    #[serde(rename = "userErrors", default)]
    pub user_errors: Vec<UserError>,
}

// ---------------------------------------------------------------------------
// productVariant point query
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct VariantParentData {
    #[serde(rename = "productVariant")]
    pub variant: Option<VariantParentNode>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VariantParentNode {
    pub id: String,
    pub price: Decimal,
    pub product: ProductRef,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductRef {
    pub id: String,
}

/// A variant's current price and owning product, from a point lookup.
#[derive(Debug, Clone)]
pub struct VariantParent {
    pub variant_id: String,
    pub price: Decimal,
    pub product_id: String,
}

impl From<VariantParentNode> for VariantParent {
    fn from(node: VariantParentNode) -> Self {
        Self {
            variant_id: node.id,
            price: node.price,
            product_id: node.product.id,
        }
    }
}

// ---------------------------------------------------------------------------
// Bulk result payload (newline-delimited JSON)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct JsonlLine {
    id: Option<String>,
    price: Option<Decimal>,
    #[serde(rename = "__parentId")]
    parent_id: Option<String>,
}

/// A variant row extracted from a bulk query result.
#[derive(Debug, Clone)]
pub struct VariantRecord {
    pub variant_id: String,
    pub price: Decimal,
    pub product_id: String,
}

/// Parses a bulk-operation JSONL payload into variant records.
///
/// The payload interleaves product rows (no `__parentId`) with variant rows;
/// only rows carrying an id, a parseable price, and a parent survive.
/// Malformed lines are skipped rather than failing the whole payload.
#[must_use]
pub fn parse_jsonl_variants(body: &str) -> Vec<VariantRecord> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<JsonlLine>(line).ok())
        .filter_map(|line| match (line.id, line.price, line.parent_id) {
            (Some(id), Some(price), Some(parent)) => Some(VariantRecord {
                variant_id: id,
                price,
                product_id: parent,
            }),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_id_accepts_digits_only() {
        assert_eq!(CollectionId::parse("42").map(|c| c.gid()).as_deref(),
            Some("gid://shopify/Collection/42"));
        assert!(CollectionId::parse(" 42 ").is_some());
        assert!(CollectionId::parse("").is_none());
        assert!(CollectionId::parse("42; drop").is_none());
        assert!(CollectionId::parse("gid://shopify/Collection/42").is_none());
    }

    #[test]
    fn bulk_status_deserializes_screaming_snake() {
        let status: BulkStatus = serde_json::from_str("\"COMPLETED\"").expect("parse");
        assert_eq!(status, BulkStatus::Completed);
        let status: BulkStatus = serde_json::from_str("\"RUNNING\"").expect("parse");
        assert_eq!(status, BulkStatus::Running);
    }

    #[test]
    fn variant_price_input_serializes_explicit_null_compare_at() {
        let input = VariantPriceInput {
            id: "gid://shopify/ProductVariant/1".to_owned(),
            price: Decimal::new(1000, 2),
            compare_at_price: None,
        };
        let json = serde_json::to_value(&input).expect("serialize");
        assert!(json["compareAtPrice"].is_null(), "key must be present and null: {json}");
    }

    #[test]
    fn parse_jsonl_keeps_variant_rows_and_drops_the_rest() {
        let body = concat!(
            "{\"id\":\"gid://shopify/Product/10\"}\n",
            "{\"id\":\"gid://shopify/ProductVariant/1\",\"price\":\"10.00\",\"__parentId\":\"gid://shopify/Product/10\"}\n",
            "not json at all\n",
            "{\"id\":\"gid://shopify/ProductVariant/2\",\"price\":\"19.99\",\"__parentId\":\"gid://shopify/Product/10\"}\n",
            "\n",
        );
        let records = parse_jsonl_variants(body);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].variant_id, "gid://shopify/ProductVariant/1");
        assert_eq!(records[0].price, Decimal::new(1000, 2));
        assert_eq!(records[1].product_id, "gid://shopify/Product/10");
    }

    #[test]
    fn parse_jsonl_of_empty_payload_is_empty() {
        assert!(parse_jsonl_variants("").is_empty());
    }
}
