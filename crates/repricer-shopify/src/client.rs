//! HTTP client for the Shopify Admin GraphQL API.
//!
//! Manages the `reqwest` client, API version, and per-shop endpoint
//! resolution. All operations authenticate with the store's access token via
//! the `X-Shopify-Access-Token` header and check both transport status and
//! top-level GraphQL `errors` before touching the payload.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

use crate::error::ShopifyError;
use crate::types::{
    BulkOperationRunQueryData, BulkOperationRunQueryPayload, BulkOperationStatus, CollectionId,
    CurrentBulkOperationData, UserError, VariantParent, VariantParentData, VariantPriceInput,
    VariantsBulkUpdateData,
};

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

const BULK_RUN_QUERY_DOC: &str = "mutation runBulkQuery($query: String!) { \
     bulkOperationRunQuery(query: $query) { \
       bulkOperation { id status } \
       userErrors { field message } } }";

const CURRENT_BULK_OPERATION_DOC: &str =
    "{ currentBulkOperation { id status url errorCode } }";

const VARIANTS_BULK_UPDATE_DOC: &str =
    "mutation updateVariantPrices($productId: ID!, $variants: [ProductVariantsBulkInput!]!) { \
     productVariantsBulkUpdate(productId: $productId, variants: $variants) { \
       product { id } \
       userErrors { field message } } }";

const VARIANT_PARENT_DOC: &str = "query variantParent($id: ID!) { \
     productVariant(id: $id) { id price product { id } } }";

/// Credentials for one store: the myshopify domain and its Admin API token.
#[derive(Debug, Clone)]
pub struct StoreAuth {
    pub shop: String,
    pub token: String,
}

/// Client for the Shopify Admin GraphQL API.
///
/// Use [`ShopifyClient::new`] for production (per-shop `https://{shop}`
/// origins) or [`ShopifyClient::with_base_url`] to point every shop at a
/// mock server in tests.
#[derive(Debug, Clone)]
pub struct ShopifyClient {
    client: Client,
    api_version: String,
    base_url: Option<Url>,
}

impl ShopifyClient {
    /// Creates a new client that resolves endpoints from each shop's domain.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_version: &str, timeout_secs: u64) -> Result<Self, ShopifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("repricer/0.1 (bulk-discount)")
            .build()?;

        Ok(Self {
            client,
            api_version: api_version.to_owned(),
            base_url: None,
        })
    }

    /// Creates a new client with a fixed base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ShopifyError::Api`] if `base_url` is not
    /// a valid URL.
    pub fn with_base_url(
        api_version: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, ShopifyError> {
        let mut client = Self::new(api_version, timeout_secs)?;

        // Normalise: strip any trailing slash so joining the Admin API path
        // below never produces a double slash.
        let normalised = base_url.trim_end_matches('/').to_owned();
        let parsed = Url::parse(&normalised)
            .map_err(|e| ShopifyError::Api(format!("invalid base URL '{base_url}': {e}")))?;
        client.base_url = Some(parsed);
        Ok(client)
    }

    /// Builds a client from application configuration, honoring the
    /// base-URL override when set.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError`] if client construction fails.
    pub fn from_app_config(config: &repricer_core::AppConfig) -> Result<Self, ShopifyError> {
        match config.shopify_base_url.as_deref() {
            Some(base) => Self::with_base_url(
                &config.shopify_api_version,
                config.shopify_request_timeout_secs,
                base,
            ),
            None => Self::new(
                &config.shopify_api_version,
                config.shopify_request_timeout_secs,
            ),
        }
    }

    /// Submits the asynchronous bulk read of every variant in a collection.
    ///
    /// Returns the raw mutation payload; interpreting a missing operation id
    /// or `userErrors` as a submission failure is the poller's job.
    ///
    /// # Errors
    ///
    /// - [`ShopifyError::Api`] if the API returns top-level GraphQL errors.
    /// - [`ShopifyError::Http`] on network failure or non-2xx HTTP status.
    /// - [`ShopifyError::Deserialize`] if the response shape is unexpected.
    pub(crate) async fn run_collection_bulk_query(
        &self,
        auth: &StoreAuth,
        collection: CollectionId,
    ) -> Result<BulkOperationRunQueryPayload, ShopifyError> {
        let inner = collection_variants_query(collection);
        let variables = serde_json::json!({ "query": inner });
        let data: BulkOperationRunQueryData = self
            .execute(auth, BULK_RUN_QUERY_DOC, Some(variables), "bulkOperationRunQuery")
            .await?;
        Ok(data.run)
    }

    /// Polls the shop's current bulk operation, if any exists.
    ///
    /// # Errors
    ///
    /// Same as [`ShopifyClient::run_collection_bulk_query`].
    pub(crate) async fn current_bulk_operation(
        &self,
        auth: &StoreAuth,
    ) -> Result<Option<BulkOperationStatus>, ShopifyError> {
        let data: CurrentBulkOperationData = self
            .execute(auth, CURRENT_BULK_OPERATION_DOC, None, "currentBulkOperation")
            .await?;
        Ok(data.current)
    }

    /// Downloads a completed bulk operation's JSONL result payload.
    ///
    /// The result URL is pre-signed by Shopify; no access token is sent.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::Http`] on network failure or non-2xx status.
    pub async fn fetch_bulk_result(&self, url: &str) -> Result<String, ShopifyError> {
        let response = self.client.get(url).send().await?;
        let response = response.error_for_status()?;
        Ok(response.text().await?)
    }

    /// Applies price updates to one product's variants and returns the
    /// mutation's `userErrors` (empty on full success).
    ///
    /// # Errors
    ///
    /// Same as [`ShopifyClient::run_collection_bulk_query`].
    pub async fn update_variant_prices(
        &self,
        auth: &StoreAuth,
        product_id: &str,
        variants: &[VariantPriceInput],
    ) -> Result<Vec<UserError>, ShopifyError> {
        let variables = serde_json::json!({
            "productId": product_id,
            "variants": variants,
        });
        let data: VariantsBulkUpdateData = self
            .execute(auth, VARIANTS_BULK_UPDATE_DOC, Some(variables), "productVariantsBulkUpdate")
            .await?;

        let payload = data.payload.ok_or_else(|| {
            ShopifyError::Api("productVariantsBulkUpdate returned no payload".to_owned())
        })?;
        Ok(payload.user_errors)
    }

    /// Looks up a variant's current price and owning product.
    ///
    /// Returns `None` if the variant no longer exists remotely.
    ///
    /// # Errors
    ///
    /// Same as [`ShopifyClient::run_collection_bulk_query`].
    pub async fn variant_with_product(
        &self,
        auth: &StoreAuth,
        variant_id: &str,
    ) -> Result<Option<VariantParent>, ShopifyError> {
        let variables = serde_json::json!({ "id": variant_id });
        let data: VariantParentData = self
            .execute(auth, VARIANT_PARENT_DOC, Some(variables), "productVariant")
            .await?;
        Ok(data.variant.map(VariantParent::from))
    }

    /// Resolves the GraphQL endpoint for a shop: the fixed base URL when one
    /// is configured, otherwise `https://{shop}`.
    fn graphql_endpoint(&self, shop: &str) -> Result<Url, ShopifyError> {
        let origin = match &self.base_url {
            Some(base) => base.to_string(),
            None => format!("https://{shop}"),
        };
        let raw = format!(
            "{}/admin/api/{}/graphql.json",
            origin.trim_end_matches('/'),
            self.api_version
        );
        Url::parse(&raw).map_err(|e| ShopifyError::Api(format!("invalid shop endpoint '{raw}': {e}")))
    }

    /// Sends one GraphQL request, asserts a 2xx status, checks top-level
    /// `errors`, and deserializes `data`.
    async fn execute<T: DeserializeOwned>(
        &self,
        auth: &StoreAuth,
        query: &str,
        variables: Option<serde_json::Value>,
        context: &str,
    ) -> Result<T, ShopifyError> {
        let url = self.graphql_endpoint(&auth.shop)?;
        let mut body = serde_json::json!({ "query": query });
        if let Some(vars) = variables {
            body["variables"] = vars;
        }

        let response = self
            .client
            .post(url)
            .header(ACCESS_TOKEN_HEADER, &auth.token)
            .json(&body)
            .send()
            .await?;
        let response = response.error_for_status()?;
        let text = response.text().await?;

        let envelope: crate::types::GraphQlEnvelope<T> =
            serde_json::from_str(&text).map_err(|e| ShopifyError::Deserialize {
                context: context.to_owned(),
                source: e,
            })?;

        if !envelope.errors.is_empty() {
            let messages: Vec<&str> = envelope
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect();
            return Err(ShopifyError::Api(messages.join("; ")));
        }

        envelope
            .data
            .ok_or_else(|| ShopifyError::Api(format!("{context} response carried no data")))
    }
}

/// Builds the bulk read document for one collection. The only interpolated
/// value is a GID formatted from a validated integer id.
fn collection_variants_query(collection: CollectionId) -> String {
    format!(
        "{{ collection(id: \"{}\") {{ \
           products(first: 100) {{ edges {{ node {{ id \
             variants(first: 100) {{ edges {{ node {{ id price }} }} }} \
           }} }} }} }} }}",
        collection.gid()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(base_url: &str) -> ShopifyClient {
        ShopifyClient::with_base_url("2025-01", 30, base_url)
            .expect("client construction should not fail")
    }

    #[test]
    fn graphql_endpoint_uses_shop_domain_without_override() {
        let client = ShopifyClient::new("2025-01", 30).expect("client");
        let url = client
            .graphql_endpoint("example.myshopify.com")
            .expect("endpoint");
        assert_eq!(
            url.as_str(),
            "https://example.myshopify.com/admin/api/2025-01/graphql.json"
        );
    }

    #[test]
    fn graphql_endpoint_prefers_base_url_override() {
        let client = test_client("http://127.0.0.1:9090/");
        let url = client
            .graphql_endpoint("example.myshopify.com")
            .expect("endpoint");
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9090/admin/api/2025-01/graphql.json"
        );
    }

    #[test]
    fn with_base_url_rejects_garbage() {
        let result = ShopifyClient::with_base_url("2025-01", 30, "not a url");
        assert!(matches!(result, Err(ShopifyError::Api(_))));
    }

    #[test]
    fn collection_query_embeds_validated_gid_only() {
        let collection = CollectionId::parse("42").expect("valid id");
        let query = collection_variants_query(collection);
        assert!(query.contains("gid://shopify/Collection/42"));
        assert!(query.contains("variants(first: 100)"));
    }
}
