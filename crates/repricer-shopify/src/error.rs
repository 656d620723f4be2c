use thiserror::Error;

/// Errors returned by the Shopify Admin API client.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Admin API returned top-level GraphQL `errors`, or the response
    /// carried no usable data.
    #[error("Shopify API error: {0}")]
    Api(String),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}
