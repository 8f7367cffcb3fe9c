//! Client for the Refit product-catalog/cart service.
//!
//! The chatbot treats the catalog as best-effort: a failed lookup becomes
//! an empty result (with a logged diagnostic) so the conversation can
//! answer "not found" instead of surfacing a transport error. Only the
//! cart-add call reports success/failure, because it has a side effect.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One product from the catalog search API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_id: i64,
    pub product_name: String,
}

/// One size/stock option of a product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductOption {
    pub id: i64,
    pub size: String,
    pub stock: i64,
}

/// Body for the cart-add call. `cart_item_id` is always null for new items;
/// the field exists because the backend reuses the DTO for updates.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartAddRequest {
    pub product_id: i64,
    pub option_id: i64,
    pub quantity: u32,
    pub cart_item_id: Option<i64>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    products: Vec<Product>,
}

#[derive(Deserialize)]
struct ProductDetailResponse {
    #[serde(default)]
    options: Vec<ProductOption>,
}

/// Opaque catalog capability consumed by the cart intent handler.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn search_products(&self, keyword: &str, page: u32, size: u32) -> Vec<Product>;

    async fn product_options(&self, product_id: i64) -> Vec<ProductOption>;

    /// Add an item to the member's cart. Returns whether the backend
    /// accepted the mutation.
    async fn add_to_cart(&self, request: &CartAddRequest, access_token: &str) -> bool;
}

/// HTTP client against the catalog service's REST API.
#[derive(Clone)]
pub struct CatalogClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CatalogApi for CatalogClient {
    async fn search_products(&self, keyword: &str, page: u32, size: u32) -> Vec<Product> {
        let url = format!("{}/search/products", self.base_url);
        let result = self
            .http_client
            .get(&url)
            .query(&[
                ("keyword", keyword),
                ("page", &page.to_string()),
                ("size", &size.to_string()),
            ])
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                match response.json::<SearchResponse>().await {
                    Ok(body) => {
                        debug!(keyword, hits = body.products.len(), "catalog search");
                        body.products
                    }
                    Err(e) => {
                        warn!(keyword, error = %e, "catalog search returned invalid body");
                        Vec::new()
                    }
                }
            }
            Ok(response) => {
                warn!(keyword, status = %response.status(), "catalog search rejected");
                Vec::new()
            }
            Err(e) => {
                warn!(keyword, error = %e, "catalog search failed");
                Vec::new()
            }
        }
    }

    async fn product_options(&self, product_id: i64) -> Vec<ProductOption> {
        let url = format!("{}/products/{}", self.base_url, product_id);
        let result = self.http_client.get(&url).send().await;

        match result {
            Ok(response) if response.status().is_success() => {
                match response.json::<ProductDetailResponse>().await {
                    Ok(body) => body.options,
                    Err(e) => {
                        warn!(product_id, error = %e, "product detail returned invalid body");
                        Vec::new()
                    }
                }
            }
            Ok(response) => {
                warn!(product_id, status = %response.status(), "product detail rejected");
                Vec::new()
            }
            Err(e) => {
                warn!(product_id, error = %e, "product detail lookup failed");
                Vec::new()
            }
        }
    }

    async fn add_to_cart(&self, request: &CartAddRequest, access_token: &str) -> bool {
        let url = format!("{}/cart/add", self.base_url);
        let result = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .json(request)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(
                    product_id = request.product_id,
                    status = %response.status(),
                    "cart add rejected"
                );
                false
            }
            Err(e) => {
                warn!(product_id = request.product_id, error = %e, "cart add failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_request_wire_shape() {
        let request = CartAddRequest {
            product_id: 7,
            option_id: 21,
            quantity: 2,
            cart_item_id: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["productId"], 7);
        assert_eq!(json["optionId"], 21);
        assert_eq!(json["quantity"], 2);
        assert!(json["cartItemId"].is_null());
    }

    #[test]
    fn test_search_response_tolerates_missing_products() {
        let body: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(body.products.is_empty());
    }
}
