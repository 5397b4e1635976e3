//! Product metadata lookups.
//!
//! Both entry points share one batch path; a single-item query is a batch of
//! one whose first record is handed to the caller. Failures are reported as
//! response codes, never as errors.

use crate::client::BillingServiceClient;
use crate::types::{Category, ProductDetails, ResponseCode};

/// Metadata queries against a connected billing service.
pub struct ProductQueryService<'a> {
    client: &'a dyn BillingServiceClient,
}

impl<'a> ProductQueryService<'a> {
    pub fn new(client: &'a dyn BillingServiceClient) -> Self {
        Self { client }
    }

    /// Query metadata for `product_ids` and deliver the parsed records to
    /// `on_list` in a single call.
    ///
    /// An empty `product_ids` returns OK without calling the service or
    /// `on_list`. `on_list` only runs when OK is returned.
    pub async fn query_batch<F>(
        &self,
        category: Category,
        product_ids: &[String],
        on_list: F,
    ) -> ResponseCode
    where
        F: FnOnce(Vec<ProductDetails>),
    {
        if product_ids.is_empty() {
            tracing::debug!("product query skipped, no product ids");
            return ResponseCode::OK;
        }

        match self.fetch(category, product_ids).await {
            Ok(products) => {
                on_list(products);
                ResponseCode::OK
            }
            Err(code) => code,
        }
    }

    /// Query metadata for one product. `on_product` receives the first
    /// parsed record, or `None` if the service returned none.
    pub async fn query_single<F>(
        &self,
        category: Category,
        product_id: &str,
        on_product: F,
    ) -> ResponseCode
    where
        F: FnOnce(Option<ProductDetails>),
    {
        if product_id.is_empty() {
            tracing::debug!("product query skipped, empty product id");
            return ResponseCode::OK;
        }

        let ids = [product_id.to_string()];
        self.query_batch(category, &ids, |products| {
            on_product(products.into_iter().next())
        })
        .await
    }

    async fn fetch(
        &self,
        category: Category,
        product_ids: &[String],
    ) -> std::result::Result<Vec<ProductDetails>, ResponseCode> {
        let response = match self.client.get_product_details(category, product_ids).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(%category, error = %e, "product details request failed");
                return Err(ResponseCode::REMOTE_EXCEPTION);
            }
        };

        let Some(details_list) = response.details_list else {
            if response.response_code.is_ok() {
                tracing::warn!(%category, "product details response has neither an error nor a list");
                return Err(ResponseCode::BAD_RESPONSE);
            }
            tracing::debug!(%category, code = %response.response_code, "product details query failed");
            return Err(response.response_code);
        };

        let mut products = Vec::with_capacity(details_list.len());
        for raw in &details_list {
            match ProductDetails::parse(category, raw) {
                Ok(details) => products.push(details),
                Err(e) => {
                    tracing::error!(%category, error = %e, "unparseable product details");
                    return Err(ResponseCode::BAD_RESPONSE);
                }
            }
        }
        tracing::debug!(%category, count = products.len(), "product details received");
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ProductDetailsResponse;
    use crate::testing::MockBillingService;

    fn details(id: &str) -> String {
        format!(r#"{{"productId":"{id}","title":"{id}","price":"$1.00"}}"#)
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_input_is_trivially_ok() {
        let service = MockBillingService::new();
        let query = ProductQueryService::new(&service);
        let mut called = false;

        let code = query
            .query_batch(Category::OneTime, &[], |_| called = true)
            .await;

        assert_eq!(code, ResponseCode::OK);
        assert!(!called);
        assert_eq!(service.details_requests(), 0);
    }

    #[tokio::test]
    async fn test_batch_delivers_all_records_once() {
        let service = MockBillingService::new();
        service.set_product_details(ProductDetailsResponse::ok(vec![details("a"), details("b")]));
        let query = ProductQueryService::new(&service);
        let mut delivered = Vec::new();
        let mut calls = 0;

        let code = query
            .query_batch(Category::OneTime, &ids(&["a", "b"]), |list| {
                calls += 1;
                delivered = list;
            })
            .await;

        assert_eq!(code, ResponseCode::OK);
        assert_eq!(calls, 1);
        let ids: Vec<_> = delivered.iter().map(|d| d.product_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(delivered.iter().all(|d| d.category == Category::OneTime));
    }

    #[tokio::test]
    async fn test_missing_list_with_ok_code_is_bad_response() {
        let service = MockBillingService::new();
        service.set_product_details(ProductDetailsResponse {
            response_code: ResponseCode::OK,
            details_list: None,
        });
        let query = ProductQueryService::new(&service);

        let code = query
            .query_batch(Category::Subscription, &ids(&["x"]), |_| {
                panic!("callback must not run")
            })
            .await;
        assert_eq!(code, ResponseCode::BAD_RESPONSE);
    }

    #[tokio::test]
    async fn test_remote_code_surfaced_verbatim() {
        let service = MockBillingService::new();
        service.set_product_details(ProductDetailsResponse::error(ResponseCode::BILLING_UNAVAILABLE));
        let query = ProductQueryService::new(&service);

        let code = query
            .query_batch(Category::OneTime, &ids(&["x"]), |_| {})
            .await;
        assert_eq!(code, ResponseCode::BILLING_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_transport_fault_becomes_remote_exception() {
        let service = MockBillingService::new();
        service.fail_transport(true);
        let query = ProductQueryService::new(&service);

        let code = query
            .query_single(Category::OneTime, "x", |_| panic!("callback must not run"))
            .await;
        assert_eq!(code, ResponseCode::REMOTE_EXCEPTION);
    }

    #[tokio::test]
    async fn test_unparseable_record_is_bad_response() {
        let service = MockBillingService::new();
        service.set_product_details(ProductDetailsResponse::ok(vec!["{oops".to_string()]));
        let query = ProductQueryService::new(&service);

        let code = query
            .query_batch(Category::OneTime, &ids(&["x"]), |_| {})
            .await;
        assert_eq!(code, ResponseCode::BAD_RESPONSE);
    }

    #[tokio::test]
    async fn test_single_delivers_first_or_none() {
        let service = MockBillingService::new();
        service.set_product_details(ProductDetailsResponse::ok(vec![details("gold"), details("x")]));
        let query = ProductQueryService::new(&service);

        let mut got = None;
        let code = query
            .query_single(Category::OneTime, "gold", |p| got = p)
            .await;
        assert_eq!(code, ResponseCode::OK);
        assert_eq!(got.map(|d| d.product_id), Some("gold".to_string()));

        service.set_product_details(ProductDetailsResponse::ok(vec![]));
        let mut got = Some(ProductDetails::parse(Category::OneTime, &details("stale")).unwrap());
        query
            .query_single(Category::OneTime, "gold", |p| got = p)
            .await;
        assert!(got.is_none());
    }
}
