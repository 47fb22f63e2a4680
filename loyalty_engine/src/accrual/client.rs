//! Client for the external accrual service.
//!
//! The service answers `GET {base}/api/orders/{number}` with
//! * `200` and a JSON body `{"order": "...", "status": "PROCESSED", "accrual": 500}` once it knows the order,
//! * `204` if the order has not been registered with it yet,
//! * `429` when we are sending too many requests, optionally with a `Retry-After` header in seconds. Longer delays
//!   than [`MAX_RETRY_AFTER`] are capped.
//!
//! Every answer is classified into an [`AccrualOutcome`]. Rate limiting and unregistered orders are ordinary outcomes,
//! not errors.
use std::{future::Future, str::FromStr, time::Duration};

use log::*;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::{
    accrual::{AccrualClientError, EngineConfig, MAX_RETRY_AFTER},
    db_types::{AccrualResolution, OrderNumber, OrderStatus, Points},
};

/// What the accrual service said about a single order.
#[derive(Debug, Clone)]
pub enum AccrualOutcome {
    Resolved(AccrualResolution),
    /// The service does not know the order yet.
    NotRegistered,
    /// The service wants every caller to pause for `retry_after`.
    RateLimited { retry_after: Duration },
    /// The request failed. The order will be picked up again on the next discovery pass.
    TransportError(AccrualClientError),
}

pub trait AccrualClient: Send + Sync {
    /// Asks the accrual service about `order`. Cancelling `cancel` aborts the request promptly.
    fn fetch_accrual(
        &self,
        order: &OrderNumber,
        cancel: &CancellationToken,
    ) -> impl Future<Output = AccrualOutcome> + Send;
}

#[derive(Debug, Deserialize)]
struct AccrualReply {
    order: String,
    status: String,
    #[serde(default)]
    accrual: Option<f64>,
}

impl AccrualReply {
    fn into_resolution(self, requested: &OrderNumber) -> Result<AccrualResolution, AccrualClientError> {
        if self.order != requested.as_str() {
            return Err(AccrualClientError::Decode(format!(
                "asked about order {requested}, but the reply is for #{}",
                self.order
            )));
        }
        let status = match OrderStatus::from_str(&self.status) {
            Ok(OrderStatus::New) | Err(_) => {
                return Err(AccrualClientError::Decode(format!("unknown accrual status '{}'", self.status)))
            },
            Ok(status) => status,
        };
        let accrual = match self.accrual {
            Some(amount) => Points::from_decimal(amount).map_err(|e| AccrualClientError::Decode(e.to_string()))?,
            None => Points::default(),
        };
        Ok(AccrualResolution { order: requested.clone(), status, accrual })
    }
}

/// [`AccrualClient`] backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct HttpAccrualClient {
    base_url: String,
    client: Client,
    rate_limit_fallback: Duration,
}

impl HttpAccrualClient {
    pub fn new(config: &EngineConfig) -> Result<Self, AccrualClientError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AccrualClientError::Initialization(e.to_string()))?;
        Ok(Self::with_client(client, &config.accrual_address, config.rate_limit_fallback))
    }

    pub fn with_client(client: Client, address: &str, rate_limit_fallback: Duration) -> Self {
        let address = address.trim().trim_end_matches('/');
        let base_url =
            if address.contains("://") { address.to_string() } else { format!("http://{address}") };
        Self { base_url, client, rate_limit_fallback }
    }

    pub fn order_url(&self, order: &OrderNumber) -> String {
        format!("{}/api/orders/{}", self.base_url, order.as_str())
    }

    async fn request(&self, order: &OrderNumber) -> Result<AccrualOutcome, AccrualClientError> {
        let url = self.order_url(order);
        trace!("💸️ GET {url}");
        let response = self.client.get(url).send().await?;
        match response.status() {
            StatusCode::OK => {
                let body = response.bytes().await?;
                let reply = serde_json::from_slice::<AccrualReply>(&body)
                    .map_err(|e| AccrualClientError::Decode(e.to_string()))?;
                reply.into_resolution(order).map(AccrualOutcome::Resolved)
            },
            StatusCode::NO_CONTENT => Ok(AccrualOutcome::NotRegistered),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
                    .unwrap_or(self.rate_limit_fallback);
                debug!("💸️ Rate limited while fetching order {order}. Retry after {retry_after:?}");
                Ok(AccrualOutcome::RateLimited { retry_after })
            },
            status => Err(AccrualClientError::UnexpectedStatus(status.as_u16())),
        }
    }
}

impl AccrualClient for HttpAccrualClient {
    async fn fetch_accrual(&self, order: &OrderNumber, cancel: &CancellationToken) -> AccrualOutcome {
        tokio::select! {
            _ = cancel.cancelled() => AccrualOutcome::TransportError(AccrualClientError::Cancelled),
            result = self.request(order) => result.unwrap_or_else(AccrualOutcome::TransportError),
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use tokio::time::Instant;
    use wiremock::{
        matchers::{method, path},
        Mock,
        MockServer,
        ResponseTemplate,
    };

    use super::*;

    const ORDER: &str = "12345678903";

    fn client_for(server: &MockServer) -> HttpAccrualClient {
        let config = EngineConfig::new(&server.uri()).with_request_timeout(Duration::from_millis(500));
        HttpAccrualClient::new(&config).expect("client")
    }

    async fn respond_with(template: ResponseTemplate) -> (MockServer, HttpAccrualClient) {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path(format!("/api/orders/{ORDER}"))).respond_with(template).mount(&server).await;
        let client = client_for(&server);
        (server, client)
    }

    async fn fetch(client: &HttpAccrualClient) -> AccrualOutcome {
        client.fetch_accrual(&OrderNumber::from(ORDER), &CancellationToken::new()).await
    }

    #[tokio::test]
    async fn processed_order_is_resolved() {
        let body = json!({"order": ORDER, "status": "PROCESSED", "accrual": 729.98});
        let (_server, client) = respond_with(ResponseTemplate::new(200).set_body_json(body)).await;
        match fetch(&client).await {
            AccrualOutcome::Resolved(resolution) => {
                assert_eq!(resolution.order.as_str(), ORDER);
                assert_eq!(resolution.status, OrderStatus::Processed);
                assert_eq!(resolution.accrual, Points::from(72_998));
            },
            other => panic!("Expected a resolution, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_accrual_is_zero() {
        let body = json!({"order": ORDER, "status": "PROCESSING"});
        let (_server, client) = respond_with(ResponseTemplate::new(200).set_body_json(body)).await;
        match fetch(&client).await {
            AccrualOutcome::Resolved(resolution) => {
                assert_eq!(resolution.status, OrderStatus::Processing);
                assert_eq!(resolution.accrual, Points::default());
            },
            other => panic!("Expected a resolution, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_content_means_not_registered() {
        let (_server, client) = respond_with(ResponseTemplate::new(204)).await;
        assert!(matches!(fetch(&client).await, AccrualOutcome::NotRegistered));
    }

    #[tokio::test]
    async fn too_many_requests_uses_retry_after() {
        let template = ResponseTemplate::new(429).insert_header("Retry-After", "60");
        let (_server, client) = respond_with(template).await;
        match fetch(&client).await {
            AccrualOutcome::RateLimited { retry_after } => assert_eq!(retry_after, Duration::from_secs(60)),
            other => panic!("Expected rate limiting, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn too_many_requests_without_retry_after_uses_fallback() {
        let (_server, client) = respond_with(ResponseTemplate::new(429)).await;
        match fetch(&client).await {
            AccrualOutcome::RateLimited { retry_after } => assert_eq!(retry_after, Duration::from_secs(1)),
            other => panic!("Expected rate limiting, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn huge_retry_after_is_capped() {
        let template = ResponseTemplate::new(429).insert_header("Retry-After", u64::MAX.to_string().as_str());
        let (_server, client) = respond_with(template).await;
        match fetch(&client).await {
            AccrualOutcome::RateLimited { retry_after } => assert_eq!(retry_after, MAX_RETRY_AFTER),
            other => panic!("Expected rate limiting, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_date_retry_after_uses_fallback() {
        let template = ResponseTemplate::new(429).insert_header("Retry-After", "Wed, 21 Oct 2015 07:28:00 GMT");
        let (_server, client) = respond_with(template).await;
        match fetch(&client).await {
            AccrualOutcome::RateLimited { retry_after } => assert_eq!(retry_after, Duration::from_secs(1)),
            other => panic!("Expected rate limiting, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_errors_are_transport_errors() {
        let (_server, client) = respond_with(ResponseTemplate::new(500)).await;
        assert!(matches!(
            fetch(&client).await,
            AccrualOutcome::TransportError(AccrualClientError::UnexpectedStatus(500))
        ));
    }

    #[tokio::test]
    async fn malformed_bodies_are_decode_errors() {
        let (_server, client) = respond_with(ResponseTemplate::new(200).set_body_string("{not json")).await;
        assert!(matches!(fetch(&client).await, AccrualOutcome::TransportError(AccrualClientError::Decode(_))));

        let body = json!({"order": "999", "status": "PROCESSED", "accrual": 1});
        let (_server, client) = respond_with(ResponseTemplate::new(200).set_body_json(body)).await;
        assert!(matches!(fetch(&client).await, AccrualOutcome::TransportError(AccrualClientError::Decode(_))));

        let body = json!({"order": ORDER, "status": "LOST"});
        let (_server, client) = respond_with(ResponseTemplate::new(200).set_body_json(body)).await;
        assert!(matches!(fetch(&client).await, AccrualOutcome::TransportError(AccrualClientError::Decode(_))));
    }

    #[tokio::test]
    async fn slow_responses_time_out() {
        let template = ResponseTemplate::new(204).set_delay(Duration::from_secs(3));
        let (_server, client) = respond_with(template).await;
        assert!(matches!(fetch(&client).await, AccrualOutcome::TransportError(AccrualClientError::Timeout)));
    }

    #[tokio::test]
    async fn cancellation_aborts_the_request() {
        let template = ResponseTemplate::new(204).set_delay(Duration::from_secs(3));
        let (_server, client) = respond_with(template).await;
        let client = client.clone();
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });
        let start = Instant::now();
        let outcome = client.fetch_accrual(&OrderNumber::from(ORDER), &cancel).await;
        assert!(matches!(outcome, AccrualOutcome::TransportError(AccrualClientError::Cancelled)));
        assert!(start.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_error() {
        let config = EngineConfig::new("127.0.0.1:1");
        let client = HttpAccrualClient::new(&config).expect("client");
        assert_eq!(client.order_url(&OrderNumber::from("1")), "http://127.0.0.1:1/api/orders/1");
        assert!(matches!(fetch(&client).await, AccrualOutcome::TransportError(_)));
    }
}
