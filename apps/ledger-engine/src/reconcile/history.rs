//! Live completed-order history client.
//!
//! The completed-orders pass is the only component that talks to the
//! broker over the network; everything else consumes files. The client
//! sits behind a trait so tests and other transports can substitute.

use async_trait::async_trait;
use tracing::debug;

use crate::config::BrokerConfig;
use crate::error::LedgerError;
use crate::models::CompletedOrderRow;

/// Source of the broker's completed-order history.
#[async_trait]
pub trait BrokerHistoryClient: Send + Sync {
    /// Fetch the completed-order history.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::BrokerUnreachable`] when the broker cannot
    /// be reached or answers with an error.
    async fn completed_orders(&self) -> Result<Vec<CompletedOrderRow>, LedgerError>;
}

/// HTTP implementation against the broker-connected process's history
/// endpoint.
pub struct HttpBrokerHistoryClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBrokerHistoryClient {
    /// Build a client from broker configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::BrokerUnreachable`] if the HTTP client
    /// cannot be constructed.
    pub fn new(config: &BrokerConfig) -> Result<Self, LedgerError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LedgerError::BrokerUnreachable(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.history_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl BrokerHistoryClient for HttpBrokerHistoryClient {
    async fn completed_orders(&self) -> Result<Vec<CompletedOrderRow>, LedgerError> {
        let url = format!("{}/completed-orders", self.base_url);
        debug!(url = %url, "Fetching completed-order history");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| LedgerError::BrokerUnreachable(e.to_string()))?
            .error_for_status()
            .map_err(|e| LedgerError::BrokerUnreachable(e.to_string()))?;

        response
            .json()
            .await
            .map_err(|e| LedgerError::BrokerUnreachable(format!("malformed history: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_config(url: &str) -> BrokerConfig {
        BrokerConfig {
            history_url: url.to_string(),
            min_query_interval_secs: 0,
            request_timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn fetches_and_parses_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/completed-orders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "order_id": 42,
                    "perm_id": 9001,
                    "symbol": "AAPL",
                    "side": "BUY",
                    "status": "Cancelled",
                    "completed_time": "2026-03-02T15:00:00Z",
                    "order_ref": "meridian:run-7:0:AAPL"
                }
            ])))
            .mount(&server)
            .await;

        let client = HttpBrokerHistoryClient::new(&make_config(&server.uri())).unwrap();
        let rows = client.completed_orders().await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].order_id, 42);
        assert!(rows[0].is_canceled());
    }

    #[tokio::test]
    async fn server_error_maps_to_broker_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/completed-orders"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = HttpBrokerHistoryClient::new(&make_config(&server.uri())).unwrap();
        let err = client.completed_orders().await.unwrap_err();
        assert!(matches!(err, LedgerError::BrokerUnreachable(_)));
    }
}
