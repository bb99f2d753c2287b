use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::FetcherConfig;
use crate::models::{AccrualResponse, AccrualStatus};

/// Errors from one accrual status request
///
/// None of these say anything about the order; the caller must leave it untouched.
#[derive(Error, Debug)]
pub enum AccrualError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Order is not registered in the accrual system")]
    NotRegistered,

    #[error("Rate limited by the accrual system (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Unexpected response status: {0}")]
    UnexpectedStatus(u16),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Order {order} is PROCESSED but carries no accrual")]
    MissingAccrual { order: String },

    #[error("Response is for order {actual}, expected {expected}")]
    OrderMismatch { expected: String, actual: String },
}

pub type Result<T> = std::result::Result<T, AccrualError>;

/// Source of accrual decisions for single orders
#[async_trait::async_trait]
pub trait AccrualClient: Send + Sync {
    async fn fetch_status(&self, order_number: &str) -> Result<AccrualResponse>;
}

/// reqwest-backed client for the accrual system's HTTP API
#[derive(Debug, Clone)]
pub struct HttpAccrualClient {
    client: Client,
    base_url: String,
}

impl HttpAccrualClient {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self { client, base_url: config.normalized_base_url() })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn order_url(&self, order_number: &str) -> String {
        format!("{}/api/orders/{}", self.base_url, order_number)
    }
}

fn parse_retry_after(headers: &header::HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait::async_trait]
impl AccrualClient for HttpAccrualClient {
    async fn fetch_status(&self, order_number: &str) -> Result<AccrualResponse> {
        let url = self.order_url(order_number);
        debug!(order = order_number, %url, "Requesting accrual status");

        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NO_CONTENT => return Err(AccrualError::NotRegistered),
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(AccrualError::RateLimited {
                    retry_after: parse_retry_after(response.headers()),
                });
            }
            other => return Err(AccrualError::UnexpectedStatus(other.as_u16())),
        }

        let body = response.bytes().await?;
        let parsed: AccrualResponse = serde_json::from_slice(&body)?;

        if parsed.order != order_number {
            return Err(AccrualError::OrderMismatch {
                expected: order_number.to_string(),
                actual: parsed.order,
            });
        }
        if parsed.status == AccrualStatus::Processed && parsed.accrual.is_none() {
            return Err(AccrualError::MissingAccrual { order: parsed.order });
        }

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_url() {
        let config =
            FetcherConfig { base_url: "localhost:8081/".to_string(), ..Default::default() };
        let client = HttpAccrualClient::new(&config).unwrap();

        assert_eq!(client.base_url(), "http://localhost:8081");
        assert_eq!(client.order_url("2377225624"), "http://localhost:8081/api/orders/2377225624");
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = header::HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(header::RETRY_AFTER, header::HeaderValue::from_static("60"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(60)));

        headers.insert(header::RETRY_AFTER, header::HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after(&headers), None);
    }
}
