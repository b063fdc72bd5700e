//! HTTP client for the registry's paged `api/slots` endpoint.

use std::time::Duration;

use reqwest::{Client, Url};

use crate::error::RegistryError;
use crate::rate_limit::retry_with_backoff;
use crate::types::RegistryPage;

const SLOTS_PATH: &str = "api/slots";

/// HTTP client for the registry's paged JSON endpoint.
///
/// Handles rate limiting (429), not-found (404), and other non-2xx responses
/// as typed errors. Transient errors (429, 5xx, network failures) are
/// retried with exponential backoff and jitter up to `max_retries`
/// additional attempts.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
    base_url: Url,
    /// Maximum number of retry attempts after the first failure.
    max_retries: u32,
    /// Base delay for exponential backoff: `backoff_base_ms * 2^attempt`.
    backoff_base_ms: u64,
}

impl RegistryClient {
    /// Creates a client with configured timeout, `User-Agent`, and retry policy.
    ///
    /// `max_retries` is the number of additional attempts after the first
    /// failure for retriable errors. Set to `0` to disable retries.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::InvalidBaseUrl`] if `base_url` does not parse.
    /// - [`RegistryError::Http`] if the underlying `reqwest::Client` cannot
    ///   be constructed.
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, RegistryError> {
        // Exactly one trailing slash so `join` appends instead of replacing
        // the last path segment.
        let normalised = format!("{}/", base_url.trim().trim_end_matches('/'));
        let parsed = Url::parse(&normalised).map_err(|e| RegistryError::InvalidBaseUrl {
            base_url: base_url.to_owned(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
            return Err(RegistryError::InvalidBaseUrl {
                base_url: base_url.to_owned(),
                reason: "expected an http(s) URL".to_owned(),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: parsed,
            max_retries,
            backoff_base_ms,
        })
    }

    /// Fetches one page of registry rows. Pages are 1-based.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::RateLimited`]: HTTP 429 after all retries exhausted.
    /// - [`RegistryError::NotFound`]: HTTP 404 (not retried).
    /// - [`RegistryError::UnexpectedStatus`]: any other non-2xx status (5xx retried, 4xx not).
    /// - [`RegistryError::Http`]: network or TLS failure after all retries exhausted.
    /// - [`RegistryError::Deserialize`]: response body is not a registry page (not retried).
    pub async fn fetch_page(&self, page: u32, per_page: u32) -> Result<RegistryPage, RegistryError> {
        let url = self.page_url(page, per_page)?;

        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .get(url.as_str())
                    .header(reqwest::header::ACCEPT, "application/json")
                    .send()
                    .await?;
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(60);
                    return Err(RegistryError::RateLimited { retry_after_secs });
                }

                if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(RegistryError::NotFound { url });
                }

                if !status.is_success() {
                    return Err(RegistryError::UnexpectedStatus {
                        status: status.as_u16(),
                        url,
                    });
                }

                let body = response.text().await?;
                serde_json::from_str::<RegistryPage>(&body).map_err(|e| {
                    RegistryError::Deserialize {
                        context: format!("registry page {page}"),
                        source: e,
                    }
                })
            }
        })
        .await
    }

    fn page_url(&self, page: u32, per_page: u32) -> Result<String, RegistryError> {
        let mut url = self
            .base_url
            .join(SLOTS_PATH)
            .map_err(|e| RegistryError::InvalidBaseUrl {
                base_url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &per_page.to_string());
        Ok(url.to_string())
    }
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
