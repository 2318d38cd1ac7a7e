//! HTTP client for the market-data backend.
//!
//! Both GET endpoints use the same session authentication: the cookie header
//! plus the anti-forgery token echoed in `X-CSRF-Token`.

use crate::error::{ApiError, ApiResult, FetchError, TokenError};
use cpred_core::{
    parse_snapshot, MarketRecord, Origin, SessionCredentials, StreamToken, CSRF_HEADER_NAME,
};
use reqwest::header::COOKIE;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Body of `GET /api/ws-token`.
#[derive(Debug, Deserialize)]
struct WsTokenResponse {
    token: String,
}

/// Client for the backend REST endpoints.
#[derive(Clone)]
pub struct ApiClient {
    /// HTTP client.
    client: Client,
    /// Backend origin all URLs are derived from.
    origin: Origin,
    /// Cookie + anti-forgery token, injected by the session owner.
    credentials: SessionCredentials,
}

impl ApiClient {
    /// Create a new API client.
    pub fn new(
        origin: Origin,
        credentials: SessionCredentials,
        timeout: Duration,
    ) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        if credentials.anti_forgery.is_empty() {
            warn!("No XSRF-TOKEN cookie configured, sending empty anti-forgery header");
        }

        Ok(Self {
            client,
            origin,
            credentials,
        })
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Underlying HTTP client, shared with the checkout initiator.
    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    fn session_get(&self, url: &str) -> RequestBuilder {
        let request = self
            .client
            .get(url)
            .header(CSRF_HEADER_NAME, self.credentials.anti_forgery.as_str());
        match &self.credentials.cookie {
            Some(cookie) => request.header(COOKIE, cookie),
            None => request,
        }
    }

    /// Fetch the current market snapshot.
    ///
    /// # API Details
    /// `GET /api/market-data` returns a JSON array of records, no pagination.
    pub async fn get_market_data(&self) -> Result<Vec<MarketRecord>, FetchError> {
        let url = self.origin.market_data_url();
        info!(url = %url, "Fetching market snapshot");

        let response = self
            .session_get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(format!("Failed to read body: {e}")))?;
        let records = parse_snapshot(&body).map_err(|e| FetchError::Malformed(e.to_string()))?;

        info!(count = records.len(), "Fetched market snapshot");
        Ok(records)
    }

    /// Request a fresh stream token. Never cached.
    pub async fn get_ws_token(&self) -> Result<StreamToken, TokenError> {
        let url = self.origin.ws_token_url();
        debug!(url = %url, "Requesting stream token");

        let response = self
            .session_get(&url)
            .send()
            .await
            .map_err(|e| TokenError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: WsTokenResponse = response
            .json()
            .await
            .map_err(|e| TokenError::Malformed(e.to_string()))?;

        if body.token.is_empty() {
            return Err(TokenError::Malformed("empty token".to_string()));
        }

        debug!("Stream token issued");
        Ok(StreamToken::new(body.token))
    }
}
