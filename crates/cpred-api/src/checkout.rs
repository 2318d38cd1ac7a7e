//! Subscription checkout initiation.
//!
//! Creates a checkout session on the backend and turns the returned session
//! id into a hosted-checkout redirect. A missing bearer credential blocks the
//! action before any request is made.

use crate::client::ApiClient;
use crate::error::CheckoutError;
use cpred_core::BearerToken;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info};

/// Tier offered on the landing page.
pub const DEFAULT_TIER: &str = "premium";

/// Default base URL of the hosted checkout page.
pub const DEFAULT_REDIRECT_BASE: &str = "https://checkout.stripe.com/c/pay";

/// Hosted checkout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Payment provider publishable key (public, not a secret).
    #[serde(default)]
    pub publishable_key: String,
    /// Base URL the session id is appended to.
    #[serde(default = "default_redirect_base")]
    pub redirect_base: String,
}

fn default_redirect_base() -> String {
    DEFAULT_REDIRECT_BASE.to_string()
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            publishable_key: String::new(),
            redirect_base: default_redirect_base(),
        }
    }
}

/// Subscription tier name; any non-blank value, trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SubscriptionTier(String);

impl SubscriptionTier {
    pub fn parse(raw: &str) -> Result<Self, CheckoutError> {
        let tier = raw.trim();
        if tier.is_empty() {
            return Err(CheckoutError::InvalidTier(raw.to_string()));
        }
        Ok(Self(tier.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Button label, e.g. "Subscribe to Premium".
    pub fn label(&self) -> String {
        let mut chars = self.0.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        };
        format!("Subscribe to {capitalized}")
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize)]
struct CreateCheckoutRequest<'a> {
    tier: &'a SubscriptionTier,
}

#[derive(Debug, Deserialize)]
struct CreateCheckoutResponse {
    id: String,
}

/// Where to send the user to complete payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRedirect {
    pub session_id: String,
    pub url: String,
    pub publishable_key: String,
}

/// Starts checkout sessions for a signed-in user.
pub struct CheckoutInitiator {
    client: Client,
    url: String,
    bearer: Option<BearerToken>,
    config: CheckoutConfig,
}

impl CheckoutInitiator {
    /// Reuses the API client's connection pool and origin.
    pub fn new(api: &ApiClient, bearer: Option<BearerToken>, config: CheckoutConfig) -> Self {
        Self {
            client: api.http().clone(),
            url: api.origin().checkout_session_url(),
            bearer,
            config,
        }
    }

    pub fn has_credential(&self) -> bool {
        self.bearer.is_some()
    }

    /// Create a checkout session for `tier` and build the hosted redirect.
    pub async fn initiate_checkout(&self, tier: &str) -> Result<CheckoutRedirect, CheckoutError> {
        let result = self.try_initiate(tier).await;
        if let Err(e) = &result {
            error!(error = %e, tier, "Checkout initiation failed");
        }
        result
    }

    async fn try_initiate(&self, tier: &str) -> Result<CheckoutRedirect, CheckoutError> {
        let tier = SubscriptionTier::parse(tier)?;
        let bearer = self.bearer.as_ref().ok_or(CheckoutError::MissingCredential)?;

        info!(url = %self.url, %tier, "Creating checkout session");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(bearer.expose())
            .json(&CreateCheckoutRequest { tier: &tier })
            .send()
            .await
            .map_err(|e| CheckoutError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CheckoutError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: CreateCheckoutResponse = response
            .json()
            .await
            .map_err(|e| CheckoutError::Malformed(e.to_string()))?;
        if body.id.is_empty() {
            return Err(CheckoutError::Malformed("empty session id".to_string()));
        }

        let redirect = self.redirect_for(body.id);
        info!(session_id = %redirect.session_id, "Checkout session created");
        Ok(redirect)
    }

    fn redirect_for(&self, session_id: String) -> CheckoutRedirect {
        let base = self.config.redirect_base.trim_end_matches('/');
        CheckoutRedirect {
            url: format!("{base}/{session_id}"),
            session_id,
            publishable_key: self.config.publishable_key.clone(),
        }
    }
}
