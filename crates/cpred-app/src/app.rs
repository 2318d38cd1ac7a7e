//! Application runner.
//!
//! Builds the REST client from configuration and drives either a dashboard
//! session or a one-off checkout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cpred_api::{
    ApiClient, CheckoutConfig, CheckoutInitiator, CheckoutRedirect, SubscriptionTier,
};
use cpred_core::{BearerToken, Origin, SessionCredentials};
use cpred_dashboard::{DashboardSession, SessionSources};
use cpred_telemetry::{FeedSummary, Metrics};
use cpred_ws::TungsteniteTransport;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::AppResult;

/// Main application.
pub struct Application {
    config: AppConfig,
    origin: Origin,
    api: ApiClient,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let origin = config.parsed_origin()?;
        let credentials = match config.credentials.resolve_cookie() {
            Some(cookie) => SessionCredentials::from_cookie_header(cookie),
            None => {
                warn!("No session cookie configured; backend requests will be anonymous");
                SessionCredentials::default()
            }
        };
        let api = ApiClient::new(origin.clone(), credentials, config.http_timeout())?;

        Ok(Self {
            config,
            origin,
            api,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Start a dashboard session against the configured backend.
    pub fn start_dashboard(&self) -> DashboardSession {
        let api = Arc::new(self.api.clone());
        let sources = SessionSources::new(api.clone(), api, Arc::new(TungsteniteTransport));
        DashboardSession::start(
            self.config.dashboard.clone(),
            self.config.stream_config(&self.origin),
            sources,
        )
    }

    /// Run the dashboard until `shutdown` resolves, logging every view update.
    pub async fn run_dashboard(&self, shutdown: impl Future<Output = ()>) -> AppResult<()> {
        let session = self.start_dashboard();
        let mut view_rx = session.subscribe();
        let status_every = match self.config.dashboard.status_interval_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        let mut status_tick =
            tokio::time::interval(status_every.unwrap_or(Duration::from_secs(3600)));
        status_tick.tick().await;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                changed = view_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.log_snapshot(&session);
                }
                _ = status_tick.tick(), if status_every.is_some() => {
                    info!(status = %session.feed_status(), stream = %session.stream_state(), "Feed status");
                }
            }
        }

        session.teardown().await;

        FeedSummary::collect().log();
        match Metrics::encode_text() {
            Ok(text) => debug!(metrics = %text, "Prometheus metrics at shutdown"),
            Err(e) => warn!(error = %e, "Failed to encode metrics"),
        }
        Ok(())
    }

    fn log_snapshot(&self, session: &DashboardSession) {
        let snapshot = session.snapshot();
        let headline: Vec<String> = snapshot
            .cards
            .iter()
            .map(|c| format!("{} ${} ({:+.2}%)", c.symbol, c.price, c.change_24h))
            .collect();
        info!(
            revision = snapshot.revision,
            status = %snapshot.status,
            loading = snapshot.loading,
            records = snapshot.scores.len(),
            ?headline,
            "Dashboard updated"
        );
        match serde_json::to_string(&snapshot) {
            Ok(json) => debug!(snapshot = %json, "Dashboard snapshot"),
            Err(e) => warn!(error = %e, "Failed to serialize dashboard snapshot"),
        }
    }

    /// Create a checkout session for `tier` (or the configured default tier).
    pub async fn checkout(&self, tier: Option<&str>) -> AppResult<CheckoutRedirect> {
        let bearer = BearerToken::load(&self.config.credentials.token_path)?;
        if bearer.is_none() {
            warn!(
                path = %self.config.credentials.token_path,
                "No bearer credential found"
            );
        }

        let initiator =
            CheckoutInitiator::new(&self.api, bearer, CheckoutConfig::from(&self.config.checkout));
        let tier = tier.unwrap_or(self.config.checkout.default_tier.as_str());
        let redirect = initiator.initiate_checkout(tier).await?;
        if let Ok(tier) = SubscriptionTier::parse(tier) {
            info!(label = %tier.label(), url = %redirect.url, "Checkout ready");
        }
        Ok(redirect)
    }
}
