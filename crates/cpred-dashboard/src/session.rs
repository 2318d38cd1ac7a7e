//! Dashboard session lifecycle.
//!
//! A session owns one [`ViewStateStore`] and two tasks writing to it: the
//! one-shot snapshot fetch and the streaming client. There is no ordering
//! between the two; whichever snapshot is applied last wins.
//!
//! Teardown closes the store first, so results still in flight are dropped,
//! then cancels both tasks. A fetch that has not started yet never starts.

use std::sync::Arc;

use cpred_api::{DynSnapshotFetcher, DynTokenGateway};
use cpred_core::{SnapshotSource, ViewState, ViewStateStore};
use cpred_telemetry::Metrics;
use cpred_ws::{
    DynReconnectTimer, DynStreamTransport, StreamConfig, StreamState, StreamingClient, TokioTimer,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DashboardConfig;
use crate::status::FeedStatus;
use crate::types::DashboardSnapshot;

/// Data sources a session is started with.
#[derive(Clone)]
pub struct SessionSources {
    pub fetcher: DynSnapshotFetcher,
    pub gateway: DynTokenGateway,
    pub transport: DynStreamTransport,
    pub timer: DynReconnectTimer,
}

impl SessionSources {
    /// Sources with a real-time reconnect timer.
    pub fn new(
        fetcher: DynSnapshotFetcher,
        gateway: DynTokenGateway,
        transport: DynStreamTransport,
    ) -> Self {
        Self {
            fetcher,
            gateway,
            transport,
            timer: Arc::new(TokioTimer),
        }
    }

    pub fn with_timer(mut self, timer: DynReconnectTimer) -> Self {
        self.timer = timer;
        self
    }
}

/// One activation of the dashboard.
pub struct DashboardSession {
    config: DashboardConfig,
    store: Arc<ViewStateStore>,
    client: Arc<StreamingClient>,
    shutdown_token: CancellationToken,
    stream_task: Option<JoinHandle<()>>,
}

impl DashboardSession {
    /// Start the initial fetch and the streaming client.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: DashboardConfig, stream: StreamConfig, sources: SessionSources) -> Self {
        let store = Arc::new(ViewStateStore::new());
        let shutdown_token = CancellationToken::new();

        let client = Arc::new(
            StreamingClient::new(stream, sources.gateway, sources.transport, store.clone())
                .with_timer(sources.timer)
                .with_shutdown_token(shutdown_token.clone()),
        );

        info!(url = %client.config().url, "Dashboard session starting");

        tokio::spawn(initial_fetch(
            sources.fetcher,
            store.clone(),
            shutdown_token.clone(),
        ));
        let stream_task = {
            let client = client.clone();
            tokio::spawn(async move { client.run().await })
        };

        Self {
            config,
            store,
            client,
            shutdown_token,
            stream_task: Some(stream_task),
        }
    }

    pub fn view(&self) -> ViewState {
        self.store.current()
    }

    /// Receiver notified on every applied snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.store.subscribe()
    }

    pub fn stream_state(&self) -> StreamState {
        self.client.state()
    }

    pub fn subscribe_stream_state(&self) -> watch::Receiver<StreamState> {
        self.client.subscribe_state()
    }

    pub fn feed_status(&self) -> FeedStatus {
        FeedStatus::derive(self.client.state(), &self.store.current())
    }

    /// Renderable snapshot of the current view.
    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot::from_view(
            &self.store.current(),
            self.feed_status(),
            self.config.headline_count,
        )
    }

    pub fn is_torn_down(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Stop the session and wait for the streaming client to exit.
    ///
    /// After this returns no further view state mutation, request, connection
    /// or retry happens. An initial fetch still in flight is abandoned.
    pub async fn teardown(mut self) {
        info!("Dashboard session teardown");
        self.stop();
        if let Some(task) = self.stream_task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Streaming task ended abnormally");
            }
        }
    }

    fn stop(&self) {
        self.store.close();
        self.shutdown_token.cancel();
    }
}

impl Drop for DashboardSession {
    fn drop(&mut self) {
        if !self.shutdown_token.is_cancelled() {
            debug!("Dashboard session dropped without teardown, stopping");
            self.stop();
        }
    }
}

async fn initial_fetch(
    fetcher: DynSnapshotFetcher,
    store: Arc<ViewStateStore>,
    shutdown_token: CancellationToken,
) {
    if shutdown_token.is_cancelled() {
        debug!("Session stopped before initial fetch");
        return;
    }
    let result = tokio::select! {
        biased;
        () = shutdown_token.cancelled() => {
            debug!("Initial fetch abandoned on teardown");
            return;
        }
        result = fetcher.fetch_snapshot() => result,
    };
    match result {
        Ok(records) => {
            let count = records.len();
            if store.apply_snapshot(SnapshotSource::Fetch, records) {
                Metrics::snapshot_applied(SnapshotSource::Fetch.as_str());
                info!(records = count, "Initial snapshot applied");
            }
        }
        Err(e) => {
            Metrics::fetch_failure();
            warn!(error = %e, "Initial snapshot fetch failed");
            store.mark_fetch_failed();
        }
    }
}
