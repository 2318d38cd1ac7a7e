//! Dashboard session for the crypto predictor.
//!
//! Wires the pieces together for one activation of the dashboard:
//!
//! ```text
//!   SnapshotFetcher ──(once)──┐
//!                             ▼
//!                      ViewStateStore ──watch──► renderer
//!                             ▲
//!   StreamingClient ──(each message)
//! ```
//!
//! The renderer reads [`DashboardSnapshot`]s and a [`FeedStatus`]; nothing in
//! the presentation path writes back to the view state.

mod config;
mod session;
mod status;
mod types;

pub use config::DashboardConfig;
pub use session::{DashboardSession, SessionSources};
pub use status::FeedStatus;
pub use types::{DashboardSnapshot, MarketCard, ScorePoint};
