//! Crypto predictor command-line client.
//!
//! Runs the live dashboard feed (initial snapshot plus streaming updates)
//! or starts a subscription checkout against the backend.

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
