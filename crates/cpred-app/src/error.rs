//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] cpred_core::CoreError),

    #[error("API client error: {0}")]
    Api(#[from] cpred_api::ApiError),

    #[error("Checkout failed: {0}")]
    Checkout(#[from] cpred_api::CheckoutError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] cpred_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
