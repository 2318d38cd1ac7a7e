//! Market record and snapshot types.
//!
//! A snapshot is a complete list of records that replaces whatever the client
//! held before. Both the REST endpoint and the stream deliver snapshots.

use crate::error::{CoreError, Result};
use crate::{Price, Volume};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A single market row as published by the backend.
///
/// Immutable once built; updates arrive as whole new snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRecord {
    /// Short identifier (e.g., "BTC"). Unique within a snapshot.
    pub symbol: String,
    /// Last price, non-negative.
    pub price: Price,
    /// Traded volume, non-negative.
    pub volume: Volume,
    /// 24h change in percent (signed).
    #[serde(rename = "change_24h", alias = "change24h")]
    pub change24h: f64,
    /// Externally produced ranking signal. Unbounded.
    pub score: f64,
}

impl MarketRecord {
    pub fn new(
        symbol: impl Into<String>,
        price: Price,
        volume: Volume,
        change24h: f64,
        score: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            volume,
            change24h,
            score,
        }
    }

    /// Whether the 24h change is flat or positive.
    #[inline]
    pub fn is_gaining(&self) -> bool {
        self.change24h >= 0.0
    }

    /// Check the per-record invariants.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| CoreError::InvalidRecord {
            symbol: self.symbol.clone(),
            reason: reason.to_string(),
        };

        if self.symbol.trim().is_empty() {
            return Err(invalid("empty symbol"));
        }
        if self.price.is_negative() {
            return Err(invalid("negative price"));
        }
        if self.volume.is_negative() {
            return Err(invalid("negative volume"));
        }
        if !self.change24h.is_finite() {
            return Err(invalid("non-finite change_24h"));
        }
        if !self.score.is_finite() {
            return Err(invalid("non-finite score"));
        }
        Ok(())
    }
}

/// Validate a whole snapshot: every record valid, symbols unique.
pub fn validate_snapshot(records: &[MarketRecord]) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        record.validate()?;
        if !seen.insert(record.symbol.as_str()) {
            return Err(CoreError::DuplicateSymbol(record.symbol.clone()));
        }
    }
    Ok(())
}

/// Parse a REST snapshot body (`MarketRecord[]`).
pub fn parse_snapshot(body: &str) -> Result<Vec<MarketRecord>> {
    let records: Vec<MarketRecord> = serde_json::from_str(body)?;
    validate_snapshot(&records)?;
    Ok(records)
}

/// Stream message envelope: `{ "data": MarketRecord[] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamPayload {
    pub data: Vec<MarketRecord>,
}

impl StreamPayload {
    /// Parse and validate one inbound stream message.
    pub fn parse(text: &str) -> Result<Self> {
        let payload: Self = serde_json::from_str(text)?;
        validate_snapshot(&payload.data)?;
        Ok(payload)
    }

    pub fn into_records(self) -> Vec<MarketRecord> {
        self.data
    }
}
