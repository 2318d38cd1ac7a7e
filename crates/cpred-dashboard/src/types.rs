//! Dashboard snapshot types.
//!
//! These are what a renderer consumes; they are derived from the view state
//! and never written back.

use chrono::Utc;
use cpred_core::{MarketRecord, ViewState};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::status::FeedStatus;

/// Full dashboard snapshot at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    /// Timestamp when snapshot was taken (Unix milliseconds).
    pub timestamp_ms: i64,
    pub status: FeedStatus,
    /// Show the loading skeleton instead of cards.
    pub loading: bool,
    pub revision: u64,
    /// Headline cards, in record order.
    pub cards: Vec<MarketCard>,
    /// Score trend over all records.
    pub scores: Vec<ScorePoint>,
}

impl DashboardSnapshot {
    pub fn from_view(view: &ViewState, status: FeedStatus, headline_count: usize) -> Self {
        Self {
            timestamp_ms: Utc::now().timestamp_millis(),
            status,
            loading: view.is_loading(),
            revision: view.revision(),
            cards: view
                .headline(headline_count)
                .iter()
                .map(MarketCard::from)
                .collect(),
            scores: view
                .score_series()
                .into_iter()
                .map(|(symbol, score)| ScorePoint {
                    symbol: symbol.to_string(),
                    score,
                })
                .collect(),
        }
    }
}

/// One headline card.
#[derive(Debug, Clone, Serialize)]
pub struct MarketCard {
    pub symbol: String,
    /// Price rounded to cents.
    pub price: Decimal,
    pub volume: Decimal,
    /// Volume valued at the current price.
    pub notional: Decimal,
    /// 24h change in percent.
    pub change_24h: f64,
    /// Flat or positive change (rendered green).
    pub gaining: bool,
    pub score: f64,
}

impl From<&MarketRecord> for MarketCard {
    fn from(record: &MarketRecord) -> Self {
        Self {
            symbol: record.symbol.clone(),
            price: record.price.round_cents(),
            volume: record.volume.inner(),
            notional: record.volume.notional(record.price),
            change_24h: record.change24h,
            gaining: record.is_gaining(),
            score: record.score,
        }
    }
}

/// One point of the score chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScorePoint {
    pub symbol: String,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpred_core::{Price, SnapshotSource, ViewStateStore, Volume};
    use rust_decimal_macros::dec;

    fn record(symbol: &str, change: f64, score: f64) -> MarketRecord {
        MarketRecord::new(
            symbol,
            Price::new(dec!(100.456)),
            Volume::new(dec!(2)),
            change,
            score,
        )
    }

    #[test]
    fn test_snapshot_limits_cards_but_charts_everything() {
        let store = ViewStateStore::new();
        store.apply_snapshot(
            SnapshotSource::Fetch,
            vec![
                record("BTC", 2.5, 0.9),
                record("ETH", -1.0, 0.5),
                record("SOL", 0.0, 0.3),
                record("DOGE", 4.0, 0.1),
            ],
        );

        let snapshot = DashboardSnapshot::from_view(&store.current(), FeedStatus::Live, 3);

        assert!(!snapshot.loading);
        assert_eq!(snapshot.cards.len(), 3);
        assert_eq!(snapshot.scores.len(), 4);
        assert_eq!(snapshot.cards[0].price, dec!(100.46));
        assert_eq!(snapshot.cards[0].notional, dec!(200.912));
        assert!(snapshot.cards[0].gaining);
        assert!(!snapshot.cards[1].gaining);
        assert_eq!(
            snapshot.scores[3],
            ScorePoint {
                symbol: "DOGE".to_string(),
                score: 0.1
            }
        );
    }

    #[test]
    fn test_snapshot_serializes_status() {
        let snapshot = DashboardSnapshot::from_view(&ViewState::new(), FeedStatus::Loading, 3);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "loading");
        assert_eq!(json["loading"], true);
        assert!(json["cards"].as_array().unwrap().is_empty());
    }
}
