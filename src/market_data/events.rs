use serde::{Deserialize, Serialize};

use crate::engine::registry::MarketKey;
use crate::engine::types::{LevelEntry, Predicate, Side};

/// Venue-neutral book event, already normalised to probability prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketEvent {
    // Full book in the canonical "yes" perspective; replaces any prior book
    BookSnapshot {
        exchange_id: String,
        market_id: String,
        #[serde(default)]
        bids: Vec<LevelEntry>,
        #[serde(default)]
        offers: Vec<LevelEntry>,
    },
    LevelUpdate {
        exchange_id: String,
        market_id: String,
        #[serde(default = "default_predicate")]
        predicate: Predicate,
        side: Side,
        levels: Vec<LevelEntry>,
        #[serde(default)]
        is_delta: bool,
    },
    TickSizeChange {
        exchange_id: String,
        market_id: String,
        new_tick_size: f64,
    },
    // Informational only, the book does not change
    LastTrade {
        exchange_id: String,
        market_id: String,
        price: f64,
        quantity: f64,
    },
}

fn default_predicate() -> Predicate {
    Predicate::Yes
}

impl MarketEvent {
    pub fn key(&self) -> MarketKey {
        let (exchange_id, market_id) = match self {
            MarketEvent::BookSnapshot { exchange_id, market_id, .. }
            | MarketEvent::LevelUpdate { exchange_id, market_id, .. }
            | MarketEvent::TickSizeChange { exchange_id, market_id, .. }
            | MarketEvent::LastTrade { exchange_id, market_id, .. } => (exchange_id, market_id),
        };
        MarketKey::new(exchange_id.as_str(), market_id.as_str())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MarketEvent::BookSnapshot { .. } => "book_snapshot",
            MarketEvent::LevelUpdate { .. } => "level_update",
            MarketEvent::TickSizeChange { .. } => "tick_size_change",
            MarketEvent::LastTrade { .. } => "last_trade",
        }
    }
}
