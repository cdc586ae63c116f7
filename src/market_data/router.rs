// Router: single writer that applies normalised feed events to the registry
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::registry::MarketRegistry;
use crate::engine::types::LadderError;
use crate::market_data::events::MarketEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    UnknownMarket,
    // event carries no book change (e.g. last trade prints)
    Ignored,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RouterStats {
    pub applied: usize,
    pub unknown_market: usize,
    pub ignored: usize,
    pub failed: usize,
}

impl RouterStats {
    pub fn total(&self) -> usize {
        self.applied + self.unknown_market + self.ignored + self.failed
    }
}

/// Owns the write side of a shared registry. Readers clone the handle from
/// [`FeedRouter::registry`] and take the lock briefly.
#[derive(Debug, Clone)]
pub struct FeedRouter {
    registry: Arc<Mutex<MarketRegistry>>,
}

impl FeedRouter {
    pub fn new(registry: MarketRegistry) -> Self {
        Self { registry: Arc::new(Mutex::new(registry)) }
    }

    pub fn registry(&self) -> Arc<Mutex<MarketRegistry>> {
        Arc::clone(&self.registry)
    }

    pub fn apply(&self, event: &MarketEvent) -> Result<Outcome, LadderError> {
        let mut registry = self.registry.lock();
        let outcome = match event {
            MarketEvent::BookSnapshot { exchange_id, market_id, bids, offers } => {
                registry.init_market(exchange_id, market_id, bids, offers)?;
                Outcome::Applied
            }
            MarketEvent::LevelUpdate { exchange_id, market_id, predicate, side, levels, is_delta } => {
                let known = registry.update_market(exchange_id, market_id, *predicate, *side, levels, *is_delta);
                if known { Outcome::Applied } else { Outcome::UnknownMarket }
            }
            MarketEvent::TickSizeChange { exchange_id, market_id, new_tick_size } => {
                if registry.retick(exchange_id, market_id, *new_tick_size)? {
                    Outcome::Applied
                } else {
                    Outcome::UnknownMarket
                }
            }
            MarketEvent::LastTrade { .. } => Outcome::Ignored,
        };
        Ok(outcome)
    }

    /// Drain `rx` until every sender is dropped. A bad event is logged and
    /// counted; it never stops the stream.
    pub async fn run(self, mut rx: mpsc::Receiver<MarketEvent>) -> RouterStats {
        let mut stats = RouterStats::default();
        while let Some(event) = rx.recv().await {
            let label = match self.apply(&event) {
                Ok(Outcome::Applied) => {
                    stats.applied += 1;
                    "applied"
                }
                Ok(Outcome::UnknownMarket) => {
                    stats.unknown_market += 1;
                    debug!(market = %event.key(), kind = event.kind(), "Event for unknown market");
                    "unknown_market"
                }
                Ok(Outcome::Ignored) => {
                    stats.ignored += 1;
                    "ignored"
                }
                Err(error) => {
                    stats.failed += 1;
                    warn!(market = %event.key(), kind = event.kind(), %error, "Rejected feed event");
                    "failed"
                }
            };
            metrics::counter!("predlob_feed_events_total", "outcome" => label).increment(1);
        }
        info!(?stats, "Feed router stopped");
        stats
    }
}
