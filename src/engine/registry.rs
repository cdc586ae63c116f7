use std::fmt;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::engine::ladder::PriceLadder;
use crate::engine::types::{LadderError, LevelEntry, Predicate, Side, Trade, DEFAULT_TICK_SIZE};

/// Composite market identifier. Two venues may reuse a market id, so the
/// exchange is always part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarketKey {
    pub exchange_id: String,
    pub market_id: String,
}

impl MarketKey {
    pub fn new(exchange_id: impl Into<String>, market_id: impl Into<String>) -> Self {
        Self { exchange_id: exchange_id.into(), market_id: market_id.into() }
    }
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.exchange_id, self.market_id)
    }
}

/// Payload of an update: a single level or a batch.
#[derive(Debug, Clone, Copy)]
pub enum LevelData<'a> {
    One(LevelEntry),
    Many(&'a [LevelEntry]),
}

impl From<LevelEntry> for LevelData<'_> {
    fn from(entry: LevelEntry) -> Self {
        LevelData::One(entry)
    }
}

impl<'a> From<&'a [LevelEntry]> for LevelData<'a> {
    fn from(entries: &'a [LevelEntry]) -> Self {
        LevelData::Many(entries)
    }
}

impl<'a> From<&'a Vec<LevelEntry>> for LevelData<'a> {
    fn from(entries: &'a Vec<LevelEntry>) -> Self {
        LevelData::Many(entries.as_slice())
    }
}

/// Owns one canonical ("yes" perspective) ladder per market.
///
/// Every feed-apply operation is tolerant: an unknown market is a no-op, never
/// an error, so out-of-order feed messages cannot stall a stream. The registry
/// does no locking of its own; callers serialise access per market.
#[derive(Debug)]
pub struct MarketRegistry {
    books: AHashMap<MarketKey, PriceLadder>,
    default_tick: f64,
}

impl Default for MarketRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketRegistry {
    pub fn new() -> Self {
        Self { books: AHashMap::new(), default_tick: DEFAULT_TICK_SIZE }
    }

    /// Registry whose freshly initialised markets start on `tick_size`.
    pub fn with_default_tick(tick_size: f64) -> Result<Self, LadderError> {
        // Build once so a bad configured tick fails here.
        PriceLadder::empty(tick_size)?;
        Ok(Self { books: AHashMap::new(), default_tick: tick_size })
    }

    pub fn default_tick(&self) -> f64 {
        self.default_tick
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn contains(&self, exchange_id: &str, market_id: &str) -> bool {
        self.books.contains_key(&MarketKey::new(exchange_id, market_id))
    }

    /// Registered keys in sorted order.
    pub fn markets(&self) -> Vec<MarketKey> {
        let mut keys: Vec<MarketKey> = self.books.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn ladder(&self, exchange_id: &str, market_id: &str) -> Option<&PriceLadder> {
        self.books.get(&MarketKey::new(exchange_id, market_id))
    }

    fn ladder_mut(&mut self, exchange_id: &str, market_id: &str) -> Option<&mut PriceLadder> {
        let ladder = self.books.get_mut(&MarketKey::new(exchange_id, market_id));
        if ladder.is_none() {
            debug!(exchange_id, market_id, "Ignoring operation on unknown market");
        }
        ladder
    }

    /// Create (or wholesale replace) the book for a market. Levels are given
    /// in the canonical "yes" perspective.
    #[instrument(level = "debug", skip(self, bids, offers), fields(bids = bids.len(), offers = offers.len()))]
    pub fn init_market(
        &mut self,
        exchange_id: &str,
        market_id: &str,
        bids: &[LevelEntry],
        offers: &[LevelEntry],
    ) -> Result<(), LadderError> {
        let ladder = PriceLadder::new(self.default_tick, bids, offers)?;
        let replaced = self.books.insert(MarketKey::new(exchange_id, market_id), ladder).is_some();
        info!(exchange_id, market_id, replaced, "Initialised market");
        metrics::gauge!("predlob_markets").set(self.books.len() as f64);
        Ok(())
    }

    pub fn remove_market(&mut self, exchange_id: &str, market_id: &str) -> Option<PriceLadder> {
        let removed = self.books.remove(&MarketKey::new(exchange_id, market_id));
        if removed.is_some() {
            info!(exchange_id, market_id, "Removed market");
            metrics::gauge!("predlob_markets").set(self.books.len() as f64);
        }
        removed
    }

    /// Apply level updates quoted in `predicate`'s perspective. Returns whether
    /// the market was known.
    #[instrument(level = "trace", skip(self, data))]
    pub fn update_market<'a>(
        &mut self,
        exchange_id: &str,
        market_id: &str,
        predicate: Predicate,
        side: Side,
        data: impl Into<LevelData<'a>>,
        is_delta: bool,
    ) -> bool {
        let Some(ladder) = self.ladder_mut(exchange_id, market_id) else {
            return false;
        };
        let canonical = |entry: &LevelEntry| {
            let (s, price) = predicate.to_canonical(side, entry.price);
            (s, LevelEntry::new(price, entry.quantity))
        };
        match data.into() {
            LevelData::One(entry) => {
                let (s, e) = canonical(&entry);
                ladder.update_level(&e, s, is_delta);
            }
            LevelData::Many(entries) => {
                let target = predicate.to_canonical(side, 0.0).0;
                let adjusted: Vec<LevelEntry> = entries.iter().map(|e| canonical(e).1).collect();
                ladder.update_levels(&adjusted, target, is_delta);
            }
        }
        true
    }

    /// Sparse (bids, offers) in the canonical perspective. Unknown markets read
    /// as empty.
    pub fn read_market(&self, exchange_id: &str, market_id: &str) -> (Vec<LevelEntry>, Vec<LevelEntry>) {
        match self.ladder(exchange_id, market_id) {
            Some(ladder) => ladder.ladder().into_levels(),
            None => (Vec::new(), Vec::new()),
        }
    }

    /// Re-grid a market. Unknown markets are ignored; an invalid tick is
    /// rejected and leaves the book as it was.
    #[instrument(level = "debug", skip(self))]
    pub fn retick(&mut self, exchange_id: &str, market_id: &str, new_tick_size: f64) -> Result<bool, LadderError> {
        match self.ladder_mut(exchange_id, market_id) {
            Some(ladder) => ladder.set_tick_size(new_tick_size).map(|_| true),
            None => Ok(false),
        }
    }

    /// Cross an order quoted in `predicate`'s perspective against the canonical
    /// book. Trade prices are reported back in that same perspective.
    #[instrument(level = "debug", skip(self))]
    pub fn match_market(
        &mut self,
        exchange_id: &str,
        market_id: &str,
        predicate: Predicate,
        side: Side,
        entry: LevelEntry,
    ) -> Vec<Trade> {
        let Some(ladder) = self.ladder_mut(exchange_id, market_id) else {
            return Vec::new();
        };
        let (s, price) = predicate.to_canonical(side, entry.price);
        let mut trades = ladder.match_order(&LevelEntry::new(price, entry.quantity), s);
        for t in &mut trades {
            t.price = predicate.from_canonical_price(t.price);
        }
        debug!(exchange_id, market_id, trades = trades.len(), "Matched order against market");
        trades
    }

    /// (best bid, best offer) in the canonical perspective.
    pub fn top_of_book(&self, exchange_id: &str, market_id: &str) -> Option<(Option<LevelEntry>, Option<LevelEntry>)> {
        self.ladder(exchange_id, market_id)
            .map(|l| (l.best_bid(), l.best_offer()))
    }
}
