// Convert decoded venue payloads into venue-neutral `MarketEvent`s.
// Prices come out as probabilities in [0, 1], books in the "yes" perspective.

use crate::engine::types::{LevelEntry, Predicate, Side};
use crate::market_data::events::MarketEvent;

pub const KALSHI: &str = "kalshi";
pub const POLYMARKET: &str = "polymarket";

/// Kalshi order-book snapshot: resting bids on each contract, prices in cents.
#[derive(Debug, Clone, PartialEq)]
pub struct KalshiSnapshot {
    pub market_ticker: String,
    pub yes: Vec<(i64, i64)>,
    pub no: Vec<(i64, i64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KalshiDelta {
    pub market_ticker: String,
    pub price_cents: i64,
    pub delta: i64,
    pub side: Predicate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolymarketBook {
    pub asset_id: String,
    pub bids: Vec<(f64, f64)>,
    pub asks: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolymarketChange {
    pub price: f64,
    pub side: Side,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolymarketPriceChange {
    pub asset_id: String,
    pub changes: Vec<PolymarketChange>,
}

// Cents -> probability, rounded to three places to shed float noise
pub fn cents_to_price(cents: i64) -> f64 {
    round3(cents as f64 / 100.0)
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// A resting "no" bid at `c` cents is a "yes" offer at `1 - c/100`.
pub fn kalshi_snapshot(msg: &KalshiSnapshot) -> MarketEvent {
    let bids = msg
        .yes
        .iter()
        .map(|&(cents, qty)| LevelEntry::new(cents_to_price(cents), qty as f64))
        .collect();
    let offers = msg
        .no
        .iter()
        .map(|&(cents, qty)| LevelEntry::new(round3(1.0 - cents as f64 / 100.0), qty as f64))
        .collect();
    MarketEvent::BookSnapshot {
        exchange_id: KALSHI.to_string(),
        market_id: msg.market_ticker.clone(),
        bids,
        offers,
    }
}

// Kalshi deltas always describe bids on the named contract
pub fn kalshi_delta(msg: &KalshiDelta) -> MarketEvent {
    MarketEvent::LevelUpdate {
        exchange_id: KALSHI.to_string(),
        market_id: msg.market_ticker.clone(),
        predicate: msg.side,
        side: Side::Bid,
        levels: vec![LevelEntry::new(msg.price_cents as f64 / 100.0, msg.delta as f64)],
        is_delta: true,
    }
}

pub fn polymarket_book(msg: &PolymarketBook) -> MarketEvent {
    MarketEvent::BookSnapshot {
        exchange_id: POLYMARKET.to_string(),
        market_id: msg.asset_id.clone(),
        bids: msg.bids.iter().copied().map(LevelEntry::from).collect(),
        offers: msg.asks.iter().copied().map(LevelEntry::from).collect(),
    }
}

/// Splits a price-change batch by side. Sizes are absolute level sizes; an
/// empty group produces no event.
pub fn polymarket_price_change(msg: &PolymarketPriceChange) -> Vec<MarketEvent> {
    let (bids, offers): (Vec<&PolymarketChange>, Vec<&PolymarketChange>) =
        msg.changes.iter().partition(|c| c.side == Side::Bid);
    [(Side::Bid, bids), (Side::Offer, offers)]
        .into_iter()
        .filter(|(_, group)| !group.is_empty())
        .map(|(side, group)| MarketEvent::LevelUpdate {
            exchange_id: POLYMARKET.to_string(),
            market_id: msg.asset_id.clone(),
            predicate: Predicate::Yes,
            side,
            levels: group.iter().map(|c| LevelEntry::new(c.price, c.size)).collect(),
            is_delta: false,
        })
        .collect()
}

pub fn polymarket_tick_size_change(asset_id: &str, new_tick_size: f64) -> MarketEvent {
    MarketEvent::TickSizeChange {
        exchange_id: POLYMARKET.to_string(),
        market_id: asset_id.to_string(),
        new_tick_size,
    }
}

pub fn polymarket_last_trade(asset_id: &str, price: f64, size: f64) -> MarketEvent {
    MarketEvent::LastTrade {
        exchange_id: POLYMARKET.to_string(),
        market_id: asset_id.to_string(),
        price,
        quantity: size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kalshi_snapshot_maps_no_bids_to_yes_offers() {
        let msg = KalshiSnapshot {
            market_ticker: "FED-25DEC".into(),
            yes: vec![(40, 100), (38, 5)],
            no: vec![(58, 50)],
        };
        match kalshi_snapshot(&msg) {
            MarketEvent::BookSnapshot { exchange_id, market_id, bids, offers } => {
                assert_eq!(exchange_id, KALSHI);
                assert_eq!(market_id, "FED-25DEC");
                assert_eq!(bids, vec![LevelEntry::new(0.4, 100.0), LevelEntry::new(0.38, 5.0)]);
                assert_eq!(offers, vec![LevelEntry::new(0.42, 50.0)]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_kalshi_delta_keeps_contract_side_as_predicate() {
        let msg = KalshiDelta { market_ticker: "T".into(), price_cents: 30, delta: -7, side: Predicate::No };
        match kalshi_delta(&msg) {
            MarketEvent::LevelUpdate { predicate, side, levels, is_delta, .. } => {
                assert_eq!(predicate, Predicate::No);
                assert_eq!(side, Side::Bid);
                assert!(is_delta);
                assert_eq!(levels, vec![LevelEntry::new(0.30, -7.0)]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_polymarket_price_change_groups_by_side() {
        let msg = PolymarketPriceChange {
            asset_id: "tok".into(),
            changes: vec![
                PolymarketChange { price: 0.51, side: Side::Bid, size: 10.0 },
                PolymarketChange { price: 0.53, side: Side::Offer, size: 0.0 },
                PolymarketChange { price: 0.50, side: Side::Bid, size: 3.0 },
            ],
        };
        let events = polymarket_price_change(&msg);
        assert_eq!(events.len(), 2);
        match &events[0] {
            MarketEvent::LevelUpdate { side, levels, is_delta, .. } => {
                assert_eq!(*side, Side::Bid);
                assert_eq!(levels.len(), 2);
                assert!(!is_delta);
            }
            other => panic!("unexpected event {other:?}"),
        }
        match &events[1] {
            MarketEvent::LevelUpdate { side, levels, .. } => {
                assert_eq!(*side, Side::Offer);
                assert_eq!(levels, &vec![LevelEntry::new(0.53, 0.0)]);
            }
            other => panic!("unexpected event {other:?}"),
        }

        let bids_only = PolymarketPriceChange {
            asset_id: "tok".into(),
            changes: vec![PolymarketChange { price: 0.51, side: Side::Bid, size: 1.0 }],
        };
        assert_eq!(polymarket_price_change(&bids_only).len(), 1);
    }

    #[test]
    fn test_cents_are_rounded_to_three_places() {
        assert_eq!(cents_to_price(7), 0.07);
        assert_eq!(cents_to_price(99), 0.99);
    }
}
