// Dense, level-aggregated book for a single binary market.
//
// Prices live on the grid `0, t, 2t, ..., floor(1/t) * t`. Each side is a
// contiguous `Vec<f64>` indexed by tick, so every level access is O(1) and a
// best-price query is a linear scan bounded by grid resolution.

use crate::engine::types::{LadderError, LevelEntry, Side, Trade};
use tracing::{debug, instrument, trace};

// Absorbs float noise in `1 / t` and `i * conv` before flooring/ceiling.
const GRID_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceLadder {
    tick_size: f64,
    bids: Vec<f64>,
    offers: Vec<f64>,
}

/// One row of the sparse ladder reconstruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LadderRow {
    Level { side: Side, index: usize, quantity: f64 },
    /// Zero-quantity marker placed at a fractional midpoint index.
    Midpoint { index: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LadderView {
    pub rows: Vec<LadderRow>,
    /// Midpoint between best bid and best offer, in index units.
    pub midpoint: f64,
    pub tick_size: f64,
}

impl LadderView {
    pub fn midpoint_price(&self) -> f64 {
        self.midpoint * self.tick_size
    }

    /// Split the rows back into (bids, offers) price lists, dropping the marker.
    pub fn into_levels(self) -> (Vec<LevelEntry>, Vec<LevelEntry>) {
        let mut bids = Vec::new();
        let mut offers = Vec::new();
        for row in self.rows {
            if let LadderRow::Level { side, index, quantity } = row {
                let entry = LevelEntry::new(index as f64 * self.tick_size, quantity);
                match side {
                    Side::Bid => bids.push(entry),
                    Side::Offer => offers.push(entry),
                }
            }
        }
        (bids, offers)
    }
}

fn validate_tick(tick_size: f64) -> Result<(), LadderError> {
    if tick_size.is_finite() && tick_size > 0.0 && tick_size <= 1.0 {
        Ok(())
    } else {
        Err(LadderError::InvalidGrid { tick_size })
    }
}

fn grid_len(tick_size: f64) -> usize {
    (1.0 / tick_size + GRID_EPSILON).floor() as usize + 1
}

fn snap(x: f64) -> f64 {
    let r = x.round();
    if (x - r).abs() < GRID_EPSILON { r } else { x }
}

impl PriceLadder {
    pub fn new(tick_size: f64, bids: &[LevelEntry], offers: &[LevelEntry]) -> Result<Self, LadderError> {
        validate_tick(tick_size)?;
        let n = grid_len(tick_size);
        let mut ladder = PriceLadder { tick_size, bids: vec![0.0; n], offers: vec![0.0; n] };
        for b in bids {
            ladder.update_level(b, Side::Bid, false);
        }
        for o in offers {
            ladder.update_level(o, Side::Offer, false);
        }
        trace!(tick_size, levels = n, "Built price ladder");
        Ok(ladder)
    }

    pub fn empty(tick_size: f64) -> Result<Self, LadderError> {
        Self::new(tick_size, &[], &[])
    }

    pub fn tick_size(&self) -> f64 {
        self.tick_size
    }

    /// Number of indices on the grid.
    pub fn grid_size(&self) -> usize {
        self.bids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.iter().chain(self.offers.iter()).all(|q| *q == 0.0)
    }

    pub fn index_to_price(&self, index: usize) -> f64 {
        index as f64 * self.tick_size
    }

    /// Rounded grid index for `price`, or `None` if it falls off the grid.
    pub fn price_to_index(&self, price: f64) -> Option<usize> {
        let raw = (price / self.tick_size).round();
        if raw >= 0.0 && raw < self.grid_size() as f64 {
            Some(raw as usize)
        } else {
            None
        }
    }

    fn clamped_index(&self, price: f64) -> usize {
        let raw = (price / self.tick_size).round().max(0.0);
        (raw as usize).min(self.grid_size() - 1)
    }

    pub fn quantity_at(&self, side: Side, index: usize) -> f64 {
        self.side(side).get(index).copied().unwrap_or(0.0)
    }

    pub fn total_quantity(&self, side: Side) -> f64 {
        self.side(side).iter().sum()
    }

    fn side(&self, side: Side) -> &[f64] {
        match side {
            Side::Bid => &self.bids,
            Side::Offer => &self.offers,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut Vec<f64> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Offer => &mut self.offers,
        }
    }

    /// Re-grid the book. Bids round down and offers round up, so a change in
    /// resolution can widen the spread but never tighten or cross it.
    #[instrument(level = "debug", skip(self), fields(old_tick = self.tick_size))]
    pub fn set_tick_size(&mut self, new_tick: f64) -> Result<(), LadderError> {
        validate_tick(new_tick)?;
        if new_tick == self.tick_size {
            return Ok(());
        }

        let new_n = grid_len(new_tick);
        let conv = self.tick_size / new_tick;
        let mut new_bids = vec![0.0; new_n];
        let mut new_offers = vec![0.0; new_n];
        let mut dropped = 0usize;

        for (i, qty) in self.bids.iter().enumerate().filter(|(_, q)| **q != 0.0) {
            let j = snap(i as f64 * conv).floor() as usize;
            match new_bids.get_mut(j) {
                Some(slot) => *slot += qty,
                None => dropped += 1,
            }
        }
        for (i, qty) in self.offers.iter().enumerate().filter(|(_, q)| **q != 0.0) {
            let j = snap(i as f64 * conv).ceil() as usize;
            match new_offers.get_mut(j) {
                Some(slot) => *slot += qty,
                None => dropped += 1,
            }
        }

        self.bids = new_bids;
        self.offers = new_offers;
        self.tick_size = new_tick;
        debug!(new_tick, levels = new_n, dropped, "Rebucketed ladder");
        Ok(())
    }

    pub fn best_bid(&self) -> Option<LevelEntry> {
        self.best_bid_index()
            .map(|i| LevelEntry::new(self.index_to_price(i), self.bids[i]))
    }

    pub fn best_offer(&self) -> Option<LevelEntry> {
        self.best_offer_index()
            .map(|i| LevelEntry::new(self.index_to_price(i), self.offers[i]))
    }

    fn best_bid_index(&self) -> Option<usize> {
        self.bids.iter().rposition(|q| *q != 0.0)
    }

    fn best_offer_index(&self) -> Option<usize> {
        self.offers.iter().position(|q| *q != 0.0)
    }

    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_offer()) {
            (Some(b), Some(o)) => Some(o.price - b.price),
            _ => None,
        }
    }

    pub fn update_level(&mut self, entry: &LevelEntry, side: Side, is_delta: bool) {
        let Some(i) = self.price_to_index(entry.price) else {
            trace!(price = entry.price, %side, "Dropping off-grid level");
            return;
        };
        let slot = &mut self.side_mut(side)[i];
        if is_delta {
            *slot += entry.quantity;
        } else {
            *slot = entry.quantity;
        }
    }

    pub fn update_levels(&mut self, entries: &[LevelEntry], side: Side, is_delta: bool) {
        for entry in entries {
            self.update_level(entry, side, is_delta);
        }
    }

    /// Cross an incoming limit order with the opposite side, best price first,
    /// up to and including the order's own price. Whatever is left rests at
    /// the order's price on its own side.
    pub fn match_order(&mut self, entry: &LevelEntry, side: Side) -> Vec<Trade> {
        let p = self.clamped_index(entry.price);
        let tick = self.tick_size;
        let mut trades = Vec::new();

        let remaining = match side {
            Side::Bid => Self::sweep(&mut self.offers, 0..=p, entry.quantity, tick, &mut trades),
            Side::Offer => {
                let top = self.bids.len() - 1;
                Self::sweep(&mut self.bids, (p..=top).rev(), entry.quantity, tick, &mut trades)
            }
        };

        if remaining > 0.0 {
            self.side_mut(side)[p] += remaining;
        }
        trace!(%side, index = p, trades = trades.len(), rested = remaining.max(0.0), "Matched order");
        trades
    }

    fn sweep(
        resting: &mut [f64],
        indices: impl Iterator<Item = usize>,
        mut remaining: f64,
        tick: f64,
        trades: &mut Vec<Trade>,
    ) -> f64 {
        for i in indices {
            if remaining <= 0.0 {
                break;
            }
            let vol = remaining.min(resting[i]);
            if vol > 0.0 {
                resting[i] -= vol;
                remaining -= vol;
                trades.push(Trade { price: i as f64 * tick, quantity: vol });
            }
        }
        remaining
    }

    /// Sparse view split at the best bid / best offer midpoint. An empty side
    /// anchors at its far edge (bids at 0, offers at the last index), so a
    /// one-sided book is always listed in full.
    pub fn ladder(&self) -> LadderView {
        let top = self.grid_size() - 1;
        let b = self.best_bid_index().unwrap_or(0);
        let o = self.best_offer_index().unwrap_or(top);
        let midpoint = (b + o) as f64 / 2.0;

        let mut rows = Vec::new();
        let bid_end = (midpoint.floor() as usize).min(top);
        for (index, quantity) in self.bids[..=bid_end].iter().copied().enumerate() {
            if quantity != 0.0 {
                rows.push(LadderRow::Level { side: Side::Bid, index, quantity });
            }
        }
        if midpoint.fract() != 0.0 {
            rows.push(LadderRow::Midpoint { index: midpoint });
        }
        let offer_start = midpoint.ceil() as usize;
        for (offset, quantity) in self.offers[offer_start..].iter().copied().enumerate() {
            if quantity != 0.0 {
                rows.push(LadderRow::Level { side: Side::Offer, index: offer_start + offset, quantity });
            }
        }

        LadderView { rows, midpoint, tick_size: self.tick_size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lv(price: f64, quantity: f64) -> LevelEntry {
        LevelEntry::new(price, quantity)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_initialise() {
        let ladder = PriceLadder::new(0.01, &[lv(0.40, 100.0)], &[lv(0.42, 50.0)]).unwrap();
        assert_eq!(ladder.grid_size(), 101);
        assert_eq!(ladder.quantity_at(Side::Bid, 40), 100.0);
        assert_eq!(ladder.quantity_at(Side::Offer, 42), 50.0);
        assert_eq!(ladder.total_quantity(Side::Bid), 100.0);
    }

    #[test]
    fn test_initialise_drops_off_grid_entries() {
        let ladder = PriceLadder::new(0.01, &[lv(1.5, 10.0), lv(-0.2, 5.0)], &[lv(0.999, 3.0)]).unwrap();
        assert_eq!(ladder.total_quantity(Side::Bid), 0.0);
        // 0.999 rounds to index 100, which is still on the grid
        assert_eq!(ladder.quantity_at(Side::Offer, 100), 3.0);
    }

    #[test]
    fn test_invalid_grid() {
        for tick in [0.0, -0.01, f64::NAN, f64::INFINITY, 1.5] {
            assert!(matches!(PriceLadder::empty(tick), Err(LadderError::InvalidGrid { .. })));
        }
    }

    #[test]
    fn test_best_bid_offer() {
        let ladder = PriceLadder::new(
            0.01,
            &[lv(0.30, 10.0), lv(0.35, 4.0)],
            &[lv(0.50, 7.0), lv(0.45, 2.0)],
        )
        .unwrap();
        let bb = ladder.best_bid().unwrap();
        let bo = ladder.best_offer().unwrap();
        assert!(approx(bb.price, 0.35) && bb.quantity == 4.0);
        assert!(approx(bo.price, 0.45) && bo.quantity == 2.0);
        assert!(approx(ladder.spread().unwrap(), 0.10));

        let empty = PriceLadder::empty(0.01).unwrap();
        assert_eq!(empty.best_bid(), None);
        assert_eq!(empty.best_offer(), None);
        assert_eq!(empty.spread(), None);
    }

    #[test]
    fn test_update_absolute_and_delta() {
        let mut ladder = PriceLadder::empty(0.01).unwrap();
        ladder.update_level(&lv(0.25, 10.0), Side::Bid, false);
        ladder.update_level(&lv(0.25, 5.0), Side::Bid, true);
        assert_eq!(ladder.quantity_at(Side::Bid, 25), 15.0);
        ladder.update_level(&lv(0.25, 2.0), Side::Bid, false);
        assert_eq!(ladder.quantity_at(Side::Bid, 25), 2.0);
        ladder.update_level(&lv(2.0, 2.0), Side::Bid, false);
        assert_eq!(ladder.total_quantity(Side::Bid), 2.0);
    }

    #[test]
    fn test_negative_delta_is_left_visible() {
        let mut ladder = PriceLadder::new(0.01, &[lv(0.20, 5.0)], &[]).unwrap();
        ladder.update_level(&lv(0.20, -8.0), Side::Bid, true);
        assert_eq!(ladder.quantity_at(Side::Bid, 20), -3.0);
        let bb = ladder.best_bid().unwrap();
        assert_eq!(bb.quantity, -3.0);
    }

    #[test]
    fn test_update_levels_batch() {
        let mut ladder = PriceLadder::empty(0.01).unwrap();
        ladder.update_levels(&[lv(0.60, 1.0), lv(7.0, 9.0), lv(0.61, 2.0)], Side::Offer, false);
        assert_eq!(ladder.quantity_at(Side::Offer, 60), 1.0);
        assert_eq!(ladder.quantity_at(Side::Offer, 61), 2.0);
    }

    #[test]
    fn test_buy_partially_fills_and_rests() {
        let mut ladder = PriceLadder::new(0.01, &[lv(0.40, 100.0)], &[lv(0.42, 50.0)]).unwrap();
        let trades = ladder.match_order(&lv(0.42, 80.0), Side::Bid);
        assert_eq!(trades.len(), 1);
        assert!(approx(trades[0].price, 0.42));
        assert_eq!(trades[0].quantity, 50.0);
        assert_eq!(ladder.quantity_at(Side::Offer, 42), 0.0);
        assert_eq!(ladder.quantity_at(Side::Bid, 42), 30.0);
        assert_eq!(ladder.quantity_at(Side::Bid, 40), 100.0);
    }

    #[test]
    fn test_buy_walks_offers_lowest_first() {
        let mut ladder = PriceLadder::new(0.01, &[], &[lv(0.50, 5.0), lv(0.48, 5.0), lv(0.55, 5.0)]).unwrap();
        let trades = ladder.match_order(&lv(0.52, 8.0), Side::Bid);
        assert_eq!(trades.len(), 2);
        assert!(approx(trades[0].price, 0.48) && trades[0].quantity == 5.0);
        assert!(approx(trades[1].price, 0.50) && trades[1].quantity == 3.0);
        assert_eq!(ladder.quantity_at(Side::Offer, 50), 2.0);
        assert_eq!(ladder.quantity_at(Side::Offer, 55), 5.0);
        assert_eq!(ladder.total_quantity(Side::Bid), 0.0);
    }

    #[test]
    fn test_sell_walks_bids_highest_first() {
        let mut ladder = PriceLadder::new(0.01, &[lv(0.30, 4.0), lv(0.35, 4.0), lv(0.20, 4.0)], &[]).unwrap();
        let trades = ladder.match_order(&lv(0.25, 10.0), Side::Offer);
        assert_eq!(trades.len(), 2);
        assert!(approx(trades[0].price, 0.35));
        assert!(approx(trades[1].price, 0.30));
        // 2 left over rests at 0.25 on the offer side, the 0.20 bid is untouched
        assert_eq!(ladder.quantity_at(Side::Offer, 25), 2.0);
        assert_eq!(ladder.quantity_at(Side::Bid, 20), 4.0);
    }

    #[test]
    fn test_exact_fill_rests_nothing() {
        let mut ladder = PriceLadder::new(0.01, &[], &[lv(0.42, 50.0)]).unwrap();
        let trades = ladder.match_order(&lv(0.45, 50.0), Side::Bid);
        assert_eq!(trades.len(), 1);
        assert_eq!(ladder.total_quantity(Side::Bid), 0.0);
        assert_eq!(ladder.total_quantity(Side::Offer), 0.0);
    }

    #[test]
    fn test_non_crossing_order_rests() {
        let mut ladder = PriceLadder::new(0.01, &[], &[lv(0.60, 10.0)]).unwrap();
        let trades = ladder.match_order(&lv(0.55, 10.0), Side::Bid);
        assert!(trades.is_empty());
        assert_eq!(ladder.quantity_at(Side::Bid, 55), 10.0);
    }

    #[test]
    fn test_match_clamps_off_grid_price() {
        let mut ladder = PriceLadder::new(0.01, &[], &[lv(0.99, 1.0)]).unwrap();
        let trades = ladder.match_order(&lv(1.7, 3.0), Side::Bid);
        assert_eq!(trades.len(), 1);
        assert_eq!(ladder.quantity_at(Side::Bid, 100), 2.0);
    }

    #[test]
    fn test_retick_bid_rounds_down() {
        let mut ladder = PriceLadder::new(0.01, &[lv(0.03, 10.0)], &[]).unwrap();
        ladder.set_tick_size(0.02).unwrap();
        assert_eq!(ladder.grid_size(), 51);
        assert_eq!(ladder.quantity_at(Side::Bid, 1), 10.0);
        assert!(approx(ladder.best_bid().unwrap().price, 0.02));
    }

    #[test]
    fn test_retick_offer_rounds_up() {
        let mut ladder = PriceLadder::new(0.01, &[], &[lv(0.03, 10.0)]).unwrap();
        ladder.set_tick_size(0.02).unwrap();
        assert_eq!(ladder.quantity_at(Side::Offer, 2), 10.0);
        assert!(approx(ladder.best_offer().unwrap().price, 0.04));
    }

    #[test]
    fn test_retick_aggregates_collisions() {
        let mut ladder = PriceLadder::new(0.01, &[lv(0.02, 1.0), lv(0.03, 2.0)], &[]).unwrap();
        ladder.set_tick_size(0.02).unwrap();
        assert_eq!(ladder.quantity_at(Side::Bid, 1), 3.0);
        assert_eq!(ladder.total_quantity(Side::Bid), 3.0);
    }

    #[test]
    fn test_retick_to_finer_grid() {
        let mut ladder = PriceLadder::new(0.01, &[lv(0.37, 6.0)], &[lv(0.41, 4.0)]).unwrap();
        ladder.set_tick_size(0.001).unwrap();
        assert_eq!(ladder.grid_size(), 1001);
        assert_eq!(ladder.quantity_at(Side::Bid, 370), 6.0);
        assert_eq!(ladder.quantity_at(Side::Offer, 410), 4.0);
    }

    #[test]
    fn test_retick_same_tick_is_noop() {
        let mut ladder = PriceLadder::new(0.01, &[lv(0.03, 10.0)], &[lv(0.07, 1.0)]).unwrap();
        let before = ladder.clone();
        ladder.set_tick_size(0.01).unwrap();
        assert_eq!(ladder, before);
    }

    #[test]
    fn test_retick_invalid_leaves_ladder_untouched() {
        let mut ladder = PriceLadder::new(0.01, &[lv(0.03, 10.0)], &[]).unwrap();
        let before = ladder.clone();
        assert!(ladder.set_tick_size(0.0).is_err());
        assert_eq!(ladder, before);
    }

    #[test]
    fn test_ladder_view_with_fractional_midpoint() {
        let ladder = PriceLadder::new(0.01, &[lv(0.40, 1.0), lv(0.38, 2.0)], &[lv(0.43, 3.0)]).unwrap();
        let view = ladder.ladder();
        assert_eq!(view.midpoint, 41.5);
        assert!(approx(view.midpoint_price(), 0.415));
        assert_eq!(
            view.rows,
            vec![
                LadderRow::Level { side: Side::Bid, index: 38, quantity: 2.0 },
                LadderRow::Level { side: Side::Bid, index: 40, quantity: 1.0 },
                LadderRow::Midpoint { index: 41.5 },
                LadderRow::Level { side: Side::Offer, index: 43, quantity: 3.0 },
            ]
        );
    }

    #[test]
    fn test_ladder_view_integral_midpoint_has_no_marker() {
        let ladder = PriceLadder::new(0.01, &[lv(0.40, 1.0)], &[lv(0.42, 3.0)]).unwrap();
        let view = ladder.ladder();
        assert_eq!(view.midpoint, 41.0);
        assert!(!view.rows.iter().any(|r| matches!(r, LadderRow::Midpoint { .. })));
        let (bids, offers) = view.into_levels();
        assert_eq!(bids.len(), 1);
        assert_eq!(offers.len(), 1);
    }

    #[test]
    fn test_ladder_view_one_sided_books() {
        let bids_only = PriceLadder::new(0.01, &[lv(0.90, 1.0), lv(0.10, 1.0)], &[]).unwrap();
        let (bids, offers) = bids_only.ladder().into_levels();
        assert_eq!(bids.len(), 2);
        assert!(offers.is_empty());

        let offers_only = PriceLadder::new(0.01, &[], &[lv(0.05, 1.0), lv(0.95, 1.0)]).unwrap();
        let (bids, offers) = offers_only.ladder().into_levels();
        assert!(bids.is_empty());
        assert_eq!(offers.len(), 2);

        let empty = PriceLadder::empty(0.01).unwrap();
        let view = empty.ladder();
        assert_eq!(view.midpoint, 50.0);
        assert!(view.rows.is_empty());
    }
}
