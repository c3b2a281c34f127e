//! Price grouping and cumulative totals
//!
//! Raw levels are bucketed to `floor(price / increment) * increment`, sizes
//! are summed per bucket and a running total is carried along the sorted
//! buckets. Everything stays in `Decimal`, so totals never drift.

use crate::level_map::LevelMap;
use orderfeed_types::GroupingIncrement;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// One display row after grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupedLevel {
    /// Bucket floor price
    pub price: Decimal,
    /// Summed size of the raw levels in the bucket
    pub size: Decimal,
    /// Cumulative size from the best price up to and including this bucket
    pub total: Decimal,
}

impl GroupedLevel {
    /// Share of `max_total` covered by this row, in `[0, 1]`
    ///
    /// Used to size depth bars.
    pub fn depth_fraction(&self, max_total: Decimal) -> Decimal {
        if max_total <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.total / max_total).clamp(Decimal::ZERO, Decimal::ONE)
    }
}

/// Group `levels` into `increment` buckets
///
/// `descending` puts the highest price first (bids); otherwise the lowest
/// price comes first (asks). An empty side yields an empty vector.
pub fn group_and_total_orders(
    levels: &LevelMap,
    increment: GroupingIncrement,
    descending: bool,
) -> Vec<GroupedLevel> {
    let step = increment.value();
    let mut buckets: BTreeMap<Decimal, Decimal> = BTreeMap::new();

    for (price, size) in levels.iter() {
        let floor = (price / step).floor() * step;
        *buckets.entry(floor).or_insert(Decimal::ZERO) += size;
    }

    let ordered: Box<dyn Iterator<Item = (Decimal, Decimal)>> = if descending {
        Box::new(buckets.into_iter().rev())
    } else {
        Box::new(buckets.into_iter())
    };

    let mut total = Decimal::ZERO;
    ordered
        .map(|(price, size)| {
            total += size;
            GroupedLevel { price, size, total }
        })
        .collect()
}

/// Both sides of the book grouped for display
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedBook {
    /// Bids, best (highest) first
    pub bids: Vec<GroupedLevel>,
    /// Asks, best (lowest) first
    pub asks: Vec<GroupedLevel>,
}

impl GroupedBook {
    /// Group both sides with the same increment
    pub fn new(bids: &LevelMap, asks: &LevelMap, increment: GroupingIncrement) -> Self {
        Self {
            bids: group_and_total_orders(bids, increment, true),
            asks: group_and_total_orders(asks, increment, false),
        }
    }

    /// Largest cumulative total on either side; depth bars scale against it
    pub fn max_total(&self) -> Decimal {
        let last_bid = self.bids.last().map(|l| l.total).unwrap_or_default();
        let last_ask = self.asks.last().map(|l| l.total).unwrap_or_default();
        last_bid.max(last_ask)
    }

    /// Gap between the best ask bucket and the best bid bucket
    pub fn spread(&self) -> Option<Decimal> {
        match (self.asks.first(), self.bids.first()) {
            (Some(ask), Some(bid)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Check if both sides are empty
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}
