//! BTreeMap-based storage for one side of the book
//!
//! Keys are exact prices (never grouped). `Decimal` compares by value, so
//! `5000` and `5000.0` address the same level.

use orderfeed_types::PriceLevel;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Price → size for one side of the book
///
/// Invariant: every stored size is strictly positive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelMap {
    levels: BTreeMap<Decimal, Decimal>,
}

impl LevelMap {
    /// Create an empty side
    pub fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    /// Build a side from scratch, as a snapshot does
    pub fn from_levels<'a>(levels: impl IntoIterator<Item = &'a PriceLevel>) -> Self {
        let mut map = Self::new();
        map.apply(levels);
        map
    }

    /// Merge updates in place
    ///
    /// A positive size sets the level, anything else removes it. Later
    /// entries for the same price win.
    pub fn apply<'a>(&mut self, updates: impl IntoIterator<Item = &'a PriceLevel>) {
        for level in updates {
            self.set(level.price, level.size);
        }
    }

    /// Set one level; a size of zero (or less) removes it
    pub fn set(&mut self, price: Decimal, size: Decimal) {
        if size > Decimal::ZERO {
            self.levels.insert(price, size);
        } else {
            self.levels.remove(&price);
        }
    }

    /// Size at an exact price
    pub fn get(&self, price: &Decimal) -> Option<Decimal> {
        self.levels.get(price).copied()
    }

    /// Iterator over `(price, size)`, lowest price first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (Decimal, Decimal)> + '_ {
        self.levels.iter().map(|(price, size)| (*price, *size))
    }

    /// Number of levels
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Check if the side is empty
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Merge `updates` into a copy of `base`
///
/// The caller's map is left untouched so that consumers can keep comparing
/// the old and new values.
pub fn apply_order_data_delta(base: &LevelMap, updates: &[PriceLevel]) -> LevelMap {
    let mut next = base.clone();
    next.apply(updates);
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn level(price: Decimal, size: Decimal) -> PriceLevel {
        PriceLevel::new(price, size)
    }

    #[test]
    fn test_delta_sets_and_removes() {
        let base = LevelMap::from_levels(&[level(dec!(100), dec!(5))]);

        let next = apply_order_data_delta(
            &base,
            &[level(dec!(100), dec!(0)), level(dec!(101), dec!(3))],
        );

        assert_eq!(next.len(), 1);
        assert_eq!(next.get(&dec!(101)), Some(dec!(3)));
        assert_eq!(next.get(&dec!(100)), None);
    }

    #[test]
    fn test_delta_leaves_base_untouched() {
        let base = LevelMap::from_levels(&[level(dec!(100), dec!(5))]);
        let next = apply_order_data_delta(&base, &[level(dec!(100), dec!(7))]);

        assert_eq!(base.get(&dec!(100)), Some(dec!(5)));
        assert_eq!(next.get(&dec!(100)), Some(dec!(7)));
    }

    #[test]
    fn test_removing_absent_price_is_noop() {
        let base = LevelMap::from_levels(&[level(dec!(100), dec!(5))]);
        let next = apply_order_data_delta(&base, &[level(dec!(250), dec!(0))]);

        assert_eq!(next, base);
    }

    #[test]
    fn test_later_update_wins() {
        let next = apply_order_data_delta(
            &LevelMap::new(),
            &[level(dec!(100), dec!(1)), level(dec!(100), dec!(9))],
        );

        assert_eq!(next.get(&dec!(100)), Some(dec!(9)));
    }

    #[test]
    fn test_remove_then_readd_in_same_call() {
        let base = LevelMap::from_levels(&[level(dec!(100), dec!(5))]);
        let next = apply_order_data_delta(
            &base,
            &[level(dec!(100), dec!(0)), level(dec!(100), dec!(2))],
        );

        assert_eq!(next.get(&dec!(100)), Some(dec!(2)));
    }

    #[test]
    fn test_negative_size_removes() {
        let mut map = LevelMap::from_levels(&[level(dec!(100), dec!(5))]);
        map.set(dec!(100), dec!(-1));

        assert!(map.is_empty());
    }

    #[test]
    fn test_scale_insensitive_keys() {
        let mut map = LevelMap::from_levels(&[level(dec!(5000), dec!(1))]);
        map.set(dec!(5000.00), dec!(0));

        assert!(map.is_empty());
    }

    #[test]
    fn test_iteration_order() {
        let map = LevelMap::from_levels(&[
            level(dec!(101), dec!(1)),
            level(dec!(99), dec!(2)),
            level(dec!(100), dec!(3)),
        ]);

        let prices: Vec<Decimal> = map.iter().map(|(price, _)| price).collect();
        assert_eq!(prices, vec![dec!(99), dec!(100), dec!(101)]);
        assert_eq!(map.iter().next_back(), Some((dec!(101), dec!(1))));
    }
}
