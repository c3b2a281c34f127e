//! Price level types with decimal precision

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

/// A single `[price, size]` entry of a book message
///
/// A size of zero means the level at `price` is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "WireLevel")]
pub struct PriceLevel {
    /// Exact price of this level
    pub price: Decimal,
    /// Quantity resting at this price
    pub size: Decimal,
}

impl PriceLevel {
    /// Create a new price level
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }

    /// Check if this level removes its price from the book
    pub fn is_removal(&self) -> bool {
        self.size <= Decimal::ZERO
    }
}

impl From<(Decimal, Decimal)> for PriceLevel {
    fn from((price, size): (Decimal, Decimal)) -> Self {
        Self::new(price, size)
    }
}

/// Wire shape: a two element array
#[derive(Deserialize)]
struct WireLevel(
    #[serde(deserialize_with = "deserialize_decimal")] Decimal,
    #[serde(deserialize_with = "deserialize_decimal")] Decimal,
);

impl From<WireLevel> for PriceLevel {
    fn from(WireLevel(price, size): WireLevel) -> Self {
        Self::new(price, size)
    }
}

/// Parses JSON numbers through their textual form so that f64 rounding
/// never reaches a price or size
fn deserialize_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use std::str::FromStr;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(serde_json::Number),
    }

    let text = match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    };

    if text.contains('e') || text.contains('E') {
        Decimal::from_scientific(&text).map_err(D::Error::custom)
    } else {
        Decimal::from_str(&text).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_level_from_json_numbers() {
        let level: PriceLevel = serde_json::from_str("[34275.5, 2835.0]").unwrap();

        assert_eq!(level.price, dec!(34275.5));
        assert_eq!(level.size, dec!(2835));
    }

    #[test]
    fn test_level_from_json_strings() {
        let level: PriceLevel = serde_json::from_str(r#"["88813.5", "0.00460208"]"#).unwrap();

        assert_eq!(level.price.to_string(), "88813.5");
        assert_eq!(level.size.to_string(), "0.00460208");
    }

    #[test]
    fn test_level_scientific_notation() {
        let level: PriceLevel = serde_json::from_str("[0.05005, 5e-6]").unwrap();

        assert_eq!(level.price, dec!(0.05005));
        assert_eq!(level.size, dec!(0.000005));
    }

    #[test]
    fn test_level_rejects_wrong_arity() {
        assert!(serde_json::from_str::<PriceLevel>("[100.0]").is_err());
        assert!(serde_json::from_str::<PriceLevel>(r#"{"price": 1, "size": 2}"#).is_err());
    }

    #[test]
    fn test_zero_size_is_removal() {
        assert!(PriceLevel::new(dec!(100), Decimal::ZERO).is_removal());
        assert!(!PriceLevel::new(dec!(100), dec!(1)).is_removal());
    }
}
