//! Product and grouping enums

use crate::error::ParseEnumError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Instruments whose book can be tracked on the `book_ui_1` feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProductId {
    /// Bitcoin perpetual, quoted in USD
    #[default]
    #[serde(rename = "PI_XBTUSD")]
    XbtUsd,
    /// Ether perpetual, quoted in USD
    #[serde(rename = "PI_ETHUSD")]
    EthUsd,
}

impl ProductId {
    /// All supported products
    pub const ALL: [ProductId; 2] = [ProductId::XbtUsd, ProductId::EthUsd];

    /// Returns the product id as used in API messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::XbtUsd => "PI_XBTUSD",
            Self::EthUsd => "PI_ETHUSD",
        }
    }

    /// The other product (the "Toggle Feed" target)
    pub fn toggled(&self) -> Self {
        match self {
            Self::XbtUsd => Self::EthUsd,
            Self::EthUsd => Self::XbtUsd,
        }
    }

    /// Grouping increments offered for this product, finest first
    pub fn grouping_options(&self) -> &'static [GroupingIncrement] {
        match self {
            Self::XbtUsd => &[
                GroupingIncrement::FiftyCents,
                GroupingIncrement::OneDollar,
                GroupingIncrement::TwoPointFiveDollars,
            ],
            Self::EthUsd => &[
                GroupingIncrement::FiveCents,
                GroupingIncrement::TenCents,
                GroupingIncrement::TwentyFiveCents,
            ],
        }
    }

    /// Grouping selected when switching to this product
    pub fn default_grouping(&self) -> GroupingIncrement {
        self.grouping_options()[0]
    }

    /// Whether `grouping` is offered for this product
    pub fn supports_grouping(&self, grouping: GroupingIncrement) -> bool {
        self.grouping_options().contains(&grouping)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductId {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == upper)
            .ok_or_else(|| ParseEnumError::new("product id", s))
    }
}

/// Price bucket widths, in quote currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum GroupingIncrement {
    /// 0.05
    FiveCents,
    /// 0.10
    TenCents,
    /// 0.25
    TwentyFiveCents,
    /// 0.50
    #[default]
    FiftyCents,
    /// 1.00
    OneDollar,
    /// 2.50
    TwoPointFiveDollars,
}

impl GroupingIncrement {
    /// All increments, narrowest first
    pub const ALL: [GroupingIncrement; 6] = [
        GroupingIncrement::FiveCents,
        GroupingIncrement::TenCents,
        GroupingIncrement::TwentyFiveCents,
        GroupingIncrement::FiftyCents,
        GroupingIncrement::OneDollar,
        GroupingIncrement::TwoPointFiveDollars,
    ];

    /// Bucket width as an exact decimal
    pub fn value(&self) -> Decimal {
        match self {
            Self::FiveCents => Decimal::new(5, 2),
            Self::TenCents => Decimal::new(10, 2),
            Self::TwentyFiveCents => Decimal::new(25, 2),
            Self::FiftyCents => Decimal::new(50, 2),
            Self::OneDollar => Decimal::new(100, 2),
            Self::TwoPointFiveDollars => Decimal::new(250, 2),
        }
    }

    /// Selector label, e.g. "Group 0.50"
    pub fn label(&self) -> String {
        format!("Group {}", self)
    }
}

impl fmt::Display for GroupingIncrement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.value())
    }
}

impl FromStr for GroupingIncrement {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(|_| ParseEnumError::new("grouping", s))?;
        Self::ALL
            .into_iter()
            .find(|g| g.value() == value)
            .ok_or_else(|| ParseEnumError::new("grouping", s))
    }
}
