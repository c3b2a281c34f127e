//! Shared types for the `book_ui_1` order book feed
//!
//! This crate provides the core type definitions used across the orderfeed
//! workspace. It has minimal dependencies and can be used independently.
//!
//! # Key Types
//!
//! - [`ProductId`] - Instruments whose book can be tracked (e.g. "PI_XBTUSD")
//! - [`GroupingIncrement`] - Allowed price bucket widths
//! - [`PriceLevel`] - Book price level with decimal precision
//! - [`InboundMessage`], [`SubscriptionRequest`] - Wire messages
//! - [`FeedFailure`], [`FeedError`] - Error types

pub mod enums;
pub mod error;
pub mod level;
pub mod messages;

// Re-export commonly used types
pub use enums::*;
pub use error::*;
pub use level::*;
pub use messages::*;

// Re-export rust_decimal for users
pub use rust_decimal::Decimal;
