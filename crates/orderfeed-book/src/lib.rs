//! Order book engine for the `book_ui_1` feed
//!
//! This crate provides the price level storage, the price grouping used for
//! display and the synchronizer state machine that reconciles snapshots and
//! deltas into a published book state.
//!
//! # Constraints
//!
//! - NO `tokio` and NO networking; the synchronizer is driven by its caller
//! - Prices and sizes are `Decimal` end to end
//!
//! # State Machine
//!
//! ```text
//! Disconnected → Connecting → Subscribed
//!       └────────────┴────────────┴──→ Failed (until reset)
//! ```
//!
//! # Example
//!
//! ```
//! use orderfeed_book::{FeedSynchronizer, FeedStatus};
//! use orderfeed_types::ProductId;
//!
//! let mut sync = FeedSynchronizer::new(ProductId::XbtUsd);
//! assert_eq!(sync.status(), &FeedStatus::Disconnected);
//!
//! sync.connect().unwrap();
//! let subscribe = sync.on_open().unwrap();
//! assert_eq!(subscribe.product_ids, vec![ProductId::XbtUsd]);
//! ```

pub mod grouping;
pub mod level_map;
pub mod synchronizer;

// Re-export main types
pub use grouping::{group_and_total_orders, GroupedBook, GroupedLevel};
pub use level_map::{apply_order_data_delta, LevelMap};
pub use synchronizer::{FeedStatus, FeedSynchronizer, OrderFeedState};
