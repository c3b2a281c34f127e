//! Native WebSocket driver for the `book_ui_1` order feed
//!
//! This crate runs an [`orderfeed_book::FeedSynchronizer`] against a live
//! connection and exposes the result to a front end.
//!
//! # Features
//!
//! - Snapshots shown immediately, deltas published on a fixed flush cadence
//! - Unsubscribe/subscribe reconciliation when the product changes
//! - Failures surfaced as values; recovery is an explicit reset, never a retry
//! - Transport abstraction with a mock for tests (`test-utils` feature)
//!
//! # Example
//!
//! ```no_run
//! use orderfeed_ws::{FeedConfig, OrderBookSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = OrderBookSession::new(FeedConfig::new());
//!     session.start()?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!
//!     let view = session.view();
//!     if let Some(book) = view.book() {
//!         for level in &book.bids {
//!             println!("{} {} {}", level.price, level.size, level.total);
//!         }
//!     }
//!
//!     session.stop().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod feed;
pub mod session;
pub mod transport;

// Re-export main types
pub use config::{endpoints, FeedConfig, MalformedMessagePolicy};
pub use feed::{FeedHandle, OrderFeed};
pub use orderfeed_book::{FeedStatus, GroupedBook, GroupedLevel, OrderFeedState};
pub use orderfeed_types::{FailureKind, FeedError, FeedFailure, GroupingIncrement, ProductId};
pub use session::{BookContent, BookView, OrderBookSession, TransportFactory};
pub use transport::{Transport, TransportError, WsTransport};

#[cfg(any(test, feature = "test-utils"))]
pub use transport::{MockServer, MockTransport};
