//! Common fixtures for integration tests
//!
//! Frames follow the shapes sent by the book_ui_1 feed

#![allow(dead_code)]

use orderfeed_book::FeedSynchronizer;
use orderfeed_types::{InboundMessage, ProductId};

/// Greeting sent on connect
pub const INFO_MESSAGE: &str = r#"{"event":"info","version":1}"#;

/// Subscription acknowledgement
pub const SUBSCRIBED_XBT: &str =
    r#"{"event":"subscribed","feed":"book_ui_1","product_ids":["PI_XBTUSD"]}"#;

/// Two-level snapshot for PI_XBTUSD
pub const XBT_SNAPSHOT: &str = r#"{
    "numLevels": 25,
    "feed": "book_ui_1_snapshot",
    "bids": [[34275.5, 2835.0], [34299.0, 1000.0]],
    "asks": [[34292.5, 11223.0], [37292.5, 1000.0]],
    "product_id": "PI_XBTUSD"
}"#;

/// Snapshot whose levels collapse at a 2.50 grouping
pub const GROUPING_SNAPSHOT: &str = r#"{
    "numLevels": 25,
    "feed": "book_ui_1_snapshot",
    "bids": [[5000.0, 100.0], [5001.0, 100.0], [5002.0, 100.0], [5003.0, 100.0], [5006.0, 101.0]],
    "asks": [[2999.0, 701.0], [3000.0, 700.0], [3001.0, 700.0], [3002.0, 700.0], [3003.0, 700.0]],
    "product_id": "PI_XBTUSD"
}"#;

/// Removes the best bid and adds a new ask
pub const XBT_DELTA: &str = r#"{
    "feed": "book_ui_1",
    "product_id": "PI_XBTUSD",
    "bids": [[34299.0, 0.0]],
    "asks": [[34293.0, 500.0]]
}"#;

/// Heartbeat frame
pub const HEARTBEAT: &str = r#"{"feed":"heartbeat","time":1639650000000}"#;

/// Parse a fixture, panicking on bad fixtures
pub fn parse(frame: &str) -> InboundMessage {
    InboundMessage::parse(frame).expect("fixture should parse")
}

/// Synchronizer that has opened and subscribed
pub fn subscribed_synchronizer(product: ProductId) -> FeedSynchronizer {
    let mut sync = FeedSynchronizer::new(product);
    sync.connect().expect("fresh synchronizer connects");
    sync.on_open().expect("fresh synchronizer opens");
    sync
}
