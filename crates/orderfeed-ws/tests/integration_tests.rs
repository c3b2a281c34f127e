//! Integration tests against the live order feed
//!
//! These tests make real WebSocket connections.
//! Run with: cargo test -p orderfeed-ws --test integration_tests -- --ignored
//!
//! Note: These tests are ignored by default to avoid making network calls during
//! normal test runs. They should be run manually or in a CI environment with
//! network access.

use orderfeed_ws::{
    FeedConfig, FeedStatus, OrderBookSession, OrderFeed, ProductId, Transport, WsTransport,
};
use std::time::Duration;
use tokio::time::timeout;

/// Test that the endpoint accepts a connection and greets with an info event
#[tokio::test]
#[ignore = "Makes real WebSocket connection"]
async fn test_ws_connection() {
    let config = FeedConfig::new();
    let mut transport = WsTransport::new(config.endpoint.clone());

    transport.connect().await.expect("Should connect");
    let greeting = timeout(Duration::from_secs(10), transport.recv())
        .await
        .expect("Greeting timed out")
        .expect("Receive failed")
        .expect("Connection closed");

    assert!(greeting.contains(r#""event":"info""#), "Unexpected greeting: {}", greeting);
    transport.close().await.expect("Should close");
}

/// Test that a snapshot arrives after subscribing
#[tokio::test]
#[ignore = "Makes real WebSocket connection"]
async fn test_snapshot_received() {
    let config = FeedConfig::new();
    let transport = WsTransport::new(config.endpoint.clone());
    let handle = OrderFeed::spawn(config, transport).expect("Should spawn");

    let mut state = handle.watch_state();
    let result = timeout(Duration::from_secs(15), state.wait_for(|s| !s.bids.is_empty())).await;

    assert!(result.is_ok(), "Snapshot timed out");
    assert_eq!(handle.state().product_feed_subscription, ProductId::XbtUsd);
    assert_eq!(handle.stop().await, FeedStatus::Disconnected);
}

/// Test toggling between products on a live session
#[tokio::test]
#[ignore = "Makes real WebSocket connection"]
async fn test_toggle_feed() {
    let mut session = OrderBookSession::new(FeedConfig::new());
    session.start().expect("Should start");

    session.toggle_feed().expect("Should toggle");

    let result = timeout(Duration::from_secs(15), async {
        loop {
            let view = session.view();
            if view.book().map(|b| !b.bids.is_empty()).unwrap_or(false) {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await;

    let view = result.expect("ETH book timed out");
    assert_eq!(view.product, ProductId::EthUsd);
    assert!(!session.is_in_error_state());
    session.stop().await;
}

/// Test that killing and resetting a live feed recovers
#[tokio::test]
#[ignore = "Makes real WebSocket connection"]
async fn test_kill_and_reset() {
    let mut session = OrderBookSession::new(FeedConfig::new());
    session.start().expect("Should start");

    session.kill_feed();
    assert!(session.is_in_error_state());

    session.reset_feed().await.expect("Should reset");
    assert!(!session.is_in_error_state());
    session.stop().await;
}
