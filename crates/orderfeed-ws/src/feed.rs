//! Order feed driver task
//!
//! [`OrderFeed::spawn`] moves the transport and a [`FeedSynchronizer`] into a
//! tokio task. A single `select!` loop multiplexes inbound frames, the flush
//! timer and commands from the [`FeedHandle`], so every mutation of the book
//! happens on that task. Published state and status are exposed through
//! `watch` channels.
//!
//! The driver never reconnects. Any transport error, a server close or an
//! injected failure ends the task with [`FeedStatus::Failed`]; recovery means
//! spawning a new feed.

use crate::config::{FeedConfig, MalformedMessagePolicy};
use crate::transport::{Transport, TransportError};
use orderfeed_book::{FeedStatus, FeedSynchronizer, OrderFeedState};
use orderfeed_types::{FeedError, FeedFailure, InboundMessage, ProductId, SubscriptionRequest};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Requests from the handle to the task
#[derive(Debug)]
enum Command {
    ChangeSubscription(ProductId),
    Fail(FeedFailure),
    Stop,
}

/// One wake-up of the driver loop
enum Step {
    Inbound(Result<Option<String>, TransportError>),
    Flush,
    Command(Option<Command>),
}

/// Entry point for running an order feed
pub struct OrderFeed;

impl OrderFeed {
    /// Start a feed over `transport`
    ///
    /// Must be called from within a tokio runtime. An invalid configuration is
    /// rejected, and with `force_error` set the failure is returned right away;
    /// in both cases no connection is attempted.
    pub fn spawn<T>(config: FeedConfig, transport: T) -> Result<FeedHandle, FeedError>
    where
        T: Transport + 'static,
    {
        config.validate()?;

        if config.force_error {
            let failure = FeedFailure::forced();
            error!(kind = ?failure.kind, "Order feed forced to fail on start");
            return Err(FeedError::Failed(failure));
        }

        let sync = FeedSynchronizer::new(config.product);
        let (state_tx, state_rx) = watch::channel(sync.state());
        let (status_tx, status_rx) = watch::channel(sync.status().clone());
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let driver = FeedDriver {
            config,
            transport,
            sync,
            commands: command_rx,
            state_tx,
            status_tx,
        };
        let task = tokio::spawn(driver.run());

        Ok(FeedHandle {
            commands: command_tx,
            state: state_rx,
            status: status_rx,
            task: Some(task),
        })
    }
}

/// Handle to a running feed
///
/// Dropping the handle stops the feed.
pub struct FeedHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<Arc<OrderFeedState>>,
    status: watch::Receiver<FeedStatus>,
    task: Option<JoinHandle<FeedStatus>>,
}

impl FeedHandle {
    /// Last published state
    pub fn state(&self) -> Arc<OrderFeedState> {
        Arc::clone(&self.state.borrow())
    }

    /// Receiver notified on every publication
    pub fn watch_state(&self) -> watch::Receiver<Arc<OrderFeedState>> {
        self.state.clone()
    }

    /// Current lifecycle state
    pub fn status(&self) -> FeedStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on status changes
    pub fn watch_status(&self) -> watch::Receiver<FeedStatus> {
        self.status.clone()
    }

    /// The failure, once the feed has failed
    pub fn failure(&self) -> Option<FeedFailure> {
        self.status.borrow().failure().cloned()
    }

    /// Ask the feed to move to another product
    pub fn change_subscription(&self, product: ProductId) -> Result<(), FeedError> {
        if let Some(failure) = self.failure() {
            return Err(FeedError::Failed(failure));
        }
        self.commands
            .send(Command::ChangeSubscription(product))
            .map_err(|_| FeedError::NotRunning)
    }

    /// Inject a failure
    ///
    /// Returns the failure immediately; the task applies it on its next turn.
    pub fn force_error(&self) -> FeedFailure {
        let failure = FeedFailure::forced();
        if self.commands.send(Command::Fail(failure.clone())).is_err() {
            debug!("Forced failure sent to a stopped feed");
        }
        failure
    }

    /// Stop the feed and wait for teardown
    ///
    /// Returns the final status: `Disconnected`, or `Failed` when the feed
    /// had already failed.
    pub async fn stop(mut self) -> FeedStatus {
        let _ = self.commands.send(Command::Stop);
        match self.task.take() {
            Some(task) => match task.await {
                Ok(status) => status,
                Err(e) => {
                    error!("Order feed task ended abnormally: {}", e);
                    self.status()
                }
            },
            None => self.status(),
        }
    }
}

struct FeedDriver<T> {
    config: FeedConfig,
    transport: T,
    sync: FeedSynchronizer,
    commands: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<Arc<OrderFeedState>>,
    status_tx: watch::Sender<FeedStatus>,
}

impl<T: Transport> FeedDriver<T> {
    async fn run(mut self) -> FeedStatus {
        info!(
            endpoint = %self.transport.endpoint(),
            product = %self.config.product,
            "Starting order feed"
        );

        match self.drive().await {
            Ok(()) => self.sync.disconnect(),
            Err(failure) => {
                self.sync.fail(failure);
            }
        }
        self.publish_status();

        if self.transport.is_connected() {
            if let Err(e) = self.transport.close().await {
                debug!("Error closing transport: {}", e);
            }
        }

        info!("Order feed stopped");
        self.sync.status().clone()
    }

    async fn drive(&mut self) -> Result<(), FeedFailure> {
        self.sync.connect()?;
        self.publish_status();

        if !self.open().await? {
            return Ok(());
        }

        let request = self.sync.on_open()?;
        self.publish_state(self.sync.state());
        self.publish_status();
        self.send(&request).await?;

        let period = self.config.flush_interval;
        let mut flush = interval_at(Instant::now() + period, period);
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let step = tokio::select! {
                frame = self.transport.recv() => Step::Inbound(frame),
                _ = flush.tick() => Step::Flush,
                command = self.commands.recv() => Step::Command(command),
            };

            match step {
                Step::Inbound(Ok(Some(text))) => self.handle_frame(&text)?,
                Step::Inbound(Ok(None)) => {
                    warn!("Server closed the connection");
                    return Err(FeedFailure::connection_closed());
                }
                Step::Inbound(Err(e)) => return Err(FeedFailure::transport(e.to_string())),
                Step::Flush => {
                    let state = self.sync.flush();
                    self.publish_state(state);
                }
                Step::Command(Some(Command::ChangeSubscription(product))) => {
                    let requests = self.sync.change_subscription(product);
                    for request in &requests {
                        self.send(request).await?;
                    }
                    if !requests.is_empty() {
                        self.publish_state(self.sync.state());
                    }
                }
                Step::Command(Some(Command::Fail(failure))) => return Err(failure),
                Step::Command(Some(Command::Stop) | None) => {
                    debug!("Stop requested");
                    return Ok(());
                }
            }
        }
    }

    /// Connect while still answering commands; `false` means stop was requested
    async fn open(&mut self) -> Result<bool, FeedFailure> {
        let connect = self.transport.connect();
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => {
                    return result
                        .map(|()| true)
                        .map_err(|e| FeedFailure::transport(e.to_string()));
                }
                command = self.commands.recv() => match command {
                    Some(Command::ChangeSubscription(product)) => {
                        // Nothing to send yet; on_open picks it up
                        self.sync.change_subscription(product);
                    }
                    Some(Command::Fail(failure)) => return Err(failure),
                    Some(Command::Stop) | None => return Ok(false),
                },
            }
        }
    }

    fn handle_frame(&mut self, text: &str) -> Result<(), FeedFailure> {
        match InboundMessage::parse(text) {
            Ok(message) => {
                if let Some(state) = self.sync.on_message(message) {
                    self.publish_state(state);
                }
                Ok(())
            }
            Err(e) => match self.config.malformed_messages {
                MalformedMessagePolicy::Skip => {
                    warn!(error = %e, "Skipping malformed frame");
                    Ok(())
                }
                MalformedMessagePolicy::Fail => Err(FeedFailure::malformed(&e)),
            },
        }
    }

    async fn send(&mut self, request: &SubscriptionRequest) -> Result<(), FeedFailure> {
        let json = request.to_json();
        debug!("Sending {}", json);
        self.transport
            .send(&json)
            .await
            .map_err(|e| FeedFailure::transport(e.to_string()))
    }

    fn publish_state(&self, state: Arc<OrderFeedState>) {
        self.state_tx.send_replace(state);
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(self.sync.status().clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockServer, MockTransport};
    use orderfeed_types::FailureKind;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use tokio::time::sleep;

    const SNAPSHOT: &str = r#"{"numLevels":25,"feed":"book_ui_1_snapshot","bids":[[34275.5,2835.0]],"asks":[[34292.5,11223.0]],"product_id":"PI_XBTUSD"}"#;
    const DELTA: &str = r#"{"feed":"book_ui_1","product_id":"PI_XBTUSD","bids":[[34270.0,10.0]],"asks":[[34292.5,0.0]]}"#;

    fn spawn_mock(config: FeedConfig) -> (FeedHandle, MockServer) {
        let (transport, server) = MockTransport::pair(config.endpoint.clone());
        let handle = OrderFeed::spawn(config, transport).unwrap();
        (handle, server)
    }

    async fn wait_subscribed(handle: &FeedHandle) {
        let mut status = handle.watch_status();
        let _ = status.wait_for(|s| s.is_subscribed()).await.unwrap();
    }

    async fn wait_failed(handle: &FeedHandle) -> FeedFailure {
        let mut status = handle.watch_status();
        let failed = status.wait_for(|s| s.is_failed()).await.unwrap();
        failed.failure().cloned().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribes_on_open() {
        let (handle, server) = spawn_mock(FeedConfig::new());
        wait_subscribed(&handle).await;

        assert_eq!(server.connect_count(), 1);
        assert_eq!(
            server.sent(),
            vec![r#"{"event":"subscribe","feed":"book_ui_1","product_ids":["PI_XBTUSD"]}"#]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscription_change_order() {
        let (handle, server) = spawn_mock(FeedConfig::new());
        wait_subscribed(&handle).await;

        handle.change_subscription(ProductId::EthUsd).unwrap();
        let mut state = handle.watch_state();
        let _ = state
            .wait_for(|s| s.product_feed_subscription == ProductId::EthUsd)
            .await
            .unwrap();

        assert_eq!(
            server.sent(),
            vec![
                r#"{"event":"subscribe","feed":"book_ui_1","product_ids":["PI_XBTUSD"]}"#,
                r#"{"event":"unsubscribe","feed":"book_ui_1","product_ids":["PI_XBTUSD"]}"#,
                r#"{"event":"subscribe","feed":"book_ui_1","product_ids":["PI_ETHUSD"]}"#,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_error_never_connects() {
        let (transport, server) = MockTransport::pair("wss://mock.test");
        let result = OrderFeed::spawn(FeedConfig::new().with_force_error(true), transport);

        let Some(FeedError::Failed(failure)) = result.err() else {
            panic!("expected a forced failure");
        };
        assert_eq!(failure.kind, FailureKind::Forced);
        assert_eq!(failure.to_string(), "The order feed failed. Please reset the feed.");
        assert_eq!(server.connect_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_error_while_running() {
        let (handle, server) = spawn_mock(FeedConfig::new());
        wait_subscribed(&handle).await;

        let failure = handle.force_error();
        assert_eq!(failure.kind, FailureKind::Forced);

        assert_eq!(wait_failed(&handle).await.kind, FailureKind::Forced);
        assert!(!server.is_open());
        assert!(handle.change_subscription(ProductId::EthUsd).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_flush_interval_rejected_before_connect() {
        let (transport, server) = MockTransport::pair("wss://mock.test");
        let config = FeedConfig::new().with_flush_interval(Duration::ZERO);

        let result = OrderFeed::spawn(config, transport);

        assert!(matches!(result.err(), Some(FeedError::Configuration(_))));
        assert_eq!(server.connect_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_send_failure_fails_feed() {
        let (mut transport, server) = MockTransport::pair("wss://mock.test");
        transport.fail_send = true;
        let handle = OrderFeed::spawn(FeedConfig::new(), transport).unwrap();

        let failure = wait_failed(&handle).await;

        assert_eq!(failure.kind, FailureKind::Transport);
        assert!(failure.detail.contains("send failed"));
        assert_eq!(server.connect_count(), 1);
        assert!(server.sent().is_empty());
        assert!(handle.stop().await.is_failed());
        assert!(!server.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_fails_feed() {
        let (handle, server) = spawn_mock(FeedConfig::new());
        wait_subscribed(&handle).await;

        server.push_error(TransportError::ReceiveFailed("connection reset".into()));

        let failure = wait_failed(&handle).await;
        assert_eq!(failure.kind, FailureKind::Transport);
        assert!(failure.detail.contains("connection reset"));
        assert!(!server.is_open());
        assert!(handle.stop().await.is_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_fails_feed() {
        let (mut transport, server) = MockTransport::pair("wss://mock.test");
        transport.fail_connect = true;
        let handle = OrderFeed::spawn(FeedConfig::new(), transport).unwrap();

        assert_eq!(wait_failed(&handle).await.kind, FailureKind::Transport);
        assert!(server.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_close_fails_feed() {
        let (handle, server) = spawn_mock(FeedConfig::new());
        wait_subscribed(&handle).await;

        server.push_close();

        assert_eq!(wait_failed(&handle).await.kind, FailureKind::ConnectionClosed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_is_immediate_and_delta_waits_for_tick() {
        let (handle, server) = spawn_mock(FeedConfig::new());
        wait_subscribed(&handle).await;

        server.push_message(SNAPSHOT);
        let mut state = handle.watch_state();
        let _ = state.wait_for(|s| !s.bids.is_empty()).await.unwrap();
        assert_eq!(handle.state().asks.get(&dec!(34292.5)), Some(dec!(11223)));

        server.push_message(DELTA);
        sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.state().bids.get(&dec!(34270)), None);
        assert_eq!(handle.state().asks.len(), 1);

        sleep(Duration::from_millis(250)).await;
        let flushed = handle.state();
        assert_eq!(flushed.bids.get(&dec!(34270)), Some(dec!(10)));
        assert!(flushed.asks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_republishes_every_tick() {
        let config = FeedConfig::new().with_flush_interval(Duration::from_millis(100));
        let (handle, _server) = spawn_mock(config);
        wait_subscribed(&handle).await;
        let before = handle.state();

        sleep(Duration::from_millis(150)).await;
        let after = handle.state();

        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(*before, *after);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_frame_policy() {
        let (handle, server) = spawn_mock(FeedConfig::new());
        wait_subscribed(&handle).await;
        server.push_message("{not json");
        server.push_message(SNAPSHOT);
        let mut state = handle.watch_state();
        let _ = state.wait_for(|s| !s.bids.is_empty()).await.unwrap();
        assert!(handle.status().is_subscribed());

        let (handle, server) =
            spawn_mock(FeedConfig::new().with_malformed_messages(MalformedMessagePolicy::Fail));
        wait_subscribed(&handle).await;
        server.push_message("{not json");
        assert_eq!(wait_failed(&handle).await.kind, FailureKind::MalformedMessage);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_closes_transport() {
        let (handle, server) = spawn_mock(FeedConfig::new());
        wait_subscribed(&handle).await;
        assert!(server.is_open());

        let status = handle.stop().await;

        assert_eq!(status, FeedStatus::Disconnected);
        assert!(!server.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_feed() {
        let (handle, server) = spawn_mock(FeedConfig::new());
        wait_subscribed(&handle).await;

        drop(handle);
        sleep(Duration::from_millis(1)).await;

        assert!(!server.is_open());
    }
}
