//! Feed synchronizer state machine
//!
//! Reconciles snapshot and delta messages into a published book state.
//!
//! Deltas accumulate in a private working buffer and only become visible on
//! [`FeedSynchronizer::flush`], which the driver calls on a fixed cadence.
//! Snapshots replace the buffer and are published at once. Every publication
//! is a fresh `Arc<OrderFeedState>`; consumers detect changes with
//! `Arc::ptr_eq` and never see a map mutated in place.
//!
//! The machine performs no I/O. Methods that need something sent return the
//! requests and leave the sending to the caller.

use crate::grouping::GroupedBook;
use crate::level_map::LevelMap;
use orderfeed_types::{
    BookDelta, BookSnapshot, ControlEvent, FeedFailure, GroupingIncrement, InboundMessage,
    ProductId, SubscriptionRequest,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Synchronizer lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeedStatus {
    /// Not started, or torn down
    #[default]
    Disconnected,
    /// Transport is being opened; no subscription is active
    Connecting,
    /// Subscribed and receiving book messages
    Subscribed,
    /// Terminal until reset
    Failed(FeedFailure),
}

impl FeedStatus {
    /// Check if the feed is in its failed state
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Check if book messages are being applied
    pub fn is_subscribed(&self) -> bool {
        matches!(self, Self::Subscribed)
    }

    /// The failure, if any
    pub fn failure(&self) -> Option<&FeedFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Externally visible book state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFeedState {
    /// Bid side, exact prices
    pub bids: LevelMap,
    /// Ask side, exact prices
    pub asks: LevelMap,
    /// Product the state belongs to
    pub product_feed_subscription: ProductId,
}

impl OrderFeedState {
    /// Empty book for a product
    pub fn empty(product: ProductId) -> Self {
        Self {
            bids: LevelMap::new(),
            asks: LevelMap::new(),
            product_feed_subscription: product,
        }
    }

    /// Group both sides for display
    pub fn grouped(&self, increment: GroupingIncrement) -> GroupedBook {
        GroupedBook::new(&self.bids, &self.asks, increment)
    }
}

/// Working accumulator, never shared
#[derive(Debug, Default)]
struct BufferData {
    bids: LevelMap,
    asks: LevelMap,
}

/// Snapshot/delta reconciliation and subscription bookkeeping
#[derive(Debug)]
pub struct FeedSynchronizer {
    /// Current lifecycle state
    status: FeedStatus,
    /// Product requested by the consumer
    desired: ProductId,
    /// Product the server is subscribed to (or will be on open)
    subscription: ProductId,
    /// Live working copy of both sides
    buffer: BufferData,
    /// Last published state
    published: Arc<OrderFeedState>,
}

impl FeedSynchronizer {
    /// Create a disconnected synchronizer for a product
    pub fn new(product: ProductId) -> Self {
        Self {
            status: FeedStatus::Disconnected,
            desired: product,
            subscription: product,
            buffer: BufferData::default(),
            published: Arc::new(OrderFeedState::empty(product)),
        }
    }

    /// Current lifecycle state
    pub fn status(&self) -> &FeedStatus {
        &self.status
    }

    /// Product requested by the consumer
    pub fn desired_subscription(&self) -> ProductId {
        self.desired
    }

    /// Product currently subscribed
    pub fn subscription(&self) -> ProductId {
        self.subscription
    }

    /// Last published state
    pub fn state(&self) -> Arc<OrderFeedState> {
        Arc::clone(&self.published)
    }

    /// Mark the transport as opening
    pub fn connect(&mut self) -> Result<(), FeedFailure> {
        match &self.status {
            FeedStatus::Failed(failure) => Err(failure.clone()),
            FeedStatus::Disconnected => {
                self.status = FeedStatus::Connecting;
                Ok(())
            }
            FeedStatus::Connecting | FeedStatus::Subscribed => Ok(()),
        }
    }

    /// Transport is open: subscribe to the latest desired product
    pub fn on_open(&mut self) -> Result<SubscriptionRequest, FeedFailure> {
        if let FeedStatus::Failed(failure) = &self.status {
            return Err(failure.clone());
        }

        if self.subscription != self.desired {
            self.subscription = self.desired;
            self.buffer = BufferData::default();
            self.publish();
        }
        self.status = FeedStatus::Subscribed;

        info!("Subscribing to {} for {}", orderfeed_types::BOOK_FEED, self.subscription);
        Ok(SubscriptionRequest::subscribe(self.subscription))
    }

    /// Dispatch a parsed frame
    ///
    /// Returns the new state when the message was published immediately
    /// (snapshots); deltas wait for the next flush.
    pub fn on_message(&mut self, message: InboundMessage) -> Option<Arc<OrderFeedState>> {
        if !self.status.is_subscribed() {
            debug!("Ignoring message while {:?}", self.status);
            return None;
        }

        if let Some(product) = message.product_id() {
            if product != self.subscription {
                debug!("Dropping {} message, subscribed to {}", product, self.subscription);
                return None;
            }
        }

        match message {
            InboundMessage::Snapshot(snapshot) => Some(self.apply_snapshot(&snapshot)),
            InboundMessage::Delta(delta) => {
                self.apply_delta(&delta);
                None
            }
            InboundMessage::Control(event) => {
                log_control(&event);
                None
            }
            InboundMessage::Unhandled(feed) => {
                debug!("Unhandled feed: {}", feed);
                None
            }
        }
    }

    /// Replace both sides with the snapshot and publish right away
    ///
    /// The buffer is re-anchored on the snapshot so later deltas build on it.
    pub fn apply_snapshot(&mut self, snapshot: &BookSnapshot) -> Arc<OrderFeedState> {
        if self.status.is_failed() {
            return self.state();
        }

        self.buffer.bids = LevelMap::from_levels(&snapshot.bids);
        self.buffer.asks = LevelMap::from_levels(&snapshot.asks);

        debug!(
            "Applied snapshot for {}: {} bids, {} asks",
            snapshot.product_id,
            self.buffer.bids.len(),
            self.buffer.asks.len()
        );

        self.publish()
    }

    /// Merge a delta into the working buffer without publishing
    pub fn apply_delta(&mut self, delta: &BookDelta) {
        if self.status.is_failed() {
            return;
        }

        self.buffer.bids.apply(&delta.bids);
        self.buffer.asks.apply(&delta.asks);
    }

    /// Publish the buffer as the new visible state
    ///
    /// Always produces a new `Arc`, even when nothing changed.
    pub fn flush(&mut self) -> Arc<OrderFeedState> {
        if self.status.is_failed() {
            return self.state();
        }
        self.publish()
    }

    /// Record a new desired product
    ///
    /// While subscribed to a different product this returns the unsubscribe
    /// and subscribe requests to send, in order, and switches over. Otherwise
    /// nothing is sent; [`FeedSynchronizer::on_open`] picks up the latest
    /// desired product.
    pub fn change_subscription(&mut self, product: ProductId) -> Vec<SubscriptionRequest> {
        if self.status.is_failed() {
            return Vec::new();
        }

        self.desired = product;

        if !self.status.is_subscribed() || product == self.subscription {
            return Vec::new();
        }

        info!("Switching subscription from {} to {}", self.subscription, product);

        let requests = vec![
            SubscriptionRequest::unsubscribe(self.subscription),
            SubscriptionRequest::subscribe(product),
        ];

        self.subscription = product;
        self.buffer = BufferData::default();
        self.publish();

        requests
    }

    /// Enter the failed state; the first failure is kept
    pub fn fail(&mut self, failure: FeedFailure) -> FeedFailure {
        if let FeedStatus::Failed(existing) = &self.status {
            return existing.clone();
        }

        error!(kind = ?failure.kind, detail = %failure.detail, "Order feed failed");
        self.status = FeedStatus::Failed(failure.clone());
        failure
    }

    /// Transport closed on request; a failure stays recorded
    pub fn disconnect(&mut self) {
        if !self.status.is_failed() {
            self.status = FeedStatus::Disconnected;
        }
    }

    /// Re-initialize: empty buffers, cleared state, disconnected
    pub fn reset(&mut self) {
        *self = Self::new(self.desired);
    }

    fn publish(&mut self) -> Arc<OrderFeedState> {
        self.published = Arc::new(OrderFeedState {
            bids: self.buffer.bids.clone(),
            asks: self.buffer.asks.clone(),
            product_feed_subscription: self.subscription,
        });
        self.state()
    }
}

fn log_control(event: &ControlEvent) {
    match event {
        ControlEvent::Info { version } => info!("Server info: version {}", version),
        ControlEvent::Subscribed { feed, product_ids } => {
            info!("Subscribed to {} for {:?}", feed, product_ids)
        }
        ControlEvent::Unsubscribed { feed, product_ids } => {
            info!("Unsubscribed from {} for {:?}", feed, product_ids)
        }
        ControlEvent::Alert { message } => warn!("Server alert: {}", message),
        ControlEvent::Other(event) => debug!("Unhandled event: {}", event),
    }
}
