//! Order book session
//!
//! [`OrderBookSession`] is the controller a front end drives: it owns the
//! desired product and grouping, runs one [`FeedHandle`] at a time and turns
//! the published state into a grouped [`BookView`].
//!
//! A failed feed stays failed until [`OrderBookSession::reset_feed`], which
//! tears the old feed down and starts a fresh one over a new transport.

use crate::config::FeedConfig;
use crate::feed::{FeedHandle, OrderFeed};
use crate::transport::{Transport, WsTransport};
use orderfeed_book::{GroupedBook, OrderFeedState};
use orderfeed_types::{FeedError, FeedFailure, GroupingIncrement, ProductId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds a transport for each (re)start
pub type TransportFactory = Box<dyn FnMut(&FeedConfig) -> Box<dyn Transport> + Send>;

/// What the book area shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookContent {
    /// Grouped levels
    Book(Arc<GroupedBook>),
    /// Fallback while the feed is failed
    Failed(FeedFailure),
}

/// Everything needed to render one frame of the order book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookView {
    /// Selected product
    pub product: ProductId,
    /// Selected grouping
    pub grouping: GroupingIncrement,
    /// Groupings offered for the product
    pub grouping_options: &'static [GroupingIncrement],
    /// Book or failure
    pub content: BookContent,
}

impl BookView {
    /// Header line, e.g. `Order Book | PI_XBTUSD`
    pub fn title(&self) -> String {
        format!("Order Book | {}", self.product)
    }

    /// Grouped book, unless failed
    pub fn book(&self) -> Option<&GroupedBook> {
        match &self.content {
            BookContent::Book(book) => Some(book),
            BookContent::Failed(_) => None,
        }
    }

    /// Check if the fallback is shown
    pub fn is_failed(&self) -> bool {
        matches!(self.content, BookContent::Failed(_))
    }
}

struct CachedView {
    state: Arc<OrderFeedState>,
    grouping: GroupingIncrement,
    book: Arc<GroupedBook>,
}

/// Controller for one order book widget
pub struct OrderBookSession {
    config: FeedConfig,
    product: ProductId,
    grouping: GroupingIncrement,
    factory: TransportFactory,
    feed: Option<FeedHandle>,
    failure: Option<FeedFailure>,
    cache: Option<CachedView>,
}

impl OrderBookSession {
    /// Session over real WebSocket connections
    pub fn new(config: FeedConfig) -> Self {
        Self::with_transport_factory(
            config,
            Box::new(|config: &FeedConfig| {
                let transport = WsTransport::new(config.endpoint.clone())
                    .with_timeout(config.connect_timeout);
                Box::new(transport) as Box<dyn Transport>
            }),
        )
    }

    /// Session over transports built by `factory`
    pub fn with_transport_factory(config: FeedConfig, factory: TransportFactory) -> Self {
        let product = config.product;
        Self {
            config,
            product,
            grouping: product.default_grouping(),
            factory,
            feed: None,
            failure: None,
            cache: None,
        }
    }

    /// Selected product
    pub fn product(&self) -> ProductId {
        self.product
    }

    /// Selected grouping
    pub fn grouping(&self) -> GroupingIncrement {
        self.grouping
    }

    /// Start the feed if it is not running
    ///
    /// A forced error is returned here without connecting.
    pub fn start(&mut self) -> Result<(), FeedError> {
        if self.feed.is_some() {
            return Ok(());
        }
        if let Some(failure) = &self.failure {
            return Err(FeedError::Failed(failure.clone()));
        }

        let config = self.config.clone().with_product(self.product);
        let transport = (self.factory)(&config);

        match OrderFeed::spawn(config, transport) {
            Ok(feed) => {
                info!("Order book started for {}", self.product);
                self.feed = Some(feed);
                Ok(())
            }
            Err(FeedError::Failed(failure)) => {
                self.failure = Some(failure.clone());
                Err(FeedError::Failed(failure))
            }
            Err(e) => Err(e),
        }
    }

    /// Switch to the other product
    ///
    /// Grouping falls back to the new product's default.
    pub fn toggle_feed(&mut self) -> Result<ProductId, FeedError> {
        self.product = self.product.toggled();
        self.grouping = self.product.default_grouping();
        info!("Toggled feed to {}", self.product);

        if !self.is_in_error_state() {
            if let Some(feed) = &self.feed {
                feed.change_subscription(self.product)?;
            }
        }
        Ok(self.product)
    }

    /// Select a grouping offered for the current product
    pub fn set_grouping(&mut self, grouping: GroupingIncrement) -> Result<(), FeedError> {
        if !self.product.supports_grouping(grouping) {
            return Err(FeedError::UnsupportedGrouping {
                product: self.product,
                grouping,
            });
        }
        debug!("Grouping set to {}", grouping);
        self.grouping = grouping;
        Ok(())
    }

    /// Inject a failure into the running feed
    pub fn kill_feed(&mut self) -> FeedFailure {
        warn!("Killing order feed");
        self.config.force_error = true;

        let failure = match &self.feed {
            Some(feed) => feed.force_error(),
            None => FeedFailure::forced(),
        };
        self.failure.get_or_insert(failure).clone()
    }

    /// Re-initialise the feed after a failure
    ///
    /// The old feed is torn down, buffers and state start empty and a new
    /// transport is connected for the selected product.
    pub async fn reset_feed(&mut self) -> Result<(), FeedError> {
        if !self.is_in_error_state() {
            return Err(FeedError::NotFailed);
        }

        info!("Resetting order feed");
        self.stop().await;
        self.config.force_error = false;
        self.failure = None;
        self.cache = None;
        self.start()
    }

    /// Stop the feed, if any
    pub async fn stop(&mut self) {
        if let Some(feed) = self.feed.take() {
            if let Some(failure) = feed.stop().await.failure() {
                self.failure.get_or_insert_with(|| failure.clone());
            }
        }
    }

    /// The failure shown to the user, if any
    pub fn failure(&self) -> Option<FeedFailure> {
        self.failure
            .clone()
            .or_else(|| self.feed.as_ref().and_then(FeedHandle::failure))
    }

    /// Check if the fallback (and the reset action) should be shown
    pub fn is_in_error_state(&self) -> bool {
        self.failure().is_some()
    }

    /// Current view
    ///
    /// Grouping is recomputed only when a new state was published or the
    /// grouping changed.
    pub fn view(&mut self) -> BookView {
        let content = match self.failure() {
            Some(failure) => BookContent::Failed(failure),
            None => BookContent::Book(self.grouped_book()),
        };

        BookView {
            product: self.product,
            grouping: self.grouping,
            grouping_options: self.product.grouping_options(),
            content,
        }
    }

    fn grouped_book(&mut self) -> Arc<GroupedBook> {
        let state = match &self.feed {
            Some(feed) => feed.state(),
            None => return Arc::new(GroupedBook::default()),
        };

        if let Some(cached) = &self.cache {
            if Arc::ptr_eq(&cached.state, &state) && cached.grouping == self.grouping {
                return Arc::clone(&cached.book);
            }
        }

        // A toggle is visible here before the feed has switched over
        let book = if state.product_feed_subscription == self.product {
            Arc::new(state.grouped(self.grouping))
        } else {
            Arc::new(GroupedBook::default())
        };

        self.cache = Some(CachedView {
            state,
            grouping: self.grouping,
            book: Arc::clone(&book),
        });
        book
    }
}
