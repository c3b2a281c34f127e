//! Feed configuration

use orderfeed_types::{FeedError, ProductId};
use std::time::Duration;

/// Order feed WebSocket endpoints
pub mod endpoints {
    /// Production endpoint
    pub const PRODUCTION: &str = "wss://www.cryptofacilities.com/ws/v1";
}

/// Environment variable overriding the endpoint
pub const ENV_ENDPOINT: &str = "ORDER_FEED_ENDPOINT";
/// Environment variable selecting the initial product
pub const ENV_PRODUCT: &str = "ORDER_FEED_PRODUCT";
/// Environment variable setting the flush interval in milliseconds
pub const ENV_FLUSH_MS: &str = "ORDER_FEED_FLUSH_MS";

/// What to do with an inbound frame that cannot be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedMessagePolicy {
    /// Log a warning and keep going
    #[default]
    Skip,
    /// Treat it as a feed failure
    Fail,
}

/// Feed configuration
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket endpoint URL
    pub endpoint: String,
    /// Product subscribed on start
    pub product: ProductId,
    /// How often buffered deltas are published
    pub flush_interval: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Fail on start instead of connecting
    pub force_error: bool,
    /// Handling of unparseable frames
    pub malformed_messages: MalformedMessagePolicy,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: endpoints::PRODUCTION.to_string(),
            product: ProductId::default(),
            flush_interval: Duration::from_millis(250),
            connect_timeout: Duration::from_secs(10),
            force_error: false,
            malformed_messages: MalformedMessagePolicy::Skip,
        }
    }
}

impl FeedConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Read overrides from `ORDER_FEED_*` environment variables
    pub fn from_env() -> Result<Self, FeedError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, FeedError> {
        let mut config = Self::default();

        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            if !endpoint.starts_with("ws://") && !endpoint.starts_with("wss://") {
                return Err(FeedError::Configuration(format!(
                    "{ENV_ENDPOINT} must be a ws:// or wss:// URL, got {endpoint:?}"
                )));
            }
            config.endpoint = endpoint;
        }

        if let Some(product) = lookup(ENV_PRODUCT) {
            config.product = product
                .parse()
                .map_err(|e| FeedError::Configuration(format!("{ENV_PRODUCT}: {e}")))?;
        }

        if let Some(millis) = lookup(ENV_FLUSH_MS) {
            let millis: u64 = millis
                .trim()
                .parse()
                .map_err(|e| FeedError::Configuration(format!("{ENV_FLUSH_MS}: {e}")))?;
            config.flush_interval = Duration::from_millis(millis);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check values the driver cannot run with
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.flush_interval.is_zero() {
            return Err(FeedError::Configuration("flush interval must be positive".to_string()));
        }
        Ok(())
    }

    /// Set the endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the initial product
    pub fn with_product(mut self, product: ProductId) -> Self {
        self.product = product;
        self
    }

    /// Set the flush interval
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Fail on start without connecting
    pub fn with_force_error(mut self, force_error: bool) -> Self {
        self.force_error = force_error;
        self
    }

    /// Set the malformed frame policy
    pub fn with_malformed_messages(mut self, policy: MalformedMessagePolicy) -> Self {
        self.malformed_messages = policy;
        self
    }
}
