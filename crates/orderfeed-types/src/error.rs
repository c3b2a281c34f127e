//! Error types for the order feed

use crate::{GroupingIncrement, ProductId};
use thiserror::Error;

/// Failure to parse an inbound frame
#[derive(Error, Debug)]
pub enum MessageError {
    /// Frame is not valid JSON, or a book body did not match its feed
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame has neither an `event` nor a `feed` key
    #[error("Message has no event or feed: {0}")]
    MissingDiscriminator(String),
}

/// Why the feed entered its failed state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The transport reported an error
    Transport,
    /// The server closed the connection
    ConnectionClosed,
    /// Failure injected through the force-error flag
    Forced,
    /// An inbound frame could not be parsed
    MalformedMessage,
}

/// Terminal feed failure; the feed must be reset to recover
///
/// Every kind renders the same user-facing message. `detail` is kept for logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("The order feed failed. Please reset the feed.")]
pub struct FeedFailure {
    /// Failure category
    pub kind: FailureKind,
    /// Diagnostic detail, not meant for end users
    pub detail: String,
}

impl FeedFailure {
    /// Create a failure of the given kind
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Transport-level failure
    pub fn transport(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Transport, detail)
    }

    /// Connection closed by the server
    pub fn connection_closed() -> Self {
        Self::new(FailureKind::ConnectionClosed, "connection closed by server")
    }

    /// Injected failure
    pub fn forced() -> Self {
        Self::new(
            FailureKind::Forced,
            "an error was forced from within the feed handling code",
        )
    }

    /// Unparseable inbound frame
    pub fn malformed(error: &MessageError) -> Self {
        Self::new(FailureKind::MalformedMessage, error.to_string())
    }
}

/// Errors returned by the feed and session APIs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// The feed failed and needs a reset
    #[error(transparent)]
    Failed(#[from] FeedFailure),

    /// The feed task is not running
    #[error("Order feed is not running")]
    NotRunning,

    /// Grouping is not offered for the product
    #[error("Grouping {grouping} is not available for {product}")]
    UnsupportedGrouping {
        /// Current product
        product: ProductId,
        /// Rejected grouping
        grouping: GroupingIncrement,
    },

    /// Reset requested while the feed is healthy
    #[error("Order feed is not in an error state")]
    NotFailed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl FeedError {
    /// Returns true if the feed must be reset before it can be used again
    pub fn requires_reset(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Unknown textual value for an enum
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind}: {value}")]
pub struct ParseEnumError {
    /// What was being parsed
    pub kind: &'static str,
    /// The rejected input
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
