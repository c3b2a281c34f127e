//! Request and inbound message types for the `book_ui_1` feed

use crate::{MessageError, PriceLevel, ProductId};
use serde::Deserialize;

/// Delta feed name, also used in subscribe requests
pub const BOOK_FEED: &str = "book_ui_1";
/// Snapshot feed name
pub const BOOK_SNAPSHOT_FEED: &str = "book_ui_1_snapshot";

// ============================================================================
// Request Types
// ============================================================================

/// Subscription request verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestEvent {
    /// Start receiving the feed
    Subscribe,
    /// Stop receiving the feed
    Unsubscribe,
}

impl RequestEvent {
    /// Returns the event name as used in API messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
        }
    }
}

/// Subscribe/unsubscribe request for the book feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    /// Request verb
    pub event: RequestEvent,
    /// Feed name
    pub feed: &'static str,
    /// Products covered by the request
    pub product_ids: Vec<ProductId>,
}

impl SubscriptionRequest {
    /// Subscribe to the delta feed of one product
    pub fn subscribe(product: ProductId) -> Self {
        Self {
            event: RequestEvent::Subscribe,
            feed: BOOK_FEED,
            product_ids: vec![product],
        }
    }

    /// Unsubscribe from the delta feed of one product
    pub fn unsubscribe(product: ProductId) -> Self {
        Self {
            event: RequestEvent::Unsubscribe,
            feed: BOOK_FEED,
            product_ids: vec![product],
        }
    }

    /// Render the wire form, e.g.
    /// `{"event":"subscribe","feed":"book_ui_1","product_ids":["PI_XBTUSD"]}`
    pub fn to_json(&self) -> String {
        let product_ids: Vec<&str> = self.product_ids.iter().map(ProductId::as_str).collect();
        serde_json::json!({
            "event": self.event.as_str(),
            "feed": self.feed,
            "product_ids": product_ids
        })
        .to_string()
    }
}

// ============================================================================
// Inbound Types
// ============================================================================

/// Full replacement of both sides of one product's book
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BookSnapshot {
    /// Product the snapshot describes
    pub product_id: ProductId,
    /// Depth limit used by the server
    #[serde(rename = "numLevels", default)]
    pub num_levels: Option<u32>,
    /// Bid levels
    #[serde(default)]
    pub bids: Vec<PriceLevel>,
    /// Ask levels
    #[serde(default)]
    pub asks: Vec<PriceLevel>,
}

/// Changed levels since the previous message
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BookDelta {
    /// Product the delta applies to
    pub product_id: ProductId,
    /// Changed bid levels
    #[serde(default)]
    pub bids: Vec<PriceLevel>,
    /// Changed ask levels
    #[serde(default)]
    pub asks: Vec<PriceLevel>,
}

/// Server control messages (those carrying an `event` key)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// Greeting sent on connect
    Info {
        /// Protocol version
        version: u64,
    },
    /// Subscription acknowledged
    Subscribed {
        /// Feed name
        feed: String,
        /// Products covered
        product_ids: Vec<String>,
    },
    /// Unsubscription acknowledged
    Unsubscribed {
        /// Feed name
        feed: String,
        /// Products covered
        product_ids: Vec<String>,
    },
    /// Server-side alert or rejected request
    Alert {
        /// Message from the server
        message: String,
    },
    /// Any other event
    Other(String),
}

/// Parsed inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// `book_ui_1_snapshot`
    Snapshot(BookSnapshot),
    /// `book_ui_1`
    Delta(BookDelta),
    /// Frame with an `event` key
    Control(ControlEvent),
    /// Any other feed (heartbeat, ...)
    Unhandled(String),
}

impl InboundMessage {
    /// Parse a raw JSON frame
    pub fn parse(json: &str) -> Result<Self, MessageError> {
        let value: serde_json::Value = serde_json::from_str(json)?;

        // Acknowledgements carry `feed` too, so `event` is checked first
        if let Some(event) = value.get("event").and_then(|v| v.as_str()) {
            return Ok(Self::Control(parse_control(event, &value)));
        }

        let feed = value
            .get("feed")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| MessageError::MissingDiscriminator(truncate(json)))?;

        match feed.as_str() {
            BOOK_SNAPSHOT_FEED => Ok(Self::Snapshot(serde_json::from_value(value)?)),
            BOOK_FEED => Ok(Self::Delta(serde_json::from_value(value)?)),
            _ => Ok(Self::Unhandled(feed)),
        }
    }

    /// Product of a book message
    pub fn product_id(&self) -> Option<ProductId> {
        match self {
            Self::Snapshot(snapshot) => Some(snapshot.product_id),
            Self::Delta(delta) => Some(delta.product_id),
            _ => None,
        }
    }
}

fn parse_control(event: &str, value: &serde_json::Value) -> ControlEvent {
    let feed = || {
        value
            .get("feed")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };
    let product_ids = || -> Vec<String> {
        value
            .get("product_ids")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default()
    };

    match event {
        "info" => ControlEvent::Info {
            version: value.get("version").and_then(|v| v.as_u64()).unwrap_or(0),
        },
        "subscribed" => ControlEvent::Subscribed {
            feed: feed(),
            product_ids: product_ids(),
        },
        "unsubscribed" => ControlEvent::Unsubscribed {
            feed: feed(),
            product_ids: product_ids(),
        },
        "alert" | "error" => ControlEvent::Alert {
            message: value
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown error")
                .to_string(),
        },
        other => ControlEvent::Other(other.to_string()),
    }
}

fn truncate(json: &str) -> String {
    json.chars().take(120).collect()
}
