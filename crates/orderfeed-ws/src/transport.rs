//! WebSocket transport abstraction
//!
//! This module provides a trait-based abstraction over WebSocket connections,
//! enabling unit testing of the feed driver without real network calls.
//!
//! # Example
//!
//! ```no_run
//! use orderfeed_ws::transport::{Transport, WsTransport, TransportError};
//!
//! async fn example() -> Result<(), TransportError> {
//!     let mut transport = WsTransport::new("wss://www.cryptofacilities.com/ws/v1");
//!     transport.connect().await?;
//!     transport
//!         .send(r#"{"event":"subscribe","feed":"book_ui_1","product_ids":["PI_XBTUSD"]}"#)
//!         .await?;
//!     if let Some(response) = transport.recv().await? {
//!         println!("Received: {}", response);
//!     }
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument};

/// Transport layer errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Connection timeout
    #[error("connection timeout after {0:?}")]
    Timeout(Duration),

    /// Not connected
    #[error("not connected")]
    NotConnected,

    /// Protocol error
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Trait for WebSocket transport abstraction
///
/// `recv` must be cancel safe: the driver polls it inside `tokio::select!`.
#[async_trait]
pub trait Transport: Send {
    /// Connect to the WebSocket endpoint
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Send a text message
    async fn send(&mut self, message: &str) -> Result<(), TransportError>;

    /// Receive a text message
    ///
    /// Returns `None` if the connection was closed gracefully.
    async fn recv(&mut self) -> Result<Option<String>, TransportError>;

    /// Close the connection gracefully
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Check if currently connected
    fn is_connected(&self) -> bool;

    /// Get the endpoint URL
    fn endpoint(&self) -> &str;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn connect(&mut self) -> Result<(), TransportError> {
        (**self).connect().await
    }

    async fn send(&mut self, message: &str) -> Result<(), TransportError> {
        (**self).send(message).await
    }

    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        (**self).recv().await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        (**self).close().await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }
}

/// Real WebSocket transport using tokio-tungstenite
pub struct WsTransport {
    url: String,
    stream: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    connect_timeout: Duration,
}

impl WsTransport {
    /// Create a new WebSocket transport
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl Transport for WsTransport {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn connect(&mut self) -> Result<(), TransportError> {
        debug!("Connecting to WebSocket");

        let (ws_stream, _response) = timeout(self.connect_timeout, connect_async(&self.url))
            .await
            .map_err(|_| TransportError::Timeout(self.connect_timeout))?
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        self.stream = Some(ws_stream);
        debug!("WebSocket connected");
        Ok(())
    }

    #[instrument(skip(self, message), fields(len = message.len()))]
    async fn send(&mut self, message: &str) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;

        stream
            .send(Message::Text(message.to_string()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;

            return match stream.next().await {
                Some(Ok(Message::Text(text))) => Ok(Some(text)),
                Some(Ok(Message::Binary(data))) => String::from_utf8(data)
                    .map(Some)
                    .map_err(|e| TransportError::Protocol(e.to_string())),
                Some(Ok(Message::Close(_))) => {
                    self.stream = None;
                    Ok(None)
                }
                // tungstenite answers pings itself
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Err(e)) => Err(TransportError::ReceiveFailed(e.to_string())),
                None => {
                    self.stream = None;
                    Err(TransportError::ConnectionClosed)
                }
            };
        }
    }

    #[instrument(skip(self))]
    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.take() {
            stream
                .close(None)
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockServer, MockTransport};

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use super::{Transport, TransportError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    type Frame = Result<Option<String>, TransportError>;

    #[derive(Default)]
    struct Shared {
        sent: Mutex<Vec<String>>,
        connects: AtomicUsize,
        open: AtomicBool,
    }

    /// Mock transport for testing
    ///
    /// Frames pushed through the paired [`MockServer`] are returned from
    /// `recv()`; `recv()` waits while none are queued, like a live socket.
    pub struct MockTransport {
        url: String,
        connected: bool,
        inbound: mpsc::UnboundedReceiver<Frame>,
        shared: Arc<Shared>,
        /// Simulate connection failure
        pub fail_connect: bool,
        /// Simulate send failure
        pub fail_send: bool,
    }

    /// Test-side handle of a [`MockTransport`]
    #[derive(Clone)]
    pub struct MockServer {
        inbound: mpsc::UnboundedSender<Frame>,
        shared: Arc<Shared>,
    }

    impl MockTransport {
        /// Create a transport and the server handle that feeds it
        pub fn pair(url: impl Into<String>) -> (Self, MockServer) {
            let (tx, rx) = mpsc::unbounded_channel();
            let shared = Arc::new(Shared::default());

            let transport = Self {
                url: url.into(),
                connected: false,
                inbound: rx,
                shared: Arc::clone(&shared),
                fail_connect: false,
                fail_send: false,
            };
            (transport, MockServer { inbound: tx, shared })
        }
    }

    impl MockServer {
        /// Queue a text frame
        pub fn push_message(&self, msg: impl Into<String>) {
            let _ = self.inbound.send(Ok(Some(msg.into())));
        }

        /// Simulate a close from the server
        pub fn push_close(&self) {
            let _ = self.inbound.send(Ok(None));
        }

        /// Simulate a receive error
        pub fn push_error(&self, error: TransportError) {
            let _ = self.inbound.send(Err(error));
        }

        /// Messages sent by the client so far
        pub fn sent(&self) -> Vec<String> {
            self.shared.sent.lock().clone()
        }

        /// Number of successful connects
        pub fn connect_count(&self) -> usize {
            self.shared.connects.load(Ordering::SeqCst)
        }

        /// Whether the client side is currently connected
        pub fn is_open(&self) -> bool {
            self.shared.open.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn connect(&mut self) -> Result<(), TransportError> {
            if self.fail_connect {
                return Err(TransportError::ConnectionFailed("mock connection failure".into()));
            }
            self.connected = true;
            self.shared.connects.fetch_add(1, Ordering::SeqCst);
            self.shared.open.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn send(&mut self, message: &str) -> Result<(), TransportError> {
            if !self.connected {
                return Err(TransportError::NotConnected);
            }
            if self.fail_send {
                return Err(TransportError::SendFailed("mock send failure".into()));
            }
            self.shared.sent.lock().push(message.to_string());
            Ok(())
        }

        async fn recv(&mut self) -> Result<Option<String>, TransportError> {
            if !self.connected {
                return Err(TransportError::NotConnected);
            }
            match self.inbound.recv().await {
                Some(frame) => frame,
                None => Ok(None),
            }
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.connected = false;
            self.shared.open.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn endpoint(&self) -> &str {
            &self.url
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transport_send_recv() {
        let (mut transport, server) = MockTransport::pair("wss://mock.test");
        server.push_message(r#"{"event":"info","version":1}"#);

        transport.connect().await.unwrap();
        assert!(transport.is_connected());
        assert!(server.is_open());

        transport.send(r#"{"event":"subscribe"}"#).await.unwrap();
        assert_eq!(server.sent().len(), 1);
        assert!(server.sent()[0].contains("subscribe"));

        let response = transport.recv().await.unwrap();
        assert!(response.unwrap().contains("info"));
    }

    #[tokio::test]
    async fn test_mock_transport_connection_failure() {
        let (mut transport, server) = MockTransport::pair("wss://mock.test");
        transport.fail_connect = true;

        let result = transport.connect().await;
        assert!(result.is_err());
        assert!(!transport.is_connected());
        assert_eq!(server.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_transport_close() {
        let (mut transport, server) = MockTransport::pair("wss://mock.test");
        server.push_close();

        transport.connect().await.unwrap();
        let response = transport.recv().await.unwrap();
        assert!(response.is_none());

        transport.close().await.unwrap();
        assert!(!server.is_open());
    }

    #[tokio::test]
    async fn test_mock_transport_send_before_connect() {
        let (mut transport, _server) = MockTransport::pair("wss://mock.test");

        let result = transport.send("{}").await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }
}
