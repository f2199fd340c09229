//! Connection seam between the run loop and the network.
//!
//! [`TransportClient`][crate::TransportClient] only ever talks to a
//! [`Connector`], which lets tests script connection failures and frame
//! sequences without a socket. [`WsConnector`] is the production
//! implementation on top of `tokio-tungstenite`.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use scenepulse_types::PulseError;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message,
};
use tracing::debug;

/// Opens connections to an endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, PulseError>;
}

/// One open, bidirectional text-frame connection.
#[async_trait]
pub trait Connection: Send {
    /// Next inbound text frame. `None` means the peer closed the connection.
    /// A [`PulseError::Decode`] rejects one frame and leaves the connection
    /// usable; any other error ends it.
    async fn recv(&mut self) -> Option<Result<String, PulseError>>;

    async fn send(&mut self, frame: String) -> Result<(), PulseError>;

    /// Best-effort close; errors are swallowed.
    async fn close(&mut self);
}

// ────────────────────────────────────────────────────────────────────────────
// WebSocket implementation
// ────────────────────────────────────────────────────────────────────────────

/// Connects with `tokio_tungstenite::connect_async`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, PulseError> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| PulseError::Connection(format!("connect to {url}: {e}")))?;
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WsConnection {
    async fn recv(&mut self) -> Option<Result<String, PulseError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => return Some(binary_text(&bytes)),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "peer closed the connection");
                    return None;
                }
                // Control frames are answered by tungstenite itself.
                Ok(_) => continue,
                Err(e) => return Some(Err(PulseError::Connection(e.to_string()))),
            }
        }
    }

    async fn send(&mut self, frame: String) -> Result<(), PulseError> {
        self.stream
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| PulseError::Connection(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}

/// Binary frames must carry UTF-8 JSON text.
fn binary_text(bytes: &[u8]) -> Result<String, PulseError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| PulseError::Decode(format!("binary frame is not UTF-8: {e}")))
}
