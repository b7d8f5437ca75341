//! Broker transport seam and its WebSocket implementation.
//!
//! The connection manager only sees the [`BrokerTransport`] and
//! [`BrokerSession`] traits, so tests run against an in-memory broker and
//! the wire protocol stays contained in this module.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, warn};
use url::Url;

use crate::error::{NotifyError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;

/// One inbound message unit delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    /// Destination the frame was published to.
    pub destination: String,
    /// Raw payload text, handed to the dispatcher unparsed.
    pub body: String,
}

/// Callback invoked for every inbound frame on any subscribed destination.
pub type FrameHandler = Arc<dyn Fn(InboundFrame) + Send + Sync>;

/// Callback invoked once when the transport drops unexpectedly.
pub type DropHandler = Arc<dyn Fn() + Send + Sync>;

/// Opens logical connections to the broker.
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    async fn open(
        &self,
        url: &str,
        on_frame: FrameHandler,
        on_drop: DropHandler,
    ) -> Result<Box<dyn BrokerSession>>;
}

/// One live connection to the broker.
#[async_trait]
pub trait BrokerSession: Send + Sync {
    async fn subscribe(&self, destination: &str) -> Result<()>;
    async fn unsubscribe(&self, destination: &str) -> Result<()>;
    async fn send(&self, destination: &str, body: String) -> Result<()>;
    async fn close(&self) -> Result<()>;
}

/// Client-to-broker operations on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ClientOp {
    Subscribe { destination: String },
    Unsubscribe { destination: String },
    Send { destination: String, body: String },
}

/// Broker-to-client envelope. The body is either a JSON string or an
/// inline object; both forms are normalized to text for the dispatcher.
#[derive(Debug, Deserialize)]
struct ServerFrame {
    destination: String,
    body: serde_json::Value,
}

fn parse_server_frame(text: &str) -> Result<InboundFrame> {
    let frame: ServerFrame = serde_json::from_str(text)
        .map_err(|error| NotifyError::Protocol(format!("invalid broker frame: {error}")))?;

    let body = match frame.body {
        serde_json::Value::String(body) => body,
        inline => inline.to_string(),
    };

    Ok(InboundFrame {
        destination: frame.destination,
        body,
    })
}

/// WebSocket transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// WebSocket implementation of the broker transport.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport {
    config: TransportConfig,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrokerTransport for WebSocketTransport {
    async fn open(
        &self,
        url: &str,
        on_frame: FrameHandler,
        on_drop: DropHandler,
    ) -> Result<Box<dyn BrokerSession>> {
        let parsed = Url::parse(url)?;
        if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
            return Err(NotifyError::InvalidUrl(format!(
                "URL must use ws:// or wss:// scheme, got: {}",
                parsed.scheme()
            )));
        }

        let (stream, _response) = timeout(self.config.connect_timeout, connect_async(url))
            .await
            .map_err(|_| {
                NotifyError::Timeout(format!(
                    "connection timeout after {:?}",
                    self.config.connect_timeout
                ))
            })?
            .map_err(|error| NotifyError::WebSocket(error.to_string()))?;

        let (writer, mut reader) = stream.split();
        let broker_url = url.to_string();

        let read_task = tokio::spawn(async move {
            while let Some(frame) = reader.next().await {
                match frame {
                    Ok(Message::Text(text)) => match parse_server_frame(text.as_str()) {
                        Ok(inbound) => on_frame(inbound),
                        Err(error) => {
                            warn!("dropping malformed frame from {}: {}", broker_url, error);
                        }
                    },
                    Ok(Message::Ping(payload)) => {
                        debug!("ping from {} ({} bytes)", broker_url, payload.len());
                    }
                    Ok(Message::Pong(_)) => {}
                    Ok(Message::Close(_)) => break,
                    Ok(Message::Binary(_)) => {}
                    Ok(Message::Frame(_)) => {}
                    Err(error) => {
                        warn!("websocket read error on {}: {}", broker_url, error);
                        break;
                    }
                }
            }

            on_drop();
        });

        Ok(Box::new(WebSocketSession {
            writer: Mutex::new(Some(writer)),
            read_task: Mutex::new(Some(read_task)),
        }))
    }
}

struct WebSocketSession {
    writer: Mutex<Option<WsWriter>>,
    read_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl WebSocketSession {
    async fn send_op(&self, op: &ClientOp) -> Result<()> {
        let text = serde_json::to_string(op)?;
        let mut writer_guard = self.writer.lock().await;
        let writer = writer_guard.as_mut().ok_or(NotifyError::NotConnected)?;
        writer
            .send(Message::Text(text.into()))
            .await
            .map_err(|error| NotifyError::WebSocket(error.to_string()))
    }
}

#[async_trait]
impl BrokerSession for WebSocketSession {
    async fn subscribe(&self, destination: &str) -> Result<()> {
        self.send_op(&ClientOp::Subscribe {
            destination: destination.to_string(),
        })
        .await
    }

    async fn unsubscribe(&self, destination: &str) -> Result<()> {
        self.send_op(&ClientOp::Unsubscribe {
            destination: destination.to_string(),
        })
        .await
    }

    async fn send(&self, destination: &str, body: String) -> Result<()> {
        self.send_op(&ClientOp::Send {
            destination: destination.to_string(),
            body,
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        // Abort the read loop first so a deliberate close never fires the
        // drop handler.
        if let Some(task) = self.read_task.lock().await.take() {
            task.abort();
        }

        if let Some(mut writer) = self.writer.lock().await.take() {
            writer
                .send(Message::Close(None))
                .await
                .map_err(|error| NotifyError::WebSocket(error.to_string()))?;
        }

        Ok(())
    }
}
