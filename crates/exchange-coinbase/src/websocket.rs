use crate::auth::Authenticator;
use crate::error::{CoinbaseError, Result};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::Instrument;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Capacity of the inbound message channel.
const MESSAGE_BUFFER: usize = 1024;

/// Lazily connected, authenticated market data feed.
///
/// The first `subscribe` call opens the connection and spawns a reader task
/// that republishes every JSON message on a broadcast channel. If the server
/// closes the socket the next `subscribe` reconnects.
pub struct CoinbaseWebSocket {
    ws_url: String,
    auth: Arc<dyn Authenticator>,
    sink: Arc<Mutex<Option<WsSink>>>,
    messages: broadcast::Sender<Value>,
    span: tracing::Span,
}

impl std::fmt::Debug for CoinbaseWebSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinbaseWebSocket")
            .field("ws_url", &self.ws_url)
            .finish_non_exhaustive()
    }
}

impl CoinbaseWebSocket {
    #[must_use]
    pub fn new(ws_url: impl Into<String>, auth: Arc<dyn Authenticator>, span: tracing::Span) -> Self {
        let (messages, _) = broadcast::channel(MESSAGE_BUFFER);
        Self {
            ws_url: ws_url.into(),
            auth,
            sink: Arc::new(Mutex::new(None)),
            messages,
            span,
        }
    }

    /// Receives every message the feed delivers after this call.
    #[must_use]
    pub fn messages(&self) -> broadcast::Receiver<Value> {
        self.messages.subscribe()
    }

    /// Returns true if a connection is currently open.
    pub async fn is_connected(&self) -> bool {
        self.sink.lock().await.is_some()
    }

    /// Sends one subscribe message per channel, connecting first if needed.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be opened, signing fails, or
    /// a message cannot be sent.
    pub async fn subscribe(&self, channels: &[String], symbols: &[String]) -> Result<()> {
        let mut guard = self.sink.lock().await;
        if guard.is_none() {
            *guard = Some(self.connect().await?);
        }
        let sink = guard.as_mut().ok_or(CoinbaseError::NotConnected)?;

        for channel in channels {
            let fields = self.auth.subscription_fields()?;
            let message = subscribe_message(channel, symbols, fields);
            if let Err(e) = sink.send(Message::Text(message.to_string())).await {
                *guard = None;
                return Err(e.into());
            }
            tracing::info!(parent: &self.span, channel = %channel, symbols = symbols.len(), "subscribed");
        }
        Ok(())
    }

    async fn connect(&self) -> Result<WsSink> {
        tracing::debug!(parent: &self.span, url = %self.ws_url, "connecting websocket");

        let (stream, response) = connect_async(&self.ws_url).await.map_err(|e| {
            tracing::error!(parent: &self.span, error = %e, "websocket connection failed");
            CoinbaseError::WebSocket(format!("failed to connect to {}: {e}", self.ws_url))
        })?;
        tracing::info!(parent: &self.span, status = %response.status(), "websocket connected");

        let (sink, mut read) = stream.split();
        let messages = self.messages.clone();
        let slot = Arc::clone(&self.sink);

        tokio::spawn(
            async move {
                while let Some(msg) = read.next().await {
                    match msg {
                        Ok(Message::Text(text)) => match serde_json::from_str::<Value>(&text) {
                            Ok(value) => {
                                let _ = messages.send(value);
                            }
                            Err(e) => tracing::warn!(error = %e, "unparseable websocket message"),
                        },
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!(error = %e, "websocket read failed");
                            break;
                        }
                    }
                }
                tracing::warn!("websocket closed");
                *slot.lock().await = None;
            }
            .instrument(self.span.clone()),
        );

        Ok(sink)
    }
}

/// Builds a subscribe message for one channel, merged with auth fields.
pub(crate) fn subscribe_message(channel: &str, symbols: &[String], fields: Map<String, Value>) -> Value {
    let mut message = json!({
        "type": "subscribe",
        "product_ids": symbols,
        "channel": channel,
    });
    if let Some(obj) = message.as_object_mut() {
        obj.extend(fields);
    }
    message
}
