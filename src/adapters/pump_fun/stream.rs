//! Pump.fun WebSocket Stream
//!
//! Subscribes to the new-token stream and turns every launch into a
//! `price_event` signal. The connection is re-established forever with a
//! fixed backoff until shutdown is signalled.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use super::types::{extract_event, LaunchSummary, SubscribeRequest};
use crate::adapters::source::{SignalEmitter, SourceError};
use crate::domain::{NormalizedSignal, SignalKind, SignalSource};
use crate::ports::store::RawEvent;

/// Default pump.fun stream endpoint
pub const DEFAULT_WS_URL: &str = "wss://pumpportal.fun/api/data";
/// Fixed wait between reconnect attempts
const DEFAULT_RECONNECT_SECS: u64 = 5;
/// Upper bound on a single frame (1 MB)
const MAX_MESSAGE_SIZE: usize = 1_048_576;

#[derive(Debug, Clone)]
pub struct PumpFunConfig {
    pub ws_url: String,
    pub reconnect_backoff: Duration,
    pub connect_timeout: Duration,
    pub max_message_size: usize,
}

impl Default for PumpFunConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            reconnect_backoff: Duration::from_secs(DEFAULT_RECONNECT_SECS),
            connect_timeout: Duration::from_secs(15),
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

/// How a connected session ended
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    Disconnected,
}

pub struct PumpFunStream {
    config: PumpFunConfig,
    emitter: SignalEmitter,
    reconnect_count: AtomicU32,
}

impl PumpFunStream {
    pub fn new(config: PumpFunConfig, emitter: SignalEmitter) -> Self {
        Self {
            config,
            emitter,
            reconnect_count: AtomicU32::new(0),
        }
    }

    /// Number of reconnects since the stream started
    pub fn reconnect_count(&self) -> u32 {
        self.reconnect_count.load(Ordering::Relaxed)
    }

    /// Run until `shutdown` flips to true (or its sender is dropped)
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("PumpFunStream starting, connecting to {}", self.config.ws_url);

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.connect_and_process(&mut shutdown).await {
                Ok(SessionEnd::Shutdown) => break,
                Ok(SessionEnd::Disconnected) => warn!("pump.fun stream closed by server"),
                Err(e) => error!("pump.fun stream error: {}", e),
            }

            let attempt = self.reconnect_count.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                "Reconnecting in {:?} (attempt {})",
                self.config.reconnect_backoff, attempt
            );

            tokio::select! {
                _ = tokio::time::sleep(self.config.reconnect_backoff) => {}
                _ = shutdown.changed() => {}
            }
        }

        info!("PumpFunStream stopped");
    }

    async fn connect_and_process(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<SessionEnd, SourceError> {
        let (ws, _) = tokio::time::timeout(
            self.config.connect_timeout,
            connect_async(self.config.ws_url.as_str()),
        )
        .await
        .map_err(|_| SourceError::ConnectionFailed("connect timed out".into()))?
        .map_err(|e| SourceError::ConnectionFailed(e.to_string()))?;

        let (mut write, mut read) = ws.split();

        let subscribe = serde_json::to_string(&SubscribeRequest::new_tokens())
            .map_err(|e| SourceError::Parse(e.to_string()))?;
        write
            .send(Message::Text(subscribe.into()))
            .await
            .map_err(|e| SourceError::WebSocket(e.to_string()))?;
        info!("Connected to pump.fun, subscribed to new tokens");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        let _ = write.send(Message::Close(None)).await;
                        return Ok(SessionEnd::Shutdown);
                    }
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()).await,
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => self.handle_text(text).await,
                        Err(_) => warn!("Dropping non UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Ping(payload))) => {
                        write
                            .send(Message::Pong(payload))
                            .await
                            .map_err(|e| SourceError::WebSocket(e.to_string()))?;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "close frame received");
                        return Ok(SessionEnd::Disconnected);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(SourceError::WebSocket(e.to_string())),
                    None => return Ok(SessionEnd::Disconnected),
                }
            }
        }
    }

    async fn handle_text(&self, text: &str) {
        if let Err(e) = self.process_message(text).await {
            warn!("Skipping pump.fun message: {}", e);
        }
    }

    /// Handle one text frame: emit a signal for token launches, ignore
    /// subscription acknowledgements and empty frames.
    pub async fn process_message(&self, raw_message: &str) -> Result<(), SourceError> {
        if raw_message.len() > self.config.max_message_size {
            return Err(SourceError::InvalidMessageFormat(format!(
                "Message too large: {} bytes",
                raw_message.len()
            )));
        }

        let trimmed = raw_message.trim();
        if trimmed.is_empty() {
            debug!("Ignoring empty message");
            return Ok(());
        }

        let parsed: Value = serde_json::from_str(trimmed).map_err(|e| {
            SourceError::Parse(format!(
                "JSON parse error at line {}, column {}: {:?}",
                e.line(),
                e.column(),
                e.classify()
            ))
        })?;

        if is_subscription_ack(&parsed) {
            debug!("Subscription confirmed: {}", parsed);
            return Ok(());
        }

        let event = extract_event(parsed);
        if !event.is_object() {
            return Err(SourceError::InvalidMessageFormat(format!(
                "token event is not an object: {}",
                event
            )));
        }
        let summary = LaunchSummary::from_event(&event);
        let mint = summary.mint().to_string();

        debug!(
            mint = %mint,
            name = summary.name.as_deref().unwrap_or(""),
            symbol = summary.symbol.as_deref().unwrap_or(""),
            "New token event"
        );

        let raw = RawEvent::Token {
            token_mint: mint,
            raw: event.clone(),
        };
        let signal = NormalizedSignal::new(SignalKind::PriceEvent, SignalSource::PumpFun, event);

        self.emitter.emit(&signal, Some(raw)).await
    }
}

/// JSON-RPC reply to our subscribe call (`{"id":1,"result":...}`)
fn is_subscription_ack(value: &Value) -> bool {
    value.get("id").is_some() && value.get("result").is_some() && value.get("params").is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryChannel, MemoryStore};
    use crate::ports::channel::Topic;

    fn stream() -> (PumpFunStream, MemoryChannel, MemoryStore) {
        let channel = MemoryChannel::new();
        let store = MemoryStore::new();
        let emitter = SignalEmitter::new(Arc::new(channel.clone()), Arc::new(store.clone()));
        (
            PumpFunStream::new(PumpFunConfig::default(), emitter),
            channel,
            store,
        )
    }

    #[test]
    fn test_config_default() {
        let config = PumpFunConfig::default();
        assert_eq!(config.ws_url, DEFAULT_WS_URL);
        assert_eq!(config.reconnect_backoff, Duration::from_secs(5));
        assert_eq!(config.max_message_size, MAX_MESSAGE_SIZE);
    }

    #[tokio::test]
    async fn test_notification_becomes_price_event() {
        let (stream, channel, _) = stream();
        let text = r#"{"method":"subscription","params":{"result":{"mint":"Mint1","name":"Frog"}}}"#;
        stream.process_message(text).await.unwrap();

        let published = channel.published(Topic::Raw);
        assert_eq!(published.len(), 1);

        let signal = NormalizedSignal::from_wire(&published[0]).unwrap();
        assert_eq!(signal.kind, SignalKind::PriceEvent);
        assert_eq!(signal.source, SignalSource::PumpFun);
        assert_eq!(signal.payload["mint"], "Mint1");
    }

    #[tokio::test]
    async fn test_bare_event_is_used_whole() {
        let (stream, channel, _) = stream();
        stream
            .process_message(r#"{"tokenMint":"T9","symbol":"T"}"#)
            .await
            .unwrap();

        let signal = NormalizedSignal::from_wire(&channel.published(Topic::Raw)[0]).unwrap();
        assert_eq!(signal.payload["tokenMint"], "T9");
    }

    #[tokio::test]
    async fn test_malformed_and_empty_messages() {
        let (stream, channel, _) = stream();

        assert!(matches!(
            stream.process_message("{not json").await,
            Err(SourceError::Parse(_))
        ));
        stream.process_message("   ").await.unwrap();
        stream
            .process_message(r#"{"jsonrpc":"2.0","id":1,"result":42}"#)
            .await
            .unwrap();

        assert!(channel.published(Topic::Raw).is_empty());
    }

    #[tokio::test]
    async fn test_non_object_events_rejected() {
        let (stream, channel, store) = stream();

        for raw in [
            "42",
            r#""hello""#,
            "[1,2]",
            "null",
            r#"{"method":"subscription","params":{"result":"Mint1"}}"#,
        ] {
            let result = stream.process_message(raw).await;
            assert!(
                matches!(result, Err(SourceError::InvalidMessageFormat(_))),
                "{} was accepted",
                raw
            );
        }

        assert!(channel.published(Topic::Raw).is_empty());
        assert!(store.raw_events().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_message_rejected() {
        let channel = MemoryChannel::new();
        let emitter = SignalEmitter::new(Arc::new(channel.clone()), Arc::new(MemoryStore::new()));
        let stream = PumpFunStream::new(
            PumpFunConfig {
                max_message_size: 16,
                ..PumpFunConfig::default()
            },
            emitter,
        );

        let result = stream
            .process_message(r#"{"mint":"a-very-long-mint-address"}"#)
            .await;
        assert!(matches!(result, Err(SourceError::InvalidMessageFormat(_))));
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown_while_backing_off() {
        let channel = MemoryChannel::new();
        let emitter = SignalEmitter::new(Arc::new(channel), Arc::new(MemoryStore::new()));
        let stream = Arc::new(PumpFunStream::new(
            PumpFunConfig {
                ws_url: "ws://127.0.0.1:1".to_string(),
                reconnect_backoff: Duration::from_secs(60),
                ..PumpFunConfig::default()
            },
            emitter,
        ));

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(Arc::clone(&stream).run(rx));

        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("stream did not stop")
            .unwrap();
        assert!(stream.reconnect_count() >= 1);
    }
}
