//! Source Adapter Integration Tests
//!
//! Run the source adapters against local servers:
//! 1. pump.fun push stream -> reconnect after a dropped session -> decisions
//! 2. Raydium poll -> one liquidity signal and raw row per pool
//!
//! These use real sockets on 127.0.0.1 and wall-clock timing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use signal_brain::adapters::memory::{MemoryChannel, MemoryStore};
use signal_brain::adapters::pump_fun::{PumpFunConfig, PumpFunStream, SubscribeRequest};
use signal_brain::adapters::raydium::{RaydiumConfig, RaydiumPoller};
use signal_brain::adapters::source::{SignalEmitter, SourceError};
use signal_brain::application::{AggregatorConfig, Pipeline, PipelineContext, PipelineMode, Sources};
use signal_brain::domain::{
    Decision, DecisionRequest, NormalizedSignal, RiskConstraints, SignalKind,
};
use signal_brain::ports::{DecisionOracle, OracleError, Topic};

// ============================================================================
// Test Fixtures
// ============================================================================

/// Oracle that always holds and records every request
#[derive(Clone, Default)]
struct HoldOracle {
    requests: Arc<Mutex<Vec<DecisionRequest>>>,
}

impl HoldOracle {
    fn requests(&self) -> Vec<DecisionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DecisionOracle for HoldOracle {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision, OracleError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(Decision::hold("nothing worth trading"))
    }
}

fn context(
    channel: &MemoryChannel,
    store: &MemoryStore,
    oracle: &HoldOracle,
) -> Arc<PipelineContext> {
    Arc::new(PipelineContext::new(
        Arc::new(channel.clone()),
        Arc::new(store.clone()),
        Arc::new(oracle.clone()),
        RiskConstraints::default(),
    ))
}

fn emitter(channel: &MemoryChannel, store: &MemoryStore) -> SignalEmitter {
    SignalEmitter::new(Arc::new(channel.clone()), Arc::new(store.clone()))
}

/// Poll `cond` until it holds or five seconds pass
async fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}

fn raw_signals(channel: &MemoryChannel) -> Vec<NormalizedSignal> {
    channel
        .published(Topic::Raw)
        .iter()
        .map(|body| NormalizedSignal::from_wire(body).unwrap())
        .collect()
}

/// Serve every connection with the same HTTP response. Returns the base URL.
async fn serve_http(status: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = vec![0u8; 4096];
            let mut read = 0;
            // Read until the end of the request headers
            while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf[read..]).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => read += n,
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    format!("http://{}/pairs", addr)
}

// ============================================================================
// Pump.fun
// ============================================================================

mod pump_fun {
    use super::*;

    fn launch(mint: &str) -> String {
        serde_json::json!({
            "jsonrpc": "2.0",
            "method": "subscription",
            "params": {"result": {"mint": mint, "name": "Test", "symbol": "TST"}}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_reconnects_after_dropped_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let subscriptions = Arc::new(Mutex::new(Vec::<String>::new()));

        let seen = Arc::clone(&subscriptions);
        let server = tokio::spawn(async move {
            for session in 0..2 {
                let (tcp, _) = listener.accept().await.unwrap();
                let mut ws = accept_async(tcp).await.unwrap();

                if let Some(Ok(Message::Text(text))) = ws.next().await {
                    seen.lock().unwrap().push(text.as_str().to_string());
                }
                let ack = r#"{"jsonrpc":"2.0","id":1,"result":"sub-1"}"#;
                ws.send(Message::Text(ack.into())).await.unwrap();
                ws.send(Message::Text(launch(&format!("Mint{}", session)).into()))
                    .await
                    .unwrap();

                if session == 0 {
                    // Drop without a close handshake
                    drop(ws);
                } else {
                    while let Some(Ok(_)) = ws.next().await {}
                }
            }
        });

        let channel = MemoryChannel::new();
        let store = MemoryStore::new();
        let oracle = HoldOracle::default();
        let ctx = context(&channel, &store, &oracle);
        let stream = Arc::new(PumpFunStream::new(
            PumpFunConfig {
                ws_url: format!("ws://{}", addr),
                reconnect_backoff: Duration::from_millis(50),
                ..PumpFunConfig::default()
            },
            emitter(&channel, &store),
        ));

        // Both sessions land well inside one window; idle flush closes it
        let pipeline = Pipeline::new(
            Arc::clone(&ctx),
            AggregatorConfig {
                window: Duration::from_secs(2),
                idle_flush: true,
                ..AggregatorConfig::default()
            },
            Sources {
                pump_fun: Some(Arc::clone(&stream)),
                ..Sources::default()
            },
        );
        pipeline.start(PipelineMode::Full).await.unwrap();

        assert!(wait_for(|| channel.published(Topic::Decoded).len() == 1).await);
        assert!(wait_for(|| store.raw_events().len() == 2).await);
        assert!(stream.reconnect_count() >= 1);

        // One window spanning the reconnect, in arrival order
        let requests = oracle.requests();
        assert_eq!(requests.len(), 1);
        let prices = requests[0].grouped_signals.get(SignalKind::PriceEvent);
        assert_eq!(requests[0].grouped_signals.total(), 2);
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].payload["mint"], "Mint0");
        assert_eq!(prices[1].payload["mint"], "Mint1");

        // Acks are not signals
        let signals = raw_signals(&channel);
        assert_eq!(signals.len(), 2);
        assert!(signals.iter().all(|s| s.kind == SignalKind::PriceEvent));
        assert_eq!(signals[0].payload["mint"], "Mint0");
        assert_eq!(signals[1].payload["mint"], "Mint1");

        let mut mints: Vec<String> = store
            .raw_events()
            .iter()
            .map(|e| e.identity().to_string())
            .collect();
        mints.sort();
        assert_eq!(mints, vec!["Mint0", "Mint1"]);

        let expected = serde_json::to_value(SubscribeRequest::new_tokens()).unwrap();
        let subscriptions = subscriptions.lock().unwrap().clone();
        assert_eq!(subscriptions.len(), 2);
        for text in &subscriptions {
            let sent: Value = serde_json::from_str(text).unwrap();
            assert_eq!(sent, expected);
        }

        pipeline.stop().await;
        assert!(channel.is_closed());
        server.abort();
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_keeps_retrying_until_shutdown() {
        // Bind then drop to get a port with nothing listening
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();

        let channel = MemoryChannel::new();
        let store = MemoryStore::new();
        let stream = Arc::new(PumpFunStream::new(
            PumpFunConfig {
                ws_url: format!("ws://{}", addr),
                reconnect_backoff: Duration::from_millis(20),
                ..PumpFunConfig::default()
            },
            emitter(&channel, &store),
        ));

        let (tx, rx) = tokio::sync::watch::channel(false);
        let handle = tokio::spawn(Arc::clone(&stream).run(rx));

        assert!(wait_for(|| stream.reconnect_count() >= 3).await);
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("stream did not stop")
            .unwrap();
        assert!(channel.published(Topic::Raw).is_empty());
    }
}

// ============================================================================
// Raydium
// ============================================================================

mod raydium {
    use super::*;

    fn poller(url: String, channel: &MemoryChannel, store: &MemoryStore) -> RaydiumPoller {
        RaydiumPoller::new(
            RaydiumConfig {
                pools_url: url,
                ..RaydiumConfig::default()
            },
            emitter(channel, store),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_poll_publishes_one_signal_per_pool() {
        let url = serve_http(
            "200 OK",
            r#"[{"id":"P1","liquidity":120.5},{"address":"P2"},{"name":"no id"}]"#,
        )
        .await;
        let channel = MemoryChannel::new();
        let store = MemoryStore::new();

        let count = poller(url, &channel, &store).poll_once().await.unwrap();
        assert_eq!(count, 3);

        let signals = raw_signals(&channel);
        assert_eq!(signals.len(), 3);
        assert!(signals.iter().all(|s| s.kind == SignalKind::LiquidityEvent));
        assert_eq!(signals[0].payload["liquidity"], 120.5);

        assert!(wait_for(|| store.raw_events().len() == 3).await);
        let mut ids: Vec<String> = store
            .raw_events()
            .iter()
            .map(|e| e.identity().to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["", "P1", "P2"]);
    }

    #[tokio::test]
    async fn test_error_status_publishes_nothing() {
        let url = serve_http("503 Service Unavailable", r#"{"error":"busy"}"#).await;
        let channel = MemoryChannel::new();
        let store = MemoryStore::new();

        let result = poller(url, &channel, &store).poll_once().await;
        assert!(matches!(result, Err(SourceError::Http(_))));
        assert!(channel.published(Topic::Raw).is_empty());
    }

    #[tokio::test]
    async fn test_non_list_body_rejected() {
        let url = serve_http("200 OK", r#"{"data":[]}"#).await;
        let channel = MemoryChannel::new();
        let store = MemoryStore::new();

        let result = poller(url, &channel, &store).poll_once().await;
        assert!(matches!(result, Err(SourceError::InvalidMessageFormat(_))));
        assert!(channel.published(Topic::Raw).is_empty());
    }
}
