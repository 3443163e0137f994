//! Dual-channel (market/user) WebSocket streaming client: heartbeat,
//! reconnect with exponential backoff, resubscription replay, a typed
//! event demultiplexer, and bounded back-pressure channels.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_tungstenite::tungstenite::Message;

use crate::config::Config;
use crate::credentials::ApiKey;
use crate::error::ClobError;
use crate::stream::events::{parse_market_event, parse_user_event, unpack_frame, MarketEvent, UserEvent};
use crate::stream::subscription::SubscriptionSet;

const EVENT_CHANNEL_CAPACITY: usize = 100;

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = futures_util::stream::SplitSink<WsStream, Message>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

#[derive(Debug, Clone)]
pub struct ConnectionStateEvent {
    pub channel: &'static str,
    pub state: ConnectionState,
}

#[derive(Serialize)]
struct SubscribeFrame<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    operation: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    assets_ids: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    markets: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    initial_dump: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_feature_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth: Option<AuthFrame<'a>>,
}

#[derive(Serialize)]
struct AuthFrame<'a> {
    #[serde(rename = "apiKey")]
    api_key: &'a str,
    secret: &'a str,
    passphrase: &'a str,
}

/// One managed WebSocket connection: a market channel or a user channel.
struct Connection {
    kind: &'static str,
    url: String,
    auth: Option<ApiKey>,
    subs: Arc<SubscriptionSet>,
    shutdown_rx: watch::Receiver<bool>,
    reconnect: crate::config::ReconnectConfig,
    heartbeat_interval: Duration,
    market_tx: mpsc::Sender<MarketEvent>,
    user_tx: mpsc::Sender<UserEvent>,
    lag_tx: mpsc::Sender<ClobError>,
    state_tx: Option<mpsc::Sender<ConnectionStateEvent>>,
}

impl Connection {
    async fn run(mut self) {
        let mut attempt: u32 = 0;
        let mut delay = Duration::from_millis(self.reconnect.base_delay_ms);

        loop {
            if *self.shutdown_rx.borrow() {
                return;
            }
            self.publish_state(if attempt == 0 {
                ConnectionState::Connecting
            } else {
                ConnectionState::Reconnecting { attempt }
            });

            match self.connect_once().await {
                Ok(()) => {
                    // connect_once only returns Ok on a clean shutdown-driven close.
                    return;
                }
                Err(e) => {
                    tracing::warn!(channel = self.kind, error = %e, "stream connection lost");
                    if !self.reconnect.enabled {
                        return;
                    }
                    attempt += 1;
                    if self.reconnect.max_attempts > 0 && attempt as i64 > self.reconnect.max_attempts {
                        tracing::error!(channel = self.kind, "reconnect attempts exhausted");
                        return;
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.shutdown_rx.changed() => {
                            if *self.shutdown_rx.borrow() { return; }
                        }
                    }
                    delay = (delay * 2).min(Duration::from_millis(self.reconnect.max_delay_ms));
                }
            }
        }
    }

    fn publish_state(&self, state: ConnectionState) {
        if let Some(tx) = &self.state_tx {
            let _ = tx.try_send(ConnectionStateEvent { channel: self.kind, state });
        }
    }

    async fn connect_once(&mut self) -> crate::error::Result<()> {
        let (ws, _resp) = tokio_tungstenite::connect_async(&self.url)
            .await
            .map_err(ClobError::WebSocket)?;
        let (sink, mut stream) = ws.split();
        let sink = Arc::new(Mutex::new(sink));

        self.publish_state(ConnectionState::Connected);
        self.replay_subscriptions(&sink).await?;

        let mut ping_interval = tokio::time::interval(self.heartbeat_interval);
        ping_interval.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        let ids = self.subs.snapshot();
                        if !ids.is_empty() {
                            let _ = self.send_subscribe_frame(&sink, &ids, "unsubscribe").await;
                        }
                        let _ = sink.lock().await.send(Message::Close(None)).await;
                        return Ok(());
                    }
                }
                _ = ping_interval.tick() => {
                    if sink.lock().await.send(Message::Text("PING".to_string())).await.is_err() {
                        return Err(ClobError::InvalidSubscription("ping failed".to_string()));
                    }
                }
                msg = stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_text(&text).await,
                        Some(Ok(Message::Close(_))) | None => {
                            return Err(ClobError::InvalidSubscription("connection closed by peer".to_string()));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(ClobError::WebSocket(e)),
                    }
                }
            }
        }
    }

    async fn handle_text(&self, text: &str) {
        if text == "PONG" {
            return;
        }
        for obj in unpack_frame(text) {
            match self.kind {
                "market" => {
                    for event in parse_market_event(&obj) {
                        if self.market_tx.try_send(event).is_err() {
                            let _ = self.lag_tx.try_send(ClobError::Lagged {
                                channel: "market".to_string(),
                                dropped: 1,
                            });
                        }
                    }
                }
                _ => {
                    for event in parse_user_event(&obj) {
                        if self.user_tx.try_send(event).is_err() {
                            let _ = self.lag_tx.try_send(ClobError::Lagged {
                                channel: "user".to_string(),
                                dropped: 1,
                            });
                        }
                    }
                }
            }
        }
    }

    async fn replay_subscriptions(&self, sink: &Arc<Mutex<WsSink>>) -> crate::error::Result<()> {
        let ids = self.subs.snapshot();
        if ids.is_empty() {
            return Ok(());
        }
        self.send_subscribe_frame(sink, &ids, "subscribe").await
    }

    async fn send_subscribe_frame(
        &self,
        sink: &Arc<Mutex<WsSink>>,
        ids: &[String],
        operation: &str,
    ) -> crate::error::Result<()> {
        let auth = self.auth.as_ref().map(|a| AuthFrame {
            api_key: &a.api_key,
            secret: &a.secret,
            passphrase: &a.passphrase,
        });
        let frame = if self.kind == "market" {
            SubscribeFrame {
                kind: "market",
                operation,
                assets_ids: Some(ids),
                markets: None,
                initial_dump: Some(true),
                custom_feature_enabled: Some(self.subs.custom_feature_enabled()),
                auth: None,
            }
        } else {
            SubscribeFrame {
                kind: "user",
                operation,
                assets_ids: None,
                markets: Some(ids),
                initial_dump: Some(true),
                custom_feature_enabled: Some(self.subs.custom_feature_enabled()),
                auth,
            }
        };
        let text = serde_json::to_string(&frame)?;
        sink.lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(ClobError::WebSocket)
    }
}

/// The dual-channel streaming client handle. Construct via
/// [`StreamClient::new`]; call [`StreamClient::subscribe_market`] /
/// [`StreamClient::subscribe_user`] to lazily open connections.
pub struct StreamClient {
    config: Config,
    creds: Option<ApiKey>,
    market_subs: Arc<SubscriptionSet>,
    user_subs: Arc<SubscriptionSet>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    closed: AtomicBool,
    market_rx: Option<mpsc::Receiver<MarketEvent>>,
    user_rx: Option<mpsc::Receiver<UserEvent>>,
    lag_rx: Option<mpsc::Receiver<ClobError>>,
    state_rx: Option<mpsc::Receiver<ConnectionStateEvent>>,
    // `None` once `close()` has run: closes the channel for good, and tells
    // `spawn_connection` there's nothing left to hand a new connection.
    market_tx: StdMutex<Option<mpsc::Sender<MarketEvent>>>,
    user_tx: StdMutex<Option<mpsc::Sender<UserEvent>>>,
    lag_tx: StdMutex<Option<mpsc::Sender<ClobError>>>,
    state_tx: StdMutex<Option<mpsc::Sender<ConnectionStateEvent>>>,
    market_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    user_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl StreamClient {
    pub fn new(config: Config, creds: Option<ApiKey>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (market_tx, market_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (user_tx, user_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (lag_tx, lag_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            creds,
            market_subs: Arc::new(SubscriptionSet::new()),
            user_subs: Arc::new(SubscriptionSet::new()),
            shutdown_tx,
            shutdown_rx,
            closed: AtomicBool::new(false),
            market_rx: Some(market_rx),
            user_rx: Some(user_rx),
            lag_rx: Some(lag_rx),
            state_rx: Some(state_rx),
            market_tx: StdMutex::new(Some(market_tx)),
            user_tx: StdMutex::new(Some(user_tx)),
            lag_tx: StdMutex::new(Some(lag_tx)),
            state_tx: StdMutex::new(Some(state_tx)),
            market_task: Mutex::new(None),
            user_task: Mutex::new(None),
        }
    }

    pub fn take_market_events(&mut self) -> Option<mpsc::Receiver<MarketEvent>> {
        self.market_rx.take()
    }

    pub fn take_user_events(&mut self) -> Option<mpsc::Receiver<UserEvent>> {
        self.user_rx.take()
    }

    pub fn take_lag_events(&mut self) -> Option<mpsc::Receiver<ClobError>> {
        self.lag_rx.take()
    }

    pub fn take_connection_state_events(&mut self) -> Option<mpsc::Receiver<ConnectionStateEvent>> {
        self.state_rx.take()
    }

    /// Returns `None` without spawning once `close()` has consumed the
    /// channels — there's nowhere left for events to go.
    fn spawn_connection(&self, kind: &'static str) -> Option<tokio::task::JoinHandle<()>> {
        let market_tx = self.market_tx.lock().expect("lock poisoned").clone()?;
        let user_tx = self.user_tx.lock().expect("lock poisoned").clone()?;
        let lag_tx = self.lag_tx.lock().expect("lock poisoned").clone()?;
        let state_tx = self.state_tx.lock().expect("lock poisoned").clone();

        let url = format!(
            "{}/ws/{}",
            self.config.ws_base.trim_end_matches('/'),
            kind
        );
        let subs = if kind == "market" {
            self.market_subs.clone()
        } else {
            self.user_subs.clone()
        };
        let conn = Connection {
            kind,
            url,
            auth: if kind == "user" { self.creds.clone() } else { None },
            subs,
            shutdown_rx: self.shutdown_rx.clone(),
            reconnect: self.config.reconnect.clone(),
            heartbeat_interval: Duration::from_millis(self.config.heartbeat_interval_ms),
            market_tx,
            user_tx,
            lag_tx,
            state_tx,
        };
        Some(tokio::spawn(conn.run()))
    }

    pub async fn subscribe_market(&self, asset_id: impl Into<String>) -> crate::error::Result<()> {
        self.market_subs.add(asset_id);
        self.ensure_market_connection().await;
        Ok(())
    }

    pub async fn unsubscribe_market(&self, asset_id: &str) {
        self.market_subs.remove(asset_id);
    }

    pub async fn subscribe_user(&self, market_id: impl Into<String>) -> crate::error::Result<()> {
        if self.creds.is_none() {
            return Err(ClobError::MissingCreds);
        }
        self.user_subs.add(market_id);
        self.ensure_user_connection().await;
        Ok(())
    }

    pub async fn unsubscribe_user(&self, market_id: &str) {
        self.user_subs.remove(market_id);
    }

    async fn ensure_market_connection(&self) {
        let mut guard = self.market_task.lock().await;
        if guard.is_none() {
            *guard = self.spawn_connection("market");
        }
    }

    async fn ensure_user_connection(&self) {
        let mut guard = self.user_task.lock().await;
        if guard.is_none() {
            *guard = self.spawn_connection("user");
        }
    }

    /// Idempotent close: safe to call more than once. Each still-open
    /// connection gets a best-effort `unsubscribe` frame for its tracked
    /// ids before the socket closes, and every typed event channel is
    /// closed for good.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(true);
        // Connections read `subs` while reacting to the shutdown signal, so
        // don't clear it until they've had the chance (after the joins below).
        if let Some(handle) = self.market_task.lock().await.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.user_task.lock().await.take() {
            let _ = handle.await;
        }

        self.market_subs.clear();
        self.user_subs.clear();

        self.market_tx.lock().expect("lock poisoned").take();
        self.user_tx.lock().expect("lock poisoned").take();
        self.lag_tx.lock().expect("lock poisoned").take();
        self.state_tx.lock().expect("lock poisoned").take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn close_is_idempotent() {
        let client = StreamClient::new(Config::default(), None);
        client.close().await;
        client.close().await;
    }

    /// `close()` tells the live connection to unsubscribe before it hangs
    /// up, and drops its own sender clones so the taken receiver observes
    /// the channel closing.
    #[tokio::test]
    async fn close_sends_unsubscribe_and_closes_channels() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (frames_tx, mut frames_rx) = mpsc::channel::<String>(4);
        tokio::spawn(async move {
            let (stream, _) = match listener.accept().await {
                Ok(v) => v,
                Err(_) => return,
            };
            let mut ws = match tokio_tungstenite::accept_async(stream).await {
                Ok(v) => v,
                Err(_) => return,
            };
            for _ in 0..2 {
                if let Some(Ok(Message::Text(text))) = ws.next().await {
                    let _ = frames_tx.send(text).await;
                }
            }
        });

        let mut config = Config::default();
        config.ws_base = format!("ws://{addr}");
        config.reconnect.enabled = false;

        let mut client = StreamClient::new(config, None);
        let mut market_rx = client.take_market_events().unwrap();

        client.subscribe_market("asset-1").await.unwrap();

        let subscribe_frame = tokio::time::timeout(Duration::from_secs(2), frames_rx.recv())
            .await
            .expect("subscribe frame")
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&subscribe_frame).unwrap();
        assert_eq!(v["operation"], "subscribe");

        client.close().await;

        let unsubscribe_frame = tokio::time::timeout(Duration::from_secs(2), frames_rx.recv())
            .await
            .expect("unsubscribe frame")
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&unsubscribe_frame).unwrap();
        assert_eq!(v["operation"], "unsubscribe");
        assert_eq!(v["assets_ids"][0], "asset-1");

        assert!(market_rx.recv().await.is_none());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_millis(2_000);
        let max = Duration::from_millis(30_000);
        let mut delay = base;
        for _ in 0..10 {
            delay = (delay * 2).min(max);
        }
        assert_eq!(delay, max);
    }

    /// Every message beyond channel capacity that a consumer never drains
    /// produces exactly one `Lagged` notification, not zero and not more
    /// than one per dropped message.
    #[tokio::test]
    async fn lag_notification_fires_once_per_dropped_message() {
        let (market_tx, market_rx) = mpsc::channel(1);
        let (user_tx, _user_rx) = mpsc::channel(8);
        let (lag_tx, mut lag_rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let conn = Connection {
            kind: "market",
            url: String::new(),
            auth: None,
            subs: Arc::new(SubscriptionSet::new()),
            shutdown_rx,
            reconnect: crate::config::ReconnectConfig::default(),
            heartbeat_interval: Duration::from_secs(3600),
            market_tx,
            user_tx,
            lag_tx,
            state_tx: None,
        };

        // Capacity is 1 and nobody reads `market_rx`, so the first book frame
        // fills the channel and every frame after it is dropped.
        let book = r#"{"event_type":"book","asset_id":"a","bids":[],"asks":[],"hash":"h"}"#;
        conn.handle_text(book).await;
        conn.handle_text(book).await;
        conn.handle_text(book).await;

        drop(market_rx); // keep the slot occupied; never drained

        assert_eq!(lag_rx.len(), 2);
        for _ in 0..2 {
            let err = lag_rx.try_recv().unwrap();
            match err {
                ClobError::Lagged { channel, dropped } => {
                    assert_eq!(channel, "market");
                    assert_eq!(dropped, 1);
                }
                other => panic!("unexpected error variant: {other:?}"),
            }
        }
        assert!(lag_rx.try_recv().is_err());
    }

    /// After the server closes the connection, the replacement connection's
    /// first outbound frame replays every subscription id that was active
    /// before the disconnect.
    #[tokio::test]
    async fn reconnect_replays_active_subscriptions() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (frames_tx, mut frames_rx) = mpsc::channel::<String>(4);
        tokio::spawn(async move {
            for _ in 0..2 {
                let (stream, _) = match listener.accept().await {
                    Ok(v) => v,
                    Err(_) => return,
                };
                let mut ws = match tokio_tungstenite::accept_async(stream).await {
                    Ok(v) => v,
                    Err(_) => return,
                };
                if let Some(Ok(Message::Text(text))) = ws.next().await {
                    let _ = frames_tx.send(text).await;
                }
                // Dropping `ws` here closes the socket, forcing the client
                // to observe a disconnect and reconnect.
            }
        });

        let subs = Arc::new(SubscriptionSet::new());
        subs.add("asset-1");
        subs.add("asset-2");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (market_tx, _market_rx) = mpsc::channel(8);
        let (user_tx, _user_rx) = mpsc::channel(8);
        let (lag_tx, _lag_rx) = mpsc::channel(8);

        let conn = Connection {
            kind: "market",
            url: format!("ws://{addr}/ws/market"),
            auth: None,
            subs,
            shutdown_rx,
            reconnect: crate::config::ReconnectConfig {
                enabled: true,
                max_attempts: 5,
                base_delay_ms: 5,
                max_delay_ms: 20,
            },
            heartbeat_interval: Duration::from_secs(3600),
            market_tx,
            user_tx,
            lag_tx,
            state_tx: None,
        };

        let handle = tokio::spawn(conn.run());

        let first = tokio::time::timeout(Duration::from_secs(2), frames_rx.recv())
            .await
            .expect("first subscribe frame")
            .unwrap();
        let second = tokio::time::timeout(Duration::from_secs(2), frames_rx.recv())
            .await
            .expect("replayed subscribe frame after reconnect")
            .unwrap();

        let _ = shutdown_tx.send(true);
        let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;

        for frame in [first, second] {
            let v: serde_json::Value = serde_json::from_str(&frame).unwrap();
            let ids: Vec<String> = v["assets_ids"]
                .as_array()
                .expect("assets_ids present")
                .iter()
                .map(|x| x.as_str().unwrap().to_string())
                .collect();
            assert!(ids.contains(&"asset-1".to_string()));
            assert!(ids.contains(&"asset-2".to_string()));
        }
    }
}
