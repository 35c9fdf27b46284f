// src/infrastructure/market/mod.rs
// Feed connection manager for the Binance trade stream

use std::sync::Arc;
use std::time::Duration;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::application::dto::parser::parse_trade_frame;
use crate::application::service::{EventQueue, FeedStats, FeedStatus, SubmitOutcome};
use crate::domain::errors::{ConnectionError, ConnectionResult, ParseError};
use crate::domain::model::ConnectionState;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a requested close waits for the server to acknowledge
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on waiting for the session task during `disconnect`
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// WebSocket endpoint, e.g. `wss://stream.binance.com:9443/ws/btcusdt@trade`
    pub url: String,
    /// Fixed wait before the single reconnect attempt after an abnormal close
    pub reconnect_delay: Duration,
    /// Upper bound on the TCP connect plus WebSocket upgrade
    pub handshake_timeout: Duration,
}

/// Why a session's read loop returned
#[derive(Debug)]
enum SessionEnd {
    /// `disconnect` was called
    Requested,
    /// Server closed with 1000
    Normal,
    Abnormal(String),
}

/// Owns the single connection to the feed.
///
/// The connection state lives in a watch channel and only this type writes
/// it. A new `Connecting` attempt is claimed with a compare-and-set from
/// `Disconnected`, so a manual `connect` and a scheduled reconnect can never
/// both open a socket. Each session ends with exactly one [`SessionEnd`],
/// which is the only thing that can schedule a reconnect.
pub struct FeedConnectionManager {
    settings: FeedSettings,
    queue: Arc<EventQueue>,
    state: watch::Sender<ConnectionState>,
    stats: Arc<FeedStats>,
    shutdown: CancellationToken,
    session: Mutex<Option<JoinHandle<()>>>,
}

impl FeedConnectionManager {
    pub fn new(settings: FeedSettings, queue: Arc<EventQueue>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            settings,
            queue,
            state,
            stats: Arc::new(FeedStats::default()),
            shutdown: CancellationToken::new(),
            session: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Watch connection state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn status(&self) -> FeedStatus {
        FeedStatus::new(self.state.subscribe(), self.stats.clone())
    }

    pub fn stats(&self) -> &FeedStats {
        &self.stats
    }

    /// Open the connection and start receiving.
    ///
    /// Returns once the handshake has completed and the state is
    /// `Connected`, or with the error that prevented it.
    pub async fn connect(self: &Arc<Self>) -> ConnectionResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(ConnectionError::ShutDown);
        }

        let endpoint = Url::parse(&self.settings.url).map_err(|e| {
            ConnectionError::InvalidEndpoint(format!("{}: {}", self.settings.url, e))
        })?;
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(ConnectionError::InvalidEndpoint(self.settings.url.clone()));
        }

        let ws = self.establish().await?;
        let handle = tokio::spawn(self.clone().run_session(ws));
        *self.session.lock().await = Some(handle);

        Ok(())
    }

    /// Close the connection for good. No reconnect follows.
    pub async fn disconnect(&self) {
        log::info!("Disconnecting from feed...");
        self.shutdown.cancel();

        let session = self.session.lock().await.take();
        if let Some(mut handle) = session {
            match tokio::time::timeout(DISCONNECT_TIMEOUT, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::error!("Feed session task failed: {}", e),
                Err(_) => {
                    log::warn!(
                        "Feed session did not stop within {:?}, aborting",
                        DISCONNECT_TIMEOUT
                    );
                    handle.abort();
                }
            }
        }

        self.state.send_replace(ConnectionState::Disconnected);
        log::info!("Feed connection closed");
    }

    async fn establish(&self) -> ConnectionResult<WsStream> {
        let claimed = self.state.send_if_modified(|state| {
            if *state == ConnectionState::Disconnected {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(ConnectionError::InvalidState(self.state().to_string()));
        }

        log::info!("Connecting to feed {}", self.settings.url);

        let handshake = tokio::time::timeout(
            self.settings.handshake_timeout,
            connect_async(self.settings.url.as_str()),
        );

        match handshake.await {
            Ok(Ok((mut ws, _response))) => {
                if self.shutdown.is_cancelled() {
                    let _ = ws.close(None).await;
                    self.state.send_replace(ConnectionState::Disconnected);
                    return Err(ConnectionError::ShutDown);
                }
                self.state.send_replace(ConnectionState::Connected);
                log::info!("Connected to feed {}", self.settings.url);
                Ok(ws)
            }
            Ok(Err(e)) => {
                self.state.send_replace(ConnectionState::Disconnected);
                log::error!("Failed to connect to feed {}: {}", self.settings.url, e);
                Err(ConnectionError::Handshake(e.to_string()))
            }
            Err(_) => {
                self.state.send_replace(ConnectionState::Disconnected);
                log::error!(
                    "Handshake with feed {} timed out after {:?}",
                    self.settings.url,
                    self.settings.handshake_timeout
                );
                Err(ConnectionError::Handshake("timed out".into()))
            }
        }
    }

    async fn run_session(self: Arc<Self>, mut ws: WsStream) {
        loop {
            match self.read_frames(ws).await {
                SessionEnd::Requested => {
                    self.state.send_replace(ConnectionState::Disconnected);
                    return;
                }
                SessionEnd::Normal => {
                    self.state.send_replace(ConnectionState::Disconnected);
                    log::info!("Feed closed the connection normally, not reconnecting");
                    return;
                }
                SessionEnd::Abnormal(reason) => {
                    self.state.send_replace(ConnectionState::Disconnected);
                    log::warn!("Feed connection lost: {}", reason);

                    match self.reconnect_once().await {
                        Some(next) => ws = next,
                        None => return,
                    }
                }
            }
        }
    }

    /// One delayed attempt per abnormal closure, no backoff
    async fn reconnect_once(&self) -> Option<WsStream> {
        log::info!("Attempting to reconnect in {:?}...", self.settings.reconnect_delay);

        tokio::select! {
            () = self.shutdown.cancelled() => {
                log::info!("Shutdown requested during reconnect delay");
                return None;
            }
            () = tokio::time::sleep(self.settings.reconnect_delay) => {}
        }

        self.stats.record_reconnect_attempt();
        match self.establish().await {
            Ok(ws) => Some(ws),
            Err(e) => {
                log::error!("Reconnect attempt failed: {}", e);
                None
            }
        }
    }

    async fn read_frames(&self, ws: WsStream) -> SessionEnd {
        let (mut write, mut read) = ws.split();

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    self.close_gracefully(&mut write, &mut read).await;
                    return SessionEnd::Requested;
                }
                message = read.next() => match message {
                    Some(Ok(Message::Text(text))) => self.handle_frame(&text),
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                        Ok(text) => self.handle_frame(&text),
                        Err(_) => self.record_parse_failure(&ParseError::NotUtf8, "<binary>"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        return match frame {
                            Some(frame) if frame.code == CloseCode::Normal => SessionEnd::Normal,
                            Some(frame) => SessionEnd::Abnormal(format!(
                                "closed with code {} ({})",
                                u16::from(frame.code),
                                frame.reason
                            )),
                            None => SessionEnd::Abnormal("closed without a status code".into()),
                        };
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return SessionEnd::Abnormal(format!("transport error: {}", e)),
                    None => {
                        return SessionEnd::Abnormal("stream ended without a close frame".into());
                    }
                },
            }
        }
    }

    async fn close_gracefully(
        &self,
        write: &mut SplitSink<WsStream, Message>,
        read: &mut SplitStream<WsStream>,
    ) {
        self.state.send_replace(ConnectionState::Closing);

        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "client shutdown".into(),
        };
        if let Err(e) = write.send(Message::Close(Some(frame))).await {
            log::warn!("Failed to send close frame: {}", e);
            return;
        }

        // Let the server acknowledge; whatever else arrives is discarded
        let _ = tokio::time::timeout(CLOSE_TIMEOUT, async {
            while let Some(Ok(_)) = read.next().await {}
        })
        .await;
    }

    fn handle_frame(&self, text: &str) {
        self.stats.record_frame();

        match parse_trade_frame(text) {
            Ok(Some(event)) => {
                if self.queue.submit(event) == SubmitOutcome::Enqueued {
                    self.stats.record_submitted();
                }
            }
            Ok(None) => log::trace!("Ignoring non-trade frame: {}", text),
            Err(e) => self.record_parse_failure(&e, text),
        }
    }

    fn record_parse_failure(&self, error: &ParseError, raw: &str) {
        self.stats.record_parse_failure();
        log::warn!("Dropping malformed frame ({}): {}", error, raw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    fn settings(url: &str) -> FeedSettings {
        FeedSettings {
            url: url.to_string(),
            reconnect_delay: Duration::from_millis(50),
            handshake_timeout: Duration::from_millis(200),
        }
    }

    fn manager(url: &str) -> Arc<FeedConnectionManager> {
        Arc::new(FeedConnectionManager::new(
            settings(url),
            Arc::new(EventQueue::new(16)),
        ))
    }

    #[tokio::test]
    async fn connect_failure_leaves_manager_disconnected() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let manager = manager(&format!("ws://{}", addr));
        let result = manager.connect().await;

        assert!(matches!(result, Err(ConnectionError::Handshake(_))));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.stats().reconnect_attempts(), 0);
    }

    #[tokio::test]
    async fn silent_endpoint_times_out_handshake() {
        // Accepts TCP and never answers the upgrade request
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let holder = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let manager = manager(&format!("ws://{}", addr));
        let result = tokio::time::timeout(Duration::from_secs(5), manager.connect())
            .await
            .expect("connect must give up on its own");

        match result {
            Err(ConnectionError::Handshake(reason)) => assert_eq!(reason, "timed out"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        holder.abort();
    }

    #[tokio::test]
    async fn state_transitions_are_published() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let manager = manager(&format!("ws://{}", addr));
        let mut states = manager.subscribe_state();
        assert!(!manager.is_connected());

        manager.connect().await.unwrap();
        assert!(manager.is_connected());
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), ConnectionState::Connected);

        manager.disconnect().await;
        assert!(!manager.is_connected());
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), ConnectionState::Disconnected);
        assert_eq!(manager.status().state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn connect_after_disconnect_is_refused() {
        let manager = manager("ws://127.0.0.1:9");
        manager.disconnect().await;

        assert!(matches!(manager.connect().await, Err(ConnectionError::ShutDown)));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn rejects_non_websocket_endpoint() {
        let manager = manager("http://127.0.0.1:9");

        assert!(matches!(
            manager.connect().await,
            Err(ConnectionError::InvalidEndpoint(_))
        ));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn frames_are_parsed_and_counted() {
        let queue = Arc::new(EventQueue::new(16));
        let manager = FeedConnectionManager::new(settings("ws://127.0.0.1:9"), queue.clone());

        manager.handle_frame(r#"{"e":"trade","s":"BTCUSDT","p":"1.5","q":"2","T":1700000000000}"#);
        manager.handle_frame(r#"{"e":"trade","s":"BTCUSDT","q":"2","T":1700000000000}"#);
        manager.handle_frame(r#"{"result":null,"id":1}"#);
        manager.handle_frame(r#"{"e":"trade","s":"BTCUSDT","p":"3","q":"x","T":1700000000000}"#);
        manager.handle_frame(r#"{"e":"trade","s":"ETHUSDT","p":"4","q":"1","T":1700000000001}"#);

        assert_eq!(manager.stats().frames_received(), 5);
        assert_eq!(manager.stats().parse_failures(), 2);
        assert_eq!(manager.stats().trades_submitted(), 2);
        assert_eq!(queue.size(), 2);
        assert_eq!(queue.take_next().await.unwrap().symbol(), "BTCUSDT");
        assert_eq!(queue.take_next().await.unwrap().symbol(), "ETHUSDT");
    }
}
