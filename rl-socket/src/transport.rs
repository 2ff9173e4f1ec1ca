//! Socket transport seam.
//!
//! A `Transport` opens one connection and hands back a sink for outbound
//! text plus a stream of `TransportEvent`s. `WsTransport` speaks real
//! WebSocket through tokio-tungstenite; `LoopbackTransport` keeps everything
//! in-process so connection behavior can be driven deterministically.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rl_core::config::ServerConfig;
use rl_core::constants::DEFAULT_HANDSHAKE_TIMEOUT_MS;
use rl_core::{RlError, RlResult};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Close code reported when the connection dropped without a close frame.
pub const ABNORMAL_CLOSURE_CODE: u16 = 1006;

/// Close code reported when the peer sent a close frame without a status.
pub const NO_STATUS_CODE: u16 = 1005;

/// Lifecycle and data events from one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    /// Always the last event for a connection.
    Closed { code: u16, reason: String },
    Error(String),
}

/// Write half of an open connection.
pub trait SocketSink: Send + Sync {
    fn send_text(&self, text: String) -> RlResult<()>;
    fn close(&self, code: u16, reason: &str);
}

/// A connection handed out by `Transport::open`.
pub struct SocketConnection {
    pub sink: Box<dyn SocketSink>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens socket connections.
///
/// `open` returns immediately; `TransportEvent::Opened` arrives on the
/// event stream once the handshake completes.
pub trait Transport: Send + Sync + 'static {
    fn open(&self, url: &str) -> RlResult<SocketConnection>;
}

// ----------------------------------------------------------------------------
// WebSocket
// ----------------------------------------------------------------------------

enum WsCommand {
    Text(String),
    Close(u16, String),
}

struct WsSink {
    commands: mpsc::UnboundedSender<WsCommand>,
}

impl SocketSink for WsSink {
    fn send_text(&self, text: String) -> RlResult<()> {
        self.commands
            .send(WsCommand::Text(text))
            .map_err(|_| RlError::NotConnected)
    }

    fn close(&self, code: u16, reason: &str) {
        let _ = self.commands.send(WsCommand::Close(code, reason.to_string()));
    }
}

/// WebSocket transport over tokio-tungstenite.
///
/// A handshake that does not finish within `handshake_timeout` is reported
/// as an error followed by an abnormal close.
#[derive(Debug, Clone)]
pub struct WsTransport {
    handshake_timeout: Duration,
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl WsTransport {
    pub fn new() -> Self {
        Self {
            handshake_timeout: Duration::from_millis(DEFAULT_HANDSHAKE_TIMEOUT_MS),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new().with_handshake_timeout(Duration::from_millis(config.handshake_timeout_ms))
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &str) -> RlResult<SocketConnection> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| RlError::Socket(format!("no async runtime: {e}")))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        runtime.spawn(run_ws(
            url.to_string(),
            self.handshake_timeout,
            command_rx,
            event_tx,
        ));

        Ok(SocketConnection {
            sink: Box::new(WsSink {
                commands: command_tx,
            }),
            events: event_rx,
        })
    }
}

fn report_failure(events: &mpsc::UnboundedSender<TransportEvent>, message: String) {
    let _ = events.send(TransportEvent::Error(message.clone()));
    let _ = events.send(TransportEvent::Closed {
        code: ABNORMAL_CLOSURE_CODE,
        reason: message,
    });
}

async fn run_ws(
    url: String,
    handshake_timeout: Duration,
    mut commands: mpsc::UnboundedReceiver<WsCommand>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    debug!("opening websocket to {url}");
    let handshake = tokio::time::timeout(
        handshake_timeout,
        tokio_tungstenite::connect_async(url.as_str()),
    );
    let stream = match handshake.await {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => {
            warn!("websocket connect to {url} failed: {e}");
            report_failure(&events, e.to_string());
            return;
        }
        Err(_) => {
            warn!("websocket handshake with {url} timed out after {handshake_timeout:?}");
            report_failure(
                &events,
                format!("handshake timed out after {}ms", handshake_timeout.as_millis()),
            );
            return;
        }
    };
    info!("websocket open: {url}");
    let _ = events.send(TransportEvent::Opened);

    let (mut write, mut read) = stream.split();
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(WsCommand::Text(text)) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        error!("websocket write failed: {e}");
                        report_failure(&events, e.to_string());
                        break;
                    }
                }
                Some(WsCommand::Close(code, reason)) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.clone().into(),
                    };
                    let _ = write.send(Message::Close(Some(frame))).await;
                    let _ = events.send(TransportEvent::Closed { code, reason });
                    break;
                }
                None => {
                    // sink dropped without an explicit close
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(TransportEvent::Message(text));
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => {
                        let _ = events.send(TransportEvent::Message(text));
                    }
                    Err(e) => warn!("dropping non-utf8 binary frame: {e}"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.to_string()))
                        .unwrap_or((NO_STATUS_CODE, String::new()));
                    info!("websocket closed by server: {code} {reason}");
                    let _ = events.send(TransportEvent::Closed { code, reason });
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("websocket read failed: {e}");
                    report_failure(&events, e.to_string());
                    break;
                }
                None => {
                    let _ = events.send(TransportEvent::Closed {
                        code: ABNORMAL_CLOSURE_CODE,
                        reason: "stream ended".to_string(),
                    });
                    break;
                }
            },
        }
    }
    debug!("websocket task for {url} finished");
}

// ----------------------------------------------------------------------------
// Loopback
// ----------------------------------------------------------------------------

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

struct PeerInner {
    url: String,
    events: mpsc::UnboundedSender<TransportEvent>,
    sent: Mutex<Vec<String>>,
    closed_by_client: Mutex<Option<(u16, String)>>,
}

/// Server side of one loopback connection.
#[derive(Clone)]
pub struct LoopbackPeer {
    inner: Arc<PeerInner>,
}

impl LoopbackPeer {
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Complete the handshake.
    pub fn open(&self) {
        let _ = self.inner.events.send(TransportEvent::Opened);
    }

    /// Deliver a raw text frame to the client.
    pub fn push_text(&self, text: &str) {
        let _ = self.inner.events.send(TransportEvent::Message(text.to_string()));
    }

    pub fn push_json(&self, value: &serde_json::Value) {
        self.push_text(&value.to_string());
    }

    /// Close from the server side.
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.inner.events.send(TransportEvent::Closed {
            code,
            reason: reason.to_string(),
        });
    }

    /// Report a transport error followed by an abnormal close.
    pub fn fail(&self, message: &str) {
        let _ = self.inner.events.send(TransportEvent::Error(message.to_string()));
        self.close(ABNORMAL_CLOSURE_CODE, message);
    }

    /// Frames the client wrote, oldest first.
    pub fn sent(&self) -> Vec<String> {
        lock(&self.inner.sent).clone()
    }

    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent()
            .iter()
            .filter_map(|text| serde_json::from_str(text).ok())
            .collect()
    }

    /// Client frames whose `type` equals `message_type`.
    pub fn sent_of_type(&self, message_type: &str) -> Vec<serde_json::Value> {
        self.sent_json()
            .into_iter()
            .filter(|frame| frame["type"] == message_type)
            .collect()
    }

    /// Code and reason of a client-initiated close, if any.
    pub fn closed_by_client(&self) -> Option<(u16, String)> {
        lock(&self.inner.closed_by_client).clone()
    }
}

struct LoopbackSink {
    peer: Arc<PeerInner>,
}

impl SocketSink for LoopbackSink {
    fn send_text(&self, text: String) -> RlResult<()> {
        if lock(&self.peer.closed_by_client).is_some() {
            return Err(RlError::NotConnected);
        }
        lock(&self.peer.sent).push(text);
        Ok(())
    }

    fn close(&self, code: u16, reason: &str) {
        let mut closed = lock(&self.peer.closed_by_client);
        if closed.is_none() {
            *closed = Some((code, reason.to_string()));
            let _ = self.peer.events.send(TransportEvent::Closed {
                code,
                reason: reason.to_string(),
            });
        }
    }
}

/// In-process transport that records every connection it opens.
#[derive(Default)]
pub struct LoopbackTransport {
    peers: Mutex<Vec<LoopbackPeer>>,
    auto_open: bool,
    refuse: Mutex<Option<String>>,
}

impl LoopbackTransport {
    /// Connections stay pending until `LoopbackPeer::open` is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connections report `Opened` immediately.
    pub fn auto_open() -> Self {
        Self {
            auto_open: true,
            ..Self::default()
        }
    }

    /// Make subsequent `open` calls fail with `message` (or succeed again with `None`).
    pub fn refuse_opens(&self, message: Option<&str>) {
        *lock(&self.refuse) = message.map(str::to_string);
    }

    pub fn peers(&self) -> Vec<LoopbackPeer> {
        lock(&self.peers).clone()
    }

    pub fn open_count(&self) -> usize {
        lock(&self.peers).len()
    }

    pub fn last_peer(&self) -> Option<LoopbackPeer> {
        lock(&self.peers).last().cloned()
    }

    /// Connections the client has not closed.
    pub fn live_count(&self) -> usize {
        lock(&self.peers)
            .iter()
            .filter(|peer| peer.closed_by_client().is_none())
            .count()
    }
}

impl Transport for LoopbackTransport {
    fn open(&self, url: &str) -> RlResult<SocketConnection> {
        if let Some(message) = lock(&self.refuse).clone() {
            return Err(RlError::Socket(message));
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(PeerInner {
            url: url.to_string(),
            events: event_tx,
            sent: Mutex::new(Vec::new()),
            closed_by_client: Mutex::new(None),
        });
        let peer = LoopbackPeer {
            inner: inner.clone(),
        };
        if self.auto_open {
            peer.open();
        }
        lock(&self.peers).push(peer);

        Ok(SocketConnection {
            sink: Box::new(LoopbackSink { peer: inner }),
            events: event_rx,
        })
    }
}
