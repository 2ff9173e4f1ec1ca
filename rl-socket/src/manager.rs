//! Per-role socket connection manager.
//!
//! One `ConnectionManager` exists per role for the life of the process. It
//! keeps at most one live socket, announces the user's identity on every
//! open, runs the driver heartbeat, reconnects after abnormal closes up to
//! the role's attempt budget, and fans inbound frames out to listeners.
//!
//! All mutable state sits behind a single async mutex. Each socket gets a
//! generation number and a pump task; events carrying a stale generation are
//! ignored, so a torn-down socket can never touch the current state.

use std::sync::{Arc, Weak};
use std::time::Duration;

use rl_core::config::{AppConfig, RoleSocketConfig, ServerConfig};
use rl_core::constants::{EVENT_CHANNEL_CAPACITY, MANUAL_DISCONNECT_REASON, NORMAL_CLOSURE_CODE};
use rl_models::{OutboundFrame, UserRole};
use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::events::{ConnectionState, ConnectionStatus, EventDispatcher, MessageType, SocketEvent};
use crate::listeners::{ListenerId, ListenerRegistry, Subscription};
use crate::policy::{self, IdentityFilter, IdentityRejection, ReconnectPolicy};
use crate::transport::{SocketConnection, SocketSink, Transport, TransportEvent};

/// What a `connect` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The same user is already connected.
    AlreadyConnected,
    /// A socket for the same user is still opening.
    InProgress,
    /// Another user's socket was torn down; the new one opens after the switch guard.
    Switching,
    /// The id was refused.
    Rejected(IdentityRejection),
    /// Called again before the role's cooldown elapsed.
    CoolingDown,
    /// A new socket is opening.
    Opening,
    /// The transport refused to open; a reconnect may be scheduled.
    OpenFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Caller,
    Scheduled,
}

struct ActiveSocket {
    user_id: String,
    generation: u64,
    sink: Box<dyn SocketSink>,
    pump: JoinHandle<()>,
}

#[derive(Default)]
struct ManagerState {
    socket: Option<ActiveSocket>,
    is_connected: bool,
    connection_error: Option<String>,
    reconnect_attempts: u32,
    current_user_id: Option<String>,
    last_connect_attempt: Option<Instant>,
    generation: u64,
    heartbeat: Option<JoinHandle<()>>,
    pending_seq: u64,
    /// Scheduled switch or reconnect continuation.
    pending: Option<(u64, JoinHandle<()>)>,
}

struct ManagerInner {
    role: UserRole,
    url: String,
    policy: RoleSocketConfig,
    reconnect: Box<dyn ReconnectPolicy>,
    identity: IdentityFilter,
    transport: Arc<dyn Transport>,
    listeners: ListenerRegistry,
    dispatcher: EventDispatcher,
    state_tx: watch::Sender<ConnectionState>,
    state: Mutex<ManagerState>,
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(handle) = state.heartbeat.take() {
            handle.abort();
        }
        if let Some((_, handle)) = state.pending.take() {
            handle.abort();
        }
        if let Some(socket) = state.socket.take() {
            socket.sink.close(NORMAL_CLOSURE_CODE, MANUAL_DISCONNECT_REASON);
            socket.pump.abort();
        }
    }
}

/// Builder for `ConnectionManager`.
pub struct ManagerBuilder {
    role: UserRole,
    transport: Arc<dyn Transport>,
    url: String,
    policy: RoleSocketConfig,
    identity: IdentityFilter,
    reconnect: Option<Box<dyn ReconnectPolicy>>,
}

impl ManagerBuilder {
    /// Socket endpoint, shared by both roles.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn policy(mut self, policy: RoleSocketConfig) -> Self {
        self.policy = policy;
        self
    }

    pub fn identity(mut self, identity: IdentityFilter) -> Self {
        self.identity = identity;
        self
    }

    /// Override the delay policy derived from the role configuration.
    pub fn reconnect_policy(mut self, reconnect: Box<dyn ReconnectPolicy>) -> Self {
        self.reconnect = Some(reconnect);
        self
    }

    pub fn build(self) -> ConnectionManager {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let reconnect = self
            .reconnect
            .unwrap_or_else(|| policy::policy_for(&self.policy));

        ConnectionManager {
            inner: Arc::new(ManagerInner {
                role: self.role,
                url: self.url,
                policy: self.policy,
                reconnect,
                identity: self.identity,
                transport: self.transport,
                listeners: ListenerRegistry::new(),
                dispatcher: EventDispatcher::new(EVENT_CHANNEL_CAPACITY),
                state_tx,
                state: Mutex::new(ManagerState::default()),
            }),
        }
    }
}

/// Handle to a role's connection manager. Clones share the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

impl ConnectionManager {
    /// Start building a manager with the role's default policy.
    pub fn builder(role: UserRole, transport: Arc<dyn Transport>) -> ManagerBuilder {
        let policy = match role {
            UserRole::Driver => RoleSocketConfig::driver_defaults(),
            UserRole::Passenger => RoleSocketConfig::passenger_defaults(),
        };
        ManagerBuilder {
            role,
            transport,
            url: ServerConfig::default().socket_url,
            policy,
            identity: IdentityFilter::default(),
            reconnect: None,
        }
    }

    /// Build a manager from the application configuration.
    pub fn from_config(
        role: UserRole,
        config: &AppConfig,
        transport: Arc<dyn Transport>,
    ) -> ConnectionManager {
        let policy = match role {
            UserRole::Driver => config.socket.driver_policy(),
            UserRole::Passenger => config.socket.passenger_policy(),
        };
        Self::builder(role, transport)
            .url(config.server.socket_url.clone())
            .policy(policy)
            .identity(IdentityFilter::for_role(role, &config.socket.identity))
            .build()
    }

    pub fn role(&self) -> UserRole {
        self.inner.role
    }

    pub fn policy(&self) -> &RoleSocketConfig {
        &self.inner.policy
    }

    /// Subscribe to connection state changes.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Broadcast channel of every parsed inbound frame.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.inner.dispatcher
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.inner.listeners
    }

    fn set_state(&self, new_state: ConnectionState) {
        let role = self.inner.role;
        self.inner.state_tx.send_if_modified(|state| {
            if *state == new_state {
                return false;
            }
            info!("[{}] socket state: {} -> {}", role, *state, new_state);
            *state = new_state;
            true
        });
    }

    // ------------------------------------------------------------------------
    // Connect / disconnect
    // ------------------------------------------------------------------------

    /// Connect as `user_id`.
    ///
    /// Never fails: refused ids, cooldown hits and duplicate calls are
    /// reported through the outcome and logged.
    pub async fn connect(&self, user_id: &str) -> ConnectOutcome {
        let mut state = self.inner.state.lock().await;

        let existing = state.socket.as_ref().map(|socket| socket.user_id.clone());
        if let Some(existing) = existing {
            if existing == user_id {
                if state.is_connected {
                    debug!("[{}] {} already connected, skipping", self.inner.role, user_id);
                    return ConnectOutcome::AlreadyConnected;
                }
            } else {
                info!(
                    "[{}] switching identity {} -> {}",
                    self.inner.role, existing, user_id
                );
                self.teardown_locked(&mut state);
                self.set_state(ConnectionState::Disconnected);
                let guard = self.inner.policy.switch_guard();
                self.schedule_locked(&mut state, guard, user_id.to_string());
                return ConnectOutcome::Switching;
            }
        }

        self.connect_locked(&mut state, user_id, Trigger::Caller)
    }

    fn connect_locked(
        &self,
        state: &mut ManagerState,
        user_id: &str,
        trigger: Trigger,
    ) -> ConnectOutcome {
        let role = self.inner.role;

        if let Err(reason) = self.inner.identity.check(user_id) {
            warn!("[{}] refusing to connect {:?}: {}", role, user_id, reason);
            return ConnectOutcome::Rejected(reason);
        }

        let now = Instant::now();
        if trigger == Trigger::Caller {
            if let Some(last) = state.last_connect_attempt {
                if now.duration_since(last) < self.inner.policy.connect_cooldown() {
                    debug!("[{}] connect for {} inside cooldown, dropped", role, user_id);
                    return ConnectOutcome::CoolingDown;
                }
            }
        }
        state.last_connect_attempt = Some(now);

        if state
            .socket
            .as_ref()
            .is_some_and(|socket| socket.user_id == user_id)
        {
            debug!("[{}] socket for {} already open or opening", role, user_id);
            return ConnectOutcome::InProgress;
        }

        self.teardown_locked(state);
        if trigger == Trigger::Caller {
            state.reconnect_attempts = 0;
        }
        state.current_user_id = Some(user_id.to_string());

        let connection = match self.inner.transport.open(&self.inner.url) {
            Ok(connection) => connection,
            Err(e) => {
                warn!("[{}] failed to open socket: {}", role, e);
                state.connection_error = Some(e.to_string());
                state.is_connected = false;
                self.schedule_reconnect_locked(state);
                return ConnectOutcome::OpenFailed;
            }
        };

        state.generation += 1;
        let generation = state.generation;
        let SocketConnection { sink, events } = connection;
        let pump = tokio::spawn(pump_events(
            Arc::downgrade(&self.inner),
            generation,
            events,
        ));
        state.socket = Some(ActiveSocket {
            user_id: user_id.to_string(),
            generation,
            sink,
            pump,
        });
        state.is_connected = false;

        info!("[{}] opening socket for {} ({})", role, user_id, self.inner.url);
        self.set_state(match trigger {
            Trigger::Caller => ConnectionState::Connecting,
            Trigger::Scheduled => ConnectionState::Reconnecting,
        });
        ConnectOutcome::Opening
    }

    /// Close the socket with a normal closure and stop all background work.
    pub async fn disconnect(&self) {
        let mut state = self.inner.state.lock().await;
        self.teardown_locked(&mut state);
        self.set_state(ConnectionState::Disconnected);
        info!("[{}] disconnected", self.inner.role);
    }

    fn teardown_locked(&self, state: &mut ManagerState) {
        if let Some(handle) = state.heartbeat.take() {
            handle.abort();
        }
        if let Some((_, handle)) = state.pending.take() {
            handle.abort();
        }
        if let Some(socket) = state.socket.take() {
            debug!(
                "[{}] closing socket generation {} for {}",
                self.inner.role, socket.generation, socket.user_id
            );
            socket.sink.close(NORMAL_CLOSURE_CODE, MANUAL_DISCONNECT_REASON);
            socket.pump.abort();
        }
        state.is_connected = false;
        state.current_user_id = None;
    }

    fn schedule_locked(&self, state: &mut ManagerState, delay: Duration, user_id: String) {
        if let Some((_, handle)) = state.pending.take() {
            handle.abort();
        }
        state.pending_seq += 1;
        let seq = state.pending_seq;
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                ConnectionManager { inner }.run_scheduled(seq, &user_id).await;
            }
        });
        state.pending = Some((seq, handle));
    }

    async fn run_scheduled(&self, seq: u64, user_id: &str) {
        let mut state = self.inner.state.lock().await;
        match state.pending.as_ref() {
            Some((pending_seq, _)) if *pending_seq == seq => {
                // our own handle; detach rather than abort
                state.pending = None;
            }
            _ => return,
        }
        self.connect_locked(&mut state, user_id, Trigger::Scheduled);
    }

    fn schedule_reconnect_locked(&self, state: &mut ManagerState) {
        let role = self.inner.role;
        let max = self.inner.policy.max_reconnect_attempts;
        if state.reconnect_attempts >= max {
            warn!("[{}] giving up after {} reconnect attempts", role, state.reconnect_attempts);
            self.set_state(ConnectionState::Failed);
            return;
        }
        let Some(user_id) = state.current_user_id.clone() else {
            self.set_state(ConnectionState::Disconnected);
            return;
        };

        state.reconnect_attempts += 1;
        let delay = self.inner.reconnect.delay(state.reconnect_attempts);
        info!(
            "[{}] reconnect attempt {}/{} in {:?}",
            role, state.reconnect_attempts, max, delay
        );
        self.set_state(ConnectionState::Reconnecting);
        self.schedule_locked(state, delay, user_id);
    }

    // ------------------------------------------------------------------------
    // Socket events
    // ------------------------------------------------------------------------

    async fn handle_open(&self, generation: u64) {
        let mut state = self.inner.state.lock().await;
        let Some(socket) = state.socket.as_ref().filter(|s| s.generation == generation) else {
            return;
        };

        let frame = OutboundFrame::connect(self.inner.role, &socket.user_id);
        match serde_json::to_string(&frame) {
            Ok(text) => {
                if let Err(e) = socket.sink.send_text(text) {
                    warn!("[{}] failed to announce identity: {}", self.inner.role, e);
                }
            }
            Err(e) => warn!("[{}] failed to encode connect frame: {}", self.inner.role, e),
        }
        info!("[{}] socket open for {}", self.inner.role, socket.user_id);

        state.is_connected = true;
        state.connection_error = None;
        state.reconnect_attempts = 0;

        if let Some(period) = self.inner.policy.heartbeat_interval() {
            self.start_heartbeat_locked(&mut state, generation, period);
        }
        self.set_state(ConnectionState::Connected);
    }

    fn start_heartbeat_locked(&self, state: &mut ManagerState, generation: u64, period: Duration) {
        if let Some(handle) = state.heartbeat.take() {
            handle.abort();
        }
        let weak = Arc::downgrade(&self.inner);
        state.heartbeat = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                if !(ConnectionManager { inner }).send_heartbeat(generation).await {
                    break;
                }
            }
        }));
    }

    async fn send_heartbeat(&self, generation: u64) -> bool {
        let state = self.inner.state.lock().await;
        let Some(socket) = state
            .socket
            .as_ref()
            .filter(|s| s.generation == generation && state.is_connected)
        else {
            return false;
        };

        match serde_json::to_string(&OutboundFrame::heartbeat(&socket.user_id)) {
            Ok(text) => {
                if let Err(e) = socket.sink.send_text(text) {
                    warn!("[{}] heartbeat failed: {}", self.inner.role, e);
                } else {
                    debug!("[{}] heartbeat sent", self.inner.role);
                }
            }
            Err(e) => warn!("[{}] failed to encode heartbeat: {}", self.inner.role, e),
        }
        true
    }

    async fn handle_frame(&self, generation: u64, text: String) {
        {
            let state = self.inner.state.lock().await;
            if state.socket.as_ref().map(|s| s.generation) != Some(generation) {
                return;
            }
        }

        let data: serde_json::Value = match serde_json::from_str(&text) {
            Ok(value @ serde_json::Value::Object(_)) => value,
            Ok(_) => {
                warn!("[{}] dropping non-object frame", self.inner.role);
                return;
            }
            Err(e) => {
                warn!("[{}] dropping malformed frame: {}", self.inner.role, e);
                return;
            }
        };

        let message_type = data
            .get("type")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        let ran = self
            .inner
            .listeners
            .dispatch(message_type.as_deref(), &data);
        debug!(
            "[{}] frame {} delivered to {} listener(s)",
            self.inner.role,
            message_type.as_deref().unwrap_or("<untyped>"),
            ran
        );

        self.inner.dispatcher.dispatch(SocketEvent {
            message_type: MessageType::from_str(message_type.as_deref().unwrap_or("")),
            data,
        });
    }

    async fn handle_close(&self, generation: u64, code: u16, reason: String) {
        let mut state = self.inner.state.lock().await;
        if state.socket.as_ref().map(|s| s.generation) != Some(generation) {
            return;
        }
        // the pump is the caller; drop its handle without aborting it
        state.socket = None;
        state.is_connected = false;
        if let Some(handle) = state.heartbeat.take() {
            handle.abort();
        }

        if code == NORMAL_CLOSURE_CODE {
            info!("[{}] socket closed normally: {}", self.inner.role, reason);
            self.set_state(ConnectionState::Disconnected);
            return;
        }
        warn!("[{}] socket closed: {} {}", self.inner.role, code, reason);
        self.schedule_reconnect_locked(&mut state);
    }

    async fn handle_error(&self, generation: u64, message: String) {
        let mut state = self.inner.state.lock().await;
        if state.socket.as_ref().map(|s| s.generation) != Some(generation) {
            return;
        }
        warn!("[{}] socket error: {}", self.inner.role, message);
        state.connection_error = Some(message);
        state.is_connected = false;
    }

    // ------------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------------

    /// Serialize and transmit `message`. Returns `false` when not connected
    /// or when the write fails.
    pub async fn send<T: Serialize + ?Sized>(&self, message: &T) -> bool {
        let state = self.inner.state.lock().await;
        let Some(socket) = state.socket.as_ref().filter(|_| state.is_connected) else {
            debug!("[{}] send while disconnected dropped", self.inner.role);
            return false;
        };

        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                warn!("[{}] failed to encode outbound frame: {}", self.inner.role, e);
                return false;
            }
        };
        match socket.sink.send_text(text) {
            Ok(()) => true,
            Err(e) => {
                warn!("[{}] send failed: {}", self.inner.role, e);
                false
            }
        }
    }

    // ------------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------------

    /// Register a callback for frames of `message_type` (`"*"` for all).
    pub fn add_listener<F>(&self, message_type: &str, callback: F) -> Subscription
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        self.inner.listeners.add(message_type, callback)
    }

    pub fn remove_listener(&self, message_type: &str, id: ListenerId) -> bool {
        self.inner.listeners.remove(message_type, id)
    }

    pub fn listener_count(&self, message_type: &str) -> usize {
        self.inner.listeners.count(message_type)
    }

    // ------------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------------

    pub async fn status(&self) -> ConnectionStatus {
        let state = self.inner.state.lock().await;
        ConnectionStatus {
            is_connected: state.is_connected,
            current_user_id: state.current_user_id.clone(),
            connection_error: state.connection_error.clone(),
            reconnect_attempts: state.reconnect_attempts,
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.state.lock().await.is_connected
    }

    pub async fn current_user_id(&self) -> Option<String> {
        self.inner.state.lock().await.current_user_id.clone()
    }
}

async fn pump_events(
    manager: Weak<ManagerInner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = manager.upgrade() else { break };
        let manager = ConnectionManager { inner };
        match event {
            TransportEvent::Opened => manager.handle_open(generation).await,
            TransportEvent::Message(text) => manager.handle_frame(generation, text).await,
            TransportEvent::Error(message) => manager.handle_error(generation, message).await,
            TransportEvent::Closed { code, reason } => {
                manager.handle_close(generation, code, reason).await;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LoopbackTransport;

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_scenario() {
        let transport = Arc::new(LoopbackTransport::new());
        let manager = ConnectionManager::builder(UserRole::Driver, transport.clone()).build();

        assert_eq!(manager.connect("driver-1").await, ConnectOutcome::Opening);
        transport.last_peer().unwrap().open();
        settle().await;

        let status = manager.status().await;
        assert!(status.is_connected);
        assert_eq!(status.current_user_id.as_deref(), Some("driver-1"));
        assert_eq!(status.connection_error, None);
        assert_eq!(status.reconnect_attempts, 0);
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_requires_connection() {
        let transport = Arc::new(LoopbackTransport::new());
        let manager = ConnectionManager::builder(UserRole::Passenger, transport.clone()).build();
        assert!(!manager.send(&serde_json::json!({"type": "ping"})).await);

        manager.connect("p-1").await;
        // still opening
        assert!(!manager.send(&serde_json::json!({"type": "ping"})).await);

        transport.last_peer().unwrap().open();
        settle().await;
        assert!(manager.send(&serde_json::json!({"type": "ping"})).await);
        assert_eq!(transport.last_peer().unwrap().sent_of_type("ping").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_ignored() {
        let transport = Arc::new(LoopbackTransport::new());
        let manager = ConnectionManager::builder(UserRole::Passenger, transport.clone()).build();

        manager.connect("p-1").await;
        let first = transport.last_peer().unwrap();
        manager.disconnect().await;

        // late events from the torn-down socket change nothing
        first.open();
        first.close(4000, "late");
        settle().await;

        let status = manager.status().await;
        assert!(!status.is_connected);
        assert_eq!(status.current_user_id, None);
        assert_eq!(transport.open_count(), 1);
    }
}
