use crate::core::config::ClientConfig;
use crate::core::connection_state::{AtomicConnectionState, ConnectionState};
use crate::traits::{
    classify_closure, classify_connect_failure, classify_invoke_failure, ChannelEvent, EventSink,
    HubChannel, HubConnector, HubError, Result, SessionObserver, SubscriberRegistry, Subscription,
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// Notification names for lifecycle subscribers.
pub mod notifications {
    pub const CONNECTED: &str = "connected";
    pub const RECONNECTING: &str = "reconnecting";
    pub const RECONNECTED: &str = "reconnected";
    pub const DISCONNECTED: &str = "disconnected";
    pub const ERROR: &str = "error";
}

/// Lifecycle notifications, fired to subscribers and queued for
/// non-blocking consumption by the presentation layer.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// Initial connection established
    Connected { connection_id: String },
    /// Reconnection attempt starting (0-indexed)
    Reconnecting { attempt: usize },
    /// Recovery succeeded under a fresh identity
    Reconnected { connection_id: String },
    /// Session over; `error` is absent for caller-initiated disconnects
    Disconnected { error: Option<HubError> },
    /// A failure with no awaiting caller, surfaced for display
    Error { error: HubError },
}

impl LifecycleEvent {
    fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Connected { .. } => notifications::CONNECTED,
            LifecycleEvent::Reconnecting { .. } => notifications::RECONNECTING,
            LifecycleEvent::Reconnected { .. } => notifications::RECONNECTED,
            LifecycleEvent::Disconnected { .. } => notifications::DISCONNECTED,
            LifecycleEvent::Error { .. } => notifications::ERROR,
        }
    }
}

/// Owner of the connection-state machine and the channel lifecycle.
///
/// One logical connection at a time: `connect` opens a channel through the
/// injected connector and spawns a session supervisor that pumps inbound
/// events into the attached sinks and drives the reconnect loop when the
/// channel dies. All state transitions are observable; none is skipped.
pub struct ConnectionManager {
    connector: Arc<dyn HubConnector>,
    config: ClientConfig,
    state: AtomicConnectionState,
    url: RwLock<Option<String>>,
    identity: RwLock<Option<String>>,
    last_error: RwLock<Option<HubError>>,
    channel: RwLock<Option<Arc<dyn HubChannel>>>,
    listeners: SubscriberRegistry<LifecycleEvent>,
    event_tx: Sender<LifecycleEvent>,
    event_rx: Receiver<LifecycleEvent>,
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
    observers: RwLock<Vec<Arc<dyn SessionObserver>>>,
    /// Bumped on every connect and disconnect; a supervisor holding a
    /// stale generation must exit without touching state.
    session: AtomicU64,
    cancel: Notify,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn HubConnector>, config: ClientConfig) -> Self {
        let (event_tx, event_rx) = unbounded();
        Self {
            connector,
            config,
            state: AtomicConnectionState::new(ConnectionState::Disconnected),
            url: RwLock::new(None),
            identity: RwLock::new(None),
            last_error: RwLock::new(None),
            channel: RwLock::new(None),
            listeners: SubscriberRegistry::new(),
            event_tx,
            event_rx,
            sinks: RwLock::new(Vec::new()),
            observers: RwLock::new(Vec::new()),
            session: AtomicU64::new(0),
            cancel: Notify::new(),
        }
    }

    /// Attach an inbound-event consumer. Sinks fire in attachment order.
    pub(crate) fn attach_sink(&self, sink: Arc<dyn EventSink>) {
        self.sinks.write().push(sink);
    }

    /// Attach a session observer, awaited after every successful connect
    /// or reconnect before event pumping resumes.
    pub(crate) fn attach_observer(&self, observer: Arc<dyn SessionObserver>) {
        self.observers.write().push(observer);
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Current connection identity; absent while disconnected.
    pub fn connection_id(&self) -> Option<String> {
        self.identity.read().clone()
    }

    pub fn last_error(&self) -> Option<HubError> {
        self.last_error.read().clone()
    }

    /// Subscribe to a lifecycle notification (see [`notifications`]).
    pub fn on_lifecycle(
        &self,
        name: &str,
        callback: impl Fn(&LifecycleEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.listeners.subscribe(name, callback)
    }

    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.listeners.unsubscribe(subscription)
    }

    /// Drain one queued lifecycle event (non-blocking).
    pub fn try_recv_event(&self) -> Option<LifecycleEvent> {
        self.event_rx.try_recv().ok()
    }

    fn notify(&self, event: LifecycleEvent) {
        debug!(event = ?event, "lifecycle notification");
        self.listeners.emit(event.name(), &event);
        let _ = self.event_tx.send(event);
    }

    /// Surface a failure that has no awaiting caller.
    pub(crate) fn emit_error(&self, error: HubError) {
        self.notify(LifecycleEvent::Error { error });
    }

    fn stale(&self, generation: u64) -> bool {
        self.session.load(Ordering::SeqCst) != generation
    }

    /// Open a connection to `url`.
    ///
    /// Rejects `InvalidUrl` before touching the channel and `AlreadyActive`
    /// unless the state is Disconnected (or terminally Failed). On success
    /// the state is Connected, an identity is assigned, one `connected`
    /// notification fires, and a session supervisor keeps the connection
    /// alive until `disconnect` or policy exhaustion.
    pub async fn connect(self: &Arc<Self>, url: &str) -> Result<()> {
        validate_url(url)?;

        let accepted = self
            .state
            .compare_exchange(ConnectionState::Disconnected, ConnectionState::Connecting)
            || self
                .state
                .compare_exchange(ConnectionState::Failed, ConnectionState::Connecting);
        if !accepted {
            debug!(state = %self.state.get(), "connect rejected, connection already active");
            return Err(HubError::AlreadyActive);
        }

        *self.url.write() = Some(url.to_string());
        *self.last_error.write() = None;
        let generation = self.session.fetch_add(1, Ordering::SeqCst) + 1;

        info!(url, "connecting to hub");
        match self.connector.open(url).await {
            Ok(boxed) => {
                let channel: Arc<dyn HubChannel> = Arc::from(boxed);
                if self.stale(generation) {
                    // a disconnect raced the open and already owns the state
                    channel.close().await;
                    return Err(HubError::TransportClosed(
                        "closed by local disconnect".to_string(),
                    ));
                }
                let connection_id = channel.connection_id();
                *self.channel.write() = Some(Arc::clone(&channel));
                *self.identity.write() = Some(connection_id.clone());
                self.state.set(ConnectionState::Connected);
                info!(connection_id = %connection_id, "connected to hub");
                self.notify(LifecycleEvent::Connected {
                    connection_id: connection_id.clone(),
                });
                self.establish_session(&connection_id).await;

                let manager = Arc::clone(self);
                tokio::spawn(async move {
                    run_session(manager, generation).await;
                });
                Ok(())
            }
            Err(raw) => {
                let classified = classify_connect_failure(&raw);
                if !self.stale(generation) {
                    self.state.set(ConnectionState::Disconnected);
                }
                *self.last_error.write() = Some(classified.clone());
                warn!(error = %classified, "connection attempt failed");
                Err(classified)
            }
        }
    }

    /// Tear the connection down.
    ///
    /// Legal from any state and idempotent: cancels a pending reconnect
    /// timer, aborts an in-flight attempt, closes the channel, clears the
    /// identity. The state always lands in Disconnected.
    pub async fn disconnect(&self) {
        self.session.fetch_add(1, Ordering::SeqCst);
        self.cancel.notify_waiters();

        let was_disconnected = self.state.get().is_disconnected();
        self.state.set(ConnectionState::Disconnected);
        *self.identity.write() = None;
        let channel = self.channel.write().take();
        if let Some(channel) = channel {
            channel.close().await;
        }

        if !was_disconnected {
            info!("disconnected from hub");
            self.notify(LifecycleEvent::Disconnected { error: None });
        }
    }

    /// Fire a named method at the hub. Legal only while Connected.
    pub async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<()> {
        if self.state.get() != ConnectionState::Connected {
            return Err(HubError::NotConnected);
        }
        let channel = self
            .channel
            .read()
            .as_ref()
            .map(Arc::clone)
            .ok_or(HubError::NotConnected)?;
        debug!(method, "invoking hub method");
        channel.invoke(method, args).await.map_err(|raw| {
            let classified = classify_invoke_failure(&raw);
            warn!(method, error = %classified, "invoke failed");
            classified
        })
    }

    /// Await the attached session observers for a freshly established
    /// channel (initial connect and every reconnect).
    async fn establish_session(&self, connection_id: &str) {
        let observers = self.observers.read().clone();
        for observer in observers {
            observer.on_session_established(connection_id).await;
        }
    }
}

fn validate_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(HubError::InvalidUrl("url is empty".to_string()));
    }
    url::Url::parse(url)
        .map(|_| ())
        .map_err(|parse_error| HubError::InvalidUrl(format!("{url}: {parse_error}")))
}

/// Session supervisor: pumps events off the live channel and drives the
/// reconnect loop when the channel dies. One per established session;
/// exits when its generation goes stale (caller disconnect) or the policy
/// is exhausted.
async fn run_session(manager: Arc<ConnectionManager>, generation: u64) {
    debug!(generation, "session supervisor started");
    'session: loop {
        let channel = match manager.channel.read().as_ref().map(Arc::clone) {
            Some(channel) => channel,
            None => break,
        };

        let reason = pump_events(&manager, &channel, generation).await;
        if manager.stale(generation) {
            break;
        }

        // unexpected closure while Connected
        let closure = classify_closure(reason.as_deref());
        warn!(error = %closure, "hub connection lost");
        *manager.last_error.write() = Some(closure.clone());
        *manager.channel.write() = None;
        *manager.identity.write() = None;

        if !manager.config.auto_reconnect {
            manager.state.set(ConnectionState::Disconnected);
            manager.notify(LifecycleEvent::Disconnected {
                error: Some(closure),
            });
            break;
        }

        manager.state.set(ConnectionState::Reconnecting);
        let url = match manager.url.read().clone() {
            Some(url) => url,
            None => break,
        };

        // strictly sequential attempts: the next one starts only after the
        // previous one resolved
        let mut attempt = 0usize;
        loop {
            let Some(delay) = manager.config.reconnect_policy.next_delay(attempt) else {
                let final_error = manager
                    .last_error
                    .read()
                    .clone()
                    .unwrap_or_else(|| closure.clone());
                error!(attempts = attempt, error = %final_error, "reconnection policy exhausted");
                manager.state.set(ConnectionState::Failed);
                manager.notify(LifecycleEvent::Disconnected {
                    error: Some(final_error),
                });
                break 'session;
            };

            manager.notify(LifecycleEvent::Reconnecting { attempt });
            info!(attempt, delay = ?delay, "reconnecting to hub");
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = manager.cancel.notified() => {}
                }
            }
            if manager.stale(generation) {
                break 'session;
            }

            let opened = tokio::select! {
                result = manager.connector.open(&url) => Some(result),
                _ = manager.cancel.notified() => None,
            };
            if manager.stale(generation) {
                if let Some(Ok(fresh)) = opened {
                    fresh.close().await;
                }
                break 'session;
            }

            match opened {
                Some(Ok(boxed)) => {
                    let fresh: Arc<dyn HubChannel> = Arc::from(boxed);
                    let connection_id = fresh.connection_id();
                    *manager.channel.write() = Some(Arc::clone(&fresh));
                    *manager.identity.write() = Some(connection_id.clone());
                    *manager.last_error.write() = None;
                    manager.state.set(ConnectionState::Connected);
                    info!(connection_id = %connection_id, "reconnected to hub");
                    manager.notify(LifecycleEvent::Reconnected {
                        connection_id: connection_id.clone(),
                    });
                    manager.establish_session(&connection_id).await;
                    continue 'session;
                }
                Some(Err(raw)) => {
                    let classified = classify_connect_failure(&raw);
                    warn!(attempt, error = %classified, "reconnect attempt failed");
                    *manager.last_error.write() = Some(classified);
                    attempt += 1;
                }
                None => break 'session,
            }
        }
    }
    debug!(generation, "session supervisor exiting");
}

/// Forward named events to the sinks until the channel closes. Returns
/// the closure reason, or `None` when cancelled or closed without one.
async fn pump_events(
    manager: &Arc<ConnectionManager>,
    channel: &Arc<dyn HubChannel>,
    generation: u64,
) -> Option<String> {
    loop {
        let delivery = tokio::select! {
            delivery = channel.next_event() => delivery,
            _ = manager.cancel.notified() => return None,
        };
        if manager.stale(generation) {
            return None;
        }
        match delivery {
            ChannelEvent::Event { name, args } => {
                debug!(event = %name, "hub event received");
                let sinks = manager.sinks.read().clone();
                for sink in sinks {
                    sink.handle_event(&name, &args);
                }
            }
            ChannelEvent::Closed { reason } => return reason,
        }
    }
}
