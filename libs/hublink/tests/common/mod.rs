//! Shared test utilities: an in-memory fake hub.
//!
//! The fake hub stands in for the remote peer: it assigns a fresh
//! connection identity per open, binds group membership to that identity
//! (and forgets it the moment the connection drops), fans group messages
//! out to members, and records every invocation. Failure injection knobs
//! cover refused connects, dropped connections, deferred membership acks,
//! and swallowed sends.

#![allow(dead_code)]

use async_trait::async_trait;
use hublink::traits::{events, methods, ChannelError, ChannelEvent, HubChannel, HubConnector};
use hublink::HubClient;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Install an env-filtered subscriber for test logging (RUST_LOG).
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
struct HubState {
    /// Live connections, by identity
    connections: HashMap<String, UnboundedSender<ChannelEvent>>,
    /// Group membership per connection identity
    memberships: HashMap<String, Vec<String>>,
    /// Every successful invocation: (connection id, method, args)
    invocations: Vec<(String, String, Vec<Value>)>,
    /// Total open attempts, including refused ones
    connect_attempts: usize,
}

pub struct FakeHub {
    state: Mutex<HubState>,
    next_id: AtomicUsize,
    refuse_connects: AtomicBool,
    fail_next_connects: AtomicUsize,
    auto_ack_joins: AtomicBool,
    swallow_sends: AtomicBool,
    fail_invokes: AtomicBool,
}

impl FakeHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(HubState::default()),
            next_id: AtomicUsize::new(0),
            refuse_connects: AtomicBool::new(false),
            fail_next_connects: AtomicUsize::new(0),
            auto_ack_joins: AtomicBool::new(true),
            swallow_sends: AtomicBool::new(false),
            fail_invokes: AtomicBool::new(false),
        })
    }

    pub fn connector(self: &Arc<Self>) -> FakeConnector {
        FakeConnector {
            hub: Arc::clone(self),
        }
    }

    /// Refuse every open until turned off again.
    pub fn refuse_connects(&self, refuse: bool) {
        self.refuse_connects.store(refuse, Ordering::SeqCst);
    }

    /// Refuse the next `count` opens, then accept again.
    pub fn fail_next_connects(&self, count: usize) {
        self.fail_next_connects.store(count, Ordering::SeqCst);
    }

    /// When disabled, `JoinGroup` invokes succeed but the `JoinedGroup`
    /// ack is withheld until [`FakeHub::ack_join`].
    pub fn auto_ack_joins(&self, enabled: bool) {
        self.auto_ack_joins.store(enabled, Ordering::SeqCst);
    }

    /// When enabled, group sends succeed but no fan-out is delivered.
    pub fn swallow_group_sends(&self, enabled: bool) {
        self.swallow_sends.store(enabled, Ordering::SeqCst);
    }

    /// When enabled, every invoke fails at the transport layer.
    pub fn fail_invokes(&self, enabled: bool) {
        self.fail_invokes.store(enabled, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> usize {
        self.state.lock().connect_attempts
    }

    pub fn invocations(&self) -> Vec<(String, String, Vec<Value>)> {
        self.state.lock().invocations.clone()
    }

    /// Count of recorded invocations of one method.
    pub fn invocation_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .invocations
            .iter()
            .filter(|(_, invoked, _)| invoked == method)
            .count()
    }

    /// Connection identities currently joined to `group`.
    pub fn members_of(&self, group: &str) -> Vec<String> {
        let state = self.state.lock();
        let mut members: Vec<String> = state
            .memberships
            .iter()
            .filter(|(_, groups)| groups.iter().any(|name| name == group))
            .map(|(id, _)| id.clone())
            .collect();
        members.sort();
        members
    }

    pub fn live_connections(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.lock().connections.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Sever a connection server-side. Membership for that identity is
    /// silently forgotten, exactly like the real hub.
    pub fn drop_connection(&self, id: &str) {
        let mut state = self.state.lock();
        state.connections.remove(id);
        state.memberships.remove(id);
    }

    pub fn drop_all_connections(&self) {
        let mut state = self.state.lock();
        state.connections.clear();
        state.memberships.clear();
    }

    /// Push a named event to one connection.
    pub fn push_event(&self, id: &str, name: &str, args: Vec<Value>) {
        let state = self.state.lock();
        if let Some(sender) = state.connections.get(id) {
            let _ = sender.send(ChannelEvent::Event {
                name: name.to_string(),
                args,
            });
        }
    }

    /// Manually deliver a withheld join ack (see `auto_ack_joins`).
    pub fn ack_join(&self, id: &str, group: &str) {
        {
            let mut state = self.state.lock();
            let groups = state.memberships.entry(id.to_string()).or_default();
            if !groups.iter().any(|name| name == group) {
                groups.push(group.to_string());
            }
        }
        self.push_event(id, events::JOINED_GROUP, vec![json!(group)]);
    }

    fn handle_invoke(
        &self,
        id: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<(), ChannelError> {
        let mut state = self.state.lock();
        if !state.connections.contains_key(id) {
            return Err(ChannelError::new("connection closed"));
        }
        if self.fail_invokes.load(Ordering::SeqCst) {
            return Err(ChannelError::new("invoke rejected by test"));
        }
        state
            .invocations
            .push((id.to_string(), method.to_string(), args.clone()));

        match method {
            methods::JOIN_GROUP => {
                let group = args
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| ChannelError::new("JoinGroup: missing group name"))?
                    .to_string();
                if self.auto_ack_joins.load(Ordering::SeqCst) {
                    let groups = state.memberships.entry(id.to_string()).or_default();
                    if !groups.iter().any(|name| name == &group) {
                        groups.push(group.clone());
                    }
                    if let Some(sender) = state.connections.get(id) {
                        let _ = sender.send(ChannelEvent::Event {
                            name: events::JOINED_GROUP.to_string(),
                            args: vec![json!(group)],
                        });
                    }
                }
                Ok(())
            }
            methods::LEAVE_GROUP => {
                let group = args
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| ChannelError::new("LeaveGroup: missing group name"))?
                    .to_string();
                if let Some(groups) = state.memberships.get_mut(id) {
                    groups.retain(|name| name != &group);
                }
                if let Some(sender) = state.connections.get(id) {
                    let _ = sender.send(ChannelEvent::Event {
                        name: events::LEFT_GROUP.to_string(),
                        args: vec![json!(group)],
                    });
                }
                Ok(())
            }
            methods::SEND_MESSAGE_TO_GROUP => {
                let group = args
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| ChannelError::new("SendMessageToGroup: missing group"))?
                    .to_string();
                let body = args
                    .get(1)
                    .and_then(Value::as_str)
                    .ok_or_else(|| ChannelError::new("SendMessageToGroup: missing message"))?
                    .to_string();
                let is_member = state
                    .memberships
                    .get(id)
                    .is_some_and(|groups| groups.iter().any(|name| name == &group));
                if !is_member {
                    return Err(ChannelError::new(format!(
                        "server error: {id} is not a member of {group}"
                    )));
                }
                if self.swallow_sends.load(Ordering::SeqCst) {
                    return Ok(());
                }
                for (member, groups) in &state.memberships {
                    if groups.iter().any(|name| name == &group) {
                        if let Some(sender) = state.connections.get(member) {
                            let _ = sender.send(ChannelEvent::Event {
                                name: events::RECEIVE_GROUP_MESSAGE.to_string(),
                                args: vec![json!(group), json!(id), json!(body)],
                            });
                        }
                    }
                }
                Ok(())
            }
            _ => Err(ChannelError::new(format!("unknown hub method {method}"))),
        }
    }

    fn forget_connection(&self, id: &str) {
        self.drop_connection(id);
    }
}

pub struct FakeConnector {
    hub: Arc<FakeHub>,
}

#[async_trait]
impl HubConnector for FakeConnector {
    async fn open(&self, _url: &str) -> Result<Box<dyn HubChannel>, ChannelError> {
        self.hub.state.lock().connect_attempts += 1;
        if self.hub.refuse_connects.load(Ordering::SeqCst) {
            return Err(ChannelError::new("negotiation refused by hub"));
        }
        let failed = self
            .hub
            .fail_next_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        if failed {
            return Err(ChannelError::new("negotiation refused by hub"));
        }

        let id = format!("conn-{}", self.hub.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let (sender, receiver) = unbounded_channel();
        self.hub.state.lock().connections.insert(id.clone(), sender);
        Ok(Box::new(FakeChannel {
            id,
            hub: Arc::clone(&self.hub),
            events: tokio::sync::Mutex::new(receiver),
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct FakeChannel {
    id: String,
    hub: Arc<FakeHub>,
    events: tokio::sync::Mutex<UnboundedReceiver<ChannelEvent>>,
    closed: AtomicBool,
}

#[async_trait]
impl HubChannel for FakeChannel {
    fn connection_id(&self) -> String {
        self.id.clone()
    }

    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<(), ChannelError> {
        self.hub.handle_invoke(&self.id, method, args)
    }

    async fn next_event(&self) -> ChannelEvent {
        let mut events = self.events.lock().await;
        match events.recv().await {
            Some(delivery) => delivery,
            // sender gone: the hub severed this connection
            None => ChannelEvent::Closed { reason: None },
        }
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.hub.forget_connection(&self.id);
        }
    }
}

/// Poll `predicate` until it holds or `deadline` elapses.
pub async fn wait_until(deadline: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}

/// Drain every queued lifecycle event.
pub fn drain_events(client: &HubClient) -> Vec<hublink::LifecycleEvent> {
    let mut drained = Vec::new();
    while let Some(event) = client.try_recv_event() {
        drained.push(event);
    }
    drained
}
