use crate::core::connection::ConnectionManager;
use crate::core::groups::GroupMembershipTracker;
use crate::traits::{
    events, methods, EventSink, HubError, Result, SubscriberRegistry, Subscription,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// What produced a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Direct or broadcast delivery (`ReceiveMessage`)
    Direct,
    /// Group fan-out delivery (`ReceiveGroupMessage`)
    Group,
    /// Membership change recorded from a hub ack
    System,
    /// Diagnostic echo reply
    Echo,
    /// Application-level failure reported by the hub
    Error,
}

/// One immutable entry in the message log.
#[derive(Debug, Clone)]
pub struct Message {
    pub kind: MessageKind,
    pub sender: String,
    pub body: String,
    /// Present iff `kind == Group`
    pub group: Option<String>,
    /// Monotonic capture instant; the wire protocol carries no timestamp
    pub timestamp: Instant,
}

impl Message {
    fn new(
        kind: MessageKind,
        sender: impl Into<String>,
        body: impl Into<String>,
        group: Option<String>,
    ) -> Self {
        Self {
            kind,
            sender: sender.into(),
            body: body.into(),
            group,
            timestamp: Instant::now(),
        }
    }
}

/// Owner of the append-only message log.
///
/// Inbound named events become log entries in exactly the order the
/// channel delivers them, then subscribers of that event name fire in
/// registration order. Outbound `send` performs no optimistic append; the
/// caller's message shows up when the hub echoes it back through group
/// fan-out.
pub struct MessageDispatcher {
    connection: Arc<ConnectionManager>,
    groups: Arc<GroupMembershipTracker>,
    log: Mutex<Vec<Message>>,
    subscribers: SubscriberRegistry<Message>,
}

impl MessageDispatcher {
    pub(crate) fn new(
        connection: Arc<ConnectionManager>,
        groups: Arc<GroupMembershipTracker>,
    ) -> Self {
        Self {
            connection,
            groups,
            log: Mutex::new(Vec::new()),
            subscribers: SubscriberRegistry::new(),
        }
    }

    /// Broadcast `body` to `group`.
    ///
    /// Blank bodies are rejected before any remote call, as are groups
    /// whose membership is not Confirmed for the current connection
    /// identity.
    pub async fn send(&self, group: &str, body: &str) -> Result<()> {
        if body.trim().is_empty() {
            return Err(HubError::EmptyMessage);
        }
        if !self.groups.is_confirmed(group) {
            return Err(HubError::GroupNotReady(group.to_string()));
        }
        self.connection
            .invoke(
                methods::SEND_MESSAGE_TO_GROUP,
                vec![json!(group), json!(body)],
            )
            .await
    }

    /// Subscribe to entries produced by one inbound event name.
    pub fn subscribe(
        &self,
        event: impl Into<String>,
        callback: impl Fn(&Message) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribers.subscribe(event, callback)
    }

    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.subscribers.unsubscribe(subscription)
    }

    /// Snapshot of the full log, in delivery order.
    pub fn log(&self) -> Vec<Message> {
        self.log.lock().clone()
    }

    pub fn log_len(&self) -> usize {
        self.log.lock().len()
    }

    /// Snapshot filtered to one group's fan-out messages.
    pub fn messages_for_group(&self, group: &str) -> Vec<Message> {
        self.log
            .lock()
            .iter()
            .filter(|message| message.group.as_deref() == Some(group))
            .cloned()
            .collect()
    }

    /// Explicitly drop all log entries. Nothing else ever clears the log.
    pub fn clear_log(&self) {
        self.log.lock().clear();
        debug!("message log cleared");
    }

    fn append(&self, event: &str, message: Message) {
        self.log.lock().push(message.clone());
        self.subscribers.emit(event, &message);
    }

    fn malformed(&self, name: &str, args: &[Value]) {
        warn!(event = name, args = ?args, "malformed hub event payload");
    }
}

impl EventSink for MessageDispatcher {
    fn handle_event(&self, name: &str, args: &[Value]) {
        let arg = |index: usize| args.get(index).and_then(Value::as_str);
        let message = match name {
            events::RECEIVE_MESSAGE => match (arg(0), arg(1)) {
                (Some(user), Some(body)) => Message::new(MessageKind::Direct, user, body, None),
                _ => return self.malformed(name, args),
            },
            events::RECEIVE_GROUP_MESSAGE => match (arg(0), arg(1), arg(2)) {
                (Some(group), Some(user), Some(body)) => {
                    Message::new(MessageKind::Group, user, body, Some(group.to_string()))
                }
                _ => return self.malformed(name, args),
            },
            events::ECHO => match arg(0) {
                Some(body) => Message::new(MessageKind::Echo, "hub", body, None),
                None => return self.malformed(name, args),
            },
            events::ERROR => match arg(0) {
                Some(text) => {
                    self.connection
                        .emit_error(HubError::ServerReportedError(text.to_string()));
                    Message::new(MessageKind::Error, "hub", text, None)
                }
                None => return self.malformed(name, args),
            },
            events::JOINED_GROUP => match arg(0) {
                Some(group) => {
                    Message::new(MessageKind::System, "hub", format!("joined {group}"), None)
                }
                None => return self.malformed(name, args),
            },
            events::LEFT_GROUP => match arg(0) {
                Some(group) => {
                    Message::new(MessageKind::System, "hub", format!("left {group}"), None)
                }
                None => return self.malformed(name, args),
            },
            _ => {
                debug!(event = name, "unhandled hub event");
                return;
            }
        };
        self.append(name, message);
    }
}
