use crate::traits::error::ChannelError;
use async_trait::async_trait;
use serde_json::Value;

/// Remote method names (client → hub).
pub mod methods {
    pub const JOIN_GROUP: &str = "JoinGroup";
    pub const LEAVE_GROUP: &str = "LeaveGroup";
    pub const SEND_MESSAGE_TO_GROUP: &str = "SendMessageToGroup";
}

/// Named event names (hub → client).
pub mod events {
    pub const RECEIVE_MESSAGE: &str = "ReceiveMessage";
    pub const RECEIVE_GROUP_MESSAGE: &str = "ReceiveGroupMessage";
    pub const JOINED_GROUP: &str = "JoinedGroup";
    pub const LEFT_GROUP: &str = "LeftGroup";
    pub const ECHO: &str = "Echo";
    pub const ERROR: &str = "Error";
}

/// Something delivered by the channel layer.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// A named event pushed by the hub
    Event { name: String, args: Vec<Value> },
    /// The channel closed; `None` means no reason was given
    Closed { reason: Option<String> },
}

/// One live duplex channel session to the hub.
///
/// The channel already completed negotiation and carries the
/// server-assigned connection identity for its lifetime. Group membership
/// on the hub side is bound to this identity and is forgotten the moment
/// the channel dies.
#[async_trait]
pub trait HubChannel: Send + Sync {
    /// Server-assigned identity for this channel session
    fn connection_id(&self) -> String;

    /// Fire a named method at the hub and await the remote round trip
    async fn invoke(&self, method: &str, args: Vec<Value>)
        -> std::result::Result<(), ChannelError>;

    /// Next delivery from the hub; yields `Closed` when the channel dies
    async fn next_event(&self) -> ChannelEvent;

    /// Close the channel; idempotent
    async fn close(&self);
}

/// Factory for channels.
///
/// Every successful `open` performs a fresh negotiation and yields a
/// channel with a new connection identity; the connection manager calls it
/// once per connect or reconnect attempt.
#[async_trait]
pub trait HubConnector: Send + Sync {
    async fn open(&self, url: &str) -> std::result::Result<Box<dyn HubChannel>, ChannelError>;
}

/// Consumer of inbound named events, attached by the session owner.
///
/// Sinks are called in attachment order, synchronously with respect to
/// event delivery, so downstream sinks observe state already updated by
/// upstream ones.
pub trait EventSink: Send + Sync {
    fn handle_event(&self, name: &str, args: &[Value]);
}

/// Notified after a channel session is established, before event pumping
/// resumes. This is the hook group membership reconciliation hangs off.
#[async_trait]
pub trait SessionObserver: Send + Sync {
    async fn on_session_established(&self, connection_id: &str);
}
