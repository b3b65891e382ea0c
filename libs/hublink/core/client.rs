use crate::core::config::ClientConfig;
use crate::core::connection::{ConnectionManager, LifecycleEvent};
use crate::core::connection_state::ConnectionState;
use crate::core::dispatch::{Message, MessageDispatcher};
use crate::core::groups::{GroupMembershipTracker, GroupSnapshot};
use crate::traits::{HubConnector, HubError, ReconnectPolicy, Result, Subscription};
use std::sync::Arc;

/// Builder for [`HubClient`].
///
/// The connector is mandatory and supplied up front; reconnection
/// behavior is optional with defaults from [`ClientConfig`].
pub struct HubClientBuilder {
    connector: Arc<dyn HubConnector>,
    config: ClientConfig,
}

impl HubClientBuilder {
    pub fn new(connector: impl HubConnector + 'static) -> Self {
        Self {
            connector: Arc::new(connector),
            config: ClientConfig::default(),
        }
    }

    /// Replace the default delay schedule.
    pub fn reconnect_policy(mut self, policy: impl ReconnectPolicy + 'static) -> Self {
        self.config.reconnect_policy = Arc::new(policy);
        self
    }

    /// Disable or re-enable automatic reconnection.
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.config.auto_reconnect = enabled;
        self
    }

    pub fn build(self) -> HubClient {
        let connection = Arc::new(ConnectionManager::new(self.connector, self.config));
        let groups = Arc::new(GroupMembershipTracker::new(Arc::clone(&connection)));
        let dispatcher = Arc::new(MessageDispatcher::new(
            Arc::clone(&connection),
            Arc::clone(&groups),
        ));

        // tracker first: membership acks must update the tracked set
        // before the dispatcher turns them into log entries
        connection.attach_sink(Arc::clone(&groups) as Arc<dyn crate::traits::EventSink>);
        connection.attach_sink(Arc::clone(&dispatcher) as Arc<dyn crate::traits::EventSink>);
        connection.attach_observer(Arc::clone(&groups) as Arc<dyn crate::traits::SessionObserver>);

        HubClient {
            connection,
            groups,
            dispatcher,
        }
    }
}

/// Facade over one hub connection: the connection manager, the group
/// membership tracker, and the message dispatcher wired together.
///
/// Instances are explicitly constructed and independently lifecycled;
/// nothing is shared between two clients.
pub struct HubClient {
    connection: Arc<ConnectionManager>,
    groups: Arc<GroupMembershipTracker>,
    dispatcher: Arc<MessageDispatcher>,
}

impl HubClient {
    /// Start building a client over `connector`.
    pub fn builder(connector: impl HubConnector + 'static) -> HubClientBuilder {
        HubClientBuilder::new(connector)
    }

    /// Build a client with the default configuration.
    pub fn new(connector: impl HubConnector + 'static) -> Self {
        Self::builder(connector).build()
    }

    pub async fn connect(&self, url: &str) -> Result<()> {
        self.connection.connect(url).await
    }

    pub async fn disconnect(&self) {
        self.connection.disconnect().await;
    }

    pub async fn join(&self, group: &str) -> Result<()> {
        self.groups.join(group).await
    }

    pub async fn leave(&self, group: &str) -> Result<()> {
        self.groups.leave(group).await
    }

    pub async fn send(&self, group: &str, body: &str) -> Result<()> {
        self.dispatcher.send(group, body).await
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Current connection identity; absent while disconnected.
    pub fn connection_id(&self) -> Option<String> {
        self.connection.connection_id()
    }

    pub fn last_error(&self) -> Option<HubError> {
        self.connection.last_error()
    }

    /// Tracked groups in join order.
    pub fn groups(&self) -> Vec<GroupSnapshot> {
        self.groups.snapshot()
    }

    /// Snapshot of the message log, in delivery order.
    pub fn log(&self) -> Vec<Message> {
        self.dispatcher.log()
    }

    pub fn clear_log(&self) {
        self.dispatcher.clear_log();
    }

    /// Subscribe to a lifecycle notification
    /// (see [`crate::core::connection::notifications`]).
    pub fn on_lifecycle(
        &self,
        name: &str,
        callback: impl Fn(&LifecycleEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.connection.on_lifecycle(name, callback)
    }

    pub fn unsubscribe_lifecycle(&self, subscription: &Subscription) -> bool {
        self.connection.unsubscribe(subscription)
    }

    /// Subscribe to log entries produced by one inbound event name.
    pub fn on_message(
        &self,
        event: &str,
        callback: impl Fn(&Message) + Send + Sync + 'static,
    ) -> Subscription {
        self.dispatcher.subscribe(event, callback)
    }

    pub fn unsubscribe_message(&self, subscription: &Subscription) -> bool {
        self.dispatcher.unsubscribe(subscription)
    }

    /// Drain one queued lifecycle event (non-blocking).
    pub fn try_recv_event(&self) -> Option<LifecycleEvent> {
        self.connection.try_recv_event()
    }

    /// Direct access to the connection manager.
    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    /// Direct access to the membership tracker.
    pub fn membership(&self) -> &Arc<GroupMembershipTracker> {
        &self.groups
    }

    /// Direct access to the dispatcher.
    pub fn dispatcher(&self) -> &Arc<MessageDispatcher> {
        &self.dispatcher
    }
}
