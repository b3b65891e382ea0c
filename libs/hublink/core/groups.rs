use crate::core::connection::ConnectionManager;
use crate::traits::{events, methods, EventSink, HubError, Result, SessionObserver};
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Client-side view of one group's membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Membership {
    /// Join issued, ack outstanding; not eligible for `send`
    Pending,
    /// Acknowledged by the hub for the current connection identity
    Confirmed,
    /// Leave issued, ack outstanding
    Leaving,
}

/// Read-only snapshot of a tracked group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSnapshot {
    pub name: String,
    pub membership: Membership,
}

struct GroupEntry {
    name: String,
    membership: Membership,
}

/// Owner of the tracked group set.
///
/// The hub binds membership to a connection identity and silently forgets
/// it when the channel drops, so the tracker re-issues `JoinGroup` for
/// every surviving entry each time a session is established. Entries are
/// kept in join order.
pub struct GroupMembershipTracker {
    connection: Arc<ConnectionManager>,
    groups: Mutex<Vec<GroupEntry>>,
}

impl GroupMembershipTracker {
    pub(crate) fn new(connection: Arc<ConnectionManager>) -> Self {
        Self {
            connection,
            groups: Mutex::new(Vec::new()),
        }
    }

    /// Request membership of `name`.
    ///
    /// The entry is tracked as Pending until the hub's `JoinedGroup` ack
    /// confirms it. If the invoke itself fails the entry is removed again,
    /// so a failed join is never left half-applied. Joining a name that is
    /// already tracked is a no-op.
    pub async fn join(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(HubError::InvalidGroupName);
        }
        {
            let mut groups = self.groups.lock();
            if groups.iter().any(|entry| entry.name == name) {
                debug!(group = name, "join ignored, group already tracked");
                return Ok(());
            }
            groups.push(GroupEntry {
                name: name.to_string(),
                membership: Membership::Pending,
            });
        }
        if let Err(error) = self
            .connection
            .invoke(methods::JOIN_GROUP, vec![json!(name)])
            .await
        {
            self.groups.lock().retain(|entry| entry.name != name);
            return Err(error);
        }
        Ok(())
    }

    /// Request removal from `name`.
    ///
    /// The entry is marked Leaving until the hub's `LeftGroup` ack removes
    /// it. If the invoke fails the hub never saw the request, so the entry
    /// reverts to Confirmed and the failure is surfaced.
    pub async fn leave(&self, name: &str) -> Result<()> {
        {
            let mut groups = self.groups.lock();
            let entry = groups
                .iter_mut()
                .find(|entry| entry.name == name)
                .ok_or_else(|| HubError::UnknownGroup(name.to_string()))?;
            if entry.membership == Membership::Leaving {
                debug!(group = name, "leave ignored, already in progress");
                return Ok(());
            }
            entry.membership = Membership::Leaving;
        }
        if let Err(error) = self
            .connection
            .invoke(methods::LEAVE_GROUP, vec![json!(name)])
            .await
        {
            if let Some(entry) = self
                .groups
                .lock()
                .iter_mut()
                .find(|entry| entry.name == name)
            {
                entry.membership = Membership::Confirmed;
            }
            return Err(error);
        }
        Ok(())
    }

    /// Whether `name` is eligible for `send`.
    pub fn is_confirmed(&self, name: &str) -> bool {
        self.groups
            .lock()
            .iter()
            .any(|entry| entry.name == name && entry.membership == Membership::Confirmed)
    }

    /// Tracked groups in join order.
    pub fn snapshot(&self) -> Vec<GroupSnapshot> {
        self.groups
            .lock()
            .iter()
            .map(|entry| GroupSnapshot {
                name: entry.name.clone(),
                membership: entry.membership,
            })
            .collect()
    }

    pub fn tracked_count(&self) -> usize {
        self.groups.lock().len()
    }

    fn confirm(&self, name: &str) {
        let mut groups = self.groups.lock();
        match groups.iter_mut().find(|entry| entry.name == name) {
            Some(entry) if entry.membership == Membership::Pending => {
                entry.membership = Membership::Confirmed;
                debug!(group = name, "membership confirmed");
            }
            Some(entry) => {
                debug!(group = name, membership = ?entry.membership, "join ack ignored");
            }
            None => warn!(group = name, "join ack for untracked group"),
        }
    }

    fn remove(&self, name: &str) {
        let mut groups = self.groups.lock();
        let Some(position) = groups.iter().position(|entry| entry.name == name) else {
            warn!(group = name, "leave ack for untracked group");
            return;
        };
        if groups[position].membership != Membership::Leaving {
            warn!(group = name, "hub removed membership without a pending leave");
        }
        groups.remove(position);
        debug!(group = name, "membership removed");
    }

    /// Reconcile the tracked set with a freshly established session.
    ///
    /// The new connection identity has no membership on the hub side, so
    /// every Pending or Confirmed entry is reset to Pending and its join
    /// re-issued; entries with a pending leave are dropped (the identity
    /// change already completed their removal). All joins are attempted;
    /// failures leave the entry Pending and are surfaced as lifecycle
    /// errors since no caller is awaiting them.
    async fn replay(&self) {
        let names: Vec<String> = {
            let mut groups = self.groups.lock();
            groups.retain(|entry| {
                if entry.membership == Membership::Leaving {
                    debug!(group = %entry.name, "dropping group with pending leave across sessions");
                    return false;
                }
                true
            });
            groups
                .iter_mut()
                .map(|entry| {
                    entry.membership = Membership::Pending;
                    entry.name.clone()
                })
                .collect()
        };
        if names.is_empty() {
            return;
        }

        info!(groups = names.len(), "replaying group membership");
        let results = join_all(names.iter().map(|name| {
            self.connection
                .invoke(methods::JOIN_GROUP, vec![json!(name)])
        }))
        .await;
        for (name, result) in names.iter().zip(results) {
            if let Err(error) = result {
                warn!(group = %name, error = %error, "group re-join failed");
                self.connection.emit_error(error);
            }
        }
    }
}

impl EventSink for GroupMembershipTracker {
    fn handle_event(&self, name: &str, args: &[Value]) {
        let group = args.first().and_then(Value::as_str);
        match (name, group) {
            (events::JOINED_GROUP, Some(group)) => self.confirm(group),
            (events::LEFT_GROUP, Some(group)) => self.remove(group),
            (events::JOINED_GROUP | events::LEFT_GROUP, None) => {
                warn!(event = name, "membership ack without a group name");
            }
            _ => {}
        }
    }
}

#[async_trait]
impl SessionObserver for GroupMembershipTracker {
    async fn on_session_established(&self, _connection_id: &str) {
        self.replay().await;
    }
}
