pub mod client;
pub mod config;
pub mod connection;
pub mod connection_state;
pub mod dispatch;
pub mod groups;

// Re-export main types
pub use client::{HubClient, HubClientBuilder};
pub use config::ClientConfig;
pub use connection::{notifications, ConnectionManager, LifecycleEvent};
pub use connection_state::{AtomicConnectionState, ConnectionState};
pub use dispatch::{Message, MessageDispatcher, MessageKind};
pub use groups::{GroupMembershipTracker, GroupSnapshot, Membership};
