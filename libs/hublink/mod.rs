//! # hublink
//!
//! A resilient client for real-time messaging hubs: persistent
//! connection, named broadcast groups, ordered message log.
//!
//! ## Features
//!
//! - **Explicit state machine**: `Disconnected → Connecting → Connected →
//!   Reconnecting → {Connected | Failed}`, every transition observable
//! - **Membership reconciliation**: the hub binds group membership to a
//!   connection identity that changes on every reconnect; the tracker
//!   replays joins automatically and gates `send` until re-confirmed
//! - **Injectable reconnection policy**: an explicit finite delay table,
//!   no hidden retry behavior
//! - **Pluggable transport**: the wire protocol lives behind the
//!   `HubConnector`/`HubChannel` traits; transport failures are simulated
//!   in tests without a network
//!
//! ## Example
//!
//! ```rust,ignore
//! use hublink::{HubClient, DelaySchedule};
//!
//! #[tokio::main]
//! async fn main() -> hublink::Result<()> {
//!     let client = HubClient::builder(MyConnector::new())
//!         .reconnect_policy(DelaySchedule::default())
//!         .build();
//!
//!     client.connect("wss://hub.example.com/chat").await?;
//!     client.join("room1").await?;
//!     client.send("room1", "hello").await?;
//!
//!     for message in client.log() {
//!         println!("{}: {}", message.sender, message.body);
//!     }
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod traits;

// Re-export all traits
pub use self::traits::*;

// Re-export core client functionality
pub use self::core::{
    notifications, ClientConfig, ConnectionManager, ConnectionState, GroupMembershipTracker,
    GroupSnapshot, HubClient, HubClientBuilder, LifecycleEvent, Membership, Message,
    MessageDispatcher, MessageKind,
};
