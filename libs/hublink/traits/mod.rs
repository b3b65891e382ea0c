//! # hublink traits
//!
//! Core traits and types for the hublink client:
//!
//! - **HubConnector / HubChannel**: the duplex channel abstraction the
//!   connection manager drives (the wire transport lives behind it)
//! - **ReconnectPolicy**: attempt index → delay, with a cutoff
//! - **SubscriberRegistry**: event name → ordered callbacks
//! - **HubError**: the closed error taxonomy, plus classification of raw
//!   channel failures

pub mod channel;
pub mod error;
pub mod reconnect;
pub mod subscriber;

pub use channel::{
    events, methods, ChannelEvent, EventSink, HubChannel, HubConnector, SessionObserver,
};
pub use error::{
    classify, classify_closure, classify_connect_failure, classify_invoke_failure, ChannelError,
    HubError, Result,
};
pub use reconnect::{DelaySchedule, NeverReconnect, ReconnectPolicy};
pub use subscriber::{Callback, SubscriberRegistry, Subscription};
