use thiserror::Error;

/// Closed error taxonomy surfaced by hublink operations.
///
/// Validation failures (`InvalidUrl`, `InvalidGroupName`, `EmptyMessage`,
/// `UnknownGroup`) are rejected before any remote call. Transport failures
/// (`NegotiationFailed`, `TransportClosed`) additionally drive the
/// reconnection state machine. Anything the classifier cannot place lands
/// in `Unknown` with the original description preserved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// Connection URL is empty or fails syntax validation
    #[error("invalid hub url: {0}")]
    InvalidUrl(String),

    /// Operation requires a live connection
    #[error("not connected to a hub")]
    NotConnected,

    /// A connection or reconnection is already in progress or established
    #[error("connection already active")]
    AlreadyActive,

    /// Opening or negotiating a channel failed
    #[error("negotiation failed: {0}")]
    NegotiationFailed(String),

    /// The underlying channel closed unexpectedly
    #[error("transport closed: {0}")]
    TransportClosed(String),

    /// A remote method call failed in flight
    #[error("invoke failed: {0}")]
    InvokeFailed(String),

    /// The hub reported an application-level failure
    #[error("hub reported error: {0}")]
    ServerReportedError(String),

    /// The group exists but its membership is not confirmed yet
    #[error("group '{0}' is not ready for sending")]
    GroupNotReady(String),

    /// Group names must be non-empty
    #[error("group name must not be empty")]
    InvalidGroupName,

    /// Message bodies must be non-empty
    #[error("message body must not be empty")]
    EmptyMessage,

    /// The group is not in the tracked set
    #[error("group '{0}' is not tracked")]
    UnknownGroup(String),

    /// Unclassifiable failure, original description preserved
    #[error("unclassified failure: {0}")]
    Unknown(String),
}

/// Result type for hublink operations.
pub type Result<T> = std::result::Result<T, HubError>;

/// Raw failure reported by the channel layer, before classification.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ChannelError {
    pub message: String,
}

impl ChannelError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Keyword-based classification of a raw failure description.
///
/// Returns `None` when no category matches; callers pick a context
/// default or fall back to [`HubError::Unknown`].
fn classify_text(message: &str) -> Option<HubError> {
    let lower = message.to_ascii_lowercase();
    if lower.contains("negotiat") || lower.contains("handshake") {
        Some(HubError::NegotiationFailed(message.to_string()))
    } else if lower.contains("closed")
        || lower.contains("reset")
        || lower.contains("broken pipe")
        || lower.contains("eof")
    {
        Some(HubError::TransportClosed(message.to_string()))
    } else if lower.contains("hub error") || lower.contains("server error") {
        Some(HubError::ServerReportedError(message.to_string()))
    } else {
        None
    }
}

/// Classify a failure from the connect path.
///
/// An open that fails without a recognizable category is a negotiation
/// failure: nothing else can go wrong before the channel exists.
pub fn classify_connect_failure(error: &ChannelError) -> HubError {
    classify_text(&error.message)
        .unwrap_or_else(|| HubError::NegotiationFailed(error.message.clone()))
}

/// Classify a failure from an invoke round trip.
pub fn classify_invoke_failure(error: &ChannelError) -> HubError {
    classify_text(&error.message).unwrap_or_else(|| HubError::InvokeFailed(error.message.clone()))
}

/// Classify a channel closure reason.
pub fn classify_closure(reason: Option<&str>) -> HubError {
    match reason {
        Some(text) => {
            classify_text(text).unwrap_or_else(|| HubError::TransportClosed(text.to_string()))
        }
        None => HubError::TransportClosed("connection closed".to_string()),
    }
}

/// Classify a failure with no call-site context.
pub fn classify(message: &str) -> HubError {
    classify_text(message).unwrap_or_else(|| HubError::Unknown(message.to_string()))
}
