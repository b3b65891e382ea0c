use crate::traits::{DelaySchedule, ReconnectPolicy};
use std::sync::Arc;

/// Runtime configuration for a hub client.
pub struct ClientConfig {
    /// Whether an unexpected closure triggers automatic reconnection
    pub(crate) auto_reconnect: bool,

    /// Delay table consulted between reconnection attempts
    pub(crate) reconnect_policy: Arc<dyn ReconnectPolicy>,
}

impl ClientConfig {
    pub fn auto_reconnect(&self) -> bool {
        self.auto_reconnect
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_policy: Arc::new(DelaySchedule::default()),
        }
    }
}
