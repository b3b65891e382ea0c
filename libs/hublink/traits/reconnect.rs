use std::time::Duration;

/// Pure mapping from reconnection attempt index to wait time.
///
/// # Returns
/// * `Some(duration)` - wait this long before attempt `attempt` (0-indexed)
/// * `None` - stop reconnecting; the session fails terminally
pub trait ReconnectPolicy: Send + Sync {
    fn next_delay(&self, attempt: usize) -> Option<Duration>;

    /// Whether attempt `attempt` should be made at all.
    fn should_reconnect(&self, attempt: usize) -> bool {
        self.next_delay(attempt).is_some()
    }
}

/// Explicit finite delay table.
///
/// Attempt `n` waits `delays[n]`; attempts beyond the table are not made.
/// The delays are taken verbatim from the table - no jitter, no computed
/// growth.
#[derive(Debug, Clone)]
pub struct DelaySchedule {
    delays: Vec<Duration>,
}

impl DelaySchedule {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Number of attempts the schedule permits.
    pub fn attempts(&self) -> usize {
        self.delays.len()
    }
}

impl Default for DelaySchedule {
    /// Immediate first retry, then 2s, 10s, 30s, then stop.
    fn default() -> Self {
        Self::new(vec![
            Duration::ZERO,
            Duration::from_secs(2),
            Duration::from_secs(10),
            Duration::from_secs(30),
        ])
    }
}

impl ReconnectPolicy for DelaySchedule {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        self.delays.get(attempt).copied()
    }
}

/// Disables automatic reconnection entirely.
///
/// An unexpected closure moves the connection straight to Disconnected
/// with the closure's error attached.
#[derive(Debug, Clone)]
pub struct NeverReconnect;

impl ReconnectPolicy for NeverReconnect {
    fn next_delay(&self, _attempt: usize) -> Option<Duration> {
        None
    }

    fn should_reconnect(&self, _attempt: usize) -> bool {
        false
    }
}
