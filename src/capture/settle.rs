use std::time::Duration;

/// Default pause after the page reports ready, for animations and late XHRs
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(2000);
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10);
/// How often `document.readyState` is polled
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What to wait for between navigation and capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlePolicy {
    /// Upper bound for the document-ready and selector waits
    pub ready_timeout: Duration,
    /// Optional CSS selector that must be present before capturing
    pub wait_for_selector: Option<String>,
    /// Fixed pause applied last
    pub delay: Duration,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            ready_timeout: DEFAULT_READY_TIMEOUT,
            wait_for_selector: None,
            delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl SettlePolicy {
    /// Default readiness wait followed by `delay`
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}
