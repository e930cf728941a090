use serde::Deserialize;
use std::time::Duration;

const DEFAULT_IDLE_TIMEOUT_MS: u64 = 300_000;
const DEFAULT_MAILBOX_CAPACITY: usize = 64;
const DEFAULT_RECENT_LIMIT: usize = 10;
const DEFAULT_EXCERPT_CHARS: usize = 45;

/// Tunables for the actor system.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// An actor with no traffic for this long is evicted from memory.
    pub idle_timeout_ms: u64,
    pub mailbox_capacity: usize,
    /// Upper bound on pages returned by the recent/pinned listings.
    pub recent_limit: usize,
    pub excerpt_chars: usize,
    /// Send tag and category deltas when an existing page is edited.
    /// Creates always propagate.
    pub propagate_tags_on_update: bool,
}

impl SystemConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms.max(1))
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            recent_limit: DEFAULT_RECENT_LIMIT,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            propagate_tags_on_update: true,
        }
    }
}
