//! Fixed-window request counter keyed by client.
//!
//! Each client key owns one `RateLimitEntry`. The check-and-increment for a key
//! runs while holding that key's shard lock (`DashMap::entry`), so two concurrent
//! requests from the same client can never both take the last slot of a window.
//!
//! The map is bounded: `sweep_expired` drops entries whose window has passed
//! (called periodically from `app.rs`), and admitting a new key when the map is at
//! `max_clients` first sweeps, then evicts the entry whose window ends soonest.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Longest window the limiter will track; longer configured windows are clamped.
pub const MAX_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    // Requests admitted per client per window.
    pub max_requests: u32,
    pub window: Duration,
    // Soft cap on tracked client keys.
    pub max_clients: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(15 * 60),
            max_clients: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// Quota exhausted; `retry_after` is the time left in the current window.
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    window_reset_at: Instant,
}

impl RateLimitEntry {
    fn start(now: Instant, window: Duration) -> Self {
        Self {
            count: 1,
            // unreachable with a clamped window; a one-request window beats a panic
            window_reset_at: now.checked_add(window).unwrap_or(now),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now > self.window_reset_at
    }
}

pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    config: RateLimitConfig,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("tracked_clients", &self.entries.len())
            .finish()
    }
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config: RateLimitConfig {
                window: config.window.min(MAX_WINDOW),
                ..config
            },
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    pub fn admit(&self, client_key: &str) -> Admission {
        self.admit_at(client_key, Instant::now())
    }

    /// Same as [`RateLimiter::admit`] with an explicit clock reading.
    pub fn admit_at(&self, client_key: &str, now: Instant) -> Admission {
        if !self.entries.contains_key(client_key) {
            self.make_room(now);
        }

        match self.entries.entry(client_key.to_owned()) {
            Entry::Vacant(vacant) => {
                vacant.insert(RateLimitEntry::start(now, self.config.window));
                Admission::Allowed
            }
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.is_expired(now) {
                    *entry = RateLimitEntry::start(now, self.config.window);
                    Admission::Allowed
                } else if entry.count >= self.config.max_requests {
                    Admission::Denied {
                        retry_after: entry.window_reset_at.saturating_duration_since(now),
                    }
                } else {
                    entry.count += 1;
                    Admission::Allowed
                }
            }
        }
    }

    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    /// Drop every entry whose window ended before `now`. Returns how many were removed.
    pub fn sweep_expired_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.entries.len()
    }

    // Concurrent first requests from distinct keys may overshoot the cap slightly.
    fn make_room(&self, now: Instant) {
        if self.entries.len() < self.config.max_clients {
            return;
        }

        let swept = self.sweep_expired_at(now);
        if swept > 0 {
            tracing::debug!(swept, "rate limiter swept expired entries at capacity");
        }

        while self.entries.len() >= self.config.max_clients {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|item| item.value().window_reset_at)
                .map(|item| item.key().clone());

            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                    tracing::debug!(client = %key, "rate limiter evicted entry at capacity");
                }
                None => break,
            }
        }
    }
}
