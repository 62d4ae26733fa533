//! Per-identity request limit for the admin shuffle routes.
//!
//! Fixed window: the first request from an identity opens a window; up to
//! `max_requests` are allowed until it closes. Tracked identities are capped
//! at `max_entries`; expired windows go first, then the oldest window.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy)]
struct Window {
    opened_at: DateTime<Utc>,
    count: u32,
}

#[derive(Debug)]
pub struct RequestLimiter {
    max_requests: u32,
    window: Duration,
    max_entries: usize,
    windows: HashMap<String, Window>,
}

/// Request refused; retry after this many whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitExceeded {
    pub retry_after_secs: u64,
}

impl RequestLimiter {
    pub fn new(max_requests: u32, window: Duration, max_entries: usize) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            max_entries: max_entries.max(1),
            windows: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    fn window_ms(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }

    /// Count one request from `identity` at `now`.
    pub fn hit(&mut self, identity: &str, now: DateTime<Utc>) -> Result<(), LimitExceeded> {
        let window_ms = self.window_ms();

        if let Some(w) = self.windows.get_mut(identity) {
            // A clock step back keeps the current window.
            let elapsed_ms = (now - w.opened_at).num_milliseconds().max(0);
            if elapsed_ms < window_ms {
                if w.count >= self.max_requests {
                    let remaining_ms = window_ms - elapsed_ms;
                    return Err(LimitExceeded {
                        retry_after_secs: ((remaining_ms + 999) / 1000) as u64,
                    });
                }
                w.count += 1;
                return Ok(());
            }
            *w = Window {
                opened_at: now,
                count: 1,
            };
            return Ok(());
        }

        if self.windows.len() >= self.max_entries {
            self.evict(now);
        }
        self.windows.insert(
            identity.to_string(),
            Window {
                opened_at: now,
                count: 1,
            },
        );
        Ok(())
    }

    fn evict(&mut self, now: DateTime<Utc>) {
        let window_ms = self.window_ms();
        self.windows
            .retain(|_, w| (now - w.opened_at).num_milliseconds() < window_ms);

        if self.windows.len() >= self.max_entries {
            if let Some(oldest) = self
                .windows
                .iter()
                .min_by_key(|(_, w)| w.opened_at)
                .map(|(k, _)| k.clone())
            {
                self.windows.remove(&oldest);
            }
        }
    }
}
