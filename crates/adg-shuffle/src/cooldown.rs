//! Per-identity cooldown between manual shuffle triggers.
//!
//! Pure bookkeeping: the caller supplies `now`. The map lives in one process;
//! replicas behind a load balancer each keep their own and need a shared
//! backing store to enforce one cooldown across the fleet.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5 * 60);
/// Map size above which stale entries are pruned on the next record.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownCheck {
    pub in_cooldown: bool,
    /// Whole seconds left, rounded up. Only set while in cooldown.
    pub seconds_remaining: Option<u64>,
}

impl CooldownCheck {
    fn clear() -> Self {
        Self {
            in_cooldown: false,
            seconds_remaining: None,
        }
    }
}

#[derive(Debug)]
pub struct CooldownTracker {
    window: Duration,
    max_entries: usize,
    entries: HashMap<String, DateTime<Utc>>,
}

impl Default for CooldownTracker {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN, DEFAULT_MAX_ENTRIES)
    }
}

impl CooldownTracker {
    pub fn new(window: Duration, max_entries: usize) -> Self {
        Self {
            window,
            max_entries,
            entries: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn window_ms(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }

    pub fn check(&self, identity: &str, now: DateTime<Utc>) -> CooldownCheck {
        let Some(last) = self.entries.get(identity) else {
            return CooldownCheck::clear();
        };

        let window_ms = self.window_ms();
        let elapsed_ms = (now - *last).num_milliseconds();
        if elapsed_ms >= window_ms {
            return CooldownCheck::clear();
        }

        // A trigger stamped in the future (clock step back) waits out a full window.
        let remaining_ms = (window_ms - elapsed_ms).min(window_ms);
        CooldownCheck {
            in_cooldown: true,
            seconds_remaining: Some(((remaining_ms + 999) / 1000) as u64),
        }
    }

    pub fn record(&mut self, identity: &str, now: DateTime<Utc>) {
        self.entries.insert(identity.to_string(), now);
        if self.entries.len() > self.max_entries {
            self.prune(now);
        }
    }

    /// Check and record under one borrow. On success the identity is in
    /// cooldown from `now`; on refusal the check result is returned.
    pub fn try_begin(&mut self, identity: &str, now: DateTime<Utc>) -> Result<(), CooldownCheck> {
        let check = self.check(identity, now);
        if check.in_cooldown {
            return Err(check);
        }
        self.record(identity, now);
        Ok(())
    }

    /// Drop the cooldown for `identity`, e.g. when the guarded run failed.
    pub fn release(&mut self, identity: &str) {
        self.entries.remove(identity);
    }

    /// Remove entries whose window has elapsed. Returns how many were removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let window_ms = self.window_ms();
        let before = self.entries.len();
        self.entries
            .retain(|_, last| (now - *last).num_milliseconds() < window_ms);
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn unknown_identity_is_not_in_cooldown() {
        let tracker = CooldownTracker::default();
        assert_eq!(tracker.check("10.0.0.1", t0()), CooldownCheck::clear());
    }

    #[test]
    fn immediate_retrigger_is_refused_with_remaining_seconds() {
        let mut tracker = CooldownTracker::default();
        tracker.record("10.0.0.1", t0());

        let check = tracker.check("10.0.0.1", t0() + ChronoDuration::seconds(1));
        assert!(check.in_cooldown);
        assert_eq!(check.seconds_remaining, Some(299));

        let check = tracker.check("10.0.0.1", t0() + ChronoDuration::milliseconds(299_500));
        assert_eq!(check.seconds_remaining, Some(1));
    }

    #[test]
    fn window_elapsed_clears_cooldown() {
        let mut tracker = CooldownTracker::default();
        tracker.record("10.0.0.1", t0());
        let later = t0() + ChronoDuration::seconds(300);
        assert!(!tracker.check("10.0.0.1", later).in_cooldown);
    }

    #[test]
    fn identities_are_independent() {
        let mut tracker = CooldownTracker::default();
        tracker.record("a", t0());
        assert!(!tracker.check("b", t0()).in_cooldown);
    }

    #[test]
    fn try_begin_reserves_and_release_undoes() {
        let mut tracker = CooldownTracker::default();
        assert!(tracker.try_begin("a", t0()).is_ok());
        let refused = tracker.try_begin("a", t0()).unwrap_err();
        assert!(refused.in_cooldown);

        tracker.release("a");
        assert!(tracker.try_begin("a", t0()).is_ok());
    }

    #[test]
    fn clock_step_back_keeps_full_window() {
        let mut tracker = CooldownTracker::default();
        tracker.record("a", t0());
        let check = tracker.check("a", t0() - ChronoDuration::seconds(30));
        assert_eq!(check.seconds_remaining, Some(300));
    }

    #[test]
    fn map_is_pruned_past_size_bound() {
        let mut tracker = CooldownTracker::new(Duration::from_secs(60), 3);
        assert!(tracker.is_empty());
        for i in 0..3 {
            tracker.record(&format!("old-{i}"), t0());
        }
        assert_eq!(tracker.len(), 3);

        // Fourth entry arrives after the old ones went stale.
        tracker.record("fresh", t0() + ChronoDuration::seconds(120));
        assert_eq!(tracker.len(), 1);
        assert!(tracker.check("fresh", t0() + ChronoDuration::seconds(121)).in_cooldown);
    }

    #[test]
    fn fresh_entries_survive_pruning() {
        let mut tracker = CooldownTracker::new(Duration::from_secs(60), 2);
        tracker.record("a", t0());
        tracker.record("b", t0());
        tracker.record("c", t0() + ChronoDuration::seconds(10));
        assert_eq!(tracker.len(), 3);
    }
}
