//! Shared runtime state for adg-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The cooldown map and
//! request limiter are process-local; replicas each keep their own.

use std::sync::Arc;
use std::time::Duration;

use adg_config::{ResolvedSecrets, ShuffleSettings};
use adg_shuffle::{CooldownTracker, ShuffleEngine};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::limits::RequestLimiter;

/// Identities tracked by the request limiter before eviction kicks in.
const LIMITER_MAX_ENTRIES: usize = 1000;

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    pub build: BuildInfo,
    pub engine: Arc<ShuffleEngine>,
    /// Manual-trigger cooldown, keyed by client identity.
    pub cooldown: Mutex<CooldownTracker>,
    /// Per-identity request limit on the trigger route.
    pub limiter: Mutex<RequestLimiter>,
    /// Identity from `x-forwarded-for` / `x-real-ip` instead of the peer address.
    pub trust_forwarded_for: bool,
    /// `None` = admin routes answer "not configured".
    admin_api_key: Option<String>,
}

impl AppState {
    pub fn new(
        engine: Arc<ShuffleEngine>,
        settings: &ShuffleSettings,
        secrets: &ResolvedSecrets,
    ) -> Self {
        Self {
            build: BuildInfo {
                service: "shuffle",
                version: env!("CARGO_PKG_VERSION"),
            },
            engine,
            cooldown: Mutex::new(CooldownTracker::new(
                settings.cooldown(),
                settings.trigger.cooldown_max_entries,
            )),
            limiter: Mutex::new(RequestLimiter::new(
                settings.trigger.rate_limit_max,
                settings.rate_limit_window(),
                LIMITER_MAX_ENTRIES,
            )),
            trust_forwarded_for: settings.http.trust_forwarded_for,
            admin_api_key: secrets.admin_api_key.clone(),
        }
    }

    pub fn admin_api_key(&self) -> Option<&str> {
        self.admin_api_key.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Scheduled shuffle
// ---------------------------------------------------------------------------

/// Run a shuffle every `interval`, starting one interval from now.
///
/// Scheduled runs skip the manual cooldown. A failed run is logged and the
/// next tick tries again with a fresh snapshot.
pub fn spawn_shuffle_schedule(engine: Arc<ShuffleEngine>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match engine.perform_global_shuffle().await {
                Ok(report) => info!(
                    run_id = %report.run_id,
                    shuffled = report.shuffled_count,
                    batches = report.batch_count,
                    "scheduled shuffle completed"
                ),
                Err(e) => error!(
                    run_id = %e.run_id(),
                    code = e.code(),
                    committed = e.committed(),
                    error = %e,
                    "scheduled shuffle failed"
                ),
            }
        }
    })
}
