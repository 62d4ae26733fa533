//! Shuffle run orchestration: snapshot, permute, assign, commit.
//!
//! There is no lock around a run. Two overlapping runs (scheduled + manual,
//! or two replicas) can interleave their batches; the outcome is still a set
//! of positions, just not either run's intended permutation. Callers that need
//! exclusivity must schedule a single instance or hold an external mutex.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use adg_schemas::{Purchase, ShuffleStats};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::assignment::{plan_assignments, AssignmentPolicy, CapacityExceeded};
use crate::clock::Clock;
use crate::permutation::{fisher_yates, SeedStrategy};
use crate::stats::summarize;
use crate::store::{PurchaseStore, StoreError, DEFAULT_MAX_BATCH_OPS};
use crate::writer::{commit_in_batches, BatchFailure};

// ---------------------------------------------------------------------------
// Config + results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShuffleEngineConfig {
    pub policy: AssignmentPolicy,
    pub seed: SeedStrategy,
    /// Writes per transaction; further capped by the store.
    pub batch_limit: usize,
}

impl Default for ShuffleEngineConfig {
    fn default() -> Self {
        Self {
            policy: AssignmentPolicy::OrderingIndex,
            seed: SeedStrategy::Entropy,
            batch_limit: DEFAULT_MAX_BATCH_OPS,
        }
    }
}

/// Summary of a completed run. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShuffleReport {
    pub run_id: Uuid,
    pub shuffled_count: usize,
    pub batch_count: usize,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub seed: Option<u64>,
    pub policy: &'static str,
    pub vacant_squares: Option<usize>,
    pub message: String,
}

#[derive(Debug)]
pub enum ShuffleError {
    /// The eligibility snapshot could not be read. Nothing was written.
    Fetch { run_id: Uuid, source: StoreError },
    /// Square policy with more eligible purchases than squares. Nothing was written.
    Capacity {
        run_id: Uuid,
        source: CapacityExceeded,
    },
    /// A batch commit failed; earlier batches stay committed.
    Store { run_id: Uuid, failure: BatchFailure },
}

impl ShuffleError {
    pub fn run_id(&self) -> Uuid {
        match self {
            ShuffleError::Fetch { run_id, .. }
            | ShuffleError::Capacity { run_id, .. }
            | ShuffleError::Store { run_id, .. } => *run_id,
        }
    }

    /// Records durably written before the failure.
    pub fn committed(&self) -> usize {
        match self {
            ShuffleError::Store { failure, .. } => failure.committed,
            _ => 0,
        }
    }

    pub fn batches_committed(&self) -> usize {
        match self {
            ShuffleError::Store { failure, .. } => failure.batches_committed,
            _ => 0,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ShuffleError::Fetch { .. } => "STORE_READ_FAILED",
            ShuffleError::Capacity { .. } => "CAPACITY_EXCEEDED",
            ShuffleError::Store { .. } => "BATCH_COMMIT_FAILED",
        }
    }
}

impl fmt::Display for ShuffleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShuffleError::Fetch { source, .. } => write!(f, "snapshot read failed: {source}"),
            ShuffleError::Capacity { source, .. } => write!(f, "{source}"),
            ShuffleError::Store { failure, .. } => write!(f, "{failure}"),
        }
    }
}

impl std::error::Error for ShuffleError {}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct ShuffleEngine {
    store: Arc<dyn PurchaseStore>,
    clock: Arc<dyn Clock>,
    cfg: ShuffleEngineConfig,
}

impl ShuffleEngine {
    pub fn new(
        store: Arc<dyn PurchaseStore>,
        clock: Arc<dyn Clock>,
        cfg: ShuffleEngineConfig,
    ) -> Self {
        Self { store, clock, cfg }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// One full shuffle run over a fresh eligibility snapshot.
    pub async fn perform_global_shuffle(&self) -> Result<ShuffleReport, ShuffleError> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let now = self.clock.now();

        info!(
            %run_id,
            store = self.store.store_name(),
            policy = self.cfg.policy.as_str(),
            seed_strategy = self.cfg.seed.as_str(),
            "shuffle run starting"
        );

        let snapshot = match self.store.fetch_eligible().await {
            Ok(rows) => rows,
            Err(StoreError::CollectionNotFound) => {
                warn!(%run_id, "purchase collection does not exist yet; nothing to shuffle");
                return Ok(self.empty_report(
                    run_id,
                    now,
                    started,
                    "purchase collection does not exist yet",
                ));
            }
            Err(e) => {
                error!(%run_id, error = %e, "shuffle snapshot read failed");
                return Err(ShuffleError::Fetch { run_id, source: e });
            }
        };

        let fetched = snapshot.len();
        let eligible: Vec<Purchase> = snapshot.into_iter().filter(Purchase::is_eligible).collect();
        if eligible.len() != fetched {
            debug!(%run_id, dropped = fetched - eligible.len(), "ignored ineligible rows from store");
        }

        if eligible.is_empty() {
            info!(%run_id, "no eligible purchases to shuffle");
            return Ok(self.empty_report(run_id, now, started, "no eligible purchases to shuffle"));
        }

        let (seed, plan) = {
            let mut source = self.cfg.seed.source_at(now);
            let seed = source.seed();
            let permuted = fisher_yates(&eligible, source.as_mut());
            let plan = plan_assignments(&self.cfg.policy, &permuted, source.as_mut(), now)
                .map_err(|e| {
                    error!(%run_id, error = %e, "shuffle assignment refused");
                    ShuffleError::Capacity { run_id, source: e }
                })?;
            (seed, plan)
        };

        info!(
            %run_id,
            eligible = eligible.len(),
            seed = ?seed,
            "permutation computed; committing"
        );

        let progress = commit_in_batches(
            self.store.as_ref(),
            &plan.writes,
            self.cfg.batch_limit,
            run_id,
        )
        .await
        .map_err(|failure| ShuffleError::Store { run_id, failure })?;

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            %run_id,
            shuffled = progress.committed,
            skipped = progress.skipped,
            batches = progress.batches,
            duration_ms,
            "shuffle run completed"
        );

        Ok(ShuffleReport {
            run_id,
            shuffled_count: progress.committed,
            batch_count: progress.batches,
            duration_ms,
            timestamp: now,
            seed,
            policy: self.cfg.policy.as_str(),
            vacant_squares: plan.vacant_squares,
            message: format!("shuffled {} purchases", progress.committed),
        })
    }

    /// Read-only aggregate over the eligible purchases.
    pub async fn get_shuffle_stats(&self) -> Result<ShuffleStats, StoreError> {
        match self.store.fetch_eligible().await {
            Ok(rows) => Ok(summarize(&rows, &self.cfg.policy)),
            Err(StoreError::CollectionNotFound) => {
                debug!("purchase collection does not exist yet; reporting empty stats");
                Ok(ShuffleStats::default())
            }
            Err(e) => {
                error!(error = %e, "shuffle stats read failed");
                Err(e)
            }
        }
    }

    fn empty_report(
        &self,
        run_id: Uuid,
        now: DateTime<Utc>,
        started: Instant,
        message: &str,
    ) -> ShuffleReport {
        ShuffleReport {
            run_id,
            shuffled_count: 0,
            batch_count: 0,
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: now,
            seed: None,
            policy: self.cfg.policy.as_str(),
            vacant_squares: None,
            message: message.to_string(),
        }
    }
}
