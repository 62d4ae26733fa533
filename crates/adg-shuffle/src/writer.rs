//! Chunked persistence of a shuffle plan.
//!
//! Chunks are committed one after another in plan order. Each chunk is atomic;
//! the run as a whole is not. A failed chunk stops the run and nothing already
//! committed is rolled back.

use std::fmt;

use adg_schemas::PositionWrite;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::store::{PurchaseStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// Rows actually updated.
    pub committed: usize,
    pub batches: usize,
    /// Planned writes whose purchase no longer existed at commit time.
    pub skipped: usize,
}

#[derive(Debug)]
pub struct BatchFailure {
    /// Records durably written before the failing chunk.
    pub committed: usize,
    pub batches_committed: usize,
    /// Zero-based index of the chunk that failed.
    pub chunk_index: usize,
    pub source: StoreError,
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch {} failed after {} records in {} batches: {}",
            self.chunk_index + 1,
            self.committed,
            self.batches_committed,
            self.source
        )
    }
}

impl std::error::Error for BatchFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Effective chunk size: the configured limit, capped by the store, at least 1.
pub fn effective_batch_size(configured: usize, store_cap: usize) -> usize {
    configured.min(store_cap).max(1)
}

pub async fn commit_in_batches(
    store: &dyn PurchaseStore,
    writes: &[PositionWrite],
    batch_limit: usize,
    run_id: Uuid,
) -> Result<BatchProgress, BatchFailure> {
    let size = effective_batch_size(batch_limit, store.max_batch_ops());
    let total = writes.len();
    let mut progress = BatchProgress {
        committed: 0,
        batches: 0,
        skipped: 0,
    };

    for (chunk_index, chunk) in writes.chunks(size).enumerate() {
        let applied = match store.commit_batch(chunk).await {
            Ok(n) => n.min(chunk.len()),
            Err(e) => {
                error!(
                    %run_id,
                    store = store.store_name(),
                    chunk = chunk_index + 1,
                    committed = progress.committed,
                    total,
                    error = %e,
                    "shuffle batch commit failed; remaining batches skipped"
                );
                return Err(BatchFailure {
                    committed: progress.committed,
                    batches_committed: progress.batches,
                    chunk_index,
                    source: e,
                });
            }
        };

        let skipped = chunk.len() - applied;
        progress.batches += 1;
        progress.committed += applied;
        progress.skipped += skipped;
        if skipped > 0 {
            warn!(
                %run_id,
                chunk = progress.batches,
                skipped,
                "purchases removed since snapshot; their writes were dropped"
            );
        }
        info!(
            %run_id,
            chunk = progress.batches,
            records = applied,
            committed = progress.committed,
            total,
            "shuffle batch committed"
        );
    }

    Ok(progress)
}
