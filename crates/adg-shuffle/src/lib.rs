//! adg-shuffle
//!
//! Periodic reshuffle of advertising squares.
//!
//! - `permutation`: Fisher-Yates over an entropy or seeded source
//! - `assignment`: ordering-index or square-pool position assignment
//! - `writer`: sequential, size-bounded atomic batch commits
//! - `cooldown`: per-identity trigger cooldown with bounded memory
//! - `stats`: eligible / positioned / needs-shuffle counts
//! - `engine`: one run from snapshot to final commit
//!
//! The store is reached only through [`PurchaseStore`]; time only through [`Clock`].

pub mod assignment;
pub mod clock;
pub mod cooldown;
pub mod engine;
pub mod permutation;
pub mod stats;
pub mod store;
pub mod writer;

pub use assignment::{
    page_for, plan_assignments, AssignmentPlan, AssignmentPolicy, CapacityExceeded,
    DEFAULT_PAGE_SIZE, DEFAULT_TOTAL_SQUARES,
};
pub use clock::{Clock, SystemClock};
pub use cooldown::{CooldownCheck, CooldownTracker, DEFAULT_COOLDOWN, DEFAULT_MAX_ENTRIES};
pub use engine::{ShuffleEngine, ShuffleEngineConfig, ShuffleError, ShuffleReport};
pub use permutation::{
    fisher_yates, shuffle_in_place, time_bucket_seed, EntropySource, RandomSource, SeedStrategy,
    SeededSource, DEFAULT_SEED_INTERVAL,
};
pub use stats::summarize;
pub use store::{PurchaseStore, StoreError, DEFAULT_MAX_BATCH_OPS};
pub use writer::{commit_in_batches, effective_batch_size, BatchFailure, BatchProgress};
