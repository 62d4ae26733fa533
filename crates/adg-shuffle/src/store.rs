use std::fmt;

use adg_schemas::{PositionWrite, Purchase};

/// Typical document-store cap on mutations per atomic transaction.
pub const DEFAULT_MAX_BATCH_OPS: usize = 500;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum StoreError {
    /// The purchase collection has not been provisioned yet. Callers treat
    /// this as "no purchases", never as a failure.
    CollectionNotFound,
    /// Any other backend failure (connection, constraint, timeout, ...).
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::CollectionNotFound => write!(f, "purchase collection not found"),
            StoreError::Backend(msg) => write!(f, "purchase store error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// Store contract
// ---------------------------------------------------------------------------

/// Purchase store as seen by the shuffle engine.
///
/// Object-safe so the engine and the daemon hold an `Arc<dyn PurchaseStore>`.
#[async_trait::async_trait]
pub trait PurchaseStore: Send + Sync {
    fn store_name(&self) -> &'static str;

    /// Largest number of writes `commit_batch` accepts in one transaction.
    fn max_batch_ops(&self) -> usize;

    /// Active + paid + displayable purchases, in a stable order.
    async fn fetch_eligible(&self) -> Result<Vec<Purchase>, StoreError>;

    /// Apply every write in `writes` atomically, or none of them.
    ///
    /// Returns how many rows were updated. Writes for purchases deleted since
    /// `fetch_eligible` match no row and are not counted.
    async fn commit_batch(&self, writes: &[PositionWrite]) -> Result<usize, StoreError>;
}
