//! Under the square policy a grid too small for the eligible set is refused
//! before anything is written.

use std::sync::Arc;

use adg_shuffle::{
    AssignmentPolicy, PurchaseStore, SeedStrategy, ShuffleEngine, ShuffleEngineConfig, SystemClock,
};
use adg_testkit::{eligible_purchases, MemoryPurchaseStore};

#[tokio::test]
async fn more_purchases_than_squares_writes_nothing() {
    let store = Arc::new(MemoryPurchaseStore::new(eligible_purchases(25)));
    let engine = ShuffleEngine::new(
        Arc::clone(&store) as Arc<dyn PurchaseStore>,
        Arc::new(SystemClock),
        ShuffleEngineConfig {
            policy: AssignmentPolicy::SquarePool {
                total_squares: 20,
                page_size: 5,
            },
            seed: SeedStrategy::Entropy,
            batch_limit: 500,
        },
    );

    let err = engine.perform_global_shuffle().await.unwrap_err();

    assert_eq!(err.code(), "CAPACITY_EXCEEDED");
    assert_eq!(err.committed(), 0);
    assert!(store.committed_batch_sizes().is_empty());
    assert!(store.purchases().iter().all(|p| p.position.is_none()));
}
