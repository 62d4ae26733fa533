//! A purchase deleted between the eligibility snapshot and the commit is not
//! counted as shuffled; the reported count matches the rows written.

use std::sync::Arc;

use adg_schemas::{PositionWrite, Purchase};
use adg_shuffle::{
    PurchaseStore, SeedStrategy, ShuffleEngine, ShuffleEngineConfig, StoreError, SystemClock,
};
use adg_testkit::{eligible_purchases, MemoryPurchaseStore};

/// Deletes `victim` from the inner store right after the snapshot is taken.
struct DeleteAfterFetch {
    inner: Arc<MemoryPurchaseStore>,
    victim: &'static str,
}

#[async_trait::async_trait]
impl PurchaseStore for DeleteAfterFetch {
    fn store_name(&self) -> &'static str {
        "delete-after-fetch"
    }

    fn max_batch_ops(&self) -> usize {
        self.inner.max_batch_ops()
    }

    async fn fetch_eligible(&self) -> Result<Vec<Purchase>, StoreError> {
        let snapshot = self.inner.fetch_eligible().await?;
        self.inner.remove(self.victim);
        Ok(snapshot)
    }

    async fn commit_batch(&self, writes: &[PositionWrite]) -> Result<usize, StoreError> {
        self.inner.commit_batch(writes).await
    }
}

fn engine(store: Arc<dyn PurchaseStore>, batch_limit: usize) -> ShuffleEngine {
    ShuffleEngine::new(
        store,
        Arc::new(SystemClock),
        ShuffleEngineConfig {
            seed: SeedStrategy::Fixed(5),
            batch_limit,
            ..ShuffleEngineConfig::default()
        },
    )
}

#[tokio::test]
async fn removed_purchase_is_not_counted() {
    let inner = Arc::new(MemoryPurchaseStore::new(eligible_purchases(10)));
    let store = Arc::new(DeleteAfterFetch {
        inner: Arc::clone(&inner),
        victim: "sq-00000",
    });

    let report = engine(store, 500).perform_global_shuffle().await.unwrap();

    let rows = inner.purchases();
    assert_eq!(rows.len(), 9);
    assert!(inner.purchase("sq-00000").is_none());
    assert!(rows.iter().all(|p| p.position.is_some()));
    assert_eq!(report.shuffled_count, rows.len());
    assert_eq!(report.batch_count, 1);
}

#[tokio::test]
async fn count_stays_exact_across_chunks() {
    let inner = Arc::new(MemoryPurchaseStore::new(eligible_purchases(25)));
    let store = Arc::new(DeleteAfterFetch {
        inner: Arc::clone(&inner),
        victim: "sq-00013",
    });

    let report = engine(store, 10).perform_global_shuffle().await.unwrap();

    assert_eq!(inner.committed_batch_sizes(), vec![10, 10, 5]);
    assert_eq!(report.batch_count, 3);
    assert_eq!(report.shuffled_count, 24);
    assert_eq!(
        inner
            .purchases()
            .iter()
            .filter(|p| p.position.is_some())
            .count(),
        24
    );
}

#[tokio::test]
async fn next_run_closes_the_gap() {
    let inner = Arc::new(MemoryPurchaseStore::new(eligible_purchases(10)));
    let store = Arc::new(DeleteAfterFetch {
        inner: Arc::clone(&inner),
        victim: "sq-00004",
    });
    engine(store, 500).perform_global_shuffle().await.unwrap();

    let direct = engine(Arc::clone(&inner) as Arc<dyn PurchaseStore>, 500);
    let report = direct.perform_global_shuffle().await.unwrap();
    assert_eq!(report.shuffled_count, 9);

    let stats = direct.get_shuffle_stats().await.unwrap();
    assert_eq!(stats.total_eligible, 9);
    assert_eq!(stats.needs_shuffle, 0);
}
