//! Purchases that exist but are cancelled, unpaid or have nothing to show are
//! not shuffled and keep whatever position they had.

use std::sync::Arc;

use adg_schemas::{PaymentStatus, PurchaseStatus};
use adg_shuffle::{PurchaseStore, ShuffleEngine, ShuffleEngineConfig, SystemClock};
use adg_testkit::{purchase_with, MemoryPurchaseStore};

#[tokio::test]
async fn no_eligible_purchases_means_no_writes() -> anyhow::Result<()> {
    let mut cancelled = purchase_with(
        "a",
        PurchaseStatus::Cancelled,
        PaymentStatus::Paid,
        Some("logos/a.png"),
    );
    cancelled.position = Some(3);
    let mut no_logo = purchase_with("b", PurchaseStatus::Active, PaymentStatus::Paid, None);
    no_logo.position = Some(7);
    let mut blank_logo = purchase_with("c", PurchaseStatus::Active, PaymentStatus::Paid, Some("  "));
    blank_logo.position = Some(11);

    let store = Arc::new(MemoryPurchaseStore::new(vec![cancelled, no_logo, blank_logo]));
    let before = store.purchases();

    let engine = ShuffleEngine::new(
        Arc::clone(&store) as Arc<dyn PurchaseStore>,
        Arc::new(SystemClock),
        ShuffleEngineConfig::default(),
    );
    let report = engine.perform_global_shuffle().await?;

    assert_eq!(report.shuffled_count, 0);
    assert_eq!(report.batch_count, 0);
    assert_eq!(store.purchases(), before);
    assert!(store.committed_batch_sizes().is_empty());

    let stats = engine.get_shuffle_stats().await?;
    assert_eq!(stats.total_eligible, 0);
    Ok(())
}
