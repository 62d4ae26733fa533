//! The schedule task shuffles on its interval, not at spawn time.

use std::sync::Arc;
use std::time::Duration;

use adg_daemon::state::spawn_shuffle_schedule;
use adg_shuffle::{ShuffleEngine, ShuffleEngineConfig, SystemClock};
use adg_testkit::{eligible_purchases, MemoryPurchaseStore};

#[tokio::test(start_paused = true)]
async fn schedule_runs_once_per_interval() {
    let store = Arc::new(MemoryPurchaseStore::new(eligible_purchases(8)));
    let engine = Arc::new(ShuffleEngine::new(
        store.clone(),
        Arc::new(SystemClock),
        ShuffleEngineConfig::default(),
    ));

    let task = spawn_shuffle_schedule(engine, Duration::from_secs(7200));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(store.committed_batch_sizes().is_empty());

    tokio::time::sleep(Duration::from_secs(7200)).await;
    assert_eq!(store.committed_batch_sizes(), vec![8]);
    assert!(store.purchases().iter().all(|p| p.position.is_some()));

    tokio::time::sleep(Duration::from_secs(7200)).await;
    assert_eq!(store.committed_batch_sizes(), vec![8, 8]);

    task.abort();
}
