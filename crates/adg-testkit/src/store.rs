//! Deterministic in-memory purchase store.
//!
//! Mirrors the contract of the Postgres adapter: eligible rows come back
//! ordered by id, each `commit_batch` is all-or-nothing, writes for ids that
//! vanished since the snapshot are skipped. No network, no randomness.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use adg_schemas::{PositionWrite, Purchase};
use adg_shuffle::{PurchaseStore, StoreError, DEFAULT_MAX_BATCH_OPS};

#[derive(Debug, Default)]
struct Inner {
    /// `None` = collection not provisioned.
    rows: Option<BTreeMap<String, Purchase>>,
    /// Zero-based commit attempt that should fail.
    fail_commit_at: Option<usize>,
    fail_reads: bool,
    commit_attempts: usize,
    committed_batch_sizes: Vec<usize>,
}

#[derive(Debug)]
pub struct MemoryPurchaseStore {
    inner: Mutex<Inner>,
    max_batch_ops: usize,
}

impl MemoryPurchaseStore {
    pub fn new(rows: impl IntoIterator<Item = Purchase>) -> Self {
        let rows = rows.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self {
            inner: Mutex::new(Inner {
                rows: Some(rows),
                ..Inner::default()
            }),
            max_batch_ops: DEFAULT_MAX_BATCH_OPS,
        }
    }

    /// A store whose collection was never created.
    pub fn missing_collection() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_batch_ops: DEFAULT_MAX_BATCH_OPS,
        }
    }

    pub fn with_max_batch_ops(mut self, n: usize) -> Self {
        self.max_batch_ops = n;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the `n`-th commit attempt (zero-based) fail without applying anything.
    pub fn fail_commit_at(&self, n: usize) {
        self.lock().fail_commit_at = Some(n);
    }

    pub fn fail_reads(&self, on: bool) {
        self.lock().fail_reads = on;
    }

    pub fn insert(&self, p: Purchase) {
        let mut inner = self.lock();
        inner
            .rows
            .get_or_insert_with(BTreeMap::new)
            .insert(p.id.clone(), p);
    }

    pub fn remove(&self, id: &str) {
        if let Some(rows) = self.lock().rows.as_mut() {
            rows.remove(id);
        }
    }

    pub fn purchase(&self, id: &str) -> Option<Purchase> {
        self.lock().rows.as_ref().and_then(|r| r.get(id).cloned())
    }

    /// Every row, eligible or not, ordered by id.
    pub fn purchases(&self) -> Vec<Purchase> {
        self.lock()
            .rows
            .as_ref()
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn committed_batch_sizes(&self) -> Vec<usize> {
        self.lock().committed_batch_sizes.clone()
    }
}

#[async_trait::async_trait]
impl PurchaseStore for MemoryPurchaseStore {
    fn store_name(&self) -> &'static str {
        "memory"
    }

    fn max_batch_ops(&self) -> usize {
        self.max_batch_ops
    }

    async fn fetch_eligible(&self) -> Result<Vec<Purchase>, StoreError> {
        let inner = self.lock();
        if inner.fail_reads {
            return Err(StoreError::Backend("injected read failure".to_string()));
        }
        let rows = inner.rows.as_ref().ok_or(StoreError::CollectionNotFound)?;
        Ok(rows.values().filter(|p| p.is_eligible()).cloned().collect())
    }

    async fn commit_batch(&self, writes: &[PositionWrite]) -> Result<usize, StoreError> {
        let mut inner = self.lock();
        let attempt = inner.commit_attempts;
        inner.commit_attempts += 1;

        if inner.fail_commit_at == Some(attempt) {
            return Err(StoreError::Backend(format!(
                "injected commit failure on attempt {attempt}"
            )));
        }
        if writes.len() > self.max_batch_ops {
            return Err(StoreError::Backend(format!(
                "batch of {} exceeds transaction cap {}",
                writes.len(),
                self.max_batch_ops
            )));
        }

        let rows = inner.rows.as_mut().ok_or(StoreError::CollectionNotFound)?;
        let mut applied = 0;
        for w in writes {
            if let Some(p) = rows.get_mut(&w.purchase_id) {
                applied += 1;
                p.position = Some(w.position);
                if w.page.is_some() {
                    p.page = w.page;
                }
                p.last_shuffled_at = Some(w.shuffled_at);
                p.shuffle_seed = w.seed;
            }
        }
        inner.committed_batch_sizes.push(writes.len());
        Ok(applied)
    }
}
