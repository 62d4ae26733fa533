//! Postgres persistence for purchased squares.
//!
//! - connection / migration / status helpers for the binaries
//! - [`PgPurchaseStore`], the production [`PurchaseStore`]
//! - row helpers used by the CLI and DB-backed tests

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, warn};

use adg_schemas::{PaymentStatus, PositionWrite, Purchase, PurchaseStatus};
use adg_shuffle::{PurchaseStore, StoreError, DEFAULT_MAX_BATCH_OPS};

pub const ENV_DB_URL: &str = "ADG_DATABASE_URL";

const PURCHASES_TABLE: &str = "purchased_squares";

/// Postgres SQLSTATE for `undefined_table`.
const SQLSTATE_UNDEFINED_TABLE: &str = "42P01";

/// Connect to Postgres using ADG_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_purchases_table: bool,
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let exists = purchases_table_exists(pool)
        .await
        .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_purchases_table: exists,
    })
}

async fn purchases_table_exists(pool: &PgPool) -> Result<bool, sqlx::Error> {
    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema = current_schema() and table_name = $1
        )
        "#,
    )
    .bind(PURCHASES_TABLE)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

/// Insert or replace one purchase row (position fields included).
pub async fn upsert_purchase(pool: &PgPool, p: &Purchase) -> Result<()> {
    sqlx::query(
        r#"
        insert into purchased_squares (
          id, status, payment_status, logo_ref, position, page, last_shuffled_at, shuffle_seed
        ) values (
          $1, $2, $3, $4, $5, $6, $7, $8
        )
        on conflict (id) do update set
          status = excluded.status,
          payment_status = excluded.payment_status,
          logo_ref = excluded.logo_ref,
          position = excluded.position,
          page = excluded.page,
          last_shuffled_at = excluded.last_shuffled_at,
          shuffle_seed = excluded.shuffle_seed
        "#,
    )
    .bind(&p.id)
    .bind(p.status.as_str())
    .bind(p.payment_status.as_str())
    .bind(&p.logo_ref)
    .bind(p.position)
    .bind(p.page)
    .bind(p.last_shuffled_at)
    .bind(p.shuffle_seed)
    .execute(pool)
    .await
    .with_context(|| format!("upsert_purchase failed id={}", p.id))?;
    Ok(())
}

pub async fn fetch_purchase(pool: &PgPool, id: &str) -> Result<Option<Purchase>> {
    let row = sqlx::query(
        r#"
        select id, status, payment_status, logo_ref, position, page, last_shuffled_at, shuffle_seed
        from purchased_squares
        where id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("fetch_purchase failed")?;

    row.as_ref().map(purchase_from_row).transpose()
}

pub async fn delete_purchase(pool: &PgPool, id: &str) -> Result<bool> {
    let res = sqlx::query("delete from purchased_squares where id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("delete_purchase failed")?;
    Ok(res.rows_affected() > 0)
}

fn purchase_from_row(row: &PgRow) -> Result<Purchase> {
    let status: String = row.try_get("status")?;
    let payment_status: String = row.try_get("payment_status")?;
    let last_shuffled_at: Option<DateTime<Utc>> = row.try_get("last_shuffled_at")?;

    Ok(Purchase {
        id: row.try_get("id")?,
        status: PurchaseStatus::parse(&status)?,
        payment_status: PaymentStatus::parse(&payment_status)?,
        logo_ref: row.try_get("logo_ref")?,
        position: row.try_get("position")?,
        page: row.try_get("page")?,
        last_shuffled_at,
        shuffle_seed: row.try_get("shuffle_seed")?,
    })
}

// ---------------------------------------------------------------------------
// PurchaseStore adapter
// ---------------------------------------------------------------------------

fn store_error(op: &str, e: sqlx::Error) -> StoreError {
    let undefined_table = e
        .as_database_error()
        .and_then(|d| d.code())
        .map(|c| c == SQLSTATE_UNDEFINED_TABLE)
        .unwrap_or(false);
    if undefined_table {
        StoreError::CollectionNotFound
    } else {
        StoreError::Backend(format!("{op}: {e}"))
    }
}

/// Postgres-backed purchase store. One transaction per `commit_batch`.
#[derive(Debug, Clone)]
pub struct PgPurchaseStore {
    pool: PgPool,
    max_batch_ops: usize,
}

impl PgPurchaseStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            max_batch_ops: DEFAULT_MAX_BATCH_OPS,
        }
    }

    pub fn with_max_batch_ops(mut self, n: usize) -> Self {
        self.max_batch_ops = n.max(1);
        self
    }
}

#[async_trait::async_trait]
impl PurchaseStore for PgPurchaseStore {
    fn store_name(&self) -> &'static str {
        "postgres"
    }

    fn max_batch_ops(&self) -> usize {
        self.max_batch_ops
    }

    async fn fetch_eligible(&self) -> Result<Vec<Purchase>, StoreError> {
        let exists = purchases_table_exists(&self.pool)
            .await
            .map_err(|e| store_error("fetch_eligible table check", e))?;
        if !exists {
            return Err(StoreError::CollectionNotFound);
        }

        let rows = sqlx::query(
            r#"
            select id, status, payment_status, logo_ref, position, page, last_shuffled_at, shuffle_seed
            from purchased_squares
            where status = 'active'
              and payment_status = 'paid'
              and logo_ref is not null
              and btrim(logo_ref) <> ''
            order by id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("fetch_eligible", e))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let p = purchase_from_row(row)
                .map_err(|e| StoreError::Backend(format!("fetch_eligible decode: {e:#}")))?;
            out.push(p);
        }
        debug!(count = out.len(), "fetched eligible purchases");
        Ok(out)
    }

    async fn commit_batch(&self, writes: &[PositionWrite]) -> Result<usize, StoreError> {
        if writes.len() > self.max_batch_ops {
            return Err(StoreError::Backend(format!(
                "batch of {} exceeds transaction cap {}",
                writes.len(),
                self.max_batch_ops
            )));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("commit_batch begin", e))?;

        let mut applied = 0usize;
        for w in writes {
            // Index policy writes no page; keep whatever is stored.
            let res = sqlx::query(
                r#"
                update purchased_squares
                set position = $2,
                    page = coalesce($3, page),
                    last_shuffled_at = $4,
                    shuffle_seed = $5
                where id = $1
                "#,
            )
            .bind(&w.purchase_id)
            .bind(w.position)
            .bind(w.page)
            .bind(w.shuffled_at)
            .bind(w.seed)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("commit_batch update", e))?;

            if res.rows_affected() == 0 {
                warn!(purchase_id = %w.purchase_id, "purchase vanished since snapshot; write skipped");
            } else {
                applied += 1;
            }
        }

        tx.commit()
            .await
            .map_err(|e| store_error("commit_batch commit", e))?;
        Ok(applied)
    }
}
