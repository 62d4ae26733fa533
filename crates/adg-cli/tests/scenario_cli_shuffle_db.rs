use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

/// `adg db migrate`, `adg shuffle run` and `adg shuffle stats` end to end.
///
/// DB-backed test, skipped if ADG_DATABASE_URL is not set.
#[tokio::test]
async fn cli_shuffle_run_positions_eligible_rows() -> anyhow::Result<()> {
    let url = match std::env::var(adg_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: ADG_DATABASE_URL not set");
            return Ok(());
        }
    };

    Command::cargo_bin("adg")?
        .env(adg_db::ENV_DB_URL, &url)
        .args(["db", "migrate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("migrations_applied=true"));

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await?;

    let id = format!("cli-{}", std::process::id());
    adg_db::upsert_purchase(
        &pool,
        &adg_schemas::Purchase {
            id: id.clone(),
            status: adg_schemas::PurchaseStatus::Active,
            payment_status: adg_schemas::PaymentStatus::Paid,
            logo_ref: Some("logos/cli.png".to_string()),
            position: None,
            page: None,
            last_shuffled_at: None,
            shuffle_seed: None,
        },
    )
    .await?;

    let base = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../config/base.yaml")
        .to_string_lossy()
        .to_string();

    Command::cargo_bin("adg")?
        .env(adg_db::ENV_DB_URL, &url)
        .args(["shuffle", "run", "--config", &base])
        .assert()
        .success()
        .stdout(predicate::str::contains("policy=ordering_index"))
        .stdout(predicate::str::contains("shuffled_count="));

    let row = adg_db::fetch_purchase(&pool, &id).await?.expect("row exists");
    assert!(row.position.is_some());
    assert!(row.last_shuffled_at.is_some());

    Command::cargo_bin("adg")?
        .env(adg_db::ENV_DB_URL, &url)
        .args(["shuffle", "stats", "--config", &base])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"totalEligible\""));

    adg_db::delete_purchase(&pool, &id).await?;
    Ok(())
}
