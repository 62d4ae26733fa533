use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::PathBuf;
use std::process::Command;

fn config_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("config")
}

fn path_str(p: PathBuf) -> String {
    p.to_string_lossy().to_string()
}

#[test]
fn config_hash_prints_hash_and_canonical_json() -> anyhow::Result<()> {
    let base = path_str(config_dir().join("base.yaml"));

    Command::cargo_bin("adg")?
        .args(["config-hash", &base])
        .assert()
        .success()
        .stdout(predicate::str::is_match("config_hash=[0-9a-f]{64}")?)
        .stdout(predicate::str::contains("\"admin_key_env\":\"ADG_ADMIN_API_KEY\""));
    Ok(())
}

#[test]
fn config_check_reports_layered_settings() -> anyhow::Result<()> {
    let base = path_str(config_dir().join("base.yaml"));
    let prod = path_str(config_dir().join("environments").join("production.yaml"));

    Command::cargo_bin("adg")?
        .args(["config-check", "--strict", &base, &prod])
        .assert()
        .success()
        .stdout(predicate::str::contains("policy=square_pool"))
        .stdout(predicate::str::contains("seed=time_bucket"))
        .stdout(predicate::str::contains("schedule_enabled=true"))
        .stdout(predicate::str::contains("unused_key=").not());
    Ok(())
}

#[test]
fn config_hash_requires_paths() -> anyhow::Result<()> {
    Command::cargo_bin("adg")?
        .args(["config-hash"])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn config_with_literal_secret_is_refused() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("leaky.yaml");
    std::fs::write(&path, "auth:\n  admin_key_env: \"sk_live_0123456789abcdef\"\n")?;

    Command::cargo_bin("adg")?
        .args(["config-hash", &path_str(path)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_SECRET_DETECTED"))
        .stderr(predicate::str::contains("0123456789abcdef").not());
    Ok(())
}
