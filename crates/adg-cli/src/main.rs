use std::sync::Arc;

use adg_config::{
    load_layered_yaml, report_unused_keys, LoadedConfig, ShuffleSettings, UnusedKeyPolicy,
};
use adg_db::PgPurchaseStore;
use adg_shuffle::{ShuffleEngine, SystemClock};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "adg")]
#[command(about = "Advertising grid shuffle CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> environment overrides)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Validate layered config and list unused keys
    ConfigCheck {
        #[arg(required = true)]
        paths: Vec<String>,

        /// Fail instead of warn when unused keys are present
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Shuffle commands (cron-friendly; no cooldown applies)
    Shuffle {
        #[command(subcommand)]
        cmd: ShuffleCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    /// Apply embedded SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum ShuffleCmd {
    /// Run one global shuffle now
    Run {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },

    /// Print eligible / positioned / needs-shuffle counts
    Stats {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },
}

fn load(paths: &[String]) -> Result<(LoadedConfig, ShuffleSettings)> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = load_layered_yaml(&path_refs)?;
    let settings = ShuffleSettings::from_config_json(&loaded.config_json)?;
    Ok((loaded, settings))
}

async fn engine_from(settings: &ShuffleSettings) -> Result<ShuffleEngine> {
    let pool = adg_db::connect_from_env().await?;
    Ok(ShuffleEngine::new(
        Arc::new(PgPurchaseStore::new(pool)),
        Arc::new(SystemClock),
        settings.engine_config(),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");

    // Logs go to stderr; stdout carries key=value results.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = adg_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = adg_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_purchases_table={}",
                        s.ok, s.has_purchases_table
                    );
                }
                DbCmd::Migrate => {
                    adg_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::ConfigCheck { paths, strict } => {
            let (loaded, settings) = load(&paths)?;
            let policy = if strict {
                UnusedKeyPolicy::Fail
            } else {
                UnusedKeyPolicy::Warn
            };
            let report = report_unused_keys(&loaded.config_json, policy)?;
            let engine = settings.engine_config();
            println!("config_hash={}", loaded.config_hash);
            println!("policy={}", engine.policy.as_str());
            println!("seed={}", engine.seed.as_str());
            println!("batch_limit={}", engine.batch_limit);
            println!("schedule_enabled={}", settings.schedule.enabled);
            for key in &report.unused_leaf_pointers {
                println!("unused_key={key}");
            }
        }

        Commands::Shuffle { cmd } => match cmd {
            ShuffleCmd::Run { config_paths } => {
                let (_, settings) = load(&config_paths)?;
                let engine = engine_from(&settings).await?;
                match engine.perform_global_shuffle().await {
                    Ok(r) => {
                        println!("run_id={}", r.run_id);
                        println!("shuffled_count={}", r.shuffled_count);
                        println!("batches={}", r.batch_count);
                        println!("duration_ms={}", r.duration_ms);
                        println!("policy={}", r.policy);
                        if let Some(seed) = r.seed {
                            println!("seed={seed}");
                        }
                        if let Some(v) = r.vacant_squares {
                            println!("vacant_squares={v}");
                        }
                    }
                    Err(e) => {
                        println!("run_id={}", e.run_id());
                        println!("shuffled_count={}", e.committed());
                        println!("batches={}", e.batches_committed());
                        return Err(e).context("shuffle run failed");
                    }
                }
            }
            ShuffleCmd::Stats { config_paths } => {
                let (_, settings) = load(&config_paths)?;
                let engine = engine_from(&settings).await?;
                let s = engine
                    .get_shuffle_stats()
                    .await
                    .context("shuffle stats failed")?;
                println!("{}", serde_json::to_string_pretty(&s)?);
            }
        },
    }

    Ok(())
}
