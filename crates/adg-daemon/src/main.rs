//! adg-daemon entry point.
//!
//! Thin on purpose: tracing, config, database, shared state, middleware,
//! then the HTTP server. Handlers live in `routes.rs`; state in `state.rs`.

use std::{net::SocketAddr, sync::Arc};

use adg_config::{
    load_layered_yaml, report_unused_keys, resolve_secrets, ShuffleSettings, UnusedKeyPolicy,
};
use adg_daemon::{routes, state};
use adg_db::PgPurchaseStore;
use adg_shuffle::{ShuffleEngine, SystemClock};
use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

const ENV_DAEMON_ADDR: &str = "ADG_DAEMON_ADDR";
const ENV_CONFIG: &str = "ADG_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/base.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths = config_paths_from_env();
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&path_refs).context("load config")?;
    let unused = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for key in &unused.unused_leaf_pointers {
        warn!(key = %key, "unused config key");
    }
    let settings = ShuffleSettings::from_config_json(&loaded.config_json)?;
    info!(config_hash = %loaded.config_hash, paths = ?paths, "config loaded");

    let secrets = resolve_secrets(&loaded.config_json);
    if secrets.admin_api_key.is_none() {
        warn!(
            env = %secrets.admin_key_env,
            "admin api key not set; admin routes will refuse every request"
        );
    }

    let pool = adg_db::connect_from_env().await?;
    let store = PgPurchaseStore::new(pool);
    let engine = Arc::new(ShuffleEngine::new(
        Arc::new(store),
        Arc::new(SystemClock),
        settings.engine_config(),
    ));

    if settings.schedule.enabled {
        info!(interval_secs = settings.schedule.interval_secs, "scheduled shuffle enabled");
        state::spawn_shuffle_schedule(Arc::clone(&engine), settings.schedule_interval());
    }

    let shared = Arc::new(state::AppState::new(engine, &settings, &secrets));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_from_settings(&settings));

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8787)));
    info!("adg-daemon listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var(ENV_DAEMON_ADDR).ok()?.parse().ok()
}

/// `ADG_CONFIG` is a comma-separated list; later files override earlier ones.
fn config_paths_from_env() -> Vec<String> {
    let raw = std::env::var(ENV_CONFIG).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn cors_from_settings(settings: &ShuffleSettings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .http
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "ctrl-c handler unavailable; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
