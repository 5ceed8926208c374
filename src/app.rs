/*
 * Responsibility
 * - tracing / panic hook の初期化
 * - Config読み込み → 依存生成 (SqlitePool, KeyCache, AuthGuard) → Router 組み立て
 * - HTTP middleware の適用
 * - axum::serve() で起動
 */
use std::{panic, process, str::FromStr, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    api,
    config::Config,
    middleware,
    repos::drink_repo,
    services::auth::{build_auth_guard, key_resolver::KeyCache},
    state::AppState,
};

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,coffee_shop_api=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // development: crash the whole process so we notice immediately.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;
    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        issuer = %config.auth_issuer,
        jwks_url = %config.auth_jwks_url,
        "starting coffee shop API in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("bind {}", config.addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn connect(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("invalid DATABASE_URL: {database_url}"))?
        .create_if_missing(true);

    let db = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("connect to database")?;

    Ok(db)
}

async fn build_state(config: &Config) -> Result<AppState> {
    let db = connect(&config.database_url).await?;

    if config.db_reset_on_start {
        let seeded = drink_repo::reset(&db).await?;
        tracing::warn!(drink_id = seeded.id, "database reset and seeded");
    } else {
        drink_repo::ensure_schema(&db).await?;
    }

    // Process-wide: every request resolves keys against the same cache.
    let keys = Arc::new(KeyCache::new());
    let auth = build_auth_guard(config, keys)?;

    Ok(AppState::new(db, auth))
}

fn build_router(state: AppState, config: &Config) -> Router {
    let router = api::routes(&state).with_state(state);

    middleware::http::apply(router, config)
}
