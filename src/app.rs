/*
 * Responsibility
 * - Config → dependencies → Router
 * - HTTP-level middleware (request id, trace, CORS, limits)
 * - background sweep of the rate-limit table
 * - axum::serve() with peer addresses and graceful shutdown
 */
use std::{net::SocketAddr, panic, process, sync::Arc};

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::{self, handlers::health::health};
use crate::config::Config;
use crate::error::AppError;
use crate::middleware::{self, PipelineError, http::HttpLimits};
use crate::repos::{InMemoryPostStore, PgPostStore};
use crate::services::rate_limit::RateLimiter;
use crate::state::AppState;

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,posts_api=debug,tower_http=debug cargo run
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
        // Surface panics through tracing so they are not lost with stderr.
        tracing::error!(?info, "panic");

        // Development: crash so it gets noticed. Production: default hook, keep serving.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env().context("loading configuration")?;
    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting API in {:?} mode on {}",
        config.app_env,
        config.addr
    );
    tracing::debug!(?config, "configuration loaded");

    let state = build_state(&config).await?;
    let limits = state.rate_limiter.config();
    tracing::info!(
        max_requests = limits.max_requests,
        window_secs = limits.window.as_secs(),
        ownership_match = ?state.ownership.policy(),
        "request gates configured"
    );

    let sweeper = spawn_rate_limit_sweeper(state.rate_limiter.clone(), &config);
    let app = build_router(state, &config).context("building routes")?;

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    tracing::info!("server stopped");
    Ok(())
}

async fn build_state(config: &Config) -> Result<AppState> {
    let state = match config.database_url.as_deref() {
        Some(url) => {
            let store = PgPostStore::connect(url)
                .await
                .context("connecting to DATABASE_URL")?;
            tracing::info!("using Postgres post store");
            AppState::new(Arc::new(store), config)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; posts are kept in memory and lost on restart");
            AppState::new(Arc::new(InMemoryPostStore::new()), config)
        }
    };

    Ok(state)
}

/// Periodically drop rate-limit entries whose window has passed.
fn spawn_rate_limit_sweeper(limiter: Arc<RateLimiter>, config: &Config) -> JoinHandle<()> {
    let every = config.rate_limit_sweep_interval;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = limiter.sweep_expired();
            if removed > 0 {
                tracing::debug!(
                    removed,
                    remaining = limiter.tracked_clients(),
                    "swept expired rate-limit entries"
                );
            }
        }
    })
}

/// Fails only if a route's gate pipeline is misordered.
pub fn build_router(state: AppState, config: &Config) -> Result<Router, PipelineError> {
    let router = Router::new()
        .route("/health", get(health))
        .nest("/api", api::routes(&state)?)
        .fallback(route_not_found)
        .with_state(state);

    let router = middleware::cors::apply(router, config);
    Ok(middleware::http::apply(
        router,
        HttpLimits {
            body_limit_bytes: config.body_limit_bytes,
            timeout: config.request_timeout,
        },
    ))
}

async fn route_not_found() -> AppError {
    AppError::RouteNotFound
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
