//! Gateway binary: configuration, backends, sweepers, serve loop

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use kyros_cache::{KvCache, RedisKv};
use kyros_store::{PgStore, PoolConfig};

use kyros_gateway::middleware::rate_limit::{SWEEP_INTERVAL, start_sweeper};
use kyros_gateway::{AppState, GatewayConfig, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::from_env()?;

    let store = Arc::new(PgStore::connect(&config.database_url, PoolConfig::default()).await?);
    tracing::info!("store connected and migrated");

    let kv: Option<Arc<dyn KvCache>> = match &config.redis_url {
        Some(url) => match RedisKv::connect(url).await {
            Ok(kv) => {
                tracing::info!("cache connected");
                Some(Arc::new(kv))
            }
            Err(e) => {
                tracing::warn!(error = %e, "cache unreachable; sessions, state cache and denylist degrade");
                None
            }
        },
        None => {
            tracing::warn!("REDIS_URL not set; sessions, state cache and denylist degrade");
            None
        }
    };

    let port = config.port;
    let state = AppState::build(config, store.clone(), store, kv)?;

    let sweepers = vec![
        start_sweeper("rate-limit", state.limiter.clone(), SWEEP_INTERVAL),
        start_sweeper("mfa-limit", state.mfa_limiter.clone(), SWEEP_INTERVAL),
        start_sweeper("csrf", state.csrf.clone(), SWEEP_INTERVAL),
    ];

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "gateway listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // In-flight requests have drained; join the background tasks.
    for sweeper in sweepers {
        sweeper.stop().await;
    }
    tracing::info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, draining");
}
