use anyhow::Result;
use axum::serve;
use gateway_core::{
    client::BackendClient,
    config::AppConfig,
    metrics,
    monitor::UptimeMonitor,
    service::GatewayService,
    store::SqliteStore,
    trust::{
        http::HttpTrustSource,
        resync::{resync_with_backoff, BackoffPolicy, TrustResync},
        TrustSource,
    },
};
use rustls::crypto::{ring::default_provider, CryptoProvider};
use server::{create_app, AppState};
use std::{net::SocketAddr, path::Path, sync::Arc};
use tokio::{signal, sync::broadcast};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging(config: &AppConfig) {
    let default_directives = |level: &str| {
        format!("warn,gateway_core={level},server={level},tower_http={level}")
    };

    let filter = match std::env::var("RUST_LOG") {
        Ok(value) if value == "debug" || value == "trace" => {
            EnvFilter::new(default_directives(&value))
        }
        Ok(_) => EnvFilter::try_from_env("RUST_LOG")
            .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.logging.level))),
        Err(_) => EnvFilter::new(default_directives(&config.logging.level)),
    };

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format.as_str() == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).init();
    }
}

/// `sqlite://./db/gateway.db` needs `./db` to exist before the first connect.
fn ensure_database_dir(database_url: &str) -> Result<()> {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);

    if path.starts_with(':') {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    CryptoProvider::install_default(default_provider())
        .map_err(|e| anyhow::anyhow!("Failed to install crypto provider: {e:?}"))?;

    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("Configuration load failed: {e}"))?;
    config.validate().map_err(|e| anyhow::anyhow!("Configuration validation failed: {e}"))?;

    init_logging(&config);
    info!(environment = %config.environment, "Starting validator gateway");
    debug!(
        netuid = config.trust.netuid,
        allowlist = config.pool.allowlist.len(),
        rate_limit = config.rate_limit.limit,
        rate_window_seconds = config.rate_limit.window_seconds,
        "Configuration loaded"
    );

    let metrics_handle = metrics::install_recorder();

    ensure_database_dir(&config.store.database_url)?;
    let store = Arc::new(
        SqliteStore::connect(&config.store.database_url, config.store.max_connections)
            .await
            .map_err(|e| anyhow::anyhow!("Store init failed: {e}"))?,
    );
    store.migrate().await.map_err(|e| anyhow::anyhow!("Store migration failed: {e}"))?;

    let trust: Arc<dyn TrustSource> = Arc::new(
        HttpTrustSource::new(config.trust.clone())
            .map_err(|e| anyhow::anyhow!("Trust source init failed: {e}"))?,
    );
    let backoff = BackoffPolicy::from_config(&config.trust);
    let roster_size = resync_with_backoff(trust.as_ref(), &backoff)
        .await
        .map_err(|e| anyhow::anyhow!("Initial trust sync failed: {e}"))?;
    info!(roster_size, "Trust roster loaded");

    let client = Arc::new(
        BackendClient::new(config.server.max_concurrent_requests)
            .map_err(|e| anyhow::anyhow!("Backend client init failed: {e}"))?,
    );
    let service =
        Arc::new(GatewayService::new(&config, store.clone(), trust.clone(), client));

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let pool_handle = service.pool_manager().start_with_shutdown(shutdown_tx.subscribe());
    let trust_handle = TrustResync::new(trust, config.trust_resync_interval(), backoff)
        .start_with_shutdown(shutdown_tx.subscribe());

    let uptime_handle = match config.auth.root_api_key.clone().filter(|_| config.uptime.enabled) {
        Some(root_token) => {
            let monitor = Arc::new(UptimeMonitor::new(
                service.clone(),
                root_token,
                config.uptime_interval(),
                config.uptime.context_chars,
                config.uptime.tier.clone(),
                config.uptime.target_model.clone(),
            ));
            Some(monitor.start_with_shutdown(shutdown_tx.subscribe()))
        }
        None => None,
    };

    let app = create_app(AppState { service, metrics: metrics_handle }, &config);
    let addr: SocketAddr = config.socket_addr().map_err(|e| anyhow::anyhow!(e))?;
    info!(address = %addr, "Gateway listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    if let Err(e) = serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server error occurred");
    }

    let _ = shutdown_tx.send(());
    let _ = pool_handle.await;
    if let Some(handle) = uptime_handle {
        let _ = handle.await;
    }
    match trust_handle.await {
        Ok(Err(e)) => error!(error = %e, "Trust resync had stopped before shutdown"),
        Err(e) => error!(error = %e, "Trust resync task panicked"),
        Ok(Ok(())) => {}
    }

    store.close().await;
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                () = std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
