use anyhow::Context;
use domain::Hooks;
use dotenvy::dotenv;
use hub::{Dispatcher, HttpTransport, Observer};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use server::config::Settings;
use server::{build_router, AppState, ApplyEngine};
use storage::Db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::new().context("Failed to load configuration")?;

    let db = Db::new(&settings.database.url).await?;
    let hooks = Arc::new(Hooks::new());

    let transport = HttpTransport::new(Duration::from_secs(settings.hub.push_timeout_secs))
        .context("Failed to build push transport")?;
    let dispatcher = Dispatcher::new(Arc::new(transport), hooks.clone(), settings.hub.max_in_flight);
    let observer = Observer::new(db.clone(), dispatcher, hooks.clone());

    let (tx_notify, rx_notify) = mpsc::channel(settings.hub.queue_capacity.max(1));
    let cancel_token = CancellationToken::new();

    let worker_token = cancel_token.clone();
    let worker = tokio::spawn(async move {
        if let Err(e) = hub::start(observer, rx_notify, worker_token).await {
            error!("Hub worker crashed: {:?}", e);
        }
    });

    let state = AppState {
        engine: ApplyEngine::new(db.clone(), hooks, settings.apply.meta_denylist.clone()),
        db,
        notifier: tx_notify,
        admin_token: settings.security.admin_token.clone(),
    };

    let app = build_router(state, &settings.server.cors_origins);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address: {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel_token.cancel();
    if tokio::time::timeout(Duration::from_secs(5), worker).await.is_err() {
        error!("Hub worker did not stop in time");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
