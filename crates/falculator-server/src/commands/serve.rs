use anyhow::Result;
use falculator_server::configuration::Settings;
use falculator_server::logging::setup_logging;
use falculator_server::{routes, AppState};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(mut sigint), Ok(mut sigterm)) => {
            tokio::select! {
                _ = sigint.recv() => {},
                _ = sigterm.recv() => {},
            }
        }
        _ => {
            tracing::warn!("failed to install signal handlers, falling back to ctrl-c");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

pub async fn run(config: Option<&Path>) -> Result<()> {
    let settings = Settings::load(config)?;
    setup_logging(settings.log_format, settings.log_dir.as_deref())?;

    if settings.extractor.default_api_key().is_none() {
        tracing::warn!("no default Gemini key configured, only requests with their own key will succeed");
    }

    let state = AppState::new(settings.extractor.clone())?;

    // Sweep expired quota entries a few times per window.
    let limiter = state.rate_limiter().clone();
    let sweep_every = (settings.extractor.rate_limit.window() / 4).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        interval.tick().await;
        loop {
            interval.tick().await;
            limiter.prune();
        }
    });

    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(settings.socket_addr()?).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server shutdown complete");
    Ok(())
}
