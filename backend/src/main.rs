use std::backtrace::Backtrace;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use carehub_backend::config::AppConfig;
use carehub_backend::domain::{HousekeepingService, Notifier, StatusChecker, TracingNotifier};
use carehub_backend::workers::Workers;
use carehub_backend::{create_router, initialize_backend};

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    std::panic::set_hook(Box::new(|info| {
        error!("panic: {}\n{}", info, Backtrace::force_capture());
    }));
}

async fn shutdown_signal(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", e);
    }
    info!("shutdown requested");
    cancel.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    init_logging(&config);

    let state = initialize_backend(&config).await?;
    let settings = state.settings_service.process_settings().await?;

    info!("generating schedules before accepting requests");
    match state.engine.generate_all(Utc::now()).await {
        Ok(report) => info!(
            recipients = report.recipients,
            created = report.created,
            failures = report.failures.len(),
            "startup generation finished"
        ),
        Err(e) => error!("startup generation failed: {}", e),
    }

    let cancel = CancellationToken::new();
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let workers = Workers::spawn(
        state.engine.clone(),
        StatusChecker::new(state.db.clone(), notifier),
        HousekeepingService::new(state.db.clone()),
        state.worker_runs.clone(),
        &settings,
        &cancel,
    );

    let app = create_router(state, &config.cors_origin);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    workers.join().await;
    info!("server stopped");
    Ok(())
}
