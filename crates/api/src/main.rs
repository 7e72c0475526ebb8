use anyhow::Context;

use printfarm_api::app::{build_app, services};
use printfarm_infra::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    printfarm_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        dispatch_interval_secs = config.scheduler.dispatch_interval.as_secs(),
        completion_interval_secs = config.scheduler.completion_interval.as_secs(),
        max_assignments_per_tick = config.scheduler.max_assignments_per_tick,
        "starting print scheduler"
    );

    let backends = services::build_backends(&config).await?;
    let (app_services, scheduler) = services::start_scheduler(&config.scheduler, &backends)?;
    let app = build_app(app_services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    tracing::info!("shutting down scheduler");
    scheduler.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
}
