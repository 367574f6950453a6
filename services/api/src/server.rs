use crate::cli::ServeArgs;
use crate::infra::{load_dataset, AppState};
use crate::routes::router;
use axum_prometheus::PrometheusMetricLayer;
use lending_ops::config::AppConfig;
use lending_ops::error::AppError;
use lending_ops::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let dataset = load_dataset(&config.dataset)?;
    info!(
        applications = dataset.applications.len(),
        fillials = dataset.fillials.len(),
        merchants = dataset.merchants.len(),
        "application dataset loaded"
    );

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let mut app_state = AppState::new(Arc::new(dataset));
    app_state.metrics = Some(Arc::new(prometheus_handle));
    let readiness_flag = app_state.readiness.clone();

    let app = router(app_state).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "lending operations service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
