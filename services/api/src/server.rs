use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_wizard_routes;
use applicant_wizard::config::AppConfig;
use applicant_wizard::error::AppError;
use applicant_wizard::telemetry;
use applicant_wizard::workflows::applicant::{
    LogNotifier, ViaCepClient, WizardEngine, WizardService,
};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
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

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let lookup = Arc::new(ViaCepClient::new(
        config.lookup.base_url.clone(),
        config.lookup.timeout(),
    )?);
    let engine = WizardEngine::new(config.wizard.clone())?;
    let wizard_service = Arc::new(
        WizardService::new(engine, lookup, Arc::new(LogNotifier))
            .with_idle_ttl(config.sessions.idle_ttl()),
    );

    let app = with_wizard_routes(wizard_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        lookup = %config.lookup.base_url,
        "applicant wizard ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
