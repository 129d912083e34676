use crate::cli::ServeArgs;
use crate::infra::{collaborators, AppState, InMemorySessionRepository};
use crate::routes::with_origin_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;
use usmca_origin::config::AppConfig;
use usmca_origin::error::AppError;
use usmca_origin::telemetry;
use usmca_origin::workflows::certificate::OriginWorkflowService;
use usmca_origin::workflows::origin::RegionalContentCalculator;
use usmca_origin::workflows::qualification::Rulebook;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (collaborators, reference) = collaborators(&config)?;
    let settings = config.workflow_settings();

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        reference,
        calculator: RegionalContentCalculator::new(settings.bloc.clone()),
        rulebook: Arc::new(Rulebook::with_default_threshold(
            config.origin.default_threshold,
        )),
        default_threshold: settings.default_threshold,
        read_policy: settings.read_policy,
    };

    let repository = Arc::new(InMemorySessionRepository::default());
    let workflow_service = Arc::new(OriginWorkflowService::new(
        repository,
        collaborators,
        settings,
    ));

    let app = with_origin_routes(workflow_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        archive_dir = %config.origin.archive_dir.display(),
        "usmca origin service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
