use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryBackend};
use crate::routes::with_intake_routes;
use admission_intake::config::AppConfig;
use admission_intake::error::AppError;
use admission_intake::telemetry;
use admission_intake::workflows::admission::{IntakeSessions, RestGateway};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if args.in_memory {
        config.backend.base_url = None;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let intake = config.intake.clone();
    let router = match RestGateway::from_config(&config.backend, Handle::current()) {
        Some(gateway) => {
            let gateway = Arc::new(gateway.map_err(AppError::Gateway)?);
            info!(base_url = gateway.base_url(), "using institute backend");
            with_intake_routes(Arc::new(IntakeSessions::new(
                Arc::clone(&gateway),
                gateway,
                intake,
            )))
        }
        None => {
            warn!("INTAKE_API_BASE_URL not set; admissions are kept in memory");
            let backend = Arc::new(InMemoryBackend::seeded());
            with_intake_routes(Arc::new(IntakeSessions::new(
                Arc::clone(&backend),
                backend,
                intake,
            )))
        }
    };

    let app = router.layer(Extension(app_state)).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, center = %config.intake.center_code, "admission intake service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
