use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemorySubmissionGateway};
use crate::routes::with_wizard_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use domestic_match::config::AppConfig;
use domestic_match::error::AppError;
use domestic_match::telemetry;
use domestic_match::workflows::domestic_work::{
    HttpSubmissionGateway, SubmissionGateway, WizardSessions,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
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

    let gateway: Arc<dyn SubmissionGateway> = if args.offline {
        info!("serving against the in-memory sample directory");
        Arc::new(InMemorySubmissionGateway::seeded())
    } else {
        info!(base_url = %config.gateway.base_url, "using domestic-work backend");
        Arc::new(HttpSubmissionGateway::new(&config.gateway)?)
    };
    let sessions = Arc::new(
        WizardSessions::new(gateway, config.gateway.directory_page_size)
            .with_idle_ttl(config.sessions.idle_ttl),
    );
    spawn_session_sweeper(Arc::clone(&sessions));

    let app = with_wizard_routes(sessions)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        offline = args.offline,
        session_ttl_secs = config.sessions.idle_ttl.as_secs(),
        "registration wizard service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/// Evict abandoned wizards every half idle TTL.
fn spawn_session_sweeper(sessions: Arc<WizardSessions>) {
    let period = (sessions.idle_ttl() / 2).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sessions.evict_idle();
        }
    });
}
