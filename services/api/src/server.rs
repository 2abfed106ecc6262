use crate::cli::ServeArgs;
use crate::infra::{AppState, CounterBoard, DiskMedia, TokenRegistry};
use crate::routes::with_listing_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use estate_hub::config::AppConfig;
use estate_hub::error::AppError;
use estate_hub::listings::{InMemoryPropertyStore, LifecycleError, ListingService};
use estate_hub::telemetry;
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
    if args.allow_owner_edit_after_publish {
        config.listings.allow_owner_edit_after_publish = true;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        media_root: Arc::new(config.media.root.clone()),
    };

    let identities = Arc::new(TokenRegistry::seeded().map_err(LifecycleError::from)?);
    for (token, role) in identities.tokens().map_err(LifecycleError::from)? {
        info!(role = role.label(), %token, "demo account available");
    }

    let listing_service = Arc::new(ListingService::new(
        Arc::new(InMemoryPropertyStore::new()),
        Arc::new(DiskMedia::new(config.media.root.clone())),
        Arc::new(CounterBoard::default()),
        config.listings.clone(),
    ));

    let app = with_listing_routes(listing_service, identities)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        allow_owner_edit_after_publish = config.listings.allow_owner_edit_after_publish,
        media_root = %config.media.root.display(),
        "listing service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
