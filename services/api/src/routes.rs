use crate::infra::{resolve_key, AppState};
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use estate_hub::error::AppError;
use estate_hub::listings::{
    listing_router, CounterSource, IdentityProvider, ListingService, MediaUploader, PropertyStore,
};
use serde_json::json;
use std::io::ErrorKind;
use std::sync::Arc;

pub(crate) fn with_listing_routes<S, M, C>(
    service: Arc<ListingService<S, M, C>>,
    identity: Arc<dyn IdentityProvider>,
) -> Router
where
    S: PropertyStore + 'static,
    M: MediaUploader + 'static,
    C: CounterSource + 'static,
{
    listing_router(service, identity)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/media/*key", get(media_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Serve bytes written by the disk media host.
pub(crate) async fn media_endpoint(
    Extension(state): Extension<AppState>,
    Path(key): Path<String>,
) -> Response {
    let not_found = || {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "media not found" })),
        )
            .into_response()
    };

    let Some(path) = resolve_key(&state.media_root, &key) else {
        return not_found();
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = mime_guess::from_path(&path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, content_type.essence_str().to_string())],
                bytes,
            )
                .into_response()
        }
        Err(err) if err.kind() == ErrorKind::NotFound => not_found(),
        Err(err) => AppError::from(err).into_response(),
    }
}
