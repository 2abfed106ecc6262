use std::sync::Arc;

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::domain::{Caller, ImageId, PropertyChanges, PropertyDraft, PropertyId};
use super::error::LifecycleError;
use super::identity::{authenticate, require_caller, IdentityProvider};
use super::media::{ImageUpload, MediaUploader, MAX_IMAGES_PER_PROPERTY, MAX_IMAGE_BYTES};
use super::projection::CounterSource;
use super::query::PropertyFilter;
use super::service::ListingService;
use super::store::PropertyStore;

/// Multipart field carrying image files.
pub const IMAGE_FIELD: &str = "images";

/// Headroom for multipart framing on top of the raw image bytes.
const UPLOAD_ENVELOPE_BYTES: usize = 1024 * 1024;

/// Shared handler state: the engine plus the identity collaborator.
pub struct ListingState<S, M, C> {
    pub service: Arc<ListingService<S, M, C>>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl<S, M, C> Clone for ListingState<S, M, C> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            identity: Arc::clone(&self.identity),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DetailParams {
    pub include_deleted: bool,
}

/// Router builder exposing the property lifecycle endpoints.
pub fn listing_router<S, M, C>(
    service: Arc<ListingService<S, M, C>>,
    identity: Arc<dyn IdentityProvider>,
) -> Router
where
    S: PropertyStore + 'static,
    M: MediaUploader + 'static,
    C: CounterSource + 'static,
{
    let upload_limit = MAX_IMAGES_PER_PROPERTY * MAX_IMAGE_BYTES + UPLOAD_ENVELOPE_BYTES;

    Router::new()
        .route(
            "/api/v1/properties",
            get(list_handler::<S, M, C>).post(create_handler::<S, M, C>),
        )
        .route(
            "/api/v1/properties/:property_id",
            get(detail_handler::<S, M, C>)
                .patch(update_handler::<S, M, C>)
                .delete(delete_handler::<S, M, C>),
        )
        .route(
            "/api/v1/properties/:property_id/publish",
            post(publish_handler::<S, M, C>),
        )
        .route(
            "/api/v1/properties/:property_id/archive",
            post(archive_handler::<S, M, C>),
        )
        .route(
            "/api/v1/properties/:property_id/restore",
            post(restore_handler::<S, M, C>),
        )
        .route(
            "/api/v1/properties/:property_id/images",
            post(upload_handler::<S, M, C>).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/v1/images/:image_id",
            delete(delete_image_handler::<S, M, C>),
        )
        .with_state(ListingState { service, identity })
}

pub(crate) async fn list_handler<S, M, C>(
    State(state): State<ListingState<S, M, C>>,
    headers: HeaderMap,
    filter: Result<Query<PropertyFilter>, QueryRejection>,
) -> Response
where
    S: PropertyStore + 'static,
    M: MediaUploader + 'static,
    C: CounterSource + 'static,
{
    let caller = match authenticate(state.identity.as_ref(), authorization(&headers)).await {
        Ok(caller) => caller,
        Err(err) => return failure(err),
    };
    let Query(filter) = match filter {
        Ok(filter) => filter,
        Err(rejection) => return failure(LifecycleError::validation(rejection.body_text())),
    };

    match state.service.list_properties(&filter, caller.as_ref()).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(err) => failure(err),
    }
}

pub(crate) async fn detail_handler<S, M, C>(
    State(state): State<ListingState<S, M, C>>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
    params: Result<Query<DetailParams>, QueryRejection>,
) -> Response
where
    S: PropertyStore + 'static,
    M: MediaUploader + 'static,
    C: CounterSource + 'static,
{
    let caller = match authenticate(state.identity.as_ref(), authorization(&headers)).await {
        Ok(caller) => caller,
        Err(err) => return failure(err),
    };
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return failure(LifecycleError::validation(rejection.body_text())),
    };
    let Some(id) = parse_id(&property_id).map(PropertyId) else {
        return failure(LifecycleError::NotFound);
    };

    match state
        .service
        .get_property_with(&id, caller.as_ref(), params.include_deleted)
        .await
    {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => failure(err),
    }
}

pub(crate) async fn create_handler<S, M, C>(
    State(state): State<ListingState<S, M, C>>,
    headers: HeaderMap,
    draft: Result<Json<PropertyDraft>, JsonRejection>,
) -> Response
where
    S: PropertyStore + 'static,
    M: MediaUploader + 'static,
    C: CounterSource + 'static,
{
    let caller = match require_caller(state.identity.as_ref(), authorization(&headers)).await {
        Ok(caller) => caller,
        Err(err) => return failure(err),
    };
    let Json(draft) = match draft {
        Ok(draft) => draft,
        Err(rejection) => return failure(LifecycleError::validation(rejection.body_text())),
    };

    match state.service.create_draft(&caller, draft).await {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(err) => failure(err),
    }
}

pub(crate) async fn update_handler<S, M, C>(
    State(state): State<ListingState<S, M, C>>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
    changes: Result<Json<PropertyChanges>, JsonRejection>,
) -> Response
where
    S: PropertyStore + 'static,
    M: MediaUploader + 'static,
    C: CounterSource + 'static,
{
    let caller = match require_caller(state.identity.as_ref(), authorization(&headers)).await {
        Ok(caller) => caller,
        Err(err) => return failure(err),
    };
    let Some(id) = parse_id(&property_id).map(PropertyId) else {
        return failure(LifecycleError::NotFound);
    };
    let Json(changes) = match changes {
        Ok(changes) => changes,
        Err(rejection) => return failure(LifecycleError::validation(rejection.body_text())),
    };

    match state.service.update_draft(&id, &caller, changes).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => failure(err),
    }
}

pub(crate) async fn publish_handler<S, M, C>(
    State(state): State<ListingState<S, M, C>>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
) -> Response
where
    S: PropertyStore + 'static,
    M: MediaUploader + 'static,
    C: CounterSource + 'static,
{
    let (caller, id) = match resolve_target(&state, &headers, &property_id).await {
        Ok(target) => target,
        Err(err) => return failure(err),
    };
    match state.service.publish(&id, &caller).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => failure(err),
    }
}

pub(crate) async fn archive_handler<S, M, C>(
    State(state): State<ListingState<S, M, C>>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
) -> Response
where
    S: PropertyStore + 'static,
    M: MediaUploader + 'static,
    C: CounterSource + 'static,
{
    let (caller, id) = match resolve_target(&state, &headers, &property_id).await {
        Ok(target) => target,
        Err(err) => return failure(err),
    };
    match state.service.archive(&id, &caller).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => failure(err),
    }
}

pub(crate) async fn delete_handler<S, M, C>(
    State(state): State<ListingState<S, M, C>>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
) -> Response
where
    S: PropertyStore + 'static,
    M: MediaUploader + 'static,
    C: CounterSource + 'static,
{
    let (caller, id) = match resolve_target(&state, &headers, &property_id).await {
        Ok(target) => target,
        Err(err) => return failure(err),
    };
    match state.service.soft_delete(&id, &caller).await {
        Ok(view) => {
            let payload = json!({
                "message": "property deleted",
                "property": view,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => failure(err),
    }
}

pub(crate) async fn restore_handler<S, M, C>(
    State(state): State<ListingState<S, M, C>>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
) -> Response
where
    S: PropertyStore + 'static,
    M: MediaUploader + 'static,
    C: CounterSource + 'static,
{
    let (caller, id) = match resolve_target(&state, &headers, &property_id).await {
        Ok(target) => target,
        Err(err) => return failure(err),
    };
    match state.service.restore(&id, &caller).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => failure(err),
    }
}

pub(crate) async fn upload_handler<S, M, C>(
    State(state): State<ListingState<S, M, C>>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response
where
    S: PropertyStore + 'static,
    M: MediaUploader + 'static,
    C: CounterSource + 'static,
{
    let (caller, id) = match resolve_target(&state, &headers, &property_id).await {
        Ok(target) => target,
        Err(err) => return failure(err),
    };
    let files = match multipart {
        Ok(multipart) => match read_images(multipart).await {
            Ok(files) => files,
            Err(err) => return failure(err),
        },
        Err(rejection) => return failure(LifecycleError::validation(rejection.body_text())),
    };

    match state.service.upload_images(&id, &caller, files).await {
        Ok(report) => {
            let payload = json!({
                "message": report.summary(),
                "uploaded": report.uploaded,
                "failures": report.failures,
            });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(err) => failure(err),
    }
}

pub(crate) async fn delete_image_handler<S, M, C>(
    State(state): State<ListingState<S, M, C>>,
    headers: HeaderMap,
    Path(image_id): Path<String>,
) -> Response
where
    S: PropertyStore + 'static,
    M: MediaUploader + 'static,
    C: CounterSource + 'static,
{
    let caller = match require_caller(state.identity.as_ref(), authorization(&headers)).await {
        Ok(caller) => caller,
        Err(err) => return failure(err),
    };
    let Some(id) = parse_id(&image_id).map(ImageId) else {
        return failure(LifecycleError::NotFound);
    };

    match state.service.delete_image(&id, &caller).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => failure(err),
    }
}

async fn resolve_target<S, M, C>(
    state: &ListingState<S, M, C>,
    headers: &HeaderMap,
    property_id: &str,
) -> Result<(Caller, PropertyId), LifecycleError> {
    let caller = require_caller(state.identity.as_ref(), authorization(headers)).await?;
    let id = parse_id(property_id)
        .map(PropertyId)
        .ok_or(LifecycleError::NotFound)?;
    Ok((caller, id))
}

async fn read_images(mut multipart: Multipart) -> Result<Vec<ImageUpload>, LifecycleError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| LifecycleError::validation(err.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| LifecycleError::validation(err.body_text()))?;
        files.push(ImageUpload::new(file_name, content_type, bytes.to_vec()));
    }
    Ok(files)
}

/// A value that is not a UUID cannot name an existing row.
fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

/// Missing header reads as anonymous; a non-UTF-8 one as malformed.
fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .map(|value| value.to_str().unwrap_or_default())
}

fn failure(err: LifecycleError) -> Response {
    let payload = json!({
        "error": err.to_string(),
    });
    (err.status_code(), Json(payload)).into_response()
}
