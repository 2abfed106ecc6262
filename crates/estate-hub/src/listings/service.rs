use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::config::ListingEngineConfig;
use super::domain::{
    Caller, Image, ImageId, Property, PropertyChanges, PropertyDraft, PropertyId,
};
use super::error::LifecycleError;
use super::lifecycle::{self, Transition};
use super::media::{
    ImageUpload, MediaUploader, UploadFailure, UploadReport, MAX_IMAGES_PER_PROPERTY,
    PROPERTY_MEDIA_FOLDER,
};
use super::policy;
use super::projection::{project, CounterSource, ImageView, PropertyView};
use super::query::{ListingQuery, Page, PropertyFilter};
use super::store::PropertyStore;
use super::validation::{validate_changes, validate_draft_input};

/// Entry point for every listing operation.
pub struct ListingService<S, M, C> {
    store: Arc<S>,
    media: Arc<M>,
    counters: Arc<C>,
    config: ListingEngineConfig,
}

impl<S, M, C> ListingService<S, M, C>
where
    S: PropertyStore + 'static,
    M: MediaUploader + 'static,
    C: CounterSource + 'static,
{
    pub fn new(store: Arc<S>, media: Arc<M>, counters: Arc<C>, config: ListingEngineConfig) -> Self {
        Self {
            store,
            media,
            counters,
            config,
        }
    }

    pub fn config(&self) -> &ListingEngineConfig {
        &self.config
    }

    /// Create a new draft owned by `caller`.
    pub async fn create_draft(
        &self,
        caller: &Caller,
        draft: PropertyDraft,
    ) -> Result<PropertyView, LifecycleError> {
        policy::authorize_create(caller)?;
        validate_draft_input(&draft)?;

        let property = Property::draft(caller.user_id, draft, Utc::now());
        let stored = self
            .store_call("insert", async {
                self.store.insert(property).await.map_err(LifecycleError::from)
            })
            .await?;

        info!(property_id = %stored.id, owner_id = %stored.owner_id, "draft created");
        Ok(self.view(&stored).await)
    }

    /// Edit listing fields. Owners are limited to drafts unless the engine
    /// allows edits after publishing; admins may edit any live row.
    pub async fn update_draft(
        &self,
        id: &PropertyId,
        caller: &Caller,
        changes: PropertyChanges,
    ) -> Result<PropertyView, LifecycleError> {
        validate_changes(&changes)?;

        let current = self.load(id).await?;
        let allow_after_publish = self.config.allow_owner_edit_after_publish;
        authorize_edit(&current, caller, allow_after_publish)?;

        let caller = *caller;
        let guard = move |fresh: &Property| -> Result<Property, LifecycleError> {
            authorize_edit(fresh, &caller, allow_after_publish)?;
            let mut next = fresh.clone();
            next.apply_changes(changes.clone());
            Ok(next)
        };
        let updated = self
            .store_call("update", self.store.update_guarded(id, &guard))
            .await?;

        info!(property_id = %id, caller = %caller.user_id, status = %updated.status, "property updated");
        Ok(self.view(&updated).await)
    }

    /// `draft -> published`, re-validated inside the write.
    pub async fn publish(
        &self,
        id: &PropertyId,
        caller: &Caller,
    ) -> Result<PropertyView, LifecycleError> {
        self.transition(id, caller, Transition::Publish).await
    }

    /// `draft|published -> archived`. Archiving an archived row is a no-op.
    pub async fn archive(
        &self,
        id: &PropertyId,
        caller: &Caller,
    ) -> Result<PropertyView, LifecycleError> {
        self.transition(id, caller, Transition::Archive).await
    }

    /// Stamp `deleted_at` and force `archived`. A second delete is `NotFound`.
    pub async fn soft_delete(
        &self,
        id: &PropertyId,
        caller: &Caller,
    ) -> Result<PropertyView, LifecycleError> {
        self.transition(id, caller, Transition::SoftDelete).await
    }

    /// Admin recovery for soft-deleted rows. The row comes back archived.
    pub async fn restore(
        &self,
        id: &PropertyId,
        caller: &Caller,
    ) -> Result<PropertyView, LifecycleError> {
        let current = self.load(id).await?;
        lifecycle::check_restore(&current, caller)?;

        let caller = *caller;
        let guard = move |fresh: &Property| -> Result<Property, LifecycleError> {
            lifecycle::check_restore(fresh, &caller)?;
            Ok(lifecycle::restore(fresh))
        };
        let restored = self
            .store_call("restore", self.store.update_guarded(id, &guard))
            .await?;

        info!(property_id = %id, caller = %caller.user_id, "property restored");
        Ok(self.view(&restored).await)
    }

    pub async fn get_property(
        &self,
        id: &PropertyId,
        caller: Option<&Caller>,
    ) -> Result<PropertyView, LifecycleError> {
        self.get_property_with(id, caller, false).await
    }

    /// Detail read. `include_deleted` only has an effect for admins.
    pub async fn get_property_with(
        &self,
        id: &PropertyId,
        caller: Option<&Caller>,
        include_deleted: bool,
    ) -> Result<PropertyView, LifecycleError> {
        let property = self.load(id).await?;
        policy::authorize_view(&property, caller, include_deleted)?;
        Ok(self.view(&property).await)
    }

    pub async fn list_properties(
        &self,
        filter: &PropertyFilter,
        caller: Option<&Caller>,
    ) -> Result<Page<PropertyView>, LifecycleError> {
        let query = ListingQuery::for_caller(caller, filter);
        let page = self
            .store_call("query", async {
                self.store.query(&query).await.map_err(LifecycleError::from)
            })
            .await?;

        let mut data = Vec::with_capacity(page.items.len());
        for property in &page.items {
            data.push(self.view(property).await);
        }

        debug!(scope = ?query.scope, total = page.total, returned = data.len(), "listing served");
        Ok(Page {
            data,
            pagination: query.page_meta(page.total),
        })
    }

    /// Upload files one at a time. Earlier successes stay recorded when a later
    /// file fails; only a batch with no success at all is an error.
    pub async fn upload_images(
        &self,
        id: &PropertyId,
        caller: &Caller,
        files: Vec<ImageUpload>,
    ) -> Result<UploadReport, LifecycleError> {
        if files.is_empty() {
            return Err(LifecycleError::validation("no files provided"));
        }
        if files.len() > MAX_IMAGES_PER_PROPERTY {
            return Err(LifecycleError::validation(format!(
                "maximum {MAX_IMAGES_PER_PROPERTY} images allowed"
            )));
        }

        let property = self.load(id).await?;
        policy::authorize_mutation(&property, caller)?;

        let attached = property.active_image_count();
        if attached + files.len() > MAX_IMAGES_PER_PROPERTY {
            return Err(LifecycleError::validation(format!(
                "a property holds at most {MAX_IMAGES_PER_PROPERTY} images ({attached} already attached)"
            )));
        }

        let mut report = UploadReport::default();
        for file in &files {
            match self.upload_one(id, file).await {
                Ok(image) => report.uploaded.push(ImageView::from(&image)),
                Err(err) => {
                    warn!(property_id = %id, file = %file.file_name, error = %err, "image upload failed");
                    report.failures.push(UploadFailure {
                        file_name: file.file_name.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        if report.uploaded.is_empty() {
            let detail = report
                .failures
                .first()
                .map(|failure| format!("{}: {}", failure.file_name, failure.reason))
                .unwrap_or_else(|| "no files processed".to_string());
            return Err(LifecycleError::validation(format!(
                "no images uploaded ({detail})"
            )));
        }

        info!(
            property_id = %id,
            caller = %caller.user_id,
            uploaded = report.uploaded.len(),
            failed = report.failures.len(),
            "image batch processed"
        );
        Ok(report)
    }

    /// Remove an image from the media host, then soft-delete its record.
    pub async fn delete_image(
        &self,
        image_id: &ImageId,
        caller: &Caller,
    ) -> Result<(), LifecycleError> {
        let property_id = self
            .store_call("find_image", async {
                self.store
                    .find_image(image_id)
                    .await
                    .map_err(LifecycleError::from)
            })
            .await?
            .ok_or(LifecycleError::NotFound)?;

        let property = self.load(&property_id).await?;
        policy::authorize_mutation(&property, caller)?;

        let image = property
            .images
            .iter()
            .find(|image| &image.id == image_id && image.is_active())
            .cloned()
            .ok_or(LifecycleError::NotFound)?;

        self.media_call("delete", async {
            self.media
                .delete(&image.storage_key)
                .await
                .map_err(LifecycleError::from)
        })
        .await?;

        let target = *image_id;
        let now = Utc::now();
        let guard = move |fresh: &Property| -> Result<Property, LifecycleError> {
            if fresh.is_deleted() {
                return Err(LifecycleError::NotFound);
            }
            let mut next = fresh.clone();
            let image = next
                .images
                .iter_mut()
                .find(|image| image.id == target && image.is_active())
                .ok_or(LifecycleError::NotFound)?;
            image.deleted_at = Some(now);
            Ok(next)
        };
        self.store_call("delete_image", self.store.update_guarded(&property_id, &guard))
            .await?;

        info!(property_id = %property_id, image_id = %image_id, caller = %caller.user_id, "image removed");
        Ok(())
    }

    async fn transition(
        &self,
        id: &PropertyId,
        caller: &Caller,
        transition: Transition,
    ) -> Result<PropertyView, LifecycleError> {
        let current = self.load(id).await?;
        lifecycle::check(&current, caller, transition)?;

        let guard = lifecycle::guarded(transition, *caller, current.stamp(), Utc::now());
        let next = self
            .store_call(transition.action(), self.store.update_guarded(id, &guard))
            .await?;

        info!(
            property_id = %id,
            caller = %caller.user_id,
            role = caller.role.label(),
            action = transition.action(),
            from = %current.status,
            to = %next.status,
            "property transitioned"
        );
        Ok(self.view(&next).await)
    }

    async fn upload_one(
        &self,
        property_id: &PropertyId,
        file: &ImageUpload,
    ) -> Result<Image, LifecycleError> {
        file.validate()?;

        let stored = self
            .media_call("upload", async {
                self.media
                    .upload(file, PROPERTY_MEDIA_FOLDER)
                    .await
                    .map_err(LifecycleError::from)
            })
            .await?;

        let image = Image {
            id: ImageId::new(),
            property_id: *property_id,
            url: stored.url,
            storage_key: stored.storage_key.clone(),
            created_at: Utc::now(),
            deleted_at: None,
        };

        let record = image.clone();
        let guard = move |fresh: &Property| -> Result<Property, LifecycleError> {
            if fresh.is_deleted() {
                return Err(LifecycleError::NotFound);
            }
            if fresh.active_image_count() >= MAX_IMAGES_PER_PROPERTY {
                return Err(LifecycleError::validation(format!(
                    "maximum {MAX_IMAGES_PER_PROPERTY} images allowed"
                )));
            }
            let mut next = fresh.clone();
            next.images.push(record.clone());
            Ok(next)
        };

        if let Err(err) = self
            .store_call("attach_image", self.store.update_guarded(property_id, &guard))
            .await
        {
            // The bytes are on the media host but no record points at them.
            let cleanup = self
                .media_call("delete", async {
                    self.media
                        .delete(&stored.storage_key)
                        .await
                        .map_err(LifecycleError::from)
                })
                .await;
            if let Err(cleanup) = cleanup {
                warn!(storage_key = %stored.storage_key, error = %cleanup, "orphaned media left behind");
            }
            return Err(err);
        }

        Ok(image)
    }

    async fn load(&self, id: &PropertyId) -> Result<Property, LifecycleError> {
        self.store_call("fetch", async {
            self.store.fetch(id).await.map_err(LifecycleError::from)
        })
        .await?
        .ok_or(LifecycleError::NotFound)
    }

    async fn view(&self, property: &Property) -> PropertyView {
        project(property, self.counters.as_ref(), self.config.store_timeout).await
    }

    async fn store_call<T, F>(&self, operation: &'static str, work: F) -> Result<T, LifecycleError>
    where
        F: Future<Output = Result<T, LifecycleError>>,
    {
        bounded(operation, self.config.store_timeout, work).await
    }

    async fn media_call<T, F>(&self, operation: &'static str, work: F) -> Result<T, LifecycleError>
    where
        F: Future<Output = Result<T, LifecycleError>>,
    {
        bounded(operation, self.config.media_timeout, work).await
    }
}

async fn bounded<T, F>(operation: &'static str, limit: Duration, work: F) -> Result<T, LifecycleError>
where
    F: Future<Output = Result<T, LifecycleError>>,
{
    match tokio::time::timeout(limit, work).await {
        Ok(outcome) => outcome,
        Err(_) => {
            let millis = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
            warn!(operation, timeout_ms = millis, "collaborator call timed out");
            Err(LifecycleError::StoreUnavailable(format!(
                "{operation} timed out after {millis}ms"
            )))
        }
    }
}

fn authorize_edit(
    property: &Property,
    caller: &Caller,
    allow_after_publish: bool,
) -> Result<(), LifecycleError> {
    policy::authorize_mutation(property, caller)?;
    if policy::can_edit_fields(property, caller, allow_after_publish) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidTransition {
            action: "edit",
            status: property.status,
        })
    }
}
