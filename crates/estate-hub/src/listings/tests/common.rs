use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::listings::domain::{
    Caller, Image, ImageId, Property, PropertyDraft, PropertyId, PropertyStatus, Role, UserId,
};
use crate::listings::identity::{Identity, IdentityError, IdentityProvider};
use crate::listings::media::{ImageUpload, MediaError, MediaUploader, StoredMedia};
use crate::listings::projection::{CounterError, CounterSource};
use crate::listings::query::{ListingQuery, QueryPage};
use crate::listings::store::{InMemoryPropertyStore, PropertyStore, RowGuard, StoreError};
use crate::listings::{LifecycleError, ListingEngineConfig, ListingService, PropertyView};

pub(super) type TestService = ListingService<InMemoryPropertyStore, MemoryMedia, FixedCounters>;

pub(super) fn owner() -> Caller {
    Caller::new(UserId::new(), Role::Owner)
}

pub(super) fn admin() -> Caller {
    Caller::new(UserId::new(), Role::Admin)
}

pub(super) fn renter() -> Caller {
    Caller::new(UserId::new(), Role::User)
}

pub(super) fn engine_config(allow_owner_edit_after_publish: bool) -> ListingEngineConfig {
    ListingEngineConfig {
        allow_owner_edit_after_publish,
        store_timeout: Duration::from_millis(250),
        media_timeout: Duration::from_millis(250),
    }
}

pub(super) fn complete_draft() -> PropertyDraft {
    PropertyDraft {
        title: "Sunlit loft near the river".to_string(),
        description: "Two bedrooms, balcony, renovated kitchen.".to_string(),
        location: "Porto, Ribeira".to_string(),
        price: Decimal::new(1450, 0),
    }
}

pub(super) fn empty_draft() -> PropertyDraft {
    PropertyDraft {
        title: String::new(),
        description: String::new(),
        location: String::new(),
        price: Decimal::ZERO,
    }
}

/// Complete row with one active image, created `minutes` after a fixed epoch.
pub(super) fn listing(owner: &Caller, status: PropertyStatus, minutes: i64) -> Property {
    let created_at = Utc
        .with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
        + chrono::Duration::minutes(minutes);
    let mut property = Property::draft(owner.user_id, complete_draft(), created_at);
    property.status = status;
    property.images.push(image_for(&property.id));
    property
}

pub(super) fn image_for(property_id: &PropertyId) -> Image {
    let id = ImageId::new();
    Image {
        id,
        property_id: *property_id,
        url: format!("https://media.test/properties/{id}.png"),
        storage_key: format!("properties/{id}"),
        created_at: Utc::now(),
        deleted_at: None,
    }
}

pub(super) fn png(name: &str) -> ImageUpload {
    ImageUpload::new(name, "image/png", vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a])
}

pub(super) fn build_service(
    allow_owner_edit_after_publish: bool,
) -> (Arc<TestService>, InMemoryPropertyStore, Arc<MemoryMedia>) {
    let store = InMemoryPropertyStore::new();
    let media = Arc::new(MemoryMedia::default());
    let service = ListingService::new(
        Arc::new(store.clone()),
        media.clone(),
        Arc::new(FixedCounters::default()),
        engine_config(allow_owner_edit_after_publish),
    );
    (Arc::new(service), store, media)
}

/// Draft, one image, publish.
pub(super) async fn published_listing(service: &TestService, owner: &Caller) -> PropertyView {
    let draft = service
        .create_draft(owner, complete_draft())
        .await
        .expect("draft created");
    service
        .upload_images(&draft.id, owner, vec![png("front.png")])
        .await
        .expect("image uploaded");
    service
        .publish(&draft.id, owner)
        .await
        .expect("listing published")
}

/// Media host that keeps everything in memory. Files whose name is listed in
/// `unreachable` fail with a transient error.
#[derive(Debug, Default)]
pub(super) struct MemoryMedia {
    stored: Mutex<Vec<StoredMedia>>,
    deleted: Mutex<Vec<String>>,
    unreachable: HashSet<String>,
}

impl MemoryMedia {
    pub(super) fn failing_for(names: &[&str]) -> Self {
        Self {
            unreachable: names.iter().map(|name| name.to_string()).collect(),
            ..Self::default()
        }
    }

    pub(super) fn stored(&self) -> Vec<StoredMedia> {
        self.stored.lock().expect("media lock").clone()
    }

    pub(super) fn deleted(&self) -> Vec<String> {
        self.deleted.lock().expect("media lock").clone()
    }
}

#[async_trait]
impl MediaUploader for MemoryMedia {
    async fn upload(&self, file: &ImageUpload, folder: &str) -> Result<StoredMedia, MediaError> {
        if self.unreachable.contains(&file.file_name) {
            return Err(MediaError::Transient("connection reset".to_string()));
        }
        let key = format!("{folder}/{}", uuid::Uuid::new_v4());
        let stored = StoredMedia {
            url: format!("https://media.test/{key}"),
            storage_key: key,
        };
        self.stored.lock().expect("media lock").push(stored.clone());
        Ok(stored)
    }

    async fn delete(&self, storage_key: &str) -> Result<(), MediaError> {
        self.deleted
            .lock()
            .expect("media lock")
            .push(storage_key.to_string());
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub(super) struct FixedCounters {
    pub(super) favorites: u64,
    pub(super) messages: u64,
}

#[async_trait]
impl CounterSource for FixedCounters {
    async fn count_favorites(&self, _property_id: &PropertyId) -> Result<u64, CounterError> {
        Ok(self.favorites)
    }

    async fn count_messages(&self, _property_id: &PropertyId) -> Result<u64, CounterError> {
        Ok(self.messages)
    }
}

pub(super) struct BrokenCounters;

#[async_trait]
impl CounterSource for BrokenCounters {
    async fn count_favorites(&self, _property_id: &PropertyId) -> Result<u64, CounterError> {
        Err(CounterError::Unavailable("favorites offline".to_string()))
    }

    async fn count_messages(&self, _property_id: &PropertyId) -> Result<u64, CounterError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(99)
    }
}

pub(super) struct UnavailableStore;

#[async_trait]
impl PropertyStore for UnavailableStore {
    async fn insert(&self, _property: Property) -> Result<Property, StoreError> {
        Err(StoreError::Unavailable("primary down".to_string()))
    }

    async fn fetch(&self, _id: &PropertyId) -> Result<Option<Property>, StoreError> {
        Err(StoreError::Unavailable("primary down".to_string()))
    }

    async fn update_guarded(
        &self,
        _id: &PropertyId,
        _guard: &RowGuard<'_>,
    ) -> Result<Property, LifecycleError> {
        Err(StoreError::Unavailable("primary down".to_string()).into())
    }

    async fn query(&self, _query: &ListingQuery) -> Result<QueryPage, StoreError> {
        Err(StoreError::Unavailable("primary down".to_string()))
    }

    async fn find_image(&self, _image_id: &ImageId) -> Result<Option<PropertyId>, StoreError> {
        Err(StoreError::Unavailable("primary down".to_string()))
    }
}

/// Store that answers reads slower than any test deadline.
pub(super) struct StalledStore;

#[async_trait]
impl PropertyStore for StalledStore {
    async fn insert(&self, property: Property) -> Result<Property, StoreError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(property)
    }

    async fn fetch(&self, _id: &PropertyId) -> Result<Option<Property>, StoreError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(None)
    }

    async fn update_guarded(
        &self,
        _id: &PropertyId,
        _guard: &RowGuard<'_>,
    ) -> Result<Property, LifecycleError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Err(LifecycleError::NotFound)
    }

    async fn query(&self, _query: &ListingQuery) -> Result<QueryPage, StoreError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(QueryPage {
            items: Vec::new(),
            total: 0,
        })
    }

    async fn find_image(&self, _image_id: &ImageId) -> Result<Option<PropertyId>, StoreError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(None)
    }
}

/// Reads go to the wrapped store; every guarded write fails.
pub(super) struct ReadOnlyStore(pub(super) InMemoryPropertyStore);

#[async_trait]
impl PropertyStore for ReadOnlyStore {
    async fn insert(&self, property: Property) -> Result<Property, StoreError> {
        self.0.insert(property).await
    }

    async fn fetch(&self, id: &PropertyId) -> Result<Option<Property>, StoreError> {
        self.0.fetch(id).await
    }

    async fn update_guarded(
        &self,
        _id: &PropertyId,
        _guard: &RowGuard<'_>,
    ) -> Result<Property, LifecycleError> {
        Err(LifecycleError::StoreUnavailable("replica is read-only".to_string()))
    }

    async fn query(&self, query: &ListingQuery) -> Result<QueryPage, StoreError> {
        self.0.query(query).await
    }

    async fn find_image(&self, image_id: &ImageId) -> Result<Option<PropertyId>, StoreError> {
        self.0.find_image(image_id).await
    }
}

/// Token table standing in for the authentication service.
#[derive(Debug, Default)]
pub(super) struct StaticIdentity {
    tokens: HashMap<String, Identity>,
}

impl StaticIdentity {
    pub(super) fn with(mut self, token: &str, caller: &Caller) -> Self {
        self.tokens.insert(
            token.to_string(),
            Identity {
                user_id: caller.user_id,
                role: caller.role,
                is_active: true,
            },
        );
        self
    }

    pub(super) fn deactivated(mut self, token: &str, caller: &Caller) -> Self {
        self.tokens.insert(
            token.to_string(),
            Identity {
                user_id: caller.user_id,
                role: caller.role,
                is_active: false,
            },
        );
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn resolve(&self, token: &str) -> Result<Identity, IdentityError> {
        self.tokens.get(token).copied().ok_or(IdentityError::Invalid)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
