use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::domain::{ImageId, Property, PropertyId};
use super::error::LifecycleError;
use super::query::{ListingQuery, QueryPage};

/// Closure run against the freshly read row inside the store's atomic unit.
/// Returning an error aborts the write.
pub type RowGuard<'a> = dyn Fn(&Property) -> Result<Property, LifecycleError> + Send + Sync + 'a;

/// Persistence boundary for properties and their images.
#[async_trait]
pub trait PropertyStore: Send + Sync {
    async fn insert(&self, property: Property) -> Result<Property, StoreError>;

    async fn fetch(&self, id: &PropertyId) -> Result<Option<Property>, StoreError>;

    /// Atomic read-modify-write of a single row.
    async fn update_guarded(
        &self,
        id: &PropertyId,
        guard: &RowGuard<'_>,
    ) -> Result<Property, LifecycleError>;

    async fn query(&self, query: &ListingQuery) -> Result<QueryPage, StoreError>;

    /// Owning property of an image, if the image exists.
    async fn find_image(&self, image_id: &ImageId) -> Result<Option<PropertyId>, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Process-local store. The row map mutex is the transactional unit.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPropertyStore {
    rows: Arc<Mutex<HashMap<PropertyId, Property>>>,
}

impl InMemoryPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<PropertyId, Property>>, StoreError> {
        self.rows
            .lock()
            .map_err(|_| StoreError::Unavailable("property rows poisoned".to_string()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|rows| rows.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PropertyStore for InMemoryPropertyStore {
    async fn insert(&self, property: Property) -> Result<Property, StoreError> {
        let mut rows = self.lock()?;
        if rows.contains_key(&property.id) {
            return Err(StoreError::Conflict);
        }
        rows.insert(property.id, property.clone());
        Ok(property)
    }

    async fn fetch(&self, id: &PropertyId) -> Result<Option<Property>, StoreError> {
        Ok(self.lock()?.get(id).cloned())
    }

    async fn update_guarded(
        &self,
        id: &PropertyId,
        guard: &RowGuard<'_>,
    ) -> Result<Property, LifecycleError> {
        let mut rows = self.lock()?;
        let current = rows.get(id).ok_or(StoreError::NotFound)?;
        let next = guard(current)?;
        rows.insert(*id, next.clone());
        Ok(next)
    }

    async fn query(&self, query: &ListingQuery) -> Result<QueryPage, StoreError> {
        let rows = self.lock()?;
        Ok(query.evaluate(rows.values()))
    }

    async fn find_image(&self, image_id: &ImageId) -> Result<Option<PropertyId>, StoreError> {
        let rows = self.lock()?;
        Ok(rows
            .values()
            .find(|property| property.images.iter().any(|image| &image.id == image_id))
            .map(|property| property.id))
    }
}
