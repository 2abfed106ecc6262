use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{Image, ImageId, Property, PropertyId, PropertyStatus, UserId};

/// Read-only aggregates owned by the favorites and messaging features.
#[async_trait]
pub trait CounterSource: Send + Sync {
    async fn count_favorites(&self, property_id: &PropertyId) -> Result<u64, CounterError>;
    async fn count_messages(&self, property_id: &PropertyId) -> Result<u64, CounterError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CounterError {
    #[error("counter source unavailable: {0}")]
    Unavailable(String),
}

/// Source that knows nothing; every count reads as zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCounters;

#[async_trait]
impl CounterSource for NoCounters {
    async fn count_favorites(&self, _property_id: &PropertyId) -> Result<u64, CounterError> {
        Ok(0)
    }

    async fn count_messages(&self, _property_id: &PropertyId) -> Result<u64, CounterError> {
        Ok(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageView {
    pub id: ImageId,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Image> for ImageView {
    fn from(image: &Image) -> Self {
        Self {
            id: image.id,
            url: image.url.clone(),
            created_at: image.created_at,
        }
    }
}

/// Outward shape of a property: lifecycle fields plus point-in-time counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyView {
    pub id: PropertyId,
    pub title: String,
    pub description: String,
    pub location: String,
    pub price: Decimal,
    pub status: PropertyStatus,
    pub owner_id: UserId,
    pub images: Vec<ImageView>,
    pub favorites_count: u64,
    pub messages_count: u64,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl PropertyView {
    pub fn without_counts(property: &Property) -> Self {
        Self {
            id: property.id,
            title: property.title.clone(),
            description: property.description.clone(),
            location: property.location.clone(),
            price: property.price,
            status: property.status,
            owner_id: property.owner_id,
            images: property.active_images().map(ImageView::from).collect(),
            favorites_count: 0,
            messages_count: 0,
            created_at: property.created_at,
            deleted_at: property.deleted_at,
        }
    }
}

/// Attach counters after every lifecycle decision has been made.
/// A slow or failing source degrades to `0`; it never fails the projection.
pub async fn project<C>(property: &Property, counters: &C, deadline: Duration) -> PropertyView
where
    C: CounterSource + ?Sized,
{
    let mut view = PropertyView::without_counts(property);
    view.favorites_count = settle(
        "favorites",
        &property.id,
        tokio::time::timeout(deadline, counters.count_favorites(&property.id)).await,
    );
    view.messages_count = settle(
        "messages",
        &property.id,
        tokio::time::timeout(deadline, counters.count_messages(&property.id)).await,
    );
    view
}

fn settle(
    counter: &'static str,
    property_id: &PropertyId,
    outcome: Result<Result<u64, CounterError>, tokio::time::error::Elapsed>,
) -> u64 {
    match outcome {
        Ok(Ok(count)) => count,
        Ok(Err(err)) => {
            debug!(%property_id, counter, error = %err, "counter unavailable, reporting 0");
            0
        }
        Err(_) => {
            debug!(%property_id, counter, "counter timed out, reporting 0");
            0
        }
    }
}
