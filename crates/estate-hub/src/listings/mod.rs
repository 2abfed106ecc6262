//! Property lifecycle and access control.
//!
//! Every read and write on a listing goes through [`ListingService`]: the
//! visibility policy decides who may see or touch a row, the transition table
//! decides which status moves are legal, the publish validator gates
//! `draft -> published`, and the store applies each write atomically against
//! the freshly read row.

mod config;
pub mod domain;
mod error;
pub mod identity;
pub mod lifecycle;
pub mod media;
pub mod policy;
pub mod projection;
pub mod query;
pub mod router;
pub mod service;
pub mod store;
pub mod validation;

#[cfg(test)]
mod tests;

pub use config::ListingEngineConfig;
pub use domain::{
    Caller, Image, ImageId, Property, PropertyChanges, PropertyDraft, PropertyId, PropertyStatus,
    Role, StateStamp, UserId,
};
pub use error::LifecycleError;
pub use identity::{authenticate, Identity, IdentityError, IdentityProvider};
pub use lifecycle::Transition;
pub use media::{ImageUpload, MediaError, MediaUploader, StoredMedia, UploadFailure, UploadReport};
pub use projection::{CounterError, CounterSource, ImageView, NoCounters, PropertyView};
pub use query::{Page, PageMeta, PropertyFilter};
pub use router::listing_router;
pub use service::ListingService;
pub use store::{InMemoryPropertyStore, PropertyStore, StoreError};
pub use validation::PublishRequirement;
