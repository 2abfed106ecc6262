use rust_decimal::Decimal;

use super::domain::{Property, PropertyChanges, PropertyDraft};
use super::error::LifecycleError;

pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_LOCATION_LEN: usize = 255;

/// First unmet requirement for going live. Checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PublishRequirement {
    #[error("title must not be empty")]
    Title,
    #[error("description must not be empty")]
    Description,
    #[error("location must not be empty")]
    Location,
    #[error("price must be greater than 0")]
    Price,
    #[error("at least one image is required")]
    Images,
}

impl From<PublishRequirement> for LifecycleError {
    fn from(value: PublishRequirement) -> Self {
        LifecycleError::ValidationFailed(value.to_string())
    }
}

/// Completeness gate for `draft -> published`. Short-circuits on the first failure.
pub fn validate_for_publish(
    property: &Property,
    image_count: usize,
) -> Result<(), PublishRequirement> {
    if property.title.trim().is_empty() {
        return Err(PublishRequirement::Title);
    }
    if property.description.trim().is_empty() {
        return Err(PublishRequirement::Description);
    }
    if property.location.trim().is_empty() {
        return Err(PublishRequirement::Location);
    }
    if property.price <= Decimal::ZERO {
        return Err(PublishRequirement::Price);
    }
    if image_count == 0 {
        return Err(PublishRequirement::Images);
    }
    Ok(())
}

/// Shape checks applied to every draft write. Incomplete drafts are fine.
pub fn validate_draft_input(draft: &PropertyDraft) -> Result<(), LifecycleError> {
    check_fields(
        Some(draft.title.as_str()),
        Some(draft.location.as_str()),
        Some(draft.price),
    )
}

pub fn validate_changes(changes: &PropertyChanges) -> Result<(), LifecycleError> {
    if changes.is_empty() {
        return Err(LifecycleError::validation("no changes supplied"));
    }
    check_fields(
        changes.title.as_deref(),
        changes.location.as_deref(),
        changes.price,
    )
}

fn check_fields(
    title: Option<&str>,
    location: Option<&str>,
    price: Option<Decimal>,
) -> Result<(), LifecycleError> {
    if title.is_some_and(|title| title.chars().count() > MAX_TITLE_LEN) {
        return Err(LifecycleError::validation(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    if location.is_some_and(|location| location.chars().count() > MAX_LOCATION_LEN) {
        return Err(LifecycleError::validation(format!(
            "location must be at most {MAX_LOCATION_LEN} characters"
        )));
    }
    if price.is_some_and(|price| price < Decimal::ZERO) {
        return Err(LifecycleError::validation("price must not be negative"));
    }
    Ok(())
}
