//! Read and write gates shared by every listing operation.
//!
//! All functions are pure. Callers that cannot even see a property get
//! `NotFound` rather than `Forbidden` so private drafts do not leak.

use super::domain::{Caller, Property, PropertyStatus, Role};
use super::error::LifecycleError;

/// Read gate. Deleted rows are only visible to admins who asked for them.
pub fn can_view(property: &Property, caller: Option<&Caller>, include_deleted: bool) -> bool {
    if property.is_deleted() {
        return include_deleted && caller.is_some_and(Caller::is_admin);
    }

    property.status == PropertyStatus::Published
        || caller.is_some_and(|caller| caller.is_admin() || property.owned_by(&caller.user_id))
}

/// Generic write gate used by update, archive, delete and image management.
pub fn can_mutate(property: &Property, caller: &Caller) -> bool {
    caller.is_admin() || property.owned_by(&caller.user_id)
}

pub fn can_create(caller: &Caller) -> bool {
    matches!(caller.role, Role::Owner | Role::Admin)
}

/// Field-level edit gate. Admins may always edit; owners only drafts, unless
/// `allow_owner_edit_after_publish` also opens published listings.
pub fn can_edit_fields(
    property: &Property,
    caller: &Caller,
    allow_owner_edit_after_publish: bool,
) -> bool {
    if !can_mutate(property, caller) {
        return false;
    }
    if caller.is_admin() {
        return true;
    }
    match property.status {
        PropertyStatus::Draft => true,
        PropertyStatus::Published => allow_owner_edit_after_publish,
        PropertyStatus::Archived => false,
    }
}

pub fn authorize_view(
    property: &Property,
    caller: Option<&Caller>,
    include_deleted: bool,
) -> Result<(), LifecycleError> {
    if can_view(property, caller, include_deleted) {
        Ok(())
    } else {
        Err(LifecycleError::NotFound)
    }
}

/// Resolve the write gate into the error the caller is allowed to observe.
pub fn authorize_mutation(property: &Property, caller: &Caller) -> Result<(), LifecycleError> {
    if property.is_deleted() {
        return Err(LifecycleError::NotFound);
    }
    if can_mutate(property, caller) {
        return Ok(());
    }
    if can_view(property, Some(caller), false) {
        Err(LifecycleError::forbidden(
            "you can only manage your own properties",
        ))
    } else {
        Err(LifecycleError::NotFound)
    }
}

pub fn authorize_create(caller: &Caller) -> Result<(), LifecycleError> {
    if can_create(caller) {
        Ok(())
    } else {
        Err(LifecycleError::forbidden(
            "only owners and admins can create properties",
        ))
    }
}
