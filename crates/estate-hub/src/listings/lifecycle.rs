//! Property state machine.
//!
//! `draft -> published`, `draft|published -> archived`, `any -> deleted`.
//! Deletion is a flag (`deleted_at`) that also forces `archived`, and nothing in
//! the table clears it again. [`restore`] is a separate admin recovery path.

use chrono::{DateTime, Utc};

use super::domain::{Caller, Property, PropertyStatus, StateStamp};
use super::error::LifecycleError;
use super::policy;
use super::validation::validate_for_publish;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Publish,
    Archive,
    SoftDelete,
}

impl Transition {
    pub const fn action(self) -> &'static str {
        match self {
            Transition::Publish => "publish",
            Transition::Archive => "archive",
            Transition::SoftDelete => "delete",
        }
    }
}

/// Who may fire a rule, on top of the generic owner-or-admin write gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    OwnerOrAdmin,
    AdminOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    SetStatus(PropertyStatus),
    /// Accepted but changes nothing (archiving an archived row).
    Unchanged,
    MarkDeleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    pub transition: Transition,
    pub from: PropertyStatus,
    pub permit: Permit,
    pub effect: Effect,
    /// Re-check the observed state stamp inside the write and fail with
    /// `Conflict` if it moved.
    pub guarded: bool,
}

pub const TRANSITION_TABLE: &[TransitionRule] = &[
    TransitionRule {
        transition: Transition::Publish,
        from: PropertyStatus::Draft,
        permit: Permit::OwnerOrAdmin,
        effect: Effect::SetStatus(PropertyStatus::Published),
        guarded: true,
    },
    TransitionRule {
        transition: Transition::Archive,
        from: PropertyStatus::Draft,
        permit: Permit::OwnerOrAdmin,
        effect: Effect::SetStatus(PropertyStatus::Archived),
        guarded: false,
    },
    TransitionRule {
        transition: Transition::Archive,
        from: PropertyStatus::Published,
        permit: Permit::AdminOnly,
        effect: Effect::SetStatus(PropertyStatus::Archived),
        guarded: false,
    },
    TransitionRule {
        transition: Transition::Archive,
        from: PropertyStatus::Archived,
        permit: Permit::OwnerOrAdmin,
        effect: Effect::Unchanged,
        guarded: false,
    },
    TransitionRule {
        transition: Transition::SoftDelete,
        from: PropertyStatus::Draft,
        permit: Permit::OwnerOrAdmin,
        effect: Effect::MarkDeleted,
        guarded: false,
    },
    TransitionRule {
        transition: Transition::SoftDelete,
        from: PropertyStatus::Published,
        permit: Permit::OwnerOrAdmin,
        effect: Effect::MarkDeleted,
        guarded: false,
    },
    TransitionRule {
        transition: Transition::SoftDelete,
        from: PropertyStatus::Archived,
        permit: Permit::OwnerOrAdmin,
        effect: Effect::MarkDeleted,
        guarded: false,
    },
];

pub fn rule_for(transition: Transition, from: PropertyStatus) -> Option<&'static TransitionRule> {
    TRANSITION_TABLE
        .iter()
        .find(|rule| rule.transition == transition && rule.from == from)
}

/// Authorize and validate `transition` against a snapshot of `property`.
pub fn check(
    property: &Property,
    caller: &Caller,
    transition: Transition,
) -> Result<&'static TransitionRule, LifecycleError> {
    policy::authorize_mutation(property, caller)?;

    let rule = rule_for(transition, property.status).ok_or(LifecycleError::InvalidTransition {
        action: transition.action(),
        status: property.status,
    })?;

    if rule.permit == Permit::AdminOnly && !caller.is_admin() {
        return Err(LifecycleError::forbidden(format!(
            "only admins can {} a {} property",
            transition.action(),
            property.status
        )));
    }

    if transition == Transition::Publish {
        validate_for_publish(property, property.active_image_count())?;
    }

    Ok(rule)
}

/// Produce the next row. Keeps `deleted_at != None => archived`.
pub fn apply(property: &Property, rule: &TransitionRule, now: DateTime<Utc>) -> Property {
    let mut next = property.clone();
    match rule.effect {
        Effect::SetStatus(status) => next.status = status,
        Effect::Unchanged => {}
        Effect::MarkDeleted => {
            next.deleted_at = Some(now);
            next.status = PropertyStatus::Archived;
        }
    }
    next
}

/// Build the closure a store runs inside its atomic unit for `transition`.
///
/// `observed` is the stamp seen when the caller was first authorized. Rules
/// marked `guarded` abort with `Conflict` when the fresh row no longer matches
/// it, including a row deleted in between. Other rules report a deleted row as
/// `NotFound`. Every rule re-runs [`check`] on the fresh row before writing.
pub fn guarded(
    transition: Transition,
    caller: Caller,
    observed: StateStamp,
    now: DateTime<Utc>,
) -> impl Fn(&Property) -> Result<Property, LifecycleError> + Send + Sync + 'static {
    let requires_stamp = rule_for(transition, observed.status).is_some_and(|rule| rule.guarded);

    move |fresh: &Property| {
        if requires_stamp && fresh.stamp() != observed {
            let current = if fresh.is_deleted() {
                "deleted".to_string()
            } else {
                fresh.status.to_string()
            };
            return Err(LifecycleError::Conflict(format!(
                "property moved from {} to {current} before {} completed",
                observed.status,
                transition.action()
            )));
        }
        if fresh.is_deleted() {
            return Err(LifecycleError::NotFound);
        }
        let rule = check(fresh, &caller, transition)?;
        Ok(apply(fresh, rule, now))
    }
}

/// Admin-only recovery: clear `deleted_at`, leave the row archived.
pub fn check_restore(property: &Property, caller: &Caller) -> Result<(), LifecycleError> {
    if !caller.is_admin() {
        return if policy::can_view(property, Some(caller), false) {
            Err(LifecycleError::forbidden("only admins can restore properties"))
        } else {
            Err(LifecycleError::NotFound)
        };
    }
    if !property.is_deleted() {
        return Err(LifecycleError::InvalidTransition {
            action: "restore",
            status: property.status,
        });
    }
    Ok(())
}

pub fn restore(property: &Property) -> Property {
    let mut next = property.clone();
    next.deleted_at = None;
    next.status = PropertyStatus::Archived;
    next
}
