use super::common::*;
use chrono::Utc;

use crate::listings::domain::PropertyStatus;
use crate::listings::lifecycle::{
    apply, check, check_restore, guarded, restore, rule_for, Permit, Transition, TRANSITION_TABLE,
};
use crate::listings::LifecycleError;

#[test]
fn table_has_one_rule_per_legal_move() {
    let legal = [
        (Transition::Publish, PropertyStatus::Draft),
        (Transition::Archive, PropertyStatus::Draft),
        (Transition::Archive, PropertyStatus::Published),
        (Transition::Archive, PropertyStatus::Archived),
        (Transition::SoftDelete, PropertyStatus::Draft),
        (Transition::SoftDelete, PropertyStatus::Published),
        (Transition::SoftDelete, PropertyStatus::Archived),
    ];
    assert_eq!(TRANSITION_TABLE.len(), legal.len());
    for (transition, from) in legal {
        assert!(rule_for(transition, from).is_some(), "{transition:?} from {from}");
    }

    assert!(rule_for(Transition::Publish, PropertyStatus::Published).is_none());
    assert!(rule_for(Transition::Publish, PropertyStatus::Archived).is_none());
    assert_eq!(
        rule_for(Transition::Archive, PropertyStatus::Published).map(|rule| rule.permit),
        Some(Permit::AdminOnly)
    );
}

#[test]
fn publish_moves_a_complete_draft_live() {
    let owner = owner();
    let property = listing(&owner, PropertyStatus::Draft, 0);

    let rule = check(&property, &owner, Transition::Publish).expect("publishable");
    let next = apply(&property, rule, Utc::now());

    assert_eq!(next.status, PropertyStatus::Published);
    assert!(next.deleted_at.is_none());
}

#[test]
fn publish_rejects_rows_that_are_not_drafts() {
    let owner = owner();
    for status in [PropertyStatus::Published, PropertyStatus::Archived] {
        let property = listing(&owner, status, 0);
        assert_eq!(
            check(&property, &owner, Transition::Publish),
            Err(LifecycleError::InvalidTransition {
                action: "publish",
                status,
            })
        );
    }
}

#[test]
fn publish_reports_the_first_missing_requirement() {
    let owner = owner();
    let mut property = listing(&owner, PropertyStatus::Draft, 0);
    property.images.clear();

    assert_eq!(
        check(&property, &owner, Transition::Publish),
        Err(LifecycleError::ValidationFailed(
            "at least one image is required".to_string()
        ))
    );
}

#[test]
fn archiving_a_published_listing_is_reserved_for_admins() {
    let owner = owner();
    let property = listing(&owner, PropertyStatus::Published, 0);

    assert!(matches!(
        check(&property, &owner, Transition::Archive),
        Err(LifecycleError::Forbidden(_))
    ));

    let rule = check(&property, &admin(), Transition::Archive).expect("admin may archive");
    assert_eq!(apply(&property, rule, Utc::now()).status, PropertyStatus::Archived);
}

#[test]
fn archiving_an_archived_row_changes_nothing() {
    let owner = owner();
    let property = listing(&owner, PropertyStatus::Archived, 0);

    let rule = check(&property, &owner, Transition::Archive).expect("idempotent archive");
    assert_eq!(apply(&property, rule, Utc::now()), property);
}

#[test]
fn soft_delete_stamps_the_row_and_forces_archived() {
    let owner = owner();
    for status in [
        PropertyStatus::Draft,
        PropertyStatus::Published,
        PropertyStatus::Archived,
    ] {
        let property = listing(&owner, status, 0);
        let now = Utc::now();
        let rule = check(&property, &owner, Transition::SoftDelete).expect("owner may delete");
        let next = apply(&property, rule, now);

        assert_eq!(next.deleted_at, Some(now));
        assert_eq!(next.status, PropertyStatus::Archived);
    }
}

#[test]
fn nothing_transitions_out_of_deleted() {
    let owner = owner();
    let mut property = listing(&owner, PropertyStatus::Archived, 0);
    property.deleted_at = Some(Utc::now());

    for transition in [Transition::Publish, Transition::Archive, Transition::SoftDelete] {
        assert_eq!(
            check(&property, &admin(), transition),
            Err(LifecycleError::NotFound)
        );
    }
}

#[test]
fn guarded_publish_conflicts_when_the_row_moved() {
    let owner = owner();
    let observed = listing(&owner, PropertyStatus::Draft, 0);
    let guard = guarded(Transition::Publish, owner, observed.stamp(), Utc::now());

    let mut archived_meanwhile = observed.clone();
    archived_meanwhile.status = PropertyStatus::Archived;

    assert!(matches!(
        guard(&archived_meanwhile),
        Err(LifecycleError::Conflict(_))
    ));
    assert_eq!(
        guard(&observed).map(|next| next.status),
        Ok(PropertyStatus::Published)
    );
}

#[test]
fn guarded_publish_revalidates_the_fresh_row() {
    let owner = owner();
    let observed = listing(&owner, PropertyStatus::Draft, 0);
    let guard = guarded(Transition::Publish, owner, observed.stamp(), Utc::now());

    let mut stripped = observed.clone();
    stripped.images.iter_mut().for_each(|image| image.deleted_at = Some(Utc::now()));

    assert_eq!(
        guard(&stripped),
        Err(LifecycleError::ValidationFailed(
            "at least one image is required".to_string()
        ))
    );
}

#[test]
fn publish_conflicts_when_the_row_is_deleted_underneath_it() {
    let owner = owner();
    let observed = listing(&owner, PropertyStatus::Draft, 0);
    let mut deleted = observed.clone();
    deleted.deleted_at = Some(Utc::now());
    deleted.status = PropertyStatus::Archived;

    let guard = guarded(Transition::Publish, owner, observed.stamp(), Utc::now());
    match guard(&deleted) {
        Err(LifecycleError::Conflict(message)) => assert!(message.contains("deleted")),
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn unguarded_writes_treat_a_concurrently_deleted_row_as_missing() {
    let owner = owner();
    let observed = listing(&owner, PropertyStatus::Draft, 0);
    let mut deleted = observed.clone();
    deleted.deleted_at = Some(Utc::now());
    deleted.status = PropertyStatus::Archived;

    for transition in [Transition::Archive, Transition::SoftDelete] {
        let guard = guarded(transition, owner, observed.stamp(), Utc::now());
        assert_eq!(guard(&deleted), Err(LifecycleError::NotFound));
    }
}

#[test]
fn restore_is_an_admin_recovery_path() {
    let owner = owner();
    let admin = admin();
    let mut property = listing(&owner, PropertyStatus::Published, 0);

    assert!(matches!(
        check_restore(&property, &admin),
        Err(LifecycleError::InvalidTransition {
            action: "restore",
            ..
        })
    ));
    assert!(matches!(
        check_restore(&property, &owner),
        Err(LifecycleError::Forbidden(_))
    ));

    property.deleted_at = Some(Utc::now());
    property.status = PropertyStatus::Archived;
    assert_eq!(check_restore(&property, &owner), Err(LifecycleError::NotFound));
    assert_eq!(check_restore(&property, &admin), Ok(()));

    let restored = restore(&property);
    assert!(restored.deleted_at.is_none());
    assert_eq!(restored.status, PropertyStatus::Archived);
}
