//! Membership ledger behavior, including the last-admin guard.

mod common;

use cohort_authz::{GroupLifecycle, MembershipLedger};
use cohort_core::error::CohortError;
use cohort_core::repository::StoreRead;
use uuid::Uuid;

#[tokio::test]
async fn last_admin_cannot_leave_until_replaced() {
    let (store, config, _) = common::setup().await;
    let groups = GroupLifecycle::new(store.clone(), &config).unwrap();
    let ledger = MembershipLedger::new(store.clone(), &config);
    let u1 = Uuid::new_v4();
    let u2 = Uuid::new_v4();

    let g1 = groups.create_group("g1", u1).await.unwrap();
    ledger.add_member(g1.id, u2, false).await.unwrap();

    let result = ledger.remove_member(g1.id, u1).await;
    assert!(
        matches!(result, Err(CohortError::InsufficientAdmins { group_id }) if group_id == g1.id),
        "removing the sole admin should fail, got {result:?}"
    );
    assert!(ledger.is_admin(g1.id, u1).await.unwrap());

    ledger.promote_to_admin(g1.id, u2).await.unwrap();
    ledger.remove_member(g1.id, u1).await.unwrap();

    let members = ledger.list_members(g1.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, u2);
    assert!(members[0].is_admin);
}

#[tokio::test]
async fn plain_members_leave_freely() {
    let (store, config, _) = common::setup().await;
    let groups = GroupLifecycle::new(store.clone(), &config).unwrap();
    let ledger = MembershipLedger::new(store.clone(), &config);
    let admin = Uuid::new_v4();
    let member = Uuid::new_v4();

    let group = groups.create_group("builders", admin).await.unwrap();
    ledger.add_member(group.id, member, false).await.unwrap();
    ledger.remove_member(group.id, member).await.unwrap();

    assert!(!ledger.is_member(group.id, member).await.unwrap());
    assert_eq!(store.count_admins(group.id).await.unwrap(), 1);
}

#[tokio::test]
async fn demoting_the_sole_admin_is_allowed() {
    let (store, config, _) = common::setup().await;
    let groups = GroupLifecycle::new(store.clone(), &config).unwrap();
    let ledger = MembershipLedger::new(store.clone(), &config);
    let admin = Uuid::new_v4();

    let group = groups.create_group("orphaned", admin).await.unwrap();
    ledger.demote_from_admin(group.id, admin).await.unwrap();

    assert!(ledger.is_member(group.id, admin).await.unwrap());
    assert!(!ledger.is_admin(group.id, admin).await.unwrap());
    assert_eq!(store.count_admins(group.id).await.unwrap(), 0);

    // With no admins left, a plain member can leave.
    ledger.remove_member(group.id, admin).await.unwrap();
    assert!(ledger.list_members(group.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn promotion_requires_membership() {
    let (store, config, _) = common::setup().await;
    let groups = GroupLifecycle::new(store.clone(), &config).unwrap();
    let ledger = MembershipLedger::new(store.clone(), &config);
    let admin = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    let group = groups.create_group("closed", admin).await.unwrap();

    let result = ledger.promote_to_admin(group.id, stranger).await;
    assert!(matches!(result, Err(CohortError::NotAMember { .. })));

    // Promoting an existing admin changes nothing.
    ledger.promote_to_admin(group.id, admin).await.unwrap();
    assert_eq!(store.count_admins(group.id).await.unwrap(), 1);
}

#[tokio::test]
async fn duplicate_membership_is_rejected() {
    let (store, config, _) = common::setup().await;
    let groups = GroupLifecycle::new(store.clone(), &config).unwrap();
    let ledger = MembershipLedger::new(store.clone(), &config);
    let admin = Uuid::new_v4();

    let group = groups.create_group("unique", admin).await.unwrap();
    let result = ledger.add_member(group.id, admin, false).await;

    assert!(matches!(result, Err(CohortError::AlreadyMember { .. })));
    assert!(ledger.is_admin(group.id, admin).await.unwrap());
}

#[tokio::test]
async fn membership_in_unknown_group_is_not_found() {
    let (store, config, _) = common::setup().await;
    let ledger = MembershipLedger::new(store, &config);

    let result = ledger
        .add_member(Uuid::new_v4(), Uuid::new_v4(), false)
        .await;
    assert!(matches!(result, Err(CohortError::NotFound { .. })));

    let result = ledger.remove_member(Uuid::new_v4(), Uuid::new_v4()).await;
    assert!(matches!(result, Err(CohortError::NotAMember { .. })));
}

#[tokio::test]
async fn bulk_add_skips_existing_members() {
    let (store, config, _) = common::setup().await;
    let groups = GroupLifecycle::new(store.clone(), &config).unwrap();
    let ledger = MembershipLedger::new(store.clone(), &config);
    let admin = Uuid::new_v4();
    let fresh = Uuid::new_v4();

    let group = groups.create_group("bulk", admin).await.unwrap();
    let added = ledger
        .add_members(group.id, &[admin, fresh, fresh])
        .await
        .unwrap();

    assert_eq!(added, 1);
    assert_eq!(ledger.list_members(group.id).await.unwrap().len(), 2);
    assert!(ledger.is_admin(group.id, admin).await.unwrap());
    assert!(!ledger.is_admin(group.id, fresh).await.unwrap());
}

#[tokio::test]
async fn joining_the_default_group_is_idempotent() {
    let (store, config, default) = common::setup().await;
    let ledger = MembershipLedger::new(store, &config);
    let user = Uuid::new_v4();

    assert!(ledger.join_default_group(user).await.unwrap());
    assert!(!ledger.join_default_group(user).await.unwrap());

    let groups = ledger.list_user_groups(user).await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].group.id, default.id);
    assert!(groups[0].is_default);
    assert!(!groups[0].is_admin);
}

#[tokio::test]
async fn user_groups_are_sorted_and_flagged() {
    let (store, config, _) = common::setup().await;
    let groups = GroupLifecycle::new(store.clone(), &config).unwrap();
    let ledger = MembershipLedger::new(store.clone(), &config);
    let user = Uuid::new_v4();

    groups.create_group("zeta", user).await.unwrap();
    let alpha = groups.create_group("alpha", Uuid::new_v4()).await.unwrap();
    ledger.add_member(alpha.id, user, false).await.unwrap();
    ledger.join_default_group(user).await.unwrap();

    let listed = ledger.list_user_groups(user).await.unwrap();
    let names: Vec<&str> = listed.iter().map(|g| g.group.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "shared.infra", "zeta"]);
    assert_eq!(
        listed.iter().map(|g| g.is_admin).collect::<Vec<_>>(),
        vec![false, false, true]
    );
    assert_eq!(
        listed.iter().map(|g| g.is_default).collect::<Vec<_>>(),
        vec![false, true, false]
    );
}
