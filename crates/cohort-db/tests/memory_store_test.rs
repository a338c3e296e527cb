//! Integration tests for the in-memory store.

use cohort_core::error::{CohortError, ErrorKind};
use cohort_core::models::group::Group;
use cohort_core::models::membership::Membership;
use cohort_core::models::permission::{PermissionGrant, PermissionLevel};
use cohort_core::models::project::{Project, ProjectVariable, VariableKind};
use cohort_core::repository::{AuthzStore, GrantQuery, StoreRead};
use cohort_core::transaction::{Mutation, MutationKind};
use cohort_db::MemoryStore;
use uuid::Uuid;

async fn seed_group(store: &MemoryStore, name: &str, admin: Uuid) -> Group {
    let group = Group::new(name);
    let mut tx = store.begin().await.unwrap();
    tx.stage(Mutation::InsertGroup(group.clone()));
    tx.stage(Mutation::InsertMembership(Membership::new(group.id, admin, true)));
    tx.commit().await.unwrap();
    group
}

#[tokio::test]
async fn dropped_transaction_discards_staged_writes() {
    let store = MemoryStore::new();
    let group = Group::new("ghost");

    {
        let mut tx = store.begin().await.unwrap();
        tx.stage(Mutation::InsertGroup(group.clone()));
    }

    assert!(store.get_group(group.id).await.unwrap().is_none());

    // The writer permit was released with the transaction.
    let tx = store.begin().await.unwrap();
    tx.rollback();
}

#[tokio::test]
async fn injected_failure_rolls_back_the_whole_batch() {
    let store = MemoryStore::new();
    let admin = Uuid::new_v4();
    let group = seed_group(&store, "sturdy", admin).await;

    store.fail_on(MutationKind::DeleteGroup);
    let mut tx = store.begin().await.unwrap();
    tx.stage(Mutation::DeleteGroupMemberships { group_id: group.id });
    tx.stage(Mutation::DeleteGroupGrants { group_id: group.id });
    tx.stage(Mutation::DeleteGroup { group_id: group.id });
    let result = tx.commit().await;

    assert!(matches!(result, Err(CohortError::Database(_))));
    assert!(store.get_group(group.id).await.unwrap().is_some());
    assert!(
        store
            .get_membership(group.id, admin)
            .await
            .unwrap()
            .is_some()
    );

    store.clear_failure();
    let mut tx = store.begin().await.unwrap();
    tx.stage(Mutation::DeleteGroup { group_id: group.id });
    tx.commit().await.unwrap();
    assert!(store.get_group(group.id).await.unwrap().is_none());
}

#[tokio::test]
async fn guards_are_checked_at_apply_time() {
    let store = MemoryStore::new();
    let admin = Uuid::new_v4();
    let group = seed_group(&store, "guarded", admin).await;

    let mut tx = store.begin().await.unwrap();
    tx.stage(Mutation::DeleteMembership {
        group_id: group.id,
        user_id: admin,
    });
    assert!(matches!(
        tx.commit().await,
        Err(CohortError::InsufficientAdmins { .. })
    ));

    let stranger = Uuid::new_v4();
    let mut tx = store.begin().await.unwrap();
    tx.stage(Mutation::SetAdmin {
        group_id: group.id,
        user_id: stranger,
        is_admin: true,
    });
    assert!(matches!(
        tx.commit().await,
        Err(CohortError::NotAMember { .. })
    ));

    // Demoting a non-member changes nothing and does not fail.
    let mut tx = store.begin().await.unwrap();
    tx.stage(Mutation::SetAdmin {
        group_id: group.id,
        user_id: stranger,
        is_admin: false,
    });
    tx.commit().await.unwrap();
    assert_eq!(store.count_admins(group.id).await.unwrap(), 1);
}

#[tokio::test]
async fn rename_to_a_taken_name_conflicts() {
    let store = MemoryStore::new();
    seed_group(&store, "taken", Uuid::new_v4()).await;
    let other = seed_group(&store, "other", Uuid::new_v4()).await;

    let mut tx = store.begin().await.unwrap();
    tx.stage(Mutation::RenameGroup {
        group_id: other.id,
        name: "taken".into(),
    });
    assert!(matches!(
        tx.commit().await,
        Err(CohortError::NameConflict { ref name }) if name == "taken"
    ));
}

#[tokio::test]
async fn duplicate_variable_name_conflicts_and_persists_nothing() {
    let store = MemoryStore::new();
    let project = Project::new("ENV", "Env");

    let mut tx = store.begin().await.unwrap();
    tx.stage(Mutation::InsertProject(project.clone()));
    for value in ["eu-west-1", "us-east-1"] {
        tx.stage(Mutation::InsertProjectVariable(ProjectVariable {
            id: Uuid::new_v4(),
            project_id: project.id,
            name: "region".into(),
            kind: VariableKind::String,
            value: value.into(),
        }));
    }
    let err = tx.commit().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(
        err.to_string(),
        "Duplicate variable name in project ENV: region"
    );
    assert!(store.get_project(project.id).await.unwrap().is_none());
    assert!(
        store
            .list_project_variables(project.id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn grant_queries_filter_by_group_and_project() {
    let store = MemoryStore::new();
    let a = seed_group(&store, "a", Uuid::new_v4()).await;
    let b = seed_group(&store, "b", Uuid::new_v4()).await;
    let p1 = Project::new("P1", "One");
    let p2 = Project::new("P2", "Two");

    let mut tx = store.begin().await.unwrap();
    tx.stage(Mutation::InsertProject(p1.clone()));
    tx.stage(Mutation::InsertProject(p2.clone()));
    for (group, project, level) in [
        (a.id, p1.id, PermissionLevel::Read),
        (a.id, p2.id, PermissionLevel::ReadWrite),
        (b.id, p1.id, PermissionLevel::ReadWriteExecute),
    ] {
        tx.stage(Mutation::UpsertGrant(PermissionGrant {
            group_id: group,
            project_id: project,
            level,
        }));
    }
    tx.commit().await.unwrap();

    let only_a = store
        .list_grants(&GrantQuery {
            group_ids: vec![a.id],
            project_ids: None,
        })
        .await
        .unwrap();
    assert_eq!(only_a.len(), 2);

    let p1_both = store
        .list_grants(&GrantQuery {
            group_ids: vec![a.id, b.id],
            project_ids: Some(vec![p1.id]),
        })
        .await
        .unwrap();
    assert_eq!(p1_both.len(), 2);
    assert!(p1_both.iter().all(|g| g.project_id == p1.id));

    let projects = store.list_projects_by_ids(&[p2.id, p1.id]).await.unwrap();
    let keys: Vec<&str> = projects.iter().map(|p| p.key.as_str()).collect();
    assert_eq!(keys, vec!["P1", "P2"]);
}
