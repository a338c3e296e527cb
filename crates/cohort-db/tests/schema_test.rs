//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    cohort_db::run_migrations(&db).await.unwrap();

    // Verify that key tables exist by querying INFO FOR DB.
    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    for table in ["group", "project", "project_key", "project_variable"] {
        assert!(info_str.contains(table), "missing {table} table");
    }

    // Verify edge tables.
    assert!(info_str.contains("member_of"), "missing member_of edge");
    assert!(info_str.contains("has_access"), "missing has_access edge");

    assert!(
        info_str.contains("schema_version"),
        "missing schema_version ledger"
    );
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    // Running twice must not fail.
    cohort_db::run_migrations(&db).await.unwrap();
    cohort_db::run_migrations(&db).await.unwrap();

    let mut result = db
        .query("SELECT VALUE label FROM schema_version")
        .await
        .unwrap();
    let labels: Vec<String> = result.take(0).unwrap();
    assert_eq!(labels, vec!["groups_projects_edges"]);
}

#[tokio::test]
async fn can_create_record_after_migration() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    cohort_db::run_migrations(&db).await.unwrap();

    db.query("CREATE project SET project_key = 'PRJ', name = 'Proj'")
        .await
        .unwrap()
        .check()
        .unwrap();

    let mut result = db
        .query("SELECT * FROM project WHERE project_key = 'PRJ'")
        .await
        .unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn unique_index_prevents_duplicate_group_names() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    cohort_db::run_migrations(&db).await.unwrap();

    db.query("CREATE group SET name = 'ops'")
        .await
        .unwrap()
        .check()
        .unwrap();

    // A duplicate name must fail.
    let result = db
        .query("CREATE group SET name = 'ops'")
        .await
        .unwrap()
        .check();

    assert!(result.is_err(), "duplicate group name should be rejected");
}

#[tokio::test]
async fn level_assertion_rejects_unknown_values() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    cohort_db::run_migrations(&db).await.unwrap();

    let result = db
        .query("RELATE group:`g` -> has_access -> project:`p` SET level = 5")
        .await
        .unwrap()
        .check();

    assert!(result.is_err(), "level 5 is not a permission level");
}
