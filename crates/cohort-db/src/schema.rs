//! Versioned schema for the SurrealDB store.
//!
//! Tables are SCHEMAFULL. UUIDs are stored as strings and enums as
//! strings with ASSERT constraints. Membership and access grants are
//! graph edges, each with a unique (`in`, `out`) index so a pair can
//! exist at most once.
//!
//! Applied versions are recorded in `schema_version`; a version is
//! applied at most once per database.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info};

use crate::error::DbError;

const LEDGER_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS schema_version SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE schema_version TYPE int;
DEFINE FIELD IF NOT EXISTS label ON TABLE schema_version TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE schema_version TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_schema_version ON TABLE schema_version \
    COLUMNS version UNIQUE;
";

const RECORD_VERSION: &str = "CREATE schema_version SET version = $version, label = $label";

#[derive(SurrealValue)]
struct AppliedVersion {
    version: u32,
}

/// One schema revision. Versions ascend through [`STEPS`].
struct Step {
    version: u32,
    label: &'static str,
    ddl: &'static str,
}

static STEPS: &[Step] = &[Step {
    version: 1,
    label: "groups_projects_edges",
    ddl: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1: initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Groups
-- =======================================================================
DEFINE TABLE group SCHEMAFULL;
DEFINE FIELD name ON TABLE group TYPE string;
DEFINE FIELD created_at ON TABLE group TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE group TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_group_name ON TABLE group COLUMNS name UNIQUE;

-- =======================================================================
-- Projects
-- =======================================================================
DEFINE TABLE project SCHEMAFULL;
DEFINE FIELD project_key ON TABLE project TYPE string;
DEFINE FIELD name ON TABLE project TYPE string;
DEFINE FIELD created_at ON TABLE project TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE project TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_project_unique_key ON TABLE project \
    COLUMNS project_key UNIQUE;

DEFINE TABLE project_key SCHEMAFULL;
DEFINE FIELD project_id ON TABLE project_key TYPE string;
DEFINE FIELD name ON TABLE project_key TYPE string;
DEFINE FIELD kind ON TABLE project_key TYPE string \
    ASSERT $value IN ['Ssh', 'Pgp'];
DEFINE FIELD public_key ON TABLE project_key TYPE string;
DEFINE FIELD private_key ON TABLE project_key TYPE string;
DEFINE FIELD key_id ON TABLE project_key TYPE string;
DEFINE INDEX idx_key_project_name ON TABLE project_key \
    COLUMNS project_id, name UNIQUE;

DEFINE TABLE project_variable SCHEMAFULL;
DEFINE FIELD project_id ON TABLE project_variable TYPE string;
DEFINE FIELD name ON TABLE project_variable TYPE string;
DEFINE FIELD kind ON TABLE project_variable TYPE string \
    ASSERT $value IN ['String', 'Secret', 'Text'];
DEFINE FIELD var_value ON TABLE project_variable TYPE string;
DEFINE INDEX idx_variable_project_name ON TABLE project_variable \
    COLUMNS project_id, name UNIQUE;

-- =======================================================================
-- Edges
-- =======================================================================
-- user -> member_of -> group
DEFINE TABLE member_of TYPE RELATION SCHEMAFULL;
DEFINE FIELD is_admin ON TABLE member_of TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE member_of TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_member_of_pair ON TABLE member_of COLUMNS in, out UNIQUE;

-- group -> has_access -> project
DEFINE TABLE has_access TYPE RELATION SCHEMAFULL;
DEFINE FIELD level ON TABLE has_access TYPE int \
    ASSERT $value IN [0, 4, 6, 7];
DEFINE INDEX idx_has_access_pair ON TABLE has_access COLUMNS in, out UNIQUE;
";

/// Brings the schema behind `db` up to the latest version.
///
/// Safe to call on every start: versions already in `schema_version`
/// are skipped.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(LEDGER_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(format!("schema_version ledger: {e}")))?;

    let from = applied_version(db).await?;
    let pending: Vec<&Step> = STEPS.iter().filter(|s| s.version > from).collect();
    for step in &pending {
        apply(db, step).await?;
    }

    let to = pending.last().map_or(from, |s| s.version);
    info!(from, to, applied = pending.len(), "Schema up to date");
    Ok(())
}

async fn applied_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    let mut result = db
        .query("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
        .await?;
    let latest: Vec<AppliedVersion> = result.take(0)?;
    Ok(latest.first().map_or(0, |v| v.version))
}

/// Runs a step's DDL and records it in the same request.
async fn apply<C: Connection>(db: &Surreal<C>, step: &Step) -> Result<(), DbError> {
    debug!(
        version = step.version,
        label = step.label,
        "Applying schema step"
    );
    db.query(format!("{}\n{RECORD_VERSION};", step.ddl))
        .bind(("version", step.version))
        .bind(("label", step.label))
        .await?
        .check()
        .map_err(|e| DbError::Migration(format!("v{} {}: {e}", step.version, step.label)))?;
    Ok(())
}

/// DDL of the first schema version, for stores set up without the ledger.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_v1_defines_every_unique_index() {
        for index in [
            "idx_group_name",
            "idx_project_unique_key",
            "idx_key_project_name",
            "idx_variable_project_name",
            "idx_member_of_pair",
            "idx_has_access_pair",
        ] {
            assert!(SCHEMA_V1.contains(index), "missing {index}");
        }
    }

    #[test]
    fn steps_ascend_from_one() {
        assert_eq!(STEPS[0].version, 1);
        for pair in STEPS.windows(2) {
            assert!(
                pair[0].version < pair[1].version,
                "{} out of order",
                pair[1].label
            );
        }
    }
}
