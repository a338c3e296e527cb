//! Renders a [`WriteBatch`] into a single SurrealQL transaction.
//!
//! Record IDs are UUIDs and are formatted into the query text. Free text
//! (names, key material, variable values) is carried in one bound array
//! parameter, `$batch`, and referenced as `$batch[n].field`.
//!
//! Guards are `IF … { THROW "cohort-guard-n" }` statements. When the
//! transaction fails, statement errors are scanned for guard markers and
//! unique index names to recover a typed [`CohortError`].

use cohort_core::error::{CohortError, CohortResult};
use cohort_core::transaction::{Mutation, WriteBatch};
use serde_json::{Value, json};
use surrealdb::Connection;
use tracing::debug;
use uuid::Uuid;

use super::{SurrealStore, record};
use crate::error::DbError;

const GUARD_PREFIX: &str = "cohort-guard-";

struct BatchQuery {
    sql: String,
    params: Vec<Value>,
    guards: Vec<CohortError>,
}

impl BatchQuery {
    fn render(batch: &WriteBatch) -> Self {
        let mut query = Self {
            sql: String::from("BEGIN TRANSACTION;\n"),
            params: Vec::new(),
            guards: Vec::new(),
        };
        for (index, mutation) in batch.iter().enumerate() {
            query.push(index, mutation);
        }
        query.sql.push_str("COMMIT TRANSACTION;\n");
        query
    }

    fn param(&mut self, value: Value) -> String {
        let slot = self.params.len();
        self.params.push(value);
        format!("$batch[{slot}]")
    }

    fn statement(&mut self, sql: &str) {
        self.sql.push_str(sql);
        self.sql.push_str(";\n");
    }

    fn guard(&mut self, condition: &str, error: CohortError) {
        let marker = format!("{GUARD_PREFIX}{}", self.guards.len());
        self.statement(&format!("IF {condition} {{ THROW \"{marker}\" }}"));
        self.guards.push(error);
    }

    fn push(&mut self, index: usize, mutation: &Mutation) {
        match mutation {
            Mutation::InsertGroup(group) => {
                let p = self.param(json!({
                    "id": group.id.to_string(),
                    "name": group.name,
                    "created_at": group.created_at.to_rfc3339(),
                    "updated_at": group.updated_at.to_rfc3339(),
                }));
                self.statement(&format!(
                    "CREATE type::record('group', {p}.id) SET name = {p}.name, \
                     created_at = <datetime>{p}.created_at, \
                     updated_at = <datetime>{p}.updated_at RETURN NONE"
                ));
            }
            Mutation::RenameGroup { group_id, name } => {
                let p = self.param(json!({ "name": name }));
                self.statement(&format!(
                    "UPDATE {} SET name = {p}.name, updated_at = time::now() RETURN NONE",
                    record("group", *group_id)
                ));
            }
            Mutation::DeleteGroup { group_id } => {
                self.statement(&format!("DELETE {}", record("group", *group_id)));
            }
            Mutation::InsertMembership(membership) => {
                let p = self.param(json!({
                    "created_at": membership.created_at.to_rfc3339(),
                }));
                self.statement(&format!(
                    "RELATE {} -> member_of -> {} SET is_admin = {}, \
                     created_at = <datetime>{p}.created_at RETURN NONE",
                    record("user", membership.user_id),
                    record("group", membership.group_id),
                    membership.is_admin,
                ));
            }
            Mutation::SetAdmin {
                group_id,
                user_id,
                is_admin,
            } => {
                let pair = edge_filter(*group_id, *user_id);
                if *is_admin {
                    self.guard(
                        &format!("array::len((SELECT VALUE id FROM member_of WHERE {pair})) = 0"),
                        CohortError::NotAMember {
                            group_id: *group_id,
                            user_id: *user_id,
                        },
                    );
                }
                self.statement(&format!(
                    "UPDATE member_of SET is_admin = {is_admin} WHERE {pair} RETURN NONE"
                ));
            }
            Mutation::DeleteMembership { group_id, user_id } => {
                let pair = edge_filter(*group_id, *user_id);
                let prior = format!("$prior_{index}");
                self.statement(&format!(
                    "LET {prior} = (SELECT VALUE is_admin FROM member_of WHERE {pair})"
                ));
                self.guard(
                    &format!("array::len({prior}) = 0"),
                    CohortError::NotAMember {
                        group_id: *group_id,
                        user_id: *user_id,
                    },
                );
                self.statement(&format!("DELETE member_of WHERE {pair}"));
                self.guard(
                    &format!(
                        "{prior}[0] = true AND array::len((SELECT VALUE id FROM member_of \
                         WHERE out = {} AND is_admin = true)) = 0",
                        record("group", *group_id)
                    ),
                    CohortError::InsufficientAdmins {
                        group_id: *group_id,
                    },
                );
            }
            Mutation::DeleteGroupMemberships { group_id } => {
                self.statement(&format!(
                    "DELETE member_of WHERE out = {}",
                    record("group", *group_id)
                ));
            }
            Mutation::UpsertGrant(grant) => {
                let group = record("group", grant.group_id);
                let project = record("project", grant.project_id);
                self.statement(&format!(
                    "DELETE has_access WHERE in = {group} AND out = {project}"
                ));
                self.statement(&format!(
                    "RELATE {group} -> has_access -> {project} SET level = {} RETURN NONE",
                    grant.level.as_i64()
                ));
            }
            Mutation::DeleteGrant {
                group_id,
                project_id,
            } => {
                self.statement(&format!(
                    "DELETE has_access WHERE in = {} AND out = {}",
                    record("group", *group_id),
                    record("project", *project_id)
                ));
            }
            Mutation::DeleteGroupGrants { group_id } => {
                self.statement(&format!(
                    "DELETE has_access WHERE in = {}",
                    record("group", *group_id)
                ));
            }
            Mutation::DeleteProjectGrants { project_id } => {
                self.statement(&format!(
                    "DELETE has_access WHERE out = {}",
                    record("project", *project_id)
                ));
            }
            Mutation::InsertProject(project) => {
                let p = self.param(json!({
                    "id": project.id.to_string(),
                    "key": project.key,
                    "name": project.name,
                    "created_at": project.created_at.to_rfc3339(),
                    "updated_at": project.updated_at.to_rfc3339(),
                }));
                self.statement(&format!(
                    "CREATE type::record('project', {p}.id) SET project_key = {p}.key, \
                     name = {p}.name, created_at = <datetime>{p}.created_at, \
                     updated_at = <datetime>{p}.updated_at RETURN NONE"
                ));
            }
            Mutation::DeleteProject { project_id } => {
                self.statement(&format!("DELETE {}", record("project", *project_id)));
            }
            Mutation::InsertProjectKey(key) => {
                let p = self.param(json!({
                    "id": key.id.to_string(),
                    "project_id": key.project_id.to_string(),
                    "name": key.name,
                    "kind": key.kind.as_str(),
                    "public": key.public,
                    "private": key.private,
                    "key_id": key.key_id,
                }));
                self.statement(&format!(
                    "CREATE type::record('project_key', {p}.id) SET \
                     project_id = {p}.project_id, name = {p}.name, kind = {p}.kind, \
                     public_key = {p}.public, private_key = {p}.private, \
                     key_id = {p}.key_id RETURN NONE"
                ));
            }
            Mutation::DeleteProjectKeys { project_id } => {
                let p = self.param(json!(project_id.to_string()));
                self.statement(&format!("DELETE project_key WHERE project_id = {p}"));
            }
            Mutation::InsertProjectVariable(variable) => {
                let p = self.param(json!({
                    "id": variable.id.to_string(),
                    "project_id": variable.project_id.to_string(),
                    "name": variable.name,
                    "kind": variable.kind.as_str(),
                    "value": variable.value,
                }));
                self.statement(&format!(
                    "CREATE type::record('project_variable', {p}.id) SET \
                     project_id = {p}.project_id, name = {p}.name, kind = {p}.kind, \
                     var_value = {p}.value RETURN NONE"
                ));
            }
            Mutation::DeleteProjectVariables { project_id } => {
                let p = self.param(json!(project_id.to_string()));
                self.statement(&format!("DELETE project_variable WHERE project_id = {p}"));
            }
        }
    }
}

fn edge_filter(group_id: Uuid, user_id: Uuid) -> String {
    format!(
        "in = {} AND out = {}",
        record("user", user_id),
        record("group", group_id)
    )
}

/// Extracts the offending value from a unique index violation message
/// (``Database index `idx` already contains 'value', with record …``).
fn indexed_value(message: &str) -> Option<String> {
    let start = message.find("already contains ")? + "already contains ".len();
    let rest = &message[start..];
    let end = rest.find(", with record").unwrap_or(rest.len());
    let value = rest[..end].trim_matches(|c| c == '\'' || c == '"' || c == '[' || c == ']');
    (!value.is_empty()).then(|| value.to_string())
}

/// Recovers the colliding key or variable name from a composite
/// (`project_id`, `name`) index violation.
fn duplicate_name(batch: &WriteBatch, message: &str, entity: &str) -> Option<CohortError> {
    let inserted: Vec<(Uuid, &str)> = batch
        .iter()
        .filter_map(|m| match (m, entity) {
            (Mutation::InsertProjectKey(key), "key") => Some((key.project_id, key.name.as_str())),
            (Mutation::InsertProjectVariable(variable), "variable") => {
                Some((variable.project_id, variable.name.as_str()))
            }
            _ => None,
        })
        .collect();
    let (project_id, name) = inserted
        .iter()
        .find(|(_, name)| message.contains(name))
        .or_else(|| inserted.first())
        .copied()?;
    let project = batch
        .iter()
        .find_map(|m| match m {
            Mutation::InsertProject(project) if project.id == project_id => {
                Some(project.key.clone())
            }
            _ => None,
        })
        .unwrap_or_else(|| project_id.to_string());
    Some(CohortError::DuplicateName {
        entity: entity.into(),
        project,
        name: name.into(),
    })
}

fn classify(batch: &WriteBatch, mut guards: Vec<CohortError>, messages: &[String]) -> CohortError {
    for message in messages {
        if let Some(pos) = message.find(GUARD_PREFIX) {
            let digits: String = message[pos + GUARD_PREFIX.len()..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if let Ok(slot) = digits.parse::<usize>()
                && slot < guards.len()
            {
                return guards.swap_remove(slot);
            }
        }
    }

    for message in messages {
        if message.contains("idx_group_name") {
            let name = indexed_value(message).or_else(|| {
                batch.iter().find_map(|m| match m {
                    Mutation::InsertGroup(group) => Some(group.name.clone()),
                    Mutation::RenameGroup { name, .. } => Some(name.clone()),
                    _ => None,
                })
            });
            return CohortError::NameConflict {
                name: name.unwrap_or_default(),
            };
        }
        if message.contains("idx_project_unique_key") {
            let key = indexed_value(message).or_else(|| {
                batch.iter().find_map(|m| match m {
                    Mutation::InsertProject(project) => Some(project.key.clone()),
                    _ => None,
                })
            });
            return CohortError::ProjectExists {
                key: key.unwrap_or_default(),
            };
        }
        if message.contains("idx_member_of_pair") {
            if let Some((group_id, user_id)) = batch.iter().find_map(|m| match m {
                Mutation::InsertMembership(membership) => {
                    Some((membership.group_id, membership.user_id))
                }
                _ => None,
            }) {
                return CohortError::AlreadyMember { group_id, user_id };
            }
        }
        for (index, entity) in [
            ("idx_key_project_name", "key"),
            ("idx_variable_project_name", "variable"),
        ] {
            if message.contains(index)
                && let Some(err) = duplicate_name(batch, message, entity)
            {
                return err;
            }
        }
    }

    let detail = messages
        .iter()
        .find(|m| !m.contains("not executed"))
        .or_else(|| messages.first())
        .cloned()
        .unwrap_or_else(|| "transaction failed".into());
    DbError::Aborted(detail).into()
}

impl<C: Connection> SurrealStore<C> {
    pub(super) async fn execute_batch(&self, batch: WriteBatch) -> CohortResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let BatchQuery {
            sql,
            params,
            guards,
        } = BatchQuery::render(&batch);
        debug!(mutations = batch.len(), "Applying write batch");

        let mut response = self
            .db
            .query(sql)
            .bind(("batch", Value::Array(params)))
            .await
            .map_err(DbError::from)?;

        let mut errors: Vec<(usize, String)> = response
            .take_errors()
            .into_iter()
            .map(|(index, err)| (index, err.to_string()))
            .collect();
        if errors.is_empty() {
            return Ok(());
        }

        errors.sort_by_key(|(index, _)| *index);
        let messages: Vec<String> = errors.into_iter().map(|(_, message)| message).collect();
        Err(classify(&batch, guards, &messages))
    }
}

#[cfg(test)]
mod tests {
    use cohort_core::error::ErrorKind;
    use cohort_core::models::group::Group;
    use cohort_core::models::membership::Membership;
    use cohort_core::models::project::{Project, ProjectVariable, VariableKind};

    use super::*;

    #[test]
    fn member_removal_renders_both_guards() {
        let group_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let mut batch = WriteBatch::new();
        batch.push(Mutation::DeleteMembership { group_id, user_id });

        let query = BatchQuery::render(&batch);
        assert_eq!(query.guards.len(), 2);
        assert!(query.sql.contains("THROW \"cohort-guard-0\""));
        assert!(query.sql.contains("THROW \"cohort-guard-1\""));
        assert!(query.sql.starts_with("BEGIN TRANSACTION;"));
        assert!(query.sql.trim_end().ends_with("COMMIT TRANSACTION;"));
    }

    #[test]
    fn free_text_is_bound_not_inlined() {
        let group = Group::new("it's-a-trap");
        let mut batch = WriteBatch::new();
        batch.push(Mutation::InsertGroup(group.clone()));
        batch.push(Mutation::InsertMembership(Membership::new(
            group.id,
            Uuid::new_v4(),
            true,
        )));

        let query = BatchQuery::render(&batch);
        assert!(!query.sql.contains("it's-a-trap"));
        assert_eq!(query.params[0]["name"], "it's-a-trap");
    }

    #[test]
    fn guard_marker_selects_its_error() {
        let group_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let mut batch = WriteBatch::new();
        batch.push(Mutation::DeleteMembership { group_id, user_id });
        let query = BatchQuery::render(&batch);

        let messages = vec![
            "The query was not executed due to a cancelled transaction".to_string(),
            "An error occurred: cohort-guard-1".to_string(),
        ];
        let err = classify(&batch, query.guards, &messages);
        assert!(matches!(err, CohortError::InsufficientAdmins { group_id: g } if g == group_id));
    }

    #[test]
    fn unique_index_violation_maps_to_name_conflict() {
        let mut batch = WriteBatch::new();
        batch.push(Mutation::InsertGroup(Group::new("ops")));
        let messages = vec![
            "Database index `idx_group_name` already contains 'ops', with record `group:x`"
                .to_string(),
        ];
        let err = classify(&batch, Vec::new(), &messages);
        assert!(matches!(err, CohortError::NameConflict { name } if name == "ops"));
    }

    #[test]
    fn composite_index_violation_maps_to_duplicate_name() {
        let project = Project::new("PRJ", "Proj");
        let mut batch = WriteBatch::new();
        batch.push(Mutation::InsertProject(project.clone()));
        for name in ["region", "region"] {
            batch.push(Mutation::InsertProjectVariable(ProjectVariable {
                id: Uuid::new_v4(),
                project_id: project.id,
                name: name.into(),
                kind: VariableKind::String,
                value: "eu-west-1".into(),
            }));
        }
        let messages = vec![format!(
            "Database index `idx_variable_project_name` already contains ['{}', 'region'], \
             with record `project_variable:x`",
            project.id
        )];

        let err = classify(&batch, Vec::new(), &messages);
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(
            err.to_string(),
            "Duplicate variable name in project PRJ: region"
        );
    }
}
