//! Content and task link persistence for organizations and groups.
//!
//! # Responsibility
//! - Maintain the six plain join tables (events, resources, topics under an
//!   organization or a group).
//! - Maintain `organization_tasks`, scoped by organization and group.
//!
//! # Invariants
//! - Linking is idempotent; each join row is unique over its key columns.
//! - Table and column names come from `LinkScope`/`ContentKind`, never from
//!   caller input.

use super::{
    ensure_connection_ready, impl_entity_lookup, map_constraint, parse_uuid, RepoError, RepoResult,
};
use crate::model::link::{ContentKind, LinkScope, OrganizationTask};
use crate::model::{GroupId, OrganizationId};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

/// Repository interface for join records.
pub trait LinkRepository: super::EntityLookup {
    /// Links `target` under `scope`. Returns `false` when already linked.
    fn link(&self, scope: LinkScope, kind: ContentKind, target: Uuid) -> RepoResult<bool>;
    fn unlink(&self, scope: LinkScope, kind: ContentKind, target: Uuid) -> RepoResult<()>;
    /// Lists linked ids in link order.
    fn list_links(&self, scope: LinkScope, kind: ContentKind) -> RepoResult<Vec<Uuid>>;
    /// Links a task. Returns `false` when already linked.
    fn link_task(&self, task: &OrganizationTask) -> RepoResult<bool>;
    fn unlink_task(&self, task: &OrganizationTask) -> RepoResult<()>;
    /// Lists organization tasks, optionally narrowed to one group.
    fn list_tasks(
        &self,
        org_id: OrganizationId,
        group_id: Option<GroupId>,
    ) -> RepoResult<Vec<OrganizationTask>>;
}

/// SQLite-backed link repository.
pub struct SqliteLinkRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLinkRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                "organization_events",
                "organization_resources",
                "organization_topics",
                "organization_tasks",
                "group_events",
                "group_resources",
                "group_topics",
            ],
        )?;
        Ok(Self { conn })
    }
}

impl_entity_lookup!(SqliteLinkRepository);

impl LinkRepository for SqliteLinkRepository<'_> {
    fn link(&self, scope: LinkScope, kind: ContentKind, target: Uuid) -> RepoResult<bool> {
        let inserted = self
            .conn
            .execute(
                &format!(
                    "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?1, ?2);",
                    scope.table(kind),
                    scope.owner_column(),
                    kind.target_column()
                ),
                [scope.id().to_string(), target.to_string()],
            )
            .map_err(|err| map_constraint(err, "link owner or target does not exist"))?;
        Ok(inserted == 1)
    }

    fn unlink(&self, scope: LinkScope, kind: ContentKind, target: Uuid) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1 AND {} = ?2;",
                scope.table(kind),
                scope.owner_column(),
                kind.target_column()
            ),
            [scope.id().to_string(), target.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("link", target));
        }
        Ok(())
    }

    fn list_links(&self, scope: LinkScope, kind: ContentKind) -> RepoResult<Vec<Uuid>> {
        let column = kind.target_column();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {column} FROM {} WHERE {} = ?1 ORDER BY id ASC;",
            scope.table(kind),
            scope.owner_column()
        ))?;
        let mut rows = stmt.query([scope.id().to_string()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "link target id")?);
        }
        Ok(ids)
    }

    fn link_task(&self, task: &OrganizationTask) -> RepoResult<bool> {
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO organization_tasks (org_id, task_id, group_id)
                 VALUES (?1, ?2, ?3);",
                params![
                    task.org_id.to_string(),
                    task.task_id.to_string(),
                    task.group_id.to_string(),
                ],
            )
            .map_err(|err| map_constraint(err, "task organization, group or task does not exist"))?;
        Ok(inserted == 1)
    }

    fn unlink_task(&self, task: &OrganizationTask) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM organization_tasks
             WHERE org_id = ?1 AND task_id = ?2 AND group_id = ?3;",
            params![
                task.org_id.to_string(),
                task.task_id.to_string(),
                task.group_id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("task link", task.task_id));
        }
        Ok(())
    }

    fn list_tasks(
        &self,
        org_id: OrganizationId,
        group_id: Option<GroupId>,
    ) -> RepoResult<Vec<OrganizationTask>> {
        let mut stmt = self.conn.prepare(
            "SELECT org_id, task_id, group_id
             FROM organization_tasks
             WHERE org_id = ?1
               AND (?2 IS NULL OR group_id = ?2)
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query(params![
            org_id.to_string(),
            group_id.map(|value| value.to_string())
        ])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<OrganizationTask> {
    let org_text: String = row.get(0)?;
    let task_text: String = row.get(1)?;
    let group_text: String = row.get(2)?;
    Ok(OrganizationTask {
        org_id: parse_uuid(&org_text, "organization_tasks.org_id")?,
        task_id: parse_uuid(&task_text, "organization_tasks.task_id")?,
        group_id: parse_uuid(&group_text, "organization_tasks.group_id")?,
    })
}
