//! Group repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist groups scoped under an organization.
//! - Provide tombstone, flag and cascading hard-delete operations.
//!
//! # Invariants
//! - Listing is ordered by `name COLLATE NOCASE, id`.
//! - Hard delete cascades to group links, group members and organization
//!   tasks scoped by the group.

use super::{
    count_rows, decode_array, encode_array, ensure_connection_ready, impl_entity_lookup,
    map_constraint, parse_uuid, DeletionImpact, RepoError, RepoResult, NOW_MS_SQL,
};
use crate::model::group::Group;
use crate::model::{GroupId, OrganizationId};
use log::info;
use rusqlite::{params, Connection, Row};

const GROUP_SELECT_SQL: &str = "SELECT
    id,
    org_id,
    name,
    tagline,
    description,
    social_accounts,
    total_flags,
    created_by,
    creation_date,
    deletion_date
FROM org_groups";

/// Repository interface for group operations.
pub trait GroupRepository: super::EntityLookup {
    fn create_group(&self, group: &Group) -> RepoResult<GroupId>;
    fn get_group(&self, id: GroupId, include_deleted: bool) -> RepoResult<Option<Group>>;
    /// Replaces profile fields of an active group.
    fn update_group(&self, group: &Group) -> RepoResult<()>;
    fn list_groups(&self, org_id: OrganizationId, include_deleted: bool) -> RepoResult<Vec<Group>>;
    /// Sets (keeping an earlier value) or clears the deletion tombstone.
    fn set_deletion_date(&self, id: GroupId, deleted: bool) -> RepoResult<()>;
    /// Increments `total_flags` and returns the new value.
    fn increment_flags(&self, id: GroupId) -> RepoResult<i32>;
    fn deletion_impact(&self, id: GroupId) -> RepoResult<DeletionImpact>;
    fn delete_group(&self, id: GroupId) -> RepoResult<()>;
}

/// SQLite-backed group repository.
pub struct SqliteGroupRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGroupRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["org_groups", "organizations", "group_members"])?;
        Ok(Self { conn })
    }
}

impl_entity_lookup!(SqliteGroupRepository);

impl GroupRepository for SqliteGroupRepository<'_> {
    fn create_group(&self, group: &Group) -> RepoResult<GroupId> {
        group.validate()?;

        self.conn
            .execute(
                "INSERT INTO org_groups (
                    id,
                    org_id,
                    name,
                    tagline,
                    description,
                    social_accounts,
                    total_flags,
                    created_by,
                    deletion_date
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
                params![
                    group.id.to_string(),
                    group.org_id.to_string(),
                    group.name.as_str(),
                    group.tagline.as_str(),
                    group.description.as_str(),
                    encode_array(&group.social_accounts, "social_accounts")?,
                    group.total_flags,
                    group.created_by.to_string(),
                    group.deletion_date,
                ],
            )
            .map_err(|err| map_constraint(err, "group violates a constraint"))?;

        Ok(group.id)
    }

    fn get_group(&self, id: GroupId, include_deleted: bool) -> RepoResult<Option<Group>> {
        let mut stmt = self.conn.prepare(&format!(
            "{GROUP_SELECT_SQL}
             WHERE id = ?1
               AND (?2 = 1 OR deletion_date IS NULL);"
        ))?;
        let mut rows = stmt.query(params![id.to_string(), i64::from(include_deleted)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_group_row(row)?));
        }
        Ok(None)
    }

    fn update_group(&self, group: &Group) -> RepoResult<()> {
        group.validate()?;

        let changed = self.conn.execute(
            "UPDATE org_groups
             SET
                name = ?2,
                tagline = ?3,
                description = ?4,
                social_accounts = ?5,
                total_flags = ?6
             WHERE id = ?1
               AND deletion_date IS NULL;",
            params![
                group.id.to_string(),
                group.name.as_str(),
                group.tagline.as_str(),
                group.description.as_str(),
                encode_array(&group.social_accounts, "social_accounts")?,
                group.total_flags,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("group", group.id));
        }
        Ok(())
    }

    fn list_groups(&self, org_id: OrganizationId, include_deleted: bool) -> RepoResult<Vec<Group>> {
        let mut stmt = self.conn.prepare(&format!(
            "{GROUP_SELECT_SQL}
             WHERE org_id = ?1
               AND (?2 = 1 OR deletion_date IS NULL)
             ORDER BY name COLLATE NOCASE ASC, id ASC;"
        ))?;
        let mut rows = stmt.query(params![org_id.to_string(), i64::from(include_deleted)])?;
        let mut groups = Vec::new();
        while let Some(row) = rows.next()? {
            groups.push(parse_group_row(row)?);
        }
        Ok(groups)
    }

    fn set_deletion_date(&self, id: GroupId, deleted: bool) -> RepoResult<()> {
        let sql = if deleted {
            format!(
                "UPDATE org_groups
                 SET deletion_date = COALESCE(deletion_date, {NOW_MS_SQL})
                 WHERE id = ?1;"
            )
        } else {
            "UPDATE org_groups SET deletion_date = NULL WHERE id = ?1;".to_string()
        };
        let changed = self.conn.execute(&sql, [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("group", id));
        }
        Ok(())
    }

    fn increment_flags(&self, id: GroupId) -> RepoResult<i32> {
        let changed = self.conn.execute(
            "UPDATE org_groups
             SET total_flags = COALESCE(total_flags, 0) + 1
             WHERE id = ?1
               AND deletion_date IS NULL
               AND COALESCE(total_flags, 0) < ?2;",
            params![id.to_string(), i32::MAX],
        )?;
        if changed == 0 {
            let active: i64 = self.conn.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM org_groups WHERE id = ?1 AND deletion_date IS NULL
                );",
                [id.to_string()],
                |row| row.get(0),
            )?;
            if active == 0 {
                return Err(RepoError::not_found("group", id));
            }
            return Err(RepoError::Conflict(format!(
                "group {id} already has the maximum flag count"
            )));
        }
        let total: i32 = self.conn.query_row(
            "SELECT total_flags FROM org_groups WHERE id = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    fn deletion_impact(&self, id: GroupId) -> RepoResult<DeletionImpact> {
        if self.get_group(id, true)?.is_none() {
            return Err(RepoError::not_found("group", id));
        }
        Ok(DeletionImpact {
            groups: 1,
            organization_members: 0,
            group_members: count_rows(
                self.conn,
                "SELECT COUNT(*) FROM group_members WHERE group_id = ?1;",
                id,
            )?,
            content_links: count_rows(
                self.conn,
                "SELECT
                    (SELECT COUNT(*) FROM group_events WHERE group_id = ?1)
                  + (SELECT COUNT(*) FROM group_resources WHERE group_id = ?1)
                  + (SELECT COUNT(*) FROM group_topics WHERE group_id = ?1);",
                id,
            )?,
            tasks: count_rows(
                self.conn,
                "SELECT COUNT(*) FROM organization_tasks WHERE group_id = ?1;",
                id,
            )?,
        })
    }

    fn delete_group(&self, id: GroupId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM org_groups WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("group", id));
        }
        info!("event=group_delete module=repo status=ok group_id={id}");
        Ok(())
    }
}

fn parse_group_row(row: &Row<'_>) -> RepoResult<Group> {
    let id_text: String = row.get("id")?;
    let org_text: String = row.get("org_id")?;
    let created_by_text: String = row.get("created_by")?;
    let social_text: String = row.get("social_accounts")?;

    let group = Group {
        id: parse_uuid(&id_text, "org_groups.id")?,
        org_id: parse_uuid(&org_text, "org_groups.org_id")?,
        name: row.get("name")?,
        tagline: row.get("tagline")?,
        description: row.get("description")?,
        social_accounts: decode_array(&social_text, "org_groups.social_accounts")?,
        total_flags: row.get("total_flags")?,
        created_by: parse_uuid(&created_by_text, "org_groups.created_by")?,
        creation_date: row.get("creation_date")?,
        deletion_date: row.get("deletion_date")?,
    };
    group.validate()?;
    Ok(group)
}
