//! Organization and group membership persistence.
//!
//! # Responsibility
//! - Upsert, read, remove and list `organization_members` and
//!   `group_members` rows.
//!
//! # Invariants
//! - At most one membership row per (owner, user) pair.
//! - Upserting an existing membership replaces its role flags.

use super::{
    bool_to_int, ensure_connection_ready, impl_entity_lookup, map_constraint, parse_bool,
    parse_uuid, RepoError, RepoResult,
};
use crate::model::link::{GroupMember, OrganizationMember, OrganizationRoles};
use crate::model::{GroupId, OrganizationId, UserId};
use rusqlite::{params, Connection, Row};

const ORG_MEMBER_SELECT_SQL: &str = "SELECT org_id, user_id, is_owner, is_admin, is_comms
FROM organization_members";

const GROUP_MEMBER_SELECT_SQL: &str = "SELECT group_id, user_id, is_admin
FROM group_members";

/// Repository interface for memberships.
pub trait MembershipRepository: super::EntityLookup {
    /// Inserts or replaces role flags. Returns `true` when a row was created.
    fn upsert_org_member(&self, member: &OrganizationMember) -> RepoResult<bool>;
    fn get_org_member(
        &self,
        org_id: OrganizationId,
        user_id: UserId,
    ) -> RepoResult<Option<OrganizationMember>>;
    fn remove_org_member(&self, org_id: OrganizationId, user_id: UserId) -> RepoResult<()>;
    /// Lists members with owners first, then admins, then by user id.
    fn list_org_members(&self, org_id: OrganizationId) -> RepoResult<Vec<OrganizationMember>>;
    /// Lists memberships of one user across active organizations.
    fn list_user_organizations(&self, user_id: UserId) -> RepoResult<Vec<OrganizationMember>>;

    fn upsert_group_member(&self, member: &GroupMember) -> RepoResult<bool>;
    fn get_group_member(&self, group_id: GroupId, user_id: UserId)
        -> RepoResult<Option<GroupMember>>;
    fn remove_group_member(&self, group_id: GroupId, user_id: UserId) -> RepoResult<()>;
    /// Lists members with admins first, then by user id.
    fn list_group_members(&self, group_id: GroupId) -> RepoResult<Vec<GroupMember>>;
    /// Lists memberships of one user across active groups.
    fn list_user_groups(&self, user_id: UserId) -> RepoResult<Vec<GroupMember>>;
}

/// SQLite-backed membership repository.
pub struct SqliteMembershipRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMembershipRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["organization_members", "group_members"])?;
        Ok(Self { conn })
    }
}

impl_entity_lookup!(SqliteMembershipRepository);

impl MembershipRepository for SqliteMembershipRepository<'_> {
    fn upsert_org_member(&self, member: &OrganizationMember) -> RepoResult<bool> {
        let existed = self.get_org_member(member.org_id, member.user_id)?.is_some();
        self.conn
            .execute(
                "INSERT INTO organization_members (org_id, user_id, is_owner, is_admin, is_comms)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (org_id, user_id) DO UPDATE SET
                    is_owner = excluded.is_owner,
                    is_admin = excluded.is_admin,
                    is_comms = excluded.is_comms;",
                params![
                    member.org_id.to_string(),
                    member.user_id.to_string(),
                    bool_to_int(member.roles.is_owner),
                    bool_to_int(member.roles.is_admin),
                    bool_to_int(member.roles.is_comms),
                ],
            )
            .map_err(|err| map_constraint(err, "organization or user does not exist"))?;
        Ok(!existed)
    }

    fn get_org_member(
        &self,
        org_id: OrganizationId,
        user_id: UserId,
    ) -> RepoResult<Option<OrganizationMember>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ORG_MEMBER_SELECT_SQL} WHERE org_id = ?1 AND user_id = ?2;"
        ))?;
        let mut rows = stmt.query([org_id.to_string(), user_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_org_member_row(row)?));
        }
        Ok(None)
    }

    fn remove_org_member(&self, org_id: OrganizationId, user_id: UserId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM organization_members WHERE org_id = ?1 AND user_id = ?2;",
            [org_id.to_string(), user_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("organization member", user_id));
        }
        Ok(())
    }

    fn list_org_members(&self, org_id: OrganizationId) -> RepoResult<Vec<OrganizationMember>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ORG_MEMBER_SELECT_SQL}
             WHERE org_id = ?1
             ORDER BY is_owner DESC, is_admin DESC, user_id ASC;"
        ))?;
        let mut rows = stmt.query([org_id.to_string()])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(parse_org_member_row(row)?);
        }
        Ok(members)
    }

    fn list_user_organizations(&self, user_id: UserId) -> RepoResult<Vec<OrganizationMember>> {
        let mut stmt = self.conn.prepare(
            "SELECT m.org_id, m.user_id, m.is_owner, m.is_admin, m.is_comms
             FROM organization_members m
             INNER JOIN organizations o ON o.id = m.org_id
             WHERE m.user_id = ?1
               AND o.deletion_date IS NULL
             ORDER BY o.name COLLATE NOCASE ASC, m.org_id ASC;",
        )?;
        let mut rows = stmt.query([user_id.to_string()])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(parse_org_member_row(row)?);
        }
        Ok(members)
    }

    fn upsert_group_member(&self, member: &GroupMember) -> RepoResult<bool> {
        let existed = self
            .get_group_member(member.group_id, member.user_id)?
            .is_some();
        self.conn
            .execute(
                "INSERT INTO group_members (group_id, user_id, is_admin)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (group_id, user_id) DO UPDATE SET
                    is_admin = excluded.is_admin;",
                params![
                    member.group_id.to_string(),
                    member.user_id.to_string(),
                    bool_to_int(member.is_admin),
                ],
            )
            .map_err(|err| map_constraint(err, "group or user does not exist"))?;
        Ok(!existed)
    }

    fn get_group_member(
        &self,
        group_id: GroupId,
        user_id: UserId,
    ) -> RepoResult<Option<GroupMember>> {
        let mut stmt = self.conn.prepare(&format!(
            "{GROUP_MEMBER_SELECT_SQL} WHERE group_id = ?1 AND user_id = ?2;"
        ))?;
        let mut rows = stmt.query([group_id.to_string(), user_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_group_member_row(row)?));
        }
        Ok(None)
    }

    fn remove_group_member(&self, group_id: GroupId, user_id: UserId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2;",
            [group_id.to_string(), user_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("group member", user_id));
        }
        Ok(())
    }

    fn list_group_members(&self, group_id: GroupId) -> RepoResult<Vec<GroupMember>> {
        let mut stmt = self.conn.prepare(&format!(
            "{GROUP_MEMBER_SELECT_SQL}
             WHERE group_id = ?1
             ORDER BY is_admin DESC, user_id ASC;"
        ))?;
        let mut rows = stmt.query([group_id.to_string()])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(parse_group_member_row(row)?);
        }
        Ok(members)
    }

    fn list_user_groups(&self, user_id: UserId) -> RepoResult<Vec<GroupMember>> {
        let mut stmt = self.conn.prepare(
            "SELECT m.group_id, m.user_id, m.is_admin
             FROM group_members m
             INNER JOIN org_groups g ON g.id = m.group_id
             INNER JOIN organizations o ON o.id = g.org_id
             WHERE m.user_id = ?1
               AND g.deletion_date IS NULL
               AND o.deletion_date IS NULL
             ORDER BY g.name COLLATE NOCASE ASC, m.group_id ASC;",
        )?;
        let mut rows = stmt.query([user_id.to_string()])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(parse_group_member_row(row)?);
        }
        Ok(members)
    }
}

fn parse_org_member_row(row: &Row<'_>) -> RepoResult<OrganizationMember> {
    let org_text: String = row.get(0)?;
    let user_text: String = row.get(1)?;
    Ok(OrganizationMember {
        org_id: parse_uuid(&org_text, "organization_members.org_id")?,
        user_id: parse_uuid(&user_text, "organization_members.user_id")?,
        roles: OrganizationRoles {
            is_owner: parse_bool(row.get(2)?, "organization_members.is_owner")?,
            is_admin: parse_bool(row.get(3)?, "organization_members.is_admin")?,
            is_comms: parse_bool(row.get(4)?, "organization_members.is_comms")?,
        },
    })
}

fn parse_group_member_row(row: &Row<'_>) -> RepoResult<GroupMember> {
    let group_text: String = row.get(0)?;
    let user_text: String = row.get(1)?;
    Ok(GroupMember {
        group_id: parse_uuid(&group_text, "group_members.group_id")?,
        user_id: parse_uuid(&user_text, "group_members.user_id")?,
        is_admin: parse_bool(row.get(2)?, "group_members.is_admin")?,
    })
}
