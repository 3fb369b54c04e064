//! Organization repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist organizations together with their application and owner.
//! - Provide tombstone, flag and cascading hard-delete operations.
//!
//! # Invariants
//! - Registration writes application, organization and owner membership
//!   in one immediate transaction.
//! - Active reads exclude rows with `deletion_date` set unless asked.
//! - Hard delete removes the organization's application too, and withdraws
//!   votes the organization cast on other applications.

use super::application_repo::{insert_application, withdraw_votes_of};
use super::{
    count_rows, decode_array, encode_array, ensure_connection_ready, impl_entity_lookup,
    map_constraint, normalize_list_limit, parse_uuid, DeletionImpact, RepoError, RepoResult,
    NOW_MS_SQL,
};
use crate::model::organization::{
    normalize_status_name, Organization, OrganizationApplication,
};
use crate::model::{OrganizationId, StatusId, UserId};
use log::info;
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};

const ORGANIZATION_SELECT_SQL: &str = "SELECT
    id,
    name,
    tagline,
    social_accounts,
    total_flags,
    application_id,
    created_by,
    creation_date,
    deletion_date
FROM organizations";

/// Query options for listing organizations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizationListQuery {
    /// Case-insensitive substring match on `name`.
    pub name_contains: Option<String>,
    pub created_by: Option<UserId>,
    pub include_deleted: bool,
    /// Maximum rows to return. Defaults to 10 and clamps to 50.
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for organization operations.
pub trait OrganizationRepository: super::EntityLookup {
    /// Resolves a status id by name.
    fn find_status_id(&self, status_name: &str) -> RepoResult<Option<StatusId>>;
    /// Writes application, organization and owner membership atomically.
    fn register_organization(
        &self,
        organization: &Organization,
        application: &OrganizationApplication,
    ) -> RepoResult<()>;
    fn get_organization(
        &self,
        id: OrganizationId,
        include_deleted: bool,
    ) -> RepoResult<Option<Organization>>;
    /// Replaces profile fields of an active organization.
    fn update_organization(&self, organization: &Organization) -> RepoResult<()>;
    /// Lists organizations ordered by `creation_date DESC, id ASC`.
    fn list_organizations(&self, query: &OrganizationListQuery) -> RepoResult<Vec<Organization>>;
    /// Sets (keeping an earlier value) or clears the deletion tombstone.
    fn set_deletion_date(&self, id: OrganizationId, deleted: bool) -> RepoResult<()>;
    /// Increments `total_flags` and returns the new value.
    fn increment_flags(&self, id: OrganizationId) -> RepoResult<i32>;
    /// Counts rows a hard delete would remove.
    fn deletion_impact(&self, id: OrganizationId) -> RepoResult<DeletionImpact>;
    /// Hard-deletes the organization and everything it owns.
    fn delete_organization(&self, id: OrganizationId) -> RepoResult<()>;
}

/// SQLite-backed organization repository.
pub struct SqliteOrganizationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteOrganizationRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                "organizations",
                "organization_applications",
                "organization_members",
                "org_groups",
            ],
        )?;
        Ok(Self { conn })
    }
}

impl_entity_lookup!(SqliteOrganizationRepository);

impl OrganizationRepository for SqliteOrganizationRepository<'_> {
    fn find_status_id(&self, status_name: &str) -> RepoResult<Option<StatusId>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT id
                 FROM organization_application_statuses
                 WHERE status_name = ?1;",
                [normalize_status_name(status_name)],
                |row| row.get(0),
            )
            .optional()?;
        value
            .map(|text| parse_uuid(&text, "organization_application_statuses.id"))
            .transpose()
    }

    fn register_organization(
        &self,
        organization: &Organization,
        application: &OrganizationApplication,
    ) -> RepoResult<()> {
        organization.validate()?;
        application.validate()?;
        if organization.application_id != application.id {
            return Err(RepoError::Conflict(format!(
                "organization {} references application {}, got {}",
                organization.id, organization.application_id, application.id
            )));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let mut linked = application.clone();
        linked.org_id = Some(organization.id);
        insert_application(&tx, &linked)?;

        tx.execute(
            "INSERT INTO organizations (
                id,
                name,
                tagline,
                social_accounts,
                total_flags,
                application_id,
                created_by,
                deletion_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                organization.id.to_string(),
                organization.name.as_str(),
                organization.tagline.as_str(),
                encode_array(&organization.social_accounts, "social_accounts")?,
                organization.total_flags,
                organization.application_id.to_string(),
                organization.created_by.to_string(),
                organization.deletion_date,
            ],
        )
        .map_err(|err| map_constraint(err, "organization violates a constraint"))?;

        tx.execute(
            "INSERT INTO organization_members (org_id, user_id, is_owner)
             VALUES (?1, ?2, 1);",
            params![
                organization.id.to_string(),
                organization.created_by.to_string()
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn get_organization(
        &self,
        id: OrganizationId,
        include_deleted: bool,
    ) -> RepoResult<Option<Organization>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ORGANIZATION_SELECT_SQL}
             WHERE id = ?1
               AND (?2 = 1 OR deletion_date IS NULL);"
        ))?;
        let mut rows = stmt.query(params![id.to_string(), i64::from(include_deleted)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_organization_row(row)?));
        }
        Ok(None)
    }

    fn update_organization(&self, organization: &Organization) -> RepoResult<()> {
        organization.validate()?;

        let changed = self.conn.execute(
            "UPDATE organizations
             SET
                name = ?2,
                tagline = ?3,
                social_accounts = ?4,
                total_flags = ?5
             WHERE id = ?1
               AND deletion_date IS NULL;",
            params![
                organization.id.to_string(),
                organization.name.as_str(),
                organization.tagline.as_str(),
                encode_array(&organization.social_accounts, "social_accounts")?,
                organization.total_flags,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("organization", organization.id));
        }
        Ok(())
    }

    fn list_organizations(&self, query: &OrganizationListQuery) -> RepoResult<Vec<Organization>> {
        let mut sql = format!("{ORGANIZATION_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if !query.include_deleted {
            sql.push_str(" AND deletion_date IS NULL");
        }

        if let Some(fragment) = query.name_contains.as_deref().map(str::trim) {
            if !fragment.is_empty() {
                sql.push_str(" AND instr(lower(name), lower(?)) > 0");
                bind_values.push(Value::Text(fragment.to_string()));
            }
        }

        if let Some(created_by) = query.created_by {
            sql.push_str(" AND created_by = ?");
            bind_values.push(Value::Text(created_by.to_string()));
        }

        sql.push_str(" ORDER BY creation_date DESC, id ASC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(normalize_list_limit(query.limit))));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut organizations = Vec::new();
        while let Some(row) = rows.next()? {
            organizations.push(parse_organization_row(row)?);
        }
        Ok(organizations)
    }

    fn set_deletion_date(&self, id: OrganizationId, deleted: bool) -> RepoResult<()> {
        let sql = if deleted {
            format!(
                "UPDATE organizations
                 SET deletion_date = COALESCE(deletion_date, {NOW_MS_SQL})
                 WHERE id = ?1;"
            )
        } else {
            "UPDATE organizations SET deletion_date = NULL WHERE id = ?1;".to_string()
        };
        let changed = self.conn.execute(&sql, [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("organization", id));
        }
        Ok(())
    }

    fn increment_flags(&self, id: OrganizationId) -> RepoResult<i32> {
        let changed = self.conn.execute(
            "UPDATE organizations
             SET total_flags = COALESCE(total_flags, 0) + 1
             WHERE id = ?1
               AND deletion_date IS NULL
               AND COALESCE(total_flags, 0) < ?2;",
            params![id.to_string(), i32::MAX],
        )?;
        if changed == 0 {
            let active: i64 = self.conn.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM organizations WHERE id = ?1 AND deletion_date IS NULL
                );",
                [id.to_string()],
                |row| row.get(0),
            )?;
            if active == 0 {
                return Err(RepoError::not_found("organization", id));
            }
            return Err(RepoError::Conflict(format!(
                "organization {id} already has the maximum flag count"
            )));
        }
        let total: i32 = self.conn.query_row(
            "SELECT total_flags FROM organizations WHERE id = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    fn deletion_impact(&self, id: OrganizationId) -> RepoResult<DeletionImpact> {
        if self.get_organization(id, true)?.is_none() {
            return Err(RepoError::not_found("organization", id));
        }
        organization_deletion_impact(self.conn, id)
    }

    fn delete_organization(&self, id: OrganizationId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let application_id: Option<String> = tx
            .query_row(
                "SELECT application_id FROM organizations WHERE id = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(application_id) = application_id else {
            return Err(RepoError::not_found("organization", id));
        };

        tx.execute("DELETE FROM organizations WHERE id = ?1;", [id.to_string()])?;
        tx.execute(
            "DELETE FROM organization_applications WHERE id = ?1;",
            [application_id.as_str()],
        )?;
        let withdrawn = withdraw_votes_of(&tx, id)?;

        tx.commit()?;
        info!(
            "event=organization_delete module=repo status=ok org_id={id} withdrawn_votes={withdrawn}"
        );
        Ok(())
    }
}

/// Counts rows owned by an organization, directly or through its groups.
pub(crate) fn organization_deletion_impact(
    conn: &Connection,
    id: OrganizationId,
) -> RepoResult<DeletionImpact> {
    Ok(DeletionImpact {
        groups: count_rows(
            conn,
            "SELECT COUNT(*) FROM org_groups WHERE org_id = ?1;",
            id,
        )?,
        organization_members: count_rows(
            conn,
            "SELECT COUNT(*) FROM organization_members WHERE org_id = ?1;",
            id,
        )?,
        group_members: count_rows(
            conn,
            "SELECT COUNT(*)
             FROM group_members
             WHERE group_id IN (SELECT id FROM org_groups WHERE org_id = ?1);",
            id,
        )?,
        content_links: count_rows(
            conn,
            "SELECT
                (SELECT COUNT(*) FROM organization_events WHERE org_id = ?1)
              + (SELECT COUNT(*) FROM organization_resources WHERE org_id = ?1)
              + (SELECT COUNT(*) FROM organization_topics WHERE org_id = ?1)
              + (SELECT COUNT(*) FROM group_events
                 WHERE group_id IN (SELECT id FROM org_groups WHERE org_id = ?1))
              + (SELECT COUNT(*) FROM group_resources
                 WHERE group_id IN (SELECT id FROM org_groups WHERE org_id = ?1))
              + (SELECT COUNT(*) FROM group_topics
                 WHERE group_id IN (SELECT id FROM org_groups WHERE org_id = ?1));",
            id,
        )?,
        tasks: count_rows(
            conn,
            "SELECT COUNT(*)
             FROM organization_tasks
             WHERE org_id = ?1
                OR group_id IN (SELECT id FROM org_groups WHERE org_id = ?1);",
            id,
        )?,
    })
}

fn parse_organization_row(row: &Row<'_>) -> RepoResult<Organization> {
    let id_text: String = row.get("id")?;
    let application_text: String = row.get("application_id")?;
    let created_by_text: String = row.get("created_by")?;
    let social_text: String = row.get("social_accounts")?;

    let organization = Organization {
        id: parse_uuid(&id_text, "organizations.id")?,
        name: row.get("name")?,
        tagline: row.get("tagline")?,
        social_accounts: decode_array(&social_text, "organizations.social_accounts")?,
        total_flags: row.get("total_flags")?,
        application_id: parse_uuid(&application_text, "organizations.application_id")?,
        created_by: parse_uuid(&created_by_text, "organizations.created_by")?,
        creation_date: row.get("creation_date")?,
        deletion_date: row.get("deletion_date")?,
    };
    organization.validate()?;
    Ok(organization)
}
