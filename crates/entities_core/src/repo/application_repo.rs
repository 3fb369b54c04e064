//! Application status and organization application persistence.
//!
//! # Responsibility
//! - Provide CRUD over `organization_application_statuses` and
//!   `organization_applications`.
//! - Encode vote arrays as JSON text columns.
//!
//! # Invariants
//! - Status names are stored normalized and unique.
//! - Every application update refreshes `status_updated`.
//! - Deleting a status or an application cascades to the organizations
//!   that depend on it.
//! - Every path that removes organizations also removes their votes from
//!   the remaining applications, in the same transaction.

use super::{
    decode_array, encode_array, ensure_connection_ready, impl_entity_lookup, map_constraint,
    parse_uuid, query_ids, RepoError, RepoResult, NOW_MS_SQL,
};
use crate::model::organization::{
    normalize_status_name, OrganizationApplication, OrganizationApplicationStatus,
};
use crate::model::{ApplicationId, OrganizationId, StatusId};
use log::info;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const APPLICATION_SELECT_SQL: &str = "SELECT
    id,
    org_id,
    status_id,
    orgs_in_favor,
    orgs_against,
    creation_date,
    status_updated
FROM organization_applications";

/// Repository interface for applications and their statuses.
pub trait ApplicationRepository: super::EntityLookup {
    /// Lists statuses sorted by name.
    fn list_statuses(&self) -> RepoResult<Vec<OrganizationApplicationStatus>>;
    fn get_status(&self, id: StatusId) -> RepoResult<Option<OrganizationApplicationStatus>>;
    /// Finds a status by name, case-insensitively.
    fn find_status_by_name(&self, name: &str)
        -> RepoResult<Option<OrganizationApplicationStatus>>;
    fn create_status(&self, status: &OrganizationApplicationStatus) -> RepoResult<StatusId>;
    /// Deletes a status together with every application in that status.
    fn delete_status(&self, id: StatusId) -> RepoResult<()>;
    fn create_application(&self, application: &OrganizationApplication)
        -> RepoResult<ApplicationId>;
    fn get_application(&self, id: ApplicationId) -> RepoResult<Option<OrganizationApplication>>;
    /// Persists status, votes and back-reference; refreshes `status_updated`.
    fn update_application(&self, application: &OrganizationApplication) -> RepoResult<()>;
    /// Deletes an application together with its organization.
    fn delete_application(&self, id: ApplicationId) -> RepoResult<()>;
    /// Lists applications, newest first, optionally filtered by status.
    fn list_applications(
        &self,
        status_id: Option<StatusId>,
    ) -> RepoResult<Vec<OrganizationApplication>>;
}

/// SQLite-backed application repository.
pub struct SqliteApplicationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteApplicationRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &["organization_application_statuses", "organization_applications"],
        )?;
        Ok(Self { conn })
    }
}

impl_entity_lookup!(SqliteApplicationRepository);

impl ApplicationRepository for SqliteApplicationRepository<'_> {
    fn list_statuses(&self) -> RepoResult<Vec<OrganizationApplicationStatus>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, status_name
             FROM organization_application_statuses
             ORDER BY status_name ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut statuses = Vec::new();
        while let Some(row) = rows.next()? {
            statuses.push(parse_status_row(row)?);
        }
        Ok(statuses)
    }

    fn get_status(&self, id: StatusId) -> RepoResult<Option<OrganizationApplicationStatus>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, status_name
             FROM organization_application_statuses
             WHERE id = ?1;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_status_row(row)?));
        }
        Ok(None)
    }

    fn find_status_by_name(
        &self,
        name: &str,
    ) -> RepoResult<Option<OrganizationApplicationStatus>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, status_name
             FROM organization_application_statuses
             WHERE status_name = ?1;",
        )?;
        let mut rows = stmt.query([normalize_status_name(name)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_status_row(row)?));
        }
        Ok(None)
    }

    fn create_status(&self, status: &OrganizationApplicationStatus) -> RepoResult<StatusId> {
        status.validate()?;
        self.conn
            .execute(
                "INSERT INTO organization_application_statuses (id, status_name)
                 VALUES (?1, ?2);",
                params![
                    status.id.to_string(),
                    normalize_status_name(&status.status_name)
                ],
            )
            .map_err(|err| {
                map_constraint(err, &format!("status `{}` already exists", status.status_name))
            })?;
        Ok(status.id)
    }

    fn delete_status(&self, id: StatusId) -> RepoResult<()> {
        let changed = delete_withdrawing_votes(
            self.conn,
            "DELETE FROM organization_application_statuses WHERE id = ?1;",
            "SELECT o.id
             FROM organizations o
             INNER JOIN organization_applications a ON a.id = o.application_id
             WHERE a.status_id = ?1;",
            id,
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("application status", id));
        }
        Ok(())
    }

    fn create_application(
        &self,
        application: &OrganizationApplication,
    ) -> RepoResult<ApplicationId> {
        application.validate()?;
        insert_application(self.conn, application)?;
        Ok(application.id)
    }

    fn get_application(&self, id: ApplicationId) -> RepoResult<Option<OrganizationApplication>> {
        load_application(self.conn, id)
    }

    fn update_application(&self, application: &OrganizationApplication) -> RepoResult<()> {
        application.validate()?;

        let changed = self
            .conn
            .execute(
                &format!(
                    "UPDATE organization_applications
                     SET
                        org_id = ?2,
                        status_id = ?3,
                        orgs_in_favor = ?4,
                        orgs_against = ?5,
                        status_updated = {NOW_MS_SQL}
                     WHERE id = ?1;"
                ),
                params![
                    application.id.to_string(),
                    application.org_id.map(|value| value.to_string()),
                    application.status_id.to_string(),
                    encode_array(&application.orgs_in_favor, "orgs_in_favor")?,
                    encode_array(&application.orgs_against, "orgs_against")?,
                ],
            )
            .map_err(|err| map_constraint(err, "application status does not exist"))?;

        if changed == 0 {
            return Err(RepoError::not_found("application", application.id));
        }
        Ok(())
    }

    fn delete_application(&self, id: ApplicationId) -> RepoResult<()> {
        let changed = delete_withdrawing_votes(
            self.conn,
            "DELETE FROM organization_applications WHERE id = ?1;",
            "SELECT id FROM organizations WHERE application_id = ?1;",
            id,
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("application", id));
        }
        Ok(())
    }

    fn list_applications(
        &self,
        status_id: Option<StatusId>,
    ) -> RepoResult<Vec<OrganizationApplication>> {
        let mut applications = Vec::new();
        match status_id {
            Some(status_id) => {
                let mut stmt = self.conn.prepare(&format!(
                    "{APPLICATION_SELECT_SQL}
                     WHERE status_id = ?1
                     ORDER BY creation_date DESC, id ASC;"
                ))?;
                let mut rows = stmt.query([status_id.to_string()])?;
                while let Some(row) = rows.next()? {
                    applications.push(parse_application_row(row)?);
                }
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "{APPLICATION_SELECT_SQL}
                     ORDER BY creation_date DESC, id ASC;"
                ))?;
                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    applications.push(parse_application_row(row)?);
                }
            }
        }
        Ok(applications)
    }
}

pub(crate) fn insert_application(
    conn: &Connection,
    application: &OrganizationApplication,
) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO organization_applications (
            id,
            org_id,
            status_id,
            orgs_in_favor,
            orgs_against
        ) VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            application.id.to_string(),
            application.org_id.map(|value| value.to_string()),
            application.status_id.to_string(),
            encode_array(&application.orgs_in_favor, "orgs_in_favor")?,
            encode_array(&application.orgs_against, "orgs_against")?,
        ],
    )
    .map_err(|err| map_constraint(err, "application status does not exist"))?;
    Ok(())
}

pub(crate) fn load_application(
    conn: &Connection,
    id: ApplicationId,
) -> RepoResult<Option<OrganizationApplication>> {
    let mut stmt = conn.prepare(&format!("{APPLICATION_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_application_row(row)?));
    }
    Ok(None)
}

/// Runs `delete_sql` in one transaction, then withdraws the votes of every
/// organization `doomed_sql` selected before the delete cascaded.
///
/// Returns the number of rows `delete_sql` removed.
pub(crate) fn delete_withdrawing_votes(
    conn: &Connection,
    delete_sql: &str,
    doomed_sql: &str,
    id: Uuid,
) -> RepoResult<usize> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let doomed = query_ids(&tx, doomed_sql, id, "organizations.id")?;
    let changed = tx.execute(delete_sql, [id.to_string()])?;
    let mut withdrawn = 0;
    for org_id in &doomed {
        withdrawn += withdraw_votes_of(&tx, *org_id)?;
    }
    tx.commit()?;

    if !doomed.is_empty() {
        info!(
            "event=organization_cascade module=repo status=ok removed_orgs={} withdrawn_votes={withdrawn}",
            doomed.len()
        );
    }
    Ok(changed)
}

/// Removes `voter` from the vote arrays of every remaining application.
///
/// Returns the number of applications that changed.
pub(crate) fn withdraw_votes_of(conn: &Connection, voter: OrganizationId) -> RepoResult<usize> {
    let candidates = query_ids(
        conn,
        "SELECT id
         FROM organization_applications
         WHERE EXISTS (SELECT 1 FROM json_each(orgs_in_favor) WHERE value = ?1)
            OR EXISTS (SELECT 1 FROM json_each(orgs_against) WHERE value = ?1);",
        voter,
        "organization_applications.id",
    )?;

    let mut withdrawn = 0;
    for application_id in candidates {
        let Some(mut application) = load_application(conn, application_id)? else {
            continue;
        };
        if !application.withdraw_vote(voter) {
            continue;
        }
        conn.execute(
            &format!(
                "UPDATE organization_applications
                 SET orgs_in_favor = ?2,
                     orgs_against = ?3,
                     status_updated = {NOW_MS_SQL}
                 WHERE id = ?1;"
            ),
            params![
                application.id.to_string(),
                encode_array(&application.orgs_in_favor, "orgs_in_favor")?,
                encode_array(&application.orgs_against, "orgs_against")?,
            ],
        )?;
        withdrawn += 1;
    }
    Ok(withdrawn)
}

fn parse_status_row(row: &Row<'_>) -> RepoResult<OrganizationApplicationStatus> {
    let id_text: String = row.get("id")?;
    let status = OrganizationApplicationStatus {
        id: parse_uuid(&id_text, "organization_application_statuses.id")?,
        status_name: row.get("status_name")?,
    };
    status.validate()?;
    Ok(status)
}

fn parse_application_row(row: &Row<'_>) -> RepoResult<OrganizationApplication> {
    let id_text: String = row.get("id")?;
    let status_text: String = row.get("status_id")?;
    let org_id = row
        .get::<_, Option<String>>("org_id")?
        .map(|value| parse_uuid(&value, "organization_applications.org_id"))
        .transpose()?;
    let in_favor_text: String = row.get("orgs_in_favor")?;
    let against_text: String = row.get("orgs_against")?;

    let application = OrganizationApplication {
        id: parse_uuid(&id_text, "organization_applications.id")?,
        org_id,
        status_id: parse_uuid(&status_text, "organization_applications.status_id")?,
        orgs_in_favor: decode_array(&in_favor_text, "organization_applications.orgs_in_favor")?,
        orgs_against: decode_array(&against_text, "organization_applications.orgs_against")?,
        creation_date: row.get("creation_date")?,
        status_updated: row.get("status_updated")?,
    };
    application.validate()?;
    Ok(application)
}
