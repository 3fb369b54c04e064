//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//! - Share row decoding, schema readiness checks and lookups across
//!   repositories.
//!
//! # Invariants
//! - Write paths call the model `validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::link::ExternalRef;
use crate::model::{EntityValidationError, GroupId, OrganizationId};
use rusqlite::{Connection, ErrorCode, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod application_repo;
pub mod external_repo;
pub mod group_repo;
pub mod link_repo;
pub mod membership_repo;
pub mod organization_repo;

/// Implements `EntityLookup` for a repository holding `conn: &Connection`.
macro_rules! impl_entity_lookup {
    ($repo:ident) => {
        impl $crate::repo::EntityLookup for $repo<'_> {
            fn external_exists(
                &self,
                reference: $crate::model::link::ExternalRef,
            ) -> $crate::repo::RepoResult<bool> {
                $crate::repo::external_exists(self.conn, reference)
            }

            fn organization_is_active(
                &self,
                org_id: $crate::model::OrganizationId,
            ) -> $crate::repo::RepoResult<bool> {
                $crate::repo::organization_is_active(self.conn, org_id)
            }

            fn active_group_org(
                &self,
                group_id: $crate::model::GroupId,
            ) -> $crate::repo::RepoResult<Option<$crate::model::OrganizationId>> {
                $crate::repo::active_group_org(self.conn, group_id)
            }
        }
    };
}
pub(crate) use impl_entity_lookup;

/// SQL expression for "now" in epoch milliseconds.
pub(crate) const NOW_MS_SQL: &str = "(strftime('%s', 'now') * 1000)";

const LIST_DEFAULT_LIMIT: u32 = 10;
const LIST_LIMIT_MAX: u32 = 50;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(EntityValidationError),
    Db(DbError),
    /// Target row does not exist (or is tombstoned where that matters).
    NotFound { entity: &'static str, id: Uuid },
    /// Write violates a uniqueness or reference constraint.
    Conflict(String),
    /// Persisted data cannot be converted to a valid model.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::Conflict(_) => None,
            Self::InvalidData(_) => None,
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<EntityValidationError> for RepoError {
    fn from(value: EntityValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl RepoError {
    pub(crate) fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    /// Returns the missing id when this is a `NotFound` for `entity`.
    pub fn not_found_id(&self, entity: &'static str) -> Option<Uuid> {
        match self {
            Self::NotFound { entity: current, id } if *current == entity => Some(*id),
            _ => None,
        }
    }
}

/// Counts of rows removed by a cascading delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionImpact {
    pub groups: u64,
    pub organization_members: u64,
    pub group_members: u64,
    /// Event, resource and topic join rows across the organization and its groups.
    pub content_links: u64,
    pub tasks: u64,
}

impl DeletionImpact {
    pub fn total(&self) -> u64 {
        self.groups + self.organization_members + self.group_members + self.content_links + self.tasks
    }
}

/// Cross-entity existence checks shared by every repository.
pub trait EntityLookup {
    /// Whether `reference` is registered by its owning subsystem.
    fn external_exists(&self, reference: ExternalRef) -> RepoResult<bool>;
    /// Whether the organization exists and is not tombstoned.
    fn organization_is_active(&self, org_id: OrganizationId) -> RepoResult<bool>;
    /// Owning organization of an active group in an active organization.
    fn active_group_org(&self, group_id: GroupId) -> RepoResult<Option<OrganizationId>>;
}

pub(crate) fn external_exists(conn: &Connection, reference: ExternalRef) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        &format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1);",
            reference.kind.table()
        ),
        [reference.id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn organization_is_active(conn: &Connection, org_id: OrganizationId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM organizations
            WHERE id = ?1
              AND deletion_date IS NULL
        );",
        [org_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn active_group_org(
    conn: &Connection,
    group_id: GroupId,
) -> RepoResult<Option<OrganizationId>> {
    let org_id: Option<String> = conn
        .query_row(
            "SELECT g.org_id
             FROM org_groups g
             INNER JOIN organizations o ON o.id = g.org_id
             WHERE g.id = ?1
               AND g.deletion_date IS NULL
               AND o.deletion_date IS NULL;",
            [group_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    org_id
        .map(|value| parse_uuid(&value, "org_groups.org_id"))
        .transpose()
}

/// Verifies the connection is migrated and exposes `tables`.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    tables: &[&'static str],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &table in tables {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

/// Runs a single-value `COUNT` query bound to one id.
pub(crate) fn count_rows(conn: &Connection, sql: &str, id: Uuid) -> RepoResult<u64> {
    let count: i64 = conn.query_row(sql, [id.to_string()], |row| row.get(0))?;
    u64::try_from(count).map_err(|_| RepoError::InvalidData(format!("negative row count {count}")))
}

/// Runs a single-column id query bound to one id.
pub(crate) fn query_ids(
    conn: &Connection,
    sql: &str,
    id: Uuid,
    column: &'static str,
) -> RepoResult<Vec<Uuid>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([id.to_string()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value, column)?);
    }
    Ok(ids)
}

/// Normalizes a list limit: defaults to 10, clamps to 50.
pub fn normalize_list_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => LIST_DEFAULT_LIMIT,
        Some(value) if value > LIST_LIMIT_MAX => LIST_LIMIT_MAX,
        Some(value) => value,
    }
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_bool(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

/// Encodes an array column as JSON text.
pub(crate) fn encode_array<T: Serialize>(values: &[T], column: &'static str) -> RepoResult<String> {
    serde_json::to_string(values)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode {column}: {err}")))
}

/// Decodes a JSON text array column.
pub(crate) fn decode_array<T: DeserializeOwned>(
    value: &str,
    column: &'static str,
) -> RepoResult<Vec<T>> {
    serde_json::from_str(value)
        .map_err(|err| RepoError::InvalidData(format!("invalid array in {column}: {err}")))
}

/// Maps SQLite constraint failures to `Conflict`, passing others through.
pub(crate) fn map_constraint(err: rusqlite::Error, context: &str) -> RepoError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            RepoError::Conflict(match message {
                Some(detail) => format!("{context}: {detail}"),
                None => context.to_string(),
            })
        }
        _ => err.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_array, encode_array, normalize_list_limit, parse_bool, RepoError};
    use uuid::Uuid;

    #[test]
    fn list_limit_defaults_and_clamps() {
        assert_eq!(normalize_list_limit(None), 10);
        assert_eq!(normalize_list_limit(Some(0)), 10);
        assert_eq!(normalize_list_limit(Some(25)), 25);
        assert_eq!(normalize_list_limit(Some(500)), 50);
    }

    #[test]
    fn array_codec_keeps_uuid_order() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let encoded = encode_array(&ids, "orgs_in_favor").unwrap();
        let decoded: Vec<Uuid> = decode_array(&encoded, "orgs_in_favor").unwrap();
        assert_eq!(decoded, ids);
    }

    #[test]
    fn decode_array_rejects_non_array_text() {
        let err = decode_array::<String>("{\"a\":1}", "social_accounts").unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(message) if message.contains("social_accounts")));
    }

    #[test]
    fn parse_bool_rejects_out_of_range_values() {
        assert!(parse_bool(1, "is_admin").unwrap());
        assert!(parse_bool(2, "is_admin").is_err());
    }
}
