//! Registry of entity ids owned by other subsystems.
//!
//! # Responsibility
//! - Record which users/events/resources/tasks/topics exist so that join
//!   rows can reference them by foreign key.
//! - Propagate removal of a foreign entity through cascading deletes.
//!
//! # Invariants
//! - Registration is idempotent.
//! - Removing an id deletes every join row (and every organization or group
//!   created by a removed user) in the same transaction; votes cast by the
//!   removed organizations are withdrawn with it.

use super::application_repo::delete_withdrawing_votes;
use super::{ensure_connection_ready, impl_entity_lookup, parse_uuid, RepoError, RepoResult};
use crate::model::link::{ExternalKind, ExternalRef};
use log::info;
use rusqlite::Connection;
use uuid::Uuid;

/// Repository interface for the foreign entity registry.
pub trait ExternalRefRepository {
    /// Registers one id. Returns `false` when it was already registered.
    fn register(&self, reference: ExternalRef) -> RepoResult<bool>;
    /// Removes one id and everything that references it.
    fn remove(&self, reference: ExternalRef) -> RepoResult<()>;
    fn exists(&self, reference: ExternalRef) -> RepoResult<bool>;
    /// Lists registered ids of one kind in registration order.
    fn list(&self, kind: ExternalKind) -> RepoResult<Vec<Uuid>>;
}

/// SQLite-backed foreign entity registry.
pub struct SqliteExternalRefRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteExternalRefRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let tables = ExternalKind::ALL.map(ExternalKind::table);
        ensure_connection_ready(conn, &tables)?;
        Ok(Self { conn })
    }
}

impl_entity_lookup!(SqliteExternalRefRepository);

impl ExternalRefRepository for SqliteExternalRefRepository<'_> {
    fn register(&self, reference: ExternalRef) -> RepoResult<bool> {
        if reference.id.is_nil() {
            return Err(RepoError::Conflict(format!(
                "cannot register nil {} id",
                reference.kind.as_db_str()
            )));
        }
        let inserted = self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {} (id) VALUES (?1);",
                reference.kind.table()
            ),
            [reference.id.to_string()],
        )?;
        Ok(inserted == 1)
    }

    fn remove(&self, reference: ExternalRef) -> RepoResult<()> {
        let delete_sql = format!("DELETE FROM {} WHERE id = ?1;", reference.kind.table());
        let changed = match reference.kind {
            // Organizations created by the user go with it.
            ExternalKind::User => delete_withdrawing_votes(
                self.conn,
                &delete_sql,
                "SELECT id FROM organizations WHERE created_by = ?1;",
                reference.id,
            )?,
            _ => self.conn.execute(&delete_sql, [reference.id.to_string()])?,
        };
        if changed == 0 {
            return Err(RepoError::not_found(
                reference.kind.as_db_str(),
                reference.id,
            ));
        }

        info!(
            "event=external_remove module=repo status=ok kind={} id={}",
            reference.kind.as_db_str(),
            reference.id
        );
        Ok(())
    }

    fn exists(&self, reference: ExternalRef) -> RepoResult<bool> {
        super::external_exists(self.conn, reference)
    }

    fn list(&self, kind: ExternalKind) -> RepoResult<Vec<Uuid>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id FROM {} ORDER BY registered_at ASC, rowid ASC;",
            kind.table()
        ))?;
        let mut rows = stmt.query([])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "external registry id")?);
        }
        Ok(ids)
    }
}
