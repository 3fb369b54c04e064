//! Read-only schema and row count summary for operators.

use super::migrations::current_version;
use super::DbResult;
use rusqlite::Connection;
use serde::Serialize;

/// Tables reported by [`schema_status`], in report order.
pub const REPORTED_TABLES: &[&str] = &[
    "ext_users",
    "ext_events",
    "ext_resources",
    "ext_tasks",
    "ext_topics",
    "organization_application_statuses",
    "organization_applications",
    "organizations",
    "org_groups",
    "organization_members",
    "organization_events",
    "organization_resources",
    "organization_tasks",
    "organization_topics",
    "group_members",
    "group_events",
    "group_resources",
    "group_topics",
];

/// Schema version plus per-table row counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaStatus {
    pub schema_version: u32,
    pub tables: Vec<TableCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: &'static str,
    pub rows: i64,
}

/// Reads the schema version and counts rows of every reported table.
pub fn schema_status(conn: &Connection) -> DbResult<SchemaStatus> {
    let mut tables = Vec::with_capacity(REPORTED_TABLES.len());
    for &table in REPORTED_TABLES {
        let rows = conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
            row.get(0)
        })?;
        tables.push(TableCount { table, rows });
    }
    Ok(SchemaStatus {
        schema_version: current_version(conn)?,
        tables,
    })
}
