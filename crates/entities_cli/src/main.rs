//! Operator entry point for the entities store.
//!
//! # Responsibility
//! - Load layered config, initialize logging, open and migrate the database.
//! - Expose a few inspection and registration commands.
//!
//! # Invariants
//! - Record output is one JSON document per line.

mod args;

use anyhow::{Context, Result};
use args::{Cli, Command};
use clap::Parser;
use entities_core::{
    core_version, init_logging_from_config, load_config, open_db, ping, schema_status,
    ExternalKind, ExternalRef, ExternalRefRepository, GroupService, NewOrganization,
    OrganizationListQuery, OrganizationService, SqliteExternalRefRepository,
    SqliteGroupRepository, SqliteOrganizationRepository,
};
use log::info;
use serde_json::json;

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Ping = cli.command {
        println!("entities_core ping={}", ping());
        println!("entities_core version={}", core_version());
        return Ok(());
    }

    let mut config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(db) = cli.db {
        config.database.path = db;
    }
    init_logging_from_config(&config.logging).context("failed to initialize logging")?;

    let conn = open_db(&config.database.path).with_context(|| {
        format!(
            "failed to open database `{}`",
            config.database.path.display()
        )
    })?;
    info!("event=cli_start module=cli status=ok version={}", core_version());

    match cli.command {
        // Answered before the database is opened.
        Command::Ping => {}
        Command::Status => {
            let status = schema_status(&conn)?;
            println!("{}", serde_json::to_string(&status)?);
        }
        Command::RegisterRef { kind, id } => {
            let kind = ExternalKind::from(kind);
            let repo = SqliteExternalRefRepository::try_new(&conn)?;
            let created = repo.register(ExternalRef::new(kind, id))?;
            println!("{}", json!({ "kind": kind, "id": id, "created": created }));
        }
        Command::RegisterOrg {
            name,
            tagline,
            created_by,
            social_accounts,
        } => {
            let service = OrganizationService::new(SqliteOrganizationRepository::try_new(&conn)?);
            let organization = service.register_organization(NewOrganization {
                name,
                tagline,
                social_accounts,
                created_by,
            })?;
            println!("{}", serde_json::to_string(&organization)?);
        }
        Command::ListOrgs {
            name,
            limit,
            offset,
            include_deleted,
        } => {
            let service = OrganizationService::new(SqliteOrganizationRepository::try_new(&conn)?);
            let result = service.list(&OrganizationListQuery {
                name_contains: name,
                created_by: None,
                include_deleted,
                limit,
                offset,
            })?;
            for organization in &result.items {
                println!("{}", serde_json::to_string(organization)?);
            }
        }
        Command::ListGroups {
            org,
            include_deleted,
        } => {
            let service = GroupService::new(SqliteGroupRepository::try_new(&conn)?);
            for group in service.list(org, include_deleted)? {
                println!("{}", serde_json::to_string(&group)?);
            }
        }
    }

    Ok(())
}
