//! Command-line argument definitions.

use clap::{Parser, Subcommand, ValueEnum};
use entities_core::ExternalKind;
use std::path::PathBuf;
use uuid::Uuid;

/// Operator tool for the organizations and groups store.
#[derive(Debug, Parser)]
#[command(name = "entities")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Configuration file (TOML). Environment `ENTITIES__*` overrides it.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Database file; overrides `database.path`.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check core linkage
    Ping,
    /// Print schema version and row counts
    Status,
    /// Register an id owned by another subsystem
    RegisterRef {
        #[arg(long, value_enum)]
        kind: RefKind,
        #[arg(long)]
        id: Uuid,
    },
    /// Register an organization with a pending application
    RegisterOrg {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        tagline: String,
        /// Registered user id of the creator
        #[arg(long)]
        created_by: Uuid,
        /// Social account handle; repeatable
        #[arg(long = "social")]
        social_accounts: Vec<String>,
    },
    /// List organizations, newest first
    ListOrgs {
        /// Case-insensitive name fragment
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long)]
        include_deleted: bool,
    },
    /// List groups of one organization by name
    ListGroups {
        #[arg(long)]
        org: Uuid,
        #[arg(long)]
        include_deleted: bool,
    },
}

/// Registry kinds accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RefKind {
    User,
    Event,
    Resource,
    Task,
    Topic,
}

impl From<RefKind> for ExternalKind {
    fn from(value: RefKind) -> Self {
        match value {
            RefKind::User => Self::User,
            RefKind::Event => Self::Event,
            RefKind::Resource => Self::Resource,
            RefKind::Task => Self::Task,
            RefKind::Topic => Self::Topic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, RefKind};
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_db_option_parses_after_subcommand() {
        let cli = Cli::parse_from([
            "entities",
            "register-ref",
            "--kind",
            "user",
            "--id",
            "4c1f6a3e-0d6b-4d1e-9a51-6f3c2f7a1b99",
            "--db",
            "/tmp/orgs.sqlite3",
        ]);
        assert_eq!(cli.db.as_deref().and_then(|p| p.to_str()), Some("/tmp/orgs.sqlite3"));
        assert!(matches!(
            cli.command,
            Command::RegisterRef {
                kind: RefKind::User,
                ..
            }
        ));
    }

    #[test]
    fn register_org_collects_repeated_social_flags() {
        let cli = Cli::parse_from([
            "entities",
            "register-org",
            "--name",
            "Climate Action Berlin",
            "--created-by",
            "4c1f6a3e-0d6b-4d1e-9a51-6f3c2f7a1b99",
            "--social",
            "@cab",
            "--social",
            "cab.social",
        ]);
        let Command::RegisterOrg {
            social_accounts,
            tagline,
            ..
        } = cli.command
        else {
            panic!("expected register-org");
        };
        assert_eq!(social_accounts, vec!["@cab", "cab.social"]);
        assert!(tagline.is_empty());
    }
}
