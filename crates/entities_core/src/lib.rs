//! Organizations and groups data layer.
//!
//! Owns the relational schema for organizations, their applications, groups,
//! memberships and links to entities owned by other subsystems. This crate is
//! the single source of truth for those invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{load_config, ConfigError, DatabaseConfig, EntitiesConfig, LoggingConfig};
pub use db::{open_db, open_db_in_memory, schema_status, DbError, DbResult, SchemaStatus};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::group::Group;
pub use model::link::{
    ContentKind, ExternalKind, ExternalRef, GroupMember, LinkScope, OrganizationMember,
    OrganizationRoles, OrganizationTask,
};
pub use model::organization::{
    Organization, OrganizationApplication, OrganizationApplicationStatus, Vote, VoteTally,
};
pub use model::{
    ApplicationId, EntityValidationError, GroupId, OrganizationId, StatusId, UserId,
};
pub use repo::application_repo::{ApplicationRepository, SqliteApplicationRepository};
pub use repo::external_repo::{ExternalRefRepository, SqliteExternalRefRepository};
pub use repo::group_repo::{GroupRepository, SqliteGroupRepository};
pub use repo::link_repo::{LinkRepository, SqliteLinkRepository};
pub use repo::membership_repo::{MembershipRepository, SqliteMembershipRepository};
pub use repo::organization_repo::{
    OrganizationListQuery, OrganizationRepository, SqliteOrganizationRepository,
};
pub use repo::{DeletionImpact, EntityLookup, RepoError, RepoResult};
pub use service::application_service::{ApplicationService, ApplicationServiceError};
pub use service::group_service::{GroupProfile, GroupService, GroupServiceError, NewGroup};
pub use service::link_service::{LinkService, LinkServiceError};
pub use service::membership_service::{MembershipService, MembershipServiceError};
pub use service::organization_service::{
    NewOrganization, OrganizationListResult, OrganizationProfile, OrganizationService,
    OrganizationServiceError,
};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
