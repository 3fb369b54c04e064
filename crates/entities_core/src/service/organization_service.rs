//! Organization use-case service.
//!
//! # Responsibility
//! - Register organizations together with their pending application and
//!   owner membership.
//! - Provide profile updates, listing, flagging, tombstoning and hard delete.
//!
//! # Invariants
//! - The creator must be a registered user.
//! - Registration is atomic: either application, organization and owner
//!   membership all exist, or none of them does.
//! - `delete` reports the impact counted right before the cascade.

use crate::model::link::ExternalRef;
use crate::model::organization::{Organization, OrganizationApplication, STATUS_PENDING};
use crate::model::{normalize_social_accounts, OrganizationId, UserId};
use crate::repo::organization_repo::{OrganizationListQuery, OrganizationRepository};
use crate::repo::{normalize_list_limit, DeletionImpact, RepoError};
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for organization use-cases.
#[derive(Debug)]
pub enum OrganizationServiceError {
    OrganizationNotFound(OrganizationId),
    /// Creator is not registered in the user registry.
    CreatorNotRegistered(UserId),
    /// The `pending` application status has been removed.
    PendingStatusMissing,
    Repo(RepoError),
    /// Write succeeded but read-back did not find the row.
    InconsistentState(&'static str),
}

impl Display for OrganizationServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OrganizationNotFound(id) => write!(f, "organization not found: {id}"),
            Self::CreatorNotRegistered(id) => write!(f, "creator is not a registered user: {id}"),
            Self::PendingStatusMissing => {
                write!(f, "application status `{STATUS_PENDING}` does not exist")
            }
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => {
                write!(f, "inconsistent organization state: {details}")
            }
        }
    }
}

impl Error for OrganizationServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for OrganizationServiceError {
    fn from(value: RepoError) -> Self {
        match value.not_found_id("organization") {
            Some(id) => Self::OrganizationNotFound(id),
            None => Self::Repo(value),
        }
    }
}

/// Input for registering an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrganization {
    pub name: String,
    #[serde(default)]
    pub tagline: String,
    #[serde(default)]
    pub social_accounts: Vec<String>,
    pub created_by: UserId,
}

/// Partial profile update. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationProfile {
    pub name: Option<String>,
    pub tagline: Option<String>,
    pub social_accounts: Option<Vec<String>>,
}

/// List result envelope used by service callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationListResult {
    /// Items sorted by `creation_date DESC, id ASC`.
    pub items: Vec<Organization>,
    /// Effective normalized limit used by the query.
    pub applied_limit: u32,
}

/// Organization service facade over repository implementations.
pub struct OrganizationService<R: OrganizationRepository> {
    repo: R,
}

impl<R: OrganizationRepository> OrganizationService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers an organization with a pending application and makes the
    /// creator its owner.
    pub fn register_organization(
        &self,
        request: NewOrganization,
    ) -> Result<Organization, OrganizationServiceError> {
        if !self
            .repo
            .external_exists(ExternalRef::user(request.created_by))?
        {
            return Err(OrganizationServiceError::CreatorNotRegistered(
                request.created_by,
            ));
        }
        let status_id = self
            .repo
            .find_status_id(STATUS_PENDING)?
            .ok_or(OrganizationServiceError::PendingStatusMissing)?;

        let application = OrganizationApplication::new(status_id);
        let mut organization = Organization::new(
            request.name.trim(),
            request.tagline.trim(),
            application.id,
            request.created_by,
        );
        organization.social_accounts = normalize_social_accounts(request.social_accounts);

        self.repo.register_organization(&organization, &application)?;
        info!(
            "event=organization_register module=service status=ok org_id={} application_id={}",
            organization.id, application.id
        );

        self.repo
            .get_organization(organization.id, false)?
            .ok_or(OrganizationServiceError::InconsistentState(
                "registered organization not found in read-back",
            ))
    }

    /// Gets one active organization.
    pub fn get(&self, id: OrganizationId) -> Result<Organization, OrganizationServiceError> {
        self.get_organization(id, false)
    }

    /// Gets one organization, optionally including a tombstoned one.
    pub fn get_organization(
        &self,
        id: OrganizationId,
        include_deleted: bool,
    ) -> Result<Organization, OrganizationServiceError> {
        self.repo
            .get_organization(id, include_deleted)?
            .ok_or(OrganizationServiceError::OrganizationNotFound(id))
    }

    /// Applies a partial profile update to an active organization.
    pub fn update_profile(
        &self,
        id: OrganizationId,
        profile: OrganizationProfile,
    ) -> Result<Organization, OrganizationServiceError> {
        let mut organization = self.get(id)?;
        if let Some(name) = profile.name {
            organization.name = name.trim().to_string();
        }
        if let Some(tagline) = profile.tagline {
            organization.tagline = tagline.trim().to_string();
        }
        if let Some(accounts) = profile.social_accounts {
            organization.social_accounts = normalize_social_accounts(accounts);
        }
        self.repo.update_organization(&organization)?;
        self.get(id)
    }

    /// Lists organizations with a normalized limit.
    pub fn list(
        &self,
        query: &OrganizationListQuery,
    ) -> Result<OrganizationListResult, OrganizationServiceError> {
        let applied_limit = normalize_list_limit(query.limit);
        let normalized = OrganizationListQuery {
            limit: Some(applied_limit),
            ..query.clone()
        };
        let items = self.repo.list_organizations(&normalized)?;
        Ok(OrganizationListResult {
            items,
            applied_limit,
        })
    }

    /// Adds one flag and returns the new total.
    pub fn flag(&self, id: OrganizationId) -> Result<i32, OrganizationServiceError> {
        let total = self.repo.increment_flags(id)?;
        info!("event=organization_flag module=service status=ok org_id={id} total_flags={total}");
        Ok(total)
    }

    /// Sets the deletion tombstone. Repeated calls keep the first timestamp.
    pub fn soft_delete(
        &self,
        id: OrganizationId,
    ) -> Result<Organization, OrganizationServiceError> {
        self.repo.set_deletion_date(id, true)?;
        info!("event=organization_soft_delete module=service status=ok org_id={id}");
        self.get_organization(id, true)
    }

    /// Clears the deletion tombstone.
    pub fn restore(&self, id: OrganizationId) -> Result<Organization, OrganizationServiceError> {
        self.repo.set_deletion_date(id, false)?;
        info!("event=organization_restore module=service status=ok org_id={id}");
        self.get(id)
    }

    /// Counts what a hard delete would remove.
    pub fn deletion_impact(
        &self,
        id: OrganizationId,
    ) -> Result<DeletionImpact, OrganizationServiceError> {
        Ok(self.repo.deletion_impact(id)?)
    }

    /// Hard-deletes an organization with its application, groups and links.
    pub fn delete(&self, id: OrganizationId) -> Result<DeletionImpact, OrganizationServiceError> {
        let impact = self.repo.deletion_impact(id)?;
        self.repo.delete_organization(id)?;
        info!(
            "event=organization_delete module=service status=ok org_id={id} removed_rows={}",
            impact.total()
        );
        Ok(impact)
    }
}
