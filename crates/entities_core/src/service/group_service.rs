//! Group use-case service.
//!
//! # Responsibility
//! - Create groups under active organizations.
//! - Provide profile updates, listing, flagging, tombstoning and hard delete.
//!
//! # Invariants
//! - A group is created only under an active organization, by a registered
//!   user.
//! - Groups of a tombstoned organization are not reachable through `get`.

use crate::model::group::Group;
use crate::model::link::ExternalRef;
use crate::model::{normalize_social_accounts, GroupId, OrganizationId, UserId};
use crate::repo::group_repo::GroupRepository;
use crate::repo::{DeletionImpact, RepoError};
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for group use-cases.
#[derive(Debug)]
pub enum GroupServiceError {
    GroupNotFound(GroupId),
    /// Owning organization does not exist or is tombstoned.
    OrganizationNotFound(OrganizationId),
    CreatorNotRegistered(UserId),
    Repo(RepoError),
    /// Write succeeded but read-back did not find the row.
    InconsistentState(&'static str),
}

impl Display for GroupServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GroupNotFound(id) => write!(f, "group not found: {id}"),
            Self::OrganizationNotFound(id) => write!(f, "organization not found: {id}"),
            Self::CreatorNotRegistered(id) => write!(f, "creator is not a registered user: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent group state: {details}"),
        }
    }
}

impl Error for GroupServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for GroupServiceError {
    fn from(value: RepoError) -> Self {
        match value.not_found_id("group") {
            Some(id) => Self::GroupNotFound(id),
            None => Self::Repo(value),
        }
    }
}

/// Input for creating a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    pub org_id: OrganizationId,
    pub name: String,
    #[serde(default)]
    pub tagline: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub social_accounts: Vec<String>,
    pub created_by: UserId,
}

/// Partial profile update. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupProfile {
    pub name: Option<String>,
    pub tagline: Option<String>,
    pub description: Option<String>,
    pub social_accounts: Option<Vec<String>>,
}

/// Group service facade over repository implementations.
pub struct GroupService<R: GroupRepository> {
    repo: R,
}

impl<R: GroupRepository> GroupService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_group(&self, request: NewGroup) -> Result<Group, GroupServiceError> {
        if !self.repo.organization_is_active(request.org_id)? {
            return Err(GroupServiceError::OrganizationNotFound(request.org_id));
        }
        if !self
            .repo
            .external_exists(ExternalRef::user(request.created_by))?
        {
            return Err(GroupServiceError::CreatorNotRegistered(request.created_by));
        }

        let mut group = Group::new(request.org_id, request.name.trim(), request.created_by);
        group.tagline = request.tagline.trim().to_string();
        group.description = request.description.trim().to_string();
        group.social_accounts = normalize_social_accounts(request.social_accounts);

        let id = self.repo.create_group(&group)?;
        info!(
            "event=group_create module=service status=ok group_id={id} org_id={}",
            group.org_id
        );
        self.repo
            .get_group(id, false)?
            .ok_or(GroupServiceError::InconsistentState(
                "created group not found in read-back",
            ))
    }

    /// Gets one active group of an active organization.
    pub fn get(&self, id: GroupId) -> Result<Group, GroupServiceError> {
        if self.repo.active_group_org(id)?.is_none() {
            return Err(GroupServiceError::GroupNotFound(id));
        }
        self.repo
            .get_group(id, false)?
            .ok_or(GroupServiceError::GroupNotFound(id))
    }

    /// Applies a partial profile update to an active group.
    pub fn update_profile(
        &self,
        id: GroupId,
        profile: GroupProfile,
    ) -> Result<Group, GroupServiceError> {
        let mut group = self.get(id)?;
        if let Some(name) = profile.name {
            group.name = name.trim().to_string();
        }
        if let Some(tagline) = profile.tagline {
            group.tagline = tagline.trim().to_string();
        }
        if let Some(description) = profile.description {
            group.description = description.trim().to_string();
        }
        if let Some(accounts) = profile.social_accounts {
            group.social_accounts = normalize_social_accounts(accounts);
        }
        self.repo.update_group(&group)?;
        self.get(id)
    }

    /// Lists groups of an organization by name.
    pub fn list(
        &self,
        org_id: OrganizationId,
        include_deleted: bool,
    ) -> Result<Vec<Group>, GroupServiceError> {
        Ok(self.repo.list_groups(org_id, include_deleted)?)
    }

    /// Adds one flag and returns the new total.
    pub fn flag(&self, id: GroupId) -> Result<i32, GroupServiceError> {
        let total = self.repo.increment_flags(id)?;
        info!("event=group_flag module=service status=ok group_id={id} total_flags={total}");
        Ok(total)
    }

    /// Sets the deletion tombstone. Repeated calls keep the first timestamp.
    pub fn soft_delete(&self, id: GroupId) -> Result<Group, GroupServiceError> {
        self.repo.set_deletion_date(id, true)?;
        info!("event=group_soft_delete module=service status=ok group_id={id}");
        self.repo
            .get_group(id, true)?
            .ok_or(GroupServiceError::GroupNotFound(id))
    }

    /// Clears the deletion tombstone.
    pub fn restore(&self, id: GroupId) -> Result<Group, GroupServiceError> {
        self.repo.set_deletion_date(id, false)?;
        info!("event=group_restore module=service status=ok group_id={id}");
        self.repo
            .get_group(id, false)?
            .ok_or(GroupServiceError::GroupNotFound(id))
    }

    /// Hard-deletes a group with its members, links and scoped tasks.
    pub fn delete(&self, id: GroupId) -> Result<DeletionImpact, GroupServiceError> {
        let impact = self.repo.deletion_impact(id)?;
        self.repo.delete_group(id)?;
        info!(
            "event=group_delete module=service status=ok group_id={id} removed_rows={}",
            impact.total()
        );
        Ok(impact)
    }
}
