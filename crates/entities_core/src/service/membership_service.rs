//! Membership use-case service.
//!
//! # Responsibility
//! - Add, update and remove organization members with role flags.
//! - Add, update and remove group members with the admin flag.
//!
//! # Invariants
//! - New memberships require an active owner and a registered user.
//! - Role updates never create a membership implicitly.

use crate::model::link::{ExternalRef, GroupMember, OrganizationMember, OrganizationRoles};
use crate::model::{GroupId, OrganizationId, UserId};
use crate::repo::membership_repo::MembershipRepository;
use crate::repo::RepoError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for membership use-cases.
#[derive(Debug)]
pub enum MembershipServiceError {
    /// Organization does not exist or is tombstoned.
    OrganizationNotFound(OrganizationId),
    /// Group (or its organization) does not exist or is tombstoned.
    GroupNotFound(GroupId),
    UserNotRegistered(UserId),
    /// User has no membership in the target organization or group.
    MemberNotFound(UserId),
    Repo(RepoError),
}

impl Display for MembershipServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OrganizationNotFound(id) => write!(f, "organization not found: {id}"),
            Self::GroupNotFound(id) => write!(f, "group not found: {id}"),
            Self::UserNotRegistered(id) => write!(f, "user is not registered: {id}"),
            Self::MemberNotFound(id) => write!(f, "membership not found for user {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MembershipServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for MembershipServiceError {
    fn from(value: RepoError) -> Self {
        if let Some(id) = value.not_found_id("organization member") {
            return Self::MemberNotFound(id);
        }
        if let Some(id) = value.not_found_id("group member") {
            return Self::MemberNotFound(id);
        }
        Self::Repo(value)
    }
}

/// Membership service facade over repository implementations.
pub struct MembershipService<R: MembershipRepository> {
    repo: R,
}

impl<R: MembershipRepository> MembershipService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Adds a user to an organization, or replaces the roles of an existing
    /// membership.
    pub fn add_org_member(
        &self,
        org_id: OrganizationId,
        user_id: UserId,
        roles: OrganizationRoles,
    ) -> Result<OrganizationMember, MembershipServiceError> {
        if !self.repo.organization_is_active(org_id)? {
            return Err(MembershipServiceError::OrganizationNotFound(org_id));
        }
        self.ensure_user(user_id)?;

        let member = OrganizationMember {
            org_id,
            user_id,
            roles,
        };
        let created = self.repo.upsert_org_member(&member)?;
        info!(
            "event=org_member_upsert module=service status=ok org_id={org_id} user_id={user_id} created={created}"
        );
        Ok(member)
    }

    /// Replaces role flags of an existing organization membership.
    pub fn update_org_roles(
        &self,
        org_id: OrganizationId,
        user_id: UserId,
        roles: OrganizationRoles,
    ) -> Result<OrganizationMember, MembershipServiceError> {
        if self.repo.get_org_member(org_id, user_id)?.is_none() {
            return Err(MembershipServiceError::MemberNotFound(user_id));
        }
        self.add_org_member(org_id, user_id, roles)
    }

    pub fn get_org_member(
        &self,
        org_id: OrganizationId,
        user_id: UserId,
    ) -> Result<OrganizationMember, MembershipServiceError> {
        self.repo
            .get_org_member(org_id, user_id)?
            .ok_or(MembershipServiceError::MemberNotFound(user_id))
    }

    pub fn remove_org_member(
        &self,
        org_id: OrganizationId,
        user_id: UserId,
    ) -> Result<(), MembershipServiceError> {
        self.repo.remove_org_member(org_id, user_id)?;
        info!("event=org_member_remove module=service status=ok org_id={org_id} user_id={user_id}");
        Ok(())
    }

    /// Lists members with owners first, then admins.
    pub fn list_org_members(
        &self,
        org_id: OrganizationId,
    ) -> Result<Vec<OrganizationMember>, MembershipServiceError> {
        Ok(self.repo.list_org_members(org_id)?)
    }

    /// Lists the active organizations a user belongs to.
    pub fn list_user_organizations(
        &self,
        user_id: UserId,
    ) -> Result<Vec<OrganizationMember>, MembershipServiceError> {
        Ok(self.repo.list_user_organizations(user_id)?)
    }

    /// Adds a user to an active group, or replaces the admin flag of an
    /// existing membership.
    pub fn add_group_member(
        &self,
        group_id: GroupId,
        user_id: UserId,
        is_admin: bool,
    ) -> Result<GroupMember, MembershipServiceError> {
        if self.repo.active_group_org(group_id)?.is_none() {
            return Err(MembershipServiceError::GroupNotFound(group_id));
        }
        self.ensure_user(user_id)?;

        let member = GroupMember {
            group_id,
            user_id,
            is_admin,
        };
        let created = self.repo.upsert_group_member(&member)?;
        info!(
            "event=group_member_upsert module=service status=ok group_id={group_id} user_id={user_id} created={created}"
        );
        Ok(member)
    }

    /// Sets the admin flag of an existing group membership.
    pub fn set_group_admin(
        &self,
        group_id: GroupId,
        user_id: UserId,
        is_admin: bool,
    ) -> Result<GroupMember, MembershipServiceError> {
        if self.repo.get_group_member(group_id, user_id)?.is_none() {
            return Err(MembershipServiceError::MemberNotFound(user_id));
        }
        self.add_group_member(group_id, user_id, is_admin)
    }

    pub fn get_group_member(
        &self,
        group_id: GroupId,
        user_id: UserId,
    ) -> Result<GroupMember, MembershipServiceError> {
        self.repo
            .get_group_member(group_id, user_id)?
            .ok_or(MembershipServiceError::MemberNotFound(user_id))
    }

    pub fn remove_group_member(
        &self,
        group_id: GroupId,
        user_id: UserId,
    ) -> Result<(), MembershipServiceError> {
        self.repo.remove_group_member(group_id, user_id)?;
        info!(
            "event=group_member_remove module=service status=ok group_id={group_id} user_id={user_id}"
        );
        Ok(())
    }

    /// Lists members with admins first.
    pub fn list_group_members(
        &self,
        group_id: GroupId,
    ) -> Result<Vec<GroupMember>, MembershipServiceError> {
        Ok(self.repo.list_group_members(group_id)?)
    }

    /// Lists the active groups a user belongs to.
    pub fn list_user_groups(
        &self,
        user_id: UserId,
    ) -> Result<Vec<GroupMember>, MembershipServiceError> {
        Ok(self.repo.list_user_groups(user_id)?)
    }

    fn ensure_user(&self, user_id: UserId) -> Result<(), MembershipServiceError> {
        if !self.repo.external_exists(ExternalRef::user(user_id))? {
            return Err(MembershipServiceError::UserNotRegistered(user_id));
        }
        Ok(())
    }
}
