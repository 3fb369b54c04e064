//! Content and task link use-case service.
//!
//! # Responsibility
//! - Link and unlink events, resources and topics for organizations and
//!   groups.
//! - Link tasks to an organization, scoped by one of its groups.
//!
//! # Invariants
//! - Link owners are active; link targets are registered.
//! - A task's group belongs to the task's organization.

use crate::model::link::{ContentKind, ExternalKind, ExternalRef, LinkScope, OrganizationTask};
use crate::model::{GroupId, OrganizationId};
use crate::repo::link_repo::LinkRepository;
use crate::repo::RepoError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Service error for link use-cases.
#[derive(Debug)]
pub enum LinkServiceError {
    /// Organization or group owner does not exist or is tombstoned.
    OwnerNotFound(LinkScope),
    /// Target id is not registered for its kind.
    TargetNotRegistered(ExternalRef),
    /// Task group belongs to a different organization.
    GroupOutsideOrganization {
        group_id: GroupId,
        org_id: OrganizationId,
    },
    /// Link row does not exist.
    LinkNotFound(Uuid),
    Repo(RepoError),
}

impl Display for LinkServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OwnerNotFound(LinkScope::Organization(id)) => {
                write!(f, "organization not found: {id}")
            }
            Self::OwnerNotFound(LinkScope::Group(id)) => write!(f, "group not found: {id}"),
            Self::TargetNotRegistered(reference) => write!(
                f,
                "{} is not registered: {}",
                reference.kind.as_db_str(),
                reference.id
            ),
            Self::GroupOutsideOrganization { group_id, org_id } => {
                write!(f, "group {group_id} does not belong to organization {org_id}")
            }
            Self::LinkNotFound(id) => write!(f, "link not found for {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LinkServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for LinkServiceError {
    fn from(value: RepoError) -> Self {
        if let Some(id) = value.not_found_id("link") {
            return Self::LinkNotFound(id);
        }
        if let Some(id) = value.not_found_id("task link") {
            return Self::LinkNotFound(id);
        }
        Self::Repo(value)
    }
}

/// Link service facade over repository implementations.
pub struct LinkService<R: LinkRepository> {
    repo: R,
}

impl<R: LinkRepository> LinkService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Links a registered event, resource or topic. Returns `false` when the
    /// link already existed.
    pub fn link(
        &self,
        scope: LinkScope,
        kind: ContentKind,
        target: Uuid,
    ) -> Result<bool, LinkServiceError> {
        self.ensure_owner(scope)?;
        self.ensure_registered(ExternalRef::new(kind.external_kind(), target))?;

        let created = self.repo.link(scope, kind, target)?;
        info!(
            "event=link_add module=service status=ok table={} owner_id={} target_id={target} created={created}",
            scope.table(kind),
            scope.id()
        );
        Ok(created)
    }

    pub fn unlink(
        &self,
        scope: LinkScope,
        kind: ContentKind,
        target: Uuid,
    ) -> Result<(), LinkServiceError> {
        self.repo.unlink(scope, kind, target)?;
        info!(
            "event=link_remove module=service status=ok table={} owner_id={} target_id={target}",
            scope.table(kind),
            scope.id()
        );
        Ok(())
    }

    pub fn list_links(
        &self,
        scope: LinkScope,
        kind: ContentKind,
    ) -> Result<Vec<Uuid>, LinkServiceError> {
        Ok(self.repo.list_links(scope, kind)?)
    }

    /// Links a registered task to an organization, scoped by one of its
    /// active groups.
    pub fn link_task(&self, task: OrganizationTask) -> Result<bool, LinkServiceError> {
        self.ensure_owner(LinkScope::Organization(task.org_id))?;
        match self.repo.active_group_org(task.group_id)? {
            None => return Err(LinkServiceError::OwnerNotFound(LinkScope::Group(task.group_id))),
            Some(owner) if owner != task.org_id => {
                return Err(LinkServiceError::GroupOutsideOrganization {
                    group_id: task.group_id,
                    org_id: task.org_id,
                })
            }
            Some(_) => {}
        }
        self.ensure_registered(ExternalRef::new(ExternalKind::Task, task.task_id))?;

        let created = self.repo.link_task(&task)?;
        info!(
            "event=task_link module=service status=ok org_id={} group_id={} task_id={} created={created}",
            task.org_id, task.group_id, task.task_id
        );
        Ok(created)
    }

    pub fn unlink_task(&self, task: OrganizationTask) -> Result<(), LinkServiceError> {
        self.repo.unlink_task(&task)?;
        Ok(())
    }

    /// Lists tasks of an organization, optionally narrowed to one group.
    pub fn list_tasks(
        &self,
        org_id: OrganizationId,
        group_id: Option<GroupId>,
    ) -> Result<Vec<OrganizationTask>, LinkServiceError> {
        Ok(self.repo.list_tasks(org_id, group_id)?)
    }

    fn ensure_owner(&self, scope: LinkScope) -> Result<(), LinkServiceError> {
        let active = match scope {
            LinkScope::Organization(id) => self.repo.organization_is_active(id)?,
            LinkScope::Group(id) => self.repo.active_group_org(id)?.is_some(),
        };
        if !active {
            return Err(LinkServiceError::OwnerNotFound(scope));
        }
        Ok(())
    }

    fn ensure_registered(&self, reference: ExternalRef) -> Result<(), LinkServiceError> {
        if !self.repo.external_exists(reference)? {
            return Err(LinkServiceError::TargetNotRegistered(reference));
        }
        Ok(())
    }
}
