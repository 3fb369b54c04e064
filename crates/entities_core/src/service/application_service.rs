//! Organization application use-case service.
//!
//! # Responsibility
//! - Manage application statuses and status transitions.
//! - Record, move and withdraw organization votes on an application.
//!
//! # Invariants
//! - A voter is an active organization other than the applicant.
//! - A voter appears in at most one vote list; repeating a vote is a no-op.

use crate::model::organization::{
    OrganizationApplication, OrganizationApplicationStatus, Vote, VoteTally,
};
use crate::model::{ApplicationId, OrganizationId, StatusId};
use crate::repo::application_repo::ApplicationRepository;
use crate::repo::RepoError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for application use-cases.
#[derive(Debug)]
pub enum ApplicationServiceError {
    ApplicationNotFound(ApplicationId),
    /// No status with this name (or id) exists.
    StatusNotFound(String),
    /// Voting organization does not exist or is tombstoned.
    VoterNotFound(OrganizationId),
    /// Applicant organization tried to vote on its own application.
    SelfVote(OrganizationId),
    Repo(RepoError),
    /// Write succeeded but read-back did not find the row.
    InconsistentState(&'static str),
}

impl Display for ApplicationServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApplicationNotFound(id) => write!(f, "application not found: {id}"),
            Self::StatusNotFound(name) => write!(f, "application status not found: `{name}`"),
            Self::VoterNotFound(id) => write!(f, "voting organization not found: {id}"),
            Self::SelfVote(id) => {
                write!(f, "organization {id} cannot vote on its own application")
            }
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => {
                write!(f, "inconsistent application state: {details}")
            }
        }
    }
}

impl Error for ApplicationServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ApplicationServiceError {
    fn from(value: RepoError) -> Self {
        if let Some(id) = value.not_found_id("application") {
            return Self::ApplicationNotFound(id);
        }
        if let Some(id) = value.not_found_id("application status") {
            return Self::StatusNotFound(id.to_string());
        }
        Self::Repo(value)
    }
}

/// Application service facade over repository implementations.
pub struct ApplicationService<R: ApplicationRepository> {
    repo: R,
}

impl<R: ApplicationRepository> ApplicationService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn list_statuses(
        &self,
    ) -> Result<Vec<OrganizationApplicationStatus>, ApplicationServiceError> {
        Ok(self.repo.list_statuses()?)
    }

    /// Creates a status; the name is stored trimmed and lowercase.
    pub fn create_status(
        &self,
        status_name: &str,
    ) -> Result<OrganizationApplicationStatus, ApplicationServiceError> {
        let status = OrganizationApplicationStatus::new(status_name);
        let id = self.repo.create_status(&status)?;
        self.repo
            .get_status(id)?
            .ok_or(ApplicationServiceError::InconsistentState(
                "created status not found in read-back",
            ))
    }

    /// Deletes a status and, by cascade, every application in it.
    pub fn delete_status(&self, id: StatusId) -> Result<(), ApplicationServiceError> {
        self.repo.delete_status(id)?;
        info!("event=status_delete module=service status=ok status_id={id}");
        Ok(())
    }

    pub fn get_application(
        &self,
        id: ApplicationId,
    ) -> Result<OrganizationApplication, ApplicationServiceError> {
        self.repo
            .get_application(id)?
            .ok_or(ApplicationServiceError::ApplicationNotFound(id))
    }

    /// Lists applications, newest first, optionally in one named status.
    pub fn list_applications(
        &self,
        status_name: Option<&str>,
    ) -> Result<Vec<OrganizationApplication>, ApplicationServiceError> {
        let status_id = match status_name {
            Some(name) => Some(self.resolve_status(name)?.id),
            None => None,
        };
        Ok(self.repo.list_applications(status_id)?)
    }

    /// Moves an application to the named status.
    pub fn set_status(
        &self,
        id: ApplicationId,
        status_name: &str,
    ) -> Result<OrganizationApplication, ApplicationServiceError> {
        let status = self.resolve_status(status_name)?;
        let mut application = self.get_application(id)?;
        application.status_id = status.id;
        self.repo.update_application(&application)?;
        info!(
            "event=application_status module=service status=ok application_id={id} status_id={}",
            status.id
        );
        self.get_application(id)
    }

    /// Records a vote, moving a previous opposite vote. Same vote is a no-op.
    pub fn record_vote(
        &self,
        id: ApplicationId,
        voter: OrganizationId,
        vote: Vote,
    ) -> Result<OrganizationApplication, ApplicationServiceError> {
        let mut application = self.get_application(id)?;
        if application.org_id == Some(voter) {
            return Err(ApplicationServiceError::SelfVote(voter));
        }
        if !self.repo.organization_is_active(voter)? {
            return Err(ApplicationServiceError::VoterNotFound(voter));
        }

        if application.record_vote(voter, vote) {
            self.repo.update_application(&application)?;
            info!(
                "event=application_vote module=service status=ok application_id={id} voter={voter}"
            );
            return self.get_application(id);
        }
        Ok(application)
    }

    /// Removes any vote by `voter`. Missing votes are a no-op.
    pub fn withdraw_vote(
        &self,
        id: ApplicationId,
        voter: OrganizationId,
    ) -> Result<OrganizationApplication, ApplicationServiceError> {
        let mut application = self.get_application(id)?;
        if application.withdraw_vote(voter) {
            self.repo.update_application(&application)?;
            return self.get_application(id);
        }
        Ok(application)
    }

    pub fn tally(&self, id: ApplicationId) -> Result<VoteTally, ApplicationServiceError> {
        Ok(self.get_application(id)?.tally())
    }

    /// Name of the status an application is currently in.
    pub fn status_of(
        &self,
        id: ApplicationId,
    ) -> Result<OrganizationApplicationStatus, ApplicationServiceError> {
        let application = self.get_application(id)?;
        self.repo
            .get_status(application.status_id)?
            .ok_or(ApplicationServiceError::StatusNotFound(
                application.status_id.to_string(),
            ))
    }

    fn resolve_status(
        &self,
        status_name: &str,
    ) -> Result<OrganizationApplicationStatus, ApplicationServiceError> {
        self.repo
            .find_status_by_name(status_name)?
            .ok_or_else(|| ApplicationServiceError::StatusNotFound(status_name.trim().to_string()))
    }
}
