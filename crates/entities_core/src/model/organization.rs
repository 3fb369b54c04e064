//! Organization, application and application status records.
//!
//! # Responsibility
//! - Define the root `Organization` record and its membership application.
//! - Provide vote bookkeeping helpers for application review.
//!
//! # Invariants
//! - Every organization references exactly one application.
//! - An organization id appears at most once across `orgs_in_favor` and
//!   `orgs_against`.
//! - `deletion_date` is the source of truth for tombstone state.

use super::{
    ensure_flags, ensure_max_chars, ensure_not_nil, ensure_required_text, ensure_social_accounts,
    ApplicationId, EntityValidationError, OrganizationId, StatusId, UserId, MAX_SHORT_TEXT_CHARS,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Status assigned to newly submitted applications.
pub const STATUS_PENDING: &str = "pending";
/// Status for accepted applications.
pub const STATUS_APPROVED: &str = "approved";
/// Status for declined applications.
pub const STATUS_REJECTED: &str = "rejected";

/// Named review state of an organization application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationApplicationStatus {
    pub id: StatusId,
    pub status_name: String,
}

impl OrganizationApplicationStatus {
    /// Creates a status with a generated id and normalized name.
    pub fn new(status_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            status_name: normalize_status_name(status_name),
        }
    }

    pub fn validate(&self) -> Result<(), EntityValidationError> {
        ensure_not_nil(self.id, "status.id")?;
        ensure_required_text(&self.status_name, "status_name", MAX_SHORT_TEXT_CHARS)
    }
}

/// Normalizes a status name to its stored lowercase form.
pub fn normalize_status_name(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Direction of one organization's opinion on an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    InFavor,
    Against,
}

/// Vote counts for one application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoteTally {
    pub in_favor: usize,
    pub against: usize,
}

/// Membership application submitted on behalf of an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationApplication {
    pub id: ApplicationId,
    /// Back-reference to the applying organization; set once it exists.
    pub org_id: Option<OrganizationId>,
    pub status_id: StatusId,
    pub orgs_in_favor: Vec<OrganizationId>,
    pub orgs_against: Vec<OrganizationId>,
    /// Epoch ms, assigned by storage on insert.
    pub creation_date: i64,
    /// Epoch ms, refreshed by storage on every update.
    pub status_updated: i64,
}

impl OrganizationApplication {
    /// Creates an application with no votes and no organization yet.
    pub fn new(status_id: StatusId) -> Self {
        Self {
            id: Uuid::new_v4(),
            org_id: None,
            status_id,
            orgs_in_favor: Vec::new(),
            orgs_against: Vec::new(),
            creation_date: 0,
            status_updated: 0,
        }
    }

    pub fn validate(&self) -> Result<(), EntityValidationError> {
        ensure_not_nil(self.id, "application.id")?;
        ensure_not_nil(self.status_id, "application.status_id")?;

        let mut in_favor = HashSet::new();
        for id in &self.orgs_in_favor {
            if !in_favor.insert(*id) {
                return Err(EntityValidationError::DuplicateVote(*id));
            }
        }
        let mut against = HashSet::new();
        for id in &self.orgs_against {
            if !against.insert(*id) {
                return Err(EntityValidationError::DuplicateVote(*id));
            }
            if in_favor.contains(id) {
                return Err(EntityValidationError::ConflictingVote(*id));
            }
        }
        Ok(())
    }

    /// Records `vote` for `voter`, moving it out of the opposite list.
    ///
    /// Returns `false` when the same vote was already recorded.
    pub fn record_vote(&mut self, voter: OrganizationId, vote: Vote) -> bool {
        let (target, other) = match vote {
            Vote::InFavor => (&mut self.orgs_in_favor, &mut self.orgs_against),
            Vote::Against => (&mut self.orgs_against, &mut self.orgs_in_favor),
        };
        if target.contains(&voter) {
            return false;
        }
        other.retain(|id| *id != voter);
        target.push(voter);
        true
    }

    /// Removes any vote by `voter`. Returns whether a vote was removed.
    pub fn withdraw_vote(&mut self, voter: OrganizationId) -> bool {
        let before = self.orgs_in_favor.len() + self.orgs_against.len();
        self.orgs_in_favor.retain(|id| *id != voter);
        self.orgs_against.retain(|id| *id != voter);
        before != self.orgs_in_favor.len() + self.orgs_against.len()
    }

    /// Returns the current vote of `voter`, if any.
    pub fn vote_of(&self, voter: OrganizationId) -> Option<Vote> {
        if self.orgs_in_favor.contains(&voter) {
            Some(Vote::InFavor)
        } else if self.orgs_against.contains(&voter) {
            Some(Vote::Against)
        } else {
            None
        }
    }

    pub fn tally(&self) -> VoteTally {
        VoteTally {
            in_favor: self.orgs_in_favor.len(),
            against: self.orgs_against.len(),
        }
    }
}

/// Root organization record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub tagline: String,
    pub social_accounts: Vec<String>,
    pub total_flags: Option<i32>,
    pub application_id: ApplicationId,
    pub created_by: UserId,
    /// Epoch ms, assigned by storage on insert.
    pub creation_date: i64,
    /// Epoch ms tombstone. `None` means active.
    pub deletion_date: Option<i64>,
}

impl Organization {
    /// Creates an active organization with a generated stable id.
    pub fn new(
        name: impl Into<String>,
        tagline: impl Into<String>,
        application_id: ApplicationId,
        created_by: UserId,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            tagline: tagline.into(),
            social_accounts: Vec::new(),
            total_flags: None,
            application_id,
            created_by,
            creation_date: 0,
            deletion_date: None,
        }
    }

    pub fn validate(&self) -> Result<(), EntityValidationError> {
        ensure_not_nil(self.id, "organization.id")?;
        ensure_not_nil(self.application_id, "organization.application_id")?;
        ensure_not_nil(self.created_by, "organization.created_by")?;
        ensure_required_text(&self.name, "name", MAX_SHORT_TEXT_CHARS)?;
        ensure_max_chars(&self.tagline, "tagline", MAX_SHORT_TEXT_CHARS)?;
        ensure_social_accounts(&self.social_accounts)?;
        ensure_flags(self.total_flags)
    }

    pub fn is_active(&self) -> bool {
        self.deletion_date.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::{OrganizationApplication, Vote};
    use crate::model::EntityValidationError;
    use uuid::Uuid;

    #[test]
    fn record_vote_moves_voter_between_lists() {
        let mut application = OrganizationApplication::new(Uuid::new_v4());
        let voter = Uuid::new_v4();

        assert!(application.record_vote(voter, Vote::InFavor));
        assert!(!application.record_vote(voter, Vote::InFavor));
        assert!(application.record_vote(voter, Vote::Against));

        assert!(application.orgs_in_favor.is_empty());
        assert_eq!(application.orgs_against, vec![voter]);
        assert_eq!(application.vote_of(voter), Some(Vote::Against));
        assert!(application.validate().is_ok());
    }

    #[test]
    fn withdraw_vote_reports_removal() {
        let mut application = OrganizationApplication::new(Uuid::new_v4());
        let voter = Uuid::new_v4();
        application.record_vote(voter, Vote::InFavor);

        assert!(application.withdraw_vote(voter));
        assert!(!application.withdraw_vote(voter));
        assert_eq!(application.tally().in_favor, 0);
    }

    #[test]
    fn validate_rejects_conflicting_votes() {
        let mut application = OrganizationApplication::new(Uuid::new_v4());
        let voter = Uuid::new_v4();
        application.orgs_in_favor.push(voter);
        application.orgs_against.push(voter);

        assert_eq!(
            application.validate().unwrap_err(),
            EntityValidationError::ConflictingVote(voter)
        );
    }
}
