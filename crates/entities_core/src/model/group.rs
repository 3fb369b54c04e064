//! Group record scoped under one organization.

use super::{
    ensure_flags, ensure_max_chars, ensure_not_nil, ensure_required_text, ensure_social_accounts,
    EntityValidationError, GroupId, OrganizationId, UserId, MAX_DESCRIPTION_CHARS,
    MAX_SHORT_TEXT_CHARS,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sub-group of an organization with its own members and content links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub org_id: OrganizationId,
    pub name: String,
    pub tagline: String,
    pub description: String,
    pub social_accounts: Vec<String>,
    pub total_flags: Option<i32>,
    pub created_by: UserId,
    /// Epoch ms, assigned by storage on insert.
    pub creation_date: i64,
    /// Epoch ms tombstone. `None` means active.
    pub deletion_date: Option<i64>,
}

impl Group {
    /// Creates an active group with a generated stable id.
    pub fn new(org_id: OrganizationId, name: impl Into<String>, created_by: UserId) -> Self {
        Self {
            id: Uuid::new_v4(),
            org_id,
            name: name.into(),
            tagline: String::new(),
            description: String::new(),
            social_accounts: Vec::new(),
            total_flags: None,
            created_by,
            creation_date: 0,
            deletion_date: None,
        }
    }

    pub fn validate(&self) -> Result<(), EntityValidationError> {
        ensure_not_nil(self.id, "group.id")?;
        ensure_not_nil(self.org_id, "group.org_id")?;
        ensure_not_nil(self.created_by, "group.created_by")?;
        ensure_required_text(&self.name, "name", MAX_SHORT_TEXT_CHARS)?;
        ensure_max_chars(&self.tagline, "tagline", MAX_SHORT_TEXT_CHARS)?;
        ensure_max_chars(&self.description, "description", MAX_DESCRIPTION_CHARS)?;
        ensure_social_accounts(&self.social_accounts)?;
        ensure_flags(self.total_flags)
    }

    pub fn is_active(&self) -> bool {
        self.deletion_date.is_none()
    }
}
