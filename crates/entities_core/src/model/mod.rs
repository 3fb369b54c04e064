//! Domain model for organizations, groups and their associations.
//!
//! # Responsibility
//! - Define canonical records for organizations, applications and groups.
//! - Define join records linking organizations/groups to entities owned by
//!   other subsystems (users, events, resources, tasks, topics).
//! - Own field-level validation shared by every write path.
//!
//! # Invariants
//! - Every root entity is identified by a stable UUID v4.
//! - Soft deletion is a `deletion_date` tombstone; hard deletion cascades.
//! - Text limits mirror the column limits declared by the schema.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod group;
pub mod link;
pub mod organization;

/// Stable identifier of an organization.
pub type OrganizationId = Uuid;
/// Stable identifier of an organization group.
pub type GroupId = Uuid;
/// Stable identifier of an organization application.
pub type ApplicationId = Uuid;
/// Stable identifier of an application status row.
pub type StatusId = Uuid;
/// Identifier of a user owned by the authentication subsystem.
pub type UserId = Uuid;

/// Maximum length of short text columns (names, taglines, handles).
pub const MAX_SHORT_TEXT_CHARS: usize = 255;
/// Maximum length of group descriptions.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

static SOCIAL_ACCOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\S+$").expect("valid social account regex"));

/// Field-level validation failures for writable domain records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityValidationError {
    /// Identifier is the nil UUID.
    NilId(&'static str),
    /// Required text field is blank after trim.
    BlankField(&'static str),
    /// Text field exceeds its column limit.
    FieldTooLong {
        field: &'static str,
        max_chars: usize,
        actual_chars: usize,
    },
    /// Social account handle is blank or contains whitespace.
    InvalidSocialAccount(String),
    /// Flag counter is negative.
    NegativeFlags(i32),
    /// One organization appears both in favor of and against an application.
    ConflictingVote(OrganizationId),
    /// One organization appears twice in the same vote list.
    DuplicateVote(OrganizationId),
}

impl Display for EntityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId(field) => write!(f, "{field} must not be the nil uuid"),
            Self::BlankField(field) => write!(f, "{field} must not be blank"),
            Self::FieldTooLong {
                field,
                max_chars,
                actual_chars,
            } => write!(
                f,
                "{field} must be at most {max_chars} characters, got {actual_chars}"
            ),
            Self::InvalidSocialAccount(value) => {
                write!(f, "invalid social account `{value}`")
            }
            Self::NegativeFlags(value) => {
                write!(f, "total_flags must be >= 0, got {value}")
            }
            Self::ConflictingVote(id) => write!(
                f,
                "organization {id} cannot be both in favor of and against an application"
            ),
            Self::DuplicateVote(id) => write!(f, "organization {id} voted more than once"),
        }
    }
}

impl Error for EntityValidationError {}

pub(crate) fn ensure_not_nil(id: Uuid, field: &'static str) -> Result<(), EntityValidationError> {
    if id.is_nil() {
        return Err(EntityValidationError::NilId(field));
    }
    Ok(())
}

pub(crate) fn ensure_required_text(
    value: &str,
    field: &'static str,
    max_chars: usize,
) -> Result<(), EntityValidationError> {
    if value.trim().is_empty() {
        return Err(EntityValidationError::BlankField(field));
    }
    ensure_max_chars(value, field, max_chars)
}

pub(crate) fn ensure_max_chars(
    value: &str,
    field: &'static str,
    max_chars: usize,
) -> Result<(), EntityValidationError> {
    let actual_chars = value.chars().count();
    if actual_chars > max_chars {
        return Err(EntityValidationError::FieldTooLong {
            field,
            max_chars,
            actual_chars,
        });
    }
    Ok(())
}

pub(crate) fn ensure_social_accounts(accounts: &[String]) -> Result<(), EntityValidationError> {
    for account in accounts {
        if !SOCIAL_ACCOUNT_RE.is_match(account) {
            return Err(EntityValidationError::InvalidSocialAccount(account.clone()));
        }
        ensure_max_chars(account, "social_accounts", MAX_SHORT_TEXT_CHARS)?;
    }
    Ok(())
}

pub(crate) fn ensure_flags(total_flags: Option<i32>) -> Result<(), EntityValidationError> {
    match total_flags {
        Some(value) if value < 0 => Err(EntityValidationError::NegativeFlags(value)),
        _ => Ok(()),
    }
}

/// Trims every social account handle and drops blank entries.
pub fn normalize_social_accounts(accounts: Vec<String>) -> Vec<String> {
    accounts
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}
