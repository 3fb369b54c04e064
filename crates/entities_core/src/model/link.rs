//! Join records between organizations/groups and externally owned entities.
//!
//! # Responsibility
//! - Name the externally owned entity kinds and the join tables that
//!   reference them.
//! - Define membership records with their role flags.
//!
//! # Invariants
//! - Table and column names returned here are static and safe to splice
//!   into SQL text.
//! - A join row is unique per key columns.

use super::{GroupId, OrganizationId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Entity kinds owned by other subsystems and referenced by foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalKind {
    User,
    Event,
    Resource,
    Task,
    Topic,
}

impl ExternalKind {
    pub const ALL: [ExternalKind; 5] = [
        ExternalKind::User,
        ExternalKind::Event,
        ExternalKind::Resource,
        ExternalKind::Task,
        ExternalKind::Topic,
    ];

    /// Stable lowercase name used in logs and CLI input.
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Event => "event",
            Self::Resource => "resource",
            Self::Task => "task",
            Self::Topic => "topic",
        }
    }

    /// Registry table holding ids of this kind.
    pub fn table(self) -> &'static str {
        match self {
            Self::User => "ext_users",
            Self::Event => "ext_events",
            Self::Resource => "ext_resources",
            Self::Task => "ext_tasks",
            Self::Topic => "ext_topics",
        }
    }

    pub fn parse_db_str(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "event" => Some(Self::Event),
            "resource" => Some(Self::Resource),
            "task" => Some(Self::Task),
            "topic" => Some(Self::Topic),
            _ => None,
        }
    }
}

/// Reference to one entity owned by another subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalRef {
    pub kind: ExternalKind,
    pub id: Uuid,
}

impl ExternalRef {
    pub fn new(kind: ExternalKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    pub fn user(id: UserId) -> Self {
        Self::new(ExternalKind::User, id)
    }
}

/// Content kinds that organizations and groups link without extra columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Event,
    Resource,
    Topic,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [ContentKind::Event, ContentKind::Resource, ContentKind::Topic];

    pub fn external_kind(self) -> ExternalKind {
        match self {
            Self::Event => ExternalKind::Event,
            Self::Resource => ExternalKind::Resource,
            Self::Topic => ExternalKind::Topic,
        }
    }

    /// Column holding the linked entity id.
    pub fn target_column(self) -> &'static str {
        match self {
            Self::Event => "event_id",
            Self::Resource => "resource_id",
            Self::Topic => "topic_id",
        }
    }
}

/// Owner side of a plain join record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum LinkScope {
    Organization(OrganizationId),
    Group(GroupId),
}

impl LinkScope {
    pub fn id(self) -> Uuid {
        match self {
            Self::Organization(id) | Self::Group(id) => id,
        }
    }

    /// Column holding the owner id.
    pub fn owner_column(self) -> &'static str {
        match self {
            Self::Organization(_) => "org_id",
            Self::Group(_) => "group_id",
        }
    }

    /// Join table for `kind` under this scope.
    pub fn table(self, kind: ContentKind) -> &'static str {
        match (self, kind) {
            (Self::Organization(_), ContentKind::Event) => "organization_events",
            (Self::Organization(_), ContentKind::Resource) => "organization_resources",
            (Self::Organization(_), ContentKind::Topic) => "organization_topics",
            (Self::Group(_), ContentKind::Event) => "group_events",
            (Self::Group(_), ContentKind::Resource) => "group_resources",
            (Self::Group(_), ContentKind::Topic) => "group_topics",
        }
    }
}

/// Role flags carried by an organization membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrganizationRoles {
    pub is_owner: bool,
    pub is_admin: bool,
    pub is_comms: bool,
}

impl OrganizationRoles {
    pub fn owner() -> Self {
        Self {
            is_owner: true,
            ..Self::default()
        }
    }
}

/// Membership of one user in one organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationMember {
    pub org_id: OrganizationId,
    pub user_id: UserId,
    #[serde(flatten)]
    pub roles: OrganizationRoles,
}

/// Membership of one user in one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub is_admin: bool,
}

/// Task linked to an organization and scoped by one of its groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationTask {
    pub org_id: OrganizationId,
    pub task_id: Uuid,
    pub group_id: GroupId,
}

#[cfg(test)]
mod tests {
    use super::{ContentKind, ExternalKind, LinkScope};
    use uuid::Uuid;

    #[test]
    fn external_kind_db_strings_are_reversible() {
        for kind in ExternalKind::ALL {
            assert_eq!(ExternalKind::parse_db_str(kind.as_db_str()), Some(kind));
        }
        assert_eq!(ExternalKind::parse_db_str("organization"), None);
    }

    #[test]
    fn link_scope_selects_join_tables() {
        let org = LinkScope::Organization(Uuid::new_v4());
        let group = LinkScope::Group(Uuid::new_v4());
        assert_eq!(org.table(ContentKind::Topic), "organization_topics");
        assert_eq!(group.table(ContentKind::Event), "group_events");
        assert_eq!(group.owner_column(), "group_id");
        assert_eq!(ContentKind::Resource.target_column(), "resource_id");
    }
}
