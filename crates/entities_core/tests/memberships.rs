use entities_core::db::open_db_in_memory;
use entities_core::{
    ExternalRef, ExternalRefRepository, GroupMember, GroupService, MembershipService,
    MembershipServiceError, NewGroup, NewOrganization, Organization, OrganizationMember,
    OrganizationRoles, OrganizationService, SqliteExternalRefRepository, SqliteGroupRepository,
    SqliteMembershipRepository, SqliteOrganizationRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

#[test]
fn add_org_member_upserts_roles() {
    let conn = open_db_in_memory().unwrap();
    let owner = register_user(&conn);
    let volunteer = register_user(&conn);
    let organization = register_org(&conn, "Food Co-op", owner);
    let service = membership_service(&conn);

    service
        .add_org_member(organization.id, volunteer, OrganizationRoles::default())
        .unwrap();
    let promoted = service
        .add_org_member(
            organization.id,
            volunteer,
            OrganizationRoles {
                is_admin: true,
                is_comms: true,
                ..OrganizationRoles::default()
            },
        )
        .unwrap();
    assert!(promoted.roles.is_admin);

    let members = service.list_org_members(organization.id).unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].user_id, owner);
    assert!(members[0].roles.is_owner);
    assert_eq!(
        members[1],
        OrganizationMember {
            org_id: organization.id,
            user_id: volunteer,
            roles: OrganizationRoles {
                is_owner: false,
                is_admin: true,
                is_comms: true,
            },
        }
    );
}

#[test]
fn org_members_are_listed_owners_then_admins() {
    let conn = open_db_in_memory().unwrap();
    let owner = register_user(&conn);
    let organization = register_org(&conn, "Ordering", owner);
    let service = membership_service(&conn);

    let plain = register_user(&conn);
    let admin = register_user(&conn);
    service
        .add_org_member(organization.id, plain, OrganizationRoles::default())
        .unwrap();
    service
        .add_org_member(
            organization.id,
            admin,
            OrganizationRoles {
                is_admin: true,
                ..OrganizationRoles::default()
            },
        )
        .unwrap();

    let order: Vec<Uuid> = service
        .list_org_members(organization.id)
        .unwrap()
        .into_iter()
        .map(|member| member.user_id)
        .collect();
    assert_eq!(order, vec![owner, admin, plain]);
}

#[test]
fn org_membership_guards() {
    let conn = open_db_in_memory().unwrap();
    let owner = register_user(&conn);
    let organization = register_org(&conn, "Guards", owner);
    let service = membership_service(&conn);

    let stranger = Uuid::new_v4();
    let err = service
        .add_org_member(organization.id, stranger, OrganizationRoles::default())
        .unwrap_err();
    assert!(matches!(err, MembershipServiceError::UserNotRegistered(id) if id == stranger));

    let outsider = register_user(&conn);
    let err = service
        .update_org_roles(organization.id, outsider, OrganizationRoles::owner())
        .unwrap_err();
    assert!(matches!(err, MembershipServiceError::MemberNotFound(id) if id == outsider));
    assert!(service.get_org_member(organization.id, outsider).is_err());

    let err = service.remove_org_member(organization.id, outsider).unwrap_err();
    assert!(matches!(err, MembershipServiceError::MemberNotFound(_)));

    OrganizationService::new(SqliteOrganizationRepository::try_new(&conn).unwrap())
        .soft_delete(organization.id)
        .unwrap();
    let err = service
        .add_org_member(organization.id, outsider, OrganizationRoles::default())
        .unwrap_err();
    assert!(matches!(err, MembershipServiceError::OrganizationNotFound(_)));
}

#[test]
fn update_and_remove_org_member() {
    let conn = open_db_in_memory().unwrap();
    let owner = register_user(&conn);
    let volunteer = register_user(&conn);
    let organization = register_org(&conn, "Rotation", owner);
    let service = membership_service(&conn);
    service
        .add_org_member(organization.id, volunteer, OrganizationRoles::default())
        .unwrap();

    service
        .update_org_roles(organization.id, volunteer, OrganizationRoles::owner())
        .unwrap();
    assert!(
        service
            .get_org_member(organization.id, volunteer)
            .unwrap()
            .roles
            .is_owner
    );

    service.remove_org_member(organization.id, volunteer).unwrap();
    assert_eq!(service.list_org_members(organization.id).unwrap().len(), 1);
}

#[test]
fn user_organizations_exclude_tombstoned() {
    let conn = open_db_in_memory().unwrap();
    let owner = register_user(&conn);
    let active = register_org(&conn, "Active", owner);
    let paused = register_org(&conn, "Paused", owner);
    OrganizationService::new(SqliteOrganizationRepository::try_new(&conn).unwrap())
        .soft_delete(paused.id)
        .unwrap();

    let memberships = membership_service(&conn)
        .list_user_organizations(owner)
        .unwrap();
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0].org_id, active.id);
}

#[test]
fn group_members_follow_group_lifecycle() {
    let conn = open_db_in_memory().unwrap();
    let owner = register_user(&conn);
    let member = register_user(&conn);
    let admin = register_user(&conn);
    let organization = register_org(&conn, "Parent", owner);
    let groups = GroupService::new(SqliteGroupRepository::try_new(&conn).unwrap());
    let group = groups
        .create_group(NewGroup {
            org_id: organization.id,
            name: "Canvassing".to_string(),
            tagline: String::new(),
            description: String::new(),
            social_accounts: Vec::new(),
            created_by: owner,
        })
        .unwrap();
    let service = membership_service(&conn);

    service.add_group_member(group.id, member, false).unwrap();
    service.add_group_member(group.id, admin, false).unwrap();
    service.set_group_admin(group.id, admin, true).unwrap();

    let listed = service.list_group_members(group.id).unwrap();
    assert_eq!(
        listed,
        vec![
            GroupMember {
                group_id: group.id,
                user_id: admin,
                is_admin: true,
            },
            GroupMember {
                group_id: group.id,
                user_id: member,
                is_admin: false,
            },
        ]
    );
    assert_eq!(service.list_user_groups(admin).unwrap().len(), 1);

    service.remove_group_member(group.id, member).unwrap();
    assert!(matches!(
        service.remove_group_member(group.id, member),
        Err(MembershipServiceError::MemberNotFound(_))
    ));
    assert!(matches!(
        service.set_group_admin(group.id, member, true),
        Err(MembershipServiceError::MemberNotFound(_))
    ));

    groups.soft_delete(group.id).unwrap();
    assert!(matches!(
        service.add_group_member(group.id, member, false),
        Err(MembershipServiceError::GroupNotFound(id)) if id == group.id
    ));
    assert!(service.list_user_groups(admin).unwrap().is_empty());
}

#[test]
fn removing_user_from_registry_drops_memberships() {
    let conn = open_db_in_memory().unwrap();
    let owner = register_user(&conn);
    let leaving = register_user(&conn);
    let organization = register_org(&conn, "Registry", owner);
    let service = membership_service(&conn);
    service
        .add_org_member(organization.id, leaving, OrganizationRoles::default())
        .unwrap();

    SqliteExternalRefRepository::try_new(&conn)
        .unwrap()
        .remove(ExternalRef::user(leaving))
        .unwrap();

    let members = service.list_org_members(organization.id).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, owner);
}

#[test]
fn org_member_roles_serialize_flat() {
    let member = OrganizationMember {
        org_id: Uuid::nil(),
        user_id: Uuid::nil(),
        roles: OrganizationRoles {
            is_owner: true,
            is_admin: false,
            is_comms: true,
        },
    };
    let json = serde_json::to_value(member).unwrap();
    assert_eq!(json["is_owner"], true);
    assert_eq!(json["is_comms"], true);
    assert!(json.get("roles").is_none());
}

fn membership_service(conn: &Connection) -> MembershipService<SqliteMembershipRepository<'_>> {
    MembershipService::new(SqliteMembershipRepository::try_new(conn).unwrap())
}

fn register_user(conn: &Connection) -> Uuid {
    let id = Uuid::new_v4();
    SqliteExternalRefRepository::try_new(conn)
        .unwrap()
        .register(ExternalRef::user(id))
        .unwrap();
    id
}

fn register_org(conn: &Connection, name: &str, created_by: Uuid) -> Organization {
    OrganizationService::new(SqliteOrganizationRepository::try_new(conn).unwrap())
        .register_organization(NewOrganization {
            name: name.to_string(),
            tagline: String::new(),
            social_accounts: Vec::new(),
            created_by,
        })
        .unwrap()
}
