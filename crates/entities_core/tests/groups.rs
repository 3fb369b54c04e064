use entities_core::db::open_db_in_memory;
use entities_core::{
    ContentKind, EntityValidationError, ExternalKind, ExternalRef, ExternalRefRepository, Group,
    GroupProfile, GroupService, GroupServiceError, LinkScope, LinkService, MembershipService,
    NewGroup, NewOrganization, Organization, OrganizationService, OrganizationTask, RepoError,
    SqliteExternalRefRepository, SqliteGroupRepository, SqliteLinkRepository,
    SqliteMembershipRepository, SqliteOrganizationRepository,
};
use rusqlite::{params, Connection};
use uuid::Uuid;

#[test]
fn create_group_trims_fields_and_reads_back() {
    let conn = open_db_in_memory().unwrap();
    let creator = register_ref(&conn, ExternalKind::User);
    let organization = register_org(&conn, creator);

    let group = group_service(&conn)
        .create_group(NewGroup {
            org_id: organization.id,
            name: " Housing Working Group ".to_string(),
            tagline: " Rent caps now ".to_string(),
            description: "Weekly meetings on tenant rights.".to_string(),
            social_accounts: vec!["@housing".to_string()],
            created_by: creator,
        })
        .unwrap();

    assert_eq!(group.org_id, organization.id);
    assert_eq!(group.name, "Housing Working Group");
    assert_eq!(group.tagline, "Rent caps now");
    assert_eq!(group.social_accounts, vec!["@housing"]);
    assert!(group.creation_date > 0);
    assert!(group.is_active());
}

#[test]
fn create_group_requires_active_organization_and_registered_creator() {
    let conn = open_db_in_memory().unwrap();
    let creator = register_ref(&conn, ExternalKind::User);
    let organization = register_org(&conn, creator);
    let service = group_service(&conn);

    let stranger = Uuid::new_v4();
    let err = service
        .create_group(new_group(organization.id, "Outreach", stranger))
        .unwrap_err();
    assert!(matches!(err, GroupServiceError::CreatorNotRegistered(id) if id == stranger));

    let missing_org = Uuid::new_v4();
    let err = service
        .create_group(new_group(missing_org, "Outreach", creator))
        .unwrap_err();
    assert!(matches!(err, GroupServiceError::OrganizationNotFound(id) if id == missing_org));

    org_service(&conn).soft_delete(organization.id).unwrap();
    let err = service
        .create_group(new_group(organization.id, "Outreach", creator))
        .unwrap_err();
    assert!(matches!(err, GroupServiceError::OrganizationNotFound(_)));
}

#[test]
fn description_is_limited_to_500_characters() {
    let conn = open_db_in_memory().unwrap();
    let creator = register_ref(&conn, ExternalKind::User);
    let organization = register_org(&conn, creator);
    let service = group_service(&conn);

    let mut request = new_group(organization.id, "Verbose", creator);
    request.description = "d".repeat(500);
    let group = service.create_group(request.clone()).unwrap();
    assert_eq!(group.description.chars().count(), 500);

    request.description = "d".repeat(501);
    let err = service.create_group(request).unwrap_err();
    assert!(matches!(
        err,
        GroupServiceError::Repo(RepoError::Validation(EntityValidationError::FieldTooLong {
            field: "description",
            max_chars: 500,
            actual_chars: 501,
        }))
    ));
}

#[test]
fn list_orders_by_name_case_insensitively() {
    let conn = open_db_in_memory().unwrap();
    let creator = register_ref(&conn, ExternalKind::User);
    let organization = register_org(&conn, creator);
    let other = register_org(&conn, creator);
    let service = group_service(&conn);

    for name in ["beta", "Alpha", "charlie"] {
        service
            .create_group(new_group(organization.id, name, creator))
            .unwrap();
    }
    service
        .create_group(new_group(other.id, "aardvark", creator))
        .unwrap();

    let names: Vec<String> = service
        .list(organization.id, false)
        .unwrap()
        .into_iter()
        .map(|group| group.name)
        .collect();
    assert_eq!(names, vec!["Alpha", "beta", "charlie"]);
}

#[test]
fn update_profile_keeps_unspecified_fields() {
    let conn = open_db_in_memory().unwrap();
    let creator = register_ref(&conn, ExternalKind::User);
    let organization = register_org(&conn, creator);
    let service = group_service(&conn);
    let mut request = new_group(organization.id, "Press", creator);
    request.tagline = "Media contact".to_string();
    let group = service.create_group(request).unwrap();

    let updated = service
        .update_profile(
            group.id,
            GroupProfile {
                description: Some("Handles press releases.".to_string()),
                ..GroupProfile::default()
            },
        )
        .unwrap();
    assert_eq!(updated.name, "Press");
    assert_eq!(updated.tagline, "Media contact");
    assert_eq!(updated.description, "Handles press releases.");
}

#[test]
fn soft_deleted_group_and_group_of_soft_deleted_org_are_hidden() {
    let conn = open_db_in_memory().unwrap();
    let creator = register_ref(&conn, ExternalKind::User);
    let organization = register_org(&conn, creator);
    let service = group_service(&conn);
    let kept = service
        .create_group(new_group(organization.id, "Kept", creator))
        .unwrap();
    let paused = service
        .create_group(new_group(organization.id, "Paused", creator))
        .unwrap();

    let tombstoned = service.soft_delete(paused.id).unwrap();
    assert!(tombstoned.deletion_date.is_some());
    assert!(matches!(
        service.get(paused.id),
        Err(GroupServiceError::GroupNotFound(_))
    ));
    assert_eq!(group_ids(&service.list(organization.id, false).unwrap()), vec![kept.id]);
    assert_eq!(service.list(organization.id, true).unwrap().len(), 2);

    service.restore(paused.id).unwrap();
    assert!(service.get(paused.id).is_ok());

    org_service(&conn).soft_delete(organization.id).unwrap();
    assert!(matches!(
        service.get(kept.id),
        Err(GroupServiceError::GroupNotFound(id)) if id == kept.id
    ));
}

#[test]
fn flag_counts_up() {
    let conn = open_db_in_memory().unwrap();
    let creator = register_ref(&conn, ExternalKind::User);
    let organization = register_org(&conn, creator);
    let service = group_service(&conn);
    let group = service
        .create_group(new_group(organization.id, "Flagged", creator))
        .unwrap();

    assert_eq!(service.flag(group.id).unwrap(), 1);
    assert_eq!(service.flag(group.id).unwrap(), 2);
    assert!(matches!(
        service.flag(Uuid::new_v4()),
        Err(GroupServiceError::GroupNotFound(_))
    ));
}

#[test]
fn flag_stops_at_maximum() {
    let conn = open_db_in_memory().unwrap();
    let creator = register_ref(&conn, ExternalKind::User);
    let organization = register_org(&conn, creator);
    let service = group_service(&conn);
    let group = service
        .create_group(new_group(organization.id, "Saturated", creator))
        .unwrap();
    conn.execute(
        "UPDATE org_groups SET total_flags = ?2 WHERE id = ?1;",
        params![group.id.to_string(), i32::MAX],
    )
    .unwrap();

    let err = service.flag(group.id).unwrap_err();
    assert!(matches!(err, GroupServiceError::Repo(RepoError::Conflict(_))));
    assert_eq!(service.get(group.id).unwrap().total_flags, Some(i32::MAX));
    assert_eq!(service.list(organization.id, false).unwrap().len(), 1);
}

#[test]
fn delete_group_cascades_members_links_and_tasks() {
    let conn = open_db_in_memory().unwrap();
    let creator = register_ref(&conn, ExternalKind::User);
    let member = register_ref(&conn, ExternalKind::User);
    let resource = register_ref(&conn, ExternalKind::Resource);
    let task = register_ref(&conn, ExternalKind::Task);
    let organization = register_org(&conn, creator);
    let service = group_service(&conn);
    let group = service
        .create_group(new_group(organization.id, "Temporary", creator))
        .unwrap();

    MembershipService::new(SqliteMembershipRepository::try_new(&conn).unwrap())
        .add_group_member(group.id, member, true)
        .unwrap();
    let links = LinkService::new(SqliteLinkRepository::try_new(&conn).unwrap());
    links
        .link(LinkScope::Group(group.id), ContentKind::Resource, resource)
        .unwrap();
    links
        .link(
            LinkScope::Organization(organization.id),
            ContentKind::Resource,
            resource,
        )
        .unwrap();
    links
        .link_task(OrganizationTask {
            org_id: organization.id,
            task_id: task,
            group_id: group.id,
        })
        .unwrap();

    let impact = service.delete(group.id).unwrap();
    assert_eq!(impact.groups, 1);
    assert_eq!(impact.organization_members, 0);
    assert_eq!(impact.group_members, 1);
    assert_eq!(impact.content_links, 1);
    assert_eq!(impact.tasks, 1);

    assert_eq!(count(&conn, "group_members"), 0);
    assert_eq!(count(&conn, "group_resources"), 0);
    assert_eq!(count(&conn, "organization_tasks"), 0);
    assert_eq!(count(&conn, "organization_resources"), 1);
    assert!(org_service(&conn).get(organization.id).is_ok());
}

fn org_service(conn: &Connection) -> OrganizationService<SqliteOrganizationRepository<'_>> {
    OrganizationService::new(SqliteOrganizationRepository::try_new(conn).unwrap())
}

fn group_service(conn: &Connection) -> GroupService<SqliteGroupRepository<'_>> {
    GroupService::new(SqliteGroupRepository::try_new(conn).unwrap())
}

fn register_org(conn: &Connection, created_by: Uuid) -> Organization {
    org_service(conn)
        .register_organization(NewOrganization {
            name: "Neighbourhood Assembly".to_string(),
            tagline: String::new(),
            social_accounts: Vec::new(),
            created_by,
        })
        .unwrap()
}

fn new_group(org_id: Uuid, name: &str, created_by: Uuid) -> NewGroup {
    NewGroup {
        org_id,
        name: name.to_string(),
        tagline: String::new(),
        description: String::new(),
        social_accounts: Vec::new(),
        created_by,
    }
}

fn register_ref(conn: &Connection, kind: ExternalKind) -> Uuid {
    let id = Uuid::new_v4();
    SqliteExternalRefRepository::try_new(conn)
        .unwrap()
        .register(ExternalRef::new(kind, id))
        .unwrap();
    id
}

fn group_ids(groups: &[Group]) -> Vec<Uuid> {
    groups.iter().map(|group| group.id).collect()
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}
