use entities_core::db::open_db_in_memory;
use entities_core::{
    ContentKind, ExternalKind, ExternalRef, ExternalRefRepository, Group, GroupService,
    LinkScope, LinkService, LinkServiceError, NewGroup, NewOrganization, Organization,
    OrganizationService, OrganizationTask, RepoError, SqliteExternalRefRepository,
    SqliteGroupRepository, SqliteLinkRepository, SqliteOrganizationRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

#[test]
fn linking_is_idempotent_and_ordered() {
    let conn = open_db_in_memory().unwrap();
    let fixture = Fixture::new(&conn);
    let service = link_service(&conn);
    let scope = LinkScope::Organization(fixture.organization.id);

    let first = register_ref(&conn, ExternalKind::Event);
    let second = register_ref(&conn, ExternalKind::Event);
    assert!(service.link(scope, ContentKind::Event, second).unwrap());
    assert!(service.link(scope, ContentKind::Event, first).unwrap());
    assert!(!service.link(scope, ContentKind::Event, second).unwrap());

    assert_eq!(
        service.list_links(scope, ContentKind::Event).unwrap(),
        vec![second, first]
    );
    assert!(service
        .list_links(LinkScope::Group(fixture.group.id), ContentKind::Event)
        .unwrap()
        .is_empty());
}

#[test]
fn every_content_kind_links_under_both_scopes() {
    let conn = open_db_in_memory().unwrap();
    let fixture = Fixture::new(&conn);
    let service = link_service(&conn);

    for kind in ContentKind::ALL {
        let target = register_ref(&conn, kind.external_kind());
        for scope in [
            LinkScope::Organization(fixture.organization.id),
            LinkScope::Group(fixture.group.id),
        ] {
            service.link(scope, kind, target).unwrap();
            assert_eq!(service.list_links(scope, kind).unwrap(), vec![target]);
        }
    }
    assert_eq!(count(&conn, "organization_topics"), 1);
    assert_eq!(count(&conn, "group_resources"), 1);
}

#[test]
fn link_requires_registered_target_of_matching_kind() {
    let conn = open_db_in_memory().unwrap();
    let fixture = Fixture::new(&conn);
    let service = link_service(&conn);
    let topic = register_ref(&conn, ExternalKind::Topic);

    let err = service
        .link(
            LinkScope::Organization(fixture.organization.id),
            ContentKind::Event,
            topic,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        LinkServiceError::TargetNotRegistered(ExternalRef {
            kind: ExternalKind::Event,
            id,
        }) if id == topic
    ));
}

#[test]
fn link_requires_active_owner() {
    let conn = open_db_in_memory().unwrap();
    let fixture = Fixture::new(&conn);
    let service = link_service(&conn);
    let resource = register_ref(&conn, ExternalKind::Resource);

    GroupService::new(SqliteGroupRepository::try_new(&conn).unwrap())
        .soft_delete(fixture.group.id)
        .unwrap();
    let err = service
        .link(LinkScope::Group(fixture.group.id), ContentKind::Resource, resource)
        .unwrap_err();
    assert!(matches!(
        err,
        LinkServiceError::OwnerNotFound(LinkScope::Group(id)) if id == fixture.group.id
    ));

    let missing = Uuid::new_v4();
    let err = service
        .link(LinkScope::Organization(missing), ContentKind::Resource, resource)
        .unwrap_err();
    assert_eq!(err.to_string(), format!("organization not found: {missing}"));
}

#[test]
fn unlink_removes_only_the_target_row() {
    let conn = open_db_in_memory().unwrap();
    let fixture = Fixture::new(&conn);
    let service = link_service(&conn);
    let scope = LinkScope::Group(fixture.group.id);
    let kept = register_ref(&conn, ExternalKind::Topic);
    let dropped = register_ref(&conn, ExternalKind::Topic);
    service.link(scope, ContentKind::Topic, kept).unwrap();
    service.link(scope, ContentKind::Topic, dropped).unwrap();

    service.unlink(scope, ContentKind::Topic, dropped).unwrap();
    assert_eq!(service.list_links(scope, ContentKind::Topic).unwrap(), vec![kept]);

    let err = service.unlink(scope, ContentKind::Topic, dropped).unwrap_err();
    assert!(matches!(err, LinkServiceError::LinkNotFound(id) if id == dropped));
}

#[test]
fn task_group_must_belong_to_task_organization() {
    let conn = open_db_in_memory().unwrap();
    let fixture = Fixture::new(&conn);
    let other = Fixture::new(&conn);
    let service = link_service(&conn);
    let task = register_ref(&conn, ExternalKind::Task);

    let err = service
        .link_task(OrganizationTask {
            org_id: fixture.organization.id,
            task_id: task,
            group_id: other.group.id,
        })
        .unwrap_err();
    assert!(matches!(
        err,
        LinkServiceError::GroupOutsideOrganization { group_id, org_id }
            if group_id == other.group.id && org_id == fixture.organization.id
    ));

    let unregistered = Uuid::new_v4();
    let err = service
        .link_task(OrganizationTask {
            org_id: fixture.organization.id,
            task_id: unregistered,
            group_id: fixture.group.id,
        })
        .unwrap_err();
    assert!(matches!(err, LinkServiceError::TargetNotRegistered(_)));
}

#[test]
fn tasks_are_listed_per_organization_and_group() {
    let conn = open_db_in_memory().unwrap();
    let fixture = Fixture::new(&conn);
    let second_group = fixture.add_group(&conn, "Logistics");
    let service = link_service(&conn);
    let first_task = register_ref(&conn, ExternalKind::Task);
    let second_task = register_ref(&conn, ExternalKind::Task);

    let scoped_first = OrganizationTask {
        org_id: fixture.organization.id,
        task_id: first_task,
        group_id: fixture.group.id,
    };
    let scoped_second = OrganizationTask {
        org_id: fixture.organization.id,
        task_id: second_task,
        group_id: second_group.id,
    };
    assert!(service.link_task(scoped_first).unwrap());
    assert!(!service.link_task(scoped_first).unwrap());
    assert!(service.link_task(scoped_second).unwrap());

    assert_eq!(
        service.list_tasks(fixture.organization.id, None).unwrap(),
        vec![scoped_first, scoped_second]
    );
    assert_eq!(
        service
            .list_tasks(fixture.organization.id, Some(second_group.id))
            .unwrap(),
        vec![scoped_second]
    );

    service.unlink_task(scoped_first).unwrap();
    assert!(matches!(
        service.unlink_task(scoped_first),
        Err(LinkServiceError::LinkNotFound(id)) if id == first_task
    ));
}

#[test]
fn removing_external_entity_cascades_to_links() {
    let conn = open_db_in_memory().unwrap();
    let fixture = Fixture::new(&conn);
    let service = link_service(&conn);
    let event = register_ref(&conn, ExternalKind::Event);
    let task = register_ref(&conn, ExternalKind::Task);
    service
        .link(
            LinkScope::Organization(fixture.organization.id),
            ContentKind::Event,
            event,
        )
        .unwrap();
    service
        .link(LinkScope::Group(fixture.group.id), ContentKind::Event, event)
        .unwrap();
    service
        .link_task(OrganizationTask {
            org_id: fixture.organization.id,
            task_id: task,
            group_id: fixture.group.id,
        })
        .unwrap();

    let registry = SqliteExternalRefRepository::try_new(&conn).unwrap();
    registry.remove(ExternalRef::new(ExternalKind::Event, event)).unwrap();
    registry.remove(ExternalRef::new(ExternalKind::Task, task)).unwrap();

    assert_eq!(count(&conn, "organization_events"), 0);
    assert_eq!(count(&conn, "group_events"), 0);
    assert_eq!(count(&conn, "organization_tasks"), 0);
    assert!(matches!(
        registry.remove(ExternalRef::new(ExternalKind::Event, event)),
        Err(RepoError::NotFound { entity: "event", .. })
    ));
}

#[test]
fn registry_registration_is_idempotent_and_listed_in_order() {
    let conn = open_db_in_memory().unwrap();
    let registry = SqliteExternalRefRepository::try_new(&conn).unwrap();
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    assert!(registry.register(ExternalRef::new(ExternalKind::Topic, first)).unwrap());
    assert!(registry.register(ExternalRef::new(ExternalKind::Topic, second)).unwrap());
    assert!(!registry.register(ExternalRef::new(ExternalKind::Topic, first)).unwrap());
    assert!(registry.exists(ExternalRef::new(ExternalKind::Topic, first)).unwrap());
    assert!(!registry.exists(ExternalRef::new(ExternalKind::Event, first)).unwrap());
    assert_eq!(registry.list(ExternalKind::Topic).unwrap(), vec![first, second]);

    assert!(matches!(
        registry.register(ExternalRef::user(Uuid::nil())),
        Err(RepoError::Conflict(_))
    ));
}

#[test]
fn link_scope_serializes_as_tagged_object() {
    let scope = LinkScope::Group(Uuid::nil());
    let json = serde_json::to_value(scope).unwrap();
    assert_eq!(json["scope"], "group");
    assert_eq!(json["id"], Uuid::nil().to_string());
    let decoded: LinkScope = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, scope);
}

struct Fixture {
    creator: Uuid,
    organization: Organization,
    group: Group,
}

impl Fixture {
    fn new(conn: &Connection) -> Self {
        let creator = register_ref(conn, ExternalKind::User);
        let organization =
            OrganizationService::new(SqliteOrganizationRepository::try_new(conn).unwrap())
                .register_organization(NewOrganization {
                    name: "Street Medics".to_string(),
                    tagline: String::new(),
                    social_accounts: Vec::new(),
                    created_by: creator,
                })
                .unwrap();
        let group = create_group(conn, organization.id, "First Aid", creator);
        Self {
            creator,
            organization,
            group,
        }
    }

    fn add_group(&self, conn: &Connection, name: &str) -> Group {
        create_group(conn, self.organization.id, name, self.creator)
    }
}

fn create_group(conn: &Connection, org_id: Uuid, name: &str, created_by: Uuid) -> Group {
    GroupService::new(SqliteGroupRepository::try_new(conn).unwrap())
        .create_group(NewGroup {
            org_id,
            name: name.to_string(),
            tagline: String::new(),
            description: String::new(),
            social_accounts: Vec::new(),
            created_by,
        })
        .unwrap()
}

fn link_service(conn: &Connection) -> LinkService<SqliteLinkRepository<'_>> {
    LinkService::new(SqliteLinkRepository::try_new(conn).unwrap())
}

fn register_ref(conn: &Connection, kind: ExternalKind) -> Uuid {
    let id = Uuid::new_v4();
    SqliteExternalRefRepository::try_new(conn)
        .unwrap()
        .register(ExternalRef::new(kind, id))
        .unwrap();
    id
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}
