use wtt_core::db::open_db_in_memory;
use wtt_core::model::crm::{
    ActivityClass, ActivityLinkType, CrmObject, EntityState, FieldChanges, NewActivityParams,
    NewResourceAssignment, NewTracker, ResourceRole, PRIORITY_NA,
};
use wtt_core::repo::crm_gateway::ActivityScope;
use wtt_core::{CrmGateway, GatewayConfig, GatewayError, SqliteCrmGateway};

fn setup() -> rusqlite::Connection {
    open_db_in_memory().unwrap()
}

fn tracker_fields(name: &str) -> NewTracker {
    NewTracker {
        name: name.to_string(),
        description: None,
    }
}

fn activity_fields(name: &str) -> NewActivityParams {
    NewActivityParams {
        name: name.to_string(),
        ..NewActivityParams::default()
    }
}

#[test]
fn gateway_rejects_uninitialized_connection() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    let err = SqliteCrmGateway::try_new(&conn, GatewayConfig::default()).unwrap_err();
    match err {
        GatewayError::UninitializedConnection {
            expected_version,
            actual_version,
        } => {
            assert_eq!(expected_version, wtt_core::db::migrations::latest_version());
            assert_eq!(actual_version, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn gateway_rejects_connection_without_required_table() {
    let conn = setup();
    conn.execute_batch("DROP TABLE resource_assignments;").unwrap();
    let err = SqliteCrmGateway::try_new(&conn, GatewayConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        GatewayError::MissingRequiredTable("resource_assignments")
    ));
}

#[test]
fn customer_project_group_gets_customer_and_incident_creator() {
    let conn = setup();
    let gateway = SqliteCrmGateway::try_new(&conn, GatewayConfig::default()).unwrap();

    let customer = gateway.create_legal_entity("Acme Corp").unwrap();
    let tracker = gateway
        .create_customer_project_group(&tracker_fields("Acme Corp"), &customer)
        .unwrap();

    assert_eq!(tracker.customer_id.as_deref(), Some(customer.id()));
    assert!(tracker.is_active());
    let creator = gateway
        .find_activity_creator(tracker.id(), ActivityClass::Incident)
        .unwrap()
        .unwrap();
    assert_eq!(creator.name, "Acme Corp ~ Incidents");
    assert_eq!(creator.tracker_id, tracker.id());
    assert!(gateway
        .find_activity_creator(tracker.id(), ActivityClass::Meeting)
        .unwrap()
        .is_none());
}

#[test]
fn paths_and_audit_follow_gateway_config() {
    let conn = setup();
    let config = GatewayConfig {
        segment_name: "Demo".to_string(),
        ..GatewayConfig::default()
    }
    .with_principal("jdoe");
    let gateway = SqliteCrmGateway::try_new(&conn, config).unwrap();

    let customer = gateway.create_legal_entity("Acme Corp").unwrap();
    let tracker = gateway
        .create_customer_project_group(&tracker_fields("Acme Corp"), &customer)
        .unwrap();

    let xri = tracker.path().to_xri();
    assert!(xri.starts_with(
        "xri://@openmdx*org.opencrx.kernel.activity1/provider/CRX/segment/Demo/activityTracker/"
    ));
    assert!(customer
        .path()
        .to_xri()
        .starts_with("xri://@openmdx*org.opencrx.kernel.account1/"));
    assert_eq!(tracker.audit.created_by, "jdoe");
    assert_eq!(tracker.audit.modified_by, "jdoe");
    assert_eq!(gateway.config().principal, "jdoe");
}

#[test]
fn transaction_rolls_back_when_body_fails() {
    let conn = setup();
    let gateway = SqliteCrmGateway::try_new(&conn, GatewayConfig::default()).unwrap();

    let err = gateway
        .transaction(|gateway| {
            gateway.create_legal_entity("Rolled Back Ltd")?;
            Err::<(), _>(GatewayError::InvalidData("forced".to_string()))
        })
        .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidData(_)));
    assert!(gateway
        .find_legal_entity_by_name("Rolled Back Ltd")
        .unwrap()
        .is_none());

    let kept = gateway
        .transaction(|gateway| gateway.create_legal_entity("Kept Ltd"))
        .unwrap();
    let found = gateway.find_legal_entity_by_name("Kept Ltd").unwrap().unwrap();
    assert_eq!(found.id(), kept.id());
}

#[test]
fn top_level_scope_excludes_linked_children_and_disabled_rows() {
    let conn = setup();
    let gateway = SqliteCrmGateway::try_new(&conn, GatewayConfig::default()).unwrap();
    let customer = gateway.create_legal_entity("Acme Corp").unwrap();
    let tracker = gateway
        .create_customer_project_group(&tracker_fields("Acme Corp"), &customer)
        .unwrap();
    let creator = gateway
        .find_activity_creator(tracker.id(), ActivityClass::Incident)
        .unwrap()
        .unwrap();

    let beta = gateway.new_activity(&creator, &activity_fields("Beta")).unwrap();
    let alpha = gateway.new_activity(&creator, &activity_fields("Alpha")).unwrap();
    let child = gateway.new_activity(&creator, &activity_fields("Child")).unwrap();
    gateway
        .link_activities(child.id(), alpha.id(), ActivityLinkType::IsChildOf)
        .unwrap();
    gateway
        .link_activities(beta.id(), alpha.id(), ActivityLinkType::RelatesTo)
        .unwrap();

    let top_level: Vec<String> = gateway
        .list_tracker_activities(tracker.id(), ActivityScope::TopLevel, false)
        .unwrap()
        .iter()
        .map(|activity| activity.name.clone())
        .collect();
    assert_eq!(top_level, vec!["Alpha", "Beta"]);

    let children = gateway
        .list_linked_activities(alpha.id(), ActivityLinkType::IsChildOf, false)
        .unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id(), child.id());

    gateway
        .set_activity_state(beta.id(), EntityState::Disabled)
        .unwrap();
    let all_active = gateway
        .list_tracker_activities(tracker.id(), ActivityScope::All, false)
        .unwrap();
    assert_eq!(all_active.len(), 2);
    let all = gateway
        .list_tracker_activities(tracker.id(), ActivityScope::All, true)
        .unwrap();
    assert_eq!(all.len(), 3);
    let disabled = gateway.find_activity(beta.id()).unwrap().unwrap();
    assert_eq!(disabled.state, EntityState::Disabled);
}

#[test]
fn mutations_on_missing_objects_return_not_found() {
    let conn = setup();
    let gateway = SqliteCrmGateway::try_new(&conn, GatewayConfig::default()).unwrap();
    let changes = FieldChanges {
        name: "Renamed".to_string(),
        description: None,
    };

    let err = gateway.update_tracker("missing", &changes).unwrap_err();
    assert!(matches!(err, GatewayError::NotFound { kind: "activity tracker", .. }));
    let err = gateway
        .set_activity_state("missing", EntityState::Disabled)
        .unwrap_err();
    assert!(matches!(err, GatewayError::NotFound { kind: "activity", .. }));
    let err = gateway
        .set_resource_assignment_state("missing", "missing", EntityState::Disabled)
        .unwrap_err();
    assert!(matches!(err, GatewayError::NotFound { kind: "resource assignment", .. }));
}

#[test]
fn assignments_resolve_live_resource_names() {
    let conn = setup();
    let gateway = SqliteCrmGateway::try_new(&conn, GatewayConfig::default()).unwrap();
    let customer = gateway.create_legal_entity("Acme Corp").unwrap();
    let tracker = gateway
        .create_customer_project_group(&tracker_fields("Acme Corp"), &customer)
        .unwrap();
    let creator = gateway
        .find_activity_creator(tracker.id(), ActivityClass::Incident)
        .unwrap()
        .unwrap();
    let activity = gateway.new_activity(&creator, &activity_fields("Phase 1")).unwrap();
    let resource = gateway.create_resource("Jane Doe", None).unwrap();

    let known = gateway
        .create_resource_assignment(
            activity.id(),
            &NewResourceAssignment {
                name: "J. Doe".to_string(),
                resource_id: Some(resource.id().to_string()),
                role: ResourceRole::Member,
            },
        )
        .unwrap();
    let dangling = gateway
        .create_resource_assignment(
            activity.id(),
            &NewResourceAssignment {
                name: "Ghost".to_string(),
                resource_id: Some("NO-SUCH-RESOURCE".to_string()),
                role: ResourceRole::Observer,
            },
        )
        .unwrap();

    assert_eq!(known.resource_name.as_deref(), Some("Jane Doe"));
    assert_eq!(known.name, "J. Doe");
    assert_eq!(dangling.resource_name, None);
    assert_eq!(dangling.role, ResourceRole::Observer);

    let listed = gateway
        .list_resource_assignments(activity.id(), false)
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id(), known.id());
    assert_eq!(listed[1].id(), dangling.id());
}

#[test]
fn unscheduled_activity_is_scheduled_at_creation_time() {
    let conn = setup();
    let gateway = SqliteCrmGateway::try_new(&conn, GatewayConfig::default()).unwrap();
    let customer = gateway.create_legal_entity("Acme Corp").unwrap();
    let tracker = gateway
        .create_customer_project_group(&tracker_fields("Acme Corp"), &customer)
        .unwrap();
    let creator = gateway
        .find_activity_creator(tracker.id(), ActivityClass::Incident)
        .unwrap()
        .unwrap();

    let unscheduled = gateway.new_activity(&creator, &activity_fields("Now")).unwrap();
    assert_eq!(unscheduled.scheduled_start, Some(unscheduled.audit.created_at));
    assert_eq!(unscheduled.scheduled_end, Some(unscheduled.audit.created_at));
    assert_eq!(unscheduled.priority, PRIORITY_NA);

    let planned = gateway
        .new_activity(
            &creator,
            &NewActivityParams {
                scheduled_start: Some(1_000),
                scheduled_end: Some(2_000),
                priority: 3,
                ..activity_fields("Planned")
            },
        )
        .unwrap();
    assert_eq!(planned.scheduled_start, Some(1_000));
    assert_eq!(planned.scheduled_end, Some(2_000));
    assert_eq!(planned.priority, 3);
}

#[test]
fn top_level_scope_ignores_parents_of_other_trackers() {
    let conn = setup();
    let gateway = SqliteCrmGateway::try_new(&conn, GatewayConfig::default()).unwrap();
    let customer = gateway.create_legal_entity("Acme Corp").unwrap();
    let acme = gateway
        .create_customer_project_group(&tracker_fields("Acme Corp"), &customer)
        .unwrap();
    let globex = gateway
        .create_customer_project_group(&tracker_fields("Globex"), &customer)
        .unwrap();
    let acme_creator = gateway
        .find_activity_creator(acme.id(), ActivityClass::Incident)
        .unwrap()
        .unwrap();
    let globex_creator = gateway
        .find_activity_creator(globex.id(), ActivityClass::Incident)
        .unwrap()
        .unwrap();
    let acme_project = gateway
        .new_activity(&acme_creator, &activity_fields("Acme Project"))
        .unwrap();
    let globex_project = gateway
        .new_activity(&globex_creator, &activity_fields("Globex Project"))
        .unwrap();
    gateway
        .link_activities(globex_project.id(), acme_project.id(), ActivityLinkType::IsChildOf)
        .unwrap();

    let top_level = gateway
        .list_tracker_activities(globex.id(), ActivityScope::TopLevel, false)
        .unwrap();
    assert_eq!(top_level.len(), 1);
    assert_eq!(top_level[0].id(), globex_project.id());
}
