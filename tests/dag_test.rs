//! Dependency ordering across the combined graph (spec §4.4): explicit
//! `DependsOn` edges feed `dag::graph::build`, and a cycle surfaces as a
//! `Dependency` error naming every participant.

use kongplan::config::types::ResourceKind;
use kongplan::dag::{graph, toposort};
use kongplan::error::Error;
use kongplan::planner::types::{Action, PlannedChange};

fn change(id: &str, kind: ResourceKind, ref_: &str) -> PlannedChange {
    PlannedChange::new(id.to_string(), kind, ref_, Action::Create, "default")
}

#[test]
fn three_way_depends_on_cycle_is_reported_with_every_participant() {
    let mut a = change("temp-0:c:control_plane:a", ResourceKind::ControlPlane, "a");
    let mut b = change("temp-1:c:control_plane:b", ResourceKind::ControlPlane, "b");
    let mut c = change("temp-2:c:control_plane:c", ResourceKind::ControlPlane, "c");

    a.depends_on.push(b.id.clone());
    b.depends_on.push(c.id.clone());
    c.depends_on.push(a.id.clone());

    let changes = vec![a, b, c];
    let dag = graph::build(&changes);
    let err = toposort::order(&dag).unwrap_err();

    match err {
        Error::Dependency { report } => {
            assert_eq!(
                report.participants,
                vec![
                    "temp-0:c:control_plane:a".to_string(),
                    "temp-1:c:control_plane:b".to_string(),
                    "temp-2:c:control_plane:c".to_string(),
                ]
            );
            assert!(!report.cycle_path.is_empty());
        }
        other => panic!("expected Dependency error, got {other:?}"),
    }
}

#[test]
fn explicit_depends_on_orders_before_implicit_reference_edges() {
    use kongplan::planner::types::ReferenceInfo;

    let auth = change(
        "temp-0:c:application_auth_strategy:basic",
        ResourceKind::ApplicationAuthStrategy,
        "basic",
    );
    let cp = change("temp-1:c:control_plane:prod", ResourceKind::ControlPlane, "prod");

    let mut service = change("temp-2:c:gateway_service:svc", ResourceKind::GatewayService, "svc");
    service.depends_on.push(cp.id.clone());

    let mut api = change("temp-3:c:api:payments", ResourceKind::Api, "payments");
    api.references
        .insert("auth_strategy_ids".to_string(), ReferenceInfo::scalar("basic"));

    let changes = vec![auth, cp, service, api];
    let dag = graph::build(&changes);
    let order = toposort::order(&dag).unwrap();

    let pos = |id: &str| order.iter().position(|o| o == id).unwrap();
    assert!(pos("temp-1:c:control_plane:prod") < pos("temp-2:c:gateway_service:svc"));
    assert!(pos("temp-0:c:application_auth_strategy:basic") < pos("temp-3:c:api:payments"));
}
