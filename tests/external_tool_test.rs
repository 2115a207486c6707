//! Deck external-tool integration (spec §4.2 "Deck external-tool step",
//! §9 Open Question resolution for a control plane being created in the
//! same plan).

mod common;

use indexmap::IndexMap;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use common::{deck_output, state_resource, FakeDeckRunner, FakeStateClient};
use kongplan::config::types::{DeckRequirement, DesiredResource, ResourceEnvelope, ResourceKind, ResourceSet};
use kongplan::external_tool::deck::DeckRunOutput;
use kongplan::planner::gateway_services::plan;
use kongplan::planner::types::Action;

fn deck_backed_service(ref_: &str, name: &str, cp_ref: &str) -> DesiredResource {
    let mut resource = DesiredResource::new(
        ResourceKind::GatewayService,
        ResourceEnvelope {
            ref_: ref_.to_string(),
            name: name.to_string(),
            konnect_id: None,
            namespace: "default".to_string(),
            protected: false,
            labels: Default::default(),
            external: None,
        },
        IndexMap::new(),
    )
    .with_parent(cp_ref);
    resource.deck_requirement = Some(DeckRequirement {
        files: vec!["kong.yaml".to_string()],
        flags: vec!["--select-tag".to_string(), "team-a".to_string()],
        deck_base_dir: "./deck".to_string(),
    });
    resource
}

fn control_plane(ref_: &str, name: &str, konnect_id: Option<&str>) -> DesiredResource {
    DesiredResource::new(
        ResourceKind::ControlPlane,
        ResourceEnvelope {
            ref_: ref_.to_string(),
            name: name.to_string(),
            konnect_id: konnect_id.map(str::to_string),
            namespace: "default".to_string(),
            protected: false,
            labels: Default::default(),
            external: None,
        },
        IndexMap::new(),
    )
}

#[tokio::test]
async fn no_deck_changes_means_no_external_tool_step() {
    let resource_set = ResourceSet {
        resources: vec![
            control_plane("cp", "prod", Some("cp-1")),
            deck_backed_service("svc", "payments", "cp"),
        ],
        ..Default::default()
    };
    let client = FakeStateClient::new();
    let deck_runner = FakeDeckRunner::new(vec![deck_output(0, 0, 0)]);

    let (changes, guard) = plan(
        &resource_set,
        &client,
        &deck_runner,
        kongplan::planner::types::Mode::Apply,
        "token",
        "https://example.konghq.com",
        &CancellationToken::new(),
        &mut 0,
    )
    .await
    .unwrap();

    assert!(changes.is_empty());
    assert!(guard.is_empty());
    assert_eq!(deck_runner.call_count(), 1);
}

#[tokio::test]
async fn deck_changes_produce_one_external_tool_change() {
    let resource_set = ResourceSet {
        resources: vec![
            control_plane("cp", "prod", Some("cp-1")),
            deck_backed_service("svc", "payments", "cp"),
        ],
        ..Default::default()
    };
    let client = FakeStateClient::new().with({
        let mut r = state_resource(ResourceKind::ControlPlane, "cp-1", "prod");
        r.fields.insert("name".to_string(), json!("prod"));
        r
    });
    let deck_runner = FakeDeckRunner::new(vec![deck_output(1, 0, 0)]);
    let mut counter = 0usize;

    let (changes, guard) = plan(
        &resource_set,
        &client,
        &deck_runner,
        kongplan::planner::types::Mode::Apply,
        "token",
        "https://example.konghq.com",
        &CancellationToken::new(),
        &mut counter,
    )
    .await
    .unwrap();

    assert!(guard.is_empty());
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].action, Action::ExternalTool);
    let tool = changes[0].external_tool.as_ref().unwrap();
    assert_eq!(tool.gateway_service_ref, "svc");
    assert_eq!(tool.control_plane_id.as_deref(), Some("cp-1"));
    assert_eq!(tool.files, vec!["kong.yaml".to_string()]);
}

#[tokio::test]
async fn control_plane_being_created_skips_the_diff_and_emits_unconditionally() {
    let resource_set = ResourceSet {
        resources: vec![
            control_plane("cp", "prod", None),
            deck_backed_service("svc", "payments", "cp"),
        ],
        ..Default::default()
    };
    let client = FakeStateClient::new();
    let deck_runner = FakeDeckRunner::new(vec![deck_output(5, 0, 0)]);

    let (changes, _guard) = plan(
        &resource_set,
        &client,
        &deck_runner,
        kongplan::planner::types::Mode::Apply,
        "token",
        "https://example.konghq.com",
        &CancellationToken::new(),
        &mut 0,
    )
    .await
    .unwrap();

    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].action, Action::ExternalTool);
    assert!(changes[0].external_tool.as_ref().unwrap().control_plane_id.is_none());
    // The control plane isn't real yet, so the diff tool is never invoked.
    assert_eq!(deck_runner.call_count(), 0);
}
