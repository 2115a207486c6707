//! Portal custom-domain hostname replacement (spec §4.2, testable property
//! #5): a hostname change is modeled as DELETE+CREATE with an explicit
//! ordering edge, not an in-place UPDATE.

mod common;

use tokio_util::sync::CancellationToken;

use common::{state_resource, FakeStateClient};
use kongplan::config::types::{DesiredResource, Fields, ResourceEnvelope, ResourceKind, ResourceSet};
use kongplan::planner::portals::plan;
use kongplan::planner::types::{Action, Mode};

fn envelope(ref_: &str, name: &str) -> ResourceEnvelope {
    ResourceEnvelope {
        ref_: ref_.to_string(),
        name: name.to_string(),
        konnect_id: None,
        namespace: "default".to_string(),
        protected: false,
        labels: Default::default(),
        external: None,
    }
}

#[tokio::test]
async fn hostname_change_is_delete_then_create() {
    let mut portal = DesiredResource::new(ResourceKind::Portal, envelope("dev", "dev-portal"), Fields::new());
    portal.envelope.konnect_id = Some("portal-1".to_string());

    let mut domain = DesiredResource::new(ResourceKind::PortalCustomDomain, envelope("dev-domain", "dev-domain"), Fields::new())
        .with_parent("dev");
    domain.fields.insert("hostname".to_string(), serde_json::json!("new.example.com"));
    domain.fields.insert("enabled".to_string(), serde_json::json!(true));

    let resource_set = ResourceSet {
        resources: vec![portal, domain],
        ..Default::default()
    };

    let mut portal_state = state_resource(ResourceKind::Portal, "portal-1", "dev-portal");
    portal_state.fields.insert("name".to_string(), serde_json::json!("dev-portal"));

    let mut domain_state = state_resource(ResourceKind::PortalCustomDomain, "domain-1", "dev-domain");
    domain_state.parent_id = Some("portal-1".to_string());
    domain_state.fields.insert("hostname".to_string(), serde_json::json!("old.example.com"));
    domain_state.fields.insert("enabled".to_string(), serde_json::json!(true));

    let client = FakeStateClient::new().with(portal_state).with(domain_state);

    let (changes, guard) = plan(&resource_set, &client, Mode::Apply, "default", &CancellationToken::new(), &mut 0)
        .await
        .unwrap();
    assert!(guard.is_empty());

    let domain_changes: Vec<_> = changes
        .iter()
        .filter(|c| c.resource_type == ResourceKind::PortalCustomDomain)
        .collect();
    assert_eq!(domain_changes.len(), 2);

    let delete = domain_changes.iter().find(|c| c.action == Action::Delete).unwrap();
    let create = domain_changes.iter().find(|c| c.action == Action::Create).unwrap();
    assert_eq!(delete.resource_id, "domain-1");
    assert!(create.depends_on.contains(&delete.id));
}

#[tokio::test]
async fn enabled_toggle_alone_is_an_update() {
    let mut portal = DesiredResource::new(ResourceKind::Portal, envelope("dev", "dev-portal"), Fields::new());
    portal.envelope.konnect_id = Some("portal-1".to_string());

    let mut domain = DesiredResource::new(ResourceKind::PortalCustomDomain, envelope("dev-domain", "dev-domain"), Fields::new())
        .with_parent("dev");
    domain.fields.insert("hostname".to_string(), serde_json::json!("old.example.com"));
    domain.fields.insert("enabled".to_string(), serde_json::json!(false));

    let resource_set = ResourceSet {
        resources: vec![portal, domain],
        ..Default::default()
    };

    let mut portal_state = state_resource(ResourceKind::Portal, "portal-1", "dev-portal");
    portal_state.fields.insert("name".to_string(), serde_json::json!("dev-portal"));

    let mut domain_state = state_resource(ResourceKind::PortalCustomDomain, "domain-1", "dev-domain");
    domain_state.parent_id = Some("portal-1".to_string());
    domain_state.fields.insert("hostname".to_string(), serde_json::json!("old.example.com"));
    domain_state.fields.insert("enabled".to_string(), serde_json::json!(true));

    let client = FakeStateClient::new().with(portal_state).with(domain_state);

    let (changes, _guard) = plan(&resource_set, &client, Mode::Apply, "default", &CancellationToken::new(), &mut 0)
        .await
        .unwrap();

    let domain_changes: Vec<_> = changes
        .iter()
        .filter(|c| c.resource_type == ResourceKind::PortalCustomDomain)
        .collect();
    assert_eq!(domain_changes.len(), 1);
    assert_eq!(domain_changes[0].action, Action::Update);
}
