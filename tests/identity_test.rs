//! Identity Resolver coverage (spec §4.1): managed lookup, `_external` by
//! id, `_external` by selector, and the selector error cases.

mod common;

use tokio_util::sync::CancellationToken;

use common::{state_resource, FakeStateClient};
use kongplan::config::types::{
    DesiredResource, ExternalRef, Fields, ResourceEnvelope, ResourceKind, ResourceSet,
};
use kongplan::identity::resolver::resolve_identities;

fn managed_portal(name: &str) -> DesiredResource {
    DesiredResource::new(
        ResourceKind::Portal,
        ResourceEnvelope {
            ref_: "dev".to_string(),
            name: name.to_string(),
            konnect_id: None,
            namespace: "default".to_string(),
            protected: false,
            labels: Default::default(),
            external: None,
        },
        Fields::new(),
    )
}

fn external_portal(ref_: &str, external: ExternalRef) -> DesiredResource {
    DesiredResource::new(
        ResourceKind::Portal,
        ResourceEnvelope {
            ref_: ref_.to_string(),
            name: "placeholder".to_string(),
            konnect_id: None,
            namespace: "default".to_string(),
            protected: false,
            labels: Default::default(),
            external: Some(external),
        },
        Fields::new(),
    )
}

#[tokio::test]
async fn resolves_a_managed_resource_already_present() {
    let client = FakeStateClient::new().with(state_resource(ResourceKind::Portal, "portal-1", "dev-portal"));
    let mut set = ResourceSet {
        resources: vec![managed_portal("dev-portal")],
        ..Default::default()
    };

    resolve_identities(&mut set, &client, &CancellationToken::new()).await.unwrap();

    assert_eq!(set.resources[0].envelope.konnect_id.as_deref(), Some("portal-1"));
}

#[tokio::test]
async fn leaves_konnect_id_unset_when_managed_resource_is_new() {
    let client = FakeStateClient::new();
    let mut set = ResourceSet {
        resources: vec![managed_portal("brand-new")],
        ..Default::default()
    };

    resolve_identities(&mut set, &client, &CancellationToken::new()).await.unwrap();

    assert!(set.resources[0].envelope.konnect_id.is_none());
}

#[tokio::test]
async fn resolves_external_by_id_and_adopts_server_name() {
    let client = FakeStateClient::new().with(state_resource(ResourceKind::Portal, "portal-9", "server-name"));
    let mut set = ResourceSet {
        resources: vec![external_portal("ext", ExternalRef::Id("portal-9".to_string()))],
        ..Default::default()
    };

    resolve_identities(&mut set, &client, &CancellationToken::new()).await.unwrap();

    assert_eq!(set.resources[0].envelope.konnect_id.as_deref(), Some("portal-9"));
    assert_eq!(set.resources[0].envelope.name, "server-name");
}

#[tokio::test]
async fn external_by_id_not_found_is_a_resolution_error() {
    let client = FakeStateClient::new();
    let mut set = ResourceSet {
        resources: vec![external_portal("ext", ExternalRef::Id("missing".to_string()))],
        ..Default::default()
    };

    let err = resolve_identities(&mut set, &client, &CancellationToken::new()).await.unwrap_err();
    assert!(err.to_string().contains("was not found"));
}

#[tokio::test]
async fn external_by_selector_requires_exactly_one_match() {
    let client = FakeStateClient::new()
        .with(state_resource(ResourceKind::Portal, "p1", "dup"))
        .with(state_resource(ResourceKind::Portal, "p2", "dup"));
    let mut set = ResourceSet {
        resources: vec![external_portal(
            "ext",
            ExternalRef::Selector {
                match_fields: [("name".to_string(), "dup".to_string())].into(),
            },
        )],
        ..Default::default()
    };

    let err = resolve_identities(&mut set, &client, &CancellationToken::new()).await.unwrap_err();
    assert!(err.to_string().contains("matched 2 resources"));
}

#[tokio::test]
async fn external_selector_rejects_unsupported_fields() {
    let client = FakeStateClient::new();
    let mut set = ResourceSet {
        resources: vec![external_portal(
            "ext",
            ExternalRef::Selector {
                match_fields: [("label".to_string(), "x".to_string())].into(),
            },
        )],
        ..Default::default()
    };

    let err = resolve_identities(&mut set, &client, &CancellationToken::new()).await.unwrap_err();
    assert!(err.to_string().contains("only \"name\" is supported"));
}
