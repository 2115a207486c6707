//! Lowers a parsed `RawDocument` into the planner's `ResourceSet` (spec
//! §4.6 `[ADDED]`): one pass per resource kind, building each
//! `DesiredResource`'s envelope and flattened `Fields` bag, and attaching
//! the handful of kind-specific extras (team-role natural key, deck
//! requirement, API-implementation service ref) the per-type planners
//! depend on.

use crate::config::raw::{flatten_mapping, RawDefaults, RawDocument, RawExternal, RawResource};
use crate::config::types::{
    Defaults, DeckRequirement, DesiredResource, ExternalRef, ResourceEnvelope, ResourceKind,
    ResourceSet, ServiceRef, TeamRoleKey,
};
use crate::error::{Error, Result};

pub fn lower(doc: RawDocument) -> Result<ResourceSet> {
    let default_namespace = doc
        .defaults
        .as_ref()
        .and_then(|d| d.namespace.clone())
        .unwrap_or_else(|| Defaults::DEFAULT_NAMESPACE.to_string());

    let mut resources = Vec::new();

    for raw in &doc.portals {
        resources.push(envelope(ResourceKind::Portal, raw, &default_namespace, None)?);
    }
    for raw in &doc.portal_pages {
        resources.push(envelope(ResourceKind::PortalPage, raw, &default_namespace, raw.portal.clone())?);
    }
    for raw in &doc.portal_snippets {
        resources.push(envelope(ResourceKind::PortalSnippet, raw, &default_namespace, raw.portal.clone())?);
    }
    for raw in &doc.portal_teams {
        resources.push(envelope(ResourceKind::PortalTeam, raw, &default_namespace, raw.portal.clone())?);
    }
    for raw in &doc.portal_team_roles {
        let mut resource = envelope(ResourceKind::PortalTeamRole, raw, &default_namespace, raw.team.clone())?;
        resource.team_role_key = Some(team_role_key(raw)?);
        resources.push(resource);
    }
    for raw in &doc.portal_customizations {
        resources.push(envelope(ResourceKind::PortalCustomization, raw, &default_namespace, raw.portal.clone())?);
    }
    for raw in &doc.portal_auth_settings {
        resources.push(envelope(ResourceKind::PortalAuthSettings, raw, &default_namespace, raw.portal.clone())?);
    }
    for raw in &doc.portal_custom_domains {
        resources.push(envelope(ResourceKind::PortalCustomDomain, raw, &default_namespace, raw.portal.clone())?);
    }
    for raw in &doc.portal_email_configs {
        resources.push(envelope(ResourceKind::PortalEmailConfig, raw, &default_namespace, raw.portal.clone())?);
    }
    for raw in &doc.portal_email_templates {
        resources.push(envelope(ResourceKind::PortalEmailTemplate, raw, &default_namespace, raw.portal.clone())?);
    }
    for raw in &doc.portal_asset_logos {
        resources.push(envelope(ResourceKind::PortalAssetLogo, raw, &default_namespace, raw.portal.clone())?);
    }
    for raw in &doc.portal_asset_favicons {
        resources.push(envelope(ResourceKind::PortalAssetFavicon, raw, &default_namespace, raw.portal.clone())?);
    }

    for raw in &doc.apis {
        resources.push(envelope(ResourceKind::Api, raw, &default_namespace, None)?);
    }
    for raw in &doc.api_versions {
        resources.push(envelope(ResourceKind::ApiVersion, raw, &default_namespace, raw.api.clone())?);
    }
    for raw in &doc.api_publications {
        resources.push(envelope(ResourceKind::ApiPublication, raw, &default_namespace, raw.api.clone())?);
    }
    for raw in &doc.api_implementations {
        let mut resource = envelope(ResourceKind::ApiImplementation, raw, &default_namespace, raw.api.clone())?;
        resource.service_ref = Some(service_ref(&resource));
        resources.push(resource);
    }
    for raw in &doc.api_documents {
        resources.push(envelope(ResourceKind::ApiDocument, raw, &default_namespace, raw.api.clone())?);
    }

    for raw in &doc.application_auth_strategies {
        resources.push(envelope(ResourceKind::ApplicationAuthStrategy, raw, &default_namespace, None)?);
    }
    for raw in &doc.control_planes {
        resources.push(envelope(ResourceKind::ControlPlane, raw, &default_namespace, None)?);
    }
    for raw in &doc.catalog_services {
        resources.push(envelope(ResourceKind::CatalogService, raw, &default_namespace, None)?);
    }
    for raw in &doc.gateway_services {
        let mut resource = envelope(ResourceKind::GatewayService, raw, &default_namespace, None)?;
        resource.parent_ref = resource.fields.get("control_plane").and_then(|v| v.as_str()).map(str::to_string);
        resource.deck_requirement = deck_requirement(&resource);
        resources.push(resource);
    }

    for raw in &doc.event_gateways {
        resources.push(envelope(ResourceKind::EventGatewayControlPlane, raw, &default_namespace, None)?);
    }
    for raw in &doc.event_gateway_listeners {
        resources.push(envelope(ResourceKind::EventGatewayListener, raw, &default_namespace, raw.event_gateway.clone())?);
    }
    for raw in &doc.event_gateway_listener_policies {
        resources.push(envelope(ResourceKind::EventGatewayListenerPolicy, raw, &default_namespace, raw.event_gateway.clone())?);
    }
    for raw in &doc.event_gateway_backend_clusters {
        resources.push(envelope(ResourceKind::EventGatewayBackendCluster, raw, &default_namespace, raw.event_gateway.clone())?);
    }
    for raw in &doc.event_gateway_virtual_clusters {
        resources.push(envelope(ResourceKind::EventGatewayVirtualCluster, raw, &default_namespace, raw.event_gateway.clone())?);
    }
    for raw in &doc.event_gateway_routes {
        resources.push(envelope(ResourceKind::EventGatewayRoute, raw, &default_namespace, raw.event_gateway.clone())?);
    }
    for raw in &doc.event_gateway_plugins {
        resources.push(envelope(ResourceKind::EventGatewayPlugin, raw, &default_namespace, raw.event_gateway.clone())?);
    }

    Ok(ResourceSet {
        defaults: lower_defaults(doc.defaults.as_ref()),
        resources,
    })
}

fn lower_defaults(raw: Option<&RawDefaults>) -> Defaults {
    match raw {
        Some(raw) => Defaults {
            namespace: raw.namespace.clone(),
            namespaces: raw.namespaces.clone(),
        },
        None => Defaults::default(),
    }
}

fn envelope(
    kind: ResourceKind,
    raw: &RawResource,
    default_namespace: &str,
    parent_ref: Option<String>,
) -> Result<DesiredResource> {
    let external = match &raw.external {
        Some(RawExternal::Id { id }) => Some(ExternalRef::Id(id.clone())),
        Some(RawExternal::Selector { selector }) => Some(ExternalRef::Selector {
            match_fields: selector.match_fields.clone(),
        }),
        None => None,
    };

    let envelope = ResourceEnvelope {
        ref_: raw.ref_.clone(),
        name: raw.name.clone(),
        konnect_id: None,
        namespace: raw.namespace.clone().unwrap_or_else(|| default_namespace.to_string()),
        protected: raw.protected,
        labels: raw.labels.clone(),
        external,
    };

    let fields = flatten_mapping(&raw.extra);
    let mut resource = DesiredResource::new(kind, envelope, fields);
    if let Some(parent) = parent_ref {
        resource = resource.with_parent(parent);
    }
    Ok(resource)
}

fn team_role_key(raw: &RawResource) -> Result<TeamRoleKey> {
    let get = |key: &str| -> Result<String> {
        raw.extra
            .get(serde_yaml::Value::String(key.to_string()))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::config(format!(
                    "portal team role {:?} is missing required field {:?}",
                    raw.ref_, key
                ))
            })
    };
    Ok(TeamRoleKey {
        role_name: get("role_name")?,
        entity_id: get("entity_id")?,
        entity_type: get("entity_type")?,
        entity_region: get("entity_region").unwrap_or_default().to_lowercase(),
    })
}

fn deck_requirement(resource: &DesiredResource) -> Option<DeckRequirement> {
    let files = resource
        .fields
        .get("requires.deck.files")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect::<Vec<_>>());
    let files = files?;

    let flags = resource
        .fields
        .get("requires.deck.flags")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect::<Vec<_>>())
        .unwrap_or_default();

    let deck_base_dir = resource
        .fields
        .get("deck_base_dir")
        .and_then(|v| v.as_str())
        .unwrap_or(".")
        .to_string();

    Some(DeckRequirement { files, flags, deck_base_dir })
}

fn service_ref(resource: &DesiredResource) -> ServiceRef {
    ServiceRef {
        service_id_raw: resource
            .fields
            .get("service.id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        control_plane_id_raw: resource
            .fields
            .get("service.control_plane_id")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    }
}
