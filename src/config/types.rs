//! The desired-state data model (spec §3.1): `ResourceSet`, `DesiredResource`
//! and the envelope/extras every resource kind shares.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

pub type Labels = HashMap<String, String>;
pub type Fields = IndexMap<String, Json>;

/// System-reserved label keys stripped before comparing labels (spec §4.2
/// "Sparse update rule").
pub const SYSTEM_LABEL_KEYS: &[&str] = &[
    "namespace",
    "managed",
    "protected",
    "last-updated",
];

/// Every resource kind the planner knows how to diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Portal,
    PortalPage,
    PortalSnippet,
    PortalTeam,
    PortalTeamRole,
    PortalCustomization,
    PortalAuthSettings,
    PortalCustomDomain,
    PortalEmailConfig,
    PortalEmailTemplate,
    PortalAssetLogo,
    PortalAssetFavicon,
    Api,
    ApiVersion,
    ApiPublication,
    ApiImplementation,
    ApiDocument,
    ApplicationAuthStrategy,
    ControlPlane,
    CatalogService,
    GatewayService,
    EventGatewayControlPlane,
    EventGatewayListener,
    EventGatewayListenerPolicy,
    EventGatewayBackendCluster,
    EventGatewayVirtualCluster,
    EventGatewayRoute,
    EventGatewayPlugin,
}

impl ResourceKind {
    /// The wire/type-name used in change IDs, `ResourceType` fields and the
    /// plan JSON document (spec §6.3).
    pub fn type_name(self) -> &'static str {
        match self {
            ResourceKind::Portal => "portal",
            ResourceKind::PortalPage => "portal_page",
            ResourceKind::PortalSnippet => "portal_snippet",
            ResourceKind::PortalTeam => "portal_team",
            ResourceKind::PortalTeamRole => "portal_team_role",
            ResourceKind::PortalCustomization => "portal_customization",
            ResourceKind::PortalAuthSettings => "portal_auth_settings",
            ResourceKind::PortalCustomDomain => "portal_custom_domain",
            ResourceKind::PortalEmailConfig => "portal_email_config",
            ResourceKind::PortalEmailTemplate => "portal_email_template",
            ResourceKind::PortalAssetLogo => "portal_asset_logo",
            ResourceKind::PortalAssetFavicon => "portal_asset_favicon",
            ResourceKind::Api => "api",
            ResourceKind::ApiVersion => "api_version",
            ResourceKind::ApiPublication => "api_publication",
            ResourceKind::ApiImplementation => "api_implementation",
            ResourceKind::ApiDocument => "api_document",
            ResourceKind::ApplicationAuthStrategy => "application_auth_strategy",
            ResourceKind::ControlPlane => "control_plane",
            ResourceKind::CatalogService => "catalog_service",
            ResourceKind::GatewayService => "gateway_service",
            ResourceKind::EventGatewayControlPlane => "event_gateway",
            ResourceKind::EventGatewayListener => "event_gateway_listener",
            ResourceKind::EventGatewayListenerPolicy => "event_gateway_listener_policy",
            ResourceKind::EventGatewayBackendCluster => "event_gateway_backend_cluster",
            ResourceKind::EventGatewayVirtualCluster => "event_gateway_virtual_cluster",
            ResourceKind::EventGatewayRoute => "event_gateway_route",
            ResourceKind::EventGatewayPlugin => "event_gateway_plugin",
        }
    }

    /// The `type` this kind's `Parent` edge points at, per spec §4.4's
    /// child→parent mapping. `None` for top-level kinds.
    pub fn parent_kind(self) -> Option<ResourceKind> {
        use ResourceKind::*;
        match self {
            PortalPage | PortalSnippet | PortalTeam | PortalCustomization
            | PortalAuthSettings | PortalCustomDomain | PortalEmailConfig
            | PortalEmailTemplate | PortalAssetLogo | PortalAssetFavicon => Some(Portal),
            PortalTeamRole => Some(PortalTeam),
            ApiVersion | ApiPublication | ApiImplementation | ApiDocument => Some(Api),
            EventGatewayListener | EventGatewayListenerPolicy | EventGatewayBackendCluster
            | EventGatewayVirtualCluster | EventGatewayRoute | EventGatewayPlugin => {
                Some(EventGatewayControlPlane)
            }
            _ => None,
        }
    }

    /// Singleton children are emitted as UPDATE (or CREATE when absent)
    /// regardless of prior existence — spec §4.2 "Singleton children".
    pub fn is_singleton_child(self) -> bool {
        matches!(
            self,
            ResourceKind::PortalCustomization
                | ResourceKind::PortalAuthSettings
                | ResourceKind::PortalCustomDomain
                | ResourceKind::PortalEmailConfig
                | ResourceKind::PortalAssetLogo
                | ResourceKind::PortalAssetFavicon
        )
    }

    /// The fixed invocation order of per-type planners (spec §5 "Ordering
    /// guarantees"): auth strategies → control planes → portals (+children)
    /// → catalog services → APIs (+children) → event-gateway control planes.
    pub fn planner_stage(self) -> u8 {
        use ResourceKind::*;
        match self {
            ApplicationAuthStrategy => 0,
            ControlPlane => 1,
            Portal | PortalPage | PortalSnippet | PortalTeam | PortalTeamRole
            | PortalCustomization | PortalAuthSettings | PortalCustomDomain
            | PortalEmailConfig | PortalEmailTemplate | PortalAssetLogo
            | PortalAssetFavicon => 2,
            CatalogService => 3,
            GatewayService => 4,
            Api | ApiVersion | ApiPublication | ApiImplementation | ApiDocument => 5,
            EventGatewayControlPlane | EventGatewayListener | EventGatewayListenerPolicy
            | EventGatewayBackendCluster | EventGatewayVirtualCluster | EventGatewayRoute
            | EventGatewayPlugin => 6,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// External-resource discovery mode (spec §3.1, `_external` block).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalRef {
    Id(String),
    Selector { match_fields: HashMap<String, String> },
}

/// Fields every desired resource carries regardless of kind.
#[derive(Debug, Clone, Default)]
pub struct ResourceEnvelope {
    pub ref_: String,
    pub name: String,
    pub konnect_id: Option<String>,
    pub namespace: String,
    pub protected: bool,
    pub labels: Labels,
    pub external: Option<ExternalRef>,
}

impl ResourceEnvelope {
    pub fn is_external(&self) -> bool {
        self.external.is_some()
    }
}

/// `(role_name, entity_id, entity_type, lowercase entity_region)` — the
/// natural key for portal team roles (spec §4.2).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TeamRoleKey {
    pub role_name: String,
    pub entity_id: String,
    pub entity_type: String,
    pub entity_region: String,
}

/// Config for a gateway service that requires the external `deck` diff tool
/// (spec §4.2 "Deck external-tool step").
#[derive(Debug, Clone)]
pub struct DeckRequirement {
    pub files: Vec<String>,
    pub flags: Vec<String>,
    pub deck_base_dir: String,
}

/// `service.id` / `service.control_plane_id` as configured on an API
/// implementation — may be a ref, a placeholder, or a literal UUID (spec
/// §4.1 "API implementations").
#[derive(Debug, Clone, Default)]
pub struct ServiceRef {
    pub service_id_raw: String,
    pub control_plane_id_raw: Option<String>,
}

/// A single desired resource of any kind.
///
/// Polymorphism is implemented as one struct tagged by `kind` rather than a
/// variant-per-kind enum: every per-type planner already needs the same
/// envelope plus a sparse attribute bag to run the generic diff, and the
/// handful of kinds needing extra structure (team roles, deck-backed
/// gateway services, API implementations) carry it in dedicated `Option`
/// fields instead of inflating a sum type whose arms would mostly be
/// identical.
#[derive(Debug, Clone)]
pub struct DesiredResource {
    pub envelope: ResourceEnvelope,
    pub kind: ResourceKind,
    /// Only the attributes the user actually configured — unset optional
    /// fields never participate in diffing (spec §4.2 "Sparse update rule").
    pub fields: Fields,
    /// Ref of the parent resource, when this kind has one.
    pub parent_ref: Option<String>,
    pub team_role_key: Option<TeamRoleKey>,
    pub deck_requirement: Option<DeckRequirement>,
    pub service_ref: Option<ServiceRef>,
}

impl DesiredResource {
    pub fn new(kind: ResourceKind, envelope: ResourceEnvelope, fields: Fields) -> Self {
        Self {
            envelope,
            kind,
            fields,
            parent_ref: None,
            team_role_key: None,
            deck_requirement: None,
            service_ref: None,
        }
    }

    pub fn with_parent(mut self, parent_ref: impl Into<String>) -> Self {
        self.parent_ref = Some(parent_ref.into());
        self
    }
}

/// The `_defaults` block.
#[derive(Debug, Clone, Default)]
pub struct Defaults {
    pub namespace: Option<String>,
    pub namespaces: Vec<String>,
}

impl Defaults {
    pub const DEFAULT_NAMESPACE: &'static str = "default";
}

/// The planner's full input: all desired resources plus `_defaults`.
#[derive(Debug, Clone, Default)]
pub struct ResourceSet {
    pub defaults: Defaults,
    pub resources: Vec<DesiredResource>,
}

impl ResourceSet {
    pub fn by_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &DesiredResource> {
        self.resources.iter().filter(move |r| r.kind == kind)
    }

    pub fn find_by_ref(&self, ref_: &str) -> Option<&DesiredResource> {
        self.resources.iter().find(|r| r.envelope.ref_ == ref_)
    }

    pub fn find_by_ref_and_kind(&self, ref_: &str, kind: ResourceKind) -> Option<&DesiredResource> {
        self.resources
            .iter()
            .find(|r| r.kind == kind && r.envelope.ref_ == ref_)
    }

    /// Namespaces present on top-level desired resources, defaulting to
    /// "default" (spec §2 "Namespace Enumerator").
    pub fn top_level_namespaces(&self) -> Vec<String> {
        let mut namespaces: Vec<String> = self
            .resources
            .iter()
            .filter(|r| r.kind.parent_kind().is_none())
            .map(|r| r.envelope.namespace.clone())
            .collect();
        if namespaces.is_empty() {
            namespaces.push(Defaults::DEFAULT_NAMESPACE.to_string());
        }
        namespaces.sort();
        namespaces.dedup();
        namespaces
    }
}

/// Strip system-reserved label keys before comparing (spec §4.2).
pub fn strip_system_labels(labels: &Labels) -> Labels {
    labels
        .iter()
        .filter(|(k, _)| !SYSTEM_LABEL_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
