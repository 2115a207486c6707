//! The wire shape of a desired-state YAML document (spec §2 "external
//! collaborator": config loading/schema validation happen outside the
//! planner, but something has to produce the `ResourceSet` the planner
//! consumes — this is that something, kept deliberately simple).
//!
//! One `RawResource` shape is shared by every kind: the envelope fields
//! every resource carries, an optional `_external` block, the handful of
//! parent-ref field names used across kinds, and a catch-all `extra`
//! mapping for everything else. `extra` is flattened into dot-path `Fields`
//! keys by `lower` (e.g. `configs: {key_auth: {key_names: [...]}}` becomes
//! the single key `configs.key_auth.key_names`), since every per-type
//! planner already diffs and addresses fields that way (`service.id`,
//! `configs.openid_connect.client_secret`, `requires.deck.files`...).

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value as Json;

use crate::config::types::{Fields, Labels};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawExternal {
    Id { id: String },
    Selector { selector: RawSelector },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSelector {
    #[serde(rename = "matchFields", alias = "match_fields")]
    pub match_fields: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawDefaults {
    pub namespace: Option<String>,
    #[serde(default)]
    pub namespaces: Vec<String>,
}

/// Shared shape of every desired resource in the document, regardless of
/// kind — the handful of per-kind parent fields (`portal`, `api`, `team`,
/// `event_gateway`) are optional and simply ignored by kinds that don't
/// use them.
#[derive(Debug, Clone, Deserialize)]
pub struct RawResource {
    #[serde(rename = "ref")]
    pub ref_: String,
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub labels: Labels,
    #[serde(rename = "_external", default)]
    pub external: Option<RawExternal>,
    #[serde(default)]
    pub portal: Option<String>,
    #[serde(default)]
    pub api: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub event_gateway: Option<String>,
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

/// The full document: `_defaults` plus one array per resource kind. A
/// missing key is simply an empty array (`#[serde(default)]` on every
/// field), so a fragment file only needs the keys it populates.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawDocument {
    #[serde(rename = "_defaults", default)]
    pub defaults: Option<RawDefaults>,

    #[serde(default)]
    pub portals: Vec<RawResource>,
    #[serde(default)]
    pub portal_pages: Vec<RawResource>,
    #[serde(default)]
    pub portal_snippets: Vec<RawResource>,
    #[serde(default)]
    pub portal_teams: Vec<RawResource>,
    #[serde(default)]
    pub portal_team_roles: Vec<RawResource>,
    #[serde(default)]
    pub portal_customizations: Vec<RawResource>,
    #[serde(default)]
    pub portal_auth_settings: Vec<RawResource>,
    #[serde(default)]
    pub portal_custom_domains: Vec<RawResource>,
    #[serde(default)]
    pub portal_email_configs: Vec<RawResource>,
    #[serde(default)]
    pub portal_email_templates: Vec<RawResource>,
    #[serde(default)]
    pub portal_asset_logos: Vec<RawResource>,
    #[serde(default)]
    pub portal_asset_favicons: Vec<RawResource>,

    #[serde(default)]
    pub apis: Vec<RawResource>,
    #[serde(default)]
    pub api_versions: Vec<RawResource>,
    #[serde(default)]
    pub api_publications: Vec<RawResource>,
    #[serde(default)]
    pub api_implementations: Vec<RawResource>,
    #[serde(default)]
    pub api_documents: Vec<RawResource>,

    #[serde(default)]
    pub application_auth_strategies: Vec<RawResource>,
    #[serde(default)]
    pub control_planes: Vec<RawResource>,
    #[serde(default)]
    pub catalog_services: Vec<RawResource>,
    #[serde(default)]
    pub gateway_services: Vec<RawResource>,

    #[serde(default)]
    pub event_gateways: Vec<RawResource>,
    #[serde(default)]
    pub event_gateway_listeners: Vec<RawResource>,
    #[serde(default)]
    pub event_gateway_listener_policies: Vec<RawResource>,
    #[serde(default)]
    pub event_gateway_backend_clusters: Vec<RawResource>,
    #[serde(default)]
    pub event_gateway_virtual_clusters: Vec<RawResource>,
    #[serde(default)]
    pub event_gateway_routes: Vec<RawResource>,
    #[serde(default)]
    pub event_gateway_plugins: Vec<RawResource>,
}

impl RawDocument {
    /// Merge another fragment document into this one — concatenates every
    /// per-kind array and takes `_defaults` from whichever document
    /// defines it first (spec §4.6, grounded on `config/parser.rs`'s
    /// `merge_yaml_files`).
    pub fn merge(&mut self, mut other: RawDocument) {
        if self.defaults.is_none() {
            self.defaults = other.defaults.take();
        }
        self.portals.append(&mut other.portals);
        self.portal_pages.append(&mut other.portal_pages);
        self.portal_snippets.append(&mut other.portal_snippets);
        self.portal_teams.append(&mut other.portal_teams);
        self.portal_team_roles.append(&mut other.portal_team_roles);
        self.portal_customizations.append(&mut other.portal_customizations);
        self.portal_auth_settings.append(&mut other.portal_auth_settings);
        self.portal_custom_domains.append(&mut other.portal_custom_domains);
        self.portal_email_configs.append(&mut other.portal_email_configs);
        self.portal_email_templates.append(&mut other.portal_email_templates);
        self.portal_asset_logos.append(&mut other.portal_asset_logos);
        self.portal_asset_favicons.append(&mut other.portal_asset_favicons);
        self.apis.append(&mut other.apis);
        self.api_versions.append(&mut other.api_versions);
        self.api_publications.append(&mut other.api_publications);
        self.api_implementations.append(&mut other.api_implementations);
        self.api_documents.append(&mut other.api_documents);
        self.application_auth_strategies.append(&mut other.application_auth_strategies);
        self.control_planes.append(&mut other.control_planes);
        self.catalog_services.append(&mut other.catalog_services);
        self.gateway_services.append(&mut other.gateway_services);
        self.event_gateways.append(&mut other.event_gateways);
        self.event_gateway_listeners.append(&mut other.event_gateway_listeners);
        self.event_gateway_listener_policies.append(&mut other.event_gateway_listener_policies);
        self.event_gateway_backend_clusters.append(&mut other.event_gateway_backend_clusters);
        self.event_gateway_virtual_clusters.append(&mut other.event_gateway_virtual_clusters);
        self.event_gateway_routes.append(&mut other.event_gateway_routes);
        self.event_gateway_plugins.append(&mut other.event_gateway_plugins);
    }
}

/// Recursively flatten a YAML mapping into dot-path `Fields` keys. Nested
/// mappings descend (`a: {b: c}` -> `a.b`); sequences and scalars become a
/// single leaf value (spec §4.2 field comparisons address whole arrays,
/// e.g. `configs.key_auth.key_names`, not per-element).
pub fn flatten_into(value: &serde_yaml::Value, prefix: &str, out: &mut Fields) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (k, v) in map {
                let key = k.as_str().unwrap_or_default();
                let full_key = if prefix.is_empty() {
                    key.to_string()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(v, &full_key, out);
            }
        }
        other => {
            out.insert(prefix.to_string(), yaml_to_json(other));
        }
    }
}

pub fn flatten_mapping(map: &serde_yaml::Mapping) -> Fields {
    let mut out = Fields::new();
    flatten_into(&serde_yaml::Value::Mapping(map.clone()), "", &mut out);
    out
}

/// Convert a `serde_yaml::Value` into `serde_json::Value`, preserving
/// nested structure (used for leaves: arrays and nested-object leaves keep
/// their shape rather than being flattened further).
pub fn yaml_to_json(value: &serde_yaml::Value) -> Json {
    match value {
        serde_yaml::Value::Null => Json::Null,
        serde_yaml::Value::Bool(b) => Json::Bool(*b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Json::from(i)
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f).map(Json::Number).unwrap_or(Json::Null)
            } else {
                Json::Null
            }
        }
        serde_yaml::Value::String(s) => Json::String(s.clone()),
        serde_yaml::Value::Sequence(seq) => Json::Array(seq.iter().map(yaml_to_json).collect()),
        serde_yaml::Value::Mapping(map) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in map {
                if let Some(key) = k.as_str() {
                    obj.insert(key.to_string(), yaml_to_json(v));
                }
            }
            Json::Object(obj)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}
