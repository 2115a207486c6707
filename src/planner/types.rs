//! The output side of the planner (spec §3.1): `PlannedChange`,
//! `ReferenceInfo`, `Plan` and the document it serializes to (spec §6.3).

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::{json, Value as Json};

use crate::config::types::{Fields, ResourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Delete,
    ExternalTool,
}

impl Action {
    pub fn code(self) -> char {
        match self {
            Action::Create => 'c',
            Action::Update => 'u',
            Action::Delete => 'd',
            Action::ExternalTool => 'e',
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Action::Create => "CREATE",
            Action::Update => "UPDATE",
            Action::Delete => "DELETE",
            Action::ExternalTool => "EXTERNAL_TOOL",
        }
    }
}

/// `__REF_PLACEHOLDER__`-resolved ID that a consumer cannot know at plan
/// time because its producer runs earlier in the same plan (spec §3.1,
/// §4.3).
pub const UNKNOWN_ID: &str = "[unknown]";

/// One reference from a change's configured field to another resource
/// (spec §3.1). Scalar references use `ref_`/`id`/`lookup_fields`; array-
/// valued references (e.g. publication→auth_strategies) use the `*_array*`
/// siblings with `is_array = true`.
#[derive(Debug, Clone, Default)]
pub struct ReferenceInfo {
    pub ref_: Option<String>,
    pub id: Option<String>,
    pub lookup_fields: IndexMap<String, Json>,
    pub is_array: bool,
    pub refs: Vec<String>,
    pub resolved_ids: Vec<Option<String>>,
    pub lookup_arrays: Vec<IndexMap<String, Json>>,
}

impl ReferenceInfo {
    pub fn scalar(ref_: impl Into<String>) -> Self {
        Self {
            ref_: Some(ref_.into()),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_lookup(mut self, key: impl Into<String>, value: Json) -> Self {
        self.lookup_fields.insert(key.into(), value);
        self
    }

    pub fn to_json(&self) -> Json {
        if self.is_array {
            json!({
                "refs": self.refs,
                "resolved_ids": self.resolved_ids,
                "lookup_arrays": self.lookup_arrays.iter().map(|m| {
                    Json::Object(m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                }).collect::<Vec<_>>(),
                "is_array": true,
            })
        } else {
            json!({
                "ref": self.ref_,
                "id": self.id,
                "lookup_fields": Json::Object(self.lookup_fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParentRef {
    pub ref_: String,
    pub id: String,
}

/// Protection state carried by a change (spec §3.1/§3.2).
#[derive(Debug, Clone, Copy)]
pub enum Protection {
    Create(bool),
    Update { old: bool, new: bool },
}

impl Protection {
    /// True exactly for the single exception the spec carves out: a pure
    /// protection-removal UPDATE (spec §4.2 "Protection enforcement").
    pub fn is_pure_unprotect(self) -> bool {
        matches!(self, Protection::Update { old: true, new: false })
    }
}

/// Extra payload an EXTERNAL_TOOL change carries (spec §4.2 "Deck
/// external-tool step", §4.5).
#[derive(Debug, Clone)]
pub struct ExternalToolPayload {
    pub gateway_service_ref: String,
    pub control_plane_ref: Option<String>,
    pub control_plane_id: Option<String>,
    pub control_plane_name: Option<String>,
    pub deck_base_dir: String,
    pub selector_match_name: String,
    pub files: Vec<String>,
    pub flags: Vec<String>,
}

/// A single unit of the plan (spec §3.1).
#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub id: String,
    pub resource_type: ResourceKind,
    pub resource_ref: String,
    pub resource_id: String,
    pub action: Action,
    pub fields: Fields,
    pub references: IndexMap<String, ReferenceInfo>,
    pub parent: Option<ParentRef>,
    pub protection: Option<Protection>,
    pub namespace: String,
    pub depends_on: Vec<String>,
    pub resource_monikers: IndexMap<String, String>,
    pub external_tool: Option<ExternalToolPayload>,
    /// Set for portal-team-role CREATEs whose `entity_id` is a ref
    /// placeholder pointing at an API (spec §4.2 "Portal teams and team
    /// roles"), consumed by the cross-planner dependency adjuster.
    pub team_role_entity_ref: Option<String>,
}

impl PlannedChange {
    pub fn new(
        id: String,
        resource_type: ResourceKind,
        resource_ref: impl Into<String>,
        action: Action,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            id,
            resource_type,
            resource_ref: resource_ref.into(),
            resource_id: String::new(),
            action,
            fields: Fields::new(),
            references: IndexMap::new(),
            parent: None,
            protection: None,
            namespace: namespace.into(),
            depends_on: Vec::new(),
            resource_monikers: IndexMap::new(),
            external_tool: None,
            team_role_entity_ref: None,
        }
    }

    pub fn to_json(&self) -> Json {
        let protection_json = self.protection.map(|p| match p {
            Protection::Create(b) => json!(b),
            Protection::Update { old, new } => json!({ "old": old, "new": new }),
        });
        let references_json: IndexMap<String, Json> = self
            .references
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        json!({
            "id": self.id,
            "resource_type": self.resource_type.type_name(),
            "resource_ref": self.resource_ref,
            "resource_id": self.resource_id,
            "action": self.action.label(),
            "fields": Json::Object(self.fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            "references": Json::Object(references_json.into_iter().collect()),
            "parent": self.parent.as_ref().map(|p| json!({"ref": p.ref_, "id": p.id})),
            "protection": protection_json,
            "namespace": self.namespace,
            "depends_on": self.depends_on,
            "resource_monikers": Json::Object(self.resource_monikers.iter().map(|(k, v)| (k.clone(), Json::String(v.clone()))).collect()),
        })
    }
}

pub fn temp_change_id(counter: usize, action: Action, resource_type: ResourceKind, ref_: &str) -> String {
    format!("temp-{}:{}:{}:{}", counter, action.code(), resource_type, ref_)
}

pub fn positional_change_id(position: usize, action: Action, resource_type: ResourceKind, ref_: &str) -> String {
    format!("{}:{}:{}:{}", position, action.code(), resource_type, ref_)
}

#[derive(Debug, Clone)]
pub struct Warning {
    pub change_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProtectionChanges {
    pub protecting: usize,
    pub unprotecting: usize,
}

#[derive(Debug, Clone)]
pub struct ExternalToolDependency {
    pub gateway_service_ref: String,
    pub selector_match_name: String,
    pub control_plane_ref: Option<String>,
    pub control_plane_id: Option<String>,
    pub control_plane_name: Option<String>,
    pub files: Vec<String>,
    pub flags: Vec<String>,
    pub deck_base_dir: String,
}

#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub total_changes: usize,
    pub by_action: IndexMap<&'static str, usize>,
    pub by_resource: IndexMap<&'static str, usize>,
    pub by_external_tools: IndexMap<&'static str, Vec<ExternalToolDependency>>,
    pub protection_changes: Option<ProtectionChanges>,
}

impl Summary {
    pub fn compute(changes: &[PlannedChange]) -> Self {
        let mut summary = Summary {
            total_changes: changes.len(),
            ..Default::default()
        };
        for action in [Action::Create, Action::Update, Action::Delete, Action::ExternalTool] {
            summary.by_action.insert(action.label(), 0);
        }
        let mut protecting = 0;
        let mut unprotecting = 0;

        for change in changes {
            *summary.by_action.entry(change.action.label()).or_insert(0) += 1;
            *summary
                .by_resource
                .entry(change.resource_type.type_name())
                .or_insert(0) += 1;

            match change.protection {
                Some(Protection::Create(true)) => protecting += 1,
                Some(Protection::Update { old: false, new: true }) => protecting += 1,
                Some(Protection::Update { old: true, new: false }) => unprotecting += 1,
                _ => {}
            }

            if let Some(tool) = &change.external_tool {
                summary
                    .by_external_tools
                    .entry(change.resource_type.type_name())
                    .or_default()
                    .push(ExternalToolDependency {
                        gateway_service_ref: tool.gateway_service_ref.clone(),
                        selector_match_name: tool.selector_match_name.clone(),
                        control_plane_ref: tool.control_plane_ref.clone(),
                        control_plane_id: tool.control_plane_id.clone(),
                        control_plane_name: tool.control_plane_name.clone(),
                        files: tool.files.clone(),
                        flags: tool.flags.clone(),
                        deck_base_dir: tool.deck_base_dir.clone(),
                    });
            }
        }

        if protecting > 0 || unprotecting > 0 {
            summary.protection_changes = Some(ProtectionChanges {
                protecting,
                unprotecting,
            });
        }
        summary
    }

    pub fn to_json(&self) -> Json {
        let by_external_tools: IndexMap<String, Json> = self
            .by_external_tools
            .iter()
            .map(|(k, deps)| {
                let arr: Vec<Json> = deps
                    .iter()
                    .map(|d| {
                        json!({
                            "gateway_service_ref": d.gateway_service_ref,
                            "selector": { "match_fields": { "name": d.selector_match_name } },
                            "control_plane_ref": d.control_plane_ref,
                            "control_plane_id": d.control_plane_id,
                            "control_plane_name": d.control_plane_name,
                            "files": d.files,
                            "flags": d.flags,
                            "deck_base_dir": d.deck_base_dir,
                        })
                    })
                    .collect();
                (k.to_string(), Json::Array(arr))
            })
            .collect();

        json!({
            "total_changes": self.total_changes,
            "by_action": Json::Object(self.by_action.iter().map(|(k, v)| (k.to_string(), json!(v))).collect()),
            "by_resource": Json::Object(self.by_resource.iter().map(|(k, v)| (k.to_string(), json!(v))).collect()),
            "by_external_tools": Json::Object(by_external_tools.into_iter().collect()),
            "protection_changes": self.protection_changes.as_ref().map(|p| json!({"protecting": p.protecting, "unprotecting": p.unprotecting})),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Apply,
    Sync,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Apply => "apply",
            Mode::Sync => "sync",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Metadata {
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub generator: String,
    pub mode: Mode,
}

/// The full output of a plan invocation (spec §3.1, §6.3).
#[derive(Debug, Clone)]
pub struct Plan {
    pub metadata: Metadata,
    pub changes: Vec<PlannedChange>,
    pub execution_order: Vec<String>,
    pub summary: Summary,
    pub warnings: Vec<Warning>,
}

impl Plan {
    pub fn to_json(&self) -> Json {
        json!({
            "metadata": {
                "version": self.metadata.version,
                "generated_at": self.metadata.generated_at.to_rfc3339(),
                "generator": self.metadata.generator,
                "mode": self.metadata.mode.as_str(),
            },
            "changes": self.changes.iter().map(PlannedChange::to_json).collect::<Vec<_>>(),
            "execution_order": self.execution_order,
            "summary": self.summary.to_json(),
            "warnings": self.warnings.iter().map(|w| json!({"change_id": w.change_id, "message": w.message})).collect::<Vec<_>>(),
        })
    }
}
