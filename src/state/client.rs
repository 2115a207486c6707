//! `StateClient` — the read-only interface the planner consumes to learn
//! live Konnect state (spec §6.1). The REST implementation lives outside
//! this crate; only the trait and the shapes it returns belong here.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::types::{Fields, Labels, ResourceKind};
use crate::error::Result;

/// The live side of a resource — parallel shape to `DesiredResource` but
/// always carries a server ID and `normalized_labels` (spec §3.1).
#[derive(Debug, Clone)]
pub struct StateResource {
    pub id: String,
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: String,
    pub protected: bool,
    /// System labels merged with user labels, as the server reports them.
    pub normalized_labels: Labels,
    pub fields: Fields,
    pub parent_id: Option<String>,
}

/// A moniker filter — typically `name=...` plus the "managed" system label
/// (spec §4.1, Glossary "Moniker filter").
#[derive(Debug, Clone, Default)]
pub struct MonikerFilter {
    pub name: Option<String>,
    pub extra: Labels,
}

impl MonikerFilter {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            extra: Labels::new(),
        }
    }
}

/// A selector used to match `_external` resources (spec §3.1). Only the
/// `name` key is currently supported (spec §4.1).
#[derive(Debug, Clone)]
pub struct Selector {
    pub match_fields: Labels,
}

/// Read-only interface to Konnect's live state, consumed by every planner
/// stage. One implementation talks to the real REST API; tests substitute
/// an in-memory fake.
#[async_trait]
pub trait StateClient: Send + Sync {
    /// List managed resources of `kind`, restricted to `namespace_filter`
    /// (`"*"` means all namespaces — spec §4.2 step 1).
    async fn list_managed(
        &self,
        kind: ResourceKind,
        namespace_filter: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<StateResource>>;

    /// List every resource of `kind`, managed or not — used for external
    /// matching (spec §4.1).
    async fn list_all(&self, kind: ResourceKind, cancel: &CancellationToken) -> Result<Vec<StateResource>>;

    async fn get_by_id(
        &self,
        kind: ResourceKind,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<StateResource>>;

    /// Match a single resource by moniker filter (spec §4.1 "Managed
    /// resources").
    async fn get_by_filter(
        &self,
        kind: ResourceKind,
        filter: &MonikerFilter,
        cancel: &CancellationToken,
    ) -> Result<Option<StateResource>>;

    /// Match `_external` resources by selector (spec §4.1).
    async fn get_by_selector(
        &self,
        kind: ResourceKind,
        selector: &Selector,
        cancel: &CancellationToken,
    ) -> Result<Vec<StateResource>>;

    /// Children of a parent, for kinds that are listed per-parent rather
    /// than globally (portal pages/snippets/teams/roles/email-templates,
    /// gateway services, event-gateway listeners/backend clusters...).
    async fn list_children(
        &self,
        kind: ResourceKind,
        parent_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<StateResource>>;

    /// Team roles are scoped by both portal and team (spec §6.1).
    async fn list_team_roles(
        &self,
        portal_id: &str,
        team_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<StateResource>>;

    /// Fetch a singleton child by its parent's ID (spec §4.2 "Singleton
    /// children": "fetched by a GET-on-parent operation, not by listing").
    /// `Ok(None)` means "not configured yet" — callers degrade to "assume
    /// create" per spec §9.
    async fn get_singleton(
        &self,
        kind: ResourceKind,
        parent_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<StateResource>>;

    /// Full content of a single portal page, fetched by ID for the
    /// content-level diff (spec §4.2 "Portal pages").
    async fn get_page_content(
        &self,
        page_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Fields>>;

    /// Resolve a control plane's canonical name from its ID (spec §4.2
    /// "Deck external-tool step").
    async fn control_plane_name(&self, id: &str, cancel: &CancellationToken) -> Result<Option<String>>;
}
