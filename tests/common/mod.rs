//! Shared test doubles: an in-memory `StateClient` and a scripted
//! `DeckRunner`, playing the role the teacher's `state/store.rs` in-memory
//! backend plays for its own integration tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use kongplan::config::types::{Fields, ResourceKind};
use kongplan::error::Result;
use kongplan::external_tool::deck::{DeckRunOptions, DeckRunOutput, DeckRunner};
use kongplan::state::client::{MonikerFilter, Selector, StateClient, StateResource};

/// An in-memory snapshot of "live" Konnect state, queried the same way the
/// real REST client would be by every planner stage.
#[derive(Default)]
pub struct FakeStateClient {
    resources: Vec<StateResource>,
}

impl FakeStateClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resource: StateResource) -> Self {
        self.resources.push(resource);
        self
    }
}

fn namespace_matches(filter: &str, namespace: &str) -> bool {
    filter == "*" || filter.split(',').any(|n| n == namespace)
}

#[async_trait]
impl StateClient for FakeStateClient {
    async fn list_managed(
        &self,
        kind: ResourceKind,
        namespace_filter: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<StateResource>> {
        Ok(self
            .resources
            .iter()
            .filter(|r| r.kind == kind && namespace_matches(namespace_filter, &r.namespace))
            .cloned()
            .collect())
    }

    async fn list_all(&self, kind: ResourceKind, _cancel: &CancellationToken) -> Result<Vec<StateResource>> {
        Ok(self.resources.iter().filter(|r| r.kind == kind).cloned().collect())
    }

    async fn get_by_id(
        &self,
        kind: ResourceKind,
        id: &str,
        _cancel: &CancellationToken,
    ) -> Result<Option<StateResource>> {
        Ok(self
            .resources
            .iter()
            .find(|r| r.kind == kind && r.id == id)
            .cloned())
    }

    async fn get_by_filter(
        &self,
        kind: ResourceKind,
        filter: &MonikerFilter,
        _cancel: &CancellationToken,
    ) -> Result<Option<StateResource>> {
        Ok(self
            .resources
            .iter()
            .find(|r| r.kind == kind && filter.name.as_deref() == Some(r.name.as_str()))
            .cloned())
    }

    async fn get_by_selector(
        &self,
        kind: ResourceKind,
        selector: &Selector,
        _cancel: &CancellationToken,
    ) -> Result<Vec<StateResource>> {
        let Some(name) = selector.match_fields.get("name") else {
            return Ok(Vec::new());
        };
        Ok(self
            .resources
            .iter()
            .filter(|r| r.kind == kind && &r.name == name)
            .cloned()
            .collect())
    }

    async fn list_children(
        &self,
        kind: ResourceKind,
        parent_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<StateResource>> {
        Ok(self
            .resources
            .iter()
            .filter(|r| r.kind == kind && r.parent_id.as_deref() == Some(parent_id))
            .cloned()
            .collect())
    }

    async fn list_team_roles(
        &self,
        _portal_id: &str,
        team_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<StateResource>> {
        Ok(self
            .resources
            .iter()
            .filter(|r| r.kind == ResourceKind::PortalTeamRole && r.parent_id.as_deref() == Some(team_id))
            .cloned()
            .collect())
    }

    async fn get_singleton(
        &self,
        kind: ResourceKind,
        parent_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<Option<StateResource>> {
        Ok(self
            .resources
            .iter()
            .find(|r| r.kind == kind && r.parent_id.as_deref() == Some(parent_id))
            .cloned())
    }

    async fn get_page_content(
        &self,
        page_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<Option<Fields>> {
        Ok(self
            .resources
            .iter()
            .find(|r| r.kind == ResourceKind::PortalPage && r.id == page_id)
            .map(|r| r.fields.clone()))
    }

    async fn control_plane_name(&self, id: &str, _cancel: &CancellationToken) -> Result<Option<String>> {
        Ok(self
            .resources
            .iter()
            .find(|r| r.kind == ResourceKind::ControlPlane && r.id == id)
            .map(|r| r.name.clone()))
    }
}

/// Builds a `StateResource` fixture with sensible defaults.
pub fn state_resource(kind: ResourceKind, id: &str, name: &str) -> StateResource {
    StateResource {
        id: id.to_string(),
        kind,
        name: name.to_string(),
        namespace: "default".to_string(),
        protected: false,
        normalized_labels: HashMap::new(),
        fields: Fields::new(),
        parent_id: None,
    }
}

/// A `DeckRunner` double that returns one scripted output per call, in
/// order, and records the options it was invoked with.
pub struct FakeDeckRunner {
    outputs: Mutex<Vec<DeckRunOutput>>,
    calls: Mutex<Vec<DeckRunOptions>>,
}

impl FakeDeckRunner {
    pub fn new(outputs: Vec<DeckRunOutput>) -> Self {
        Self {
            outputs: Mutex::new(outputs),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl DeckRunner for FakeDeckRunner {
    async fn run(&self, options: DeckRunOptions, _cancel: &CancellationToken) -> Result<DeckRunOutput> {
        self.calls.lock().unwrap().push(options);
        let mut outputs = self.outputs.lock().unwrap();
        if outputs.is_empty() {
            return Ok(DeckRunOutput {
                stdout: r#"{"summary":{"creating":0,"updating":0,"deleting":0,"total":0},"errors":[]}"#.to_string(),
                ..Default::default()
            });
        }
        Ok(outputs.remove(0))
    }
}

pub fn deck_output(creating: u64, updating: u64, deleting: u64) -> DeckRunOutput {
    let total = creating + updating + deleting;
    DeckRunOutput {
        stdout: format!(
            r#"{{"summary":{{"creating":{creating},"updating":{updating},"deleting":{deleting},"total":{total}}},"errors":[]}}"#
        ),
        stderr: String::new(),
        exit_code: 0,
    }
}
