//! Per-control-plane list cache for gateway services (spec §5 "Shared
//! resources": "cached per-control-plane within one planning run ... caches
//! are single-threaded").

use std::cell::RefCell;
use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use crate::config::types::ResourceKind;
use crate::error::Result;
use crate::state::client::{StateClient, StateResource};

/// Caches `list_children(GatewayService, cp_id)` results for the lifetime of
/// one planning run. Not `Send`/`Sync` on purpose — the planner never runs
/// two stages concurrently (spec §5), so a `RefCell` is enough and cheaper
/// than `dashmap::DashMap`, which `so0k-oxid` reaches for only because its
/// executor genuinely runs nodes in parallel.
#[derive(Default)]
pub struct GatewayServiceCache {
    by_cp: RefCell<HashMap<String, Vec<StateResource>>>,
}

impl GatewayServiceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn list(
        &self,
        client: &dyn StateClient,
        control_plane_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<StateResource>> {
        if let Some(hit) = self.by_cp.borrow().get(control_plane_id) {
            return Ok(hit.clone());
        }
        let services = client
            .list_children(ResourceKind::GatewayService, control_plane_id, cancel)
            .await?;
        self.by_cp
            .borrow_mut()
            .insert(control_plane_id.to_string(), services.clone());
        Ok(services)
    }
}
