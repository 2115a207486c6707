//! Catalog service planner (spec §4.2): a flat resource kind.

use tokio_util::sync::CancellationToken;

use crate::config::types::{ResourceKind, ResourceSet};
use crate::error::Result;
use crate::planner::common::plan_flat_kind;
use crate::planner::protection::ProtectionGuard;
use crate::planner::types::{Mode, PlannedChange};
use crate::state::client::StateClient;

pub async fn plan(
    resource_set: &ResourceSet,
    client: &dyn StateClient,
    mode: Mode,
    namespace_filter: &str,
    cancel: &CancellationToken,
    counter: &mut usize,
) -> Result<(Vec<PlannedChange>, ProtectionGuard)> {
    plan_flat_kind(
        ResourceKind::CatalogService,
        resource_set,
        client,
        mode,
        namespace_filter,
        &["name"],
        cancel,
        counter,
    )
    .await
}
