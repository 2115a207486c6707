//! Application auth strategy planner (spec §4.2 "Auth strategy typed
//! config"): flat resource kind plus typed key-auth / openid-connect diff
//! rules.

use tokio_util::sync::CancellationToken;

use crate::config::types::{ResourceKind, ResourceSet};
use crate::error::Result;
use crate::planner::common::plan_flat_kind;
use crate::planner::protection::ProtectionGuard;
use crate::planner::types::{Mode, PlannedChange};
use crate::state::client::StateClient;

/// Fields that identify the subtype's opaque credential secrets. When
/// configured, these are always carried into an UPDATE rather than being
/// sparse-diffed against the (never-returned) server value (spec §4.2:
/// "credential secrets...are treated as opaque and, when configured, always
/// included in UPDATE").
const OPAQUE_SECRET_FIELDS: &[&str] = &["configs.openid_connect.client_secret"];

pub async fn plan(
    resource_set: &ResourceSet,
    client: &dyn StateClient,
    mode: Mode,
    namespace_filter: &str,
    cancel: &CancellationToken,
    counter: &mut usize,
) -> Result<(Vec<PlannedChange>, ProtectionGuard)> {
    let (mut changes, guard) = plan_flat_kind(
        ResourceKind::ApplicationAuthStrategy,
        resource_set,
        client,
        mode,
        namespace_filter,
        &["name"],
        cancel,
        counter,
    )
    .await?;

    // `sparse_diff` already matched `configs.*` leaf keys against current
    // state for normal fields; opaque secrets never round-trip from the
    // server so any desired-configured value is forced through regardless
    // of what the sparse diff concluded.
    for change in &mut changes {
        for key in OPAQUE_SECRET_FIELDS {
            if let Some(ref_) = resource_set.find_by_ref_and_kind(&change.resource_ref, ResourceKind::ApplicationAuthStrategy) {
                if let Some(value) = ref_.fields.get(*key) {
                    change.fields.entry((*key).to_string()).or_insert_with(|| value.clone());
                }
            }
        }
    }

    Ok((changes, guard))
}
