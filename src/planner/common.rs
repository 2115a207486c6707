//! Shared per-type-planner machinery (spec §4.2 "Shared shape"): listing
//! current state, indexing by natural key, and the CREATE/UPDATE/DELETE
//! sweep every flat (childless) kind follows identically.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use crate::config::types::{DesiredResource, ResourceKind, ResourceSet};
use crate::error::{Error, Result};
use crate::identity::moniker;
use crate::identity::placeholder::RefPlaceholder;
use crate::planner::diff::sparse_diff;
use crate::planner::protection::ProtectionGuard;
use crate::planner::types::{temp_change_id, Action, Mode, PlannedChange, Protection, ReferenceInfo};
use crate::state::client::{StateClient, StateResource};

/// Index current managed resources of `kind` by their natural key (name),
/// per spec §4.2 step 2.
pub fn index_by_name(current: &[StateResource]) -> HashMap<&str, &StateResource> {
    current.iter().map(|r| (r.name.as_str(), r)).collect()
}

/// The CREATE/UPDATE/DELETE sweep shared by every flat resource kind with no
/// children (auth strategies, control planes, catalog services): spec §4.2
/// "Shared shape" steps 1-4.
pub async fn plan_flat_kind(
    kind: ResourceKind,
    resource_set: &ResourceSet,
    client: &dyn StateClient,
    mode: Mode,
    namespace_filter: &str,
    identifying_keys: &[&str],
    cancel: &CancellationToken,
    counter: &mut usize,
) -> Result<(Vec<PlannedChange>, ProtectionGuard)> {
    let current = client.list_managed(kind, namespace_filter, cancel).await?;
    let by_name = index_by_name(&current);
    let mut changes = Vec::new();
    let mut guard = ProtectionGuard::new();
    let mut seen_names = std::collections::HashSet::new();

    for desired in resource_set.by_kind(kind) {
        if !seen_names.insert(desired.envelope.name.clone()) {
            return Err(Error::config(format!(
                "duplicate {} name {:?} in desired configuration",
                kind, desired.envelope.name
            )));
        }

        match by_name.get(desired.envelope.name.as_str()) {
            None => changes.push(create_change(kind, desired, counter)?),
            Some(state) => {
                if let Some(change) =
                    diff_existing(kind, desired, state, identifying_keys, &mut guard, counter)?
                {
                    changes.push(change);
                }
            }
        }
    }

    if mode == Mode::Sync {
        for state in &current {
            if !resource_set
                .by_kind(kind)
                .any(|d| d.envelope.name == state.name)
            {
                guard.check(kind, state.name.clone(), state.name.clone(), Action::Delete, state.protected, None);
                changes.push(delete_change(kind, state, counter));
            }
        }
    }

    Ok((changes, guard))
}

pub fn create_change(kind: ResourceKind, desired: &DesiredResource, counter: &mut usize) -> Result<PlannedChange> {
    let id = temp_change_id(next(counter), Action::Create, kind, &desired.envelope.ref_);
    let mut change = PlannedChange::new(id, kind, desired.envelope.ref_.clone(), Action::Create, desired.envelope.namespace.clone());
    change.fields = desired.fields.clone();
    change.protection = Some(Protection::Create(desired.envelope.protected));
    extract_placeholder_references(&mut change)?;
    Ok(change)
}

/// Scan `change.fields` for values holding a `__REF_PLACEHOLDER__<ref>#id`
/// string (spec §6.4) and lift each one out into `change.references`, so the
/// Reference Binder (spec §4.3) can resolve it instead of the literal
/// placeholder text reaching the executor. Any field configured this way —
/// not just the handful of dedicated parent/service-ref fields each planner
/// already wires by hand — is covered, e.g. a portal's
/// `default_application_auth_strategy_id`.
pub fn extract_placeholder_references(change: &mut PlannedChange) -> Result<()> {
    let mut found = Vec::new();
    for (field, value) in change.fields.iter() {
        if let Some(raw) = value.as_str() {
            if let Some(placeholder) = RefPlaceholder::parse(raw)? {
                found.push((field.clone(), placeholder.ref_));
            }
        }
    }
    for (field, ref_) in found {
        change.fields.shift_remove(&field);
        change.references.insert(field, ReferenceInfo::scalar(ref_));
    }
    Ok(())
}

pub fn diff_existing(
    kind: ResourceKind,
    desired: &DesiredResource,
    state: &StateResource,
    identifying_keys: &[&str],
    guard: &mut ProtectionGuard,
    counter: &mut usize,
) -> Result<Option<PlannedChange>> {
    let (mut needs_update, mut fields) = sparse_diff(&desired.fields, &state.fields, identifying_keys);
    let other_fields_changed = needs_update;
    let protection_changed = desired.envelope.protected != state.protected;
    let protection = if protection_changed {
        Some(Protection::Update {
            old: state.protected,
            new: desired.envelope.protected,
        })
    } else {
        None
    };
    if protection_changed {
        needs_update = true;
        for key in identifying_keys {
            if let Some(v) = desired.fields.get(*key) {
                fields.entry((*key).to_string()).or_insert_with(|| v.clone());
            }
        }
    }
    if !needs_update {
        return Ok(None);
    }

    guard.check_with_other_fields(
        kind,
        desired.envelope.ref_.clone(),
        desired.envelope.name.clone(),
        Action::Update,
        state.protected,
        protection,
        other_fields_changed,
    );

    let id = temp_change_id(next(counter), Action::Update, kind, &desired.envelope.ref_);
    let mut change = PlannedChange::new(id, kind, desired.envelope.ref_.clone(), Action::Update, desired.envelope.namespace.clone());
    change.resource_id = state.id.clone();
    change.fields = fields;
    change.protection = protection;
    extract_placeholder_references(&mut change)?;
    Ok(Some(change))
}

pub fn delete_change(kind: ResourceKind, state: &StateResource, counter: &mut usize) -> PlannedChange {
    let id = temp_change_id(next(counter), Action::Delete, kind, &state.name);
    let mut change = PlannedChange::new(id, kind, state.name.clone(), Action::Delete, state.namespace.clone());
    change.resource_id = state.id.clone();
    change.fields.insert("name".to_string(), serde_json::Value::String(state.name.clone()));
    change
}

pub fn next(counter: &mut usize) -> usize {
    let value = *counter;
    *counter += 1;
    value
}

/// Build the moniker filter used to discover whether a managed resource
/// already exists under a given parent (spec §4.1).
pub fn parent_scoped_filter(desired: &DesiredResource) -> crate::state::client::MonikerFilter {
    moniker::managed_filter(desired)
}
