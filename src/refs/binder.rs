//! Reference Binder (spec §4.3): resolves symbolic refs into concrete IDs
//! or `[unknown]` markers, and records the warnings the executor surfaces.

use std::collections::HashMap;

use crate::planner::types::{Action, PlannedChange, Warning, UNKNOWN_ID};

/// Ref name -> change ID of its CREATE, across every resource kind. Ref
/// names are chosen by the author of the desired document and are, in
/// practice, unique across the whole document (not just within one kind),
/// which is what lets a reference be bound without first knowing its
/// target's resource kind.
fn create_index(changes: &[PlannedChange]) -> HashMap<String, String> {
    changes
        .iter()
        .filter(|c| c.action == Action::Create)
        .map(|c| (c.resource_ref.clone(), c.id.clone()))
        .collect()
}

/// Bind every unresolved reference in `changes`, mutating them in place.
/// Returns the warnings attached to the plan (spec §4.3).
pub fn bind(changes: &mut [PlannedChange]) -> Vec<Warning> {
    let creates = create_index(changes);
    let mut warnings = Vec::new();

    for change in changes.iter_mut() {
        let change_id = change.id.clone();
        for (field, reference) in change.references.iter_mut() {
            if reference.is_array {
                for i in 0..reference.refs.len() {
                    let resolved = reference.resolved_ids.get(i).cloned().flatten();
                    if resolved.is_some() {
                        continue;
                    }
                    let ref_name = &reference.refs[i];
                    if creates.contains_key(ref_name) {
                        if i >= reference.resolved_ids.len() {
                            reference.resolved_ids.resize(reference.refs.len(), None);
                        }
                        reference.resolved_ids[i] = Some(UNKNOWN_ID.to_string());
                        warnings.push(Warning {
                            change_id: change_id.clone(),
                            message: format!(
                                "Reference {field}[{i}]={ref_name} will be resolved during execution"
                            ),
                        });
                    }
                    // Unresolved and not found: left empty, bound at
                    // execution time by lookup_arrays natural key.
                }
            } else if reference.id.is_none() {
                if let Some(ref_name) = reference.ref_.clone() {
                    if creates.contains_key(&ref_name) {
                        reference.id = Some(UNKNOWN_ID.to_string());
                        warnings.push(Warning {
                            change_id: change_id.clone(),
                            message: format!(
                                "Reference {field}={ref_name} will be resolved during execution"
                            ),
                        });
                    }
                    // Unresolved and not found: left empty, bound at
                    // execution time by lookup_fields natural key.
                }
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::ResourceKind;
    use crate::planner::types::{temp_change_id, ReferenceInfo};

    #[test]
    fn binds_a_forward_reference_to_unknown() {
        let auth_id = temp_change_id(0, Action::Create, ResourceKind::ApplicationAuthStrategy, "basic");
        let portal_id = temp_change_id(1, Action::Create, ResourceKind::Portal, "dev");

        let auth = PlannedChange::new(
            auth_id,
            ResourceKind::ApplicationAuthStrategy,
            "basic",
            Action::Create,
            "default",
        );
        let mut portal = PlannedChange::new(portal_id.clone(), ResourceKind::Portal, "dev", Action::Create, "default");
        portal
            .references
            .insert("default_application_auth_strategy_id".into(), ReferenceInfo::scalar("basic"));

        let mut changes = vec![auth, portal];
        let warnings = bind(&mut changes);

        let bound = changes[1]
            .references
            .get("default_application_auth_strategy_id")
            .unwrap();
        assert_eq!(bound.id.as_deref(), Some(UNKNOWN_ID));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].change_id, portal_id);
    }
}
