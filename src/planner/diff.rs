//! Generic sparse field-level diffing shared by every per-type planner
//! (spec §4.2 "Sparse update rule").

use crate::config::types::{strip_system_labels, Fields, Labels};

/// Compare `desired` against `current`, field by field. Only fields the
/// caller configured (i.e. present in `desired`) ever participate — unset
/// optional fields never drive an update, so server-assigned defaults never
/// cause churn. `identifying_keys` are always carried into the result when
/// any other field changed, so the executor can target the resource.
///
/// Returns `(needs_update, fields)`.
pub fn sparse_diff(desired: &Fields, current: &Fields, identifying_keys: &[&str]) -> (bool, Fields) {
    let mut changed = Fields::new();
    for (key, desired_value) in desired {
        if identifying_keys.contains(&key.as_str()) {
            continue;
        }
        let differs = match current.get(key) {
            Some(current_value) => current_value != desired_value,
            None => true,
        };
        if differs {
            changed.insert(key.clone(), desired_value.clone());
        }
    }

    if changed.is_empty() {
        return (false, Fields::new());
    }

    let mut fields = Fields::new();
    for key in identifying_keys {
        if let Some(value) = desired.get(*key) {
            fields.insert((*key).to_string(), value.clone());
        }
    }
    fields.extend(changed);
    (true, fields)
}

/// Labels compare equal after system-reserved keys are stripped from both
/// sides (spec §4.2).
pub fn labels_differ(desired: &Labels, current: &Labels) -> bool {
    strip_system_labels(desired) != strip_system_labels(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ignores_server_assigned_defaults() {
        let mut desired = Fields::new();
        desired.insert("name".into(), json!("dev"));
        desired.insert("description".into(), json!("New"));

        let mut current = Fields::new();
        current.insert("name".into(), json!("dev"));
        current.insert("description".into(), json!("Old"));
        current.insert("auto_approve_developers".into(), json!(true));

        let (needs_update, fields) = sparse_diff(&desired, &current, &["name"]);
        assert!(needs_update);
        assert_eq!(fields.get("description").unwrap(), &json!("New"));
        assert!(!fields.contains_key("auto_approve_developers"));
        assert_eq!(fields.get("name").unwrap(), &json!("dev"));
    }

    #[test]
    fn identical_fields_produce_no_update() {
        let mut desired = Fields::new();
        desired.insert("name".into(), json!("dev"));
        let current = desired.clone();
        let (needs_update, fields) = sparse_diff(&desired, &current, &["name"]);
        assert!(!needs_update);
        assert!(fields.is_empty());
    }
}
