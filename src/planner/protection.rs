//! Protected-resource enforcement (spec §4.2 "Protection enforcement",
//! §9 "Protection accumulation"): violations are collected across a whole
//! per-type planner pass and reported together, not on first occurrence.

use crate::config::types::ResourceKind;
use crate::planner::types::{Action, Protection};

/// One attempted modify/delete of a protected managed resource.
#[derive(Debug, Clone)]
pub struct ProtectionViolation {
    pub resource_type: ResourceKind,
    pub ref_: String,
    pub name: String,
    pub action: &'static str,
}

/// Accumulates violations across a per-type planner's pass over its
/// resources so they can be reported together (spec §9).
#[derive(Debug, Default)]
pub struct ProtectionGuard {
    violations: Vec<ProtectionViolation>,
}

impl ProtectionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation unless `protection` is the one carve-out the spec
    /// allows: a pure protection-removal UPDATE with no other field changes
    /// (spec §4.2, §3.2 invariant).
    pub fn check(
        &mut self,
        resource_type: ResourceKind,
        ref_: impl Into<String>,
        name: impl Into<String>,
        action: Action,
        currently_protected: bool,
        protection: Option<Protection>,
    ) {
        self.check_with_other_fields(resource_type, ref_, name, action, currently_protected, protection, false)
    }

    /// Like `check`, but lets the caller report whether the UPDATE carries
    /// field changes beyond the identifying key and the protection flag
    /// itself — a pure-unprotect UPDATE only escapes the violation when no
    /// such changes are present (spec §3.2: "Fields contains only the
    /// identifying key").
    pub fn check_with_other_fields(
        &mut self,
        resource_type: ResourceKind,
        ref_: impl Into<String>,
        name: impl Into<String>,
        action: Action,
        currently_protected: bool,
        protection: Option<Protection>,
        other_fields_changed: bool,
    ) {
        if !currently_protected {
            return;
        }
        if let Some(p) = protection {
            if p.is_pure_unprotect() && !other_fields_changed {
                return;
            }
        }
        let action_label = match action {
            Action::Create => "created",
            Action::Update => "updated",
            Action::Delete => "deleted",
            Action::ExternalTool => "modified",
        };
        self.violations.push(ProtectionViolation {
            resource_type,
            ref_: ref_.into(),
            name: name.into(),
            action: action_label,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn into_violations(self) -> Vec<ProtectionViolation> {
        self.violations
    }

    pub fn extend(&mut self, other: ProtectionGuard) {
        self.violations.extend(other.violations);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_unprotect_is_not_a_violation() {
        let mut guard = ProtectionGuard::new();
        guard.check(
            ResourceKind::Portal,
            "legacy",
            "legacy",
            Action::Update,
            true,
            Some(Protection::Update { old: true, new: false }),
        );
        assert!(guard.is_empty());
    }

    #[test]
    fn delete_of_protected_resource_is_a_violation() {
        let mut guard = ProtectionGuard::new();
        guard.check(ResourceKind::Portal, "legacy", "legacy", Action::Delete, true, None);
        assert!(!guard.is_empty());
        let violations = guard.into_violations();
        assert_eq!(violations[0].action, "deleted");
    }
}
