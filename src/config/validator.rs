//! Structural validation of the raw document (spec §4.6 `[ADDED]`): ref
//! uniqueness within a kind, `_external` resources carrying exactly one of
//! `id`/`selector` (the `RawExternal` enum already makes that structurally
//! impossible to violate in well-formed YAML, this catches the
//! impossible-in-the-type-but-not-in-YAML case of an empty `_external: {}`
//! block failing to deserialize with a clear message), and selector
//! `matchFields` restricted to the one supported key — grounded on
//! `config/validator.rs`'s `validate_module_references` pattern of walking
//! the raw config and failing fast with a descriptive message before the
//! planner ever sees it.

use std::collections::HashSet;

use crate::config::raw::{RawDocument, RawExternal, RawResource};
use crate::error::{Error, Result};

pub fn validate(doc: &RawDocument) -> Result<()> {
    validate_kind(&doc.portals, "portal")?;
    validate_kind(&doc.application_auth_strategies, "application_auth_strategy")?;
    validate_kind(&doc.control_planes, "control_plane")?;
    validate_kind(&doc.catalog_services, "catalog_service")?;
    validate_kind(&doc.gateway_services, "gateway_service")?;
    validate_kind(&doc.apis, "api")?;
    validate_kind(&doc.event_gateways, "event_gateway")?;
    Ok(())
}

/// Ref uniqueness within one kind (spec §3.2), and `_external` selector
/// field restrictions (spec §4.1: "Currently supported selector key:
/// `name`").
fn validate_kind(resources: &[RawResource], kind_name: &str) -> Result<()> {
    let mut seen_refs = HashSet::new();
    for resource in resources {
        if !seen_refs.insert(resource.ref_.as_str()) {
            return Err(Error::config(format!(
                "duplicate ref {:?} among desired {} resources",
                resource.ref_, kind_name
            )));
        }
        if let Some(RawExternal::Selector { selector }) = &resource.external {
            let unsupported: Vec<&str> = selector
                .match_fields
                .keys()
                .map(String::as_str)
                .filter(|k| *k != "name")
                .collect();
            if !unsupported.is_empty() {
                return Err(Error::config(format!(
                    "{} {:?}: unsupported external selector field(s) {:?}, only \"name\" is supported",
                    kind_name, resource.ref_, unsupported
                )));
            }
        }
    }
    Ok(())
}
