//! Moniker-filter construction (spec §4.1: "build a 'moniker filter'
//! (typically `name=...` plus the system 'managed' label)").

use crate::config::types::DesiredResource;
use crate::state::client::MonikerFilter;

pub fn managed_filter(resource: &DesiredResource) -> MonikerFilter {
    let mut filter = MonikerFilter::by_name(resource.envelope.name.clone());
    filter.extra.insert("managed".to_string(), "true".to_string());
    filter
}
