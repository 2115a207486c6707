//! Error taxonomy for the planner (spec §7).
//!
//! Every variant keeps the context the spec calls out (resource ref, kind,
//! namespace, cycle participants...) as structured fields rather than a
//! single formatted string, so callers and tests can match on the variant.

use thiserror::Error;

use crate::dag::toposort::CycleReport;
use crate::planner::protection::ProtectionViolation;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or self-inconsistent desired configuration.
    #[error("{message}")]
    Config { message: String },

    /// An external resource, or a reference placeholder, could not be resolved.
    #[error("{message}")]
    Resolution { message: String },

    /// One or more protected managed resources would be modified or deleted.
    #[error("{}", format_protection_violations(.violations))]
    Protection {
        violations: Vec<ProtectionViolation>,
    },

    /// A cycle was detected while topologically ordering the change DAG.
    #[error("circular dependency detected: {}", .report)]
    Dependency { report: CycleReport },

    /// The external deck tool failed, returned invalid output, or reported errors.
    #[error("{message}")]
    ExternalTool { message: String },

    /// The upstream state client failed.
    #[error("{message}")]
    Client {
        message: String,
        /// Sentinel used by callers to degrade gracefully (e.g. "assume create").
        client_type: Option<&'static str>,
    },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        Error::Resolution {
            message: message.into(),
        }
    }

    pub fn external_tool(message: impl Into<String>) -> Self {
        Error::ExternalTool {
            message: message.into(),
        }
    }

    pub fn client(message: impl Into<String>, client_type: Option<&'static str>) -> Self {
        Error::Client {
            message: message.into(),
            client_type,
        }
    }

    /// True when this error carries the given client-type sentinel — used to
    /// degrade singleton-child planning to "assume create" (spec §9).
    pub fn is_client_type(&self, needle: &str) -> bool {
        matches!(self, Error::Client { client_type: Some(t), .. } if *t == needle)
    }
}

fn format_protection_violations(violations: &[ProtectionViolation]) -> String {
    let mut out = String::new();
    out.push_str("planning failed: the following resources are protected\n");
    for v in violations {
        out.push_str(&format!(
            "  - {} \"{}\" is protected and cannot be {} (ref: {})\n",
            v.resource_type, v.name, v.action, v.ref_
        ));
    }
    out.push_str("set `protected: false` on these resources first");
    out
}

pub type Result<T> = std::result::Result<T, Error>;
