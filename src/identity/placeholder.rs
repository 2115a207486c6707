//! First-class wrapper for `__REF_PLACEHOLDER__<ref>#<field>` values (spec
//! §6.4, design note in §9: "keep as a first-class wrapper value, not a
//! parsed string at every use site").

use std::fmt;

use crate::error::{Error, Result};

pub const PLACEHOLDER_PREFIX: &str = "__REF_PLACEHOLDER__";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefPlaceholder {
    pub ref_: String,
    pub field: String,
}

impl RefPlaceholder {
    /// Parse a raw string as a placeholder. Returns `None` if it isn't one.
    /// A placeholder whose field isn't `id` is a fatal validation error
    /// (spec §6.4: "Only `#id` is supported. Any other field is a fatal
    /// validation error.").
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        let Some(rest) = raw.strip_prefix(PLACEHOLDER_PREFIX) else {
            return Ok(None);
        };
        let Some((ref_, field)) = rest.split_once('#') else {
            return Err(Error::config(format!(
                "malformed reference placeholder {:?}: missing '#field'",
                raw
            )));
        };
        if field != "id" {
            return Err(Error::config(format!(
                "unsupported reference placeholder field {:?} in {:?}: only \"#id\" is supported",
                field, raw
            )));
        }
        Ok(Some(Self {
            ref_: ref_.to_string(),
            field: field.to_string(),
        }))
    }

    pub fn is_placeholder(raw: &str) -> bool {
        raw.starts_with(PLACEHOLDER_PREFIX)
    }
}

impl fmt::Display for RefPlaceholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}#{}", PLACEHOLDER_PREFIX, self.ref_, self.field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_placeholder() {
        let p = RefPlaceholder::parse("__REF_PLACEHOLDER__basic#id")
            .unwrap()
            .unwrap();
        assert_eq!(p.ref_, "basic");
        assert_eq!(p.field, "id");
        assert_eq!(p.to_string(), "__REF_PLACEHOLDER__basic#id");
    }

    #[test]
    fn non_placeholder_strings_are_none() {
        assert!(RefPlaceholder::parse("basic").unwrap().is_none());
        assert!(RefPlaceholder::parse("plain-uuid-1234").unwrap().is_none());
    }

    #[test]
    fn unsupported_field_is_fatal() {
        let err = RefPlaceholder::parse("__REF_PLACEHOLDER__basic#name").unwrap_err();
        assert!(err.to_string().contains("only \"#id\" is supported"));
    }
}
