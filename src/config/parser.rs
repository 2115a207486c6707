//! YAML parsing into the raw document tree (spec §4.6 `[ADDED]`), grounded
//! on `config/parser.rs`'s `parse_config`/`merge_yaml_files` pair.

use crate::config::raw::RawDocument;
use crate::error::{Error, Result};

/// Parse a single YAML document's contents.
pub fn parse_document(content: &str) -> Result<RawDocument> {
    serde_yaml::from_str(content)
        .map_err(|e| Error::config(format!("failed to parse YAML configuration: {e}")))
}

/// Parse and merge several fragment files into one document, in the order
/// given (spec §4.6: "directory of fragments").
pub fn parse_and_merge(contents: &[(std::path::PathBuf, String)]) -> Result<RawDocument> {
    let mut merged = RawDocument::default();
    for (path, content) in contents {
        let doc = parse_document(content)
            .map_err(|_| Error::config(format!("failed to parse YAML configuration in {}", path.display())))?;
        merged.merge(doc);
    }
    Ok(merged)
}
