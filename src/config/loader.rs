//! Directory/file discovery for the desired-state document (spec §4.6
//! `[ADDED]`), grounded on `config/loader.rs`'s `load_workspace` and
//! `config/parser.rs`'s `find_yaml_files`/`load_from_directory` — simplified
//! to the single YAML format Konnect declarative config uses (no HCL/YAML
//! dual-mode, that's specific to `so0k-oxid`'s own Terraform-shaped input).

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::parser::parse_and_merge;
use crate::config::types::ResourceSet;
use crate::config::validator::validate;
use crate::config::lower::lower;
use crate::error::{Error, Result};

/// Load a desired `ResourceSet` from `path`: a single YAML file, or a
/// directory of `*.yaml`/`*.yml` fragments merged in sorted filename order.
pub fn load(path: &Path) -> Result<ResourceSet> {
    let files = discover(path)?;
    if files.is_empty() {
        return Err(Error::config(format!(
            "no .yaml/.yml configuration found at {}",
            path.display()
        )));
    }

    let contents: Vec<(PathBuf, String)> = files
        .into_iter()
        .map(|p| {
            let content = fs::read_to_string(&p)
                .map_err(|e| Error::config(format!("failed to read {}: {e}", p.display())))?;
            Ok((p, content))
        })
        .collect::<Result<_>>()?;

    let raw = parse_and_merge(&contents)?;
    validate(&raw)?;
    lower(raw)
}

fn discover(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(Error::config(format!("{} does not exist", path.display())));
    }

    let mut files: Vec<PathBuf> = fs::read_dir(path)
        .map_err(|e| Error::config(format!("failed to read directory {}: {e}", path.display())))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.is_file()
                && matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
        })
        .collect();
    files.sort();
    Ok(files)
}
