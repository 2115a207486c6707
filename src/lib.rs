//! `kongplan` — the declarative planner at the core of a Kong Konnect
//! management CLI: compares a desired `ResourceSet` against live state
//! retrieved through a `StateClient` and produces an ordered,
//! dependency-resolved `Plan` of CREATE/UPDATE/DELETE/EXTERNAL_TOOL
//! changes (spec §1-§2).
//!
//! Configuration loading, the REST state client, the executor that
//! applies a plan, and CLI parsing are out of scope for this crate's core
//! (spec §1 "Out of scope") — only their read-only interfaces
//! (`StateClient`, `DeckRunner`) live here, alongside a minimal config
//! loader so the planner has something runnable to drive in tests and the
//! `kongplan-cli` smoke-test binary.

pub mod config;
pub mod dag;
pub mod error;
pub mod external_tool;
pub mod identity;
pub mod output;
pub mod planner;
pub mod refs;
pub mod state;

pub use error::{Error, Result};
