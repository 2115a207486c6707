//! `kongplan-cli` — a thin binary wrapping the `kongplan` library (spec §1
//! `[ADDED] Binary shape`): not the product this spec describes (`kongctl`
//! itself is out of scope), just a runnable entry point for the planner,
//! the way `so0k-oxid`'s `main.rs` gives its own planner one.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use kongplan::config;
use kongplan::error::Error;
use kongplan::external_tool::deck::ProcessDeckRunner;
use kongplan::output::formatter;
use kongplan::planner::orchestrator::{run_plan, PlanRequest};
use kongplan::planner::types::Mode;
use kongplan::state::client::{MonikerFilter, Selector, StateClient, StateResource};

/// kongplan — declarative planner for Kong Konnect resources.
#[derive(Parser)]
#[command(name = "kongplan", version, about, long_about = None)]
struct Cli {
    /// Path to a desired-state YAML file, or a directory of YAML fragments.
    #[arg(short, long, default_value = ".")]
    config: PathBuf,

    /// apply (no deletes) or sync (also deletes resources absent from desired state).
    #[arg(short, long, value_enum, default_value_t = CliMode::Apply)]
    mode: CliMode,

    /// Render the plan as JSON instead of the human-readable summary.
    #[arg(long)]
    json: bool,

    /// Enable verbose (debug) logging.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Copy, Clone, ValueEnum)]
enum CliMode {
    Apply,
    Sync,
}

impl From<CliMode> for Mode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Apply => Mode::Apply,
            CliMode::Sync => Mode::Sync,
        }
    }
}

/// A `StateClient` that reports every resource as absent. Stands in for
/// the real REST client (out of scope for this crate per spec §1), so the
/// CLI can still exercise the full seven-stage pipeline end to end against
/// an empty Konnect account for smoke-testing.
struct NullStateClient;

#[async_trait]
impl StateClient for NullStateClient {
    async fn list_managed(
        &self,
        _kind: config::types::ResourceKind,
        _namespace_filter: &str,
        _cancel: &CancellationToken,
    ) -> kongplan::Result<Vec<StateResource>> {
        Ok(Vec::new())
    }

    async fn list_all(
        &self,
        _kind: config::types::ResourceKind,
        _cancel: &CancellationToken,
    ) -> kongplan::Result<Vec<StateResource>> {
        Ok(Vec::new())
    }

    async fn get_by_id(
        &self,
        _kind: config::types::ResourceKind,
        _id: &str,
        _cancel: &CancellationToken,
    ) -> kongplan::Result<Option<StateResource>> {
        Ok(None)
    }

    async fn get_by_filter(
        &self,
        _kind: config::types::ResourceKind,
        _filter: &MonikerFilter,
        _cancel: &CancellationToken,
    ) -> kongplan::Result<Option<StateResource>> {
        Ok(None)
    }

    async fn get_by_selector(
        &self,
        kind: config::types::ResourceKind,
        _selector: &Selector,
        _cancel: &CancellationToken,
    ) -> kongplan::Result<Vec<StateResource>> {
        Err(Error::resolution(format!(
            "no live {kind} resources available (kongplan-cli has no REST backend configured)"
        )))
    }

    async fn list_children(
        &self,
        _kind: config::types::ResourceKind,
        _parent_id: &str,
        _cancel: &CancellationToken,
    ) -> kongplan::Result<Vec<StateResource>> {
        Ok(Vec::new())
    }

    async fn list_team_roles(
        &self,
        _portal_id: &str,
        _team_id: &str,
        _cancel: &CancellationToken,
    ) -> kongplan::Result<Vec<StateResource>> {
        Ok(Vec::new())
    }

    async fn get_singleton(
        &self,
        _kind: config::types::ResourceKind,
        _parent_id: &str,
        _cancel: &CancellationToken,
    ) -> kongplan::Result<Option<StateResource>> {
        Ok(None)
    }

    async fn get_page_content(
        &self,
        _page_id: &str,
        _cancel: &CancellationToken,
    ) -> kongplan::Result<Option<config::types::Fields>> {
        Ok(None)
    }

    async fn control_plane_name(
        &self,
        _id: &str,
        _cancel: &CancellationToken,
    ) -> kongplan::Result<Option<String>> {
        Ok(None)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let resource_set = config::loader::load(&cli.config)
        .map_err(|e| anyhow::anyhow!(e.to_string()))
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    let client = NullStateClient;
    let deck_runner = ProcessDeckRunner::default();
    let cancel = CancellationToken::new();

    let token = std::env::var("KONNECT_TOKEN").unwrap_or_default();
    let address = std::env::var("KONNECT_ADDRESS").unwrap_or_else(|_| "https://global.api.konghq.com".to_string());

    let request = PlanRequest {
        mode: cli.mode.into(),
        konnect_token: &token,
        konnect_address: &address,
        generator: "kongplan-cli",
    };

    match run_plan(resource_set, &client, &deck_runner, request, &cancel).await {
        Ok(plan) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&plan.to_json())?);
            } else {
                formatter::print_plan(&plan);
            }
            Ok(())
        }
        Err(e) => {
            formatter::print_error(&e.to_string());
            Err(anyhow::anyhow!(e.to_string()))
        }
    }
}
