//! External deck diff tool integration (spec §4.2 "Deck external-tool step",
//! §6.2). The planner never shells out directly in tests — it talks to the
//! `DeckRunner` trait, grounded the same way `StateClient` is.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::planner::types::Mode;

#[derive(Debug, Clone)]
pub struct DeckRunOptions {
    pub args: Vec<String>,
    pub mode: Mode,
    pub konnect_token: String,
    pub konnect_control_plane_name: String,
    pub konnect_address: String,
    pub work_dir: String,
}

#[derive(Debug, Clone, Default)]
pub struct DeckRunOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Parsed `{summary:{creating,updating,deleting,total}, errors:[...]}`
/// contract (spec §6.2).
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    pub creating: u64,
    pub updating: u64,
    pub deleting: u64,
    pub total: u64,
}

impl DiffSummary {
    /// Whether the summary implies a real change under `mode` (spec §4.2:
    /// apply counts creating+updating; sync also counts deleting).
    pub fn has_changes(&self, mode: Mode) -> bool {
        match mode {
            Mode::Apply => self.creating + self.updating > 0,
            Mode::Sync => self.creating + self.updating + self.deleting > 0,
        }
    }
}

#[async_trait]
pub trait DeckRunner: Send + Sync {
    async fn run(&self, options: DeckRunOptions, cancel: &CancellationToken) -> Result<DeckRunOutput>;
}

/// Invokes the real `deck` binary as a child process (spec §4.2: fixed
/// template `gateway diff --json-output --no-color <flags...> <files...>`).
pub struct ProcessDeckRunner {
    binary: String,
}

impl ProcessDeckRunner {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }
}

impl Default for ProcessDeckRunner {
    fn default() -> Self {
        Self::new("deck")
    }
}

#[async_trait]
impl DeckRunner for ProcessDeckRunner {
    async fn run(&self, options: DeckRunOptions, cancel: &CancellationToken) -> Result<DeckRunOutput> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["gateway", "diff", "--json-output", "--no-color"])
            .args(&options.args)
            .current_dir(&options.work_dir)
            .env("KONNECT_TOKEN", &options.konnect_token)
            .env("KONNECT_ADDRESS", &options.konnect_address)
            .env("KONNECT_CONTROL_PLANE_NAME", &options.konnect_control_plane_name)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::external_tool(format!("failed to spawn {}: {e}", self.binary)))?;

        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");
        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();

        let stdout_handle = tokio::spawn(async move {
            let mut lines = Vec::new();
            while let Ok(Some(line)) = stdout_lines.next_line().await {
                lines.push(line);
            }
            lines
        });
        let stderr_handle = tokio::spawn(async move {
            let mut lines = Vec::new();
            while let Ok(Some(line)) = stderr_lines.next_line().await {
                lines.push(line);
            }
            lines
        });

        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.start_kill();
                return Err(Error::external_tool("deck diff cancelled"));
            }
            status = child.wait() => {
                let status = status.map_err(|e| Error::external_tool(format!("deck diff wait failed: {e}")))?;
                let stdout_lines = stdout_handle.await.unwrap_or_default();
                let stderr_lines = stderr_handle.await.unwrap_or_default();
                return Ok(DeckRunOutput {
                    stdout: stdout_lines.join("\n"),
                    stderr: stderr_lines.join("\n"),
                    exit_code: status.code().unwrap_or(-1),
                });
            }
        }
    }
}

/// Parse the deck diff JSON contract. No output, non-JSON output, or a
/// non-empty `errors` array are all fatal (spec §6.2).
pub fn parse_diff_summary(output: &DeckRunOutput) -> Result<DiffSummary> {
    if output.exit_code != 0 {
        return Err(Error::external_tool(format!(
            "deck diff exited with status {}: {}",
            output.exit_code, output.stderr
        )));
    }
    if output.stdout.trim().is_empty() {
        return Err(Error::external_tool(format!(
            "deck diff produced no output (exit code {}): {}",
            output.exit_code, output.stderr
        )));
    }

    let parsed: serde_json::Value = serde_json::from_str(&output.stdout)
        .map_err(|e| Error::external_tool(format!("deck diff output was not valid JSON: {e}")))?;

    let errors = parsed
        .get("errors")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    if !errors.is_empty() {
        return Err(Error::external_tool(format!(
            "deck diff reported {} error(s): {:?}",
            errors.len(),
            errors
        )));
    }

    let summary = parsed.get("summary").ok_or_else(|| {
        Error::external_tool("deck diff output is missing the \"summary\" field".to_string())
    })?;
    let field = |name: &str| summary.get(name).and_then(|v| v.as_u64()).unwrap_or(0);
    Ok(DiffSummary {
        creating: field("creating"),
        updating: field("updating"),
        deleting: field("deleting"),
        total: field("total"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nonzero_exit_even_with_clean_json() {
        let output = DeckRunOutput {
            stdout: r#"{"summary":{"creating":0,"updating":0,"deleting":0,"total":0},"errors":[]}"#.to_string(),
            exit_code: 1,
            ..Default::default()
        };
        let err = parse_diff_summary(&output).unwrap_err();
        assert!(err.to_string().contains("exited with status 1"));
    }

    #[test]
    fn rejects_empty_output() {
        let output = DeckRunOutput::default();
        let err = parse_diff_summary(&output).unwrap_err();
        assert!(err.to_string().contains("no output"));
    }

    #[test]
    fn rejects_nonempty_errors() {
        let output = DeckRunOutput {
            stdout: r#"{"summary":{"creating":0,"updating":0,"deleting":0,"total":0},"errors":["boom"]}"#.to_string(),
            ..Default::default()
        };
        let err = parse_diff_summary(&output).unwrap_err();
        assert!(err.to_string().contains("1 error"));
    }

    #[test]
    fn parses_a_clean_summary() {
        let output = DeckRunOutput {
            stdout: r#"{"summary":{"creating":1,"updating":2,"deleting":0,"total":3},"errors":[]}"#.to_string(),
            ..Default::default()
        };
        let summary = parse_diff_summary(&output).unwrap();
        assert_eq!(summary.total, 3);
        assert!(summary.has_changes(Mode::Apply));
    }
}
