//! External tool invocation: spawn, capture, and classify failures.
//!
//! Every stage that shells out (ffmpeg, whisper, tesseract, pandoc) goes
//! through [`run_tool`] so "not installed" is reported the same way for all
//! of them and stderr is always captured for the error message.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Captured output of a successful tool run.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Why a tool run failed.
#[derive(Debug, Error)]
pub enum ToolFailure {
    /// The executable could not be spawned.
    #[error("{tool} could not be started: {detail}")]
    Missing { tool: String, detail: String },

    /// The tool ran and exited non-zero.
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },
}

impl ToolFailure {
    /// The most useful text for a user: stderr for a failed run, the spawn
    /// error otherwise.
    pub fn detail(&self) -> &str {
        match self {
            ToolFailure::Missing { detail, .. } => detail,
            ToolFailure::Failed { stderr, .. } => stderr,
        }
    }
}

/// Builder for one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// The arguments as lossy strings, for logging and tests.
    pub fn display_args(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Run to completion with stdin closed and both streams captured.
    pub async fn run(&self) -> Result<ToolOutput, ToolFailure> {
        debug!("Running {} {}", self.program, self.display_args().join(" "));

        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ToolFailure::Missing {
                tool: self.program.clone(),
                detail: match e.kind() {
                    ErrorKind::NotFound => "executable not found".to_string(),
                    ErrorKind::PermissionDenied => "permission denied".to_string(),
                    _ => e.to_string(),
                },
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            Ok(ToolOutput { stdout, stderr })
        } else {
            Err(ToolFailure::Failed {
                tool: self.program.clone(),
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            })
        }
    }
}

/// Run `program probe_arg` and return the first non-empty output line.
///
/// Used by the prerequisite check to report tool versions.
pub async fn probe(program: &str, probe_arg: &str) -> Result<String, ToolFailure> {
    let out = ToolCommand::new(program).arg(probe_arg).run().await?;
    let line = out
        .stdout
        .lines()
        .chain(out.stderr.lines())
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string();
    Ok(line)
}
