#![forbid(unsafe_code)]

//! Blocking execution of the external tool.
//!
//! Callers on the async runtime must wrap [`run_tool`] in
//! `tokio::task::spawn_blocking`; the call waits for the child to exit.

use std::io;
use std::process::{Command, ExitStatus, Output, Stdio};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// How much of stderr survives into an error payload.
pub const STDERR_TAIL_CHARS: usize = 4000;
/// How much of stdout survives into an error payload.
pub const STDOUT_TAIL_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Diagnostics for a run that exited non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolFailure {
    #[serde(rename = "returncode")]
    pub exit_code: i32,
    #[serde(rename = "cmd")]
    pub argv: Vec<String>,
    pub stderr: String,
    pub stdout: String,
}

impl ToolFailure {
    fn from_output(argv: Vec<String>, exit_code: i32, stdout: &str, stderr: &str) -> Self {
        Self {
            exit_code,
            argv,
            stderr: tail_chars(stderr, STDERR_TAIL_CHARS).to_string(),
            stdout: tail_chars(stdout, STDOUT_TAIL_CHARS).to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("no command to run")]
    EmptyCommand,

    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{} exited with status {}", failed_program(.0), .0.exit_code)]
    Failed(ToolFailure),
}

fn failed_program(failure: &ToolFailure) -> &str {
    failure.argv.first().map(String::as_str).unwrap_or("tool")
}

/// Runs `argv[0]` with the remaining elements as arguments and waits for it.
///
/// stdin is closed. Both streams are captured in full and decoded lossily.
pub fn run_tool(argv: &[String]) -> Result<ToolOutput, ToolError> {
    let (program, args) = argv.split_first().ok_or(ToolError::EmptyCommand)?;
    debug!(?argv, "running external tool");

    let Output {
        status,
        stdout,
        stderr,
    } = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| ToolError::Launch {
            program: program.clone(),
            source,
        })?;

    let exit_code = exit_code(status);
    let stdout = String::from_utf8_lossy(&stdout).into_owned();
    let stderr = String::from_utf8_lossy(&stderr).into_owned();

    if exit_code != 0 {
        warn!(exit_code, %program, "external tool failed");
        return Err(ToolError::Failed(ToolFailure::from_output(
            argv.to_vec(),
            exit_code,
            &stdout,
            &stderr,
        )));
    }

    Ok(ToolOutput {
        exit_code,
        stdout,
        stderr,
    })
}

/// Runs `<program> --version` and returns the first line it prints.
pub fn probe_tool(program: &str) -> Result<String, ToolError> {
    let argv = vec![program.to_string(), "--version".to_string()];
    let output = run_tool(&argv)?;
    Ok(output.stdout.lines().next().unwrap_or_default().trim().to_string())
}

/// Trailing substring holding at most `limit` characters.
pub fn tail_chars(text: &str, limit: usize) -> &str {
    let total = text.chars().count();
    if total <= limit {
        return text;
    }
    match text.char_indices().nth(total - limit) {
        Some((offset, _)) => &text[offset..],
        None => "",
    }
}

/// Signal deaths report the negated signal number.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}
