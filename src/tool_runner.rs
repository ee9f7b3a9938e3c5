//! Running external tools.
//!
//! `run_tool` is the one place a subprocess gets spawned. It:
//!
//! - logs the exact command line before running it
//! - starts the tool in its own process group and registers it for cleanup
//! - streams stdout/stderr into the log while capturing both
//!
//! A non-zero exit is not an error at this level; `ToolOutput` reports it and
//! `run_tool_checked` turns it into one.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::process_guard::{CommandProcessGroup, RegisteredChild};
use crate::tool_traits::ToolArgs;

/// Lines of captured output kept in an error message.
const ERROR_TAIL_LINES: usize = 40;

/// Output from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub tool: &'static str,
    pub stdout: String,
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    pub success: bool,
}

impl ToolOutput {
    /// Error unless the tool exited 0.
    ///
    /// The message carries the tail of stderr, or of stdout when stderr is
    /// empty (`diff` reports differences on stdout).
    pub fn ensure_success(&self, context: &str) -> Result<()> {
        if self.success {
            return Ok(());
        }
        let code = self
            .exit_code
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        let detail = if self.stderr.trim().is_empty() {
            tail(&self.stdout, ERROR_TAIL_LINES)
        } else {
            tail(&self.stderr, ERROR_TAIL_LINES)
        };
        if detail.is_empty() {
            anyhow::bail!("{} failed ({} exited with {})", context, self.tool, code)
        }
        anyhow::bail!(
            "{} failed ({} exited with {}):\n{}",
            context,
            self.tool,
            code,
            detail
        )
    }
}

fn tail(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

/// Read `reader` line by line, logging each line, and return everything read.
fn pump_lines<R: Read>(reader: R, tool: &'static str, is_stderr: bool) -> String {
    let mut reader = BufReader::new(reader);
    let mut captured = String::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let trimmed = line.trim_end_matches(['\n', '\r']);
                if is_stderr {
                    warn!(tool = tool, "{}", trimmed);
                } else {
                    info!(tool = tool, "{}", trimmed);
                }
                captured.push_str(trimmed);
                captured.push('\n');
            }
            Err(e) => {
                warn!(tool = tool, "Stopped reading output: {}", e);
                break;
            }
        }
    }
    captured
}

/// Execute a tool and capture its output.
///
/// # Errors
///
/// Only if the tool could not be spawned or waited on. A non-zero exit is
/// reported through `ToolOutput::success`.
pub fn run_tool<T: ToolArgs>(args: &T) -> Result<ToolOutput> {
    let tool = args.tool_name();
    let cli_args = args.to_cli_args();
    let env_vars = args.get_env_vars();

    info!("Running subprocess {}", args.command_line());
    if !env_vars.is_empty() {
        info!(tool = tool, "with environment {:?}", env_vars);
    }

    let mut cmd = Command::new(args.program());
    cmd.args(&cli_args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .in_new_process_group();
    for (key, value) in &env_vars {
        cmd.env(key, value);
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn {}", args.program().display()))?;
    let registration = RegisteredChild::register(child.id());
    debug!("{} running as process group {}", tool, registration.pid());

    let stderr_reader = child
        .stderr
        .take()
        .map(|stderr| thread::spawn(move || pump_lines(stderr, tool, true)));
    let stdout = child
        .stdout
        .take()
        .map(|stdout| pump_lines(stdout, tool, false))
        .unwrap_or_default();
    let stderr = match stderr_reader {
        Some(handle) => handle.join().unwrap_or_default(),
        None => String::new(),
    };

    let status = child
        .wait()
        .with_context(|| format!("Failed waiting for {}", tool))?;
    drop(registration);

    let exit_code = status.code();
    if status.success() {
        info!("{} finished successfully", tool);
    } else {
        warn!("{} exited with {:?}", tool, exit_code);
    }

    Ok(ToolOutput {
        tool,
        stdout,
        stderr,
        exit_code,
        success: status.success(),
    })
}

/// Execute a tool and fail unless it exits 0.
pub fn run_tool_checked<T: ToolArgs>(args: &T, context: &str) -> Result<ToolOutput> {
    let output = run_tool(args)?;
    output.ensure_success(context)?;
    Ok(output)
}
