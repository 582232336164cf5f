//! Blocking subprocess execution with wall-clock timeouts.
//!
//! Every external tool call goes through `run_with_timeout`: a deterministic
//! argument vector, an explicit working directory, piped output drained by
//! reader threads, and a `try_wait` poll loop that kills the child once the
//! deadline passes. Callers receive an `Invocation` record suitable for the
//! sprint log.

use crate::error::{CadenceError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const EXCERPT_LEN: usize = 2000;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Outcome of a single subprocess run.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Log record of an external tool invocation.
#[derive(Debug, Clone, Serialize)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub stdout_excerpt: String,
    pub stderr_excerpt: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_LEN).collect()
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Run `program` with `args` in `cwd`, killing it after `timeout`.
pub fn run_with_timeout(
    program: &str,
    args: &[&str],
    cwd: &Path,
    timeout: Duration,
) -> Result<(CommandOutput, Invocation)> {
    let started_at = Utc::now();
    let started = Instant::now();

    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| CadenceError::Subprocess {
            tool: program.to_string(),
            reason: format!("failed to spawn: {e}"),
        })?;

    // Drain pipes on background threads so a chatty child can't deadlock
    // against a full pipe buffer while we poll for exit.
    let stdout_handle = child.stdout.take().map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = pipe.read_to_string(&mut buf);
            buf
        })
    });
    let stderr_handle = child.stderr.take().map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = pipe.read_to_string(&mut buf);
            buf
        })
    });

    let mut timed_out = false;
    let exit_status = loop {
        match child.try_wait().map_err(|e| CadenceError::Subprocess {
            tool: program.to_string(),
            reason: format!("wait failed: {e}"),
        })? {
            Some(status) => break Some(status),
            None => {
                if started.elapsed() >= timeout {
                    timed_out = true;
                    let _ = child.kill();
                    let _ = child.wait();
                    break None;
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    };

    let stdout = stdout_handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let stderr = stderr_handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    let exit_code = exit_status.and_then(|s| s.code());
    let output = CommandOutput {
        exit_code,
        stdout: stdout.clone(),
        stderr: stderr.clone(),
        timed_out,
    };
    let invocation = Invocation {
        program: program.to_string(),
        args: args.iter().map(|a| a.to_string()).collect(),
        cwd: cwd.to_path_buf(),
        exit_code,
        timed_out,
        stdout_excerpt: excerpt(&stdout),
        stderr_excerpt: excerpt(&stderr),
        started_at,
        duration_ms: started.elapsed().as_millis() as u64,
    };
    Ok((output, invocation))
}

/// Tokenize a descriptor's shell line into an argument vector. Single and
/// double quotes group words; no other shell syntax is interpreted, so the
/// resulting argv is deterministic.
pub fn split_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_token = true;
                }
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                c => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }
    if in_token {
        tokens.push(current);
    }
    tokens
}

/// Tokenize and run a descriptor's shell line. No shell is involved.
pub fn run_shell_line(
    line: &str,
    cwd: &Path,
    timeout: Duration,
) -> Result<(CommandOutput, Invocation)> {
    let tokens = split_line(line);
    let Some((program, args)) = tokens.split_first() else {
        return Err(CadenceError::Subprocess {
            tool: line.to_string(),
            reason: "empty command line".to_string(),
        });
    };
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    run_with_timeout(program, &args, cwd, timeout)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
