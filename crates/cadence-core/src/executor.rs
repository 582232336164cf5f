//! Per-task agent execution under test-first discipline.
//!
//! The executor never writes code itself: it issues shell invocations from
//! the agent descriptor (scaffold, test, implement, coverage) inside the
//! task's worktree, records every invocation for the sprint log, and gates
//! completion on the configured coverage threshold. Cancellation is honored
//! at phase boundaries; a running invocation is never interrupted mid-call.

use crate::agent::AgentDescriptor;
use crate::config::Config;
use crate::event::{Event, EventBus, Phase};
use crate::proc::{run_shell_line, CommandOutput, Invocation};
use crate::task::Task;
use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

pub const BLOCK_REASON_COVERAGE: &str = "coverage";
pub const BLOCK_REASON_TIMEOUT: &str = "timeout";
pub const BLOCK_REASON_CANCELLED: &str = "cancelled";

// ---------------------------------------------------------------------------
// TaskResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed,
    Failed,
    Blocked { reason: String },
}

impl TaskOutcome {
    pub fn blocked(reason: &str) -> Self {
        TaskOutcome::Blocked {
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub outcome: TaskOutcome,
    pub summary: String,
    pub coverage_percent: Option<f64>,
    /// Paths touched inside the worktree, from `git status --porcelain`.
    pub artifacts: Vec<String>,
    pub created_pr_url: Option<String>,
    pub invocations: Vec<Invocation>,
}

impl TaskResult {
    fn new(outcome: TaskOutcome, summary: impl Into<String>) -> Self {
        Self {
            outcome,
            summary: summary.into(),
            coverage_percent: None,
            artifacts: Vec::new(),
            created_pr_url: None,
            invocations: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Coverage parsing
// ---------------------------------------------------------------------------

static COVERAGE_RE: OnceLock<Regex> = OnceLock::new();

fn coverage_re() -> &'static Regex {
    COVERAGE_RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").unwrap())
}

/// Last percentage figure in the tool output.
pub fn parse_coverage(output: &str) -> Option<f64> {
    coverage_re()
        .captures_iter(output)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

// ---------------------------------------------------------------------------
// AgentExecutor
// ---------------------------------------------------------------------------

pub struct AgentExecutor<'a> {
    config: &'a Config,
    bus: &'a EventBus,
}

enum StepError {
    Failed(String),
    Blocked(&'static str, String),
}

impl<'a> AgentExecutor<'a> {
    pub fn new(config: &'a Config, bus: &'a EventBus) -> Self {
        Self { config, bus }
    }

    fn phase(&self, task_id: &str, phase: Phase) {
        self.bus.publish(Event::PhaseChanged {
            task_id: task_id.to_string(),
            phase,
            at: Utc::now(),
        });
    }

    /// Run a tool line, retrying once when it times out.
    fn run_tool(
        &self,
        line: &str,
        cwd: &Path,
        timeout: Duration,
        invocations: &mut Vec<Invocation>,
    ) -> Result<CommandOutput, StepError> {
        for attempt in 0..2 {
            let (output, invocation) = run_shell_line(line, cwd, timeout)
                .map_err(|e| StepError::Failed(e.to_string()))?;
            invocations.push(invocation);
            if !output.timed_out {
                return Ok(output);
            }
            if attempt == 0 {
                tracing::warn!(tool = line, "tool timed out, retrying once");
            }
        }
        Err(StepError::Blocked(
            BLOCK_REASON_TIMEOUT,
            format!("'{line}' timed out twice"),
        ))
    }

    fn check_cancel(&self, cancel: &AtomicBool) -> Result<(), StepError> {
        if cancel.load(Ordering::SeqCst) {
            Err(StepError::Blocked(
                BLOCK_REASON_CANCELLED,
                "cancelled at phase boundary".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Execute the test-first sequence for a task inside its worktree.
    pub fn execute(
        &self,
        task: &Task,
        agent: &AgentDescriptor,
        worktree: &Path,
        cancel: &AtomicBool,
    ) -> TaskResult {
        self.bus.publish(Event::AgentTakeover {
            task_id: task.id.clone(),
            agent: agent.name.clone(),
            display_name: agent.display_name.clone(),
            emoji: agent.emoji.clone(),
            at: Utc::now(),
        });

        let mut invocations = Vec::new();
        let outcome = self.run_sequence(task, agent, worktree, cancel, &mut invocations);
        let mut result = match outcome {
            Ok(coverage) => {
                self.phase(&task.id, Phase::Completed);
                let mut result = TaskResult::new(
                    TaskOutcome::Completed,
                    format!("task {} completed by {}", task.id, agent.name),
                );
                result.coverage_percent = coverage;
                result
            }
            Err(StepError::Failed(summary)) => {
                self.phase(&task.id, Phase::Failed);
                TaskResult::new(TaskOutcome::Failed, summary)
            }
            Err(StepError::Blocked(reason, summary)) => {
                self.phase(&task.id, Phase::Failed);
                TaskResult::new(TaskOutcome::blocked(reason), summary)
            }
        };
        result.artifacts = self.touched_artifacts(worktree, &mut result.invocations);
        result.invocations.splice(0..0, invocations);
        result
    }

    /// The phase sequence proper. Returns the parsed coverage on success.
    fn run_sequence(
        &self,
        task: &Task,
        agent: &AgentDescriptor,
        worktree: &Path,
        cancel: &AtomicBool,
        invocations: &mut Vec<Invocation>,
    ) -> Result<Option<f64>, StepError> {
        let timeouts = &self.config.timeouts;

        let Some(test_command) = agent.test_command.as_deref() else {
            return Err(StepError::Failed(format!(
                "agent '{}' has no test command",
                agent.name
            )));
        };

        // Phase: author tests.
        self.check_cancel(cancel)?;
        self.phase(&task.id, Phase::Working);
        if let Some(scaffold) = agent.scaffold_command.as_deref() {
            let output = self.run_tool(scaffold, worktree, timeouts.test(), invocations)?;
            if !output.success() {
                return Err(StepError::Failed(format!(
                    "test scaffolding failed: {}",
                    output.stderr.trim()
                )));
            }
        }

        // Phase: first test run, expected to fail before implementation.
        self.check_cancel(cancel)?;
        self.phase(&task.id, Phase::Testing);
        let first = self.run_tool(test_command, worktree, timeouts.test(), invocations)?;
        if first.success() {
            tracing::warn!(
                task_id = %task.id,
                "tests passed before implementation; continuing"
            );
        }

        // Phase: author implementation.
        self.check_cancel(cancel)?;
        if let Some(implement) = agent.implement_command.as_deref() {
            let output = self.run_tool(implement, worktree, timeouts.test(), invocations)?;
            if !output.success() {
                return Err(StepError::Failed(format!(
                    "implementation step failed: {}",
                    output.stderr.trim()
                )));
            }
        }

        // Phase: tests must pass now.
        self.check_cancel(cancel)?;
        let second = self.run_tool(test_command, worktree, timeouts.test(), invocations)?;
        if !second.success() {
            return Err(StepError::Failed(format!(
                "tests failing after implementation (exit {:?})",
                second.exit_code
            )));
        }

        // Phase: coverage gate.
        self.check_cancel(cancel)?;
        self.phase(&task.id, Phase::Coverage);
        let Some(coverage_command) = agent.coverage_command.as_deref() else {
            // No coverage tool configured for this agent; nothing to gate on.
            return Ok(None);
        };
        let output = self.run_tool(coverage_command, worktree, timeouts.coverage(), invocations)?;
        let Some(coverage) = parse_coverage(&output.stdout) else {
            return Err(StepError::Blocked(
                BLOCK_REASON_COVERAGE,
                "coverage tool reported no percentage".to_string(),
            ));
        };
        let required = f64::from(self.config.scrum.test_coverage_required);
        if coverage < required {
            return Err(StepError::Blocked(
                BLOCK_REASON_COVERAGE,
                format!("coverage {coverage}% is below the required {required}%"),
            ));
        }
        Ok(Some(coverage))
    }

    /// Paths with pending changes in the worktree, for the PR summary.
    fn touched_artifacts(&self, worktree: &Path, invocations: &mut Vec<Invocation>) -> Vec<String> {
        match run_shell_line("git status --porcelain", worktree, self.config.timeouts.git()) {
            Ok((output, invocation)) => {
                invocations.push(invocation);
                output
                    .stdout
                    .lines()
                    .filter_map(|line| line.get(3..))
                    .map(str::to_string)
                    .collect()
            }
            Err(_) => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
