//! Sequential sprint execution.
//!
//! The orchestrator freezes the sprint scope into a dependency-ordered work
//! list, then drives one item at a time through matcher → worktree →
//! executor. At most one task is In Progress at any instant; this is a
//! functional guarantee, not a performance choice. Failures halt the sprint
//! in strict mode and skip to the next independent item in lenient mode.

use crate::agent::AgentRegistry;
use crate::bug::Bug;
use crate::error::{CadenceError, Result};
use crate::event::{Event, EventBus};
use crate::executor::{AgentExecutor, TaskOutcome, TaskResult};
use crate::matcher::{workload_of, TaskAgentMatcher};
use crate::scrum::ScrumManager;
use crate::sprint::Sprint;
use crate::task::Task;
use crate::types::{BugStatus, ItemKind, TaskStatus};
use crate::worktree::{BranchType, WorktreeManager};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Run state and report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Starting,
    Running,
    Draining,
    Finalizing,
    Halted,
}

#[derive(Debug, Clone, Serialize)]
pub struct HandoffEntry {
    pub from_agent: Option<String>,
    pub to_agent: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemRun {
    pub item_id: String,
    pub agent: String,
    pub result: TaskResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct SprintRunReport {
    pub sprint_id: String,
    pub state: RunState,
    pub completed: usize,
    pub failed: usize,
    pub halted_reason: Option<String>,
    pub handoffs: Vec<HandoffEntry>,
    pub runs: Vec<ItemRun>,
}

// ---------------------------------------------------------------------------
// Work items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum WorkItem {
    Task(Task),
    Bug(Bug),
}

impl WorkItem {
    fn id(&self) -> &str {
        match self {
            WorkItem::Task(task) => &task.id,
            WorkItem::Bug(bug) => &bug.id,
        }
    }

    fn dependencies(&self) -> &[String] {
        match self {
            WorkItem::Task(task) => &task.dependencies,
            WorkItem::Bug(_) => &[],
        }
    }

    fn branch_type(&self) -> BranchType {
        match self {
            WorkItem::Bug(_) => BranchType::Fix,
            WorkItem::Task(task) => BranchType::infer(&task.title, &task.description),
        }
    }

    /// The task handed to matcher and executor. Bugs execute as a single
    /// unit of work shaped like a task; the synthetic record is not
    /// persisted.
    fn as_task(&self) -> Task {
        match self {
            WorkItem::Task(task) => task.clone(),
            WorkItem::Bug(bug) => {
                let mut task = Task::new(&bug.id, "", &bug.title);
                task.description = bug.description.clone();
                task.technical_details = bug.steps_to_reproduce.join("\n");
                task.priority = bug.priority;
                task
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SprintOrchestrator
// ---------------------------------------------------------------------------

pub struct SprintOrchestrator<'a> {
    scrum: &'a ScrumManager,
    registry: &'a mut AgentRegistry,
    worktrees: &'a WorktreeManager,
    bus: &'a EventBus,
    cancel: Arc<AtomicBool>,
}

impl<'a> SprintOrchestrator<'a> {
    pub fn new(
        scrum: &'a ScrumManager,
        registry: &'a mut AgentRegistry,
        worktrees: &'a WorktreeManager,
        bus: &'a EventBus,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            scrum,
            registry,
            worktrees,
            bus,
            cancel,
        }
    }

    /// Flatten the sprint's committed stories and bugs into their
    /// constituent work items, preserving planning order, then order by
    /// task dependencies. Cycles are rejected here, before the sprint is
    /// allowed to become Active.
    fn freeze(&self, sprint: &Sprint) -> Result<Vec<WorkItem>> {
        let mut items: Vec<WorkItem> = Vec::new();
        for committed in &sprint.committed_items {
            match committed.kind {
                ItemKind::Story => {
                    for task in self.scrum.story_tasks(&committed.id)? {
                        if task.status != TaskStatus::Completed {
                            items.push(WorkItem::Task(task));
                        }
                    }
                }
                ItemKind::Bug => {
                    if let Ok(bug) = self.scrum.bug(&committed.id) {
                        if !bug.status.is_resolved() {
                            items.push(WorkItem::Bug(bug));
                        }
                    }
                }
            }
        }

        // Stable topological order over the in-sprint dependency edges.
        let in_sprint: BTreeSet<String> = items.iter().map(|i| i.id().to_string()).collect();
        let mut emitted: BTreeSet<String> = BTreeSet::new();
        let mut ordered = Vec::with_capacity(items.len());
        while !items.is_empty() {
            let position = items.iter().position(|item| {
                item.dependencies()
                    .iter()
                    .filter(|dep| in_sprint.contains(*dep))
                    .all(|dep| emitted.contains(dep))
            });
            match position {
                Some(index) => {
                    let item = items.remove(index);
                    emitted.insert(item.id().to_string());
                    ordered.push(item);
                }
                None => {
                    let stuck: Vec<&str> = items.iter().map(WorkItem::id).collect();
                    return Err(CadenceError::Dependency(format!(
                        "dependency cycle among sprint tasks: {}",
                        stuck.join(", ")
                    )));
                }
            }
        }
        Ok(ordered)
    }

    /// Dependencies satisfied against the current task store.
    fn is_ready(&self, item: &WorkItem) -> Result<bool> {
        for dep in item.dependencies() {
            let dep_task = self.scrum.task(dep)?;
            if dep_task.status != TaskStatus::Completed {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn mark_outcome(&self, item: &WorkItem, outcome: &TaskOutcome) -> Result<()> {
        match (item, outcome) {
            (WorkItem::Task(task), TaskOutcome::Completed) => {
                self.scrum.set_task_status(&task.id, TaskStatus::Completed)?;
            }
            (WorkItem::Task(task), _) => {
                self.scrum.set_task_status(&task.id, TaskStatus::Blocked)?;
            }
            (WorkItem::Bug(bug), TaskOutcome::Completed) => {
                self.scrum.resolve_bug(&bug.id)?;
            }
            (WorkItem::Bug(bug), _) => {
                self.scrum.set_bug_status(&bug.id, BugStatus::Open)?;
            }
        }
        Ok(())
    }

    fn claim(&self, item: &WorkItem) -> Result<()> {
        match item {
            WorkItem::Task(task) => {
                self.scrum.set_task_status(&task.id, TaskStatus::InProgress)?;
            }
            WorkItem::Bug(bug) => {
                self.scrum.set_bug_status(&bug.id, BugStatus::InProgress)?;
            }
        }
        Ok(())
    }

    fn error_event(&self, message: String) {
        tracing::warn!(%message, "sprint error");
        self.bus.publish(Event::Error {
            message,
            at: Utc::now(),
        });
    }

    /// Push the branch and attempt a PR for a completed item. Both are
    /// best-effort: failures surface as Error events without stopping the
    /// sprint.
    fn publish_branch(&self, item: &WorkItem, result: &mut TaskResult) {
        let item_id = item.id();
        if let Err(err) = self.worktrees.push(item_id) {
            self.error_event(format!("push failed for {item_id}: {err}"));
            return;
        }
        let task = item.as_task();
        let title = format!("[{}] {}", item_id, task.title);
        let record = match self.worktrees.record(item_id) {
            Ok(record) => record,
            Err(_) => return,
        };
        let mut body = format!(
            "Task: {item_id}\nAgent: {}\nBranch: {}\n",
            record.agent, record.branch
        );
        if let Some(coverage) = result.coverage_percent {
            body.push_str(&format!("Coverage: {coverage}%\n"));
        }
        if !result.artifacts.is_empty() {
            body.push_str("\nTouched:\n");
            for artifact in &result.artifacts {
                body.push_str(&format!("- {artifact}\n"));
            }
        }
        match self.worktrees.open_pr(item_id, &title, &body) {
            Ok(url) => result.created_pr_url = Some(url),
            Err(err) => self.error_event(format!("PR creation failed for {item_id}: {err}")),
        }
    }

    /// Execute a sprint to completion. Returns the run report; dependency
    /// cycles are rejected before the sprint becomes Active.
    pub fn run(&mut self, sprint_id: &str, cleanup_worktrees: bool) -> Result<SprintRunReport> {
        let sprint = self.scrum.sprint(sprint_id)?;
        let mut report = SprintRunReport {
            sprint_id: sprint_id.to_string(),
            state: RunState::Starting,
            completed: 0,
            failed: 0,
            halted_reason: None,
            handoffs: Vec::new(),
            runs: Vec::new(),
        };

        let mut pending = self.freeze(&sprint)?;
        self.scrum.start_sprint(sprint_id)?;
        self.bus.publish(Event::SprintStarted {
            sprint_id: sprint_id.to_string(),
            at: Utc::now(),
        });

        report.state = RunState::Running;
        let strict = self.scrum.config().scrum.strict_mode;
        let executor = AgentExecutor::new(self.scrum.config(), self.bus);
        let matcher = TaskAgentMatcher::new(self.scrum.config().agents.allow_dynamic_creation);
        let mut failed_ids: BTreeSet<String> = BTreeSet::new();
        let mut last_agent: Option<String> = None;

        while !pending.is_empty() {
            if self.cancel.load(std::sync::atomic::Ordering::SeqCst) {
                report.state = RunState::Halted;
                report.halted_reason = Some("cancelled".to_string());
                break;
            }

            // In lenient mode an item downstream of a failure can never run;
            // block it and move on instead of diagnosing a deadlock.
            if !strict && !failed_ids.is_empty() {
                let (doomed, rest): (Vec<WorkItem>, Vec<WorkItem>) = pending
                    .into_iter()
                    .partition(|i| i.dependencies().iter().any(|d| failed_ids.contains(d)));
                pending = rest;
                for item in doomed {
                    self.error_event(format!(
                        "skipping {}: it depends on a failed task",
                        item.id()
                    ));
                    failed_ids.insert(item.id().to_string());
                    self.mark_outcome(&item, &TaskOutcome::blocked("dependency"))?;
                    report.failed += 1;
                }
                if pending.is_empty() {
                    break;
                }
            }

            let mut ready_index = None;
            for (index, item) in pending.iter().enumerate() {
                if self.is_ready(item)? {
                    ready_index = Some(index);
                    break;
                }
            }
            let Some(index) = ready_index else {
                let stuck: Vec<&str> = pending.iter().map(WorkItem::id).collect();
                let message = format!(
                    "dependency deadlock: no runnable task among {}",
                    stuck.join(", ")
                );
                self.error_event(message.clone());
                report.state = RunState::Halted;
                report.halted_reason = Some(message);
                break;
            };
            let item = pending.remove(index);
            let task_view = item.as_task();

            // Agent selection, recorded on real tasks.
            let task_map: std::collections::BTreeMap<String, Task> = self
                .scrum
                .list_tasks()?
                .into_iter()
                .map(|t| (t.id.clone(), t))
                .collect();
            let workload = workload_of(&task_map);
            let outcome = matcher.match_task(&task_view, self.registry, &workload)?;
            if let WorkItem::Task(task) = &item {
                if task.assigned_agent.is_none() {
                    self.scrum.assign_agent(&task.id, &outcome.agent)?;
                }
            }
            if last_agent.as_deref() != Some(outcome.agent.as_str()) {
                let entry = HandoffEntry {
                    from_agent: last_agent.clone(),
                    to_agent: outcome.agent.clone(),
                    reason: outcome.reason.clone(),
                    timestamp: Utc::now(),
                };
                self.bus.publish(Event::Handoff {
                    from_agent: entry.from_agent.clone(),
                    to_agent: entry.to_agent.clone(),
                    reason: entry.reason.clone(),
                    at: entry.timestamp,
                });
                report.handoffs.push(entry);
                last_agent = Some(outcome.agent.clone());
            }

            let Some(agent) = self.registry.get(&outcome.agent).cloned() else {
                return Err(CadenceError::Fatal(format!(
                    "matched agent '{}' is not in the registry",
                    outcome.agent
                )));
            };

            // Verify or acquire the worktree.
            let worktree = match self.worktrees.record(item.id()) {
                Ok(record) if record.status.is_live() => Ok(record),
                _ => self.worktrees.create(item.id(), &agent.name, item.branch_type()),
            };
            let record = match worktree {
                Ok(record) => record,
                Err(err) => {
                    self.error_event(format!("worktree for {} failed: {err}", item.id()));
                    self.mark_outcome(&item, &TaskOutcome::Failed)?;
                    report.failed += 1;
                    failed_ids.insert(item.id().to_string());
                    if strict {
                        report.state = RunState::Halted;
                        report.halted_reason = Some(format!("worktree failure: {err}"));
                        break;
                    }
                    continue;
                }
            };

            self.claim(&item)?;
            self.bus.publish(Event::TaskClaimed {
                task_id: item.id().to_string(),
                agent: agent.name.clone(),
                at: Utc::now(),
            });

            let mut result = executor.execute(&task_view, &agent, &record.path, &self.cancel);

            match result.outcome.clone() {
                TaskOutcome::Completed => {
                    self.mark_outcome(&item, &TaskOutcome::Completed)?;
                    self.publish_branch(&item, &mut result);
                    self.bus.publish(Event::TaskCompleted {
                        task_id: item.id().to_string(),
                        coverage_percent: result.coverage_percent,
                        at: Utc::now(),
                    });
                    report.completed += 1;
                    report.runs.push(ItemRun {
                        item_id: item.id().to_string(),
                        agent: agent.name.clone(),
                        result,
                    });
                }
                outcome => {
                    self.mark_outcome(&item, &outcome)?;
                    let reason = match &outcome {
                        TaskOutcome::Blocked { reason } => reason.clone(),
                        _ => result.summary.clone(),
                    };
                    self.bus.publish(Event::TaskFailed {
                        task_id: item.id().to_string(),
                        reason: reason.clone(),
                        at: Utc::now(),
                    });
                    report.failed += 1;
                    failed_ids.insert(item.id().to_string());
                    report.runs.push(ItemRun {
                        item_id: item.id().to_string(),
                        agent: agent.name.clone(),
                        result,
                    });
                    if strict {
                        report.state = RunState::Halted;
                        report.halted_reason = Some(format!("task {} {reason}", item.id()));
                        break;
                    }
                }
            }
        }

        if report.state == RunState::Halted {
            tracing::warn!(
                sprint_id,
                reason = report.halted_reason.as_deref().unwrap_or(""),
                "sprint halted"
            );
            return Ok(report);
        }

        report.state = RunState::Finalizing;
        let note = format!(
            "{} completed, {} failed out of {} committed items",
            report.completed,
            report.failed,
            sprint.committed_items.len()
        );
        let finished = self.scrum.complete_sprint(sprint_id, Some(note))?;
        if cleanup_worktrees {
            let scrum = self.scrum;
            let cleaned = self.worktrees.cleanup(true, &|task_id| {
                scrum
                    .task(task_id)
                    .map(|t| t.status == TaskStatus::Completed)
                    .unwrap_or_else(|_| {
                        scrum
                            .bug(task_id)
                            .map(|b| b.status.is_resolved())
                            .unwrap_or(false)
                    })
            })?;
            if !cleaned.is_empty() {
                tracing::info!(count = cleaned.len(), "cleaned up worktrees");
            }
        }
        self.bus.publish(Event::SprintCompleted {
            sprint_id: sprint_id.to_string(),
            completed_points: finished.completed_points,
            at: Utc::now(),
        });
        report.state = RunState::Idle;
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::descriptor_template;
    use crate::config::Config;
    use crate::scrum::{EstimateMode, NewStory, NewTask, ScrumManager};
    use crate::types::{Priority, SprintStatus, StoryStatus};
    use std::path::Path;
    use std::process::Command;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn run_git(dir: &Path, args: &[&str]) {
        let output = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(args)
            .output()
            .expect("failed to run git");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    struct Rig {
        _dir: TempDir,
        scrum: ScrumManager,
        registry: AgentRegistry,
        worktrees: WorktreeManager,
        bus: EventBus,
    }

    fn rig(strict: bool) -> Rig {
        let dir = TempDir::new().unwrap();
        run_git(dir.path(), &["init"]);
        run_git(dir.path(), &["config", "user.name", "Cadence Test"]);
        run_git(dir.path(), &["config", "user.email", "cadence-test@example.com"]);
        std::fs::write(dir.path().join("README.md"), "init").unwrap();
        run_git(dir.path(), &["add", "."]);
        run_git(dir.path(), &["commit", "-m", "init"]);
        run_git(dir.path(), &["branch", "-M", "main"]);

        let mut config = Config::new("cadence-test");
        config.scrum.strict_mode = strict;
        config.scrum.test_coverage_required = 0;
        config.save(dir.path()).unwrap();

        let scrum = ScrumManager::open(dir.path()).unwrap();
        let mut registry = AgentRegistry::load(dir.path()).unwrap();
        let mut passing = descriptor_template("passing");
        passing.test_command = Some("true".to_string());
        registry.create(passing, false).unwrap();
        let mut failing = descriptor_template("failing");
        failing.test_command = Some("false".to_string());
        registry.create(failing, false).unwrap();

        let worktrees = WorktreeManager::new(dir.path(), &Config::load(dir.path()).unwrap());
        Rig {
            _dir: dir,
            scrum,
            registry,
            worktrees,
            bus: EventBus::new(),
        }
    }

    fn story_with_tasks(rig: &Rig, agents: &[&str], chain_deps: bool) -> (String, Vec<String>) {
        let story = rig
            .scrum
            .create_story(NewStory {
                title: "Login".to_string(),
                role: "user".to_string(),
                want: "to log in".to_string(),
                benefit: "access".to_string(),
                priority: Priority::High,
                ..NewStory::default()
            })
            .unwrap();
        rig.scrum
            .estimate_story(&story.id, EstimateMode::Points(3))
            .unwrap();

        let mut task_ids: Vec<String> = Vec::new();
        for (index, agent) in agents.iter().enumerate() {
            let deps = if chain_deps && index > 0 {
                vec![task_ids[index - 1].clone()]
            } else {
                Vec::new()
            };
            let task = rig
                .scrum
                .create_task(NewTask {
                    story_id: story.id.clone(),
                    title: format!("step {index}"),
                    dependencies: deps,
                    ..NewTask::default()
                })
                .unwrap();
            rig.scrum.assign_agent(&task.id, agent).unwrap();
            task_ids.push(task.id);
        }
        (story.id, task_ids)
    }

    fn event_log(bus: &EventBus) -> Arc<Mutex<Vec<Event>>> {
        let log: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        bus.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        log
    }

    #[test]
    fn happy_path_runs_tasks_sequentially_and_completes_story() {
        let mut rig = rig(true);
        let log = event_log(&rig.bus);
        let (story_id, task_ids) =
            story_with_tasks(&rig, &["passing-engineer", "passing-engineer"], true);
        let sprint = rig.scrum.plan_sprint("Sprint 1", "ship login", None, true).unwrap();

        let mut orchestrator = SprintOrchestrator::new(
            &rig.scrum,
            &mut rig.registry,
            &rig.worktrees,
            &rig.bus,
            Arc::new(AtomicBool::new(false)),
        );
        let report = orchestrator.run(&sprint.id, false).unwrap();

        assert_eq!(report.state, RunState::Idle);
        assert_eq!(report.completed, 2);
        assert_eq!(report.failed, 0);

        // Claims happen in dependency order.
        let claims: Vec<String> = log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                Event::TaskClaimed { task_id, .. } => Some(task_id.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(claims, task_ids);

        // Sequential guarantee: at most one claimed-but-unfinished task at
        // any observable instant.
        let mut in_flight: i32 = 0;
        for event in log.lock().unwrap().iter() {
            match event {
                Event::TaskClaimed { .. } => {
                    in_flight += 1;
                    assert!(in_flight <= 1, "more than one task in progress");
                }
                Event::TaskCompleted { .. } | Event::TaskFailed { .. } => in_flight -= 1,
                _ => {}
            }
        }

        // Branch names come from the project abbreviation and the global
        // counter.
        assert_eq!(
            rig.worktrees.record(&task_ids[0]).unwrap().branch,
            "feature/CADE-1"
        );
        assert_eq!(
            rig.worktrees.record(&task_ids[1]).unwrap().branch,
            "feature/CADE-2"
        );

        assert_eq!(
            rig.scrum.story(&story_id).unwrap().status,
            StoryStatus::Done
        );
        assert_eq!(
            rig.scrum.sprint(&sprint.id).unwrap().status,
            SprintStatus::Completed
        );
    }

    #[test]
    fn dependency_cycle_is_rejected_before_activation() {
        let mut rig = rig(true);
        let (story_id, _) = story_with_tasks(&rig, &[], false);
        let t1 = rig
            .scrum
            .create_task(NewTask {
                story_id: story_id.clone(),
                title: "t1".to_string(),
                ..NewTask::default()
            })
            .unwrap();
        let t2 = rig
            .scrum
            .create_task(NewTask {
                story_id: story_id.clone(),
                title: "t2".to_string(),
                dependencies: vec![t1.id.clone()],
                ..NewTask::default()
            })
            .unwrap();
        // Close the cycle behind the validation (simulating an upstream data
        // bug).
        {
            use crate::store::EntityKind;
            let mut tasks = rig.scrum.store().load::<Task>(EntityKind::Tasks).unwrap();
            tasks.get_mut(&t1.id).unwrap().dependencies = vec![t2.id.clone()];
            rig.scrum.store().save(EntityKind::Tasks, &tasks).unwrap();
        }

        let sprint = rig.scrum.plan_sprint("Sprint 1", "g", None, true).unwrap();
        let mut orchestrator = SprintOrchestrator::new(
            &rig.scrum,
            &mut rig.registry,
            &rig.worktrees,
            &rig.bus,
            Arc::new(AtomicBool::new(false)),
        );
        let err = orchestrator.run(&sprint.id, false).unwrap_err();
        assert_eq!(err.kind(), "dependency");

        // Nothing started: the sprint is still Planned and no task moved.
        assert_eq!(
            rig.scrum.sprint(&sprint.id).unwrap().status,
            SprintStatus::Planned
        );
        assert!(rig
            .scrum
            .list_tasks()
            .unwrap()
            .iter()
            .all(|t| t.status == TaskStatus::Pending));
    }

    #[test]
    fn strict_mode_halts_on_first_failure() {
        let mut rig = rig(true);
        let (_, task_ids) =
            story_with_tasks(&rig, &["failing-engineer", "passing-engineer"], false);
        let sprint = rig.scrum.plan_sprint("Sprint 1", "g", None, true).unwrap();

        let mut orchestrator = SprintOrchestrator::new(
            &rig.scrum,
            &mut rig.registry,
            &rig.worktrees,
            &rig.bus,
            Arc::new(AtomicBool::new(false)),
        );
        let report = orchestrator.run(&sprint.id, false).unwrap();

        assert_eq!(report.state, RunState::Halted);
        assert_eq!(report.failed, 1);
        assert_eq!(report.completed, 0);
        // The second task was never claimed.
        assert_eq!(
            rig.scrum.task(&task_ids[1]).unwrap().status,
            TaskStatus::Pending
        );
        // A halted sprint stays Active for the operator to decide.
        assert_eq!(
            rig.scrum.sprint(&sprint.id).unwrap().status,
            SprintStatus::Active
        );
    }

    #[test]
    fn lenient_mode_continues_with_independent_tasks() {
        let mut rig = rig(false);
        let (_, task_ids) =
            story_with_tasks(&rig, &["failing-engineer", "passing-engineer"], false);
        let sprint = rig.scrum.plan_sprint("Sprint 1", "g", None, true).unwrap();

        let mut orchestrator = SprintOrchestrator::new(
            &rig.scrum,
            &mut rig.registry,
            &rig.worktrees,
            &rig.bus,
            Arc::new(AtomicBool::new(false)),
        );
        let report = orchestrator.run(&sprint.id, false).unwrap();

        assert_eq!(report.state, RunState::Idle);
        assert_eq!(report.failed, 1);
        assert_eq!(report.completed, 1);
        assert_eq!(
            rig.scrum.task(&task_ids[0]).unwrap().status,
            TaskStatus::Blocked
        );
        assert_eq!(
            rig.scrum.task(&task_ids[1]).unwrap().status,
            TaskStatus::Completed
        );
        assert_eq!(
            rig.scrum.sprint(&sprint.id).unwrap().status,
            SprintStatus::Completed
        );
    }

    #[test]
    fn lenient_mode_blocks_dependents_of_failures() {
        let mut rig = rig(false);
        let (_, task_ids) =
            story_with_tasks(&rig, &["failing-engineer", "passing-engineer"], true);
        let sprint = rig.scrum.plan_sprint("Sprint 1", "g", None, true).unwrap();

        let mut orchestrator = SprintOrchestrator::new(
            &rig.scrum,
            &mut rig.registry,
            &rig.worktrees,
            &rig.bus,
            Arc::new(AtomicBool::new(false)),
        );
        let report = orchestrator.run(&sprint.id, false).unwrap();

        assert_eq!(report.state, RunState::Idle);
        assert_eq!(report.failed, 2);
        assert_eq!(
            rig.scrum.task(&task_ids[1]).unwrap().status,
            TaskStatus::Blocked
        );
    }

    #[test]
    fn handoffs_are_recorded_between_agents() {
        let mut rig = rig(true);
        story_with_tasks(&rig, &["passing-engineer", "passing-engineer"], false);
        let sprint = rig.scrum.plan_sprint("Sprint 1", "g", None, true).unwrap();

        let mut orchestrator = SprintOrchestrator::new(
            &rig.scrum,
            &mut rig.registry,
            &rig.worktrees,
            &rig.bus,
            Arc::new(AtomicBool::new(false)),
        );
        let report = orchestrator.run(&sprint.id, false).unwrap();

        // One initial takeover; the same agent keeps the second task, so no
        // further handoff is logged.
        assert_eq!(report.handoffs.len(), 1);
        assert_eq!(report.handoffs[0].from_agent, None);
        assert_eq!(report.handoffs[0].to_agent, "passing-engineer");
        assert_eq!(report.handoffs[0].reason, "manual");
    }

    #[test]
    fn committed_bug_executes_as_fix_branch() {
        let mut rig = rig(true);
        let bug = rig
            .scrum
            .create_bug(crate::scrum::NewBug {
                title: "Crash on save".to_string(),
                severity: crate::types::Severity::Critical,
                priority: Priority::Critical,
                ..crate::scrum::NewBug::default()
            })
            .unwrap();
        let sprint = rig.scrum.plan_sprint("Sprint 1", "fix it", None, true).unwrap();
        assert!(sprint.contains(ItemKind::Bug, &bug.id));

        let mut orchestrator = SprintOrchestrator::new(
            &rig.scrum,
            &mut rig.registry,
            &rig.worktrees,
            &rig.bus,
            Arc::new(AtomicBool::new(false)),
        );
        let report = orchestrator.run(&sprint.id, false).unwrap();

        // The generic engineer has no test command, so the bug fails — but
        // it must have claimed a fix/ branch first.
        let record = rig.worktrees.record(&bug.id).unwrap();
        assert!(record.branch.starts_with("fix/CADE-"));
        assert_eq!(report.completed + report.failed, 1);
    }
}
