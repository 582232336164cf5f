//! The programmatic façade driving the core.
//!
//! External collaborators (the CLI, the sync layer) call these operations
//! and nothing else. Inputs and outputs are structured records; errors are
//! returned, never swallowed, and nothing here writes to the terminal.

use crate::agent::{AgentDescriptor, AgentRegistry};
use crate::bug::Bug;
use crate::config::Config;
use crate::epic::Epic;
use crate::error::{CadenceError, Result};
use crate::event::EventBus;
use crate::executor::{AgentExecutor, TaskOutcome, TaskResult};
use crate::jira::{ChangeHooks, ChangeNotice, SyncQueue};
use crate::matcher::{workload_of, MatchOutcome, TaskAgentMatcher};
use crate::orchestrator::{SprintOrchestrator, SprintRunReport};
use crate::roadmap::Roadmap;
use crate::scrum::{
    BacklogReport, EstimateMode, NewBug, NewStory, NewTask, ScrumManager, SprintReport,
};
use crate::sprint::Sprint;
use crate::story::Story;
use crate::store::DataStore;
use crate::task::Task;
use crate::types::TaskStatus;
use crate::event::Event;
use crate::worktree::{BranchType, WorktreeListing, WorktreeManager};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Stories,
    Tasks,
    Bugs,
    Sprints,
    Epics,
    Agents,
    Worktrees,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Listing {
    Stories(Vec<Story>),
    Tasks(Vec<Task>),
    Bugs(Vec<Bug>),
    Sprints(Vec<Sprint>),
    Epics(Vec<Epic>),
    Agents(Vec<AgentDescriptor>),
    Worktrees(Vec<WorktreeListing>),
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub project: String,
    pub active_sprint: Option<SprintReport>,
    pub backlog: BacklogReport,
    pub agents: usize,
    pub live_worktrees: usize,
}

// ---------------------------------------------------------------------------
// Facade
// ---------------------------------------------------------------------------

pub struct Facade {
    config: Config,
    scrum: ScrumManager,
    registry: AgentRegistry,
    worktrees: WorktreeManager,
    bus: EventBus,
    sync_queue: SyncQueue,
    hooks: ChangeHooks,
    cancel: Arc<AtomicBool>,
}

impl Facade {
    /// Initialize a project: state tree, config, built-in agent descriptor
    /// files, and a seeded roadmap. Idempotent.
    pub fn init(root: &Path, project_name: &str) -> Result<Self> {
        let config = match Config::load(root) {
            Ok(config) => config,
            Err(CadenceError::NotInitialized) => {
                let config = Config::new(project_name);
                config.save(root)?;
                config
            }
            Err(err) => return Err(err),
        };

        let store = DataStore::open(root)?;
        let registry = AgentRegistry::load(root)?;
        registry.persist_builtins()?;

        let scrum = ScrumManager::new(store, config.clone());
        if scrum.store().load::<Roadmap>(crate::store::EntityKind::Roadmaps)?.is_empty() {
            scrum.create_roadmap(
                &config.project.name,
                &format!("Delivery roadmap for {}", config.project.name),
            )?;
        }

        let worktrees = WorktreeManager::new(root, &config);
        Ok(Self {
            scrum,
            registry,
            worktrees,
            bus: EventBus::new(),
            sync_queue: SyncQueue::new(),
            hooks: ChangeHooks::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            config,
        })
    }

    /// Open an already-initialized project.
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        let store = DataStore::open(root)?;
        let registry = AgentRegistry::load(root)?;
        let scrum = ScrumManager::new(store, config.clone());
        let worktrees = WorktreeManager::new(root, &config);
        Ok(Self {
            scrum,
            registry,
            worktrees,
            bus: EventBus::new(),
            sync_queue: SyncQueue::new(),
            hooks: ChangeHooks::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            config,
        })
    }

    // -----------------------------------------------------------------------
    // Component access
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scrum(&self) -> &ScrumManager {
        &self.scrum
    }

    pub fn worktrees(&self) -> &WorktreeManager {
        &self.worktrees
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn sync_queue(&self) -> &SyncQueue {
        &self.sync_queue
    }

    pub fn change_hooks(&self) -> &ChangeHooks {
        &self.hooks
    }

    /// Subscribe to the typed event stream. Delivery is synchronous and
    /// in-order.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&Event) + Send + 'static,
    {
        self.bus.subscribe(callback);
    }

    /// Ask a running sprint to stop at the next phase boundary.
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    // -----------------------------------------------------------------------
    // SCRUM operations
    // -----------------------------------------------------------------------

    pub fn create_story(&self, input: NewStory) -> Result<Story> {
        let story = self.scrum.create_story(input)?;
        self.hooks
            .fire(&ChangeNotice::story(&story.id, story.status.as_str()));
        Ok(story)
    }

    pub fn create_task(&self, input: NewTask) -> Result<Task> {
        let task = self.scrum.create_task(input)?;
        self.hooks.fire(&ChangeNotice::task(&task.id, task.status));
        Ok(task)
    }

    pub fn create_bug(&self, input: NewBug) -> Result<Bug> {
        self.scrum.create_bug(input)
    }

    pub fn create_epic(&self, title: &str, theme: &str, business_value: &str) -> Result<Epic> {
        self.scrum.create_epic(title, theme, business_value)
    }

    /// Estimate one story, or every unestimated backlog story when
    /// `story_id` is None.
    pub fn estimate(&self, story_id: Option<&str>, mode: EstimateMode) -> Result<Vec<Story>> {
        match story_id {
            Some(id) => Ok(vec![self.scrum.estimate_story(id, mode)?]),
            None => self.scrum.estimate_all(),
        }
    }

    pub fn plan_sprint(
        &self,
        name: &str,
        goal: &str,
        duration_days: Option<u32>,
        auto_plan: bool,
    ) -> Result<Sprint> {
        self.scrum.plan_sprint(name, goal, duration_days, auto_plan)
    }

    pub fn complete_sprint(&self, sprint_id: &str, retrospective: Option<String>) -> Result<Sprint> {
        self.scrum.complete_sprint(sprint_id, retrospective)
    }

    pub fn velocity(&self, sprints: usize) -> Result<f64> {
        self.scrum.velocity(sprints)
    }

    /// Manually pin a task to an agent. The agent must exist.
    pub fn assign_agent(&self, task_id: &str, agent: &str) -> Result<Task> {
        if !self.registry.contains(agent) {
            return Err(CadenceError::not_found("agent", agent));
        }
        let task = self.scrum.assign_agent(task_id, agent)?;
        self.hooks.fire(&ChangeNotice::task(&task.id, task.status));
        Ok(task)
    }

    pub fn create_agent(&mut self, descriptor: AgentDescriptor) -> Result<AgentDescriptor> {
        Ok(self.registry.create(descriptor, true)?.clone())
    }

    /// Agents a story is likely to need, for planning conversations.
    pub fn suggest_agents(&self, story_id: &str) -> Result<Vec<String>> {
        let story = self.scrum.story(story_id)?;
        Ok(crate::matcher::suggest_agents(&story))
    }

    /// Match a task to an agent without executing it.
    pub fn match_agent(&mut self, task_id: &str) -> Result<MatchOutcome> {
        let task = self.scrum.task(task_id)?;
        let tasks: BTreeMap<String, Task> = self
            .scrum
            .list_tasks()?
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();
        let workload = workload_of(&tasks);
        let matcher = TaskAgentMatcher::new(self.config.agents.allow_dynamic_creation);
        matcher.match_task(&task, &mut self.registry, &workload)
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Run the full sprint loop for a planned sprint.
    pub fn start(&mut self, sprint_id: &str, cleanup_worktrees: bool) -> Result<SprintRunReport> {
        let report = {
            let mut orchestrator = SprintOrchestrator::new(
                &self.scrum,
                &mut self.registry,
                &self.worktrees,
                &self.bus,
                Arc::clone(&self.cancel),
            );
            orchestrator.run(sprint_id, cleanup_worktrees)?
        };
        for run in &report.runs {
            if let Ok(task) = self.scrum.task(&run.item_id) {
                self.hooks.fire(&ChangeNotice::task(&task.id, task.status));
            }
        }
        Ok(report)
    }

    /// Execute a single task outside a sprint run: match, acquire the
    /// worktree, run the test-first sequence, publish the branch.
    pub fn delegate(&mut self, task_id: &str) -> Result<TaskResult> {
        let task = self.scrum.task(task_id)?;
        let outcome = self.match_agent(task_id)?;
        let agent = self
            .registry
            .get(&outcome.agent)
            .cloned()
            .ok_or_else(|| CadenceError::not_found("agent", outcome.agent.clone()))?;
        if task.assigned_agent.is_none() {
            self.scrum.assign_agent(task_id, &agent.name)?;
        }

        let record = match self.worktrees.record(task_id) {
            Ok(record) if record.status.is_live() => record,
            _ => self.worktrees.create(
                task_id,
                &agent.name,
                BranchType::infer(&task.title, &task.description),
            )?,
        };

        self.scrum.set_task_status(task_id, TaskStatus::InProgress)?;
        let executor = AgentExecutor::new(&self.config, &self.bus);
        let mut result = executor.execute(&task, &agent, &record.path, &self.cancel);

        match &result.outcome {
            TaskOutcome::Completed => {
                self.scrum.set_task_status(task_id, TaskStatus::Completed)?;
                if self.worktrees.push(task_id).is_ok() {
                    let title = format!("[{}] {}", task_id, task.title);
                    let body = format!(
                        "Task: {task_id}\nAgent: {}\nBranch: {}\n",
                        record.agent, record.branch
                    );
                    if let Ok(url) = self.worktrees.open_pr(task_id, &title, &body) {
                        result.created_pr_url = Some(url);
                    }
                }
            }
            _ => {
                self.scrum.set_task_status(task_id, TaskStatus::Blocked)?;
            }
        }
        let task = self.scrum.task(task_id)?;
        self.hooks.fire(&ChangeNotice::task(task_id, task.status));
        self.bus.publish(match &result.outcome {
            TaskOutcome::Completed => Event::TaskCompleted {
                task_id: task_id.to_string(),
                coverage_percent: result.coverage_percent,
                at: Utc::now(),
            },
            TaskOutcome::Failed => Event::TaskFailed {
                task_id: task_id.to_string(),
                reason: result.summary.clone(),
                at: Utc::now(),
            },
            TaskOutcome::Blocked { reason } => Event::TaskFailed {
                task_id: task_id.to_string(),
                reason: reason.clone(),
                at: Utc::now(),
            },
        });
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn status(&self) -> Result<StatusReport> {
        let active = self.scrum.active_sprint()?;
        let active_sprint = match active {
            Some(sprint) => Some(self.scrum.sprint_report(&sprint.id)?),
            None => None,
        };
        Ok(StatusReport {
            project: self.config.project.name.clone(),
            active_sprint,
            backlog: self.scrum.backlog_report()?,
            agents: self.registry.list().len(),
            live_worktrees: self.worktrees.list().map(|l| l.len()).unwrap_or(0),
        })
    }

    /// List entities of a kind, optionally filtered by status string.
    pub fn list(&self, kind: ListKind, status_filter: Option<&str>) -> Result<Listing> {
        let matches = |status: &str| {
            status_filter
                .map(|wanted| wanted.eq_ignore_ascii_case(status))
                .unwrap_or(true)
        };
        Ok(match kind {
            ListKind::Stories => Listing::Stories(
                self.scrum
                    .list_stories()?
                    .into_iter()
                    .filter(|s| matches(s.status.as_str()))
                    .collect(),
            ),
            ListKind::Tasks => Listing::Tasks(
                self.scrum
                    .list_tasks()?
                    .into_iter()
                    .filter(|t| matches(t.status.as_str()))
                    .collect(),
            ),
            ListKind::Bugs => Listing::Bugs(
                self.scrum
                    .list_bugs()?
                    .into_iter()
                    .filter(|b| matches(b.status.as_str()))
                    .collect(),
            ),
            ListKind::Sprints => Listing::Sprints(
                self.scrum
                    .list_sprints()?
                    .into_iter()
                    .filter(|s| matches(s.status.as_str()))
                    .collect(),
            ),
            ListKind::Epics => Listing::Epics(self.scrum.list_epics()?),
            ListKind::Agents => {
                Listing::Agents(self.registry.list().into_iter().cloned().collect())
            }
            ListKind::Worktrees => Listing::Worktrees(self.worktrees.list()?),
        })
    }

    pub fn sprint_report(&self, sprint_id: &str) -> Result<SprintReport> {
        self.scrum.sprint_report(sprint_id)
    }

    /// Take a timestamped backup of the data directory.
    pub fn backup(&self) -> Result<std::path::PathBuf> {
        self.scrum.store().backup()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn facade(dir: &TempDir) -> Facade {
        Facade::init(dir.path(), "cadence-test").unwrap()
    }

    #[test]
    fn init_is_idempotent_and_seeds_state() {
        let dir = TempDir::new().unwrap();
        let _first = facade(&dir);
        let second = facade(&dir);

        // Data files, agent descriptors, and a seeded roadmap exist.
        assert!(dir.path().join(".cadence/data/stories.json").exists());
        assert!(dir
            .path()
            .join(".cadence/agents/python-engineer.yaml")
            .exists());
        let roadmaps = second
            .scrum()
            .store()
            .load::<Roadmap>(crate::store::EntityKind::Roadmaps)
            .unwrap();
        assert_eq!(roadmaps.len(), 1);
        let roadmap = roadmaps.values().next().unwrap();
        assert_eq!(roadmap.milestones.len(), 4);
    }

    #[test]
    fn open_requires_initialization() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Facade::open(dir.path()),
            Err(CadenceError::NotInitialized)
        ));
    }

    #[test]
    fn assign_agent_requires_known_agent() {
        let dir = TempDir::new().unwrap();
        let facade = facade(&dir);
        let story = facade
            .create_story(NewStory {
                title: "Login".to_string(),
                role: "user".to_string(),
                want: "login".to_string(),
                benefit: "access".to_string(),
                priority: Priority::High,
                ..NewStory::default()
            })
            .unwrap();
        let task = facade
            .create_task(NewTask {
                story_id: story.id.clone(),
                title: "build it".to_string(),
                ..NewTask::default()
            })
            .unwrap();

        let err = facade.assign_agent(&task.id, "nobody").unwrap_err();
        assert_eq!(err.kind(), "not_found");
        facade.assign_agent(&task.id, "python-engineer").unwrap();
    }

    #[test]
    fn change_hooks_fire_on_task_changes() {
        let dir = TempDir::new().unwrap();
        let facade = facade(&dir);
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        facade
            .change_hooks()
            .register(move |notice| sink.lock().unwrap().push(notice.id.clone()));

        let story = facade
            .create_story(NewStory {
                title: "Login".to_string(),
                role: "user".to_string(),
                want: "login".to_string(),
                benefit: "access".to_string(),
                ..NewStory::default()
            })
            .unwrap();
        facade
            .create_task(NewTask {
                story_id: story.id.clone(),
                title: "build it".to_string(),
                ..NewTask::default()
            })
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].starts_with("US-"));
        assert!(seen[1].starts_with("TASK-"));
    }

    #[test]
    fn list_filters_by_status() {
        let dir = TempDir::new().unwrap();
        let facade = facade(&dir);
        facade
            .create_story(NewStory {
                title: "Login".to_string(),
                role: "user".to_string(),
                want: "login".to_string(),
                benefit: "access".to_string(),
                ..NewStory::default()
            })
            .unwrap();

        match facade.list(ListKind::Stories, Some("backlog")).unwrap() {
            Listing::Stories(stories) => assert_eq!(stories.len(), 1),
            other => panic!("unexpected listing: {other:?}"),
        }
        match facade.list(ListKind::Stories, Some("done")).unwrap() {
            Listing::Stories(stories) => assert!(stories.is_empty()),
            other => panic!("unexpected listing: {other:?}"),
        }
    }

    #[test]
    fn status_reports_backlog_and_agents() {
        let dir = TempDir::new().unwrap();
        let facade = facade(&dir);
        let report = facade.status().unwrap();
        assert_eq!(report.project, "cadence-test");
        assert!(report.active_sprint.is_none());
        assert!(report.agents > 10);
    }

    #[test]
    fn sync_queue_is_exposed() {
        let dir = TempDir::new().unwrap();
        let facade = facade(&dir);
        assert!(facade.sync_queue().is_empty());
    }
}
