//! CRUD, estimation, sprint planning, velocity, and burndown over the
//! persistence store. Every operation validates its inputs and persists
//! before returning.

use crate::bug::Bug;
use crate::config::Config;
use crate::epic::Epic;
use crate::error::{CadenceError, Result};
use crate::estimate;
use crate::ident::{self, IdKind};
use crate::roadmap::Roadmap;
use crate::sprint::{BurndownPoint, Sprint};
use crate::story::Story;
use crate::store::{DataStore, EntityKind};
use crate::task::{Task, DEFAULT_ESTIMATED_HOURS};
use crate::types::{
    is_valid_points, BugStatus, ItemKind, Priority, Severity, SprintStatus, StoryStatus,
    TaskStatus, POINT_SCALE,
};
use chrono::{Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, OnceLock};

/// Process-wide gate serializing Active-sprint transitions. The only global
/// mutable state in the core.
static ACTIVE_SPRINT_GATE: OnceLock<Mutex<()>> = OnceLock::new();

fn active_sprint_gate() -> MutexGuard<'static, ()> {
    ACTIVE_SPRINT_GATE
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Input records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct NewStory {
    pub title: String,
    pub role: String,
    pub want: String,
    pub benefit: String,
    pub acceptance_criteria: Vec<String>,
    pub priority: Priority,
    pub epic_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub story_id: String,
    pub title: String,
    pub description: String,
    pub technical_details: String,
    pub estimated_hours: Option<f64>,
    pub test_criteria: Vec<String>,
    pub dependencies: Vec<String>,
    pub priority: Priority,
}

#[derive(Debug, Clone, Default)]
pub struct NewBug {
    pub title: String,
    pub description: String,
    pub steps_to_reproduce: Vec<String>,
    pub expected: String,
    pub actual: String,
    pub severity: Severity,
    pub priority: Priority,
    pub story_points: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
pub enum EstimateMode {
    Auto,
    Points(u32),
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct BacklogReport {
    pub backlog_stories: usize,
    pub open_bugs: usize,
    pub total_points: u32,
    /// Point weight of unfinished tasks, derived from their hour estimates.
    pub open_task_points: u32,
    pub estimated_sprints: f64,
    pub critical_bugs: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SprintReport {
    pub sprint_id: String,
    pub name: String,
    pub goal: String,
    pub status: SprintStatus,
    pub committed_points: u32,
    pub completed_points: u32,
    pub completion_percent: f64,
    pub stories: usize,
    pub bugs: usize,
    pub burndown: Vec<BurndownPoint>,
}

// ---------------------------------------------------------------------------
// ScrumManager
// ---------------------------------------------------------------------------

pub struct ScrumManager {
    store: DataStore,
    config: Config,
}

impl ScrumManager {
    pub fn new(store: DataStore, config: Config) -> Self {
        Self { store, config }
    }

    pub fn open(root: &std::path::Path) -> Result<Self> {
        let config = Config::load(root)?;
        let store = DataStore::open(root)?;
        Ok(Self::new(store, config))
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Typed map access
    // -----------------------------------------------------------------------

    fn stories(&self) -> Result<BTreeMap<String, Story>> {
        self.store.load(EntityKind::Stories)
    }

    fn tasks(&self) -> Result<BTreeMap<String, Task>> {
        self.store.load(EntityKind::Tasks)
    }

    fn bugs(&self) -> Result<BTreeMap<String, Bug>> {
        self.store.load(EntityKind::Bugs)
    }

    fn sprints(&self) -> Result<BTreeMap<String, Sprint>> {
        self.store.load(EntityKind::Sprints)
    }

    fn epics(&self) -> Result<BTreeMap<String, Epic>> {
        self.store.load(EntityKind::Epics)
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn story(&self, id: &str) -> Result<Story> {
        self.stories()?
            .remove(id)
            .ok_or_else(|| CadenceError::not_found("story", id))
    }

    pub fn task(&self, id: &str) -> Result<Task> {
        self.tasks()?
            .remove(id)
            .ok_or_else(|| CadenceError::not_found("task", id))
    }

    pub fn bug(&self, id: &str) -> Result<Bug> {
        self.bugs()?
            .remove(id)
            .ok_or_else(|| CadenceError::not_found("bug", id))
    }

    pub fn sprint(&self, id: &str) -> Result<Sprint> {
        self.sprints()?
            .remove(id)
            .ok_or_else(|| CadenceError::not_found("sprint", id))
    }

    pub fn list_stories(&self) -> Result<Vec<Story>> {
        Ok(self.stories()?.into_values().collect())
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.tasks()?.into_values().collect())
    }

    pub fn list_bugs(&self) -> Result<Vec<Bug>> {
        Ok(self.bugs()?.into_values().collect())
    }

    pub fn list_sprints(&self) -> Result<Vec<Sprint>> {
        Ok(self.sprints()?.into_values().collect())
    }

    pub fn list_epics(&self) -> Result<Vec<Epic>> {
        Ok(self.epics()?.into_values().collect())
    }

    /// Tasks belonging to a story, in creation order.
    pub fn story_tasks(&self, story_id: &str) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tasks()?
            .into_values()
            .filter(|t| t.story_id == story_id)
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    pub fn active_sprint(&self) -> Result<Option<Sprint>> {
        Ok(self
            .sprints()?
            .into_values()
            .find(|s| s.status == SprintStatus::Active))
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    pub fn create_story(&self, input: NewStory) -> Result<Story> {
        for (field, value) in [
            ("title", &input.title),
            ("role", &input.role),
            ("want", &input.want),
            ("benefit", &input.benefit),
        ] {
            if value.trim().is_empty() {
                return Err(CadenceError::validation(field, "must not be empty"));
            }
        }

        let mut epics = self.epics()?;
        if let Some(epic_id) = &input.epic_id {
            if !epics.contains_key(epic_id) {
                return Err(CadenceError::not_found("epic", epic_id.clone()));
            }
        }

        let mut stories = self.stories()?;
        let id = ident::generate(IdKind::Story, |candidate| stories.contains_key(candidate));
        let mut story = Story::new(&id, &input.title, &input.role, &input.want, &input.benefit);
        story.acceptance_criteria = input.acceptance_criteria;
        story.priority = input.priority;
        story.epic_id = input.epic_id.clone();
        stories.insert(id.clone(), story.clone());
        self.store.save(EntityKind::Stories, &stories)?;

        if let Some(epic_id) = &input.epic_id {
            if let Some(epic) = epics.get_mut(epic_id) {
                epic.add_story(&id);
                self.store.save(EntityKind::Epics, &epics)?;
            }
        }

        Ok(story)
    }

    pub fn create_task(&self, input: NewTask) -> Result<Task> {
        if input.title.trim().is_empty() {
            return Err(CadenceError::validation("title", "must not be empty"));
        }
        if let Some(hours) = input.estimated_hours {
            if hours <= 0.0 {
                return Err(CadenceError::validation(
                    "estimated_hours",
                    "must be positive",
                ));
            }
        }

        let stories = self.stories()?;
        if !stories.contains_key(&input.story_id) {
            return Err(CadenceError::not_found("story", input.story_id.clone()));
        }

        let mut tasks = self.tasks()?;
        for dep in &input.dependencies {
            if !tasks.contains_key(dep) {
                return Err(CadenceError::not_found("task", dep.clone()));
            }
        }

        let id = ident::generate(IdKind::Task, |candidate| tasks.contains_key(candidate));
        let mut task = Task::new(&id, &input.story_id, &input.title);
        task.description = input.description;
        task.technical_details = input.technical_details;
        task.estimated_hours = input.estimated_hours.unwrap_or(DEFAULT_ESTIMATED_HOURS);
        task.test_criteria = input.test_criteria;
        task.dependencies = input.dependencies;
        task.priority = input.priority;
        tasks.insert(id, task.clone());
        self.store.save(EntityKind::Tasks, &tasks)?;
        Ok(task)
    }

    pub fn create_bug(&self, input: NewBug) -> Result<Bug> {
        if input.title.trim().is_empty() {
            return Err(CadenceError::validation("title", "must not be empty"));
        }
        if let Some(points) = input.story_points {
            if !is_valid_points(points) {
                return Err(CadenceError::validation(
                    "story_points",
                    format!("must be one of {POINT_SCALE:?}"),
                ));
            }
        }

        let mut bugs = self.bugs()?;
        let id = ident::generate(IdKind::Bug, |candidate| bugs.contains_key(candidate));
        let mut bug = Bug::new(&id, &input.title, input.severity);
        bug.description = input.description;
        bug.steps_to_reproduce = input.steps_to_reproduce;
        bug.expected = input.expected;
        bug.actual = input.actual;
        bug.priority = input.priority;
        bug.story_points = Some(
            input
                .story_points
                .unwrap_or_else(|| input.severity.default_points()),
        );
        bugs.insert(id, bug.clone());
        self.store.save(EntityKind::Bugs, &bugs)?;
        Ok(bug)
    }

    pub fn create_epic(
        &self,
        title: &str,
        theme: &str,
        business_value: &str,
    ) -> Result<Epic> {
        if title.trim().is_empty() {
            return Err(CadenceError::validation("title", "must not be empty"));
        }
        let mut epics = self.epics()?;
        let id = ident::generate(IdKind::Epic, |candidate| epics.contains_key(candidate));
        let epic = Epic::new(&id, title, theme, business_value);
        epics.insert(id, epic.clone());
        self.store.save(EntityKind::Epics, &epics)?;
        Ok(epic)
    }

    /// Create a roadmap pre-seeded with the default four milestones.
    pub fn create_roadmap(&self, name: &str, vision: &str) -> Result<Roadmap> {
        let mut roadmaps: BTreeMap<String, Roadmap> = self.store.load(EntityKind::Roadmaps)?;
        let id = ident::generate(IdKind::Roadmap, |candidate| roadmaps.contains_key(candidate));
        let roadmap = Roadmap::seed(&id, name, vision);
        roadmaps.insert(id, roadmap.clone());
        self.store.save(EntityKind::Roadmaps, &roadmaps)?;
        Ok(roadmap)
    }

    // -----------------------------------------------------------------------
    // Estimation
    // -----------------------------------------------------------------------

    pub fn estimate_story(&self, story_id: &str, mode: EstimateMode) -> Result<Story> {
        let mut stories = self.stories()?;
        let story = stories
            .get_mut(story_id)
            .ok_or_else(|| CadenceError::not_found("story", story_id))?;

        let points = match mode {
            EstimateMode::Points(points) => {
                if !is_valid_points(points) {
                    return Err(CadenceError::validation(
                        "points",
                        format!("must be one of {POINT_SCALE:?}"),
                    ));
                }
                points
            }
            EstimateMode::Auto => estimate::estimate(story),
        };
        story.set_points(points);
        let epic_id = story.epic_id.clone();
        let result = story.clone();
        self.store.save(EntityKind::Stories, &stories)?;

        if let Some(epic_id) = epic_id {
            self.refresh_epic_points(&epic_id)?;
        }
        Ok(result)
    }

    /// Auto-estimate every unestimated backlog story. Returns the stories
    /// that received an estimate.
    pub fn estimate_all(&self) -> Result<Vec<Story>> {
        let ids: Vec<String> = self
            .stories()?
            .into_values()
            .filter(|s| s.status == StoryStatus::Backlog && !s.is_estimated())
            .map(|s| s.id)
            .collect();
        let mut estimated = Vec::new();
        for id in ids {
            estimated.push(self.estimate_story(&id, EstimateMode::Auto)?);
        }
        Ok(estimated)
    }

    fn refresh_epic_points(&self, epic_id: &str) -> Result<()> {
        let stories = self.stories()?;
        let mut epics = self.epics()?;
        let Some(epic) = epics.get_mut(epic_id) else {
            return Ok(());
        };
        let mut total = 0;
        let mut completed = 0;
        for story_id in &epic.stories {
            if let Some(story) = stories.get(story_id) {
                let points = story.story_points.unwrap_or(0);
                total += points;
                if story.status == StoryStatus::Done {
                    completed += points;
                }
            }
        }
        epic.total_points = total;
        epic.completed_points = completed;
        self.store.save(EntityKind::Epics, &epics)
    }

    // -----------------------------------------------------------------------
    // Sprint planning
    // -----------------------------------------------------------------------

    /// Create a sprint and, when `auto_plan` is set, fill it greedily up to
    /// the configured velocity target: Critical bugs first, then estimated
    /// Backlog stories in priority order, then remaining open bugs. Selected
    /// stories are reserved by transitioning to Ready.
    pub fn plan_sprint(
        &self,
        name: &str,
        goal: &str,
        duration_days: Option<u32>,
        auto_plan: bool,
    ) -> Result<Sprint> {
        if name.trim().is_empty() {
            return Err(CadenceError::validation("name", "must not be empty"));
        }

        let mut sprints = self.sprints()?;
        let id = ident::generate(IdKind::Sprint, |candidate| sprints.contains_key(candidate));
        let mut sprint = Sprint::new(
            &id,
            name,
            goal,
            duration_days.unwrap_or(self.config.scrum.default_sprint_duration_days),
            self.config.scrum.velocity_target,
        );

        if auto_plan {
            let mut stories = self.stories()?;
            let bugs = self.bugs()?;
            let budget = sprint.velocity_target;
            let mut total: u32 = 0;

            let mut open_bugs: Vec<Bug> = bugs
                .values()
                .filter(|b| b.status == BugStatus::Open)
                .cloned()
                .collect();
            open_bugs.sort_by_key(|b| (b.priority.rank(), b.severity.default_points().wrapping_neg(), b.id.clone()));

            // Critical bugs claim capacity before anything else.
            for bug in open_bugs.iter().filter(|b| b.severity == Severity::Critical) {
                if total + bug.points() <= budget {
                    total += bug.points();
                    sprint.commit(ItemKind::Bug, &bug.id, bug.points());
                }
            }

            let mut backlog: Vec<Story> = stories
                .values()
                .filter(|s| s.status == StoryStatus::Backlog && s.is_estimated())
                .cloned()
                .collect();
            backlog.sort_by_key(|s| {
                (
                    s.priority.rank(),
                    s.story_points.unwrap_or(0).wrapping_neg(),
                    s.id.clone(),
                )
            });

            for story in backlog {
                let points = story.story_points.unwrap_or(0);
                if points > 0 && total + points <= budget {
                    total += points;
                    sprint.commit(ItemKind::Story, &story.id, points);
                    if let Some(s) = stories.get_mut(&story.id) {
                        s.set_status(StoryStatus::Ready);
                    }
                }
            }

            for bug in open_bugs.iter().filter(|b| b.severity != Severity::Critical) {
                if sprint.contains(ItemKind::Bug, &bug.id) {
                    continue;
                }
                if total + bug.points() <= budget {
                    total += bug.points();
                    sprint.commit(ItemKind::Bug, &bug.id, bug.points());
                }
            }

            // Persist the Ready reservations; bugs are left Open until work
            // actually starts on them.
            self.store.save(EntityKind::Stories, &stories)?;
        }

        sprints.insert(id, sprint.clone());
        self.store.save(EntityKind::Sprints, &sprints)?;
        Ok(sprint)
    }

    /// Start a sprint. Exactly one sprint may be Active process-wide; the
    /// check-and-set runs under the global gate.
    pub fn start_sprint(&self, sprint_id: &str) -> Result<Sprint> {
        let _gate = active_sprint_gate();

        let mut sprints = self.sprints()?;
        if let Some(active) = sprints.values().find(|s| s.status == SprintStatus::Active) {
            return Err(CadenceError::Conflict(format!(
                "sprint {} is already active",
                active.id
            )));
        }
        let sprint = sprints
            .get_mut(sprint_id)
            .ok_or_else(|| CadenceError::not_found("sprint", sprint_id))?;
        if sprint.status != SprintStatus::Planned {
            return Err(CadenceError::Conflict(format!(
                "sprint {} is {}, only planned sprints can start",
                sprint.id, sprint.status
            )));
        }

        let now = Utc::now();
        sprint.status = SprintStatus::Active;
        sprint.start_date = Some(now);
        sprint.end_date = Some(now + Duration::days(i64::from(sprint.duration_days)));
        let committed = sprint.committed_points;
        sprint.record_burndown(committed);
        let result = sprint.clone();
        self.store.save(EntityKind::Sprints, &sprints)?;
        Ok(result)
    }

    /// Complete a sprint, returning unfinished items to the backlog with
    /// their estimates intact and writing the final burndown sample.
    pub fn complete_sprint(
        &self,
        sprint_id: &str,
        retrospective: Option<String>,
    ) -> Result<Sprint> {
        let _gate = active_sprint_gate();

        let mut sprints = self.sprints()?;
        let sprint = sprints
            .get_mut(sprint_id)
            .ok_or_else(|| CadenceError::not_found("sprint", sprint_id))?;
        if sprint.status != SprintStatus::Active {
            return Err(CadenceError::Conflict(format!(
                "sprint {} is {}, only active sprints can complete",
                sprint.id, sprint.status
            )));
        }

        let mut stories = self.stories()?;
        let mut tasks = self.tasks()?;
        let mut bugs = self.bugs()?;

        let remaining = remaining_points(sprint, &stories, &bugs);
        sprint.record_burndown(remaining);

        for story_id in sprint.committed_ids(ItemKind::Story) {
            if let Some(story) = stories.get_mut(story_id) {
                if story.status != StoryStatus::Done {
                    story.set_status(StoryStatus::Backlog);
                    for task in tasks.values_mut().filter(|t| t.story_id == story.id) {
                        if task.status != TaskStatus::Completed {
                            task.status = TaskStatus::Pending;
                        }
                    }
                }
            }
        }
        for bug_id in sprint.committed_ids(ItemKind::Bug) {
            if let Some(bug) = bugs.get_mut(bug_id) {
                if !bug.status.is_resolved() {
                    bug.status = BugStatus::Open;
                }
            }
        }

        sprint.status = SprintStatus::Completed;
        sprint.end_date = Some(Utc::now());
        sprint.retrospective_notes = retrospective;
        let result = sprint.clone();

        self.store.save(EntityKind::Stories, &stories)?;
        self.store.save(EntityKind::Tasks, &tasks)?;
        self.store.save(EntityKind::Bugs, &bugs)?;
        self.store.save(EntityKind::Sprints, &sprints)?;
        Ok(result)
    }

    /// Cancel a Planned or Active sprint, releasing its reservations.
    pub fn cancel_sprint(&self, sprint_id: &str) -> Result<Sprint> {
        let _gate = active_sprint_gate();

        let mut sprints = self.sprints()?;
        let sprint = sprints
            .get_mut(sprint_id)
            .ok_or_else(|| CadenceError::not_found("sprint", sprint_id))?;
        if matches!(sprint.status, SprintStatus::Completed | SprintStatus::Cancelled) {
            return Err(CadenceError::Conflict(format!(
                "sprint {} is already {}",
                sprint.id, sprint.status
            )));
        }

        let mut stories = self.stories()?;
        for story_id in sprint.committed_ids(ItemKind::Story) {
            if let Some(story) = stories.get_mut(story_id) {
                if story.status != StoryStatus::Done {
                    story.set_status(StoryStatus::Backlog);
                }
            }
        }
        sprint.status = SprintStatus::Cancelled;
        let result = sprint.clone();
        self.store.save(EntityKind::Stories, &stories)?;
        self.store.save(EntityKind::Sprints, &sprints)?;
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Velocity and burndown
    // -----------------------------------------------------------------------

    /// Mean completed points over the last `n` Completed sprints; 0 with no
    /// history.
    pub fn velocity(&self, n: usize) -> Result<f64> {
        let mut completed: Vec<Sprint> = self
            .sprints()?
            .into_values()
            .filter(|s| s.status == SprintStatus::Completed)
            .collect();
        if completed.is_empty() || n == 0 {
            return Ok(0.0);
        }
        completed.sort_by(|a, b| b.end_date.cmp(&a.end_date));
        let recent = &completed[..n.min(completed.len())];
        let total: u32 = recent.iter().map(|s| s.completed_points).sum();
        Ok(f64::from(total) / recent.len() as f64)
    }

    /// Append a burndown sample to an Active sprint.
    pub fn record_burndown(&self, sprint_id: &str) -> Result<Sprint> {
        let mut sprints = self.sprints()?;
        let sprint = sprints
            .get_mut(sprint_id)
            .ok_or_else(|| CadenceError::not_found("sprint", sprint_id))?;
        let stories = self.stories()?;
        let bugs = self.bugs()?;
        let remaining = remaining_points(sprint, &stories, &bugs);
        sprint.record_burndown(remaining);
        let result = sprint.clone();
        self.store.save(EntityKind::Sprints, &sprints)?;
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Task state
    // -----------------------------------------------------------------------

    /// Transition a task. Entering In Progress requires every dependency to
    /// be Completed.
    pub fn set_task_status(&self, task_id: &str, status: TaskStatus) -> Result<Task> {
        let mut tasks = self.tasks()?;

        if status == TaskStatus::InProgress {
            let task = tasks
                .get(task_id)
                .ok_or_else(|| CadenceError::not_found("task", task_id))?;
            let unmet: Vec<String> = task
                .dependencies
                .iter()
                .filter(|dep| {
                    tasks
                        .get(*dep)
                        .map(|d| d.status != TaskStatus::Completed)
                        .unwrap_or(true)
                })
                .cloned()
                .collect();
            if !unmet.is_empty() {
                return Err(CadenceError::Dependency(format!(
                    "task {task_id} has incomplete dependencies: {}",
                    unmet.join(", ")
                )));
            }
        }

        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| CadenceError::not_found("task", task_id))?;
        match status {
            TaskStatus::Completed => task.complete(),
            other => task.status = other,
        }
        let story_id = task.story_id.clone();
        let result = task.clone();
        self.store.save(EntityKind::Tasks, &tasks)?;

        match status {
            TaskStatus::Completed => self.on_task_completed(&story_id)?,
            TaskStatus::InProgress => self.on_task_started(&story_id)?,
            _ => {}
        }
        Ok(result)
    }

    pub fn assign_agent(&self, task_id: &str, agent: &str) -> Result<Task> {
        let mut tasks = self.tasks()?;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| CadenceError::not_found("task", task_id))?;
        task.assigned_agent = Some(agent.to_string());
        let result = task.clone();
        self.store.save(EntityKind::Tasks, &tasks)?;
        Ok(result)
    }

    fn on_task_started(&self, story_id: &str) -> Result<()> {
        let mut stories = self.stories()?;
        if let Some(story) = stories.get_mut(story_id) {
            if story.status != StoryStatus::InProgress {
                story.set_status(StoryStatus::InProgress);
                self.store.save(EntityKind::Stories, &stories)?;
            }
        }
        Ok(())
    }

    /// Story goes Done once every one of its tasks is Completed; epic
    /// rollups and the active sprint's burndown follow.
    fn on_task_completed(&self, story_id: &str) -> Result<()> {
        let tasks = self.tasks()?;
        let all_done = tasks
            .values()
            .filter(|t| t.story_id == story_id)
            .all(|t| t.status == TaskStatus::Completed);
        if !all_done {
            return Ok(());
        }

        let mut stories = self.stories()?;
        let epic_id = match stories.get_mut(story_id) {
            Some(story) => {
                story.set_status(StoryStatus::Done);
                let epic_id = story.epic_id.clone();
                self.store.save(EntityKind::Stories, &stories)?;
                epic_id
            }
            None => None,
        };
        if let Some(epic_id) = epic_id {
            self.refresh_epic_points(&epic_id)?;
        }

        if let Some(active) = self.active_sprint()? {
            if active.contains(ItemKind::Story, story_id) {
                self.record_burndown(&active.id)?;
            }
        }
        Ok(())
    }

    pub fn set_bug_status(&self, bug_id: &str, status: BugStatus) -> Result<Bug> {
        if status == BugStatus::Resolved {
            return self.resolve_bug(bug_id);
        }
        let mut bugs = self.bugs()?;
        let bug = bugs
            .get_mut(bug_id)
            .ok_or_else(|| CadenceError::not_found("bug", bug_id))?;
        bug.status = status;
        let result = bug.clone();
        self.store.save(EntityKind::Bugs, &bugs)?;
        Ok(result)
    }

    /// Mark a bug resolved and refresh the active sprint's burndown.
    pub fn resolve_bug(&self, bug_id: &str) -> Result<Bug> {
        let mut bugs = self.bugs()?;
        let bug = bugs
            .get_mut(bug_id)
            .ok_or_else(|| CadenceError::not_found("bug", bug_id))?;
        bug.resolve();
        let result = bug.clone();
        self.store.save(EntityKind::Bugs, &bugs)?;

        if let Some(active) = self.active_sprint()? {
            if active.contains(ItemKind::Bug, bug_id) {
                self.record_burndown(&active.id)?;
            }
        }
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Reports
    // -----------------------------------------------------------------------

    pub fn backlog_report(&self) -> Result<BacklogReport> {
        let stories = self.stories()?;
        let tasks = self.tasks()?;
        let bugs = self.bugs()?;

        let backlog: Vec<&Story> = stories
            .values()
            .filter(|s| s.status == StoryStatus::Backlog)
            .collect();
        let open: Vec<&Bug> = bugs.values().filter(|b| b.status == BugStatus::Open).collect();
        let total_points: u32 = backlog.iter().filter_map(|s| s.story_points).sum();
        let open_task_points: u32 = tasks
            .values()
            .filter(|t| t.status != TaskStatus::Completed)
            .map(Task::points)
            .sum();
        let velocity = self.velocity(3)?;
        let velocity = if velocity > 0.0 {
            velocity
        } else {
            f64::from(self.config.scrum.velocity_target)
        };

        Ok(BacklogReport {
            backlog_stories: backlog.len(),
            open_bugs: open.len(),
            total_points,
            open_task_points,
            estimated_sprints: if total_points > 0 && velocity > 0.0 {
                f64::from(total_points) / velocity
            } else {
                0.0
            },
            critical_bugs: open
                .iter()
                .filter(|b| b.severity == Severity::Critical)
                .count(),
        })
    }

    pub fn sprint_report(&self, sprint_id: &str) -> Result<SprintReport> {
        let sprint = self.sprint(sprint_id)?;
        Ok(SprintReport {
            sprint_id: sprint.id.clone(),
            name: sprint.name.clone(),
            goal: sprint.goal.clone(),
            status: sprint.status,
            committed_points: sprint.committed_points,
            completed_points: sprint.completed_points,
            completion_percent: if sprint.committed_points > 0 {
                f64::from(sprint.completed_points) / f64::from(sprint.committed_points) * 100.0
            } else {
                0.0
            },
            stories: sprint.committed_ids(ItemKind::Story).count(),
            bugs: sprint.committed_ids(ItemKind::Bug).count(),
            burndown: sprint.burndown,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn remaining_points(
    sprint: &Sprint,
    stories: &BTreeMap<String, Story>,
    bugs: &BTreeMap<String, Bug>,
) -> u32 {
    let mut remaining = 0;
    for story_id in sprint.committed_ids(ItemKind::Story) {
        if let Some(story) = stories.get(story_id) {
            if story.status != StoryStatus::Done {
                remaining += story.story_points.unwrap_or(0);
            }
        }
    }
    for bug_id in sprint.committed_ids(ItemKind::Bug) {
        if let Some(bug) = bugs.get(bug_id) {
            if !bug.status.is_resolved() {
                remaining += bug.points();
            }
        }
    }
    remaining
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
