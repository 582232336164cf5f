//! One git worktree per active task.
//!
//! Worktrees live under `<project>/trees/`, each backed by a branch named
//! `<type>/<ABBREV>-<n>` where `<n>` is a project-global monotonic counter.
//! Records are persisted in `.cadence/worktrees/metadata.json`, owned
//! exclusively by this manager. The primary branch of the main checkout is
//! never mutated; all branch creation goes through `git worktree add`.

use crate::config::Config;
use crate::error::{CadenceError, Result};
use crate::io;
use crate::paths;
use crate::proc::{run_with_timeout, CommandOutput};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// BranchType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchType {
    Feature,
    Fix,
    Refactor,
}

impl BranchType {
    pub fn as_str(self) -> &'static str {
        match self {
            BranchType::Feature => "feature",
            BranchType::Fix => "fix",
            BranchType::Refactor => "refactor",
        }
    }

    /// Branch type for a story task, from its text. Refactor-flavored tasks
    /// get `refactor/` branches; everything else is a feature. Bug-parented
    /// work uses `Fix` directly.
    pub fn infer(title: &str, description: &str) -> BranchType {
        let text = format!("{title} {description}").to_ascii_lowercase();
        let is_refactor = text
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|w| w == "refactor" || w == "refactoring");
        if is_refactor {
            BranchType::Refactor
        } else {
            BranchType::Feature
        }
    }
}

impl fmt::Display for BranchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// WorktreeStatus / WorktreeRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorktreeStatus {
    Active,
    Pushed,
    PrOpen,
    Abandoned,
    Removed,
}

impl WorktreeStatus {
    /// True while the worktree is expected to exist on disk.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            WorktreeStatus::Active | WorktreeStatus::Pushed | WorktreeStatus::PrOpen
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorktreeStatus::Active => "active",
            WorktreeStatus::Pushed => "pushed",
            WorktreeStatus::PrOpen => "pr_open",
            WorktreeStatus::Abandoned => "abandoned",
            WorktreeStatus::Removed => "removed",
        }
    }
}

impl fmt::Display for WorktreeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorktreeRecord {
    pub task_id: String,
    pub agent: String,
    pub branch: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub status: WorktreeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorktreeListing {
    pub record: WorktreeRecord,
    /// Recorded as live but no longer known to git.
    pub ghost: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct WorktreeChanges {
    pub has_changes: bool,
    pub commits_ahead: u32,
    pub commits_behind: u32,
}

// ---------------------------------------------------------------------------
// Metadata file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct WorktreeMetadata {
    #[serde(default)]
    records: BTreeMap<String, WorktreeRecord>,
    /// Project-global branch counter; monotonic across sprints.
    #[serde(default = "default_branch_number")]
    next_branch_number: u64,
}

fn default_branch_number() -> u64 {
    1
}

// ---------------------------------------------------------------------------
// WorktreeManager
// ---------------------------------------------------------------------------

pub struct WorktreeManager {
    project_root: PathBuf,
    trees_root: PathBuf,
    trees_dir_name: String,
    abbrev: String,
    base_branch: String,
    pr_tool: String,
    git_timeout: Duration,
    pr_timeout: Duration,
}

impl WorktreeManager {
    pub fn new(root: &Path, config: &Config) -> Self {
        Self {
            project_root: root.to_path_buf(),
            trees_root: paths::trees_dir(root, &config.worktrees.root),
            trees_dir_name: config.worktrees.root.clone(),
            abbrev: config.project.abbrev(),
            base_branch: config.pr.base_branch.clone(),
            pr_tool: config.pr.tool.clone(),
            git_timeout: config.timeouts.git(),
            pr_timeout: config.timeouts.pr(),
        }
    }

    fn metadata_path(&self) -> PathBuf {
        paths::worktree_metadata_path(&self.project_root)
    }

    fn load_metadata(&self) -> Result<WorktreeMetadata> {
        let path = self.metadata_path();
        if !path.exists() {
            return Ok(WorktreeMetadata {
                records: BTreeMap::new(),
                next_branch_number: 1,
            });
        }
        let raw = std::fs::read_to_string(&path)?;
        serde_json::from_str(&raw).map_err(|e| CadenceError::Schema {
            file: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn save_metadata(&self, metadata: &WorktreeMetadata) -> Result<()> {
        let mut data = serde_json::to_string_pretty(metadata)?;
        data.push('\n');
        io::atomic_write(&self.metadata_path(), data.as_bytes())
    }

    pub fn record(&self, task_id: &str) -> Result<WorktreeRecord> {
        self.load_metadata()?
            .records
            .remove(task_id)
            .ok_or_else(|| CadenceError::not_found("worktree", task_id))
    }

    // -----------------------------------------------------------------------
    // Git plumbing
    // -----------------------------------------------------------------------

    fn git(&self, cwd: &Path, args: &[&str]) -> Result<CommandOutput> {
        let (output, _invocation) = run_with_timeout("git", args, cwd, self.git_timeout)?;
        Ok(output)
    }

    fn git_ok(&self, cwd: &Path, args: &[&str]) -> Result<String> {
        let output = self.git(cwd, args)?;
        if !output.success() {
            return Err(CadenceError::Subprocess {
                tool: format!("git {}", args.first().copied().unwrap_or_default()),
                reason: if output.timed_out {
                    "timed out".to_string()
                } else {
                    output.stderr.trim().to_string()
                },
            });
        }
        Ok(output.stdout)
    }

    /// Paths git currently knows as worktrees of this repository.
    fn registered_worktrees(&self) -> Result<BTreeSet<PathBuf>> {
        let stdout = self.git_ok(&self.project_root, &["worktree", "list", "--porcelain"])?;
        let mut registered = BTreeSet::new();
        for line in stdout.lines() {
            if let Some(path) = line.strip_prefix("worktree ") {
                let path = PathBuf::from(path.trim());
                let resolved = path.canonicalize().unwrap_or(path);
                registered.insert(resolved);
            }
        }
        Ok(registered)
    }

    fn is_registered(&self, registered: &BTreeSet<PathBuf>, path: &Path) -> bool {
        let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        registered.contains(&resolved)
    }

    fn resolve_base(&self) -> String {
        let verify = self.git(
            &self.project_root,
            &["rev-parse", "--verify", &self.base_branch],
        );
        match verify {
            Ok(output) if output.success() => self.base_branch.clone(),
            _ => "HEAD".to_string(),
        }
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Idempotent trees-root setup: create the directory and keep it out of
    /// version control.
    pub fn ensure_trees_root(&self) -> Result<()> {
        io::ensure_dir(&self.trees_root)?;
        io::ensure_gitignore_entry(&self.project_root, &format!("/{}/", self.trees_dir_name))
    }

    /// Create the worktree for a task. Refuses if a live worktree already
    /// exists for that task.
    pub fn create(
        &self,
        task_id: &str,
        agent: &str,
        branch_type: BranchType,
    ) -> Result<WorktreeRecord> {
        self.ensure_trees_root()?;
        let mut metadata = self.load_metadata()?;
        if let Some(existing) = metadata.records.get(task_id) {
            if existing.status.is_live() {
                return Err(CadenceError::Conflict(format!(
                    "task {task_id} already has a worktree at {}",
                    existing.path.display()
                )));
            }
        }

        let n = metadata.next_branch_number;
        let branch = format!("{}/{}-{}", branch_type, self.abbrev, n);
        let slug = format!("{}-{}", task_id.to_ascii_lowercase(), agent);
        let path = self.trees_root.join(slug);
        let path_str = path.display().to_string();
        let base = self.resolve_base();

        self.git_ok(
            &self.project_root,
            &["worktree", "add", "-b", &branch, &path_str, &base],
        )?;

        let record = WorktreeRecord {
            task_id: task_id.to_string(),
            agent: agent.to_string(),
            branch,
            path,
            created_at: Utc::now(),
            status: WorktreeStatus::Active,
            pr_url: None,
        };
        metadata.next_branch_number = n + 1;
        metadata.records.insert(task_id.to_string(), record.clone());
        self.save_metadata(&metadata)?;
        tracing::info!(task_id, branch = %record.branch, "worktree created");
        Ok(record)
    }

    /// Enumerate live worktrees, reconciling metadata against git and
    /// marking records git no longer knows as ghosts.
    pub fn list(&self) -> Result<Vec<WorktreeListing>> {
        let registered = self.registered_worktrees()?;
        let metadata = self.load_metadata()?;
        Ok(metadata
            .records
            .into_values()
            .filter(|record| record.status.is_live())
            .map(|record| {
                let ghost = !self.is_registered(&registered, &record.path);
                WorktreeListing { record, ghost }
            })
            .collect())
    }

    pub fn status(&self, task_id: &str) -> Result<WorktreeChanges> {
        let record = self.record(task_id)?;
        let porcelain = self.git_ok(&record.path, &["status", "--porcelain"])?;
        let has_changes = !porcelain.trim().is_empty();

        let range = format!("{}...HEAD", self.base_branch);
        let (commits_behind, commits_ahead) = match self.git(
            &record.path,
            &["rev-list", "--left-right", "--count", &range],
        ) {
            Ok(output) if output.success() => {
                let mut parts = output.stdout.split_whitespace();
                let behind = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
                let ahead = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
                (behind, ahead)
            }
            _ => (0, 0),
        };

        Ok(WorktreeChanges {
            has_changes,
            commits_ahead,
            commits_behind,
        })
    }

    /// Remove a worktree. Uncommitted changes are protected unless `force`
    /// is set; on refusal neither the filesystem nor the metadata changes.
    pub fn remove(&self, task_id: &str, force: bool) -> Result<()> {
        let mut metadata = self.load_metadata()?;
        let record = metadata
            .records
            .get_mut(task_id)
            .ok_or_else(|| CadenceError::not_found("worktree", task_id))?;
        if record.status == WorktreeStatus::Removed {
            return Ok(());
        }

        if !force && record.path.exists() {
            let porcelain = self.git_ok(&record.path, &["status", "--porcelain"])?;
            if !porcelain.trim().is_empty() {
                return Err(CadenceError::Conflict(format!(
                    "worktree for {task_id} has uncommitted changes; pass force to remove"
                )));
            }
        }

        let path_str = record.path.display().to_string();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(&path_str);
        let removal = self.git(&self.project_root, &args)?;
        if !removal.success() {
            // Fall back to prune plus manual deletion of a stale directory.
            let _ = self.git(&self.project_root, &["worktree", "prune"]);
            if record.path.exists() {
                std::fs::remove_dir_all(&record.path)?;
            }
        }

        record.status = WorktreeStatus::Removed;
        self.save_metadata(&metadata)?;
        tracing::info!(task_id, "worktree removed");
        Ok(())
    }

    /// Push the task's branch to origin with an upstream.
    pub fn push(&self, task_id: &str) -> Result<WorktreeRecord> {
        let mut metadata = self.load_metadata()?;
        let record = metadata
            .records
            .get_mut(task_id)
            .ok_or_else(|| CadenceError::not_found("worktree", task_id))?;
        let branch = record.branch.clone();
        self.git_ok(&record.path, &["push", "-u", "origin", &branch])?;
        record.status = WorktreeStatus::Pushed;
        let result = record.clone();
        self.save_metadata(&metadata)?;
        Ok(result)
    }

    /// Open a pull request through the configured PR tool. On failure the
    /// record is left untouched.
    pub fn open_pr(&self, task_id: &str, title: &str, body: &str) -> Result<String> {
        let mut metadata = self.load_metadata()?;
        let record = metadata
            .records
            .get_mut(task_id)
            .ok_or_else(|| CadenceError::not_found("worktree", task_id))?;

        if which::which(&self.pr_tool).is_err() {
            return Err(CadenceError::Subprocess {
                tool: self.pr_tool.clone(),
                reason: "PR tool not found on PATH".to_string(),
            });
        }

        let branch = record.branch.clone();
        let (output, _invocation) = run_with_timeout(
            &self.pr_tool,
            &[
                "pr",
                "create",
                "--title",
                title,
                "--body",
                body,
                "--base",
                &self.base_branch,
                "--head",
                &branch,
            ],
            &record.path,
            self.pr_timeout,
        )?;
        if !output.success() {
            return Err(CadenceError::Subprocess {
                tool: self.pr_tool.clone(),
                reason: if output.timed_out {
                    "timed out".to_string()
                } else {
                    output.stderr.trim().to_string()
                },
            });
        }

        let url = output.stdout.trim().to_string();
        record.status = WorktreeStatus::PrOpen;
        record.pr_url = Some(url.clone());
        self.save_metadata(&metadata)?;
        Ok(url)
    }

    /// Prune ghosts and, optionally, worktrees whose task is completed and
    /// whose tree has no uncommitted changes. Returns the affected task IDs.
    pub fn cleanup(
        &self,
        remove_completed: bool,
        is_completed: &dyn Fn(&str) -> bool,
    ) -> Result<Vec<String>> {
        let _ = self.git(&self.project_root, &["worktree", "prune"]);

        let mut metadata = self.load_metadata()?;
        let mut cleaned = Vec::new();

        for (task_id, record) in metadata.records.iter_mut() {
            if record.status.is_live() && !record.path.exists() {
                record.status = WorktreeStatus::Removed;
                cleaned.push(task_id.clone());
            }
        }
        self.save_metadata(&metadata)?;

        if remove_completed {
            let candidates: Vec<String> = metadata
                .records
                .values()
                .filter(|r| r.status.is_live() && is_completed(&r.task_id))
                .map(|r| r.task_id.clone())
                .collect();
            for task_id in candidates {
                match self.remove(&task_id, false) {
                    Ok(()) => cleaned.push(task_id),
                    // Uncommitted work stays protected.
                    Err(CadenceError::Conflict(_)) => {}
                    Err(err) => return Err(err),
                }
            }
        }

        Ok(cleaned)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
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
            "git {:?} failed\nstdout:\n{}\nstderr:\n{}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn init_repo(dir: &Path) {
        run_git(dir, &["init"]);
        run_git(dir, &["config", "user.name", "Cadence Test"]);
        run_git(dir, &["config", "user.email", "cadence-test@example.com"]);
        std::fs::write(dir.join("README.md"), "init").unwrap();
        run_git(dir, &["add", "."]);
        run_git(dir, &["commit", "-m", "init"]);
        run_git(dir, &["branch", "-M", "main"]);
    }

    fn manager(dir: &TempDir) -> WorktreeManager {
        init_repo(dir.path());
        let config = Config::new("cadence-test");
        WorktreeManager::new(dir.path(), &config)
    }

    #[test]
    fn branch_type_infers_refactor_from_task_text() {
        assert_eq!(
            BranchType::infer("Refactor the settings module", ""),
            BranchType::Refactor
        );
        assert_eq!(
            BranchType::infer("Tidy imports", "part of the big refactoring"),
            BranchType::Refactor
        );
        assert_eq!(
            BranchType::infer("Implement email validation", "use regex"),
            BranchType::Feature
        );
    }

    #[test]
    fn create_names_branch_from_abbrev_and_counter() {
        let dir = TempDir::new().unwrap();
        let wt = manager(&dir);
        let record = wt
            .create("TASK-AAAAAA", "python-engineer", BranchType::Feature)
            .unwrap();
        assert_eq!(record.branch, "feature/CADE-1");
        assert!(record.path.exists());
        assert_eq!(record.status, WorktreeStatus::Active);

        let second = wt
            .create("TASK-BBBBBB", "ruby-engineer", BranchType::Fix)
            .unwrap();
        assert_eq!(second.branch, "fix/CADE-2");
    }

    #[test]
    fn counter_is_monotonic_across_removals() {
        let dir = TempDir::new().unwrap();
        let wt = manager(&dir);
        wt.create("TASK-AAAAAA", "engineer", BranchType::Feature).unwrap();
        wt.remove("TASK-AAAAAA", false).unwrap();
        let record = wt.create("TASK-BBBBBB", "engineer", BranchType::Feature).unwrap();
        assert_eq!(record.branch, "feature/CADE-2");
    }

    #[test]
    fn create_refuses_duplicate_task() {
        let dir = TempDir::new().unwrap();
        let wt = manager(&dir);
        wt.create("TASK-AAAAAA", "engineer", BranchType::Feature).unwrap();
        let err = wt
            .create("TASK-AAAAAA", "engineer", BranchType::Feature)
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");
    }

    #[test]
    fn trees_root_lands_in_gitignore() {
        let dir = TempDir::new().unwrap();
        let wt = manager(&dir);
        wt.ensure_trees_root().unwrap();
        let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert!(gitignore.lines().any(|l| l == "/trees/"));
    }

    #[test]
    fn status_reports_changes_and_ahead_count() {
        let dir = TempDir::new().unwrap();
        let wt = manager(&dir);
        let record = wt.create("TASK-AAAAAA", "engineer", BranchType::Feature).unwrap();

        let clean = wt.status("TASK-AAAAAA").unwrap();
        assert!(!clean.has_changes);
        assert_eq!(clean.commits_ahead, 0);

        std::fs::write(record.path.join("work.txt"), "wip").unwrap();
        let dirty = wt.status("TASK-AAAAAA").unwrap();
        assert!(dirty.has_changes);

        run_git(&record.path, &["add", "."]);
        run_git(&record.path, &["commit", "-m", "work"]);
        let ahead = wt.status("TASK-AAAAAA").unwrap();
        assert!(!ahead.has_changes);
        assert_eq!(ahead.commits_ahead, 1);
        assert_eq!(ahead.commits_behind, 0);
    }

    #[test]
    fn remove_protects_uncommitted_changes() {
        let dir = TempDir::new().unwrap();
        let wt = manager(&dir);
        let record = wt.create("TASK-AAAAAA", "engineer", BranchType::Feature).unwrap();
        std::fs::write(record.path.join("work.txt"), "wip").unwrap();

        let err = wt.remove("TASK-AAAAAA", false).unwrap_err();
        assert_eq!(err.kind(), "conflict");
        // Both filesystem and metadata untouched.
        assert!(record.path.exists());
        assert_eq!(
            wt.record("TASK-AAAAAA").unwrap().status,
            WorktreeStatus::Active
        );

        wt.remove("TASK-AAAAAA", true).unwrap();
        assert!(!record.path.exists());
        assert_eq!(
            wt.record("TASK-AAAAAA").unwrap().status,
            WorktreeStatus::Removed
        );
    }

    #[test]
    fn list_marks_ghosts() {
        let dir = TempDir::new().unwrap();
        let wt = manager(&dir);
        let record = wt.create("TASK-AAAAAA", "engineer", BranchType::Feature).unwrap();

        let listings = wt.list().unwrap();
        assert_eq!(listings.len(), 1);
        assert!(!listings[0].ghost);

        // Delete behind git's back; the record is now a ghost.
        run_git(dir.path(), &["worktree", "remove", "--force", record.path.to_str().unwrap()]);
        let listings = wt.list().unwrap();
        assert_eq!(listings.len(), 1);
        assert!(listings[0].ghost);
    }

    #[test]
    fn cleanup_prunes_ghosts_and_completed() {
        let dir = TempDir::new().unwrap();
        let wt = manager(&dir);
        wt.create("TASK-GHOST1", "engineer", BranchType::Feature).unwrap();
        wt.create("TASK-DONE01", "engineer", BranchType::Feature).unwrap();

        // Make the first a ghost by deleting its directory.
        let ghost_path = wt.record("TASK-GHOST1").unwrap().path;
        std::fs::remove_dir_all(&ghost_path).unwrap();

        let cleaned = wt
            .cleanup(true, &|task_id| task_id == "TASK-DONE01")
            .unwrap();
        assert!(cleaned.contains(&"TASK-GHOST1".to_string()));
        assert!(cleaned.contains(&"TASK-DONE01".to_string()));
        assert_eq!(
            wt.record("TASK-DONE01").unwrap().status,
            WorktreeStatus::Removed
        );
    }

    #[test]
    fn push_sets_upstream_on_origin() {
        let dir = TempDir::new().unwrap();
        let wt = manager(&dir);

        // Local bare repository standing in for the remote.
        let remote = TempDir::new().unwrap();
        run_git(remote.path(), &["init", "--bare"]);
        run_git(
            dir.path(),
            &["remote", "add", "origin", remote.path().to_str().unwrap()],
        );

        let record = wt.create("TASK-AAAAAA", "engineer", BranchType::Feature).unwrap();
        std::fs::write(record.path.join("work.txt"), "done").unwrap();
        run_git(&record.path, &["add", "."]);
        run_git(&record.path, &["commit", "-m", "work"]);

        let pushed = wt.push("TASK-AAAAAA").unwrap();
        assert_eq!(pushed.status, WorktreeStatus::Pushed);
    }

    #[test]
    fn open_pr_fails_cleanly_without_tool() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        let mut config = Config::new("cadence-test");
        config.pr.tool = "cadence-missing-pr-tool".to_string();
        let wt = WorktreeManager::new(dir.path(), &config);

        wt.create("TASK-AAAAAA", "engineer", BranchType::Feature).unwrap();
        let err = wt.open_pr("TASK-AAAAAA", "title", "body").unwrap_err();
        assert_eq!(err.kind(), "subprocess");
        // State unchanged.
        assert_eq!(
            wt.record("TASK-AAAAAA").unwrap().status,
            WorktreeStatus::Active
        );
    }
}
