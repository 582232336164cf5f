use crate::error::{CadenceError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub message: String,
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    /// 4-letter uppercase branch prefix; derived from the name when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abbrev: Option<String>,
}

impl ProjectConfig {
    pub fn abbrev(&self) -> String {
        self.abbrev
            .clone()
            .unwrap_or_else(|| paths::project_abbrev(&self.name))
    }
}

// ---------------------------------------------------------------------------
// ScrumConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrumConfig {
    #[serde(default = "default_velocity_target")]
    pub velocity_target: u32,
    #[serde(default = "default_sprint_duration")]
    pub default_sprint_duration_days: u32,
    /// Halt the sprint on the first task failure. When false, execution
    /// continues with the next independent task.
    #[serde(default = "default_true")]
    pub strict_mode: bool,
    /// Coverage percentage required for a task to complete, in [0, 100].
    #[serde(default = "default_coverage")]
    pub test_coverage_required: u32,
}

fn default_velocity_target() -> u32 {
    20
}

fn default_sprint_duration() -> u32 {
    14
}

fn default_coverage() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

impl Default for ScrumConfig {
    fn default() -> Self {
        Self {
            velocity_target: default_velocity_target(),
            default_sprint_duration_days: default_sprint_duration(),
            strict_mode: true,
            test_coverage_required: default_coverage(),
        }
    }
}

// ---------------------------------------------------------------------------
// AgentsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default = "default_true")]
    pub allow_dynamic_creation: bool,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            allow_dynamic_creation: true,
        }
    }
}

// ---------------------------------------------------------------------------
// WorktreesConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorktreesConfig {
    #[serde(default = "default_trees_root")]
    pub root: String,
}

fn default_trees_root() -> String {
    paths::DEFAULT_TREES_DIR.to_string()
}

impl Default for WorktreesConfig {
    fn default() -> Self {
        Self {
            root: default_trees_root(),
        }
    }
}

// ---------------------------------------------------------------------------
// PrConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrConfig {
    #[serde(default = "default_pr_tool")]
    pub tool: String,
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
}

fn default_pr_tool() -> String {
    "gh".to_string()
}

fn default_base_branch() -> String {
    "main".to_string()
}

impl Default for PrConfig {
    fn default() -> Self {
        Self {
            tool: default_pr_tool(),
            base_branch: default_base_branch(),
        }
    }
}

// ---------------------------------------------------------------------------
// TimeoutsConfig
// ---------------------------------------------------------------------------

/// Wall-clock subprocess timeouts, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_test_secs")]
    pub test_secs: u64,
    #[serde(default = "default_coverage_secs")]
    pub coverage_secs: u64,
    #[serde(default = "default_git_secs")]
    pub git_secs: u64,
    #[serde(default = "default_pr_secs")]
    pub pr_secs: u64,
}

fn default_test_secs() -> u64 {
    600
}

fn default_coverage_secs() -> u64 {
    300
}

fn default_git_secs() -> u64 {
    120
}

fn default_pr_secs() -> u64 {
    60
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            test_secs: default_test_secs(),
            coverage_secs: default_coverage_secs(),
            git_secs: default_git_secs(),
            pr_secs: default_pr_secs(),
        }
    }
}

impl TimeoutsConfig {
    pub fn test(&self) -> Duration {
        Duration::from_secs(self.test_secs)
    }

    pub fn coverage(&self) -> Duration {
        Duration::from_secs(self.coverage_secs)
    }

    pub fn git(&self) -> Duration {
        Duration::from_secs(self.git_secs)
    }

    pub fn pr(&self) -> Duration {
        Duration::from_secs(self.pr_secs)
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectConfig,
    #[serde(default)]
    pub scrum: ScrumConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub worktrees: WorktreesConfig,
    #[serde(default)]
    pub pr: PrConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: ProjectConfig {
                name: project_name.into(),
                abbrev: None,
            },
            scrum: ScrumConfig::default(),
            agents: AgentsConfig::default(),
            worktrees: WorktreesConfig::default(),
            pr: PrConfig::default(),
            timeouts: TimeoutsConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(CadenceError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        if self.project.name.trim().is_empty() {
            warnings.push(ConfigWarning {
                message: "project.name is empty".to_string(),
            });
        }
        if let Some(abbrev) = &self.project.abbrev {
            if abbrev.len() != 4 || !abbrev.chars().all(|c| c.is_ascii_uppercase()) {
                warnings.push(ConfigWarning {
                    message: format!(
                        "project.abbrev '{abbrev}' should be 4 uppercase letters"
                    ),
                });
            }
        }
        if self.scrum.test_coverage_required > 100 {
            warnings.push(ConfigWarning {
                message: format!(
                    "scrum.test_coverage_required={} is out of range [0, 100]",
                    self.scrum.test_coverage_required
                ),
            });
        }
        if self.scrum.velocity_target == 0 {
            warnings.push(ConfigWarning {
                message: "scrum.velocity_target=0: sprint planning will commit nothing"
                    .to_string(),
            });
        }
        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
