use crate::error::{CadenceError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const CADENCE_DIR: &str = ".cadence";
pub const DATA_DIR: &str = ".cadence/data";
pub const AGENTS_DIR: &str = ".cadence/agents";
pub const WORKTREES_DIR: &str = ".cadence/worktrees";
pub const BACKUPS_DIR: &str = ".cadence/backups";

pub const CONFIG_FILE: &str = ".cadence/config.yaml";
pub const WORKTREE_METADATA_FILE: &str = ".cadence/worktrees/metadata.json";
pub const LOCK_FILE: &str = ".cadence/.lock";

pub const DEFAULT_TREES_DIR: &str = "trees";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn cadence_dir(root: &Path) -> PathBuf {
    root.join(CADENCE_DIR)
}

pub fn data_dir(root: &Path) -> PathBuf {
    root.join(DATA_DIR)
}

pub fn data_file(root: &Path, name: &str) -> PathBuf {
    data_dir(root).join(format!("{name}.json"))
}

pub fn agents_dir(root: &Path) -> PathBuf {
    root.join(AGENTS_DIR)
}

pub fn agent_descriptor(root: &Path, name: &str) -> PathBuf {
    agents_dir(root).join(format!("{name}.yaml"))
}

pub fn agent_sidecar(root: &Path, name: &str) -> PathBuf {
    agents_dir(root).join(format!("{name}.md"))
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn worktree_metadata_path(root: &Path) -> PathBuf {
    root.join(WORKTREE_METADATA_FILE)
}

pub fn backups_dir(root: &Path) -> PathBuf {
    root.join(BACKUPS_DIR)
}

pub fn lock_path(root: &Path) -> PathBuf {
    root.join(LOCK_FILE)
}

pub fn trees_dir(root: &Path, trees_root: &str) -> PathBuf {
    root.join(trees_root)
}

// ---------------------------------------------------------------------------
// Name validation
// ---------------------------------------------------------------------------

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

/// Validate a kebab-case identifier (agent names, project slugs).
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 || !name_re().is_match(name) {
        return Err(CadenceError::InvalidName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Project abbreviation
// ---------------------------------------------------------------------------

/// Derive the 4-letter uppercase project abbreviation used in branch names.
///
/// Multi-word names (4+ words) abbreviate to their initials; shorter names
/// take their first four alphanumeric characters. Names with no alphanumeric
/// content fall back to "PROJ".
pub fn project_abbrev(name: &str) -> String {
    let words: Vec<&str> = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let abbrev: String = if words.len() >= 4 {
        words
            .iter()
            .take(4)
            .filter_map(|w| w.chars().next())
            .collect()
    } else {
        words.concat().chars().take(4).collect()
    };

    if abbrev.is_empty() {
        return "PROJ".to_string();
    }
    let mut out = abbrev.to_ascii_uppercase();
    while out.len() < 4 {
        out.push('X');
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
