use serde::{Deserialize, Serialize};
use std::fmt;

fn normalize(s: &str) -> String {
    s.trim()
        .to_ascii_lowercase()
        .replace([' ', '-'], "_")
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Sort rank, lower is more urgent.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match normalize(&s).as_str() {
            "critical" => Priority::Critical,
            "high" => Priority::High,
            "medium" => Priority::Medium,
            "low" => Priority::Low,
            other => {
                eprintln!("warning: unknown priority '{other}', treating as 'medium'");
                Priority::Medium
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Severity {
    /// Story points auto-derived from severity when a bug has none.
    pub fn default_points(self) -> u32 {
        match self {
            Severity::Critical => 8,
            Severity::High => 5,
            Severity::Medium => 3,
            Severity::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match normalize(&s).as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            other => {
                eprintln!("warning: unknown severity '{other}', treating as 'medium'");
                Severity::Medium
            }
        })
    }
}

// ---------------------------------------------------------------------------
// StoryStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryStatus {
    #[default]
    Backlog,
    Ready,
    InProgress,
    Done,
    Blocked,
}

impl StoryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StoryStatus::Backlog => "backlog",
            StoryStatus::Ready => "ready",
            StoryStatus::InProgress => "in_progress",
            StoryStatus::Done => "done",
            StoryStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for StoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Persisted data may predate the enum: accept the legacy display strings
// ("In Progress") alongside canonical names, and degrade unknown values to
// the most permissive state with a warning.
impl<'de> Deserialize<'de> for StoryStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match normalize(&s).as_str() {
            "backlog" => StoryStatus::Backlog,
            "ready" => StoryStatus::Ready,
            "in_progress" | "inprogress" => StoryStatus::InProgress,
            "done" | "completed" | "complete" => StoryStatus::Done,
            "blocked" => StoryStatus::Blocked,
            other => {
                eprintln!("warning: unknown story status '{other}', treating as 'backlog'");
                StoryStatus::Backlog
            }
        })
    }
}

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Testing,
    Completed,
    Blocked,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Testing => "testing",
            TaskStatus::Completed => "completed",
            TaskStatus::Blocked => "blocked",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Blocked)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match normalize(&s).as_str() {
            "pending" | "backlog" | "todo" => TaskStatus::Pending,
            "in_progress" | "inprogress" | "active" | "started" => TaskStatus::InProgress,
            "testing" => TaskStatus::Testing,
            "completed" | "done" | "complete" | "finished" => TaskStatus::Completed,
            "blocked" => TaskStatus::Blocked,
            other => {
                eprintln!("warning: unknown task status '{other}', treating as 'pending'");
                TaskStatus::Pending
            }
        })
    }
}

// ---------------------------------------------------------------------------
// BugStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BugStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl BugStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BugStatus::Open => "open",
            BugStatus::InProgress => "in_progress",
            BugStatus::Resolved => "resolved",
            BugStatus::Closed => "closed",
        }
    }

    pub fn is_resolved(self) -> bool {
        matches!(self, BugStatus::Resolved | BugStatus::Closed)
    }
}

impl fmt::Display for BugStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BugStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match normalize(&s).as_str() {
            "open" => BugStatus::Open,
            "in_progress" | "inprogress" => BugStatus::InProgress,
            "resolved" | "fixed" => BugStatus::Resolved,
            "closed" => BugStatus::Closed,
            other => {
                eprintln!("warning: unknown bug status '{other}', treating as 'open'");
                BugStatus::Open
            }
        })
    }
}

// ---------------------------------------------------------------------------
// SprintStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SprintStatus {
    #[default]
    Planned,
    Active,
    Completed,
    Cancelled,
}

impl SprintStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SprintStatus::Planned => "planned",
            SprintStatus::Active => "active",
            SprintStatus::Completed => "completed",
            SprintStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SprintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SprintStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match normalize(&s).as_str() {
            "planned" | "planning" => SprintStatus::Planned,
            "active" => SprintStatus::Active,
            "completed" | "done" => SprintStatus::Completed,
            "cancelled" | "canceled" => SprintStatus::Cancelled,
            other => {
                eprintln!("warning: unknown sprint status '{other}', treating as 'planned'");
                SprintStatus::Planned
            }
        })
    }
}

// ---------------------------------------------------------------------------
// ItemKind
// ---------------------------------------------------------------------------

/// Kind discriminator for sprint-committed items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Story,
    Bug,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Story => "story",
            ItemKind::Bug => "bug",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Story points
// ---------------------------------------------------------------------------

/// The Fibonacci point scale.
pub const POINT_SCALE: &[u32] = &[1, 2, 3, 5, 8, 13, 21];

pub fn is_valid_points(points: u32) -> bool {
    POINT_SCALE.contains(&points)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_rank_ordering() {
        assert!(Priority::Critical.rank() < Priority::High.rank());
        assert!(Priority::High.rank() < Priority::Medium.rank());
        assert!(Priority::Medium.rank() < Priority::Low.rank());
    }

    #[test]
    fn severity_point_mapping() {
        assert_eq!(Severity::Critical.default_points(), 8);
        assert_eq!(Severity::High.default_points(), 5);
        assert_eq!(Severity::Medium.default_points(), 3);
        assert_eq!(Severity::Low.default_points(), 1);
    }

    #[test]
    fn statuses_serialize_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::to_string(&StoryStatus::Backlog).unwrap(),
            "\"backlog\""
        );
        assert_eq!(
            serde_json::to_string(&SprintStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
    }

    #[test]
    fn lenient_reader_accepts_display_form() {
        let s: StoryStatus = serde_json::from_str("\"In Progress\"").unwrap();
        assert_eq!(s, StoryStatus::InProgress);
        let t: TaskStatus = serde_json::from_str("\"Done\"").unwrap();
        assert_eq!(t, TaskStatus::Completed);
        let b: BugStatus = serde_json::from_str("\"Fixed\"").unwrap();
        assert_eq!(b, BugStatus::Resolved);
    }

    #[test]
    fn unknown_values_degrade_to_most_permissive() {
        let s: StoryStatus = serde_json::from_str("\"archived\"").unwrap();
        assert_eq!(s, StoryStatus::Backlog);
        let t: TaskStatus = serde_json::from_str("\"wontfix\"").unwrap();
        assert_eq!(t, TaskStatus::Pending);
        let b: BugStatus = serde_json::from_str("\"triaged\"").unwrap();
        assert_eq!(b, BugStatus::Open);
    }

    #[test]
    fn status_roundtrip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Testing,
            TaskStatus::Completed,
            TaskStatus::Blocked,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            let back: TaskStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn point_scale_is_fibonacci() {
        assert!(is_valid_points(1));
        assert!(is_valid_points(21));
        assert!(!is_valid_points(0));
        assert!(!is_valid_points(4));
        assert!(!is_valid_points(22));
    }
}
