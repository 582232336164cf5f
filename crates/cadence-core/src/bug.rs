use crate::types::{BugStatus, Priority, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bug {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub steps_to_reproduce: Vec<String>,
    pub expected: String,
    pub actual: String,
    pub severity: Severity,
    pub priority: Priority,
    pub status: BugStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_points: Option<u32>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Bug {
    pub fn new(id: impl Into<String>, title: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            steps_to_reproduce: Vec::new(),
            expected: String::new(),
            actual: String::new(),
            severity,
            priority: Priority::High,
            status: BugStatus::Open,
            story_points: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Points as scheduled: explicit if set, otherwise derived from severity.
    pub fn points(&self) -> u32 {
        self.story_points
            .unwrap_or_else(|| self.severity.default_points())
    }

    pub fn resolve(&mut self) {
        self.status = BugStatus::Resolved;
        self.resolved_at = Some(Utc::now());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
