use crate::types::{Priority, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ESTIMATED_HOURS: f64 = 4.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub story_id: String,
    pub title: String,
    pub description: String,
    pub technical_details: String,
    pub estimated_hours: f64,
    pub priority: Priority,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<String>,
    #[serde(default)]
    pub test_criteria: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        story_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            story_id: story_id.into(),
            title: title.into(),
            description: String::new(),
            technical_details: String::new(),
            estimated_hours: DEFAULT_ESTIMATED_HOURS,
            priority: Priority::Medium,
            status: TaskStatus::Pending,
            assigned_agent: None,
            test_criteria: Vec::new(),
            dependencies: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Rough point weight derived from the hour estimate (4 hours per
    /// point, truncated).
    pub fn points(&self) -> u32 {
        ((self.estimated_hours / 4.0) as u32).max(1)
    }

    pub fn complete(&mut self) {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn block(&mut self) {
        self.status = TaskStatus::Blocked;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_defaults() {
        let task = Task::new("TASK-A1B2C3", "US-XYZ123", "Implement email validation");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.estimated_hours, DEFAULT_ESTIMATED_HOURS);
        assert!(task.dependencies.is_empty());
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn points_from_hours() {
        let mut task = Task::new("TASK-A", "US-B", "t");
        assert_eq!(task.points(), 1);
        // Partial points truncate: 10h / 4 → 2, not 3.
        task.estimated_hours = 10.0;
        assert_eq!(task.points(), 2);
        task.estimated_hours = 12.0;
        assert_eq!(task.points(), 3);
        task.estimated_hours = 0.5;
        assert_eq!(task.points(), 1);
    }

    #[test]
    fn complete_stamps_time() {
        let mut task = Task::new("TASK-A", "US-B", "t");
        task.complete();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn json_roundtrip_with_dependencies() {
        let mut task = Task::new("TASK-A1B2C3", "US-XYZ123", "Add password check");
        task.dependencies.push("TASK-D4E5F6".into());
        task.test_criteria.push("rejects short passwords".into());
        let json = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back.dependencies, task.dependencies);
        assert_eq!(back.test_criteria, task.test_criteria);
        assert_eq!(back.status, TaskStatus::Pending);
    }
}
