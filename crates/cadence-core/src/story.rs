use crate::types::{Priority, StoryStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user story. Tasks reference it by `story_id`; the story itself holds no
/// task list — navigation goes through the manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub title: String,
    /// "As a <role>"
    pub role: String,
    /// "I want <want>"
    pub want: String,
    /// "so that <benefit>"
    pub benefit: String,
    pub description: String,
    pub acceptance_criteria: Vec<String>,
    pub priority: Priority,
    pub status: StoryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_points: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epic_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Story {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        role: impl Into<String>,
        want: impl Into<String>,
        benefit: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        let (role, want, benefit) = (role.into(), want.into(), benefit.into());
        Self {
            id: id.into(),
            title: title.into(),
            description: format!("As a {role}, I want {want}, so that {benefit}"),
            role,
            want,
            benefit,
            acceptance_criteria: Vec::new(),
            priority: Priority::Medium,
            status: StoryStatus::Backlog,
            story_points: None,
            epic_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Estimated stories are eligible for sprint planning.
    pub fn is_estimated(&self) -> bool {
        self.story_points.is_some_and(|p| p > 0)
    }

    pub fn set_status(&mut self, status: StoryStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn set_points(&mut self, points: u32) {
        self.story_points = Some(points);
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_story_starts_in_backlog_unestimated() {
        let story = Story::new("US-A1B2C3", "Login", "user", "to log in", "I can see my data");
        assert_eq!(story.status, StoryStatus::Backlog);
        assert!(!story.is_estimated());
        assert_eq!(
            story.description,
            "As a user, I want to log in, so that I can see my data"
        );
    }

    #[test]
    fn estimation_marks_eligible() {
        let mut story = Story::new("US-A1B2C3", "Login", "user", "to log in", "data");
        story.set_points(3);
        assert!(story.is_estimated());
        assert_eq!(story.story_points, Some(3));
    }

    #[test]
    fn json_roundtrip() {
        let mut story = Story::new("US-A1B2C3", "Login", "user", "to log in", "data");
        story.acceptance_criteria.push("email validation".into());
        story.set_points(5);
        let json = serde_json::to_string(&story).unwrap();
        let back: Story = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, story.id);
        assert_eq!(back.story_points, Some(5));
        assert_eq!(back.acceptance_criteria, story.acceptance_criteria);
        assert_eq!(back.created_at, story.created_at);
    }

    #[test]
    fn legacy_status_string_tolerated() {
        let json = r#"{
            "id": "US-LEGACY",
            "title": "Old story",
            "role": "user",
            "want": "things",
            "benefit": "reasons",
            "description": "As a user, I want things, so that reasons",
            "acceptance_criteria": [],
            "priority": "High",
            "status": "In Progress",
            "created_at": "2025-11-02T09:00:00Z",
            "updated_at": "2025-11-02T09:00:00Z"
        }"#;
        let story: Story = serde_json::from_str(json).unwrap();
        assert_eq!(story.status, StoryStatus::InProgress);
        assert_eq!(story.priority, Priority::High);
    }
}
