use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named grouping of related stories with point rollups maintained by the
/// manager as member stories are estimated and completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Epic {
    pub id: String,
    pub title: String,
    pub theme: String,
    pub business_value: String,
    #[serde(default)]
    pub stories: Vec<String>,
    pub total_points: u32,
    pub completed_points: u32,
    pub created_at: DateTime<Utc>,
}

impl Epic {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        theme: impl Into<String>,
        business_value: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            theme: theme.into(),
            business_value: business_value.into(),
            stories: Vec::new(),
            total_points: 0,
            completed_points: 0,
            created_at: Utc::now(),
        }
    }

    /// Add a story id. Returns `false` if already present (idempotent).
    pub fn add_story(&mut self, story_id: &str) -> bool {
        if self.stories.iter().any(|s| s == story_id) {
            return false;
        }
        self.stories.push(story_id.to_string());
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_story_is_idempotent() {
        let mut epic = Epic::new("EPIC-A1B2C3", "Accounts", "identity", "retention");
        assert!(epic.add_story("US-1"));
        assert!(!epic.add_story("US-1"));
        assert_eq!(epic.stories.len(), 1);
    }

    #[test]
    fn json_roundtrip() {
        let mut epic = Epic::new("EPIC-A1B2C3", "Accounts", "identity", "retention");
        epic.add_story("US-1");
        epic.total_points = 8;
        let json = serde_json::to_string(&epic).unwrap();
        let back: Epic = serde_json::from_str(&json).unwrap();
        assert_eq!(back.stories, vec!["US-1".to_string()]);
        assert_eq!(back.total_points, 8);
    }
}
