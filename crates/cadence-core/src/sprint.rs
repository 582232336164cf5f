use crate::types::{ItemKind, SprintStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DURATION_DAYS: u32 = 14;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedItem {
    pub kind: ItemKind,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurndownPoint {
    pub at: DateTime<Utc>,
    pub remaining_points: u32,
}

// ---------------------------------------------------------------------------
// Sprint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sprint {
    pub id: String,
    pub name: String,
    pub goal: String,
    pub duration_days: u32,
    pub status: SprintStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    /// Frozen scope, in planning order.
    #[serde(default)]
    pub committed_items: Vec<CommittedItem>,
    pub committed_points: u32,
    pub completed_points: u32,
    pub velocity_target: u32,
    #[serde(default)]
    pub burndown: Vec<BurndownPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrospective_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Sprint {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        goal: impl Into<String>,
        duration_days: u32,
        velocity_target: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            goal: goal.into(),
            duration_days,
            status: SprintStatus::Planned,
            start_date: None,
            end_date: None,
            committed_items: Vec::new(),
            committed_points: 0,
            completed_points: 0,
            velocity_target,
            burndown: Vec::new(),
            retrospective_notes: None,
            created_at: Utc::now(),
        }
    }

    pub fn commit(&mut self, kind: ItemKind, id: impl Into<String>, points: u32) {
        self.committed_items.push(CommittedItem {
            kind,
            id: id.into(),
        });
        self.committed_points += points;
    }

    pub fn contains(&self, kind: ItemKind, id: &str) -> bool {
        self.committed_items
            .iter()
            .any(|item| item.kind == kind && item.id == id)
    }

    /// Append a burndown sample and refresh the completed-point counter.
    pub fn record_burndown(&mut self, remaining_points: u32) {
        self.burndown.push(BurndownPoint {
            at: Utc::now(),
            remaining_points,
        });
        self.completed_points = self.committed_points.saturating_sub(remaining_points);
    }

    pub fn committed_ids(&self, kind: ItemKind) -> impl Iterator<Item = &str> {
        self.committed_items
            .iter()
            .filter(move |item| item.kind == kind)
            .map(|item| item.id.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sprint_is_planned_and_empty() {
        let sprint = Sprint::new("SPRINT-A1B2C3", "Sprint 1", "Ship login", 14, 20);
        assert_eq!(sprint.status, SprintStatus::Planned);
        assert!(sprint.committed_items.is_empty());
        assert_eq!(sprint.committed_points, 0);
        assert!(sprint.start_date.is_none());
    }

    #[test]
    fn commit_accumulates_points_in_order() {
        let mut sprint = Sprint::new("SPRINT-A", "S", "g", 14, 20);
        sprint.commit(ItemKind::Bug, "BUG-1", 8);
        sprint.commit(ItemKind::Story, "US-1", 3);
        assert_eq!(sprint.committed_points, 11);
        assert_eq!(sprint.committed_items[0].id, "BUG-1");
        assert_eq!(sprint.committed_items[1].id, "US-1");
        assert!(sprint.contains(ItemKind::Story, "US-1"));
        assert!(!sprint.contains(ItemKind::Bug, "US-1"));
    }

    #[test]
    fn burndown_tracks_completed_points() {
        let mut sprint = Sprint::new("SPRINT-A", "S", "g", 14, 20);
        sprint.commit(ItemKind::Story, "US-1", 5);
        sprint.commit(ItemKind::Story, "US-2", 3);
        sprint.record_burndown(8);
        assert_eq!(sprint.completed_points, 0);
        sprint.record_burndown(3);
        assert_eq!(sprint.completed_points, 5);
        assert_eq!(sprint.burndown.len(), 2);
    }

    #[test]
    fn committed_ids_filters_by_kind() {
        let mut sprint = Sprint::new("SPRINT-A", "S", "g", 14, 20);
        sprint.commit(ItemKind::Story, "US-1", 3);
        sprint.commit(ItemKind::Bug, "BUG-1", 5);
        sprint.commit(ItemKind::Story, "US-2", 2);
        let stories: Vec<&str> = sprint.committed_ids(ItemKind::Story).collect();
        assert_eq!(stories, vec!["US-1", "US-2"]);
    }

    #[test]
    fn json_roundtrip() {
        let mut sprint = Sprint::new("SPRINT-A1B2C3", "Sprint 1", "Ship login", 14, 20);
        sprint.commit(ItemKind::Story, "US-1", 5);
        sprint.record_burndown(5);
        let json = serde_json::to_string(&sprint).unwrap();
        let back: Sprint = serde_json::from_str(&json).unwrap();
        assert_eq!(back.committed_items, sprint.committed_items);
        assert_eq!(back.burndown.len(), 1);
        assert_eq!(back.velocity_target, 20);
    }
}
