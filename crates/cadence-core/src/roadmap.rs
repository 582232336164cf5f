use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// MilestoneStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    #[default]
    Planned,
    InProgress,
    Done,
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MilestoneStatus::Planned => "planned",
            MilestoneStatus::InProgress => "in_progress",
            MilestoneStatus::Done => "done",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Roadmap
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub name: String,
    pub target_date: DateTime<Utc>,
    #[serde(default)]
    pub story_ids: Vec<String>,
    pub status: MilestoneStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roadmap {
    pub id: String,
    pub name: String,
    pub vision: String,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    pub created_at: DateTime<Utc>,
}

impl Roadmap {
    pub fn new(id: impl Into<String>, name: impl Into<String>, vision: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            vision: vision.into(),
            milestones: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Seed the default four milestones spanning sixteen weeks, as done by
    /// project creation.
    pub fn seed(id: impl Into<String>, name: impl Into<String>, vision: impl Into<String>) -> Self {
        let mut roadmap = Self::new(id, name, vision);
        let now = Utc::now();
        let plan = [
            ("Foundation", 4),
            ("Core Features", 8),
            ("Integration & Hardening", 12),
            ("Launch", 16),
        ];
        for (name, weeks) in plan {
            roadmap.milestones.push(Milestone {
                name: name.to_string(),
                target_date: now + Duration::weeks(weeks),
                story_ids: Vec::new(),
                status: MilestoneStatus::Planned,
            });
        }
        roadmap
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_creates_four_milestones_over_sixteen_weeks() {
        let roadmap = Roadmap::seed("ROADMAP-A1B2C3", "cadence", "ship it");
        assert_eq!(roadmap.milestones.len(), 4);
        assert_eq!(roadmap.milestones[0].name, "Foundation");
        assert_eq!(roadmap.milestones[3].name, "Launch");
        let span = roadmap.milestones[3].target_date - roadmap.milestones[0].target_date;
        assert_eq!(span.num_weeks(), 12);
        assert!(roadmap
            .milestones
            .iter()
            .all(|m| m.status == MilestoneStatus::Planned));
    }

    #[test]
    fn milestones_are_ordered_by_date() {
        let roadmap = Roadmap::seed("ROADMAP-A", "p", "v");
        for pair in roadmap.milestones.windows(2) {
            assert!(pair[0].target_date < pair[1].target_date);
        }
    }

    #[test]
    fn json_roundtrip() {
        let roadmap = Roadmap::seed("ROADMAP-A1B2C3", "cadence", "ship it");
        let json = serde_json::to_string(&roadmap).unwrap();
        let back: Roadmap = serde_json::from_str(&json).unwrap();
        assert_eq!(back.milestones.len(), 4);
        assert_eq!(back.milestones[1].name, "Core Features");
    }
}
