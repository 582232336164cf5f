//! Keyword-weighted task-to-agent matching.
//!
//! Scans the task's text against a technology map (strong signal) and a
//! task-type map (weak fallback), balances the workload among near-tied
//! candidates, and materializes missing agents on demand from a template.

use crate::agent::{descriptor_template, AgentRegistry};
use crate::error::Result;
use crate::task::Task;
use crate::types::TaskStatus;
use serde::Serialize;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Keyword maps
// ---------------------------------------------------------------------------

/// Technology keyword → agent name.
const TECH_AGENT_MAP: &[(&str, &str)] = &[
    ("python", "python-engineer"),
    ("django", "python-engineer"),
    ("flask", "python-engineer"),
    ("fastapi", "python-engineer"),
    ("go", "golang-engineer"),
    ("golang", "golang-engineer"),
    ("gin", "golang-engineer"),
    ("react", "frontend-engineer"),
    ("vue", "frontend-engineer"),
    ("angular", "frontend-engineer"),
    ("typescript", "frontend-engineer"),
    ("javascript", "frontend-engineer"),
    ("docker", "devops-engineer"),
    ("kubernetes", "devops-engineer"),
    ("terraform", "devops-engineer"),
    ("postgres", "database-engineer"),
    ("mongo", "database-engineer"),
    ("sql", "database-engineer"),
    ("pytest", "test-runner"),
    ("jest", "test-runner"),
    ("unittest", "test-runner"),
    ("coverage", "test-runner"),
    ("rails", "ruby-engineer"),
    ("ruby", "ruby-engineer"),
    ("rspec", "ruby-engineer"),
    ("spring", "java-engineer"),
    ("java", "java-engineer"),
    ("rust", "rust-engineer"),
    ("cargo", "rust-engineer"),
    ("swift", "swift-engineer"),
    ("ios", "swift-engineer"),
    ("kotlin", "kotlin-engineer"),
    ("android", "kotlin-engineer"),
    ("elixir", "elixir-engineer"),
    ("phoenix", "elixir-engineer"),
    ("r", "r-engineer"),
    ("ggplot", "r-engineer"),
    ("haskell", "haskell-engineer"),
    ("cabal", "haskell-engineer"),
];

/// Task-type keyword → agent name, consulted only when no technology hits.
const TASK_TYPE_MAP: &[(&str, &str)] = &[
    ("test", "test-runner"),
    ("coverage", "test-runner"),
    ("deploy", "devops-engineer"),
    ("pipeline", "devops-engineer"),
    ("refactor", "project-manager"),
    ("review", "project-manager"),
];

const TITLE_WEIGHT: u32 = 3;
const DETAILS_WEIGHT: u32 = 2;
const DESCRIPTION_WEIGHT: u32 = 1;
const TASK_TYPE_WEIGHT: u32 = 2;
const FALLBACK_AGENT: &str = "engineer";
const FALLBACK_CONFIDENCE: f64 = 0.25;

// ---------------------------------------------------------------------------
// MatchOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct MatchOutcome {
    pub agent: String,
    pub reason: String,
    pub confidence: f64,
    pub created_new: bool,
}

// ---------------------------------------------------------------------------
// Scoring internals
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Candidate {
    agent: &'static str,
    tech: &'static str,
    score: u32,
    /// Byte offset of the first title hit, or usize::MAX without one.
    title_pos: usize,
}

fn find_word(haystack: &str, word: &str) -> Option<usize> {
    let mut offset = 0;
    for token in haystack.split(|c: char| !c.is_ascii_alphanumeric()) {
        if token == word {
            return Some(offset);
        }
        offset += token.len() + 1;
    }
    None
}

fn scan_candidates(title: &str, description: &str, details: &str) -> Vec<Candidate> {
    let mut per_agent: BTreeMap<&'static str, Candidate> = BTreeMap::new();
    for &(tech, agent) in TECH_AGENT_MAP {
        let title_pos = find_word(title, tech);
        let mut score = 0;
        if title_pos.is_some() {
            score += TITLE_WEIGHT;
        }
        if find_word(details, tech).is_some() {
            score += DETAILS_WEIGHT;
        }
        if find_word(description, tech).is_some() {
            score += DESCRIPTION_WEIGHT;
        }
        if score == 0 {
            continue;
        }
        let entry = per_agent.entry(agent).or_insert(Candidate {
            agent,
            tech,
            score: 0,
            title_pos: usize::MAX,
        });
        entry.score += score;
        if let Some(pos) = title_pos {
            if pos < entry.title_pos {
                entry.title_pos = pos;
                entry.tech = tech;
            }
        }
    }
    per_agent.into_values().collect()
}

// ---------------------------------------------------------------------------
// TaskAgentMatcher
// ---------------------------------------------------------------------------

pub struct TaskAgentMatcher {
    allow_dynamic_creation: bool,
}

impl TaskAgentMatcher {
    pub fn new(allow_dynamic_creation: bool) -> Self {
        Self {
            allow_dynamic_creation,
        }
    }

    /// Match a task to an agent.
    ///
    /// `workload` maps agent names to their count of Pending or In Progress
    /// tasks; it breaks near-ties (within 10% of the top score) toward the
    /// least-loaded candidate.
    pub fn match_task(
        &self,
        task: &Task,
        registry: &mut AgentRegistry,
        workload: &BTreeMap<String, usize>,
    ) -> Result<MatchOutcome> {
        // Manual override wins outright.
        if let Some(agent) = &task.assigned_agent {
            return Ok(MatchOutcome {
                agent: agent.clone(),
                reason: "manual".to_string(),
                confidence: 1.0,
                created_new: false,
            });
        }

        let title = task.title.to_ascii_lowercase();
        let description = task.description.to_ascii_lowercase();
        let details = task.technical_details.to_ascii_lowercase();

        let mut candidates = scan_candidates(&title, &description, &details);
        if !candidates.is_empty() {
            candidates.sort_by(|a, b| {
                b.score
                    .cmp(&a.score)
                    .then(a.title_pos.cmp(&b.title_pos))
                    .then(a.agent.cmp(b.agent))
            });
            let top_score = candidates[0].score;
            // Near-tied candidates compete on current workload.
            let threshold = (f64::from(top_score) * 0.9).ceil() as u32;
            let chosen = candidates
                .iter()
                .filter(|c| c.score >= threshold)
                .min_by_key(|c| {
                    (
                        workload.get(c.agent).copied().unwrap_or(0),
                        c.title_pos,
                        c.agent,
                    )
                })
                .unwrap_or(&candidates[0]);

            let title_hit = chosen.title_pos != usize::MAX;
            let confidence = if title_hit {
                (f64::from(chosen.score) / 3.0).min(1.0)
            } else {
                (f64::from(chosen.score) / 4.0).min(0.75)
            };
            let reason = format!("detected '{}' in task text", chosen.tech);
            return self.resolve(registry, chosen.agent, chosen.tech, reason, confidence);
        }

        // No technology hit: look for a task type.
        let text = format!("{title} {description} {details}");
        for &(keyword, agent) in TASK_TYPE_MAP {
            if find_word(&text, keyword).is_some() {
                let confidence = (f64::from(TASK_TYPE_WEIGHT) / 4.0).min(0.75);
                let reason = format!("task involves '{keyword}'");
                return self.resolve(registry, agent, keyword, reason, confidence);
            }
        }

        Ok(MatchOutcome {
            agent: FALLBACK_AGENT.to_string(),
            reason: "no specific technology detected".to_string(),
            confidence: FALLBACK_CONFIDENCE,
            created_new: false,
        })
    }

    /// Ensure the chosen agent exists, materializing it from the technology
    /// template when allowed. Failure falls back to the generic engineer.
    fn resolve(
        &self,
        registry: &mut AgentRegistry,
        agent: &str,
        tech: &str,
        reason: String,
        confidence: f64,
    ) -> Result<MatchOutcome> {
        if registry.contains(agent) {
            return Ok(MatchOutcome {
                agent: agent.to_string(),
                reason,
                confidence,
                created_new: false,
            });
        }
        if self.allow_dynamic_creation {
            match registry.create(descriptor_template(tech), true) {
                Ok(created) => {
                    return Ok(MatchOutcome {
                        agent: created.name.clone(),
                        reason: format!("{reason}; created agent on demand"),
                        confidence,
                        created_new: true,
                    });
                }
                Err(err) => {
                    tracing::warn!(agent, %err, "on-demand agent creation failed");
                }
            }
        }
        Ok(MatchOutcome {
            agent: FALLBACK_AGENT.to_string(),
            reason: format!("{reason}; fell back to generic engineer"),
            confidence: FALLBACK_CONFIDENCE,
            created_new: false,
        })
    }
}

/// Agents a story is likely to need, from its description and acceptance
/// criteria. The test runner is always included.
pub fn suggest_agents(story: &crate::story::Story) -> Vec<String> {
    let text = format!(
        "{} {}",
        story.description,
        story.acceptance_criteria.join(" ")
    )
    .to_ascii_lowercase();

    let mut suggested: Vec<String> = Vec::new();
    for &(tech, agent) in TECH_AGENT_MAP {
        if find_word(&text, tech).is_some() && !suggested.iter().any(|s| s == agent) {
            suggested.push(agent.to_string());
        }
    }
    if !suggested.iter().any(|s| s == "test-runner") {
        suggested.push("test-runner".to_string());
    }
    suggested
}

/// Count Pending / In Progress tasks per assigned agent.
pub fn workload_of(tasks: &BTreeMap<String, Task>) -> BTreeMap<String, usize> {
    let mut workload = BTreeMap::new();
    for task in tasks.values() {
        if matches!(task.status, TaskStatus::Pending | TaskStatus::InProgress) {
            if let Some(agent) = &task.assigned_agent {
                *workload.entry(agent.clone()).or_insert(0) += 1;
            }
        }
    }
    workload
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use tempfile::TempDir;

    fn task(title: &str, description: &str, details: &str) -> Task {
        let mut t = Task::new("TASK-MATCH1", "US-MATCH1", title);
        t.description = description.to_string();
        t.technical_details = details.to_string();
        t
    }

    fn registry(dir: &TempDir) -> AgentRegistry {
        AgentRegistry::load(dir.path()).unwrap()
    }

    #[test]
    fn rails_controller_matches_ruby_with_high_confidence() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        let matcher = TaskAgentMatcher::new(true);
        let t = task("Build Rails controller", "Use RSpec", "");
        let outcome = matcher.match_task(&t, &mut reg, &BTreeMap::new()).unwrap();
        assert_eq!(outcome.agent, "ruby-engineer");
        assert!(outcome.confidence >= 0.75, "confidence: {}", outcome.confidence);
    }

    #[test]
    fn title_hits_score_higher_than_description() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        let matcher = TaskAgentMatcher::new(true);
        // "python" in title (+3) should beat "java" in description (+1).
        let t = task("Port python module", "replace the java implementation", "");
        let outcome = matcher.match_task(&t, &mut reg, &BTreeMap::new()).unwrap();
        assert_eq!(outcome.agent, "python-engineer");
        assert_eq!(outcome.confidence, 1.0);
    }

    #[test]
    fn first_title_occurrence_wins_ties() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        let matcher = TaskAgentMatcher::new(true);
        let t = task("Wire kotlin screen to swift bridge", "", "");
        let outcome = matcher.match_task(&t, &mut reg, &BTreeMap::new()).unwrap();
        assert_eq!(outcome.agent, "kotlin-engineer");
    }

    #[test]
    fn workload_breaks_near_ties() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        let matcher = TaskAgentMatcher::new(true);
        let t = task("Wire kotlin screen to swift bridge", "", "");
        let mut workload = BTreeMap::new();
        workload.insert("kotlin-engineer".to_string(), 5);
        let outcome = matcher.match_task(&t, &mut reg, &workload).unwrap();
        assert_eq!(outcome.agent, "swift-engineer");
    }

    #[test]
    fn details_hit_without_title_caps_confidence() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        let matcher = TaskAgentMatcher::new(true);
        let t = task("Speed up the build", "", "switch the dockerfile to docker buildkit");
        let outcome = matcher.match_task(&t, &mut reg, &BTreeMap::new()).unwrap();
        assert_eq!(outcome.agent, "devops-engineer");
        assert!(outcome.confidence <= 0.75);
    }

    #[test]
    fn task_type_fallback_routes_tests_to_test_runner() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        let matcher = TaskAgentMatcher::new(true);
        let t = task("Add a regression test", "cover the crash from last week", "");
        let outcome = matcher.match_task(&t, &mut reg, &BTreeMap::new()).unwrap();
        assert_eq!(outcome.agent, "test-runner");
        assert!(outcome.confidence <= 0.75);
    }

    #[test]
    fn refactor_routes_to_project_manager() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        let matcher = TaskAgentMatcher::new(true);
        let t = task("Refactor the settings module", "", "");
        let outcome = matcher.match_task(&t, &mut reg, &BTreeMap::new()).unwrap();
        assert_eq!(outcome.agent, "project-manager");
    }

    #[test]
    fn nothing_detected_falls_back_to_generic_engineer() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        let matcher = TaskAgentMatcher::new(true);
        let t = task("Tidy the changelog", "", "");
        let outcome = matcher.match_task(&t, &mut reg, &BTreeMap::new()).unwrap();
        assert_eq!(outcome.agent, "engineer");
        assert_eq!(outcome.confidence, 0.25);
    }

    #[test]
    fn manual_assignment_short_circuits() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        let matcher = TaskAgentMatcher::new(true);
        let mut t = task("Build Rails controller", "", "");
        t.assigned_agent = Some("frontend-engineer".to_string());
        let outcome = matcher.match_task(&t, &mut reg, &BTreeMap::new()).unwrap();
        assert_eq!(outcome.agent, "frontend-engineer");
        assert_eq!(outcome.reason, "manual");
        assert_eq!(outcome.confidence, 1.0);
    }

    #[test]
    fn single_letter_r_needs_word_boundary() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        let matcher = TaskAgentMatcher::new(true);
        // "refactor" must not register as the language "r".
        let t = task("Improve churn model in r", "plot with ggplot", "");
        let outcome = matcher.match_task(&t, &mut reg, &BTreeMap::new()).unwrap();
        assert_eq!(outcome.agent, "r-engineer");
    }

    #[test]
    fn suggested_agents_scan_description_and_criteria() {
        let mut story =
            crate::story::Story::new("US-SUGGEST", "Checkout", "user", "to pay", "money");
        story.description = "build the checkout flow in react against postgres".to_string();
        story.acceptance_criteria = vec!["covered by pytest".to_string()];
        let suggested = suggest_agents(&story);
        assert!(suggested.contains(&"frontend-engineer".to_string()));
        assert!(suggested.contains(&"database-engineer".to_string()));
        assert!(suggested.contains(&"test-runner".to_string()));
    }

    #[test]
    fn test_runner_always_suggested() {
        let story = crate::story::Story::new("US-PLAIN", "Notes", "user", "notes", "memory");
        assert_eq!(suggest_agents(&story), vec!["test-runner".to_string()]);
    }

    #[test]
    fn workload_counts_only_open_tasks() {
        let mut tasks = BTreeMap::new();
        let mut a = Task::new("TASK-1", "US-1", "a");
        a.assigned_agent = Some("ruby-engineer".to_string());
        let mut b = Task::new("TASK-2", "US-1", "b");
        b.assigned_agent = Some("ruby-engineer".to_string());
        b.status = TaskStatus::Completed;
        tasks.insert(a.id.clone(), a);
        tasks.insert(b.id.clone(), b);
        let workload = workload_of(&tasks);
        assert_eq!(workload.get("ruby-engineer"), Some(&1));
    }
}
