//! Deterministic story complexity scoring.
//!
//! The score is a pure function of the story's own fields: weighted technical
//! terms in the title and description, the acceptance-criteria count, CRUD
//! breadth, and non-functional indicators. The score maps onto the Fibonacci
//! scale through fixed bands, so the same story always estimates to the same
//! points.

use crate::story::Story;

// ---------------------------------------------------------------------------
// Term tables
// ---------------------------------------------------------------------------

/// Technical terms and their complexity weights.
const TECH_TERMS: &[(&str, u32)] = &[
    // Identity and security
    ("auth", 8),
    ("authentication", 8),
    ("authorization", 8),
    ("oauth", 8),
    ("sso", 8),
    ("security", 8),
    ("encryption", 8),
    ("password", 5),
    ("login", 5),
    ("session", 5),
    // Service surface
    ("api", 5),
    ("endpoint", 5),
    ("webhook", 6),
    ("integration", 8),
    ("graphql", 6),
    ("grpc", 6),
    // Data
    ("database", 6),
    ("migration", 8),
    ("schema", 5),
    ("index", 4),
    ("cache", 6),
    ("caching", 6),
    ("search", 5),
    // Concurrency and messaging
    ("async", 6),
    ("concurrency", 8),
    ("queue", 6),
    ("websocket", 6),
    ("realtime", 6),
    ("streaming", 6),
    // Interface
    ("ui", 3),
    ("frontend", 3),
    ("form", 3),
    ("dashboard", 4),
    ("chart", 4),
    ("validation", 4),
    // Operations
    ("deployment", 6),
    ("pipeline", 6),
    ("monitoring", 5),
    ("notification", 5),
    ("email", 4),
    ("export", 4),
    ("import", 4),
    ("payment", 10),
    ("billing", 8),
];

/// Non-functional indicators, each worth a flat bonus.
const NFR_TERMS: &[&str] = &[
    "performance",
    "latency",
    "throughput",
    "scale",
    "scalability",
    "compliance",
    "gdpr",
    "hipaa",
    "accessibility",
    "localization",
    "i18n",
    "audit",
];

const NFR_WEIGHT: u32 = 8;

/// CRUD verbs used to gauge operation breadth.
const CRUD_VERBS: &[&str] = &["create", "read", "list", "update", "edit", "delete", "remove"];

const CRITERIA_WEIGHT: u32 = 2;
const MANY_CRITERIA_BONUS: u32 = 8;
const MANY_CRITERIA_THRESHOLD: usize = 6;

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

fn contains_term(haystack: &str, term: &str) -> bool {
    haystack.split(|c: char| !c.is_ascii_alphanumeric()).any(|w| w == term)
}

/// Raw complexity score for a story.
pub fn complexity_score(story: &Story) -> u32 {
    let text = format!("{} {}", story.title, story.description).to_ascii_lowercase();

    let mut score: u32 = 0;

    for &(term, weight) in TECH_TERMS {
        if contains_term(&text, term) {
            score += weight;
        }
    }

    for &term in NFR_TERMS {
        if contains_term(&text, term) {
            score += NFR_WEIGHT;
        }
    }

    let criteria = story.acceptance_criteria.len();
    score += criteria as u32 * CRITERIA_WEIGHT;
    if criteria >= MANY_CRITERIA_THRESHOLD {
        score += MANY_CRITERIA_BONUS;
    }

    let crud_breadth = CRUD_VERBS
        .iter()
        .filter(|verb| contains_term(&text, verb))
        .count() as u32;
    if crud_breadth >= 3 {
        score += 6;
    } else {
        score += crud_breadth * 2;
    }

    score
}

/// Map a complexity score onto the Fibonacci point scale.
pub fn points_for_score(score: u32) -> u32 {
    match score {
        0..=4 => 1,
        5..=9 => 2,
        10..=14 => 3,
        15..=24 => 5,
        25..=39 => 8,
        40..=59 => 13,
        _ => 21,
    }
}

/// Auto-estimate a story.
pub fn estimate(story: &Story) -> u32 {
    points_for_score(complexity_score(story))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::Story;

    fn story(title: &str, want: &str, criteria: &[&str]) -> Story {
        let mut s = Story::new("US-TEST01", title, "user", want, "things improve");
        s.acceptance_criteria = criteria.iter().map(|c| c.to_string()).collect();
        s
    }

    #[test]
    fn empty_story_estimates_to_one_point() {
        let s = story("Misc", "something small", &[]);
        assert_eq!(estimate(&s), 1);
    }

    #[test]
    fn login_story_with_three_criteria_is_three_points() {
        let s = story(
            "Login",
            "to log in",
            &["email validation", "password strength", "remember me"],
        );
        // "login" (5) + 3 criteria (6) = 11 → 3 points
        assert_eq!(complexity_score(&s), 11);
        assert_eq!(estimate(&s), 3);
    }

    #[test]
    fn heavy_story_scores_high() {
        let s = story(
            "Payment integration",
            "oauth authentication against the billing api with database migration",
            &["a", "b", "c", "d", "e", "f"],
        );
        assert!(estimate(&s) >= 13, "score: {}", complexity_score(&s));
    }

    #[test]
    fn many_criteria_add_bonus() {
        let few = story("Misc", "something", &["a", "b", "c", "d", "e"]);
        let many = story("Misc", "something", &["a", "b", "c", "d", "e", "f"]);
        assert_eq!(
            complexity_score(&many),
            complexity_score(&few) + CRITERIA_WEIGHT + MANY_CRITERIA_BONUS
        );
    }

    #[test]
    fn crud_breadth_counts_distinct_verbs() {
        let narrow = story("Notes", "to create notes", &[]);
        let broad = story("Notes", "to create, update and delete notes", &[]);
        assert!(complexity_score(&broad) > complexity_score(&narrow));
    }

    #[test]
    fn nfr_indicators_add_weight() {
        let plain = story("Reports", "to view reports", &[]);
        let scaled = story("Reports", "to view reports at scale with low latency", &[]);
        assert_eq!(
            complexity_score(&scaled),
            complexity_score(&plain) + 2 * NFR_WEIGHT
        );
    }

    #[test]
    fn estimation_is_deterministic() {
        let s = story(
            "Login",
            "to log in",
            &["email validation", "password strength", "remember me"],
        );
        let first = estimate(&s);
        for _ in 0..10 {
            assert_eq!(estimate(&s), first);
        }
    }

    #[test]
    fn bands_cover_the_scale() {
        assert_eq!(points_for_score(0), 1);
        assert_eq!(points_for_score(4), 1);
        assert_eq!(points_for_score(5), 2);
        assert_eq!(points_for_score(9), 2);
        assert_eq!(points_for_score(10), 3);
        assert_eq!(points_for_score(14), 3);
        assert_eq!(points_for_score(15), 5);
        assert_eq!(points_for_score(24), 5);
        assert_eq!(points_for_score(25), 8);
        assert_eq!(points_for_score(39), 8);
        assert_eq!(points_for_score(40), 13);
        assert_eq!(points_for_score(59), 13);
        assert_eq!(points_for_score(60), 21);
        assert_eq!(points_for_score(500), 21);
    }

    #[test]
    fn term_matching_uses_word_boundaries() {
        // "api" must not match inside "rapid".
        let s = story("Rapid prototyping", "to move rapidly", &[]);
        assert_eq!(complexity_score(&s), 0);
    }
}
