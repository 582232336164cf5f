//! Collision-checked short identifier generation.
//!
//! IDs have the form `<PREFIX>-<6 chars from [A-Z0-9]>` and are the sole
//! foreign keys between entities. Generation retries on collision against
//! the caller-supplied predicate and falls back to a monotonic counter
//! suffix after too many failed attempts.

use rand::Rng;
use std::fmt;

const ID_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const TOKEN_LEN: usize = 6;
const MAX_RANDOM_ATTEMPTS: usize = 8;

// ---------------------------------------------------------------------------
// IdKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Story,
    Task,
    Bug,
    Sprint,
    Epic,
    Roadmap,
}

impl IdKind {
    pub fn prefix(self) -> &'static str {
        match self {
            IdKind::Story => "US",
            IdKind::Task => "TASK",
            IdKind::Bug => "BUG",
            IdKind::Sprint => "SPRINT",
            IdKind::Epic => "EPIC",
            IdKind::Roadmap => "ROADMAP",
        }
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Generate a fresh ID for `kind`. `exists` must answer whether an ID is
/// already taken for that kind.
pub fn generate<F>(kind: IdKind, exists: F) -> String
where
    F: Fn(&str) -> bool,
{
    let mut rng = rand::thread_rng();
    for _ in 0..MAX_RANDOM_ATTEMPTS {
        let token: String = (0..TOKEN_LEN)
            .map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char)
            .collect();
        let id = format!("{}-{}", kind.prefix(), token);
        if !exists(&id) {
            return id;
        }
    }

    // Pathological collision streak: fall back to a monotonic counter so the
    // generator always terminates with a unique ID.
    let mut n: u64 = 1;
    loop {
        let id = format!("{}-{:06}", kind.prefix(), n);
        if !exists(&id) {
            return id;
        }
        n += 1;
    }
}

/// True if `id` is well-formed for `kind`.
pub fn is_valid(kind: IdKind, id: &str) -> bool {
    let Some(token) = id.strip_prefix(kind.prefix()).and_then(|r| r.strip_prefix('-')) else {
        return false;
    };
    token.len() == TOKEN_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_ids_are_well_formed() {
        for kind in [
            IdKind::Story,
            IdKind::Task,
            IdKind::Bug,
            IdKind::Sprint,
            IdKind::Epic,
            IdKind::Roadmap,
        ] {
            let id = generate(kind, |_| false);
            assert!(is_valid(kind, &id), "malformed id: {id}");
        }
    }

    #[test]
    fn story_ids_use_us_prefix() {
        let id = generate(IdKind::Story, |_| false);
        assert!(id.starts_with("US-"));
        assert_eq!(id.len(), "US-".len() + 6);
    }

    #[test]
    fn no_duplicates_in_bulk() {
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let id = generate(IdKind::Task, |candidate| seen.contains(candidate));
            assert!(seen.insert(id.clone()), "duplicate id issued: {id}");
        }
    }

    #[test]
    fn falls_back_to_counter_when_everything_collides() {
        // Pretend every ID except the first counter-suffixed one is taken.
        let id = generate(IdKind::Bug, |candidate| candidate != "BUG-000001");
        assert_eq!(id, "BUG-000001");
    }

    #[test]
    fn counter_fallback_skips_taken_numbers() {
        let id = generate(IdKind::Bug, |candidate| candidate != "BUG-000002");
        assert_eq!(id, "BUG-000002");
    }

    #[test]
    fn is_valid_rejects_wrong_shapes() {
        assert!(!is_valid(IdKind::Story, "US-abc123"));
        assert!(!is_valid(IdKind::Story, "TASK-ABC123"));
        assert!(!is_valid(IdKind::Story, "US-ABC12"));
        assert!(!is_valid(IdKind::Story, "US_ABC123"));
        assert!(is_valid(IdKind::Story, "US-A1B2C3"));
    }
}
