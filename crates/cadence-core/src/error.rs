use thiserror::Error;

#[derive(Debug, Error)]
pub enum CadenceError {
    #[error("not initialized: run 'cadence init'")]
    NotInitialized,

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("dependency error: {0}")]
    Dependency(String),

    #[error("subprocess '{tool}' failed: {reason}")]
    Subprocess { tool: String, reason: String },

    #[error("project busy: another process holds the lock at {0}")]
    ProjectBusy(String),

    #[error("data file quarantined: {file}: {reason}")]
    Schema { file: String, reason: String },

    #[error("invalid name '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidName(String),

    #[error("fatal: {0}")]
    Fatal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl CadenceError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CadenceError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        CadenceError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Machine-readable error kind, stable across releases.
    pub fn kind(&self) -> &'static str {
        match self {
            CadenceError::NotInitialized => "not_initialized",
            CadenceError::Validation { .. } | CadenceError::InvalidName(_) => "validation",
            CadenceError::NotFound { .. } => "not_found",
            CadenceError::Conflict(_) => "conflict",
            CadenceError::Dependency(_) => "dependency",
            CadenceError::Subprocess { .. } => "subprocess",
            CadenceError::ProjectBusy(_) => "busy",
            CadenceError::Schema { .. } => "schema",
            CadenceError::Fatal(_) => "fatal",
            CadenceError::Io(_) => "io",
            CadenceError::Json(_) | CadenceError::Yaml(_) => "serialization",
        }
    }

    /// Optional hint shown to operators alongside the message.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            CadenceError::NotInitialized => Some("run 'cadence init' in the project root"),
            CadenceError::ProjectBusy(_) => {
                Some("wait for the other invocation to finish, then retry")
            }
            CadenceError::Schema { .. } => {
                Some("inspect the quarantined file and restore it from backups/")
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CadenceError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(CadenceError::NotInitialized.kind(), "not_initialized");
        assert_eq!(
            CadenceError::validation("title", "must not be empty").kind(),
            "validation"
        );
        assert_eq!(CadenceError::not_found("story", "US-XXXXXX").kind(), "not_found");
        assert_eq!(CadenceError::Conflict("two active sprints".into()).kind(), "conflict");
    }

    #[test]
    fn not_found_message_names_kind_and_id() {
        let err = CadenceError::not_found("task", "TASK-A1B2C3");
        assert_eq!(err.to_string(), "task not found: TASK-A1B2C3");
    }

    #[test]
    fn remediation_only_where_useful() {
        assert!(CadenceError::NotInitialized.remediation().is_some());
        assert!(CadenceError::Conflict("x".into()).remediation().is_none());
    }
}
