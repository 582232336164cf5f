//! The typed event stream published by the core.
//!
//! Delivery is synchronous and in-order: `publish` walks the registered
//! callbacks on the calling thread, so within a sprint the observable events
//! form a total order consistent with task execution order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Working,
    Testing,
    Coverage,
    Completed,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Working => "working",
            Phase::Testing => "testing",
            Phase::Coverage => "coverage",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    SprintStarted {
        sprint_id: String,
        at: DateTime<Utc>,
    },
    TaskClaimed {
        task_id: String,
        agent: String,
        at: DateTime<Utc>,
    },
    AgentTakeover {
        task_id: String,
        agent: String,
        display_name: String,
        emoji: String,
        at: DateTime<Utc>,
    },
    PhaseChanged {
        task_id: String,
        phase: Phase,
        at: DateTime<Utc>,
    },
    TaskCompleted {
        task_id: String,
        coverage_percent: Option<f64>,
        at: DateTime<Utc>,
    },
    TaskFailed {
        task_id: String,
        reason: String,
        at: DateTime<Utc>,
    },
    Handoff {
        from_agent: Option<String>,
        to_agent: String,
        reason: String,
        at: DateTime<Utc>,
    },
    SprintCompleted {
        sprint_id: String,
        completed_points: u32,
        at: DateTime<Utc>,
    },
    Error {
        message: String,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::SprintStarted { at, .. }
            | Event::TaskClaimed { at, .. }
            | Event::AgentTakeover { at, .. }
            | Event::PhaseChanged { at, .. }
            | Event::TaskCompleted { at, .. }
            | Event::TaskFailed { at, .. }
            | Event::Handoff { at, .. }
            | Event::SprintCompleted { at, .. }
            | Event::Error { at, .. } => *at,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

type Subscriber = Box<dyn Fn(&Event) + Send>;

#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&Event) + Send + 'static,
    {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Box::new(callback));
    }

    pub fn publish(&self, event: Event) {
        let subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for subscriber in subscribers.iter() {
            subscriber(&event);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
