//! Contract surface for the external issue-tracker sync collaborator.
//!
//! The core exposes a queue for inbound "item updated" events normalized to
//! the internal model, and an outbound hook fired on story and task state
//! changes. No sync business logic lives here.

use crate::types::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Story,
    Task,
    Bug,
}

/// An externally-sourced update, already normalized to internal field names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub kind: UpdateKind,
    /// Internal ID, when the external system knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Key in the external tracker (e.g. "PROJ-123").
    pub external_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_points: Option<u32>,
    pub received_at: DateTime<Utc>,
}

/// FIFO queue of inbound updates, drained by the sync collaborator's
/// consumer loop.
#[derive(Default)]
pub struct SyncQueue {
    inbound: Mutex<VecDeque<ItemUpdate>>,
}

impl SyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, update: ItemUpdate) {
        self.inbound
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(update);
    }

    pub fn dequeue(&self) -> Option<ItemUpdate> {
        self.inbound
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
    }

    pub fn len(&self) -> usize {
        self.inbound
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Notification of an internal state change, handed to registered hooks.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeNotice {
    pub kind: UpdateKind,
    pub id: String,
    pub status: String,
    pub at: DateTime<Utc>,
}

impl ChangeNotice {
    pub fn task(id: &str, status: TaskStatus) -> Self {
        Self {
            kind: UpdateKind::Task,
            id: id.to_string(),
            status: status.to_string(),
            at: Utc::now(),
        }
    }

    pub fn story(id: &str, status: &str) -> Self {
        Self {
            kind: UpdateKind::Story,
            id: id.to_string(),
            status: status.to_string(),
            at: Utc::now(),
        }
    }
}

type Hook = Box<dyn Fn(&ChangeNotice) + Send>;

/// Registry of outbound hooks; firing is synchronous and in-order.
#[derive(Default)]
pub struct ChangeHooks {
    hooks: Mutex<Vec<Hook>>,
}

impl ChangeHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, hook: F)
    where
        F: Fn(&ChangeNotice) + Send + 'static,
    {
        self.hooks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Box::new(hook));
    }

    pub fn fire(&self, notice: &ChangeNotice) {
        let hooks = self
            .hooks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for hook in hooks.iter() {
            hook(notice);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
