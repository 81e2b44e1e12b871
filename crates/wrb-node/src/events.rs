//! Event fan-out to RPC subscribers.
//!
//! Every committed board event is pushed through a broadcast channel. Each
//! subscriber has an independent buffer; slow subscribers lose the oldest
//! events and are told how many they skipped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use wrb_types::{EventRecord, QueryId};

/// Filter for event subscriptions. Empty fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Category filter: "query" or "admin".
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    /// Event names, e.g. "QueryPosted".
    #[serde(default)]
    pub names: Option<Vec<String>>,
    /// Restrict to these queries.
    #[serde(default)]
    pub query_ids: Option<Vec<QueryId>>,
}

/// Event bus for broadcasting board events to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventRecord>,
    published: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, record: EventRecord) {
        self.published.fetch_add(1, Ordering::SeqCst);
        // No subscribers is fine
        let _ = self.sender.send(record);
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    /// Number of events published so far.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }
}

impl EventFilter {
    /// Whether `record` passes every set criterion.
    pub fn matches(&self, record: &EventRecord) -> bool {
        let name = record.event.name();
        if let Some(ref categories) = self.categories {
            if !categories.iter().any(|c| c == categorize_event(name)) {
                return false;
            }
        }
        if let Some(ref names) = self.names {
            if !names.iter().any(|n| n == name) {
                return false;
            }
        }
        if let Some(ref query_ids) = self.query_ids {
            match record.event.query_id() {
                Some(id) if query_ids.contains(&id) => {}
                _ => return false,
            }
        }
        true
    }
}

fn categorize_event(name: &str) -> &'static str {
    match name {
        s if s.starts_with("Query") || s.starts_with("Response") || s.starts_with("Batch") => {
            "query"
        }
        _ => "admin",
    }
}
