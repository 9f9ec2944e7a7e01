//! Service event feed tailing.

use std::collections::HashSet;
use std::sync::Mutex;

use tracing::info;

use shipyard_cloud::ServiceDescription;

/// Logs each service event once while a wait is running.
#[derive(Debug, Default)]
pub struct EventTail {
    service: String,
    seen: Mutex<HashSet<String>>,
}

impl EventTail {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Mark the current feed as seen without logging it.
    pub fn prime(&self, desc: &ServiceDescription) {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.extend(desc.events.iter().map(|e| e.id.clone()));
    }

    /// Log events not seen before, oldest first. Returns how many were new.
    pub fn observe(&self, desc: &ServiceDescription) -> usize {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        let mut fresh: Vec<_> = desc
            .events
            .iter()
            .filter(|e| seen.insert(e.id.clone()))
            .collect();
        fresh.sort_by_key(|e| e.created_at_ms);
        for event in &fresh {
            info!(service = %self.service, at_ms = event.created_at_ms, "{}", event.message);
        }
        fresh.len()
    }
}
