//! Bounded per-component snapshot history.
//!
//! Two limits apply independently: `max_history` entries per component
//! (oldest dropped on every write) and a retention window enforced by
//! [`HistoryStore::cleanup`].

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{HashMap, VecDeque};

use super::status::ComponentHealth;

#[derive(Debug)]
pub struct HistoryStore {
    max_history: usize,
    retention: ChronoDuration,
    entries: HashMap<String, VecDeque<ComponentHealth>>,
}

impl HistoryStore {
    pub fn new(max_history: usize, retention_days: u32) -> Self {
        Self {
            max_history: max_history.max(1),
            retention: ChronoDuration::days(i64::from(retention_days)),
            entries: HashMap::new(),
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Append a snapshot, trimming the component's ring to `max_history`.
    pub fn record(&mut self, health: &ComponentHealth) {
        let max = self.max_history;
        let ring = self
            .entries
            .entry(health.name.clone())
            .or_insert_with(|| VecDeque::with_capacity(max));
        ring.push_back(health.clone());
        while ring.len() > max {
            ring.pop_front();
        }
    }

    /// Most-recent-first snapshots for a component, at most `limit`.
    pub fn recent(&self, component: &str, limit: usize) -> Vec<ComponentHealth> {
        self.entries
            .get(component)
            .map(|ring| ring.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Newest snapshot for a component.
    pub fn latest(&self, component: &str) -> Option<&ComponentHealth> {
        self.entries.get(component).and_then(VecDeque::back)
    }

    /// Purge entries older than the retention window as of `now`.
    ///
    /// Returns the number of entries removed. Components left with no
    /// entries are dropped from the store.
    pub fn cleanup(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;
        let mut removed = 0;
        for ring in self.entries.values_mut() {
            let before = ring.len();
            ring.retain(|entry| entry.timestamp >= cutoff);
            removed += before - ring.len();
        }
        self.entries.retain(|_, ring| !ring.is_empty());
        removed
    }

    pub fn clear_component(&mut self, component: &str) {
        self.entries.remove(component);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(name: &str, age_days: i64) -> ComponentHealth {
        ComponentHealth::healthy(name, "ok").with_timestamp(Utc::now() - ChronoDuration::days(age_days))
    }

    #[test]
    fn record_trims_to_max_history() {
        let mut store = HistoryStore::new(3, 7);
        for i in 0..5 {
            store.record(&ComponentHealth::healthy("cache", format!("tick {i}")));
        }
        assert_eq!(store.recent("cache", usize::MAX).len(), 3);
        let recent = store.recent("cache", 10);
        assert_eq!(recent[0].message, "tick 4");
        assert_eq!(recent[2].message, "tick 2");
    }

    #[test]
    fn recent_respects_limit_and_unknown_component() {
        let mut store = HistoryStore::new(10, 7);
        for _ in 0..4 {
            store.record(&ComponentHealth::healthy("hub", "ok"));
        }
        assert_eq!(store.recent("hub", 2).len(), 2);
        assert!(store.recent("nope", 5).is_empty());
    }

    #[test]
    fn cleanup_purges_entries_past_retention() {
        let mut store = HistoryStore::new(10, 7);
        store.record(&snapshot("database", 10));
        store.record(&snapshot("database", 8));
        store.record(&snapshot("database", 1));
        store.record(&snapshot("legacy", 30));

        let removed = store.cleanup(Utc::now());
        assert_eq!(removed, 3);
        assert_eq!(store.recent("database", usize::MAX).len(), 1);
        assert_eq!(store.recent("legacy", usize::MAX).len(), 0);
        assert!(store.latest("legacy").is_none());
    }

    #[test]
    fn cleanup_is_independent_of_count_trim() {
        let mut store = HistoryStore::new(2, 7);
        store.record(&snapshot("api", 9));
        store.record(&snapshot("api", 0));
        store.record(&snapshot("api", 0));
        // count trim already dropped the old one
        assert_eq!(store.cleanup(Utc::now()), 0);
        assert_eq!(store.recent("api", usize::MAX).len(), 2);
    }
}
