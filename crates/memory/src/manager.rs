//! Short-term conversation memory.
//!
//! Keeps the last N interactions of one session. Recording past capacity
//! evicts the oldest entry, so insertion order always equals chronological
//! order and the store never holds more than N entries.

use std::collections::VecDeque;
use voltrag_core::Interaction;

/// Bounded, ordered record of a session's recent interactions.
///
/// Owned by exactly one session; never shared.
#[derive(Debug, Clone)]
pub struct MemoryManager {
    entries: VecDeque<Interaction>,
    capacity: usize,
}

impl MemoryManager {
    /// Create a store holding at most `capacity` interactions.
    /// A capacity of 0 disables memory.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an interaction, evicting from the head while over capacity.
    pub fn record(&mut self, interaction: Interaction) {
        if self.capacity == 0 {
            return;
        }
        self.entries.push_back(interaction);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// The last `min(k, len)` interactions, oldest first.
    pub fn recent(&self, k: usize) -> Vec<Interaction> {
        let skip = self.entries.len().saturating_sub(k);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interaction(i: usize) -> Interaction {
        Interaction::new(format!("q{i}"), format!("a{i}"), vec![format!("doc-{i}")])
    }

    #[test]
    fn recent_returns_last_n_in_order() {
        for capacity in 1..=5 {
            for count in 0..=12 {
                let mut memory = MemoryManager::new(capacity);
                for i in 0..count {
                    memory.record(interaction(i));
                    assert!(memory.len() <= capacity);
                }

                let recent = memory.recent(capacity);
                let expected: Vec<String> = (count.saturating_sub(capacity)..count)
                    .map(|i| format!("q{i}"))
                    .collect();
                let got: Vec<String> = recent.iter().map(|r| r.query.clone()).collect();
                assert_eq!(got, expected, "capacity={capacity} count={count}");
            }
        }
    }

    #[test]
    fn recent_smaller_than_len() {
        let mut memory = MemoryManager::new(3);
        for i in 0..3 {
            memory.record(interaction(i));
        }
        let recent = memory.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].query, "q1");
        assert_eq!(recent[1].query, "q2");
    }

    #[test]
    fn recent_is_a_snapshot() {
        let mut memory = MemoryManager::new(2);
        memory.record(interaction(0));
        let snapshot = memory.recent(2);
        memory.record(interaction(1));
        memory.clear();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].query, "q0");
    }

    #[test]
    fn zero_capacity_disables_memory() {
        let mut memory = MemoryManager::new(0);
        memory.record(interaction(0));
        assert!(memory.is_empty());
        assert!(memory.recent(5).is_empty());
    }

    #[test]
    fn clear_empties_store() {
        let mut memory = MemoryManager::new(3);
        memory.record(interaction(0));
        memory.record(interaction(1));
        memory.clear();
        assert!(memory.is_empty());
        assert_eq!(memory.capacity(), 3);
    }
}
