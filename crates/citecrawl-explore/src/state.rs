//! Traversal state: visited set + FIFO frontier

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::paper::PaperRecord;

/// Exploration progress, the unit of checkpoint/restore.
///
/// The frontier admits duplicates; they are dropped when they reach the
/// head of the queue and are already visited. Once visited, an identifier
/// is never removed.
#[derive(Debug, Default)]
pub struct TraversalState {
    visited: FxHashMap<String, PaperRecord>,
    frontier: VecDeque<String>,
}

impl TraversalState {
    /// Empty state (nothing visited, nothing pending)
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh state with only `root` pending
    pub fn seeded(root: &str) -> Self {
        Self {
            visited: FxHashMap::default(),
            frontier: VecDeque::from([root.to_string()]),
        }
    }

    /// Rebuild from persisted parts. Later duplicates of a visited id are dropped.
    pub fn from_parts(
        visited: impl IntoIterator<Item = PaperRecord>,
        frontier: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut state = Self {
            visited: FxHashMap::default(),
            frontier: frontier.into_iter().collect(),
        };
        for record in visited {
            if !state.insert(record) {
                log::debug!("duplicate visited record dropped while restoring");
            }
        }
        state
    }

    pub fn is_visited(&self, id: &str) -> bool {
        self.visited.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&PaperRecord> {
        self.visited.get(id)
    }

    /// Insert a resolved record. Returns `false` if its id was already visited.
    pub fn insert(&mut self, record: PaperRecord) -> bool {
        if self.visited.contains_key(&record.id) {
            return false;
        }
        self.visited.insert(record.id.clone(), record);
        true
    }

    /// Append identifiers to the back of the frontier, in order
    pub fn enqueue<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.frontier.extend(ids.into_iter().map(Into::into));
    }

    /// Put an identifier back at the head of the frontier (retry next)
    pub fn requeue_front(&mut self, id: String) {
        self.frontier.push_front(id);
    }

    pub fn pop_front(&mut self) -> Option<String> {
        self.frontier.pop_front()
    }

    /// Drop already-visited identifiers from the head of the frontier.
    ///
    /// Returns how many were dropped.
    pub fn skip_visited(&mut self) -> usize {
        let mut skipped = 0;
        while let Some(head) = self.frontier.front() {
            if !self.visited.contains_key(head) {
                break;
            }
            self.frontier.pop_front();
            skipped += 1;
        }
        skipped
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    pub fn frontier_is_empty(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Pending identifiers, head first
    pub fn frontier(&self) -> impl Iterator<Item = &str> {
        self.frontier.iter().map(String::as_str)
    }

    /// Visited records sorted by id (stable checkpoint output)
    pub fn visited_sorted(&self) -> Vec<&PaperRecord> {
        let mut records: Vec<&PaperRecord> = self.visited.values().collect();
        records.sort_unstable_by(|a, b| a.id.cmp(&b.id));
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(id: &str, citations: &[&str]) -> PaperRecord {
        PaperRecord::stub(id, citations)
    }

    #[test]
    fn seeded_has_root_pending() {
        let state = TraversalState::seeded("A");
        assert_eq!(state.frontier().collect::<Vec<_>>(), vec!["A"]);
        assert_eq!(state.visited_len(), 0);
    }

    #[test]
    fn insert_rejects_duplicate_id() {
        let mut state = TraversalState::new();
        assert!(state.insert(paper("A", &["B"])));
        assert!(!state.insert(paper("A", &[])));
        assert_eq!(state.visited_len(), 1);
        // first insertion wins
        assert_eq!(state.get("A").unwrap().citations, vec!["B"]);
    }

    #[test]
    fn frontier_is_fifo_and_keeps_duplicates() {
        let mut state = TraversalState::new();
        state.enqueue(["B", "C"]);
        state.enqueue(["C"]);
        assert_eq!(state.frontier_len(), 3);
        assert_eq!(state.pop_front().as_deref(), Some("B"));
        assert_eq!(state.pop_front().as_deref(), Some("C"));
        assert_eq!(state.pop_front().as_deref(), Some("C"));
        assert_eq!(state.pop_front(), None);
    }

    #[test]
    fn requeue_front_is_next() {
        let mut state = TraversalState::new();
        state.enqueue(["B", "C"]);
        let head = state.pop_front().unwrap();
        state.requeue_front(head);
        assert_eq!(state.frontier().collect::<Vec<_>>(), vec!["B", "C"]);
    }

    #[test]
    fn skip_visited_only_drops_head_run() {
        let mut state = TraversalState::new();
        state.insert(paper("A", &[]));
        state.enqueue(["A", "A", "B", "A"]);
        assert_eq!(state.skip_visited(), 2);
        assert_eq!(state.frontier().collect::<Vec<_>>(), vec!["B", "A"]);
    }

    #[test]
    fn from_parts_dedupes_visited() {
        let state = TraversalState::from_parts(
            vec![paper("A", &[]), paper("A", &["X"]), paper("B", &[])],
            vec!["C".to_string()],
        );
        assert_eq!(state.visited_len(), 2);
        assert_eq!(state.frontier_len(), 1);
    }

    #[test]
    fn visited_sorted_by_id() {
        let mut state = TraversalState::new();
        for id in ["c", "a", "b"] {
            state.insert(paper(id, &[]));
        }
        let ids: Vec<&str> = state.visited_sorted().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
