//! FIFO (First In, First Out) replacement policy.
//!
//! # Algorithm
//!
//! - On hit: nothing
//! - On admission: Append page to the tail of the queue
//! - On eviction: Pop the head of the queue
//!
//! # Complexity
//!
//! - Hit: O(1)
//! - Admission of an already queued page and removal: O(n)
//! - Eviction: O(1)

use std::collections::VecDeque;

use crate::page::PageId;

/// FIFO policy state: resident pages in admission order, oldest at the front.
#[derive(Debug, Default)]
pub struct PolicyState {
    queue: VecDeque<PageId>,
}

impl PolicyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admission order is all that matters, so hits are ignored.
    pub fn record_hit(&mut self, _page_id: &PageId) {}

    /// Moves `page_id` to the tail, whether or not it was already queued.
    pub fn on_page_admitted(&mut self, page_id: PageId) {
        self.remove(&page_id);
        self.queue.push_back(page_id);
    }

    pub fn remove(&mut self, page_id: &PageId) {
        if let Some(pos) = self.queue.iter().position(|p| p == page_id) {
            self.queue.remove(pos);
        }
    }

    /// Takes the oldest page off the queue.
    pub fn evict_candidate(&mut self) -> Option<PageId> {
        self.queue.pop_front()
    }

    /// Returns a victim to the head of the queue after a failed eviction
    pub fn restore_candidate(&mut self, page_id: PageId) {
        self.queue.push_front(page_id);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod fifo_tests {
    use super::*;

    #[test]
    fn test_evicts_in_admission_order() {
        let mut policy = PolicyState::new();
        for n in 0..3 {
            policy.on_page_admitted(PageId::new(1, n));
        }
        policy.record_hit(&PageId::new(1, 0));
        assert_eq!(policy.evict_candidate(), Some(PageId::new(1, 0)));
        assert_eq!(policy.evict_candidate(), Some(PageId::new(1, 1)));
        assert_eq!(policy.len(), 1);
    }

    #[test]
    fn test_readmission_moves_to_tail() {
        let mut policy = PolicyState::new();
        policy.on_page_admitted(PageId::new(1, 0));
        policy.on_page_admitted(PageId::new(1, 1));
        policy.on_page_admitted(PageId::new(1, 0));
        assert_eq!(policy.len(), 2);
        assert_eq!(policy.evict_candidate(), Some(PageId::new(1, 1)));
    }

    #[test]
    fn test_remove_and_restore() {
        let mut policy = PolicyState::new();
        policy.on_page_admitted(PageId::new(1, 0));
        policy.on_page_admitted(PageId::new(2, 0));
        policy.remove(&PageId::new(1, 0));
        let victim = policy.evict_candidate().unwrap();
        assert_eq!(victim, PageId::new(2, 0));
        policy.restore_candidate(victim);
        assert_eq!(policy.evict_candidate(), Some(victim));
        assert!(policy.is_empty());
        assert_eq!(policy.evict_candidate(), None);
    }
}
