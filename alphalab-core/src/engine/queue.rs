//! FIFO event channel owned by the backtest loop.
//!
//! No reordering by timestamp or priority: events come out in the order they
//! were pushed. The loop is the only producer and consumer.

use std::collections::VecDeque;

use crate::domain::Event;

#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    /// Remove and return the head, or `None` when nothing is pending.
    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_on_empty_returns_none() {
        let mut q = EventQueue::new();
        assert!(q.is_empty());
        assert!(q.pop().is_none());
    }

    #[test]
    fn preserves_push_order() {
        let mut q = EventQueue::new();
        for s in ["C", "A", "B"] {
            q.push(Event::market(s));
        }
        assert_eq!(q.len(), 3);
        let order: Vec<String> = std::iter::from_fn(|| q.pop())
            .map(|e| e.symbol().to_string())
            .collect();
        assert_eq!(order, vec!["C", "A", "B"]);
        assert!(q.is_empty());
    }

    #[test]
    fn clear_drops_pending() {
        let mut q = EventQueue::new();
        q.push(Event::market("A"));
        q.clear();
        assert!(q.pop().is_none());
    }
}
