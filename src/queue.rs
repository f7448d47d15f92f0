//! Broadcast queue
//!
//! FIFO of chat payloads waiting to be fanned out. Payloads leave the
//! queue exactly once, in arrival order.

use std::collections::VecDeque;

use tracing::warn;

/// A chat payload awaiting broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChat {
    /// Account name the sender claimed
    pub sender: String,
    /// Message text to relay
    pub text: String,
}

/// Ordered pending payloads
///
/// Unbounded when created with `None`. With a limit, a full queue makes
/// room by dropping its oldest payload.
#[derive(Debug, Default)]
pub struct BroadcastQueue {
    pending: VecDeque<PendingChat>,
    limit: Option<usize>,
}

impl BroadcastQueue {
    /// Create an empty queue
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            pending: VecDeque::new(),
            limit,
        }
    }

    /// Append a payload, returning the payload dropped to make room, if any
    pub fn enqueue(&mut self, sender: String, text: String) -> Option<PendingChat> {
        let dropped = match self.limit {
            Some(limit) if self.pending.len() >= limit => self.pending.pop_front(),
            _ => None,
        };
        if let Some(old) = &dropped {
            warn!(
                "Broadcast queue full ({} pending), dropping oldest payload from '{}'",
                self.pending.len() + 1,
                old.sender
            );
        }
        self.pending.push_back(PendingChat { sender, text });
        dropped
    }

    /// Oldest payload without removing it
    pub fn peek(&self) -> Option<&PendingChat> {
        self.pending.front()
    }

    /// Remove and return the oldest payload
    pub fn dequeue(&mut self) -> Option<PendingChat> {
        self.pending.pop_front()
    }

    /// Number of pending payloads
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut queue = BroadcastQueue::new(None);
        queue.enqueue("alice".into(), "one".into());
        queue.enqueue("bob".into(), "two".into());
        queue.enqueue("alice".into(), "three".into());

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.peek().map(|p| p.text.as_str()), Some("one"));

        let texts: Vec<String> = std::iter::from_fn(|| queue.dequeue())
            .map(|p| p.text)
            .collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dequeue_empty() {
        let mut queue = BroadcastQueue::new(None);
        assert!(queue.dequeue().is_none());
        assert!(queue.peek().is_none());
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut queue = BroadcastQueue::new(Some(2));
        assert!(queue.enqueue("a".into(), "1".into()).is_none());
        assert!(queue.enqueue("a".into(), "2".into()).is_none());

        let dropped = queue.enqueue("b".into(), "3".into());
        assert_eq!(
            dropped,
            Some(PendingChat {
                sender: "a".into(),
                text: "1".into()
            })
        );
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dequeue().map(|p| p.text), Some("2".to_string()));
        assert_eq!(queue.dequeue().map(|p| p.text), Some("3".to_string()));
    }
}
