//! Time-ordered trigger queue.
//!
//! A min-heap keyed by fire time; ties break by submission order so
//! dispatch stays deterministic. Owned exclusively by the dispatch loop.

use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::core::types::JobId;

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueueSlot {
    fire_at: DateTime<Utc>,
    /// Submission sequence, used as the FIFO tie-breaker.
    seq: u64,
    job_id: JobId,
}

impl Ord for QueueSlot {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.fire_at
            .cmp(&other.fire_at)
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for QueueSlot {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Wait structure ordering entries by fire time ascending.
pub struct TriggerQueue {
    heap: BinaryHeap<Reverse<QueueSlot>>,
    next_seq: u64,
}

impl TriggerQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Enqueue an entry by fire time.
    pub fn push(&mut self, job_id: JobId, fire_at: DateTime<Utc>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(QueueSlot {
            fire_at,
            seq,
            job_id,
        }));
    }

    /// Peek the earliest entry without removing it.
    pub fn peek_earliest(&self) -> Option<(&JobId, DateTime<Utc>)> {
        self.heap
            .peek()
            .map(|Reverse(slot)| (&slot.job_id, slot.fire_at))
    }

    /// Remove and return every entry with `fire_at <= now`, ordered by
    /// fire time then submission order.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Vec<JobId> {
        let mut due = Vec::new();
        while let Some(Reverse(slot)) = self.heap.peek() {
            if slot.fire_at > now {
                break;
            }
            if let Some(Reverse(slot)) = self.heap.pop() {
                due.push(slot.job_id);
            }
        }
        due
    }

    /// Remove a pending entry by id. Returns whether it was present.
    pub fn remove(&mut self, job_id: &JobId) -> bool {
        let before = self.heap.len();
        // Cancellation is rare; rebuilding the heap keeps push/pop cheap.
        self.heap = self
            .heap
            .drain()
            .filter(|Reverse(slot)| &slot.job_id != job_id)
            .collect();
        self.heap.len() != before
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl Default for TriggerQueue {
    fn default() -> Self {
        Self::new()
    }
}
