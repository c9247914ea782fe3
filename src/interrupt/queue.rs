/*!
 * Interrupt Queue
 * Severity-ordered queue with arrival order as tie-break
 */

use super::types::Interrupt;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

struct Queued {
    priority: u8,
    seq: u64,
    interrupt: Interrupt,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Queued {}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: lower priority number and earlier arrival come out first
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Inner {
    heap: BinaryHeap<Queued>,
    next_seq: u64,
}

pub struct InterruptQueue {
    inner: Mutex<Inner>,
}

impl InterruptQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                next_seq: 0,
            }),
        }
    }

    pub fn push(&self, interrupt: Interrupt) {
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(Queued {
            priority: interrupt.kind.priority(),
            seq,
            interrupt,
        });
    }

    /// Pop the head only once it has been queued for at least `delay`
    pub fn pop_due(&self, delay: Duration) -> Option<Interrupt> {
        let mut inner = self.inner.lock();
        let due = inner
            .heap
            .peek()
            .map(|head| head.interrupt.age() >= delay)
            .unwrap_or(false);
        if due {
            inner.heap.pop().map(|queued| queued.interrupt)
        } else {
            None
        }
    }

    /// Queued interrupts in dispatch order
    pub fn snapshot(&self) -> Vec<Interrupt> {
        let inner = self.inner.lock();
        let mut entries: Vec<&Queued> = inner.heap.iter().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries.into_iter().map(|q| q.interrupt.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().heap.is_empty()
    }

    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let dropped = inner.heap.len();
        inner.heap.clear();
        dropped
    }
}

impl Default for InterruptQueue {
    fn default() -> Self {
        Self::new()
    }
}
