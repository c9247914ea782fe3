/*!
 * Scheduler Entry Types
 * Heap entries ordering ready processes under each policy
 */

use crate::core::types::{Pid, Priority};
use std::cmp::Ordering;
use std::time::SystemTime;

/// Ready-queue entry
#[derive(Debug, Clone)]
pub(super) struct Entry {
    pub pid: Pid,
    pub priority: Priority,
    /// Arrival order into the ready queue
    pub seq: u64,
    pub created_at: SystemTime,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.pid == other.pid
    }
}

impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: higher priority first, then earlier arrival
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Wrapper for FCFS scheduling that orders by creation time (min-heap)
#[derive(Debug, Clone)]
pub(super) struct FcfsEntry(pub Entry);

impl PartialEq for FcfsEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.pid == other.0.pid
    }
}

impl Eq for FcfsEntry {}

impl Ord for FcfsEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // PIDs are handed out in creation order, so they break timestamp ties
        other
            .0
            .created_at
            .cmp(&self.0.created_at)
            .then_with(|| other.0.pid.cmp(&self.0.pid))
    }
}

impl PartialOrd for FcfsEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
