/*!
 * Ready Queue
 * Policy-aware ready queue with removal and re-homing
 */

use super::entry::{Entry, FcfsEntry};
use crate::core::types::Pid;
use crate::process::types::{Process, SchedulingPolicy};
use std::collections::BinaryHeap;

pub(super) struct ReadyQueue {
    policy: SchedulingPolicy,
    priority_queue: BinaryHeap<Entry>,
    fcfs_queue: BinaryHeap<FcfsEntry>,
    next_seq: u64,
}

impl ReadyQueue {
    pub fn new(policy: SchedulingPolicy) -> Self {
        Self {
            policy,
            priority_queue: BinaryHeap::new(),
            fcfs_queue: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    /// Enqueue a process; a PID already queued is left where it is
    pub fn push(&mut self, process: &Process) {
        if self.contains(process.pid) {
            return;
        }
        let entry = Entry {
            pid: process.pid,
            priority: process.priority,
            seq: self.next_seq,
            created_at: process.created_at,
        };
        self.next_seq += 1;
        self.push_entry(entry);
    }

    fn push_entry(&mut self, entry: Entry) {
        match self.policy {
            SchedulingPolicy::Priority => self.priority_queue.push(entry),
            SchedulingPolicy::Fcfs => self.fcfs_queue.push(FcfsEntry(entry)),
        }
    }

    pub fn pop(&mut self) -> Option<Pid> {
        match self.policy {
            SchedulingPolicy::Priority => self.priority_queue.pop().map(|e| e.pid),
            SchedulingPolicy::Fcfs => self.fcfs_queue.pop().map(|e| e.0.pid),
        }
    }

    /// Remove a PID; O(n) rebuild, heaps cannot delete arbitrary keys
    pub fn remove(&mut self, pid: Pid) -> bool {
        let before = self.len();
        match self.policy {
            SchedulingPolicy::Priority => {
                let entries: Vec<Entry> = self
                    .priority_queue
                    .drain()
                    .filter(|e| e.pid != pid)
                    .collect();
                self.priority_queue.extend(entries);
            }
            SchedulingPolicy::Fcfs => {
                let entries: Vec<FcfsEntry> = self
                    .fcfs_queue
                    .drain()
                    .filter(|e| e.0.pid != pid)
                    .collect();
                self.fcfs_queue.extend(entries);
            }
        }
        self.len() < before
    }

    pub fn contains(&self, pid: Pid) -> bool {
        match self.policy {
            SchedulingPolicy::Priority => self.priority_queue.iter().any(|e| e.pid == pid),
            SchedulingPolicy::Fcfs => self.fcfs_queue.iter().any(|e| e.0.pid == pid),
        }
    }

    pub fn len(&self) -> usize {
        self.priority_queue.len() + self.fcfs_queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queued PIDs in the order they would be popped
    pub fn ordered(&self) -> Vec<Pid> {
        match self.policy {
            SchedulingPolicy::Priority => self
                .priority_queue
                .clone()
                .into_sorted_vec()
                .into_iter()
                .rev()
                .map(|e| e.pid)
                .collect(),
            SchedulingPolicy::Fcfs => self
                .fcfs_queue
                .clone()
                .into_sorted_vec()
                .into_iter()
                .rev()
                .map(|e| e.0.pid)
                .collect(),
        }
    }

    /// Switch ordering, moving every queued entry into the new heap.
    /// Returns the number of entries re-homed.
    pub fn rehome(&mut self, policy: SchedulingPolicy) -> usize {
        if policy == self.policy {
            return self.len();
        }
        let mut entries: Vec<Entry> = self.priority_queue.drain().collect();
        entries.extend(self.fcfs_queue.drain().map(|e| e.0));

        self.policy = policy;
        let moved = entries.len();
        for entry in entries {
            self.push_entry(entry);
        }
        moved
    }
}
