/*!
 * Process Scheduler
 *
 * Owns every live process descriptor, the ready queue, the waiting and
 * terminated lists and the single CPU slot. A process is a member of exactly
 * one of {ready queue, waiting list, terminated list, current slot} once its
 * admission has been decided.
 *
 * All queue state sits behind one lock; memory, swap and persistence
 * collaborators are called while it is held but never call back in.
 *
 * ## Submodules
 *
 * - `operations`: admission, scheduling pass, explicit transitions
 * - `handlers`: reactions to process-lifecycle events and the watchdog
 * - `policy`: runtime policy switching
 * - `stats`: queries, snapshots and invariant checks
 */

use super::repository::{ProcessRepository, TransitionRepository};
use super::swapper::ProcessSwapper;
use super::types::{Process, ProcessState, ProcessTransition, SchedulerStats, SchedulingPolicy};
use crate::core::types::Pid;
use crate::memory::ProcessMemory;
use ahash::RandomState;
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

mod entry;
mod handlers;
mod operations;
mod policy;
mod queue;
mod stats;

use queue::ReadyQueue;

/// Queue membership and the process arena
pub(super) struct SchedulerState {
    processes: HashMap<Pid, Process, RandomState>,
    ready: ReadyQueue,
    waiting: Vec<Pid>,
    terminated: Vec<Pid>,
    current: Option<Pid>,
    stats: SchedulerStats,
}

/// Process scheduler
pub struct Scheduler {
    state: Mutex<SchedulerState>,
    memory: Arc<dyn ProcessMemory>,
    swapper: Arc<ProcessSwapper>,
    processes: Arc<dyn ProcessRepository>,
    transitions: Arc<dyn TransitionRepository>,
    next_pid: AtomicU32,
    next_transition: AtomicU64,
}

impl Scheduler {
    pub fn new(
        policy: SchedulingPolicy,
        memory: Arc<dyn ProcessMemory>,
        swapper: Arc<ProcessSwapper>,
        processes: Arc<dyn ProcessRepository>,
        transitions: Arc<dyn TransitionRepository>,
    ) -> Self {
        info!("Scheduler initialized: policy={:?}", policy);

        Self {
            state: Mutex::new(SchedulerState {
                processes: HashMap::with_hasher(RandomState::new()),
                ready: ReadyQueue::new(policy),
                waiting: Vec::new(),
                terminated: Vec::new(),
                current: None,
                stats: SchedulerStats::default(),
            }),
            memory,
            swapper,
            processes,
            transitions,
            next_pid: AtomicU32::new(1),
            next_transition: AtomicU64::new(1),
        }
    }

    /// Move a process to a new state, recording the transition and persisting
    /// the descriptor before returning
    fn set_state(&self, process: &mut Process, to: ProcessState, reason: &str) {
        let from = process.state;
        process.state = to;
        process.touch();

        let transition = ProcessTransition {
            id: self.next_transition.fetch_add(1, Ordering::SeqCst),
            pid: process.pid,
            from,
            to,
            reason: reason.to_string(),
            timestamp: SystemTime::now(),
        };
        self.transitions.save(&transition);
        self.processes.save(process);

        debug!(
            "PID {} ({}): {} -> {} ({})",
            process.pid, process.name, from, to, reason
        );
    }
}
