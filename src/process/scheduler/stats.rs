/*!
 * Scheduler Queries
 * Process lookups, queue snapshots, statistics and invariant checks
 */

use super::Scheduler;
use crate::core::types::Pid;
use crate::process::types::{
    Process, ProcessState, ProcessTransition, QueueSnapshot, SchedulerStats,
};
use log::info;

impl Scheduler {
    pub fn process(&self, pid: Pid) -> Option<Process> {
        self.state.lock().processes.get(&pid).cloned()
    }

    /// All known processes, ordered by PID
    pub fn processes(&self) -> Vec<Process> {
        let mut all: Vec<Process> = self.state.lock().processes.values().cloned().collect();
        all.sort_by_key(|p| p.pid);
        all
    }

    pub fn processes_by_state(&self, state: ProcessState) -> Vec<Process> {
        let mut matching: Vec<Process> = self
            .state
            .lock()
            .processes
            .values()
            .filter(|p| p.state == state)
            .cloned()
            .collect();
        matching.sort_by_key(|p| p.pid);
        matching
    }

    /// The process holding the CPU slot
    pub fn current(&self) -> Option<Process> {
        let state = self.state.lock();
        state
            .current
            .and_then(|pid| state.processes.get(&pid).cloned())
    }

    /// Number of ready processes
    pub fn ready_len(&self) -> usize {
        self.state.lock().ready.len()
    }

    /// Transition history of one process, oldest first
    pub fn history(&self, pid: Pid) -> Vec<ProcessTransition> {
        self.transitions.find_by_process(pid)
    }

    pub fn all_transitions(&self) -> Vec<ProcessTransition> {
        self.transitions.find_all()
    }

    pub fn queue_status(&self) -> QueueSnapshot {
        let state = self.state.lock();
        QueueSnapshot {
            policy: state.ready.policy(),
            current: state.current,
            ready: state.ready.ordered(),
            waiting: state.waiting.clone(),
            terminated: state.terminated.clone(),
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        self.state.lock().stats.clone()
    }

    /// Log the queue snapshot (driven by the timer's status period)
    pub fn log_queue_status(&self) {
        let snapshot = self.queue_status();
        info!(
            "Queues [{:?}]: running={:?} ready={:?} waiting={:?} terminated={}",
            snapshot.policy,
            snapshot.current,
            snapshot.ready,
            snapshot.waiting,
            snapshot.terminated.len()
        );
    }

    /// Check queue membership against process states: every admitted
    /// process sits in exactly the set its state names, and at most one
    /// process is running
    pub fn check_invariants(&self) -> bool {
        let state = self.state.lock();
        let ready = state.ready.ordered();

        let running = state
            .processes
            .values()
            .filter(|p| p.state == ProcessState::Running)
            .count();
        if running > 1 {
            return false;
        }

        state.processes.values().all(|p| {
            let in_ready = ready.contains(&p.pid);
            let in_waiting = state.waiting.contains(&p.pid);
            let in_terminated = state.terminated.contains(&p.pid);
            let is_current = state.current == Some(p.pid);
            let memberships = [in_ready, in_waiting, in_terminated, is_current]
                .iter()
                .filter(|&&m| m)
                .count();

            let matches_state = match p.state {
                ProcessState::Ready => in_ready,
                ProcessState::Waiting => in_waiting,
                ProcessState::Terminated => in_terminated,
                ProcessState::Running => is_current,
                ProcessState::New => memberships == 0,
            };
            matches_state && memberships <= 1
        })
    }
}
