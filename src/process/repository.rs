/*!
 * Process Repositories
 * Persistence seams for process descriptors and transition history
 */

use super::types::{Process, ProcessState, ProcessTransition};
use crate::core::types::Pid;
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::RwLock;

/// Process descriptor storage
#[cfg_attr(test, mockall::automock)]
pub trait ProcessRepository: Send + Sync {
    /// Insert or replace a descriptor
    fn save(&self, process: &Process);

    fn find_by_id(&self, pid: Pid) -> Option<Process>;

    /// All descriptors, ordered by PID
    fn find_all(&self) -> Vec<Process>;

    fn find_by_state(&self, state: ProcessState) -> Vec<Process>;
}

/// Append-only transition history
pub trait TransitionRepository: Send + Sync {
    fn save(&self, transition: &ProcessTransition);

    /// Transitions of one process, oldest first
    fn find_by_process(&self, pid: Pid) -> Vec<ProcessTransition>;

    fn find_all(&self) -> Vec<ProcessTransition>;
}

/// In-memory process store
#[derive(Default)]
pub struct InMemoryProcessRepository {
    processes: DashMap<Pid, Process, RandomState>,
}

impl InMemoryProcessRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

impl ProcessRepository for InMemoryProcessRepository {
    fn save(&self, process: &Process) {
        self.processes.insert(process.pid, process.clone());
    }

    fn find_by_id(&self, pid: Pid) -> Option<Process> {
        self.processes.get(&pid).map(|p| p.value().clone())
    }

    fn find_all(&self) -> Vec<Process> {
        let mut all: Vec<Process> = self.processes.iter().map(|p| p.value().clone()).collect();
        all.sort_by_key(|p| p.pid);
        all
    }

    fn find_by_state(&self, state: ProcessState) -> Vec<Process> {
        let mut matching: Vec<Process> = self
            .processes
            .iter()
            .filter(|p| p.state == state)
            .map(|p| p.value().clone())
            .collect();
        matching.sort_by_key(|p| p.pid);
        matching
    }
}

/// In-memory transition log
#[derive(Default)]
pub struct InMemoryTransitionRepository {
    transitions: RwLock<Vec<ProcessTransition>>,
}

impl InMemoryTransitionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransitionRepository for InMemoryTransitionRepository {
    fn save(&self, transition: &ProcessTransition) {
        self.transitions.write().push(transition.clone());
    }

    fn find_by_process(&self, pid: Pid) -> Vec<ProcessTransition> {
        self.transitions
            .read()
            .iter()
            .filter(|t| t.pid == pid)
            .cloned()
            .collect()
    }

    fn find_all(&self) -> Vec<ProcessTransition> {
        self.transitions.read().clone()
    }
}
