/*!
 * Scheduler Core Operations
 * Admission, the scheduling pass and explicit state transitions
 */

use super::{Scheduler, SchedulerState};
use crate::core::limits::{REASON_ALLOCATION_FAILED, REASON_INSUFFICIENT_MEMORY};
use crate::core::types::{Pid, Priority, Size};
use crate::process::types::{AdmissionResult, Process, ProcessState};
use log::{debug, info, warn};
use std::sync::atomic::Ordering;

impl Scheduler {
    /// Create and admit a process.
    ///
    /// Memory is reserved up front, swapping out lower-priority residents
    /// if needed. A process that cannot be placed waits instead of being
    /// queued. A strictly higher-priority arrival demotes the running process.
    pub fn admit(
        &self,
        name: impl Into<String>,
        priority: Priority,
        memory_size: Size,
    ) -> (Process, AdmissionResult) {
        let (process, result, _) = self.admit_with_preemption(name, priority, memory_size);
        (process, result)
    }

    /// Admit a process, also reporting the PID it displaced from the CPU
    pub fn admit_with_preemption(
        &self,
        name: impl Into<String>,
        priority: Priority,
        memory_size: Size,
    ) -> (Process, AdmissionResult, Option<Pid>) {
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let mut process = Process::new(pid, name, priority, memory_size);
        self.processes.save(&process);

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let mut preempted = None;

        let result = self.reserve_memory(state, &mut process);
        match &result {
            AdmissionResult::Ready => {
                if let Some(current) = state.current {
                    if let Some(running) = state.processes.get_mut(&current) {
                        if process.priority > running.priority {
                            self.set_state(
                                running,
                                ProcessState::Ready,
                                "preempted by higher-priority arrival",
                            );
                            state.ready.push(running);
                            state.current = None;
                            state.stats.preemptions += 1;
                            preempted = Some(current);
                            info!(
                                "PID {} (priority {}) preempts running PID {}",
                                pid, process.priority, current
                            );
                        }
                    }
                }
                self.set_state(&mut process, ProcessState::Ready, "admitted");
                state.ready.push(&process);
                state.stats.admitted += 1;
            }
            AdmissionResult::Waiting(reason) => {
                process.waiting_reason = Some(reason.clone());
                self.set_state(&mut process, ProcessState::Waiting, reason);
                state.waiting.push(pid);
                state.stats.admission_waits += 1;
                warn!("PID {} ({}) admitted to WAITING: {}", pid, process.name, reason);
            }
        }

        state.processes.insert(pid, process.clone());
        (process, result, preempted)
    }

    /// Reserve memory for a new process, swapping out others if needed
    fn reserve_memory(&self, state: &mut SchedulerState, process: &mut Process) -> AdmissionResult {
        if !self.memory.can_ever_fit(process.memory_size) {
            warn!(
                "PID {} requests {} units, beyond any page table",
                process.pid, process.memory_size
            );
            return AdmissionResult::Waiting(REASON_ALLOCATION_FAILED.to_string());
        }

        let free = self.memory.free_memory();
        if free < process.memory_size {
            self.make_room(state, process.memory_size - free, process.pid);
        }

        if self.memory.free_memory() < process.memory_size {
            return AdmissionResult::Waiting(REASON_INSUFFICIENT_MEMORY.to_string());
        }

        match self.memory.admit(process.pid, process.memory_size) {
            Ok(pages) => {
                process.in_memory = true;
                debug!("PID {} mapped {} pages", process.pid, pages);
                AdmissionResult::Ready
            }
            Err(e) => {
                warn!("Memory admission for PID {} failed: {}", process.pid, e);
                AdmissionResult::Waiting(REASON_ALLOCATION_FAILED.to_string())
            }
        }
    }

    /// Whole-process swap-out of other residents until `needed` units are free
    pub(super) fn make_room(&self, state: &mut SchedulerState, needed: Size, exclude: Pid) -> Size {
        let resident_before: Vec<Pid> = state
            .processes
            .values()
            .filter(|p| p.in_memory && p.pid != exclude)
            .map(|p| p.pid)
            .collect();

        let freed = self.swapper.auto_swap_out(
            needed,
            state.processes.values_mut().filter(|p| p.pid != exclude),
        );

        for pid in resident_before {
            if let Some(process) = state.processes.get(&pid) {
                if !process.in_memory {
                    self.processes.save(process);
                    state.stats.swap_outs += 1;
                }
            }
        }
        freed
    }

    /// Bring a queued process back into memory, making room first
    pub(super) fn swap_in_locked(&self, state: &mut SchedulerState, pid: Pid) -> bool {
        let Some(size) = state.processes.get(&pid).map(|p| p.memory_size) else {
            return false;
        };

        let free = self.memory.free_memory();
        if free < size {
            self.make_room(state, size - free, pid);
        }

        let Some(process) = state.processes.get_mut(&pid) else {
            return false;
        };
        match self.swapper.swap_in(process) {
            Ok(()) => {
                self.processes.save(process);
                state.stats.swap_ins += 1;
                true
            }
            Err(e) => {
                warn!("Swap-in of PID {} failed: {}", pid, e);
                false
            }
        }
    }

    /// Run one scheduling pass: demote the running process, then dispatch
    /// the head of the ready queue. Returns the newly running process.
    pub fn schedule(&self) -> Option<Process> {
        let mut guard = self.state.lock();
        self.schedule_locked(&mut guard)
    }

    pub(super) fn schedule_locked(&self, state: &mut SchedulerState) -> Option<Process> {
        if let Some(current) = state.current.take() {
            if let Some(running) = state.processes.get_mut(&current) {
                if running.state == ProcessState::Running {
                    self.set_state(running, ProcessState::Ready, "time slice expired");
                    state.ready.push(running);
                }
            }
        }

        let Some(pid) = state.ready.pop() else {
            debug!("Scheduling pass: ready queue empty");
            return None;
        };

        let resident = match state.processes.get(&pid) {
            Some(process) => process.in_memory,
            None => {
                warn!("Dropping stale ready entry for PID {}", pid);
                return None;
            }
        };

        if !resident && !self.swap_in_locked(state, pid) {
            if let Some(process) = state.processes.get(&pid) {
                state.ready.push(process);
            }
            info!("PID {} could not be swapped in; nothing scheduled this pass", pid);
            return None;
        }

        let process = state.processes.get_mut(&pid)?;
        process.waiting_reason = None;
        self.set_state(process, ProcessState::Running, "scheduled");
        state.current = Some(pid);
        state.stats.context_switches += 1;

        info!(
            "Scheduled PID {} ({}, priority {})",
            pid, process.name, process.priority
        );
        Some(process.clone())
    }

    /// Block a ready or running process
    pub fn block(&self, pid: Pid, reason: &str) -> bool {
        let mut guard = self.state.lock();
        self.block_locked(&mut guard, pid, reason)
    }

    pub(super) fn block_locked(&self, state: &mut SchedulerState, pid: Pid, reason: &str) -> bool {
        let Some(process) = state.processes.get_mut(&pid) else {
            return false;
        };
        match process.state {
            ProcessState::Running => {
                if state.current == Some(pid) {
                    state.current = None;
                }
            }
            ProcessState::Ready => {
                state.ready.remove(pid);
            }
            other => {
                info!("Ignoring block of PID {} in state {}", pid, other);
                return false;
            }
        }

        process.waiting_reason = Some(reason.to_string());
        self.set_state(process, ProcessState::Waiting, reason);
        state.waiting.push(pid);
        true
    }

    /// Wake a waiting process into the ready queue
    pub fn wake_up(&self, pid: Pid) -> bool {
        let mut guard = self.state.lock();
        self.wake_up_locked(&mut guard, pid, "woken up")
    }

    pub(super) fn wake_up_locked(&self, state: &mut SchedulerState, pid: Pid, reason: &str) -> bool {
        let Some(process) = state.processes.get_mut(&pid) else {
            return false;
        };
        if process.state != ProcessState::Waiting {
            info!("Ignoring wake-up of PID {} in state {}", pid, process.state);
            return false;
        }

        state.waiting.retain(|&w| w != pid);
        process.waiting_reason = None;
        self.set_state(process, ProcessState::Ready, reason);
        state.ready.push(process);
        true
    }

    /// Terminate a process and release its memory unconditionally
    pub fn terminate(&self, pid: Pid, reason: &str) -> bool {
        let mut guard = self.state.lock();
        self.terminate_locked(&mut guard, pid, reason)
    }

    pub(super) fn terminate_locked(&self, state: &mut SchedulerState, pid: Pid, reason: &str) -> bool {
        let Some(process) = state.processes.get_mut(&pid) else {
            return false;
        };
        if process.state == ProcessState::Terminated {
            info!("Ignoring terminate of already terminated PID {}", pid);
            return false;
        }

        if state.current == Some(pid) {
            state.current = None;
        }
        state.ready.remove(pid);
        state.waiting.retain(|&w| w != pid);

        let freed = self.memory.release(pid);
        self.swapper.discard(pid);
        process.in_memory = false;
        process.swap_file_path = None;
        process.waiting_reason = None;
        self.set_state(process, ProcessState::Terminated, reason);
        state.terminated.push(pid);
        state.stats.terminated += 1;

        info!("Terminated PID {} ({}), released {} units", pid, reason, freed);
        self.retry_memory_waiters(state);
        true
    }

    /// Re-admit processes waiting for memory, highest priority first
    pub(super) fn retry_memory_waiters(&self, state: &mut SchedulerState) -> usize {
        let mut waiters: Vec<(Priority, Pid, Size)> = state
            .waiting
            .iter()
            .filter_map(|pid| state.processes.get(pid))
            .filter(|p| {
                !p.in_memory && p.waiting_reason.as_deref() == Some(REASON_INSUFFICIENT_MEMORY)
            })
            .map(|p| (p.priority, p.pid, p.memory_size))
            .collect();
        waiters.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let mut admitted = 0;
        for (_, pid, size) in waiters {
            if self.memory.free_memory() < size {
                continue;
            }
            if let Err(e) = self.memory.admit(pid, size) {
                debug!("Retry admission of PID {} failed: {}", pid, e);
                continue;
            }
            if let Some(process) = state.processes.get_mut(&pid) {
                process.in_memory = true;
                process.waiting_reason = None;
                state.waiting.retain(|&w| w != pid);
                self.set_state(process, ProcessState::Ready, "memory available");
                state.ready.push(process);
                state.stats.admitted += 1;
                admitted += 1;
            }
        }
        admitted
    }

    /// Change a process priority, keeping ready-queue order consistent
    pub fn update_priority(&self, pid: Pid, priority: Priority) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(process) = state.processes.get_mut(&pid) else {
            return false;
        };
        if process.state == ProcessState::Terminated {
            return false;
        }

        let queued = state.ready.remove(pid);
        let old = process.priority;
        process.priority = priority;
        process.touch();
        self.processes.save(process);
        if queued {
            state.ready.push(process);
        }

        info!("Updated priority for PID {}: {} -> {}", pid, old, priority);
        true
    }

    /// Drive a process toward a requested state through the explicit transitions
    pub fn update_state(&self, pid: Pid, target: ProcessState) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(current_state) = state.processes.get(&pid).map(|p| p.state) else {
            return false;
        };

        match (current_state, target) {
            (ProcessState::Terminated, _) | (_, ProcessState::New) => false,
            (ProcessState::Waiting, ProcessState::Ready) => {
                self.wake_up_locked(state, pid, "ready by request")
            }
            (ProcessState::Running, ProcessState::Ready) => {
                state.current = None;
                match state.processes.get_mut(&pid) {
                    Some(process) => {
                        self.set_state(process, ProcessState::Ready, "yielded by request");
                        state.ready.push(process);
                        true
                    }
                    None => false,
                }
            }
            (_, ProcessState::Running) => self.run_locked(state, pid),
            (_, ProcessState::Waiting) => self.block_locked(state, pid, "blocked by request"),
            (_, ProcessState::Terminated) => {
                self.terminate_locked(state, pid, "terminated by request")
            }
            (from, to) => {
                info!("Ignoring state update of PID {}: {} -> {}", pid, from, to);
                false
            }
        }
    }

    /// Put a specific process on the CPU, demoting whoever holds it
    fn run_locked(&self, state: &mut SchedulerState, pid: Pid) -> bool {
        let Some(process) = state.processes.get(&pid) else {
            return false;
        };
        match process.state {
            ProcessState::Running => return true,
            ProcessState::Ready | ProcessState::Waiting => {}
            other => {
                info!("Ignoring run request for PID {} in state {}", pid, other);
                return false;
            }
        }
        if !process.in_memory && !self.swap_in_locked(state, pid) {
            return false;
        }

        if let Some(current) = state.current.take() {
            if let Some(running) = state.processes.get_mut(&current) {
                self.set_state(running, ProcessState::Ready, "displaced by request");
                state.ready.push(running);
            }
        }

        state.ready.remove(pid);
        state.waiting.retain(|&w| w != pid);
        let Some(process) = state.processes.get_mut(&pid) else {
            return false;
        };
        process.waiting_reason = None;
        self.set_state(process, ProcessState::Running, "dispatched by request");
        state.current = Some(pid);
        state.stats.context_switches += 1;
        true
    }

    /// Swap a resident, non-running process out to the backing store
    pub fn swap_out(&self, pid: Pid) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(process) = state.processes.get_mut(&pid) else {
            return false;
        };
        if process.state == ProcessState::Running {
            info!("Refusing to swap out running PID {}", pid);
            return false;
        }

        match self.swapper.swap_out(process) {
            Ok(_) => {
                self.processes.save(process);
                state.stats.swap_outs += 1;
                self.retry_memory_waiters(state);
                true
            }
            Err(e) => {
                warn!("Swap-out of PID {} failed: {}", pid, e);
                false
            }
        }
    }

    /// Swap a process back in, making room if needed
    pub fn swap_in(&self, pid: Pid) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        match state.processes.get(&pid) {
            Some(p) if p.state != ProcessState::Terminated => {}
            _ => return false,
        }
        self.swap_in_locked(state, pid)
    }
}
