/*!
 * Scheduler Event Handlers
 * Reactions to process-lifecycle events and the self-healing watchdog
 */

use super::{Scheduler, SchedulerState};
use crate::core::types::Pid;
use crate::events::KernelEvent;
use crate::process::types::{Process, ProcessState};
use log::{debug, info, warn};

impl Scheduler {
    /// Entry point for the event bus
    pub fn handle_event(&self, event: &KernelEvent) {
        match event {
            KernelEvent::ProcessReady { pid, reason } => self.on_process_ready(*pid, reason),
            KernelEvent::ProcessWaiting { pid, reason } => self.on_process_waiting(*pid, reason),
            KernelEvent::ProcessTerminated { pid, reason } => {
                self.on_process_terminated(*pid, reason)
            }
            KernelEvent::SchedulingRequested { source } => self.on_scheduling_requested(source),
            KernelEvent::DeviceGranted { device_id, pid } => {
                self.on_device_granted(*pid, *device_id)
            }
            _ => {}
        }
    }

    /// Move a process into the ready queue, then schedule if the CPU is
    /// idle or the process outranks the running one
    pub fn on_process_ready(&self, pid: Pid, reason: &str) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(process) = state.processes.get_mut(&pid) else {
            debug!("Ready event for unknown PID {}", pid);
            return;
        };

        match process.state {
            ProcessState::Terminated | ProcessState::New => {
                info!("Ignoring ready event for PID {} in state {}", pid, process.state);
                return;
            }
            ProcessState::Ready => {}
            ProcessState::Waiting => {
                state.waiting.retain(|&w| w != pid);
                process.waiting_reason = None;
                self.set_state(process, ProcessState::Ready, reason);
                state.ready.push(process);
            }
            ProcessState::Running => {
                if state.current == Some(pid) {
                    state.current = None;
                }
                self.set_state(process, ProcessState::Ready, reason);
                state.ready.push(process);
            }
        }

        if Self::outranks_current(state, pid) {
            self.schedule_locked(state);
        }
    }

    /// Move a process to the waiting list, then fill an empty CPU slot
    pub fn on_process_waiting(&self, pid: Pid, reason: &str) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(process) = state.processes.get_mut(&pid) else {
            debug!("Waiting event for unknown PID {}", pid);
            return;
        };

        match process.state {
            ProcessState::Terminated | ProcessState::New | ProcessState::Waiting => {
                debug!("Ignoring waiting event for PID {} in state {}", pid, process.state);
                return;
            }
            ProcessState::Running => {
                if state.current == Some(pid) {
                    state.current = None;
                }
            }
            ProcessState::Ready => {
                state.ready.remove(pid);
            }
        }

        process.waiting_reason = Some(reason.to_string());
        self.set_state(process, ProcessState::Waiting, reason);
        state.waiting.push(pid);

        if state.current.is_none() {
            self.schedule_locked(state);
        }
    }

    /// Terminate a process, then fill an empty CPU slot
    pub fn on_process_terminated(&self, pid: Pid, reason: &str) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if self.terminate_locked(state, pid, reason) && state.current.is_none() {
            self.schedule_locked(state);
        }
    }

    /// Schedule only when nothing is running
    pub fn on_scheduling_requested(&self, source: &str) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.current.is_none() && !state.ready.is_empty() {
            debug!("Scheduling requested by {}", source);
            self.schedule_locked(state);
        }
    }

    /// A device was handed to a queued process: unblock it
    pub fn on_device_granted(&self, pid: Pid, device_id: u32) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let reason = format!("device {} granted", device_id);
        if self.wake_up_locked(state, pid, &reason) && state.current.is_none() {
            self.schedule_locked(state);
        }
    }

    /// Periodic self-healing pass. Clears a stale CPU slot and schedules
    /// when the slot is empty but processes are ready.
    pub fn watchdog(&self) -> Option<Process> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(current) = state.current {
            let running = state
                .processes
                .get(&current)
                .map(|p| p.state == ProcessState::Running)
                .unwrap_or(false);
            if !running {
                warn!("Watchdog: clearing stale CPU slot held by PID {}", current);
                state.current = None;
            }
        }

        if state.current.is_none() && !state.ready.is_empty() {
            info!("Watchdog: CPU idle with {} ready processes", state.ready.len());
            return self.schedule_locked(state);
        }
        None
    }

    fn outranks_current(state: &SchedulerState, pid: Pid) -> bool {
        match state.current {
            None => true,
            Some(current) if current == pid => false,
            Some(current) => {
                let priority = |p: Pid| state.processes.get(&p).map(|p| p.priority);
                match (priority(pid), priority(current)) {
                    (Some(candidate), Some(running)) => candidate > running,
                    _ => false,
                }
            }
        }
    }
}
