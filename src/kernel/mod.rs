/*!
 * Kernel
 *
 * Facade over the scheduler, interrupt pipeline, paged memory, device
 * manager, swapper and clock. This is the surface a request layer calls.
 */

mod builder;

pub use builder::KernelBuilder;

use crate::config::KernelConfig;
use crate::core::limits::PREEMPTION_REASON;
use crate::core::types::{DeviceId, KernelResult, Pid, Priority, Size, Ticks, Vector};
use crate::device::{AllocationOutcome, Device, DeviceManager, DeviceType};
use crate::events::EventBus;
use crate::interrupt::{
    HandledInterrupt, Interrupt, InterruptLog, InterruptManager, InterruptPayload, InterruptStats,
    InterruptType,
};
use crate::memory::{MemoryBlock, MemoryInfo, MemoryManager, MemoryStats};
use crate::process::{
    AdmissionResult, Process, ProcessRepository, ProcessState, ProcessSwapper, ProcessTransition,
    QueueSnapshot, Scheduler, SchedulingPolicy,
};
use crate::timer::{TickReport, Timer, TimerTask};
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

pub struct Kernel {
    config: KernelConfig,
    events: Arc<EventBus>,
    memory: Arc<MemoryManager>,
    swapper: Arc<ProcessSwapper>,
    scheduler: Arc<Scheduler>,
    devices: Arc<DeviceManager>,
    interrupts: Arc<InterruptManager>,
    timer: Arc<Timer>,
    processes: Arc<dyn ProcessRepository>,
    task: Mutex<Option<TimerTask>>,
}

impl Kernel {
    pub fn builder() -> KernelBuilder {
        KernelBuilder::new()
    }

    /// Kernel with default configuration and in-memory collaborators
    pub fn new() -> KernelResult<Self> {
        KernelBuilder::new().build()
    }

    pub fn with_config(config: KernelConfig) -> KernelResult<Self> {
        KernelBuilder::new().with_config(config).build()
    }

    // ========================================================================
    // Processes
    // ========================================================================

    /// Admit a new process
    ///
    /// When the arrival displaced the running process, a PROCESS interrupt
    /// settles the preemption on the next dispatch pass.
    pub fn create_process(
        &self,
        name: impl Into<String>,
        priority: Priority,
        memory_size: Size,
    ) -> (Process, AdmissionResult) {
        let (process, result, preempted) =
            self.scheduler.admit_with_preemption(name, priority, memory_size);

        if let Some(previous) = preempted {
            self.interrupts.trigger(
                process.pid,
                InterruptType::Process,
                InterruptPayload::for_process(process.pid).with_reason(PREEMPTION_REASON),
                format!("Process {} preempted process {}", process.pid, previous),
            );
        }
        (process, result)
    }

    pub fn processes(&self) -> Vec<Process> {
        self.scheduler.processes()
    }

    pub fn processes_by_state(&self, state: ProcessState) -> Vec<Process> {
        self.scheduler.processes_by_state(state)
    }

    pub fn process(&self, pid: Pid) -> Option<Process> {
        self.scheduler.process(pid)
    }

    /// Descriptor as last persisted
    pub fn stored_process(&self, pid: Pid) -> Option<Process> {
        self.processes.find_by_id(pid)
    }

    pub fn current_process(&self) -> Option<Process> {
        self.scheduler.current()
    }

    pub fn update_process_state(&self, pid: Pid, state: ProcessState) -> bool {
        let changed = self.scheduler.update_state(pid, state);
        if changed && state == ProcessState::Terminated {
            self.devices.reclaim_process(pid);
        }
        changed
    }

    pub fn update_priority(&self, pid: Pid, priority: Priority) -> bool {
        self.scheduler.update_priority(pid, priority)
    }

    pub fn schedule(&self) -> Option<Process> {
        self.scheduler.schedule()
    }

    pub fn block_process(&self, pid: Pid, reason: &str) -> bool {
        self.scheduler.block(pid, reason)
    }

    pub fn wake_up_process(&self, pid: Pid) -> bool {
        self.scheduler.wake_up(pid)
    }

    /// Terminate, release memory and hand its devices to waiters
    pub fn terminate_process(&self, pid: Pid, reason: &str) -> bool {
        let terminated = self.scheduler.terminate(pid, reason);
        if terminated {
            self.devices.reclaim_process(pid);
        }
        terminated
    }

    pub fn transition_history(&self, pid: Pid) -> Vec<ProcessTransition> {
        self.scheduler.history(pid)
    }

    pub fn set_scheduling_policy(&self, policy: SchedulingPolicy) {
        self.scheduler.set_policy(policy);
    }

    pub fn queue_status(&self) -> QueueSnapshot {
        self.scheduler.queue_status()
    }

    // ========================================================================
    // Interrupts
    // ========================================================================

    pub fn trigger_interrupt(
        &self,
        vector: Vector,
        kind: InterruptType,
        payload: InterruptPayload,
        message: impl Into<String>,
    ) -> Option<Interrupt> {
        self.interrupts.trigger(vector, kind, payload, message)
    }

    /// Interrupt a running process; `None` when it is not running
    pub fn interrupt_process(&self, pid: Pid, kind: InterruptType) -> Option<Interrupt> {
        self.interrupts.interrupt_process(pid, kind)
    }

    /// One dispatch pass
    pub fn dispatch_interrupts(&self) -> Option<HandledInterrupt> {
        self.interrupts.dispatch_pass()
    }

    pub fn pending_interrupts(&self) -> Vec<Interrupt> {
        self.interrupts.pending()
    }

    pub fn interrupt_logs(&self, limit: usize, filter: Option<InterruptType>) -> Vec<InterruptLog> {
        self.interrupts.get_logs(limit, filter)
    }

    pub fn set_interrupts_enabled(&self, enabled: bool) {
        self.interrupts.set_enabled(enabled);
    }

    pub fn interrupt_stats(&self) -> InterruptStats {
        self.interrupts.stats()
    }

    // ========================================================================
    // Devices
    // ========================================================================

    pub fn allocate_device(&self, id: DeviceId, pid: Pid, duration: Ticks) -> AllocationOutcome {
        self.devices.allocate(id, pid, duration)
    }

    pub fn release_device(&self, id: DeviceId) -> Option<Device> {
        self.devices.release(id)
    }

    pub fn device(&self, id: DeviceId) -> Option<Device> {
        self.devices.device(id)
    }

    pub fn devices(&self) -> Vec<Device> {
        self.devices.devices()
    }

    pub fn devices_by_type(&self, kind: DeviceType) -> Vec<Device> {
        self.devices.devices_by_type(kind)
    }

    pub fn available_devices(&self) -> Vec<Device> {
        self.devices.available_devices()
    }

    pub fn signal_device_completion(&self, id: DeviceId) -> bool {
        self.devices.signal_completion(id)
    }

    // ========================================================================
    // Memory and swap
    // ========================================================================

    pub fn free_memory(&self) -> Size {
        self.memory.free_memory()
    }

    pub fn memory_usage(&self) -> f64 {
        self.memory.usage()
    }

    pub fn free_blocks(&self) -> Vec<MemoryBlock> {
        self.memory.free_blocks()
    }

    pub fn allocated_blocks(&self) -> Vec<MemoryBlock> {
        self.memory.allocated_blocks()
    }

    pub fn page_status(&self) -> Vec<Pid> {
        self.memory.page_status()
    }

    pub fn memory_stats(&self) -> MemoryStats {
        self.memory.stats()
    }

    pub fn swap_out(&self, pid: Pid) -> bool {
        self.scheduler.swap_out(pid)
    }

    pub fn swap_in(&self, pid: Pid) -> bool {
        self.scheduler.swap_in(pid)
    }

    pub fn swapped_processes(&self) -> Vec<Pid> {
        self.swapper.swapped()
    }

    // ========================================================================
    // Timer
    // ========================================================================

    /// Advance the clock one tick by hand
    pub fn tick(&self) -> Option<TickReport> {
        self.timer.tick()
    }

    /// Spawn the periodic timer task on the current tokio runtime
    ///
    /// Returns false when it is already running.
    pub fn start_timer(&self) -> bool {
        let mut task = self.task.lock();
        if task.is_some() {
            return false;
        }
        self.timer.start();
        *task = Some(TimerTask::spawn(
            &self.config.timer,
            self.timer.clone(),
            self.interrupts.clone(),
            self.scheduler.clone(),
        ));
        true
    }

    /// Stop the periodic task and wait for it
    pub async fn stop_timer(&self) {
        let task = self.task.lock().take();
        match task {
            Some(task) => {
                task.shutdown().await;
                info!("Timer stopped at tick {}", self.timer.current_time());
            }
            None => warn!("Timer task was not running"),
        }
    }

    /// Run the scheduling watchdog once
    pub fn watchdog(&self) -> Option<Process> {
        self.scheduler.watchdog()
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Cross-component invariants: one running process, page accounting,
    /// device status consistency
    pub fn check_invariants(&self) -> bool {
        self.scheduler.check_invariants()
            && self.memory.check_invariant()
            && self.devices.check_invariants()
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn memory(&self) -> &Arc<MemoryManager> {
        &self.memory
    }

    pub fn device_manager(&self) -> &Arc<DeviceManager> {
        &self.devices
    }

    pub fn interrupts(&self) -> &Arc<InterruptManager> {
        &self.interrupts
    }

    pub fn timer(&self) -> &Arc<Timer> {
        &self.timer
    }
}
