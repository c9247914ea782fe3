/*!
 * Interrupt Manager
 *
 * Lifecycle of an interrupt: Queued (on trigger) -> Dispatched (popped once
 * it has sat in the queue for the processing delay) -> Resolved (result
 * recorded, `InterruptHandled` published). One interrupt is serviced per
 * dispatch pass.
 */

use super::logbook::InterruptLogBook;
use super::queue::InterruptQueue;
use super::types::{
    Interrupt, InterruptLog, InterruptPayload, InterruptStats, InterruptType,
};
use crate::config::InterruptConfig;
use crate::core::types::{InterruptId, Pid, Vector};
use crate::device::DeviceManager;
use crate::events::{EventBus, KernelEvent};
use crate::process::{ProcessRepository, ProcessState};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct InterruptManager {
    pub(super) queue: InterruptQueue,
    pub(super) logs: InterruptLogBook,
    enabled: AtomicBool,
    next_id: AtomicU64,
    clock_seen: AtomicU64,
    pub(super) processing_delay: Duration,
    pub(super) service_latency: Duration,
    clock_log_interval: u64,
    triggered: AtomicU64,
    pub(super) dispatched: AtomicU64,
    dropped: AtomicU64,
    pub(super) devices: Arc<DeviceManager>,
    pub(super) processes: Arc<dyn ProcessRepository>,
    pub(super) events: Arc<EventBus>,
}

impl InterruptManager {
    pub fn new(
        config: &InterruptConfig,
        devices: Arc<DeviceManager>,
        processes: Arc<dyn ProcessRepository>,
        events: Arc<EventBus>,
    ) -> Self {
        info!(
            "Interrupt manager initialized: delay={:?}, latency={:?}, log capacity={}",
            config.processing_delay, config.service_latency, config.log_capacity
        );

        Self {
            queue: InterruptQueue::new(),
            logs: InterruptLogBook::new(config.log_capacity),
            enabled: AtomicBool::new(config.enabled),
            next_id: AtomicU64::new(1),
            clock_seen: AtomicU64::new(0),
            processing_delay: config.processing_delay,
            service_latency: config.service_latency,
            clock_log_interval: config.clock_log_interval.max(1),
            triggered: AtomicU64::new(0),
            dispatched: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            devices,
            processes,
            events,
        }
    }

    /// Raise an interrupt
    ///
    /// Returns `None` when interrupts are disabled; the interrupt is dropped,
    /// not queued.
    pub fn trigger(
        &self,
        vector: Vector,
        kind: InterruptType,
        payload: InterruptPayload,
        message: impl Into<String>,
    ) -> Option<Interrupt> {
        if !self.is_enabled() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            debug!("Interrupts disabled, dropping {} on vector {}", kind, vector);
            return None;
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let interrupt = Interrupt::new(id, vector, kind, payload, message);

        if self.should_log(kind) {
            self.logs.record(&interrupt);
        }
        self.queue.push(interrupt.clone());
        self.triggered.fetch_add(1, Ordering::Relaxed);

        if kind != InterruptType::Clock {
            info!(
                "Interrupt {} queued: {} (vector {}, pid {:?})",
                id,
                kind,
                vector,
                interrupt.process_id()
            );
        }
        self.events.publish(KernelEvent::InterruptTriggered {
            interrupt: interrupt.clone(),
        });
        Some(interrupt)
    }

    /// Raise an interrupt against a process, but only while it is running
    pub fn interrupt_process(&self, pid: Pid, kind: InterruptType) -> Option<Interrupt> {
        match self.processes.find_by_id(pid) {
            Some(process) if process.state == ProcessState::Running => self.trigger(
                pid,
                kind,
                InterruptPayload::for_process(pid),
                format!("{} interrupt for process {}", kind, pid),
            ),
            Some(process) => {
                debug!(
                    "Not interrupting PID {}: state is {}",
                    pid, process.state
                );
                None
            }
            None => None,
        }
    }

    /// Clock interrupts are logged only every Nth occurrence
    fn should_log(&self, kind: InterruptType) -> bool {
        if kind != InterruptType::Clock {
            return true;
        }
        let seen = self.clock_seen.fetch_add(1, Ordering::Relaxed) + 1;
        seen % self.clock_log_interval == 0
    }

    /// Entry point for the event bus
    pub fn handle_event(&self, event: &KernelEvent) {
        match event {
            KernelEvent::DeviceTimeout {
                device_id,
                device_type,
                previous_owner,
                promoted,
            } => {
                let mut payload = InterruptPayload::default()
                    .with_device(*device_id, *device_type)
                    .with_reason("device_timeout");
                if let Some(owner) = previous_owner {
                    payload = payload.with_extra("previous_owner", owner);
                }
                if let Some(next) = promoted {
                    payload = payload.with_extra("promoted", next);
                }
                self.trigger(
                    *device_id,
                    InterruptType::Device,
                    payload,
                    format!("Device {} timed out and was reclaimed", device_id),
                );
            }
            KernelEvent::DeviceIoCompleted {
                device_id,
                device_type,
                pid,
            } => {
                self.trigger(
                    *device_id,
                    InterruptType::Device,
                    InterruptPayload::for_process(*pid)
                        .with_device(*device_id, *device_type)
                        .with_reason("io_complete"),
                    format!("Device {} completed I/O for process {}", device_id, pid),
                );
            }
            _ => {}
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        if enabled {
            info!("Interrupts enabled");
        } else {
            warn!("Interrupts disabled; new interrupts will be dropped");
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Queued interrupts in dispatch order
    pub fn pending(&self) -> Vec<Interrupt> {
        self.queue.snapshot()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Most recent log entries first
    pub fn get_logs(&self, limit: usize, filter: Option<InterruptType>) -> Vec<InterruptLog> {
        self.logs.recent(limit, filter)
    }

    pub fn log_for(&self, interrupt_id: InterruptId) -> Option<InterruptLog> {
        self.logs
            .recent(usize::MAX, None)
            .into_iter()
            .find(|entry| entry.interrupt_id == interrupt_id)
    }

    pub fn processing_delay(&self) -> Duration {
        self.processing_delay
    }

    pub fn stats(&self) -> InterruptStats {
        InterruptStats {
            triggered: self.triggered.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            pending: self.queue.len(),
        }
    }

    /// Drop everything queued and logged
    pub fn clear(&self) -> usize {
        self.logs.clear();
        let dropped = self.queue.clear();
        if dropped > 0 {
            warn!("Cleared {} pending interrupts", dropped);
        }
        dropped
    }
}
