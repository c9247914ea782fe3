/*!
 * Kernel Events
 * Typed signals exchanged between subsystems
 */

use crate::core::types::{DeviceId, InterruptId, Pid};
use crate::device::DeviceType;
use crate::interrupt::{Interrupt, InterruptType};
use std::time::Duration;

/// Signal delivered synchronously to every subscriber
#[derive(Debug, Clone, PartialEq)]
pub enum KernelEvent {
    /// An interrupt entered the queue
    InterruptTriggered { interrupt: Interrupt },
    /// An interrupt was dispatched and its result recorded
    InterruptHandled {
        interrupt_id: InterruptId,
        kind: InterruptType,
        result: String,
        processing_time: Duration,
    },
    ProcessReady { pid: Pid, reason: String },
    ProcessWaiting { pid: Pid, reason: String },
    ProcessTerminated { pid: Pid, reason: String },
    SchedulingRequested { source: String },
    /// A device ran out its granted time and was reclaimed
    DeviceTimeout {
        device_id: DeviceId,
        device_type: DeviceType,
        previous_owner: Option<Pid>,
        promoted: Option<Pid>,
    },
    /// A queued process was promoted to owner of a device
    DeviceGranted { device_id: DeviceId, pid: Pid },
    /// A device finished a unit of work for its owner
    DeviceIoCompleted {
        device_id: DeviceId,
        device_type: DeviceType,
        pid: Pid,
    },
}

impl KernelEvent {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            KernelEvent::InterruptTriggered { .. } => "interrupt_triggered",
            KernelEvent::InterruptHandled { .. } => "interrupt_handled",
            KernelEvent::ProcessReady { .. } => "process_ready",
            KernelEvent::ProcessWaiting { .. } => "process_waiting",
            KernelEvent::ProcessTerminated { .. } => "process_terminated",
            KernelEvent::SchedulingRequested { .. } => "scheduling_requested",
            KernelEvent::DeviceTimeout { .. } => "device_timeout",
            KernelEvent::DeviceGranted { .. } => "device_granted",
            KernelEvent::DeviceIoCompleted { .. } => "device_io_completed",
        }
    }

    pub fn ready(pid: Pid, reason: impl Into<String>) -> Self {
        KernelEvent::ProcessReady {
            pid,
            reason: reason.into(),
        }
    }

    pub fn waiting(pid: Pid, reason: impl Into<String>) -> Self {
        KernelEvent::ProcessWaiting {
            pid,
            reason: reason.into(),
        }
    }

    pub fn terminated(pid: Pid, reason: impl Into<String>) -> Self {
        KernelEvent::ProcessTerminated {
            pid,
            reason: reason.into(),
        }
    }

    pub fn scheduling_requested(source: impl Into<String>) -> Self {
        KernelEvent::SchedulingRequested {
            source: source.into(),
        }
    }
}
