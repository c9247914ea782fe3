/*!
 * Interrupt Dispatch
 * Type-specific servicing of queued interrupts
 */

use super::manager::InterruptManager;
use super::types::{HandledInterrupt, Interrupt, InterruptType};
use crate::core::limits::{PREEMPTION_REASON, REASON_AWAITING_DEVICE, REASON_AWAITING_IO};
use crate::core::types::Pid;
use crate::device::{AllocationOutcome, DeviceType};
use crate::events::KernelEvent;
use crate::monitoring::dispatch_span;
use crate::process::ProcessState;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Instant;
use tracing::{debug, info};

const SOURCE: &str = "interrupt";

impl InterruptManager {
    /// Service at most one due interrupt
    ///
    /// No queue lock is held while the handler runs; the simulated service
    /// latency brackets only the handling itself.
    pub fn dispatch_pass(&self) -> Option<HandledInterrupt> {
        let interrupt = self.queue.pop_due(self.processing_delay)?;
        self.logs.mark_dispatched(interrupt.id);

        let span = dispatch_span(interrupt.id, interrupt.kind.as_str(), interrupt.process_id());
        let _guard = span.enter();
        let started = Instant::now();

        if !self.service_latency.is_zero() {
            thread::sleep(self.service_latency);
        }
        let result = self.handle(&interrupt);
        let processing_time = started.elapsed();

        span.record("result", result.as_str());
        span.record("duration_us", processing_time.as_micros() as u64);
        self.logs.resolve(interrupt.id, &result);
        self.dispatched.fetch_add(1, Ordering::Relaxed);

        if interrupt.kind == InterruptType::Clock {
            debug!(interrupt_id = interrupt.id, %result, "clock interrupt handled");
        } else {
            info!(
                interrupt_id = interrupt.id,
                kind = %interrupt.kind,
                %result,
                processing_us = processing_time.as_micros() as u64,
                "interrupt handled"
            );
        }

        self.events.publish(KernelEvent::InterruptHandled {
            interrupt_id: interrupt.id,
            kind: interrupt.kind,
            result: result.clone(),
            processing_time,
        });

        Some(HandledInterrupt {
            interrupt,
            result,
            processing_time,
        })
    }

    /// Dispatch until nothing due remains
    pub fn drain(&self) -> Vec<HandledInterrupt> {
        std::iter::from_fn(|| self.dispatch_pass()).collect()
    }

    fn handle(&self, interrupt: &Interrupt) -> String {
        let pid = interrupt.process_id();
        match interrupt.kind {
            InterruptType::Error => self.handle_error(pid, interrupt),
            InterruptType::Device => self.handle_device(pid, interrupt),
            InterruptType::Io => self.handle_io(pid),
            InterruptType::Process => self.handle_process(pid, interrupt),
            InterruptType::Clock => {
                self.events.publish(KernelEvent::scheduling_requested("clock"));
                "scheduling requested".to_string()
            }
            InterruptType::Other => match pid {
                Some(pid) => {
                    self.events.publish(KernelEvent::ready(pid, "interrupt"));
                    format!("process {} ready", pid)
                }
                None => "recorded".to_string(),
            },
        }
    }

    fn handle_error(&self, pid: Option<Pid>, interrupt: &Interrupt) -> String {
        let Some(pid) = pid else {
            return "error recorded without process".to_string();
        };
        let reason = interrupt
            .payload
            .reason
            .clone()
            .unwrap_or_else(|| "error interrupt".to_string());
        self.events.publish(KernelEvent::terminated(pid, reason));
        self.events.publish(KernelEvent::scheduling_requested(SOURCE));
        format!("process {} terminated", pid)
    }

    fn handle_device(&self, pid: Option<Pid>, interrupt: &Interrupt) -> String {
        let kind = interrupt.payload.device_type.or_else(|| {
            interrupt
                .payload
                .device_id
                .and_then(|id| self.devices.device(id))
                .map(|device| device.kind)
        });

        let (Some(pid), Some(kind)) = (pid, kind) else {
            return match interrupt.payload.device_id {
                Some(id) => format!("device {} event recorded", id),
                None => "device event recorded".to_string(),
            };
        };

        if let Some(id) = self.devices.owned_by(pid, kind) {
            self.events
                .publish(KernelEvent::ready(pid, format!("device {} ready", id)));
            return format!("process {} ready on device {}", pid, id);
        }

        self.acquire_device(pid, kind)
    }

    fn acquire_device(&self, pid: Pid, kind: DeviceType) -> String {
        let duration = self.devices.default_duration();
        match self.devices.allocate_by_type(kind, pid, duration) {
            (Some(id), AllocationOutcome::Granted) => {
                self.events
                    .publish(KernelEvent::ready(pid, format!("device {} allocated", id)));
                format!("device {} allocated to process {}", id, pid)
            }
            (Some(id), AllocationOutcome::Queued { position }) => {
                self.events
                    .publish(KernelEvent::waiting(pid, REASON_AWAITING_DEVICE));
                self.events.publish(KernelEvent::scheduling_requested(SOURCE));
                format!(
                    "process {} waiting for device {} (queue position {})",
                    pid, id, position
                )
            }
            _ => format!("no {} device for process {}", kind, pid),
        }
    }

    fn handle_io(&self, pid: Option<Pid>) -> String {
        let Some(pid) = pid else {
            return "io recorded without process".to_string();
        };
        let running = self
            .processes
            .find_by_id(pid)
            .map(|p| p.state == ProcessState::Running)
            .unwrap_or(false);
        if !running {
            return format!("ignored: process {} not running", pid);
        }

        self.events.publish(KernelEvent::waiting(pid, REASON_AWAITING_IO));
        self.events.publish(KernelEvent::scheduling_requested(SOURCE));
        format!("process {} waiting for I/O", pid)
    }

    fn handle_process(&self, pid: Option<Pid>, interrupt: &Interrupt) -> String {
        let Some(pid) = pid else {
            return "process event recorded".to_string();
        };
        let preempting = interrupt.payload.reason.as_deref() == Some(PREEMPTION_REASON);
        self.events.publish(KernelEvent::ready(pid, "process interrupt"));
        if preempting {
            self.events.publish(KernelEvent::scheduling_requested(SOURCE));
            format!("process {} ready after preemption", pid)
        } else {
            format!("process {} ready", pid)
        }
    }
}
