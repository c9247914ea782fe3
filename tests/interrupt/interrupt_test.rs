/*!
 * Interrupt Tests
 * Severity ordering, the enable gate, logging and type-specific handling
 */

use myos_kernel::config::{DeviceConfig, InterruptConfig};
use myos_kernel::device::{DeviceManager, DeviceStatus, DeviceType};
use myos_kernel::events::{EventBus, KernelEvent};
use myos_kernel::interrupt::{InterruptManager, InterruptPayload, InterruptStatus, InterruptType};
use myos_kernel::process::{InMemoryProcessRepository, Process, ProcessRepository, ProcessState};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    manager: InterruptManager,
    devices: Arc<DeviceManager>,
    repository: Arc<InMemoryProcessRepository>,
    seen: Arc<Mutex<Vec<KernelEvent>>>,
}

fn fixture_with(config: InterruptConfig) -> Fixture {
    let events = Arc::new(EventBus::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    events.subscribe("recorder", move |event| sink.lock().push(event.clone()));

    let devices = Arc::new(DeviceManager::new(&DeviceConfig::default(), events.clone()));
    let repository = Arc::new(InMemoryProcessRepository::new());
    let manager = InterruptManager::new(&config, devices.clone(), repository.clone(), events);
    Fixture {
        manager,
        devices,
        repository,
        seen,
    }
}

fn fixture() -> Fixture {
    fixture_with(InterruptConfig {
        processing_delay: Duration::ZERO,
        ..InterruptConfig::default()
    })
}

fn with_state(pid: u32, state: ProcessState) -> Process {
    let mut process = Process::new(pid, format!("p{}", pid), 1, 4);
    process.state = state;
    process
}

impl Fixture {
    fn raise(&self, kind: InterruptType, payload: InterruptPayload) -> u64 {
        self.manager
            .trigger(0, kind, payload, format!("{} test", kind))
            .map(|interrupt| interrupt.id)
            .unwrap()
    }

    fn lifecycle_events(&self) -> Vec<KernelEvent> {
        self.seen
            .lock()
            .iter()
            .filter(|e| {
                !matches!(
                    e,
                    KernelEvent::InterruptTriggered { .. } | KernelEvent::InterruptHandled { .. }
                )
            })
            .cloned()
            .collect()
    }
}

#[test]
fn test_dispatch_follows_severity() {
    let f = fixture();
    for kind in [
        InterruptType::Other,
        InterruptType::Clock,
        InterruptType::Io,
        InterruptType::Process,
        InterruptType::Error,
        InterruptType::Device,
    ] {
        f.raise(kind, InterruptPayload::default());
    }

    let pending: Vec<InterruptType> = f.manager.pending().iter().map(|i| i.kind).collect();
    assert_eq!(pending, InterruptType::ALL.to_vec());

    let dispatched: Vec<InterruptType> =
        f.manager.drain().iter().map(|h| h.interrupt.kind).collect();
    assert_eq!(dispatched, InterruptType::ALL.to_vec());
    assert_eq!(f.manager.pending_count(), 0);
}

#[test]
fn test_equal_severity_is_fifo() {
    let f = fixture();
    let first = f.raise(InterruptType::Io, InterruptPayload::default());
    let second = f.raise(InterruptType::Io, InterruptPayload::default());

    assert_eq!(f.manager.dispatch_pass().unwrap().interrupt.id, first);
    assert_eq!(f.manager.dispatch_pass().unwrap().interrupt.id, second);
    assert!(f.manager.dispatch_pass().is_none());
}

#[test]
fn test_disabled_gate_drops() {
    let f = fixture();
    f.manager.set_enabled(false);

    assert!(f
        .manager
        .trigger(3, InterruptType::Error, InterruptPayload::for_process(3), "lost")
        .is_none());
    assert_eq!(f.manager.pending_count(), 0);
    assert!(f.manager.get_logs(10, None).is_empty());
    assert_eq!(f.manager.stats().dropped, 1);

    f.manager.set_enabled(true);
    assert!(f
        .manager
        .trigger(3, InterruptType::Error, InterruptPayload::for_process(3), "kept")
        .is_some());
    assert_eq!(f.manager.stats().triggered, 1);
}

#[test]
fn test_processing_delay_defers_dispatch() {
    let f = fixture_with(InterruptConfig {
        processing_delay: Duration::from_secs(60),
        ..InterruptConfig::default()
    });
    f.raise(InterruptType::Other, InterruptPayload::default());

    assert!(f.manager.dispatch_pass().is_none());
    assert_eq!(f.manager.pending_count(), 1);
}

#[test]
fn test_logs_newest_first_with_limit_and_filter() {
    let f = fixture();
    let io: Vec<u64> = (0..3)
        .map(|_| f.raise(InterruptType::Io, InterruptPayload::default()))
        .collect();
    let error = f.raise(InterruptType::Error, InterruptPayload::default());

    let recent: Vec<u64> = f
        .manager
        .get_logs(2, None)
        .iter()
        .map(|l| l.interrupt_id)
        .collect();
    assert_eq!(recent, vec![error, io[2]]);

    let only_io: Vec<u64> = f
        .manager
        .get_logs(10, Some(InterruptType::Io))
        .iter()
        .map(|l| l.interrupt_id)
        .collect();
    assert_eq!(only_io, vec![io[2], io[1], io[0]]);
}

#[test]
fn test_log_ring_drops_oldest() {
    let f = fixture_with(InterruptConfig {
        processing_delay: Duration::ZERO,
        log_capacity: 3,
        ..InterruptConfig::default()
    });
    let ids: Vec<u64> = (0..5)
        .map(|_| f.raise(InterruptType::Other, InterruptPayload::default()))
        .collect();

    let kept: Vec<u64> = f
        .manager
        .get_logs(10, None)
        .iter()
        .map(|l| l.interrupt_id)
        .collect();
    assert_eq!(kept, vec![ids[4], ids[3], ids[2]]);
}

#[test]
fn test_clock_logging_is_throttled() {
    let f = fixture();
    for _ in 0..25 {
        f.raise(InterruptType::Clock, InterruptPayload::default());
    }

    assert_eq!(f.manager.pending_count(), 25);
    assert_eq!(f.manager.get_logs(100, Some(InterruptType::Clock)).len(), 2);
}

#[test]
fn test_dispatch_resolves_log_entry() {
    let f = fixture();
    let id = f.raise(InterruptType::Other, InterruptPayload::default());
    assert_eq!(f.manager.log_for(id).unwrap().status, InterruptStatus::Queued);

    let handled = f.manager.dispatch_pass().unwrap();
    let entry = f.manager.log_for(id).unwrap();
    assert_eq!(entry.status, InterruptStatus::Resolved);
    assert_eq!(entry.result.as_deref(), Some(handled.result.as_str()));
    assert_eq!(f.manager.stats().dispatched, 1);
}

#[test]
fn test_error_interrupt_terminates_and_reschedules() {
    let f = fixture();
    f.raise(
        InterruptType::Error,
        InterruptPayload::for_process(4).with_reason("segfault"),
    );
    f.manager.dispatch_pass().unwrap();

    assert_eq!(
        f.lifecycle_events(),
        vec![
            KernelEvent::terminated(4, "segfault"),
            KernelEvent::scheduling_requested("interrupt"),
        ]
    );
}

#[test]
fn test_io_interrupt_for_stale_process_is_ignored() {
    let f = fixture();
    f.repository.save(&with_state(2, ProcessState::Ready));
    f.raise(InterruptType::Io, InterruptPayload::for_process(2));

    let handled = f.manager.dispatch_pass().unwrap();
    assert_eq!(handled.result, "ignored: process 2 not running");
    assert!(f.lifecycle_events().is_empty());
}

#[test]
fn test_io_interrupt_blocks_running_process() {
    let f = fixture();
    f.repository.save(&with_state(2, ProcessState::Running));
    f.raise(InterruptType::Io, InterruptPayload::for_process(2));
    f.manager.dispatch_pass().unwrap();

    assert_eq!(
        f.lifecycle_events(),
        vec![
            KernelEvent::waiting(2, "awaiting I/O completion"),
            KernelEvent::scheduling_requested("interrupt"),
        ]
    );
}

#[test]
fn test_device_interrupt_allocates_then_queues() {
    let f = fixture();
    for pid in [5, 6, 7] {
        f.raise(
            InterruptType::Device,
            InterruptPayload::for_process(pid).with_device_type(DeviceType::Printer),
        );
    }
    let results: Vec<String> = f.manager.drain().into_iter().map(|h| h.result).collect();

    assert_eq!(results[0], "device 1 allocated to process 5");
    assert_eq!(results[1], "device 2 allocated to process 6");
    assert_eq!(results[2], "process 7 waiting for device 1 (queue position 0)");

    let printer = f.devices.device(1).unwrap();
    assert_eq!(printer.status, DeviceStatus::Busy);
    assert_eq!(printer.owner, Some(5));
    assert_eq!(printer.wait_queue.iter().copied().collect::<Vec<_>>(), vec![7]);
    assert!(f
        .lifecycle_events()
        .contains(&KernelEvent::waiting(7, "awaiting device")));
}

#[test]
fn test_device_interrupt_for_current_owner_readies_it() {
    let f = fixture();
    f.devices.allocate(3, 9, 5);
    f.raise(
        InterruptType::Device,
        InterruptPayload::for_process(9).with_device_type(DeviceType::Disk),
    );

    let handled = f.manager.dispatch_pass().unwrap();
    assert_eq!(handled.result, "process 9 ready on device 3");
    assert_eq!(f.devices.device(4).unwrap().status, DeviceStatus::Idle);
}

#[test]
fn test_device_timeout_event_raises_device_interrupt() {
    let f = fixture();
    f.manager.handle_event(&KernelEvent::DeviceTimeout {
        device_id: 3,
        device_type: DeviceType::Disk,
        previous_owner: Some(8),
        promoted: None,
    });

    let pending = f.manager.pending();
    assert_eq!(pending.len(), 1);
    let interrupt = &pending[0];
    assert_eq!(interrupt.kind, InterruptType::Device);
    assert_eq!(interrupt.process_id(), None);
    assert_eq!(interrupt.payload.device_id, Some(3));
    assert_eq!(interrupt.payload.reason.as_deref(), Some("device_timeout"));
    assert_eq!(
        interrupt.payload.extra.get("previous_owner").map(String::as_str),
        Some("8")
    );

    let handled = f.manager.dispatch_pass().unwrap();
    assert_eq!(handled.result, "device 3 event recorded");
}

#[test]
fn test_interrupt_process_requires_running() {
    let f = fixture();
    f.repository.save(&with_state(1, ProcessState::Running));
    f.repository.save(&with_state(2, ProcessState::Waiting));

    assert!(f.manager.interrupt_process(1, InterruptType::Io).is_some());
    assert!(f.manager.interrupt_process(2, InterruptType::Io).is_none());
    assert!(f.manager.interrupt_process(3, InterruptType::Io).is_none());
    assert_eq!(f.manager.pending_count(), 1);
}

#[test]
fn test_process_preemption_requests_scheduling() {
    let f = fixture();
    f.raise(
        InterruptType::Process,
        InterruptPayload::for_process(6).with_reason("higher_priority_arrival"),
    );
    f.manager.dispatch_pass().unwrap();

    assert_eq!(
        f.lifecycle_events(),
        vec![
            KernelEvent::ready(6, "process interrupt"),
            KernelEvent::scheduling_requested("interrupt"),
        ]
    );
}

#[test]
fn test_parse_interrupt_type() {
    assert_eq!(" device ".parse::<InterruptType>().unwrap(), InterruptType::Device);
    assert!("bogus".parse::<InterruptType>().is_err());
}
