/*!
 * Device Tests
 * Allocation, wait queues, release hand-off and timeout reclamation
 */

use myos_kernel::config::DeviceConfig;
use myos_kernel::device::{AllocationOutcome, DeviceManager, DeviceStatus, DeviceType};
use myos_kernel::events::{EventBus, KernelEvent};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::{Arc, Barrier};
use std::thread;

fn manager() -> (DeviceManager, Arc<Mutex<Vec<KernelEvent>>>) {
    let events = Arc::new(EventBus::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    events.subscribe("recorder", move |event| sink.lock().push(event.clone()));
    (DeviceManager::new(&DeviceConfig::default(), events), seen)
}

fn queue_of(devices: &DeviceManager, id: u32) -> Vec<u32> {
    devices.device(id).unwrap().wait_queue.into_iter().collect()
}

#[test]
fn test_catalog_views() {
    let (devices, _) = manager();
    assert_eq!(devices.devices().len(), 7);
    assert_eq!(devices.devices_by_type(DeviceType::Disk).len(), 2);

    devices.allocate(3, 1, 5);
    let available: Vec<u32> = devices.available_devices().iter().map(|d| d.id).collect();
    assert_eq!(available, vec![1, 2, 4, 5, 6, 7]);
}

#[test]
fn test_allocate_idle_device() {
    let (devices, _) = manager();
    let before = devices.device(1).unwrap().version;

    assert_eq!(devices.allocate(1, 10, 3), AllocationOutcome::Granted);
    let device = devices.device(1).unwrap();
    assert_eq!(device.status, DeviceStatus::Busy);
    assert_eq!(device.owner, Some(10));
    assert_eq!(device.remaining, 3);
    assert!(device.version > before);
}

#[test]
fn test_zero_duration_counts_as_one_tick() {
    let (devices, _) = manager();
    devices.allocate(1, 10, 0);
    assert_eq!(devices.device(1).unwrap().remaining, 1);
}

#[test]
fn test_owner_reallocation_is_noop() {
    let (devices, _) = manager();
    devices.allocate(1, 10, 3);
    let version = devices.device(1).unwrap().version;

    assert_eq!(devices.allocate(1, 10, 9), AllocationOutcome::Granted);
    let device = devices.device(1).unwrap();
    assert_eq!(device.remaining, 3);
    assert_eq!(device.version, version);
    assert!(device.wait_queue.is_empty());
}

#[test]
fn test_queueing_is_idempotent() {
    let (devices, _) = manager();
    devices.allocate(1, 10, 3);

    assert_eq!(
        devices.allocate(1, 11, 3),
        AllocationOutcome::Queued { position: 0 }
    );
    assert_eq!(
        devices.allocate(1, 11, 3),
        AllocationOutcome::Queued { position: 0 }
    );
    assert_eq!(
        devices.allocate(1, 12, 3),
        AllocationOutcome::Queued { position: 1 }
    );
    assert_eq!(queue_of(&devices, 1), vec![11, 12]);
}

#[test]
fn test_release_hands_device_to_waiter() {
    let (devices, seen) = manager();
    devices.allocate(1, 1, 5);
    devices.allocate(1, 2, 5);

    let device = devices.release(1).unwrap();
    assert_eq!(device.status, DeviceStatus::Busy);
    assert_eq!(device.owner, Some(2));
    assert_eq!(device.remaining, devices.default_duration());
    assert!(device.wait_queue.is_empty());
    assert_eq!(
        *seen.lock(),
        vec![KernelEvent::DeviceGranted { device_id: 1, pid: 2 }]
    );
}

#[test]
fn test_release_without_waiters_idles() {
    let (devices, seen) = manager();
    devices.allocate(6, 1, 5);

    let device = devices.release(6).unwrap();
    assert_eq!(device.status, DeviceStatus::Idle);
    assert_eq!(device.owner, None);
    assert!(seen.lock().is_empty());
}

#[test]
fn test_unknown_device() {
    let (devices, _) = manager();
    assert_eq!(devices.allocate(99, 1, 1), AllocationOutcome::NotFound);
    assert!(devices.release(99).is_none());
    assert!(!devices.signal_completion(99));
}

#[test]
fn test_timeout_reclaims_into_error() {
    let (devices, seen) = manager();
    devices.allocate(3, 1, 2);

    assert!(devices.check_timeouts().is_empty());
    assert_eq!(devices.device(3).unwrap().remaining, 1);

    let reclaimed = devices.check_timeouts();
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].previous_owner, Some(1));
    assert_eq!(reclaimed[0].promoted, None);

    let device = devices.device(3).unwrap();
    assert_eq!(device.status, DeviceStatus::Error);
    assert_eq!(device.owner, None);
    assert_eq!(
        *seen.lock(),
        vec![KernelEvent::DeviceTimeout {
            device_id: 3,
            device_type: DeviceType::Disk,
            previous_owner: Some(1),
            promoted: None,
        }]
    );

    // Timed-out devices are reusable
    assert!(devices.check_timeouts().is_empty());
    assert_eq!(devices.allocate(3, 5, 1), AllocationOutcome::Granted);
}

#[test]
fn test_timeout_promotes_waiter() {
    let (devices, seen) = manager();
    devices.allocate(5, 1, 1);
    devices.allocate(5, 2, 1);

    let reclaimed = devices.check_timeouts();
    assert_eq!(reclaimed[0].promoted, Some(2));

    let device = devices.device(5).unwrap();
    assert_eq!(device.status, DeviceStatus::Busy);
    assert_eq!(device.owner, Some(2));
    assert!(device.wait_queue.is_empty());

    let names: Vec<&str> = seen.lock().iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["device_timeout", "device_granted"]);
}

#[test]
fn test_allocate_by_type_prefers_free_device() {
    let (devices, _) = manager();
    assert_eq!(
        devices.allocate_by_type(DeviceType::Printer, 1, 3),
        (Some(1), AllocationOutcome::Granted)
    );
    assert_eq!(
        devices.allocate_by_type(DeviceType::Printer, 2, 3),
        (Some(2), AllocationOutcome::Granted)
    );
    assert_eq!(
        devices.allocate_by_type(DeviceType::Printer, 3, 3),
        (Some(1), AllocationOutcome::Queued { position: 0 })
    );
    assert_eq!(
        devices.allocate_by_type(DeviceType::Other, 3, 3),
        (None, AllocationOutcome::NotFound)
    );
    assert_eq!(devices.owned_by(2, DeviceType::Printer), Some(2));
    assert_eq!(devices.find_available(DeviceType::Printer), None);
}

#[test]
fn test_reclaim_process_releases_and_dequeues() {
    let (devices, _) = manager();
    devices.allocate(1, 1, 5);
    devices.allocate(1, 2, 5);
    devices.allocate(3, 4, 5);
    devices.allocate(3, 1, 5);

    assert_eq!(devices.reclaim_process(1), 1);
    assert_eq!(devices.device(1).unwrap().owner, Some(2));
    assert!(queue_of(&devices, 3).is_empty());
    assert_eq!(devices.device(3).unwrap().owner, Some(4));
    assert!(devices.check_invariants());
}

#[test]
fn test_release_if_owned_checks_owner() {
    let (devices, seen) = manager();
    devices.allocate(4, 1, 5);
    devices.allocate(4, 2, 5);

    assert!(!devices.release_if_owned(4, 2));
    assert_eq!(devices.device(4).unwrap().owner, Some(1));
    assert!(!devices.release_if_owned(99, 1));

    assert!(devices.release_if_owned(4, 1));
    assert_eq!(devices.device(4).unwrap().owner, Some(2));
    assert_eq!(
        *seen.lock(),
        vec![KernelEvent::DeviceGranted { device_id: 4, pid: 2 }]
    );
}

#[test]
fn test_reclaim_racing_timeout_keeps_promoted_waiter() {
    for _ in 0..2000 {
        let (devices, seen) = manager();
        devices.allocate(1, 1, 1);
        devices.allocate(1, 2, 5);
        let barrier = Barrier::new(2);

        thread::scope(|s| {
            s.spawn(|| {
                barrier.wait();
                devices.check_timeouts();
            });
            s.spawn(|| {
                barrier.wait();
                devices.reclaim_process(1);
            });
        });

        let device = devices.device(1).unwrap();
        assert_eq!(device.owner, Some(2));
        assert_eq!(device.status, DeviceStatus::Busy);
        assert!(devices.check_invariants());
        let grants = seen
            .lock()
            .iter()
            .filter(|e| matches!(e, KernelEvent::DeviceGranted { pid: 2, .. }))
            .count();
        assert_eq!(grants, 1);
    }
}

#[test]
fn test_signal_completion_requires_busy_owner() {
    let (devices, seen) = manager();
    assert!(!devices.signal_completion(7));

    devices.allocate(7, 3, 5);
    assert!(devices.signal_completion(7));
    assert_eq!(
        seen.lock().last(),
        Some(&KernelEvent::DeviceIoCompleted {
            device_id: 7,
            device_type: DeviceType::Usb,
            pid: 3,
        })
    );
}

#[test]
fn test_reset_restores_catalog() {
    let (devices, _) = manager();
    devices.allocate(1, 1, 5);
    devices.allocate(1, 2, 5);
    devices.reset();

    assert_eq!(devices.available_devices().len(), 7);
    assert!(queue_of(&devices, 1).is_empty());
}

#[derive(Debug, Clone)]
enum Op {
    Allocate { id: u32, pid: u32, duration: u32 },
    Release { id: u32 },
    Tick,
    Reclaim { pid: u32 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u32..8, 1u32..5, 0u32..4)
            .prop_map(|(id, pid, duration)| Op::Allocate { id, pid, duration }),
        (1u32..8).prop_map(|id| Op::Release { id }),
        Just(Op::Tick),
        (1u32..5).prop_map(|pid| Op::Reclaim { pid }),
    ]
}

proptest! {
    #[test]
    fn prop_busy_iff_owned(ops in prop::collection::vec(op(), 1..80)) {
        let (devices, _) = manager();
        for op in &ops {
            match *op {
                Op::Allocate { id, pid, duration } => {
                    devices.allocate(id, pid, duration);
                }
                Op::Release { id } => {
                    devices.release(id);
                }
                Op::Tick => {
                    devices.check_timeouts();
                }
                Op::Reclaim { pid } => {
                    devices.reclaim_process(pid);
                }
            }
            prop_assert!(devices.check_invariants(), "invariant broken after {:?}", op);
        }

        for device in devices.devices() {
            let mut queued = device.wait_queue.clone().into_iter().collect::<Vec<_>>();
            queued.sort_unstable();
            queued.dedup();
            prop_assert_eq!(queued.len(), device.wait_queue.len());
            prop_assert!(device.owner.map_or(true, |o| !device.wait_queue.contains(&o)));
        }
    }
}
