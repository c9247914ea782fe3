/*!
 * Kernel Scenario Tests
 * End-to-end behavior through the facade with every subsystem wired
 */

use myos_kernel::config::MemoryConfig;
use myos_kernel::device::{AllocationOutcome, DeviceStatus};
use myos_kernel::interrupt::{InterruptPayload, InterruptType};
use myos_kernel::memory::MemoryError;
use myos_kernel::process::ProcessState;
use myos_kernel::{Kernel, KernelConfig, KernelError};
use pretty_assertions::assert_eq;

fn kernel() -> Kernel {
    Kernel::with_config(KernelConfig::for_testing()).unwrap()
}

#[test]
fn test_priority_scheduling() {
    let k = kernel();
    let (p1, _) = k.create_process("p1", 5, 16);
    let (p2, _) = k.create_process("p2", 10, 16);

    let running = k.schedule().unwrap();
    assert_eq!(running.pid, p2.pid);
    assert_eq!(k.process(p1.pid).unwrap().state, ProcessState::Ready);
    assert!(k.pending_interrupts().is_empty());
    assert!(k.check_invariants());
}

#[test]
fn test_device_timeout_raises_device_interrupt() {
    let k = kernel();
    let (p, _) = k.create_process("printer-user", 1, 8);
    assert_eq!(k.allocate_device(1, p.pid, 1), AllocationOutcome::Granted);

    k.tick().unwrap();
    k.tick().unwrap();

    let device = k.device(1).unwrap();
    assert_eq!(device.status, DeviceStatus::Error);
    assert_eq!(device.owner, None);

    let pending = k.pending_interrupts();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, InterruptType::Device);
    assert_eq!(pending[0].payload.device_id, Some(1));
    assert!(k.check_invariants());
}

#[test]
fn test_error_interrupt_terminates_running_process() {
    let k = kernel();
    let (p, _) = k.create_process("doomed", 1, 16);
    k.schedule();
    let free_before = k.free_memory();

    k.interrupt_process(p.pid, InterruptType::Error).unwrap();
    let handled = k.dispatch_interrupts().unwrap();

    assert_eq!(handled.result, format!("process {} terminated", p.pid));
    assert_eq!(k.process(p.pid).unwrap().state, ProcessState::Terminated);
    assert_eq!(k.free_memory(), free_before + 16);
    assert!(k.current_process().is_none());
    assert!(k.check_invariants());
}

#[test]
fn test_error_interrupt_schedules_next_process() {
    let k = kernel();
    let (victim, _) = k.create_process("victim", 9, 8);
    let (next, _) = k.create_process("next", 1, 8);
    k.schedule();

    k.trigger_interrupt(
        victim.pid,
        InterruptType::Error,
        InterruptPayload::for_process(victim.pid).with_reason("illegal instruction"),
        "fault",
    );
    k.dispatch_interrupts();

    assert_eq!(k.current_process().unwrap().pid, next.pid);
    let last = k.transition_history(victim.pid).pop().unwrap();
    assert_eq!(last.to, ProcessState::Terminated);
    assert_eq!(last.reason, "illegal instruction");
}

#[test]
fn test_page_replacement_on_full_memory() {
    let mut config = KernelConfig::for_testing();
    config.memory = MemoryConfig {
        total_memory: 16,
        page_size: 4,
        page_table_capacity: 4,
    };
    let k = Kernel::with_config(config).unwrap();
    let memory = k.memory();

    memory.admit(101, 8).unwrap();
    memory.admit(102, 8).unwrap();
    memory.write(102, 0, 1).unwrap();
    memory.write(102, 4, 1).unwrap();
    assert_eq!(k.free_memory(), 0);

    assert_eq!(memory.admit(103, 4).unwrap(), 1);
    assert!(memory.is_page_swapped(101, 0));
    assert_eq!(
        memory.read(101, 0),
        Err(MemoryError::PageFault { pid: 101, vpn: 0 })
    );
    assert!(memory.read(101, 0).is_ok());
    assert_eq!(k.memory_stats().swapped_pages, 1);
    assert!(k.check_invariants());
}

#[test]
fn test_release_reassigns_to_waiter() {
    let k = kernel();
    let (p1, _) = k.create_process("holder", 1, 8);
    let (p2, _) = k.create_process("waiter", 1, 8);

    k.allocate_device(1, p1.pid, 5);
    assert_eq!(
        k.allocate_device(1, p2.pid, 5),
        AllocationOutcome::Queued { position: 0 }
    );
    k.block_process(p2.pid, "awaiting device");

    let device = k.release_device(1).unwrap();
    assert_eq!(device.status, DeviceStatus::Busy);
    assert_eq!(device.owner, Some(p2.pid));
    assert!(device.wait_queue.is_empty());
    // The grant wakes the waiter
    assert_ne!(k.process(p2.pid).unwrap().state, ProcessState::Waiting);
    assert!(k.check_invariants());
}

#[test]
fn test_preempting_arrival_raises_process_interrupt() {
    let k = kernel();
    let (low, _) = k.create_process("low", 1, 8);
    k.schedule();
    k.create_process("peer", 1, 8);
    assert!(k.pending_interrupts().is_empty());

    let (high, _) = k.create_process("high", 9, 8);

    let pending = k.pending_interrupts();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, InterruptType::Process);
    assert_eq!(pending[0].process_id(), Some(high.pid));
    assert_eq!(
        pending[0].message,
        format!("Process {} preempted process {}", high.pid, low.pid)
    );

    k.dispatch_interrupts().unwrap();
    assert_eq!(k.current_process().unwrap().pid, high.pid);
    assert!(k.check_invariants());
}

#[test]
fn test_io_interrupt_blocks_and_switches() {
    let k = kernel();
    let (reader, _) = k.create_process("reader", 5, 8);
    let (other, _) = k.create_process("other", 1, 8);
    k.schedule();

    k.interrupt_process(reader.pid, InterruptType::Io).unwrap();
    k.dispatch_interrupts().unwrap();

    let reader = k.process(reader.pid).unwrap();
    assert_eq!(reader.state, ProcessState::Waiting);
    assert_eq!(
        reader.waiting_reason.as_deref(),
        Some("awaiting I/O completion")
    );
    assert_eq!(k.current_process().unwrap().pid, other.pid);
    assert!(k.interrupt_process(reader.pid, InterruptType::Io).is_none());
}

#[test]
fn test_device_interrupt_queues_process_on_busy_class() {
    let k = kernel();
    let (a, _) = k.create_process("a", 1, 8);
    let (b, _) = k.create_process("b", 1, 8);
    k.allocate_device(7, a.pid, 5);
    k.update_process_state(b.pid, ProcessState::Running);

    k.trigger_interrupt(
        7,
        InterruptType::Device,
        InterruptPayload::for_process(b.pid).with_device_type(myos_kernel::DeviceType::Usb),
        "usb request",
    );
    k.dispatch_interrupts().unwrap();

    assert_eq!(k.process(b.pid).unwrap().state, ProcessState::Waiting);
    assert_eq!(k.device(7).unwrap().wait_queue.front(), Some(&b.pid));
    // The CPU went to the other ready process
    assert_eq!(k.current_process().unwrap().pid, a.pid);

    k.release_device(7);
    assert_eq!(k.device(7).unwrap().owner, Some(b.pid));
    assert_eq!(k.process(b.pid).unwrap().state, ProcessState::Ready);
    assert!(k.check_invariants());
}

#[test]
fn test_io_completion_readies_owner() {
    let k = kernel();
    let (p, _) = k.create_process("disk-user", 1, 8);
    k.allocate_device(3, p.pid, 5);
    k.block_process(p.pid, "awaiting I/O completion");

    assert!(k.signal_device_completion(3));
    let handled = k.dispatch_interrupts().unwrap();
    assert_eq!(
        handled.result,
        format!("process {} ready on device 3", p.pid)
    );
    assert_eq!(k.current_process().unwrap().pid, p.pid);
}

#[test]
fn test_terminate_reclaims_devices() {
    let k = kernel();
    let (p1, _) = k.create_process("p1", 1, 8);
    let (p2, _) = k.create_process("p2", 1, 8);
    k.allocate_device(3, p1.pid, 5);
    k.allocate_device(3, p2.pid, 5);

    assert!(k.terminate_process(p1.pid, "exit"));
    assert_eq!(k.device(3).unwrap().owner, Some(p2.pid));
    assert!(!k.terminate_process(p1.pid, "exit"));
}

#[test]
fn test_disabled_interrupts_are_dropped() {
    let k = kernel();
    let (p, _) = k.create_process("p", 1, 8);
    k.schedule();
    k.set_interrupts_enabled(false);

    assert!(k.interrupt_process(p.pid, InterruptType::Error).is_none());
    assert!(k.dispatch_interrupts().is_none());
    assert_eq!(k.process(p.pid).unwrap().state, ProcessState::Running);
    assert_eq!(k.interrupt_stats().dropped, 1);
}

#[test]
fn test_interrupt_logs_through_facade() {
    let k = kernel();
    let (p, _) = k.create_process("p", 1, 8);
    k.trigger_interrupt(p.pid, InterruptType::Other, InterruptPayload::for_process(p.pid), "a");
    k.trigger_interrupt(p.pid, InterruptType::Io, InterruptPayload::for_process(p.pid), "b");

    let logs = k.interrupt_logs(1, None);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].message, "b");
    assert_eq!(k.interrupt_logs(10, Some(InterruptType::Other))[0].message, "a");
}

#[test]
fn test_swap_through_facade() {
    let k = kernel();
    let (p, _) = k.create_process("p", 1, 32);
    let free = k.free_memory();

    assert!(k.swap_out(p.pid));
    assert_eq!(k.swapped_processes(), vec![p.pid]);
    assert_eq!(k.free_memory(), free + 32);
    assert!(k.swap_in(p.pid));
    assert!(k.swapped_processes().is_empty());
    assert_eq!(k.free_memory(), free);
}

#[test]
fn test_policy_switch_through_facade() {
    let k = kernel();
    let (a, _) = k.create_process("a", 1, 8);
    k.create_process("b", 9, 8);
    k.set_scheduling_policy(myos_kernel::SchedulingPolicy::Fcfs);

    assert_eq!(k.queue_status().ready[0], a.pid);
    assert_eq!(k.schedule().unwrap().pid, a.pid);
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = KernelConfig::for_testing();
    config.memory.total_memory = 10;
    assert!(matches!(
        Kernel::with_config(config),
        Err(KernelError::Config(_))
    ));
}

#[test]
fn test_clock_interrupt_every_interval() {
    let k = kernel();
    let interval = k.config().timer.clock_interrupt_interval;
    let reports: Vec<bool> = (0..interval)
        .map(|_| k.tick().unwrap().clock_interrupt)
        .collect();

    assert!(reports[..reports.len() - 1].iter().all(|raised| !raised));
    assert!(reports[reports.len() - 1]);
    assert_eq!(k.pending_interrupts()[0].kind, InterruptType::Clock);
}

#[test]
fn test_clock_survives_restart() {
    let k = kernel();
    let interval = k.config().timer.clock_interrupt_interval;
    for _ in 0..interval - 1 {
        k.tick().unwrap();
    }

    k.timer().stop();
    assert!(k.tick().is_none());
    k.timer().start();

    let report = k.tick().unwrap();
    assert_eq!(report.tick, interval);
    assert!(report.clock_interrupt);
    assert_eq!(k.timer().current_time(), interval);
}
