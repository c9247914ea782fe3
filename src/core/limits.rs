/*!
 * System Limits and Constants
 *
 * Centralized location for simulation-wide defaults and thresholds.
 * Every value here is a default only; `KernelConfig` can override it.
 */

use std::time::Duration;

// =============================================================================
// MEMORY
// =============================================================================

/// Total simulated physical memory (units)
pub const DEFAULT_TOTAL_MEMORY: usize = 1024;

/// Page size (units per page)
pub const DEFAULT_PAGE_SIZE: usize = 4;

/// Virtual pages per process page table
/// A single process can map at most 64 * 4 = 256 units
pub const DEFAULT_PAGE_TABLE_CAPACITY: usize = 64;

/// Bitmap marker for a free physical page
pub const FREE_PAGE: u32 = 0;

/// Usage ratio thresholds for pressure reporting
pub const MEMORY_PRESSURE_MEDIUM: f64 = 0.60;
pub const MEMORY_PRESSURE_HIGH: f64 = 0.80;
pub const MEMORY_PRESSURE_CRITICAL: f64 = 0.95;

// =============================================================================
// INTERRUPTS
// =============================================================================

/// Minimum queue residency before an interrupt may be dispatched
pub const DEFAULT_INTERRUPT_PROCESSING_DELAY: Duration = Duration::from_millis(50);

/// Simulated hardware service latency inside a dispatch
pub const DEFAULT_INTERRUPT_SERVICE_LATENCY: Duration = Duration::ZERO;

/// Bounded interrupt log ring (oldest entries dropped)
pub const DEFAULT_INTERRUPT_LOG_CAPACITY: usize = 1000;

/// Only every Nth CLOCK interrupt is written to the log
pub const CLOCK_LOG_INTERVAL: u64 = 10;

/// Payload reason marking a higher-priority arrival on a PROCESS interrupt
pub const PREEMPTION_REASON: &str = "higher_priority_arrival";

// =============================================================================
// DEVICES
// =============================================================================

/// Grant duration used when a waiter is promoted off a wait queue
pub const DEFAULT_DEVICE_DURATION: u32 = 5;

// =============================================================================
// TIMER
// =============================================================================

/// Device timeout sweep period (one tick)
pub const DEFAULT_DEVICE_SWEEP_PERIOD: Duration = Duration::from_secs(1);

/// Interrupt dispatch pass period
pub const DEFAULT_DISPATCH_PERIOD: Duration = Duration::from_millis(50);

/// Scheduling watchdog period
pub const DEFAULT_WATCHDOG_PERIOD: Duration = Duration::from_millis(50);

/// Queue status report period
pub const DEFAULT_STATUS_PERIOD: Duration = Duration::from_secs(5);

/// A CLOCK interrupt is raised every N ticks
pub const CLOCK_INTERRUPT_INTERVAL: u64 = 10;

// =============================================================================
// WAITING REASONS
// =============================================================================

pub const REASON_INSUFFICIENT_MEMORY: &str = "insufficient memory";
pub const REASON_ALLOCATION_FAILED: &str = "memory allocation failed";
pub const REASON_AWAITING_IO: &str = "awaiting I/O completion";
pub const REASON_AWAITING_DEVICE: &str = "awaiting device";
