/*!
 * MyOS Kernel Library
 * Simulated kernel control plane: scheduling, interrupts, paging, devices
 */

pub mod config;
pub mod core;
pub mod device;
pub mod events;
pub mod interrupt;
pub mod kernel;
pub mod memory;
pub mod monitoring;
pub mod process;
pub mod timer;

// Re-exports
pub use config::KernelConfig;
pub use crate::core::errors::{ConfigError, KernelError};
pub use crate::core::types::*;
pub use device::{AllocationOutcome, Device, DeviceManager, DeviceStatus, DeviceType};
pub use events::{EventBus, KernelEvent};
pub use interrupt::{Interrupt, InterruptManager, InterruptPayload, InterruptType};
pub use kernel::{Kernel, KernelBuilder};
pub use memory::{MemoryManager, MemoryStats};
pub use monitoring::init_tracing;
pub use process::{AdmissionResult, Process, ProcessState, Scheduler, SchedulingPolicy};
pub use timer::{Timer, TimerTask};
