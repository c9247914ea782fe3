/*!
 * Core Types
 * Common types used across the kernel
 */

/// Process ID type (0 is reserved for "no owner")
pub type Pid = u32;

/// Device ID type
pub type DeviceId = u32;

/// Interrupt ID type
pub type InterruptId = u64;

/// Interrupt vector tag
pub type Vector = u32;

/// Address type for memory operations
pub type Address = usize;

/// Size type for memory operations
pub type Size = usize;

/// Logical timestamp (visit clock, tick counter)
pub type Timestamp = u64;

/// Priority level (higher is more important)
pub type Priority = i32;

/// Countdown measured in timer ticks
pub type Ticks = u32;

/// Common result type for kernel operations
pub type KernelResult<T> = Result<T, super::errors::KernelError>;
