/*!
 * Memory Traits
 * Memory management abstractions
 */

use super::types::*;
use crate::core::types::{Pid, Size};

/// Memory statistics provider
pub trait MemoryInfo: Send + Sync {
    /// Get overall memory statistics
    fn stats(&self) -> MemoryStats;

    /// Get memory info as (total, used, available)
    fn info(&self) -> (Size, Size, Size);

    /// Get resident memory for a specific process
    fn process_memory(&self, pid: Pid) -> Size;

    /// Get memory pressure level
    fn pressure(&self) -> MemoryPressure {
        self.stats().memory_pressure()
    }
}

/// Whole-process admission and release, the seam used by the scheduler and swapper
pub trait ProcessMemory: Send + Sync {
    /// Map `size` units for a process; all-or-nothing
    fn admit(&self, pid: Pid, size: Size) -> MemoryResult<usize>;

    /// Drop every mapping for a process, returning the freed size
    fn release(&self, pid: Pid) -> Size;

    /// Free physical memory
    fn free_memory(&self) -> Size;

    /// Whether the process currently has a page table
    fn is_admitted(&self, pid: Pid) -> bool;

    /// Whether `size` is within the per-process and physical page bounds
    fn can_ever_fit(&self, size: Size) -> bool;
}
