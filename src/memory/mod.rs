/*!
 * Memory Module
 * Paged physical memory, per-process page tables and LRU page swapping
 */

pub mod manager;
pub mod traits;
pub mod types;

pub use manager::MemoryManager;
pub use traits::{MemoryInfo, ProcessMemory};
pub use types::{
    Access, MemoryBlock, MemoryError, MemoryPressure, MemoryResult, MemoryStats, PageEntry,
};
