/*!
 * Memory Management
 *
 * Paged physical memory with per-process page tables and LRU replacement.
 *
 * ## Layout
 *
 * - Physical memory is a flat array of `total_memory` units split into
 *   `page_size`-unit pages.
 * - An ownership bitmap maps every physical page to `0` (free) or the owning PID.
 * - Each admitted process gets a page table of `page_table_capacity` entries.
 *   Entries start invalid and become valid as pages are allocated.
 * - Pages evicted under pressure are copied into a swap list keyed by
 *   `(pid, vpn)` and restored by the page-fault path.
 *
 * Free blocks, usage and page status are derived from the bitmap on demand.
 *
 * ## Submodules
 *
 * - `process_ops`: admission with rollback, release
 * - `paging`: page allocation, LRU victim selection, fault servicing
 * - `access`: address translation, read/write, permission bits
 * - `views`: derived views and invariant checks
 */

mod access;
mod paging;
mod process_ops;
mod views;

use crate::config::MemoryConfig;
use crate::core::limits::FREE_PAGE;
use crate::core::types::{Pid, Size, Timestamp};
use crate::memory::types::PageEntry;
use ahash::RandomState;
use log::info;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Mutable paging state, guarded by a single lock so multi-page
/// admissions and evictions are atomic with respect to each other
pub(super) struct PagingState {
    /// Physical memory contents
    pub physical: Vec<u8>,
    /// Ownership bitmap: physical page -> owning PID (or FREE_PAGE)
    pub bitmap: Vec<Pid>,
    /// Reverse map: physical page -> virtual page number of its owner
    pub frame_vpn: Vec<usize>,
    pub page_tables: HashMap<Pid, Vec<PageEntry>, RandomState>,
    /// Page-level swap list, keyed by (owner, vpn)
    pub swap_list: HashMap<(Pid, usize), Vec<u8>, RandomState>,
    /// Logical visit clock
    pub clock: Timestamp,
}

impl PagingState {
    fn new(total_pages: usize, page_size: Size) -> Self {
        Self {
            physical: vec![0; total_pages * page_size],
            bitmap: vec![FREE_PAGE; total_pages],
            frame_vpn: vec![0; total_pages],
            page_tables: HashMap::with_hasher(RandomState::new()),
            swap_list: HashMap::with_hasher(RandomState::new()),
            clock: 0,
        }
    }

    /// Advance the visit clock and return the new time
    pub fn tick(&mut self) -> Timestamp {
        self.clock += 1;
        self.clock
    }

    pub fn free_page_count(&self) -> usize {
        self.bitmap.iter().filter(|&&owner| owner == FREE_PAGE).count()
    }
}

/// Paged memory manager
pub struct MemoryManager {
    pub(super) state: Arc<Mutex<PagingState>>,
    pub(super) page_size: Size,
    pub(super) total_pages: usize,
    pub(super) page_table_capacity: usize,
}

impl MemoryManager {
    /// Create a memory manager with the default geometry
    pub fn new() -> Self {
        Self::with_config(&MemoryConfig::default())
    }

    /// Create a memory manager from configuration
    pub fn with_config(config: &MemoryConfig) -> Self {
        let page_size = config.page_size.max(1);
        let total_pages = config.total_memory / page_size;

        info!(
            "Memory manager initialized: {} units, {} pages of {} units, {} pages per table",
            total_pages * page_size,
            total_pages,
            page_size,
            config.page_table_capacity
        );

        Self {
            state: Arc::new(Mutex::new(PagingState::new(total_pages, page_size))),
            page_size,
            total_pages,
            page_table_capacity: config.page_table_capacity,
        }
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn total_memory(&self) -> Size {
        self.total_pages * self.page_size
    }

    pub fn page_table_capacity(&self) -> usize {
        self.page_table_capacity
    }

    /// Pages needed to hold `size` units
    pub fn pages_for(&self, size: Size) -> usize {
        size.div_ceil(self.page_size)
    }

    /// Whether a request of `size` units could ever be admitted, however
    /// much memory is freed first
    pub fn can_ever_fit(&self, size: Size) -> bool {
        let pages = self.pages_for(size);
        pages <= self.page_table_capacity && pages <= self.total_pages
    }
}

impl Clone for MemoryManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            page_size: self.page_size,
            total_pages: self.total_pages,
            page_table_capacity: self.page_table_capacity,
        }
    }
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new()
    }
}
