/*!
 * Memory Views
 * Free-block, usage and page-status views derived from the ownership bitmap
 */

use super::MemoryManager;
use crate::core::limits::FREE_PAGE;
use crate::core::types::{Pid, Size};
use crate::memory::traits::MemoryInfo;
use crate::memory::types::{MemoryBlock, MemoryStats, PageEntry};

impl MemoryManager {
    pub fn free_pages(&self) -> usize {
        self.state.lock().free_page_count()
    }

    /// Free physical memory in units
    pub fn free_memory(&self) -> Size {
        self.free_pages() * self.page_size
    }

    pub fn used_memory(&self) -> Size {
        self.total_memory() - self.free_memory()
    }

    /// Fraction of physical memory in use (0.0 - 1.0)
    pub fn usage(&self) -> f64 {
        if self.total_pages == 0 {
            return 0.0;
        }
        (self.total_pages - self.free_pages()) as f64 / self.total_pages as f64
    }

    /// Per-page owner array (0 = free)
    pub fn page_status(&self) -> Vec<Pid> {
        self.state.lock().bitmap.clone()
    }

    /// Maximal runs of free pages
    pub fn free_blocks(&self) -> Vec<MemoryBlock> {
        self.runs()
            .into_iter()
            .filter(|block| !block.is_allocated())
            .collect()
    }

    /// Maximal runs of pages owned by the same process
    pub fn allocated_blocks(&self) -> Vec<MemoryBlock> {
        self.runs()
            .into_iter()
            .filter(MemoryBlock::is_allocated)
            .collect()
    }

    fn runs(&self) -> Vec<MemoryBlock> {
        let bitmap = self.page_status();
        let mut blocks = Vec::new();
        let mut start = 0;

        while start < bitmap.len() {
            let owner = bitmap[start];
            let len = bitmap[start..]
                .iter()
                .take_while(|&&page| page == owner)
                .count();
            let address = start * self.page_size;
            let size = len * self.page_size;
            blocks.push(if owner == FREE_PAGE {
                MemoryBlock::free(address, size)
            } else {
                MemoryBlock::owned(address, size, owner)
            });
            start += len;
        }
        blocks
    }

    /// Snapshot of a process page table
    pub fn page_table(&self, pid: Pid) -> Option<Vec<PageEntry>> {
        self.state.lock().page_tables.get(&pid).cloned()
    }

    /// Number of pages currently held in the page-level swap list
    pub fn swapped_page_count(&self) -> usize {
        self.state.lock().swap_list.len()
    }

    /// Whether a given virtual page of a process sits in the swap list
    pub fn is_page_swapped(&self, pid: Pid, vpn: usize) -> bool {
        self.state.lock().swap_list.contains_key(&(pid, vpn))
    }

    /// Check that free pages plus valid mappings account for every physical
    /// page, and that each owned page is mapped by exactly one valid entry
    pub fn check_invariant(&self) -> bool {
        let state = self.state.lock();
        let mut mapped = vec![0usize; self.total_pages];

        for (pid, table) in state.page_tables.iter() {
            for entry in table.iter().filter(|e| e.valid) {
                if state.bitmap.get(entry.ppn) != Some(pid) {
                    return false;
                }
                mapped[entry.ppn] += 1;
            }
        }

        let valid: usize = mapped.iter().sum();
        let owned_ok = state
            .bitmap
            .iter()
            .zip(mapped.iter())
            .all(|(&owner, &count)| (owner == FREE_PAGE && count == 0) || (owner != FREE_PAGE && count == 1));

        owned_ok && state.free_page_count() + valid == self.total_pages
    }
}

impl MemoryInfo for MemoryManager {
    fn stats(&self) -> MemoryStats {
        let state = self.state.lock();
        let free_pages = state.free_page_count();
        let resident_pages = self.total_pages - free_pages;
        let used = resident_pages * self.page_size;

        MemoryStats {
            total_memory: self.total_memory(),
            used_memory: used,
            available_memory: free_pages * self.page_size,
            usage_ratio: if self.total_pages == 0 {
                0.0
            } else {
                resident_pages as f64 / self.total_pages as f64
            },
            page_size: self.page_size,
            total_pages: self.total_pages,
            free_pages,
            resident_pages,
            swapped_pages: state.swap_list.len(),
            page_tables: state.page_tables.len(),
        }
    }

    fn info(&self) -> (Size, Size, Size) {
        let free = self.free_memory();
        (self.total_memory(), self.total_memory() - free, free)
    }

    fn process_memory(&self, pid: Pid) -> Size {
        self.state
            .lock()
            .page_tables
            .get(&pid)
            .map(|table| table.iter().filter(|e| e.valid).count() * self.page_size)
            .unwrap_or(0)
    }
}
