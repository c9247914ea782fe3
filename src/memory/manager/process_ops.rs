/*!
 * Process Memory Operations
 * Whole-process admission (with rollback) and release
 */

use super::{MemoryManager, PagingState};
use crate::core::limits::FREE_PAGE;
use crate::core::types::{Pid, Size};
use crate::memory::traits::ProcessMemory;
use crate::memory::types::{MemoryError, MemoryResult, PageEntry};
use log::{debug, info, warn};

impl MemoryManager {
    /// Admit a process: build its page table and map ceil(size / page_size) pages.
    ///
    /// Either every page is mapped or none are; a failure part-way through
    /// rolls back the pages already granted and discards the page table.
    pub fn admit(&self, pid: Pid, size: Size) -> MemoryResult<usize> {
        let pages_needed = self.pages_for(size);

        if pages_needed > self.page_table_capacity {
            return Err(MemoryError::PageTableCapacityExceeded {
                requested: pages_needed,
                capacity: self.page_table_capacity,
            });
        }
        if pages_needed > self.total_pages {
            return Err(MemoryError::OutOfMemory {
                requested: pages_needed,
                available: self.total_pages,
            });
        }

        let mut state = self.state.lock();
        if state.page_tables.contains_key(&pid) {
            return Err(MemoryError::AlreadyAdmitted(pid));
        }
        state
            .page_tables
            .insert(pid, vec![PageEntry::default(); self.page_table_capacity]);

        for vpn in 0..pages_needed {
            if let Err(e) = self.allocate_page_locked(&mut state, pid, vpn) {
                warn!(
                    "Admission of PID {} failed at page {}/{}: {}; rolling back",
                    pid, vpn, pages_needed, e
                );
                self.release_locked(&mut state, pid);
                return Err(e);
            }
        }

        info!(
            "Admitted PID {}: {} units in {} pages ({} pages free)",
            pid,
            size,
            pages_needed,
            state.free_page_count()
        );
        Ok(pages_needed)
    }

    /// Release every page a process owns and discard its page table
    pub fn release(&self, pid: Pid) -> Size {
        let mut state = self.state.lock();
        let freed = self.release_locked(&mut state, pid);
        if freed > 0 {
            info!("Released {} units for PID {}", freed, pid);
        }
        freed
    }

    pub(super) fn release_locked(&self, state: &mut PagingState, pid: Pid) -> Size {
        let Some(table) = state.page_tables.remove(&pid) else {
            return 0;
        };

        let mut pages = 0;
        for entry in table.iter().filter(|e| e.valid) {
            let ppn = entry.ppn;
            if state.bitmap[ppn] == pid {
                state.bitmap[ppn] = FREE_PAGE;
                state.frame_vpn[ppn] = 0;
                let start = ppn * self.page_size;
                state.physical[start..start + self.page_size].fill(0);
                pages += 1;
            }
        }

        let before = state.swap_list.len();
        state.swap_list.retain(|(owner, _), _| *owner != pid);
        let dropped = before - state.swap_list.len();
        if dropped > 0 {
            debug!("Discarded {} swapped pages for PID {}", dropped, pid);
        }

        pages * self.page_size
    }

    pub fn is_admitted(&self, pid: Pid) -> bool {
        self.state.lock().page_tables.contains_key(&pid)
    }
}

impl ProcessMemory for MemoryManager {
    fn admit(&self, pid: Pid, size: Size) -> MemoryResult<usize> {
        MemoryManager::admit(self, pid, size)
    }

    fn release(&self, pid: Pid) -> Size {
        MemoryManager::release(self, pid)
    }

    fn free_memory(&self) -> Size {
        MemoryManager::free_memory(self)
    }

    fn is_admitted(&self, pid: Pid) -> bool {
        MemoryManager::is_admitted(self, pid)
    }

    fn can_ever_fit(&self, size: Size) -> bool {
        MemoryManager::can_ever_fit(self, size)
    }
}
