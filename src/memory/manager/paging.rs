/*!
 * Paging
 * Physical page allocation, LRU replacement and page-fault servicing
 */

use super::{MemoryManager, PagingState};
use crate::core::limits::FREE_PAGE;
use crate::core::types::Pid;
use crate::memory::types::{MemoryError, MemoryResult, PageEntry};
use log::{debug, info};

impl MemoryManager {
    /// Map a virtual page for a process, evicting the least-recently-visited
    /// page when no physical page is free. Returns the physical page number.
    pub fn allocate_page(&self, pid: Pid, vpn: usize) -> MemoryResult<usize> {
        let mut state = self.state.lock();
        self.allocate_page_locked(&mut state, pid, vpn)
    }

    pub(super) fn allocate_page_locked(
        &self,
        state: &mut PagingState,
        pid: Pid,
        vpn: usize,
    ) -> MemoryResult<usize> {
        if vpn >= self.page_table_capacity {
            return Err(MemoryError::InvalidAddress {
                pid,
                address: vpn * self.page_size,
            });
        }

        let existing = state
            .page_tables
            .get(&pid)
            .ok_or(MemoryError::NoPageTable(pid))?[vpn];
        if existing.valid {
            return Ok(existing.ppn);
        }

        let ppn = match state.bitmap.iter().position(|&owner| owner == FREE_PAGE) {
            Some(ppn) => ppn,
            None => self.evict_lru(state, pid)?,
        };

        let start = ppn * self.page_size;
        state.physical[start..start + self.page_size].fill(0);
        state.bitmap[ppn] = pid;
        state.frame_vpn[ppn] = vpn;

        let now = state.tick();
        if let Some(table) = state.page_tables.get_mut(&pid) {
            table[vpn] = PageEntry::mapped(ppn, now);
        }

        debug!("PID {} vpn {} -> ppn {}", pid, vpn, ppn);
        Ok(ppn)
    }

    /// Pick the least-recently-visited occupied page, preferring pages owned
    /// by other processes, move its contents to the swap list and return the
    /// freed physical page number.
    fn evict_lru(&self, state: &mut PagingState, requester: Pid) -> MemoryResult<usize> {
        let victim = Self::lru_victim(state, |owner| owner != requester)
            .or_else(|| Self::lru_victim(state, |_| true))
            .ok_or(MemoryError::OutOfMemory {
                requested: 1,
                available: 0,
            })?;

        let owner = state.bitmap[victim];
        let victim_vpn = state.frame_vpn[victim];
        let start = victim * self.page_size;
        let content = state.physical[start..start + self.page_size].to_vec();

        state.swap_list.insert((owner, victim_vpn), content);
        if let Some(entry) = state
            .page_tables
            .get_mut(&owner)
            .and_then(|table| table.get_mut(victim_vpn))
        {
            entry.valid = false;
            entry.dirty = false;
        }
        state.bitmap[victim] = FREE_PAGE;

        info!(
            "Evicted PID {} vpn {} from ppn {} to swap list (LRU)",
            owner, victim_vpn, victim
        );
        Ok(victim)
    }

    fn lru_victim(state: &PagingState, eligible: impl Fn(Pid) -> bool) -> Option<usize> {
        state
            .bitmap
            .iter()
            .enumerate()
            .filter(|(_, owner)| **owner != FREE_PAGE && eligible(**owner))
            .filter_map(|(ppn, &owner)| {
                let vpn = state.frame_vpn[ppn];
                state
                    .page_tables
                    .get(&owner)
                    .map(|table| (ppn, table[vpn].last_visit))
            })
            .min_by_key(|&(_, last_visit)| last_visit)
            .map(|(ppn, _)| ppn)
    }

    /// Service a fault on an invalid entry: restore a swapped copy if one
    /// exists, otherwise map a fresh zeroed page.
    pub(super) fn service_fault(
        &self,
        state: &mut PagingState,
        pid: Pid,
        vpn: usize,
    ) -> MemoryResult<()> {
        let swapped = state.swap_list.remove(&(pid, vpn));
        let ppn = match self.allocate_page_locked(state, pid, vpn) {
            Ok(ppn) => ppn,
            Err(e) => {
                if let Some(content) = swapped {
                    state.swap_list.insert((pid, vpn), content);
                }
                return Err(e);
            }
        };

        if let Some(content) = swapped {
            let start = ppn * self.page_size;
            state.physical[start..start + self.page_size].copy_from_slice(&content);
            debug!("Restored PID {} vpn {} from swap list into ppn {}", pid, vpn, ppn);
        }
        Ok(())
    }
}
