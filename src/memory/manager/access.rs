/*!
 * Memory Access
 * Virtual address translation with permission checks and fault reporting
 */

use super::{MemoryManager, PagingState};
use crate::core::types::{Address, Pid};
use crate::memory::types::{Access, MemoryError, MemoryResult};
use log::debug;

impl MemoryManager {
    /// Read one unit at a virtual address.
    ///
    /// An access to an unmapped page services the fault and returns
    /// `MemoryError::PageFault`; the caller retries once the fault is handled.
    pub fn read(&self, pid: Pid, address: Address) -> MemoryResult<u8> {
        let mut state = self.state.lock();
        let physical = self.translate(&mut state, pid, address, Access::Read)?;
        Ok(state.physical[physical])
    }

    /// Write one unit at a virtual address, marking the page dirty
    pub fn write(&self, pid: Pid, address: Address, value: u8) -> MemoryResult<()> {
        let mut state = self.state.lock();
        let physical = self.translate(&mut state, pid, address, Access::Write)?;
        state.physical[physical] = value;
        Ok(())
    }

    /// Change the permission bits of a mapped virtual page
    pub fn protect(&self, pid: Pid, vpn: usize, read: bool, write: bool) -> MemoryResult<()> {
        let mut state = self.state.lock();
        let entry = state
            .page_tables
            .get_mut(&pid)
            .ok_or(MemoryError::NoPageTable(pid))?
            .get_mut(vpn)
            .ok_or(MemoryError::InvalidAddress {
                pid,
                address: vpn * self.page_size,
            })?;
        entry.read = read;
        entry.write = write;
        Ok(())
    }

    /// Resolve a virtual address to a physical index, stamping the visit time
    fn translate(
        &self,
        state: &mut PagingState,
        pid: Pid,
        address: Address,
        access: Access,
    ) -> MemoryResult<usize> {
        let vpn = address / self.page_size;
        let offset = address % self.page_size;
        if vpn >= self.page_table_capacity {
            return Err(MemoryError::InvalidAddress { pid, address });
        }

        let entry = state
            .page_tables
            .get(&pid)
            .ok_or(MemoryError::NoPageTable(pid))?[vpn];

        if !entry.valid {
            debug!("Page fault: PID {} vpn {} ({} access)", pid, vpn, access);
            self.service_fault(state, pid, vpn)?;
            return Err(MemoryError::PageFault { pid, vpn });
        }

        if !entry.permits(access) {
            return Err(MemoryError::ProtectionViolation {
                pid,
                address,
                access,
            });
        }

        let now = state.tick();
        if let Some(entry) = state.page_tables.get_mut(&pid).map(|t| &mut t[vpn]) {
            entry.last_visit = now;
            if access == Access::Write {
                entry.dirty = true;
            }
        }

        Ok(entry.ppn * self.page_size + offset)
    }
}
