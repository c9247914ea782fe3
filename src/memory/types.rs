/*!
 * Memory Types
 * Common types for paged memory management
 */

use crate::core::limits::{MEMORY_PRESSURE_CRITICAL, MEMORY_PRESSURE_HIGH, MEMORY_PRESSURE_MEDIUM};
use crate::core::types::{Address, Pid, Size, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Memory operation result
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Memory errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Out of memory: requested {requested} pages, {available} pages available")]
    OutOfMemory { requested: usize, available: usize },

    #[error("Page table capacity exceeded: requested {requested} pages, capacity {capacity}")]
    PageTableCapacityExceeded { requested: usize, capacity: usize },

    #[error("Process {0} already has a page table")]
    AlreadyAdmitted(Pid),

    #[error("Process {0} has no page table")]
    NoPageTable(Pid),

    #[error("Invalid virtual address 0x{address:x} for process {pid}")]
    InvalidAddress { pid: Pid, address: Address },

    #[error("Page fault: process {pid}, virtual page {vpn} (serviced, retry the access)")]
    PageFault { pid: Pid, vpn: usize },

    #[error("Memory protection violation: {access} at 0x{address:x} by process {pid}")]
    ProtectionViolation {
        pid: Pid,
        address: Address,
        access: Access,
    },
}

/// Kind of memory access, checked against page permission bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Read,
    Write,
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Access::Read => write!(f, "read"),
            Access::Write => write!(f, "write"),
        }
    }
}

/// Page table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageEntry {
    /// Physical page number (meaningful only while valid)
    pub ppn: usize,
    pub read: bool,
    pub write: bool,
    pub valid: bool,
    pub dirty: bool,
    /// Logical visit time, drives LRU eviction
    pub last_visit: Timestamp,
}

impl PageEntry {
    /// Fresh mapping with full read/write permission
    pub fn mapped(ppn: usize, now: Timestamp) -> Self {
        Self {
            ppn,
            read: true,
            write: true,
            valid: true,
            dirty: false,
            last_visit: now,
        }
    }

    pub fn permits(&self, access: Access) -> bool {
        match access {
            Access::Read => self.read,
            Access::Write => self.write,
        }
    }
}

/// Contiguous span of the flat physical address space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBlock {
    pub address: Address,
    pub size: Size,
    #[serde(skip_serializing_if = "crate::core::serde::is_none", default)]
    pub owner_pid: Option<Pid>,
}

impl MemoryBlock {
    pub fn free(address: Address, size: Size) -> Self {
        Self {
            address,
            size,
            owner_pid: None,
        }
    }

    pub fn owned(address: Address, size: Size, pid: Pid) -> Self {
        Self {
            address,
            size,
            owner_pid: Some(pid),
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.owner_pid.is_some()
    }
}

/// Memory statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_memory: Size,
    pub used_memory: Size,
    pub available_memory: Size,
    pub usage_ratio: f64,
    pub page_size: Size,
    pub total_pages: usize,
    pub free_pages: usize,
    pub resident_pages: usize,
    pub swapped_pages: usize,
    pub page_tables: usize,
}

impl MemoryStats {
    pub fn memory_pressure(&self) -> MemoryPressure {
        if self.usage_ratio >= MEMORY_PRESSURE_CRITICAL {
            MemoryPressure::Critical
        } else if self.usage_ratio >= MEMORY_PRESSURE_HIGH {
            MemoryPressure::High
        } else if self.usage_ratio >= MEMORY_PRESSURE_MEDIUM {
            MemoryPressure::Medium
        } else {
            MemoryPressure::Low
        }
    }
}

/// Memory pressure levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryPressure {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for MemoryPressure {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            MemoryPressure::Low => write!(f, "LOW"),
            MemoryPressure::Medium => write!(f, "MEDIUM"),
            MemoryPressure::High => write!(f, "HIGH"),
            MemoryPressure::Critical => write!(f, "CRITICAL"),
        }
    }
}
