/*!
 * Process Swapper
 *
 * Whole-process eviction to a backing store. Used by the scheduler when
 * admission or swap-in finds free memory short; page-level eviction stays
 * inside the memory manager.
 */

use super::types::{Process, ProcessState};
use crate::core::types::{Pid, Size};
use crate::memory::{MemoryError, ProcessMemory};
use ahash::RandomState;
use dashmap::DashMap;
use log::{info, warn};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub type SwapResult<T> = Result<T, SwapError>;

#[derive(Error, Debug)]
pub enum SwapError {
    #[error("Process {0} is not resident")]
    NotResident(Pid),

    #[error("Insufficient memory to swap in process {pid}: need {required}, {available} free")]
    InsufficientMemory {
        pid: Pid,
        required: Size,
        available: Size,
    },

    #[error("No backing-store copy for process {0}")]
    NotSwapped(Pid),

    #[error("Backing store descriptor mismatch: expected process {expected}, found {found}")]
    DescriptorMismatch { expected: Pid, found: Pid },

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Backing store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Descriptor encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

/// Destination for swapped process descriptors
pub trait BackingStore: Send + Sync {
    /// Persist a descriptor, returning its location
    fn write(&self, process: &Process) -> SwapResult<PathBuf>;

    fn read(&self, pid: Pid) -> SwapResult<Process>;

    fn remove(&self, pid: Pid);
}

/// Backing store kept in memory as bincode blobs
#[derive(Default)]
pub struct InMemoryBackingStore {
    blobs: DashMap<Pid, Vec<u8>, RandomState>,
}

impl InMemoryBackingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BackingStore for InMemoryBackingStore {
    fn write(&self, process: &Process) -> SwapResult<PathBuf> {
        let bytes = bincode::serialize(process)?;
        self.blobs.insert(process.pid, bytes);
        Ok(PathBuf::from(format!("mem://swap/process_{}.swap", process.pid)))
    }

    fn read(&self, pid: Pid) -> SwapResult<Process> {
        let blob = self.blobs.get(&pid).ok_or(SwapError::NotSwapped(pid))?;
        Ok(bincode::deserialize(blob.value())?)
    }

    fn remove(&self, pid: Pid) {
        self.blobs.remove(&pid);
    }
}

/// Backing store writing one descriptor file per process
pub struct FileBackingStore {
    dir: PathBuf,
}

impl FileBackingStore {
    /// Use `dir` for swap files, creating it if needed
    pub fn new(dir: impl AsRef<Path>) -> SwapResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        info!("File backing store at {}", dir.display());
        Ok(Self { dir })
    }

    fn path_for(&self, pid: Pid) -> PathBuf {
        self.dir.join(format!("process_{}.swap", pid))
    }
}

impl BackingStore for FileBackingStore {
    fn write(&self, process: &Process) -> SwapResult<PathBuf> {
        let path = self.path_for(process.pid);
        std::fs::write(&path, bincode::serialize(process)?)?;
        Ok(path)
    }

    fn read(&self, pid: Pid) -> SwapResult<Process> {
        let path = self.path_for(pid);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SwapError::NotSwapped(pid))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(bincode::deserialize(&bytes)?)
    }

    fn remove(&self, pid: Pid) {
        if let Err(e) = std::fs::remove_file(self.path_for(pid)) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove swap file for PID {}: {}", pid, e);
            }
        }
    }
}

/// Whole-process swapper
pub struct ProcessSwapper {
    memory: Arc<dyn ProcessMemory>,
    store: Arc<dyn BackingStore>,
    swapped: Mutex<BTreeSet<Pid>>,
}

impl ProcessSwapper {
    pub fn new(memory: Arc<dyn ProcessMemory>, store: Arc<dyn BackingStore>) -> Self {
        Self {
            memory,
            store,
            swapped: Mutex::new(BTreeSet::new()),
        }
    }

    /// Write the descriptor out, free its memory and mark it non-resident.
    /// Returns the amount of memory freed.
    pub fn swap_out(&self, process: &mut Process) -> SwapResult<Size> {
        if !process.in_memory {
            return Err(SwapError::NotResident(process.pid));
        }

        let path = self.store.write(process)?;
        let freed = self.memory.release(process.pid);

        process.in_memory = false;
        process.swap_file_path = Some(path);
        process.touch();
        self.swapped.lock().insert(process.pid);

        info!(
            "Swapped out PID {} ({}), freed {} units",
            process.pid, process.name, freed
        );
        Ok(freed)
    }

    /// Bring a process back into memory. Requires free memory for its full
    /// request; the caller makes room first.
    pub fn swap_in(&self, process: &mut Process) -> SwapResult<()> {
        if process.in_memory {
            return Ok(());
        }

        let available = self.memory.free_memory();
        if available < process.memory_size {
            return Err(SwapError::InsufficientMemory {
                pid: process.pid,
                required: process.memory_size,
                available,
            });
        }

        let was_swapped = self.swapped.lock().contains(&process.pid);
        if was_swapped {
            let descriptor = self.store.read(process.pid)?;
            if descriptor.pid != process.pid {
                return Err(SwapError::DescriptorMismatch {
                    expected: process.pid,
                    found: descriptor.pid,
                });
            }
        }

        self.memory.admit(process.pid, process.memory_size)?;

        if was_swapped {
            self.store.remove(process.pid);
            self.swapped.lock().remove(&process.pid);
        }
        process.in_memory = true;
        process.swap_file_path = None;
        process.touch();

        info!("Swapped in PID {} ({})", process.pid, process.name);
        Ok(())
    }

    /// Evict resident, non-running processes in ascending priority order
    /// until `required` units are freed or candidates run out.
    /// Returns the amount actually freed.
    pub fn auto_swap_out<'a, I>(&self, required: Size, resident: I) -> Size
    where
        I: IntoIterator<Item = &'a mut Process>,
    {
        let mut candidates: Vec<&mut Process> = resident
            .into_iter()
            .filter(|p| p.in_memory && p.state != ProcessState::Running)
            .collect();
        candidates.sort_by_key(|p| (p.priority, p.pid));

        let mut freed = 0;
        for process in candidates {
            if freed >= required {
                break;
            }
            match self.swap_out(process) {
                Ok(size) => freed += size,
                Err(e) => warn!("Auto swap-out of PID {} failed: {}", process.pid, e),
            }
        }

        info!("Auto swap-out freed {} of {} requested units", freed, required);
        freed
    }

    /// Drop the backing copy of a process that will never be swapped in
    pub fn discard(&self, pid: Pid) {
        if self.swapped.lock().remove(&pid) {
            self.store.remove(pid);
        }
    }

    pub fn is_swapped(&self, pid: Pid) -> bool {
        self.swapped.lock().contains(&pid)
    }

    /// Swapped-out PIDs in ascending order
    pub fn swapped(&self) -> Vec<Pid> {
        self.swapped.lock().iter().copied().collect()
    }
}
