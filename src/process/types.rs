/*!
 * Process Types
 * Process descriptor, lifecycle states, transitions and scheduling policy
 */

use crate::core::serde::{optional_pathbuf_string, system_time_micros};
use crate::core::types::{Pid, Priority, Size};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::SystemTime;

/// Process lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Created, admission not yet decided
    New,
    /// Admitted and waiting for the CPU
    Ready,
    /// Holds the single CPU slot
    Running,
    /// Blocked on memory, I/O or a device
    Waiting,
    /// Finished; absorbing
    Terminated,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessState::New => "NEW",
            ProcessState::Ready => "READY",
            ProcessState::Running => "RUNNING",
            ProcessState::Waiting => "WAITING",
            ProcessState::Terminated => "TERMINATED",
        };
        f.write_str(name)
    }
}

impl FromStr for ProcessState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "new" => Ok(ProcessState::New),
            "ready" => Ok(ProcessState::Ready),
            "running" => Ok(ProcessState::Running),
            "waiting" => Ok(ProcessState::Waiting),
            "terminated" => Ok(ProcessState::Terminated),
            other => Err(format!("unknown process state: {}", other)),
        }
    }
}

/// Ready-queue ordering policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingPolicy {
    /// Higher numeric priority first, ties by arrival order
    #[default]
    Priority,
    /// Earliest creation time first
    Fcfs,
}

impl FromStr for SchedulingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "priority" => Ok(SchedulingPolicy::Priority),
            "fcfs" | "fifo" => Ok(SchedulingPolicy::Fcfs),
            other => Err(format!("unknown scheduling policy: {}", other)),
        }
    }
}

/// Process descriptor
///
/// Owned by the scheduler while live. Other subsystems refer to it by PID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub pid: Pid,
    pub name: String,
    pub priority: Priority,
    /// Requested memory, in units
    pub memory_size: Size,
    pub state: ProcessState,
    pub in_memory: bool,
    /// Backing-store location while whole-process swapped
    #[serde(with = "optional_pathbuf_string", default)]
    pub swap_file_path: Option<PathBuf>,
    pub waiting_reason: Option<String>,
    #[serde(with = "system_time_micros")]
    pub created_at: SystemTime,
    #[serde(with = "system_time_micros")]
    pub updated_at: SystemTime,
}

impl Process {
    pub fn new(pid: Pid, name: impl Into<String>, priority: Priority, memory_size: Size) -> Self {
        let now = SystemTime::now();
        Self {
            pid,
            name: name.into(),
            priority,
            memory_size,
            state: ProcessState::New,
            in_memory: false,
            swap_file_path: None,
            waiting_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_resident(&self) -> bool {
        self.in_memory
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = SystemTime::now();
    }
}

/// Immutable audit fact for a state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessTransition {
    pub id: u64,
    pub pid: Pid,
    pub from: ProcessState,
    pub to: ProcessState,
    pub reason: String,
    #[serde(with = "system_time_micros")]
    pub timestamp: SystemTime,
}

/// Outcome of admitting a new process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum AdmissionResult {
    Ready,
    Waiting(String),
}

impl AdmissionResult {
    pub fn is_ready(&self) -> bool {
        matches!(self, AdmissionResult::Ready)
    }
}

/// Point-in-time view of the scheduler queues
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub policy: SchedulingPolicy,
    #[serde(skip_serializing_if = "crate::core::serde::is_none")]
    pub current: Option<Pid>,
    /// Ready PIDs in dispatch order
    pub ready: Vec<Pid>,
    pub waiting: Vec<Pid>,
    pub terminated: Vec<Pid>,
}

/// Scheduler counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub admitted: u64,
    pub admission_waits: u64,
    pub context_switches: u64,
    pub preemptions: u64,
    pub swap_ins: u64,
    pub swap_outs: u64,
    pub terminated: u64,
}
