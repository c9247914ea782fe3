/*!
 * Interrupt Types
 */

use crate::core::serde::{is_none, system_time_micros};
use crate::core::types::{DeviceId, InterruptId, Pid, Vector};
use crate::device::DeviceType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant, SystemTime};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterruptError {
    #[error("Unknown interrupt type: {0}")]
    UnknownType(String),
}

pub type InterruptResult<T> = Result<T, InterruptError>;

/// Interrupt class; declaration order is severity order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterruptType {
    Error,
    Device,
    Io,
    Process,
    Clock,
    Other,
}

impl InterruptType {
    pub const ALL: [InterruptType; 6] = [
        InterruptType::Error,
        InterruptType::Device,
        InterruptType::Io,
        InterruptType::Process,
        InterruptType::Clock,
        InterruptType::Other,
    ];

    /// 1 is the most severe
    #[inline]
    pub const fn priority(self) -> u8 {
        match self {
            InterruptType::Error => 1,
            InterruptType::Device => 2,
            InterruptType::Io => 3,
            InterruptType::Process => 4,
            InterruptType::Clock => 5,
            InterruptType::Other => 6,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            InterruptType::Error => "ERROR",
            InterruptType::Device => "DEVICE",
            InterruptType::Io => "IO",
            InterruptType::Process => "PROCESS",
            InterruptType::Clock => "CLOCK",
            InterruptType::Other => "OTHER",
        }
    }
}

impl fmt::Display for InterruptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterruptType {
    type Err = InterruptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        InterruptType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| InterruptError::UnknownType(s.to_string()))
    }
}

/// Associative data carried by an interrupt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterruptPayload {
    #[serde(skip_serializing_if = "is_none")]
    pub process_id: Option<Pid>,
    #[serde(skip_serializing_if = "is_none")]
    pub device_id: Option<DeviceId>,
    #[serde(skip_serializing_if = "is_none")]
    pub device_type: Option<DeviceType>,
    #[serde(skip_serializing_if = "is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl InterruptPayload {
    pub fn for_process(pid: Pid) -> Self {
        Self {
            process_id: Some(pid),
            ..Default::default()
        }
    }

    pub fn with_process(mut self, pid: Option<Pid>) -> Self {
        self.process_id = pid;
        self
    }

    pub fn with_device(mut self, id: DeviceId, kind: DeviceType) -> Self {
        self.device_id = Some(id);
        self.device_type = Some(kind);
        self
    }

    pub fn with_device_type(mut self, kind: DeviceType) -> Self {
        self.device_type = Some(kind);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.extra.insert(key.into(), value.to_string());
        self
    }
}

/// An interrupt occurrence; immutable once raised
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interrupt {
    pub id: InterruptId,
    pub vector: Vector,
    pub kind: InterruptType,
    #[serde(with = "system_time_micros")]
    pub timestamp: SystemTime,
    #[serde(skip, default = "Instant::now")]
    pub raised_at: Instant,
    pub payload: InterruptPayload,
    pub message: String,
}

impl Interrupt {
    pub fn new(
        id: InterruptId,
        vector: Vector,
        kind: InterruptType,
        payload: InterruptPayload,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id,
            vector,
            kind,
            timestamp: SystemTime::now(),
            raised_at: Instant::now(),
            payload,
            message: message.into(),
        }
    }

    /// Time spent in the queue so far
    #[inline]
    pub fn age(&self) -> Duration {
        self.raised_at.elapsed()
    }

    #[inline]
    pub fn process_id(&self) -> Option<Pid> {
        self.payload.process_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptStatus {
    Queued,
    Dispatched,
    Resolved,
}

/// Record kept in the bounded interrupt log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptLog {
    pub id: u64,
    pub interrupt_id: InterruptId,
    #[serde(rename = "type")]
    pub kind: InterruptType,
    #[serde(with = "system_time_micros")]
    pub timestamp: SystemTime,
    pub message: String,
    #[serde(skip_serializing_if = "is_none")]
    pub result: Option<String>,
    pub status: InterruptStatus,
}

/// Outcome of one dispatch
#[derive(Debug, Clone)]
pub struct HandledInterrupt {
    pub interrupt: Interrupt,
    pub result: String,
    pub processing_time: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptStats {
    pub triggered: u64,
    pub dispatched: u64,
    pub dropped: u64,
    pub pending: usize,
}
