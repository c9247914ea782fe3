/*!
 * Device Types
 * Catalog entries, status and allocation outcomes
 */

use crate::core::serde::{is_none, system_time_micros};
use crate::core::types::{DeviceId, Pid, Ticks};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceType {
    Printer,
    Disk,
    Keyboard,
    Mouse,
    Usb,
    Other,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceType::Printer => "PRINTER",
            DeviceType::Disk => "DISK",
            DeviceType::Keyboard => "KEYBOARD",
            DeviceType::Mouse => "MOUSE",
            DeviceType::Usb => "USB",
            DeviceType::Other => "OTHER",
        };
        f.write_str(name)
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PRINTER" => Ok(DeviceType::Printer),
            "DISK" => Ok(DeviceType::Disk),
            "KEYBOARD" => Ok(DeviceType::Keyboard),
            "MOUSE" => Ok(DeviceType::Mouse),
            "USB" => Ok(DeviceType::Usb),
            "OTHER" => Ok(DeviceType::Other),
            other => Err(format!("unknown device type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    Idle,
    Busy,
    /// Reclaimed after its granted time ran out; allocatable like `Idle`
    Error,
}

impl DeviceStatus {
    #[inline]
    pub fn is_allocatable(self) -> bool {
        !matches!(self, DeviceStatus::Busy)
    }
}

/// Catalog entry used to provision a device at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSpec {
    pub id: DeviceId,
    pub name: String,
    pub kind: DeviceType,
}

impl DeviceSpec {
    pub fn new(id: DeviceId, name: impl Into<String>, kind: DeviceType) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
        }
    }

    pub fn default_catalog() -> Vec<DeviceSpec> {
        vec![
            DeviceSpec::new(1, "printer1", DeviceType::Printer),
            DeviceSpec::new(2, "printer2", DeviceType::Printer),
            DeviceSpec::new(3, "disk1", DeviceType::Disk),
            DeviceSpec::new(4, "disk2", DeviceType::Disk),
            DeviceSpec::new(5, "keyboard", DeviceType::Keyboard),
            DeviceSpec::new(6, "mouse", DeviceType::Mouse),
            DeviceSpec::new(7, "usb", DeviceType::Usb),
        ]
    }
}

/// A pre-provisioned device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub kind: DeviceType,
    pub status: DeviceStatus,
    #[serde(skip_serializing_if = "is_none")]
    pub owner: Option<Pid>,
    pub remaining: Ticks,
    pub wait_queue: VecDeque<Pid>,
    /// Bumped on every mutation
    pub version: u64,
    #[serde(with = "system_time_micros")]
    pub updated_at: SystemTime,
}

impl Device {
    pub fn from_spec(spec: &DeviceSpec) -> Self {
        Self {
            id: spec.id,
            name: spec.name.clone(),
            kind: spec.kind,
            status: DeviceStatus::Idle,
            owner: None,
            remaining: 0,
            wait_queue: VecDeque::new(),
            version: 0,
            updated_at: SystemTime::now(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.status.is_allocatable()
    }

    /// BUSY iff owned with time left
    pub fn is_consistent(&self) -> bool {
        let busy = self.status == DeviceStatus::Busy;
        busy == (self.owner.is_some() && self.remaining > 0)
    }

    pub(super) fn bump(&mut self) {
        self.version += 1;
        self.updated_at = SystemTime::now();
    }
}

/// Result of an allocation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationOutcome {
    Granted,
    /// Device busy; the requester sits in its wait queue
    Queued { position: usize },
    NotFound,
}

impl AllocationOutcome {
    #[inline]
    pub fn is_granted(&self) -> bool {
        matches!(self, AllocationOutcome::Granted)
    }
}

/// What a timeout sweep reclaimed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutReclaim {
    pub device_id: DeviceId,
    pub device_type: DeviceType,
    pub previous_owner: Option<Pid>,
    pub promoted: Option<Pid>,
}
