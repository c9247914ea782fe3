/*!
 * Device Module
 * Fixed device catalog with per-device wait queues and timeout reclamation
 */

pub mod manager;
pub mod types;

pub use manager::DeviceManager;
pub use types::{AllocationOutcome, Device, DeviceSpec, DeviceStatus, DeviceType, TimeoutReclaim};
