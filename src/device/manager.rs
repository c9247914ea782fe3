/*!
 * Device Manager
 *
 * Arbitrates the fixed device catalog. Each device sits behind its own lock,
 * so independent devices never contend; allocate, release and the timeout
 * sweep on one device are serialized through that lock. Events are published
 * only after the device lock is dropped.
 */

use super::types::{AllocationOutcome, Device, DeviceSpec, DeviceStatus, DeviceType, TimeoutReclaim};
use crate::config::DeviceConfig;
use crate::core::types::{DeviceId, Pid, Ticks};
use crate::events::{EventBus, KernelEvent};
use ahash::RandomState;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub struct DeviceManager {
    devices: Arc<HashMap<DeviceId, Mutex<Device>, RandomState>>,
    catalog: Vec<DeviceSpec>,
    default_duration: Ticks,
    events: Arc<EventBus>,
}

impl DeviceManager {
    pub fn new(config: &DeviceConfig, events: Arc<EventBus>) -> Self {
        let mut catalog = config.catalog.clone();
        catalog.sort_by_key(|spec| spec.id);
        catalog.dedup_by_key(|spec| spec.id);

        let devices = catalog
            .iter()
            .map(|spec| (spec.id, Mutex::new(Device::from_spec(spec))))
            .collect::<HashMap<_, _, RandomState>>();

        info!(
            "Device manager initialized: {} devices, default duration {} ticks",
            devices.len(),
            config.default_duration
        );

        Self {
            devices: Arc::new(devices),
            catalog,
            default_duration: config.default_duration.max(1),
            events,
        }
    }

    /// Grant the device or queue the requester
    ///
    /// A zero duration is treated as one tick.
    pub fn allocate(&self, id: DeviceId, pid: Pid, duration: Ticks) -> AllocationOutcome {
        let Some(slot) = self.devices.get(&id) else {
            warn!("Allocation for unknown device {}", id);
            return AllocationOutcome::NotFound;
        };
        let mut device = slot.lock();
        Self::allocate_locked(&mut device, pid, duration)
    }

    fn allocate_locked(device: &mut Device, pid: Pid, duration: Ticks) -> AllocationOutcome {
        if device.owner == Some(pid) && device.status == DeviceStatus::Busy {
            debug!("PID {} already owns device {}", pid, device.id);
            return AllocationOutcome::Granted;
        }

        if device.is_available() {
            device.status = DeviceStatus::Busy;
            device.owner = Some(pid);
            device.remaining = duration.max(1);
            device.wait_queue.retain(|&w| w != pid);
            device.bump();
            info!(
                "Device {} ({}) allocated to PID {} for {} ticks",
                device.id, device.name, pid, device.remaining
            );
            return AllocationOutcome::Granted;
        }

        let position = match device.wait_queue.iter().position(|&w| w == pid) {
            Some(position) => position,
            None => {
                device.wait_queue.push_back(pid);
                info!("PID {} queued for device {}", pid, device.id);
                device.wait_queue.len() - 1
            }
        };
        AllocationOutcome::Queued { position }
    }

    /// Hand the device to the head of its wait queue, if any
    fn promote_locked(&self, device: &mut Device) -> Option<Pid> {
        let next = device.wait_queue.pop_front()?;
        info!("Promoting PID {} from wait queue of device {}", next, device.id);
        Self::allocate_locked(device, next, self.default_duration);
        Some(next)
    }

    /// Return a device to IDLE and promote its wait queue, under its lock
    fn release_locked(&self, device: &mut Device) -> Option<Pid> {
        debug!("Releasing device {} (status {:?})", device.id, device.status);
        device.status = DeviceStatus::Idle;
        device.owner = None;
        device.remaining = 0;
        device.bump();
        self.promote_locked(device)
    }

    fn publish_grant(&self, id: DeviceId, promoted: Option<Pid>) {
        if let Some(pid) = promoted {
            self.events
                .publish(KernelEvent::DeviceGranted { device_id: id, pid });
        }
    }

    /// Explicit release; the head of the wait queue is granted immediately
    pub fn release(&self, id: DeviceId) -> Option<Device> {
        let slot = self.devices.get(&id)?;
        let (snapshot, promoted) = {
            let mut device = slot.lock();
            let promoted = self.release_locked(&mut device);
            (device.clone(), promoted)
        };

        self.publish_grant(id, promoted);
        Some(snapshot)
    }

    /// Release only while `pid` still owns the device
    ///
    /// The ownership check and the release share one critical section, so a
    /// timeout that already handed the device on is never undone.
    pub fn release_if_owned(&self, id: DeviceId, pid: Pid) -> bool {
        let Some(slot) = self.devices.get(&id) else {
            return false;
        };
        let promoted = {
            let mut device = slot.lock();
            if device.owner != Some(pid) {
                return false;
            }
            self.release_locked(&mut device)
        };

        self.publish_grant(id, promoted);
        true
    }

    /// One tick of countdown for every busy device
    ///
    /// The tick that takes a countdown to zero reclaims the device into
    /// `Error`, promotes its wait queue and publishes `DeviceTimeout`.
    pub fn check_timeouts(&self) -> Vec<TimeoutReclaim> {
        let mut reclaimed = Vec::new();

        for spec in &self.catalog {
            let Some(slot) = self.devices.get(&spec.id) else {
                continue;
            };
            let reclaim = {
                let mut device = slot.lock();
                if device.status != DeviceStatus::Busy || device.remaining == 0 {
                    continue;
                }
                device.remaining -= 1;
                if device.remaining > 0 {
                    continue;
                }

                warn!("Device {} ({}) timed out", device.id, device.name);
                device.status = DeviceStatus::Error;
                let previous_owner = device.owner.take();
                device.bump();
                let promoted = self.promote_locked(&mut device);
                TimeoutReclaim {
                    device_id: device.id,
                    device_type: device.kind,
                    previous_owner,
                    promoted,
                }
            };
            reclaimed.push(reclaim);
        }

        for reclaim in &reclaimed {
            self.events.publish(KernelEvent::DeviceTimeout {
                device_id: reclaim.device_id,
                device_type: reclaim.device_type,
                previous_owner: reclaim.previous_owner,
                promoted: reclaim.promoted,
            });
            if let Some(pid) = reclaim.promoted {
                self.events.publish(KernelEvent::DeviceGranted {
                    device_id: reclaim.device_id,
                    pid,
                });
            }
        }
        reclaimed
    }

    /// Report that the owner's I/O on a device finished
    pub fn signal_completion(&self, id: DeviceId) -> bool {
        let Some(slot) = self.devices.get(&id) else {
            return false;
        };
        let completed = {
            let device = slot.lock();
            match (device.status, device.owner) {
                (DeviceStatus::Busy, Some(pid)) => Some((device.kind, pid)),
                _ => None,
            }
        };

        match completed {
            Some((device_type, pid)) => {
                info!("Device {} completed I/O for PID {}", id, pid);
                self.events.publish(KernelEvent::DeviceIoCompleted {
                    device_id: id,
                    device_type,
                    pid,
                });
                true
            }
            None => false,
        }
    }

    /// First allocatable device of a class, by id
    pub fn find_available(&self, kind: DeviceType) -> Option<DeviceId> {
        self.catalog
            .iter()
            .filter(|spec| spec.kind == kind)
            .find(|spec| {
                self.devices
                    .get(&spec.id)
                    .map(|slot| slot.lock().is_available())
                    .unwrap_or(false)
            })
            .map(|spec| spec.id)
    }

    /// Allocate any free device of a class, queueing on the first one when
    /// all are busy
    pub fn allocate_by_type(
        &self,
        kind: DeviceType,
        pid: Pid,
        duration: Ticks,
    ) -> (Option<DeviceId>, AllocationOutcome) {
        for spec in self.catalog.iter().filter(|spec| spec.kind == kind) {
            if let Some(slot) = self.devices.get(&spec.id) {
                let mut device = slot.lock();
                if device.is_available() {
                    return (
                        Some(spec.id),
                        Self::allocate_locked(&mut device, pid, duration),
                    );
                }
            }
        }

        match self.catalog.iter().find(|spec| spec.kind == kind) {
            Some(spec) => (Some(spec.id), self.allocate(spec.id, pid, duration)),
            None => (None, AllocationOutcome::NotFound),
        }
    }

    /// Device of the class currently owned by the process
    pub fn owned_by(&self, pid: Pid, kind: DeviceType) -> Option<DeviceId> {
        self.catalog
            .iter()
            .filter(|spec| spec.kind == kind)
            .find(|spec| {
                self.devices
                    .get(&spec.id)
                    .map(|slot| {
                        let device = slot.lock();
                        device.status == DeviceStatus::Busy && device.owner == Some(pid)
                    })
                    .unwrap_or(false)
            })
            .map(|spec| spec.id)
    }

    /// Release everything a departing process holds and drop it from every
    /// wait queue
    pub fn reclaim_process(&self, pid: Pid) -> usize {
        let mut released = 0;
        for spec in &self.catalog {
            let Some(slot) = self.devices.get(&spec.id) else {
                continue;
            };
            let promoted = {
                let mut device = slot.lock();
                let before = device.wait_queue.len();
                device.wait_queue.retain(|&w| w != pid);
                if device.wait_queue.len() != before {
                    device.bump();
                }
                if device.owner != Some(pid) {
                    continue;
                }
                released += 1;
                self.release_locked(&mut device)
            };
            self.publish_grant(spec.id, promoted);
        }
        if released > 0 {
            info!("Reclaimed {} devices from PID {}", released, pid);
        }
        released
    }

    pub fn device(&self, id: DeviceId) -> Option<Device> {
        self.devices.get(&id).map(|slot| slot.lock().clone())
    }

    pub fn devices(&self) -> Vec<Device> {
        self.catalog
            .iter()
            .filter_map(|spec| self.device(spec.id))
            .collect()
    }

    pub fn devices_by_type(&self, kind: DeviceType) -> Vec<Device> {
        self.devices()
            .into_iter()
            .filter(|device| device.kind == kind)
            .collect()
    }

    pub fn available_devices(&self) -> Vec<Device> {
        self.devices()
            .into_iter()
            .filter(Device::is_available)
            .collect()
    }

    pub fn default_duration(&self) -> Ticks {
        self.default_duration
    }

    /// Return every device to its catalog state
    pub fn reset(&self) {
        for spec in &self.catalog {
            if let Some(slot) = self.devices.get(&spec.id) {
                *slot.lock() = Device::from_spec(spec);
            }
        }
        info!("Device manager reset");
    }

    /// BUSY iff owned with time remaining, for every device
    pub fn check_invariants(&self) -> bool {
        self.devices().iter().all(|device| {
            let ok = device.is_consistent();
            if !ok {
                warn!(
                    "Device {} inconsistent: status={:?} owner={:?} remaining={}",
                    device.id, device.status, device.owner, device.remaining
                );
            }
            ok
        })
    }
}
