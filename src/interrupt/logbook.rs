/*!
 * Interrupt Log
 * Bounded ring of interrupt records; the oldest entry is dropped when full
 */

use super::types::{Interrupt, InterruptLog, InterruptStatus, InterruptType};
use crate::core::types::InterruptId;
use parking_lot::Mutex;
use ringbuf::{traits::*, HeapRb};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

pub struct InterruptLogBook {
    ring: Mutex<HeapRb<InterruptLog>>,
    next_id: AtomicU64,
}

impl InterruptLogBook {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(HeapRb::new(capacity.max(1))),
            next_id: AtomicU64::new(1),
        }
    }

    /// Append a "queued" record for a freshly raised interrupt
    pub fn record(&self, interrupt: &Interrupt) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = InterruptLog {
            id,
            interrupt_id: interrupt.id,
            kind: interrupt.kind,
            timestamp: SystemTime::now(),
            message: interrupt.message.clone(),
            result: None,
            status: InterruptStatus::Queued,
        };
        self.ring.lock().push_overwrite(entry);
        id
    }

    pub fn mark_dispatched(&self, interrupt_id: InterruptId) -> bool {
        self.update(interrupt_id, |entry| entry.status = InterruptStatus::Dispatched)
    }

    pub fn resolve(&self, interrupt_id: InterruptId, result: &str) -> bool {
        self.update(interrupt_id, |entry| {
            entry.status = InterruptStatus::Resolved;
            entry.result = Some(result.to_string());
        })
    }

    fn update<F>(&self, interrupt_id: InterruptId, apply: F) -> bool
    where
        F: FnOnce(&mut InterruptLog),
    {
        let mut ring = self.ring.lock();
        match ring.iter_mut().find(|e| e.interrupt_id == interrupt_id) {
            Some(entry) => {
                apply(entry);
                true
            }
            // Evicted already, or never logged (throttled clock)
            None => false,
        }
    }

    /// Most recent entries first, optionally filtered by type
    pub fn recent(&self, limit: usize, filter: Option<InterruptType>) -> Vec<InterruptLog> {
        let ring = self.ring.lock();
        let mut entries: Vec<InterruptLog> = ring
            .iter()
            .filter(|e| filter.map_or(true, |kind| e.kind == kind))
            .cloned()
            .collect();
        entries.reverse();
        entries.truncate(limit);
        entries
    }

    pub fn len(&self) -> usize {
        self.ring.lock().occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.lock().capacity().get()
    }

    pub fn clear(&self) {
        self.ring.lock().clear();
    }
}
