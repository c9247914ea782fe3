/*!
 * System Clock
 * Tick counter that drives the device timeout sweep and clock interrupts
 */

use crate::config::TimerConfig;
use crate::device::{DeviceManager, TimeoutReclaim};
use crate::interrupt::{InterruptManager, InterruptPayload, InterruptType};
use log::{debug, info};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Vector used for clock interrupts
pub const CLOCK_VECTOR: u32 = 0;

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub reclaimed: Vec<TimeoutReclaim>,
    pub clock_interrupt: bool,
}

pub struct Timer {
    ticks: AtomicU64,
    running: AtomicBool,
    clock_interrupt_interval: u64,
    devices: Arc<DeviceManager>,
    interrupts: Arc<InterruptManager>,
}

impl Timer {
    pub fn new(
        config: &TimerConfig,
        devices: Arc<DeviceManager>,
        interrupts: Arc<InterruptManager>,
    ) -> Self {
        Self {
            ticks: AtomicU64::new(0),
            running: AtomicBool::new(false),
            clock_interrupt_interval: config.clock_interrupt_interval.max(1),
            devices,
            interrupts,
        }
    }

    /// Resume counting; a no-op when already running
    ///
    /// The tick count carries over a stop/start cycle, so clock interrupt
    /// numbering and `current_time` never move backwards.
    pub fn start(&self) {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("System clock started at tick {}", self.current_time());
        }
    }

    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("System clock stopped at tick {}", self.current_time());
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn current_time(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Advance the clock by one tick
    ///
    /// Returns `None` while the clock is stopped.
    pub fn tick(&self) -> Option<TickReport> {
        if !self.is_running() {
            return None;
        }
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;

        let reclaimed = self.devices.check_timeouts();
        let clock_interrupt = tick % self.clock_interrupt_interval == 0
            && self
                .interrupts
                .trigger(
                    CLOCK_VECTOR,
                    InterruptType::Clock,
                    InterruptPayload::default().with_extra("tick", tick),
                    "system clock interrupt",
                )
                .is_some();

        if clock_interrupt {
            debug!("Clock interrupt raised at tick {}", tick);
        }
        Some(TickReport {
            tick,
            reclaimed,
            clock_interrupt,
        })
    }
}
