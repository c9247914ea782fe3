/*!
 * Kernel Configuration
 *
 * Tunables for every subsystem. Defaults come from `core::limits`; presets
 * cover tests (no residency delay) and slow environments, and any value can
 * be overridden from `KERNEL_*` environment variables or a JSON document.
 */

use crate::core::errors::{ConfigError, ConfigResult};
use crate::core::limits::*;
use crate::core::serde::duration_millis;
use crate::device::DeviceSpec;
use crate::process::SchedulingPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Physical memory geometry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Total physical memory in units (default: 1024)
    pub total_memory: usize,
    /// Units per page (default: 4)
    pub page_size: usize,
    /// Virtual pages per process page table (default: 64)
    pub page_table_capacity: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            total_memory: DEFAULT_TOTAL_MEMORY,
            page_size: DEFAULT_PAGE_SIZE,
            page_table_capacity: DEFAULT_PAGE_TABLE_CAPACITY,
        }
    }
}

/// Interrupt pipeline tunables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterruptConfig {
    /// Minimum queue residency before dispatch (default: 50ms)
    #[serde(with = "duration_millis")]
    pub processing_delay: Duration,
    /// Simulated service latency around type-specific handling (default: 0)
    #[serde(with = "duration_millis")]
    pub service_latency: Duration,
    /// Bounded log ring capacity (default: 1000)
    pub log_capacity: usize,
    /// Log only every Nth CLOCK interrupt (default: 10)
    pub clock_log_interval: u64,
    /// Global enable gate at startup
    pub enabled: bool,
}

impl Default for InterruptConfig {
    fn default() -> Self {
        Self {
            processing_delay: DEFAULT_INTERRUPT_PROCESSING_DELAY,
            service_latency: DEFAULT_INTERRUPT_SERVICE_LATENCY,
            log_capacity: DEFAULT_INTERRUPT_LOG_CAPACITY,
            clock_log_interval: CLOCK_LOG_INTERVAL,
            enabled: true,
        }
    }
}

/// Device catalog and grant defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Grant duration for promoted waiters, in ticks (default: 5)
    pub default_duration: u32,
    pub catalog: Vec<DeviceSpec>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            default_duration: DEFAULT_DEVICE_DURATION,
            catalog: DeviceSpec::default_catalog(),
        }
    }
}

/// Independent periods for the timer-driven passes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Device timeout sweep, one tick (default: 1s)
    #[serde(with = "duration_millis")]
    pub device_sweep_period: Duration,
    /// Interrupt dispatch pass (default: 50ms)
    #[serde(with = "duration_millis")]
    pub dispatch_period: Duration,
    /// Scheduling watchdog (default: 50ms)
    #[serde(with = "duration_millis")]
    pub watchdog_period: Duration,
    /// Queue status report (default: 5s)
    #[serde(with = "duration_millis")]
    pub status_period: Duration,
    /// Raise a CLOCK interrupt every N ticks (default: 10)
    pub clock_interrupt_interval: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            device_sweep_period: DEFAULT_DEVICE_SWEEP_PERIOD,
            dispatch_period: DEFAULT_DISPATCH_PERIOD,
            watchdog_period: DEFAULT_WATCHDOG_PERIOD,
            status_period: DEFAULT_STATUS_PERIOD,
            clock_interrupt_interval: CLOCK_INTERRUPT_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub policy: SchedulingPolicy,
}

/// Complete kernel configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub memory: MemoryConfig,
    pub interrupts: InterruptConfig,
    pub devices: DeviceConfig,
    pub timer: TimerConfig,
    pub scheduler: SchedulerConfig,
    /// Directory for file-backed process swap; in-memory when unset
    #[serde(
        with = "crate::core::serde::optional_pathbuf_string",
        skip_serializing_if = "crate::core::serde::is_none"
    )]
    pub swap_dir: Option<PathBuf>,
}

impl KernelConfig {
    /// Create default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for tests: interrupts dispatch on the first pass
    pub fn for_testing() -> Self {
        let mut config = Self::default();
        config.interrupts.processing_delay = Duration::ZERO;
        config.interrupts.service_latency = Duration::ZERO;
        config.timer.device_sweep_period = Duration::from_millis(10);
        config.timer.dispatch_period = Duration::from_millis(5);
        config.timer.watchdog_period = Duration::from_millis(5);
        config.timer.status_period = Duration::from_millis(50);
        config
    }

    /// Configuration for slow environments
    pub fn relaxed() -> Self {
        let mut config = Self::default();
        config.interrupts.processing_delay = Duration::from_millis(500);
        config.timer.dispatch_period = Duration::from_millis(250);
        config.timer.watchdog_period = Duration::from_millis(250);
        config.timer.status_period = Duration::from_secs(30);
        config
    }

    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json(document: &str) -> ConfigResult<Self> {
        let config: Self =
            serde_json::from_str(document).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `KERNEL_*` environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from any key/value source
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let millis = |key: &str| -> ConfigResult<Option<Duration>> {
            Ok(parse::<u64, _>(&lookup, key)?.map(Duration::from_millis))
        };

        if let Some(v) = parse(&lookup, "KERNEL_TOTAL_MEMORY")? {
            self.memory.total_memory = v;
        }
        if let Some(v) = parse(&lookup, "KERNEL_PAGE_SIZE")? {
            self.memory.page_size = v;
        }
        if let Some(v) = parse(&lookup, "KERNEL_PAGE_TABLE_CAPACITY")? {
            self.memory.page_table_capacity = v;
        }
        if let Some(v) = millis("KERNEL_INTERRUPT_DELAY_MS")? {
            self.interrupts.processing_delay = v;
        }
        if let Some(v) = millis("KERNEL_INTERRUPT_LATENCY_MS")? {
            self.interrupts.service_latency = v;
        }
        if let Some(v) = parse(&lookup, "KERNEL_INTERRUPT_LOG_CAPACITY")? {
            self.interrupts.log_capacity = v;
        }
        if let Some(v) = parse(&lookup, "KERNEL_DEVICE_DURATION")? {
            self.devices.default_duration = v;
        }
        if let Some(v) = millis("KERNEL_TICK_MS")? {
            self.timer.device_sweep_period = v;
        }
        if let Some(v) = millis("KERNEL_DISPATCH_PERIOD_MS")? {
            self.timer.dispatch_period = v;
        }
        if let Some(v) = millis("KERNEL_WATCHDOG_PERIOD_MS")? {
            self.timer.watchdog_period = v;
        }
        if let Some(v) = parse(&lookup, "KERNEL_SCHEDULING_POLICY")? {
            self.scheduler.policy = v;
        }
        if let Some(dir) = lookup("KERNEL_SWAP_DIR") {
            self.swap_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    /// Reject geometries and periods the simulation cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.memory.page_size == 0 {
            return Err(ConfigError::MemoryGeometry("page size is zero".into()));
        }
        if self.memory.total_memory % self.memory.page_size != 0 {
            return Err(ConfigError::MemoryGeometry(format!(
                "total memory {} is not a multiple of page size {}",
                self.memory.total_memory, self.memory.page_size
            )));
        }
        if self.interrupts.log_capacity == 0 {
            return Err(ConfigError::ZeroLogCapacity);
        }

        let periods = [
            ("device_sweep_period", self.timer.device_sweep_period),
            ("dispatch_period", self.timer.dispatch_period),
            ("watchdog_period", self.timer.watchdog_period),
            ("status_period", self.timer.status_period),
        ];
        if let Some(&(name, _)) = periods.iter().find(|(_, p)| p.is_zero()) {
            return Err(ConfigError::ZeroPeriod(name));
        }
        if self.timer.clock_interrupt_interval == 0 {
            return Err(ConfigError::ZeroPeriod("clock_interrupt_interval"));
        }
        Ok(())
    }
}

fn parse<T, F>(lookup: &F, key: &str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
    }
}
