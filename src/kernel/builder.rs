/*!
 * Kernel Builder
 * Assembles the subsystems and wires their event subscriptions
 */

use super::Kernel;
use crate::config::KernelConfig;
use crate::core::types::KernelResult;
use crate::device::DeviceManager;
use crate::events::EventBus;
use crate::interrupt::InterruptManager;
use crate::memory::MemoryManager;
use crate::process::{
    BackingStore, FileBackingStore, InMemoryBackingStore, InMemoryProcessRepository,
    InMemoryTransitionRepository, ProcessRepository, ProcessSwapper, Scheduler,
    TransitionRepository,
};
use crate::timer::Timer;
use log::info;
use parking_lot::Mutex;
use std::sync::Arc;

/// Builder for `Kernel`
pub struct KernelBuilder {
    config: KernelConfig,
    processes: Option<Arc<dyn ProcessRepository>>,
    transitions: Option<Arc<dyn TransitionRepository>>,
    store: Option<Arc<dyn BackingStore>>,
}

impl KernelBuilder {
    pub fn new() -> Self {
        Self {
            config: KernelConfig::default(),
            processes: None,
            transitions: None,
            store: None,
        }
    }

    pub fn with_config(mut self, config: KernelConfig) -> Self {
        self.config = config;
        self
    }

    /// Persist process descriptors somewhere other than memory
    pub fn with_process_repository(mut self, repository: Arc<dyn ProcessRepository>) -> Self {
        self.processes = Some(repository);
        self
    }

    pub fn with_transition_repository(
        mut self,
        repository: Arc<dyn TransitionRepository>,
    ) -> Self {
        self.transitions = Some(repository);
        self
    }

    /// Override the whole-process swap destination
    pub fn with_backing_store(mut self, store: Arc<dyn BackingStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Validate the configuration and assemble the kernel
    ///
    /// The clock starts running; the periodic task is started separately
    /// with `Kernel::start_timer`.
    pub fn build(self) -> KernelResult<Kernel> {
        let config = self.config;
        config.validate()?;

        let events = Arc::new(EventBus::new());
        let memory = Arc::new(MemoryManager::with_config(&config.memory));

        let store: Arc<dyn BackingStore> = match (self.store, &config.swap_dir) {
            (Some(store), _) => store,
            (None, Some(dir)) => Arc::new(FileBackingStore::new(dir)?),
            (None, None) => Arc::new(InMemoryBackingStore::new()),
        };
        let swapper = Arc::new(ProcessSwapper::new(memory.clone(), store));

        let processes = self
            .processes
            .unwrap_or_else(|| Arc::new(InMemoryProcessRepository::new()));
        let transitions = self
            .transitions
            .unwrap_or_else(|| Arc::new(InMemoryTransitionRepository::new()));

        let scheduler = Arc::new(Scheduler::new(
            config.scheduler.policy,
            memory.clone(),
            swapper.clone(),
            processes.clone(),
            transitions,
        ));
        let devices = Arc::new(DeviceManager::new(&config.devices, events.clone()));
        let interrupts = Arc::new(InterruptManager::new(
            &config.interrupts,
            devices.clone(),
            processes.clone(),
            events.clone(),
        ));
        let timer = Arc::new(Timer::new(&config.timer, devices.clone(), interrupts.clone()));

        wire(&events, &scheduler, &devices, &interrupts);
        timer.start();

        info!(
            "Kernel assembled: {} units of memory, {} devices, policy {:?}",
            memory.total_memory(),
            config.devices.catalog.len(),
            config.scheduler.policy
        );

        Ok(Kernel {
            config,
            events,
            memory,
            swapper,
            scheduler,
            devices,
            interrupts,
            timer,
            processes,
            task: Mutex::new(None),
        })
    }
}

impl Default for KernelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscribe each reactive component to the bus
///
/// Order matters: the scheduler reacts to a termination before the device
/// manager hands the departing process's devices to waiters.
fn wire(
    events: &EventBus,
    scheduler: &Arc<Scheduler>,
    devices: &Arc<DeviceManager>,
    interrupts: &Arc<InterruptManager>,
) {
    let weak = Arc::downgrade(scheduler);
    events.subscribe("scheduler", move |event| {
        if let Some(scheduler) = weak.upgrade() {
            scheduler.handle_event(event);
        }
    });

    let weak = Arc::downgrade(devices);
    events.subscribe("device-reclaim", move |event| {
        if let crate::events::KernelEvent::ProcessTerminated { pid, .. } = event {
            if let Some(devices) = weak.upgrade() {
                devices.reclaim_process(*pid);
            }
        }
    });

    let weak = Arc::downgrade(interrupts);
    events.subscribe("interrupts", move |event| {
        if let Some(interrupts) = weak.upgrade() {
            interrupts.handle_event(event);
        }
    });
}
