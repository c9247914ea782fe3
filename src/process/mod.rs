/*!
 * Process Module
 * Process scheduling, whole-process swapping and persistence seams
 */

pub mod repository;
pub mod scheduler;
pub mod swapper;
pub mod types;

pub use repository::{
    InMemoryProcessRepository, InMemoryTransitionRepository, ProcessRepository,
    TransitionRepository,
};
pub use scheduler::Scheduler;
pub use swapper::{BackingStore, FileBackingStore, InMemoryBackingStore, ProcessSwapper, SwapError};
pub use types::{
    AdmissionResult, Process, ProcessState, ProcessTransition, QueueSnapshot, SchedulerStats,
    SchedulingPolicy,
};
