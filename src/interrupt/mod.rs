/*!
 * Interrupt Module
 * Severity-ordered interrupt queue with deferred dispatch and a bounded log
 */

mod dispatch;
pub mod logbook;
pub mod manager;
pub mod queue;
pub mod types;

pub use manager::InterruptManager;
pub use types::{
    HandledInterrupt, Interrupt, InterruptError, InterruptLog, InterruptPayload, InterruptResult,
    InterruptStats, InterruptStatus, InterruptType,
};
