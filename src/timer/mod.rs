/*!
 * Timer Module
 * Tick source and the periodic task that drives sweeps, dispatch and the watchdog
 */

pub mod clock;
pub mod task;

pub use clock::{TickReport, Timer, CLOCK_VECTOR};
pub use task::{TimerCommand, TimerTask};
