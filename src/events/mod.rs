/*!
 * Events Module
 * Typed publish/subscribe between kernel subsystems
 */

pub mod bus;
pub mod types;

pub use bus::{EventBus, HandlerFn, SubscriptionId};
pub use types::KernelEvent;
