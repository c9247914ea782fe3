/*!
 * Core Module
 * Shared types, errors, limits and serde helpers
 */

pub mod errors;
pub mod limits;
pub mod serde;
pub mod types;

pub use errors::{ConfigError, ConfigResult, KernelError};
pub use types::*;
