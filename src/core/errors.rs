/*!
 * Error Types
 * Centralized error handling with thiserror and miette
 *
 * Expected simulation conditions (a full device, an invalid transition, an
 * unknown id) are reported as return values by the components themselves.
 * The types here cover the remaining failures that cross a component boundary.
 */

use miette::Diagnostic;
use thiserror::Error;

pub use crate::interrupt::InterruptError;
pub use crate::memory::MemoryError;
pub use crate::process::swapper::SwapError;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    #[diagnostic(
        code(config::invalid_value),
        help("Check the KERNEL_* environment variables for typos and non-numeric values.")
    )]
    InvalidValue { key: String, value: String },

    #[error("Invalid memory geometry: {0}")]
    #[diagnostic(
        code(config::memory_geometry),
        help("Page size must be non-zero and divide total memory evenly.")
    )]
    MemoryGeometry(String),

    #[error("Invalid timer period: {0} must be greater than zero")]
    #[diagnostic(code(config::timer_period))]
    ZeroPeriod(&'static str),

    #[error("Interrupt log capacity must be greater than zero")]
    #[diagnostic(code(config::log_capacity))]
    ZeroLogCapacity,

    #[error("Malformed configuration document: {0}")]
    #[diagnostic(
        code(config::parse),
        help("The configuration document must be JSON matching KernelConfig.")
    )]
    Parse(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Unified kernel error type with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum KernelError {
    #[error("Memory error: {0}")]
    #[diagnostic(code(kernel::memory))]
    Memory(#[from] MemoryError),

    #[error("Swap error: {0}")]
    #[diagnostic(
        code(kernel::swap),
        help("The backing store may be unwritable or the process is not swapped out.")
    )]
    Swap(#[from] SwapError),

    #[error("Interrupt error: {0}")]
    #[diagnostic(code(kernel::interrupt))]
    Interrupt(#[from] InterruptError),

    #[error("Configuration error: {0}")]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("Process {0} not found")]
    #[diagnostic(
        code(kernel::process_not_found),
        help("The process may never have been admitted. Check the PID.")
    )]
    ProcessNotFound(u32),

    #[error("I/O error: {0}")]
    #[diagnostic(code(kernel::io))]
    Io(#[from] std::io::Error),
}
