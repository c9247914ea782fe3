/*!
 * Tracing
 * Subscriber setup and interrupt dispatch spans
 */

use tracing::{info, span, Level, Span};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - KERNEL_TRACE_JSON: Enable JSON output (default: false)
///
/// `log` records from the subsystems are forwarded through the tracing-log
/// bridge installed by `init`.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("KERNEL_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .init();
        info!("Structured tracing initialized with JSON output");
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .compact(),
            )
            .init();
        info!("Structured tracing initialized");
    }
}

/// Generate a unique trace ID for correlating a dispatch with its effects
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering the type-specific handling of one interrupt
pub fn dispatch_span(interrupt_id: u64, kind: &str, pid: Option<u32>) -> Span {
    let trace_id = generate_trace_id();
    span!(
        Level::DEBUG,
        "interrupt_dispatch",
        trace_id = %trace_id,
        interrupt_id = interrupt_id,
        kind = kind,
        pid = ?pid,
        result = tracing::field::Empty,
        duration_us = tracing::field::Empty,
    )
}

/// Span for one timer loop iteration
pub fn timer_span(concern: &'static str, tick: u64) -> Span {
    span!(Level::TRACE, "timer", concern = concern, tick = tick)
}
