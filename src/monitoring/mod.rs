/*!
 * Monitoring
 * Tracing subscriber setup and spans
 */

mod tracer;

pub use tracer::{dispatch_span, generate_trace_id, init_tracing, timer_span};
