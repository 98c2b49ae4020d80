/*!
 * Monitoring
 * Structured logging for the scheduling core
 */

mod tracer;

pub use tracer::{init_tracing, OperationSpan, TRACE_JSON_ENV};
