//! Observability utilities.

mod spans;
mod subscriber;

pub use spans::{BuildSpanAttributes, SpanTimer};
pub use subscriber::{init_tracing, LogFormat, LOG_ENV_VAR};
