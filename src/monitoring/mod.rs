/*!
 * Monitoring
 * Tracing setup shared by the dispatchers
 */

mod tracer;

pub use tracer::{dispatch_span, init_tracing};
