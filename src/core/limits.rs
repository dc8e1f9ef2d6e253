/*!
 * Dispatch Limits and Constants
 *
 * Centralized location for thresholds and defaults used by the dispatchers.
 */

// =============================================================================
// WORKER POOL
// =============================================================================

/// Default upper bound for tokio's shared blocking pool
/// Matches tokio's own default so an unconfigured runtime behaves identically
pub const DEFAULT_MAX_BLOCKING_THREADS: usize = 512;

/// Environment override for the shared pool size
pub const ENV_MAX_BLOCKING_THREADS: &str = "IOCTL_MAX_BLOCKING_THREADS";

// =============================================================================
// DEDICATED THREADS
// =============================================================================

/// Name given to every thread spawned for a blocking ioctl
pub const DEFAULT_DEDICATED_THREAD_NAME: &str = "ioctl-blocking";

/// Smallest stack accepted for a dedicated thread (16KB)
/// The thread only performs one foreign call, but libc still needs headroom
pub const MIN_DEDICATED_STACK_SIZE: usize = 16 * 1024;

/// Environment override for the dedicated thread stack size
pub const ENV_THREAD_STACK_SIZE: &str = "IOCTL_THREAD_STACK_SIZE";

// =============================================================================
// ARGUMENTS
// =============================================================================

/// Largest integral float accepted from JSON-described arguments (2^53)
/// Beyond this an f64 no longer identifies a unique integer
pub const MAX_SAFE_JSON_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Message carried by every rejected `data` value
pub const UNSUPPORTED_POINTER_MESSAGE: &str = "unsupported ioctl pointer value";

// =============================================================================
// TRACING
// =============================================================================

/// Enables JSON log output when set to `1` or `true`
pub const ENV_TRACE_JSON: &str = "IOCTL_TRACE_JSON";
