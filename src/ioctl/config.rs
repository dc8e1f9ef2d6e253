/*!
 * Dispatch Configuration
 *
 * Sizing for the shared worker pool and the dedicated blocking threads.
 * The worker pool belongs to the tokio runtime and is shared with unrelated
 * work; it is sized once when the runtime is built, never per batch.
 */

use crate::core::limits::*;
use std::str::FromStr;
use tokio::runtime::{Builder, Runtime};
use tracing::warn;

/// Configuration for both dispatch paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Upper bound of tokio's shared blocking pool (default: 512)
    pub max_blocking_threads: usize,

    /// Name given to dedicated blocking threads
    pub dedicated_thread_name: String,

    /// Stack size for dedicated threads (default: platform default)
    pub dedicated_stack_size: Option<usize>,
}

impl DispatchConfig {
    /// Create default configuration
    pub fn new() -> Self {
        Self {
            max_blocking_threads: DEFAULT_MAX_BLOCKING_THREADS,
            dedicated_thread_name: DEFAULT_DEDICATED_THREAD_NAME.to_string(),
            dedicated_stack_size: None,
        }
    }

    /// Defaults overridden by `IOCTL_MAX_BLOCKING_THREADS` and `IOCTL_THREAD_STACK_SIZE`
    ///
    /// Unparseable or out-of-range values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new();

        if let Some(threads) = parse_var::<usize>(&lookup, ENV_MAX_BLOCKING_THREADS) {
            if threads == 0 {
                warn!(var = ENV_MAX_BLOCKING_THREADS, "Pool size must be non-zero, using default");
            } else {
                config.max_blocking_threads = threads;
            }
        }

        if let Some(stack) = parse_var::<usize>(&lookup, ENV_THREAD_STACK_SIZE) {
            if stack < MIN_DEDICATED_STACK_SIZE {
                warn!(
                    var = ENV_THREAD_STACK_SIZE,
                    stack,
                    min = MIN_DEDICATED_STACK_SIZE,
                    "Stack size below minimum, using default"
                );
            } else {
                config.dedicated_stack_size = Some(stack);
            }
        }

        config
    }

    pub fn with_max_blocking_threads(mut self, threads: usize) -> Self {
        self.max_blocking_threads = threads.max(1);
        self
    }

    pub fn with_dedicated_thread_name(mut self, name: impl Into<String>) -> Self {
        self.dedicated_thread_name = name.into();
        self
    }

    pub fn with_dedicated_stack_size(mut self, size: usize) -> Self {
        self.dedicated_stack_size = Some(size.max(MIN_DEDICATED_STACK_SIZE));
        self
    }

    /// Build the multi-thread runtime whose blocking pool serves batched calls
    pub fn build_runtime(&self) -> std::io::Result<Runtime> {
        Builder::new_multi_thread()
            .max_blocking_threads(self.max_blocking_threads)
            .enable_all()
            .build()
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = key, value = %raw, "Ignoring unparseable configuration value");
            None
        }
    }
}
