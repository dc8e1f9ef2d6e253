/*!
 * Async ioctl Dispatch
 *
 * Exposes `ioctl(2)` to async callers without blocking the scheduler thread:
 * - Argument: coercion of the optional `data` argument (value or address)
 * - Backend: the foreign call boundary
 * - Translate: raw `(errno, return_value)` to success or `CallError`
 * - Batch: grouped calls on tokio's shared blocking pool
 * - Blocking: one dedicated thread per long-running call
 *
 * ```text
 *  call / batch ───► coerce ───► spawn_blocking ──► backend ──┐
 *  blocking ───────► coerce ───► thread::spawn ───► backend ──┤
 *                                                             ▼
 *                                                        translate
 * ```
 */

pub mod argument;
pub mod backend;
pub mod batch;
pub mod blocking;
pub mod config;
pub mod descriptor;
pub mod stats;
pub mod translate;

pub use argument::{coerce, BufferView, IoctlBuffer, IoctlData, RawArgument};
#[cfg(unix)]
pub use backend::SystemBackend;
pub use backend::{IoctlBackend, RawOutcome};
pub use batch::{BatchDispatcher, BatchPolicy};
pub use blocking::BlockingDispatcher;
pub use config::DispatchConfig;
pub use descriptor::{CallDescriptor, PreparedCall};
pub use stats::{DispatchStats, DispatchStatsSnapshot};
pub use translate::translate;

use crate::core::{CallError, IoctlError, IoctlResult, RawFd, Request};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Caller-facing entry point for both dispatch paths
///
/// Cheap to clone; clones share the backend and the statistics.
#[derive(Clone)]
pub struct Ioctl {
    batcher: BatchDispatcher,
    blocker: BlockingDispatcher,
    stats: Arc<DispatchStats>,
}

impl Ioctl {
    /// Dispatcher over the platform's `ioctl(2)` with configuration from the environment
    #[cfg(unix)]
    pub fn system() -> Self {
        Self::with_config(Arc::new(SystemBackend), DispatchConfig::from_env())
    }

    /// Dispatcher over a custom backend with default configuration
    pub fn with_backend(backend: Arc<dyn IoctlBackend>) -> Self {
        Self::with_config(backend, DispatchConfig::default())
    }

    pub fn with_config(backend: Arc<dyn IoctlBackend>, config: DispatchConfig) -> Self {
        info!(
            dedicated_thread = %config.dedicated_thread_name,
            stack_size = ?config.dedicated_stack_size,
            "ioctl dispatcher initialized"
        );

        let stats = Arc::new(DispatchStats::new());
        let config = Arc::new(config);

        Self {
            batcher: BatchDispatcher::new(Arc::clone(&backend), Arc::clone(&stats)),
            blocker: BlockingDispatcher::new(backend, Arc::clone(&stats), config),
            stats,
        }
    }

    /// Single immediate call, dispatched as a batch of one
    pub async fn call(
        &self,
        fd: RawFd,
        request: Request,
        data: impl Into<IoctlData>,
    ) -> IoctlResult<i64> {
        let mut values = self
            .batcher
            .batch(vec![CallDescriptor::new(fd, request, data)])
            .await?;

        values
            .pop()
            .ok_or_else(|| IoctlError::Submission("worker pool returned no result".into()))
    }

    /// Batch where the first failure settles the whole batch
    pub async fn batch<I>(&self, calls: I) -> IoctlResult<Vec<i64>>
    where
        I: IntoIterator,
        I::Item: Into<CallDescriptor>,
    {
        self.batcher
            .batch(calls.into_iter().map(Into::into).collect())
            .await
    }

    /// Batch where every position settles independently
    pub async fn batch_settled<I>(&self, calls: I) -> IoctlResult<Vec<Result<i64, CallError>>>
    where
        I: IntoIterator,
        I::Item: Into<CallDescriptor>,
    {
        self.batcher
            .batch_settled(calls.into_iter().map(Into::into).collect())
            .await
    }

    /// Batch described as JSON: `[[fd, request, data?], ...]`
    ///
    /// `data` follows `IoctlData::from_json`. Any malformed entry rejects the
    /// whole batch before a kernel call is issued.
    pub async fn batch_json(&self, calls: &Value) -> IoctlResult<Vec<i64>> {
        let descriptors = calls
            .as_array()
            .ok_or_else(|| {
                IoctlError::InvalidArgument("batch must be an array of [fd, request, data?]".into())
            })
            .and_then(|entries| {
                entries
                    .iter()
                    .map(descriptor_from_json)
                    .collect::<IoctlResult<Vec<_>>>()
            })
            .map_err(|err| {
                self.stats.record_invalid_argument();
                err
            })?;

        self.batcher.batch(descriptors).await
    }

    /// Single call on a dedicated thread
    pub async fn blocking(
        &self,
        fd: RawFd,
        request: Request,
        data: impl Into<IoctlData>,
    ) -> IoctlResult<i64> {
        self.blocker
            .blocking(CallDescriptor::new(fd, request, data))
            .await
    }

    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }
}

fn descriptor_from_json(entry: &Value) -> IoctlResult<CallDescriptor> {
    let malformed =
        || IoctlError::InvalidArgument(format!("malformed batch entry {}", entry).into());

    let parts = entry.as_array().ok_or_else(malformed)?;
    if !(2..=3).contains(&parts.len()) {
        return Err(malformed());
    }

    let fd = parts[0]
        .as_i64()
        .and_then(|fd| RawFd::try_from(fd).ok())
        .ok_or_else(malformed)?;
    // Negative request codes keep their bits
    let request = parts[1]
        .as_u64()
        .or_else(|| parts[1].as_i64().map(|r| r as u64))
        .ok_or_else(malformed)?;
    let data = match parts.get(2) {
        Some(value) => IoctlData::from_json(value)?,
        None => IoctlData::Absent,
    };

    Ok(CallDescriptor::new(fd, request, data))
}
