/*!
 * Blocking Dispatcher
 *
 * Runs one ioctl on its own OS thread. Meant for requests that may wait on
 * hardware or a peer for an unbounded time, which would otherwise pin a slot
 * of the shared worker pool.
 *
 * The thread reports `(errno, return_value)` over a one-shot flume channel and
 * exits. Awaiting the channel needs no particular runtime.
 */

use super::backend::IoctlBackend;
use super::config::DispatchConfig;
use super::descriptor::CallDescriptor;
use super::stats::DispatchStats;
use super::translate::translate;
use crate::core::{IoctlError, IoctlResult};
use crate::monitoring::dispatch_span;
use std::sync::Arc;
use std::thread;
use tracing::{debug, Instrument};

/// Dispatcher spawning one dedicated thread per call
#[derive(Clone)]
pub struct BlockingDispatcher {
    backend: Arc<dyn IoctlBackend>,
    stats: Arc<DispatchStats>,
    config: Arc<DispatchConfig>,
}

impl BlockingDispatcher {
    pub fn new(
        backend: Arc<dyn IoctlBackend>,
        stats: Arc<DispatchStats>,
        config: Arc<DispatchConfig>,
    ) -> Self {
        Self {
            backend,
            stats,
            config,
        }
    }

    /// Run a single call on a dedicated thread
    pub async fn blocking(&self, call: CallDescriptor) -> IoctlResult<i64> {
        let span = dispatch_span("blocking", 1);
        async move {
            let prepared = call.prepare().map_err(|err| {
                self.stats.record_invalid_argument();
                err
            })?;

            let (tx, rx) = flume::bounded(1);
            let backend = Arc::clone(&self.backend);
            let live = self.stats.dedicated_thread();

            let mut builder =
                thread::Builder::new().name(self.config.dedicated_thread_name.clone());
            if let Some(size) = self.config.dedicated_stack_size {
                builder = builder.stack_size(size);
            }

            debug!(
                fd = prepared.fd,
                request = prepared.request,
                "Spawning dedicated ioctl thread"
            );
            self.stats.record_blocking();

            builder
                .spawn(move || {
                    let _live = live;
                    let outcome = backend.invoke(prepared.fd, prepared.request, prepared.arg);
                    // The receiver only disappears if the caller stopped waiting
                    let _ = tx.send((prepared, outcome));
                })
                .map_err(|e| {
                    self.stats.record_submission_failure();
                    IoctlError::Submission(format!("could not start ioctl thread: {}", e).into())
                })?;

            let (prepared, outcome) = rx.recv_async().await.map_err(|_| {
                self.stats.record_submission_failure();
                IoctlError::Submission("ioctl thread exited without reporting".into())
            })?;

            translate(prepared.fd, prepared.request, outcome).map_err(|err| {
                self.stats.record_kernel_failures(1);
                IoctlError::Kernel(err)
            })
        }
        .instrument(span)
        .await
    }
}
