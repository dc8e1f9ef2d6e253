/*!
 * Batched Dispatcher
 *
 * Offloads a group of ioctls onto tokio's shared blocking pool as one unit of
 * work and hands back one ordered list of outcomes.
 *
 * ## Batch policies
 *
 * - **Poison** (`batch`): the first failing position, walking in input order,
 *   settles the whole batch as that error. The worker stops issuing calls once
 *   one fails, since their results could never be reported.
 * - **Settle** (`batch_settled`): every call is issued and every position
 *   resolves to its own `Result`.
 *
 * Coercion happens for every descriptor before anything is submitted, so an
 * invalid argument anywhere means no kernel call at all.
 */

use super::backend::{IoctlBackend, RawOutcome};
use super::descriptor::{CallDescriptor, PreparedCall};
use super::stats::DispatchStats;
use super::translate::translate;
use crate::core::{CallError, IoctlError, IoctlResult};
use crate::monitoring::dispatch_span;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, trace, Instrument};

/// How a batch reports failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPolicy {
    /// First failure settles the whole batch
    Poison,
    /// Every position settles independently
    Settle,
}

/// Dispatcher for short ioctls on the shared worker pool
#[derive(Clone)]
pub struct BatchDispatcher {
    backend: Arc<dyn IoctlBackend>,
    stats: Arc<DispatchStats>,
}

impl BatchDispatcher {
    pub fn new(backend: Arc<dyn IoctlBackend>, stats: Arc<DispatchStats>) -> Self {
        Self { backend, stats }
    }

    /// Run a batch under the poisoning policy
    ///
    /// Resolves to one return value per descriptor, in input order, or to the
    /// error of the first failing descriptor.
    pub async fn batch(&self, calls: Vec<CallDescriptor>) -> IoctlResult<Vec<i64>> {
        let span = dispatch_span("batch", calls.len());
        async move {
            let completed = self.dispatch(calls, BatchPolicy::Poison).await?;

            let mut values = Vec::with_capacity(completed.len());
            for (call, outcome) in completed {
                match translate(call.fd, call.request, outcome) {
                    Ok(value) => values.push(value),
                    Err(err) => {
                        self.stats.record_kernel_failures(1);
                        debug!(
                            fd = err.fd,
                            request = err.request,
                            errno = err.errno,
                            "Batch poisoned"
                        );
                        return Err(err.into());
                    }
                }
            }

            Ok(values)
        }
        .instrument(span)
        .await
    }

    /// Run a batch where each position settles on its own
    ///
    /// The outer error covers coercion and submission only.
    pub async fn batch_settled(
        &self,
        calls: Vec<CallDescriptor>,
    ) -> IoctlResult<Vec<Result<i64, CallError>>> {
        let span = dispatch_span("batch_settled", calls.len());
        async move {
            let completed = self.dispatch(calls, BatchPolicy::Settle).await?;

            let results: Vec<_> = completed
                .into_iter()
                .map(|(call, outcome)| translate(call.fd, call.request, outcome))
                .collect();

            let failures = results.iter().filter(|r| r.is_err()).count();
            if failures > 0 {
                self.stats.record_kernel_failures(failures);
            }

            Ok(results)
        }
        .instrument(span)
        .await
    }

    /// Coerce, submit as one unit, and wait for the ordered outcome list
    async fn dispatch(
        &self,
        calls: Vec<CallDescriptor>,
        policy: BatchPolicy,
    ) -> IoctlResult<Vec<(PreparedCall, RawOutcome)>> {
        let prepared = calls
            .into_iter()
            .map(CallDescriptor::prepare)
            .collect::<IoctlResult<Vec<_>>>()
            .map_err(|err| {
                self.stats.record_invalid_argument();
                err
            })?;

        if prepared.is_empty() {
            return Ok(Vec::new());
        }

        let handle = Handle::try_current().map_err(|e| {
            self.stats.record_submission_failure();
            IoctlError::Submission(format!("no tokio runtime to submit to: {}", e).into())
        })?;

        let count = prepared.len();
        self.stats.record_batch(count);
        debug!(count, ?policy, "Submitting ioctl batch to worker pool");

        let backend = Arc::clone(&self.backend);
        let completed = handle
            .spawn_blocking(move || run_group(backend.as_ref(), prepared, policy))
            .await
            .map_err(|e| {
                self.stats.record_submission_failure();
                IoctlError::Submission(format!("worker pool task failed: {}", e).into())
            })?;

        trace!(count, issued = completed.len(), "ioctl batch completed");
        Ok(completed)
    }
}

/// Worker side: issue calls in order, pairing each with its outcome
fn run_group(
    backend: &dyn IoctlBackend,
    prepared: Vec<PreparedCall>,
    policy: BatchPolicy,
) -> Vec<(PreparedCall, RawOutcome)> {
    let mut completed = Vec::with_capacity(prepared.len());

    for call in prepared {
        let outcome = backend.invoke(call.fd, call.request, call.arg);
        let failed = !outcome.is_success();
        completed.push((call, outcome));

        if failed && policy == BatchPolicy::Poison {
            break;
        }
    }

    completed
}
