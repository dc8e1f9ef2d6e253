/*!
 * Async ioctl Library
 *
 * Non-blocking dispatch of `ioctl(2)` for tokio applications:
 * short calls are batched onto the shared blocking pool, long-running calls
 * get a dedicated thread, and kernel failures come back as structured errors.
 *
 * ```ignore
 * let ioctl = Ioctl::system();
 * let available = IoctlBuffer::zeroed(4);
 * ioctl.call(fd, FIONREAD, &available).await?;
 * let values = ioctl.batch([(fd, REQ_A), (fd, REQ_B)]).await?;
 * ioctl.blocking(fd, WAIT_FOR_EVENT, None::<u64>).await?;
 * ```
 */

pub mod core;
pub mod ioctl;
pub mod monitoring;

// Re-exports
pub use crate::core::{
    errno_name, CallError, IoctlError, IoctlResult, RawFd, Request, SerializableCallError,
};
pub use ioctl::{
    BatchPolicy, BufferView, CallDescriptor, DispatchConfig, DispatchStatsSnapshot, Ioctl,
    IoctlBackend, IoctlBuffer, IoctlData, RawArgument, RawOutcome,
};
#[cfg(unix)]
pub use ioctl::SystemBackend;
pub use monitoring::init_tracing;
