/*!
 * Dispatch Tests
 * call / batch / batch_settled / blocking against a scripted backend
 */

use super::support::ScriptedBackend;
use async_ioctl::{
    CallDescriptor, Ioctl, IoctlBackend, IoctlBuffer, IoctlData, IoctlError, RawArgument, RawFd,
    RawOutcome, Request,
};
use nix::libc;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Dies inside the foreign call without producing an outcome
struct PanickingBackend;

impl IoctlBackend for PanickingBackend {
    fn invoke(&self, _fd: RawFd, _request: Request, _arg: RawArgument) -> RawOutcome {
        panic!("backend died mid-call");
    }
}

fn bare(fd: i32, request: u64) -> CallDescriptor {
    CallDescriptor::bare(fd, request)
}

#[tokio::test]
async fn test_call_returns_kernel_value() {
    let backend = ScriptedBackend::new();
    backend.on(3, 0x10, RawOutcome::success(42));
    let ioctl = Ioctl::with_backend(backend.clone());

    assert_eq!(ioctl.call(3, 0x10, ()).await.unwrap(), 42);
    assert_eq!(ioctl.call(3, 0x10, 7u8).await.unwrap(), 42);
    assert_eq!(ioctl.call(3, 0x10, u64::MAX).await.unwrap(), 42);
    assert_eq!(ioctl.call(3, 0x10, &IoctlBuffer::zeroed(8)).await.unwrap(), 42);

    let args: Vec<_> = backend.invocations().into_iter().map(|i| i.arg).collect();
    assert_eq!(args[0], RawArgument::Value(0));
    assert_eq!(args[1], RawArgument::Value(7));
    assert_eq!(args[2], RawArgument::Value(u64::MAX));
    assert!(matches!(args[3], RawArgument::Address(_)));
}

#[tokio::test]
async fn test_call_fails_on_errno_or_sentinel() {
    let backend = ScriptedBackend::new();
    backend
        .on(1, 1, RawOutcome::failure(libc::EINVAL))
        .on(2, 1, RawOutcome { errno: 0, return_value: -1 })
        .on(3, 1, RawOutcome { errno: libc::EIO, return_value: 0 });
    let ioctl = Ioctl::with_backend(backend);

    for fd in 1..=3 {
        let err = ioctl.call(fd, 1, ()).await.unwrap_err();
        assert_eq!(err.as_call_error().map(|e| e.fd), Some(fd));
    }
}

#[tokio::test]
async fn test_batch_preserves_order() {
    let backend = ScriptedBackend::new();
    backend
        .on(10, 1, RawOutcome::success(10))
        .on(20, 2, RawOutcome::success(20))
        .on(30, 3, RawOutcome::success(30));
    let ioctl = Ioctl::with_backend(backend.clone());

    let values = ioctl.batch([bare(10, 1), bare(20, 2), bare(30, 3)]).await.unwrap();

    assert_eq!(values, vec![10, 20, 30]);
    let order: Vec<_> = backend.invocations().iter().map(|i| i.fd).collect();
    assert_eq!(order, vec![10, 20, 30]);
}

#[tokio::test]
async fn test_batch_failure_references_failing_element() {
    let backend = ScriptedBackend::new();
    backend.on(2, 0x22, RawOutcome::failure(libc::ENOTTY));
    let ioctl = Ioctl::with_backend(backend);

    let err = ioctl
        .batch([bare(1, 0x11), bare(2, 0x22), bare(3, 0x33)])
        .await
        .unwrap_err();

    match err {
        IoctlError::Kernel(call) => {
            assert_eq!(call.fd, 2);
            assert_eq!(call.request, 0x22);
            assert_eq!(call.errno, libc::ENOTTY);
            assert_eq!(call.to_string(), "ENOTTY running ioctl(2, 34)");
        }
        other => panic!("expected kernel error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_batch_settled_keeps_every_position() {
    let backend = ScriptedBackend::new();
    backend.on(2, 0x22, RawOutcome::failure(libc::ENOTTY));
    let ioctl = Ioctl::with_backend(backend.clone());

    let results = ioctl
        .batch_settled([bare(1, 0x11), bare(2, 0x22), bare(3, 0x33)])
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0], Ok(10));
    assert_eq!(results[1].as_ref().unwrap_err().fd, 2);
    assert_eq!(results[2], Ok(30));
    assert_eq!(backend.invocation_count(), 3);
}

#[tokio::test]
async fn test_empty_batch() {
    let backend = ScriptedBackend::new();
    let ioctl = Ioctl::with_backend(backend.clone());

    let values = ioctl.batch(Vec::<CallDescriptor>::new()).await.unwrap();

    assert!(values.is_empty());
    assert_eq!(backend.invocation_count(), 0);
}

#[tokio::test]
async fn test_unsupported_data_never_reaches_kernel() {
    let backend = ScriptedBackend::new();
    let ioctl = Ioctl::with_backend(backend.clone());
    let too_wide = IoctlData::Int(1i128 << 64);

    let call = ioctl.call(1, 1, too_wide.clone()).await.unwrap_err();
    let blocking = ioctl.blocking(1, 1, too_wide).await.unwrap_err();
    let json = ioctl
        .batch_json(&serde_json::json!([[1, 1], [1, 2, "not a pointer"]]))
        .await
        .unwrap_err();

    assert!(matches!(call, IoctlError::InvalidArgument(_)));
    assert!(matches!(blocking, IoctlError::InvalidArgument(_)));
    assert_eq!(json.to_string(), "Invalid argument: unsupported ioctl pointer value");
    assert_eq!(backend.invocation_count(), 0);
    assert_eq!(ioctl.stats().invalid_arguments, 3);
}

#[tokio::test]
async fn test_errno_names_in_errors() {
    let backend = ScriptedBackend::new();
    backend
        .on(1, 1, RawOutcome::failure(libc::EINVAL))
        .on(1, 2, RawOutcome::failure(31_337));
    let ioctl = Ioctl::with_backend(backend);

    let known = ioctl.call(1, 1, ()).await.unwrap_err();
    let unknown = ioctl.call(1, 2, ()).await.unwrap_err();

    let known = known.as_call_error().unwrap();
    assert_eq!(known.name.as_deref(), Some("EINVAL"));
    assert_eq!(known.code().as_str(), "EINVAL");

    let unknown = unknown.as_call_error().unwrap();
    assert_eq!(unknown.name, None);
    assert_eq!(unknown.code().as_str(), "31337");
    assert_eq!(unknown.errno, 31_337);
}

#[tokio::test]
async fn test_blocking_matches_batch_of_one() {
    let backend = ScriptedBackend::new();
    backend
        .on(4, 1, RawOutcome::success(99))
        .on(4, 2, RawOutcome::failure(libc::EBADF));
    let ioctl = Ioctl::with_backend(backend);

    for request in [1, 2] {
        let via_blocking = ioctl.blocking(4, request, 5u32).await;
        let via_batch = ioctl
            .batch([CallDescriptor::new(4, request, 5u32)])
            .await
            .map(|mut values| values.remove(0));

        match (via_blocking, via_batch) {
            (Ok(a), Ok(b)) => assert_eq!(a, b),
            (Err(a), Err(b)) => {
                assert_eq!(a.as_call_error(), b.as_call_error());
                assert_eq!(a.to_string(), b.to_string());
            }
            (a, b) => panic!("outcomes diverged: {:?} vs {:?}", a, b),
        }
    }
}

#[tokio::test]
async fn test_blocking_uses_dedicated_thread() {
    let backend = ScriptedBackend::new();
    let ioctl = Ioctl::with_backend(backend.clone());

    ioctl.blocking(1, 1, ()).await.unwrap();
    ioctl.call(1, 2, ()).await.unwrap();

    let threads: Vec<_> = backend.invocations().into_iter().map(|i| i.thread).collect();
    assert_eq!(threads[0].as_deref(), Some("ioctl-blocking"));
    assert_ne!(threads[1].as_deref(), Some("ioctl-blocking"));

    let stats = ioctl.stats();
    assert_eq!(stats.blocking_calls, 1);
    assert_eq!(stats.batches, 1);
}

#[tokio::test]
async fn test_buffer_is_shared_by_reference() {
    let backend = ScriptedBackend::new();
    backend.fill(0x77, &[1, 2, 3, 4]);
    let ioctl = Ioctl::with_backend(backend.clone());

    let buffer = IoctlBuffer::zeroed(4);
    ioctl.call(5, 0x77, &buffer).await.unwrap();
    assert_eq!(buffer.to_vec(), vec![1, 2, 3, 4]);

    let other = IoctlBuffer::zeroed(4);
    ioctl.blocking(5, 0x77, &other).await.unwrap();
    assert_eq!(other.to_vec(), vec![1, 2, 3, 4]);

    assert_eq!(
        backend.invocations()[0].arg,
        RawArgument::Address(buffer.address())
    );
}

#[tokio::test]
async fn test_batch_json_dispatches() {
    let backend = ScriptedBackend::new();
    let ioctl = Ioctl::with_backend(backend.clone());

    let values = ioctl
        .batch_json(&serde_json::json!([[1, 10], [2, 20, null], [3, 30, 4096]]))
        .await
        .unwrap();

    assert_eq!(values, vec![10, 20, 30]);
    assert_eq!(backend.invocations()[2].arg, RawArgument::Value(4096));
}

#[tokio::test]
async fn test_worker_death_is_submission_error() {
    let ioctl = Ioctl::with_backend(Arc::new(PanickingBackend));

    let pooled = ioctl.call(1, 1, ()).await.unwrap_err();
    let dedicated = ioctl.blocking(1, 1, ()).await.unwrap_err();

    assert!(matches!(pooled, IoctlError::Submission(_)), "got {:?}", pooled);
    assert!(matches!(dedicated, IoctlError::Submission(_)), "got {:?}", dedicated);
    assert!(pooled.as_call_error().is_none());
    assert_eq!(ioctl.stats().submission_failures, 2);
    assert_eq!(ioctl.stats().kernel_failures, 0);

    let deadline = Instant::now() + Duration::from_secs(2);
    while ioctl.stats().live_dedicated_threads > 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(ioctl.stats().live_dedicated_threads, 0);
}
