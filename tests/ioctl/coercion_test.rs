/*!
 * Argument Coercion Tests
 * Public coercion rules and what reaches the backend
 */

use super::support::ScriptedBackend;
use async_ioctl::ioctl::coerce;
use async_ioctl::{Ioctl, IoctlBuffer, IoctlData, IoctlError, RawArgument};
use proptest::prelude::*;
use serde_json::json;

#[test]
fn test_absent_forms() {
    for data in [IoctlData::Absent, IoctlData::from(()), IoctlData::from(None::<i64>)] {
        assert_eq!(coerce(&data).unwrap(), RawArgument::Value(0));
    }
}

#[test]
fn test_optional_value_forwards() {
    assert_eq!(coerce(&Some(12u16).into()).unwrap(), RawArgument::Value(12));
}

#[test]
fn test_rejection_message() {
    let err = IoctlData::from_json(&json!("0x5401")).unwrap_err();
    assert_eq!(err.to_string(), "Invalid argument: unsupported ioctl pointer value");
}

#[test]
fn test_view_rejects_overflowing_window() {
    let buffer = IoctlBuffer::zeroed(8);
    assert!(matches!(buffer.view(4, 8), Err(IoctlError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_view_address_reaches_backend() {
    let backend = ScriptedBackend::new();
    backend.fill(0x42, &[0xAA, 0xBB]);
    let ioctl = Ioctl::with_backend(backend.clone());

    let buffer = IoctlBuffer::zeroed(6);
    let view = buffer.view(2, 2).unwrap();
    ioctl.call(1, 0x42, view.clone()).await.unwrap();

    assert_eq!(
        backend.invocations()[0].arg,
        RawArgument::Address(buffer.address() + 2)
    );
    assert_eq!(view.to_vec(), vec![0xAA, 0xBB]);
    assert_eq!(buffer.to_vec(), vec![0, 0, 0xAA, 0xBB, 0, 0]);
}

#[tokio::test]
async fn test_buffer_outlives_caller_handle() {
    let backend = ScriptedBackend::new();
    backend.fill(0x43, &[7; 16]);
    let ioctl = Ioctl::with_backend(backend);

    // The dispatcher owns the only handle while the call runs
    let value = ioctl.blocking(1, 0x43, IoctlBuffer::zeroed(16)).await.unwrap();
    assert_eq!(value, 10);
}

proptest! {
    #[test]
    fn prop_json_integers_match_native(v in any::<i64>()) {
        let from_json = coerce(&IoctlData::from_json(&json!(v)).unwrap()).unwrap();
        prop_assert_eq!(from_json, coerce(&v.into()).unwrap());
    }

    #[test]
    fn prop_json_strings_rejected(s in ".*") {
        let rejected = matches!(
            IoctlData::from_json(&json!(s)),
            Err(IoctlError::InvalidArgument(_))
        );
        prop_assert!(rejected);
    }
}
