/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::types::{InlineString, RawFd, Request};
use miette::Diagnostic;
use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Common result type for dispatch operations
pub type IoctlResult<T> = Result<T, IoctlError>;

/// Look up the platform's symbolic name for an errno value
///
/// Returns `None` for codes the platform table does not know, including `0`.
pub fn errno_name(code: i32) -> Option<InlineString> {
    match Errno::from_raw(code) {
        Errno::UnknownErrno => None,
        errno => Some(format!("{:?}", errno).into()),
    }
}

/// A kernel-reported ioctl failure
///
/// Carries the offending descriptor and request so that a failure inside a
/// batch can be traced back to the element that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallError {
    pub fd: RawFd,
    pub request: Request,
    pub errno: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<InlineString>,
}

impl CallError {
    /// Build an error, resolving the symbolic name from the errno table
    pub fn new(fd: RawFd, request: Request, errno: i32) -> Self {
        Self {
            fd,
            request,
            errno,
            name: errno_name(errno),
        }
    }

    /// Symbolic name if known, otherwise the decimal errno
    pub fn code(&self) -> InlineString {
        match &self.name {
            Some(name) => name.clone(),
            None => self.errno.to_string().into(),
        }
    }

    /// Human-readable message, identical to the `Display` output
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Convert into the flat shape handed to API consumers
    pub fn to_serializable(&self) -> SerializableCallError {
        SerializableCallError {
            message: self.message(),
            fd: self.fd,
            code: self.code(),
            errno: self.errno,
            request: self.request,
        }
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} running ioctl({}, {})",
            self.code(),
            self.fd,
            self.request
        )
    }
}

impl std::error::Error for CallError {}

/// Serializable error representation for API responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SerializableCallError {
    pub message: String,
    pub fd: RawFd,
    pub code: InlineString,
    pub errno: i32,
    pub request: Request,
}

impl From<&CallError> for SerializableCallError {
    fn from(err: &CallError) -> Self {
        err.to_serializable()
    }
}

/// Dispatch layer error with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum IoctlError {
    #[error("Invalid argument: {0}")]
    #[diagnostic(
        code(ioctl::invalid_argument),
        help("Pass nothing, an integer that fits in 64 bits, or an IoctlBuffer/BufferView.")
    )]
    InvalidArgument(InlineString),

    #[error(transparent)]
    #[diagnostic(
        code(ioctl::kernel_error),
        help("The kernel rejected the request. Check the descriptor and the request code.")
    )]
    Kernel(#[from] CallError),

    #[error("Submission failed: {0}")]
    #[diagnostic(
        code(ioctl::submission_failed),
        help("The worker pool or thread runtime refused the work. Check thread limits.")
    )]
    Submission(InlineString),
}

impl IoctlError {
    /// Shorthand for the rejection of an unrecognized `data` value
    pub fn unsupported_pointer() -> Self {
        IoctlError::InvalidArgument(super::limits::UNSUPPORTED_POINTER_MESSAGE.into())
    }

    /// The kernel failure, if this is one
    pub fn as_call_error(&self) -> Option<&CallError> {
        match self {
            IoctlError::Kernel(err) => Some(err),
            _ => None,
        }
    }
}
