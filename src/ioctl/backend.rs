/*!
 * Foreign Call Adapter
 * The single seam between the dispatchers and the kernel
 */

use super::argument::RawArgument;
use crate::core::{RawFd, Request};
use serde::{Deserialize, Serialize};

/// Raw result pair reported by one ioctl invocation
///
/// Follows the POSIX convention: `return_value == -1` signals failure and
/// `errno` holds the cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOutcome {
    pub errno: i32,
    pub return_value: i64,
}

impl RawOutcome {
    pub fn success(return_value: i64) -> Self {
        Self {
            errno: 0,
            return_value,
        }
    }

    pub fn failure(errno: i32) -> Self {
        Self {
            errno,
            return_value: -1,
        }
    }

    /// Success iff no errno was reported and the sentinel was not returned
    #[inline]
    pub fn is_success(&self) -> bool {
        self.errno == 0 && self.return_value != -1
    }
}

/// Executes one ioctl
///
/// Always returns a pair; failures travel through `errno`. Implementations are
/// stateless from the dispatchers' point of view and may be invoked from any
/// thread, including several at once.
#[cfg_attr(test, mockall::automock)]
pub trait IoctlBackend: Send + Sync + 'static {
    fn invoke(&self, fd: RawFd, request: Request, arg: RawArgument) -> RawOutcome;
}

/// Backend calling the platform's `ioctl(2)`
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBackend;

#[cfg(unix)]
impl IoctlBackend for SystemBackend {
    fn invoke(&self, fd: RawFd, request: Request, arg: RawArgument) -> RawOutcome {
        use nix::libc;

        // SAFETY: the kernel owns the interpretation of `request`. Addresses come
        // from an IoctlBuffer that the dispatcher keeps alive until this returns.
        let ret = unsafe {
            match arg {
                RawArgument::Value(value) => libc::ioctl(fd, request as _, value as libc::c_ulong),
                RawArgument::Address(addr) => {
                    libc::ioctl(fd, request as _, addr as *mut libc::c_void)
                }
            }
        };

        if ret == -1 {
            RawOutcome::failure(std::io::Error::last_os_error().raw_os_error().unwrap_or(0))
        } else {
            RawOutcome::success(ret as i64)
        }
    }
}
