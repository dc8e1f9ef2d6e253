/*!
 * Call Descriptors
 * One `(fd, request, data)` triple, before and after coercion
 */

use super::argument::{coerce, IoctlData, RawArgument};
use crate::core::{IoctlResult, RawFd, Request};

/// A single ioctl as submitted by the caller
#[derive(Debug, Clone)]
pub struct CallDescriptor {
    pub fd: RawFd,
    pub request: Request,
    pub data: IoctlData,
}

impl CallDescriptor {
    pub fn new(fd: RawFd, request: Request, data: impl Into<IoctlData>) -> Self {
        Self {
            fd,
            request,
            data: data.into(),
        }
    }

    /// Descriptor without a data argument
    pub fn bare(fd: RawFd, request: Request) -> Self {
        Self::new(fd, request, IoctlData::Absent)
    }

    /// Coerce the argument, consuming the descriptor
    pub fn prepare(self) -> IoctlResult<PreparedCall> {
        let arg = coerce(&self.data)?;
        Ok(PreparedCall {
            fd: self.fd,
            request: self.request,
            arg,
            _data: self.data,
        })
    }
}

impl From<(RawFd, Request)> for CallDescriptor {
    fn from((fd, request): (RawFd, Request)) -> Self {
        Self::bare(fd, request)
    }
}

impl<D: Into<IoctlData>> From<(RawFd, Request, D)> for CallDescriptor {
    fn from((fd, request, data): (RawFd, Request, D)) -> Self {
        Self::new(fd, request, data)
    }
}

/// A coerced call ready for the backend
///
/// Owns the caller's argument so a referenced buffer outlives the kernel call.
#[derive(Debug)]
pub struct PreparedCall {
    pub fd: RawFd,
    pub request: Request,
    pub arg: RawArgument,
    _data: IoctlData,
}
