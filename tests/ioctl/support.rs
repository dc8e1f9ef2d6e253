/*!
 * Shared test backend
 * A scripted stand-in for the kernel that records every invocation
 */

#![allow(dead_code)]

use async_ioctl::{IoctlBackend, RawArgument, RawFd, RawOutcome, Request};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// What the backend saw for one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub fd: RawFd,
    pub request: Request,
    pub arg: RawArgument,
    pub thread: Option<String>,
}

#[derive(Default)]
pub struct ScriptedBackend {
    outcomes: Mutex<HashMap<(RawFd, Request), RawOutcome>>,
    fills: Mutex<HashMap<Request, Vec<u8>>>,
    delays: Mutex<HashMap<Request, Duration>>,
    invocations: Mutex<Vec<Invocation>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Script the outcome for one `(fd, request)` pair; unscripted calls return `fd * 10`
    pub fn on(&self, fd: RawFd, request: Request, outcome: RawOutcome) -> &Self {
        self.outcomes.lock().insert((fd, request), outcome);
        self
    }

    /// Write `bytes` through the address argument whenever `request` is issued
    pub fn fill(&self, request: Request, bytes: &[u8]) -> &Self {
        self.fills.lock().insert(request, bytes.to_vec());
        self
    }

    /// Sleep before answering `request`
    pub fn delay(&self, request: Request, delay: Duration) -> &Self {
        self.delays.lock().insert(request, delay);
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().len()
    }
}

impl IoctlBackend for ScriptedBackend {
    fn invoke(&self, fd: RawFd, request: Request, arg: RawArgument) -> RawOutcome {
        self.invocations.lock().push(Invocation {
            fd,
            request,
            arg,
            thread: thread::current().name().map(str::to_string),
        });

        let delay = self.delays.lock().get(&request).copied();
        if let Some(delay) = delay {
            thread::sleep(delay);
        }

        let fill = self.fills.lock().get(&request).cloned();
        if let (Some(bytes), RawArgument::Address(addr)) = (fill, arg) {
            // SAFETY: tests only script fills for requests issued with a buffer
            // at least as long as `bytes`
            unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), addr as *mut u8, bytes.len()) };
        }

        self.outcomes
            .lock()
            .get(&(fd, request))
            .copied()
            .unwrap_or_else(|| RawOutcome::success(fd as i64 * 10))
    }
}
