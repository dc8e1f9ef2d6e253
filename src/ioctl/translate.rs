/*!
 * Error Translator
 * Maps a raw `(errno, return_value)` pair onto success or a structured error
 */

use super::backend::RawOutcome;
use crate::core::{CallError, RawFd, Request};

/// Decide the outcome of one call
///
/// Success iff `errno == 0` and `return_value != -1`. Pure and deterministic.
#[inline]
pub fn translate(fd: RawFd, request: Request, outcome: RawOutcome) -> Result<i64, CallError> {
    if outcome.is_success() {
        Ok(outcome.return_value)
    } else {
        Err(CallError::new(fd, request, outcome.errno))
    }
}
