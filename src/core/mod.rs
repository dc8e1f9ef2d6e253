/*!
 * Core Module
 * Shared types, limits and error definitions
 */

pub mod errors;
pub mod limits;
pub mod types;

pub use errors::{errno_name, CallError, IoctlError, IoctlResult, SerializableCallError};
pub use types::{InlineString, RawFd, Request};
