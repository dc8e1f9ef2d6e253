/*!
 * Core Types
 * Common types used across the dispatch layer
 */

/// File descriptor type as handed to the kernel
pub type RawFd = i32;

/// ioctl request code, always carried as 64 bits
pub type Request = u64;

/// Inline-optimized string for error names and short messages
///
/// Symbolic errno names (`EINVAL`, `ENOTTY`, ...) always fit inline.
pub type InlineString = smartstring::alias::String;
