/*!
 * ioctl Argument Coercion
 *
 * Normalizes the optional `data` argument into what the foreign call expects:
 * either a 64-bit value or the address of caller-owned memory.
 *
 * ## Buffers
 *
 * `IoctlBuffer` is fixed-length storage whose base address is captured once at
 * construction. The storage never reallocates, so the address stays valid for
 * as long as any clone of the buffer is alive. The dispatchers hold a clone for
 * the full duration of the kernel call and never lock, copy or interpret it.
 */

use crate::core::limits::MAX_SAFE_JSON_INTEGER;
use crate::core::{IoctlError, IoctlResult};
use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Caller-owned byte storage shared with the kernel by address
#[derive(Clone)]
pub struct IoctlBuffer {
    storage: Arc<RwLock<Box<[u8]>>>,
    base: usize,
    len: usize,
}

impl IoctlBuffer {
    /// Zero-filled buffer of `len` bytes
    pub fn zeroed(len: usize) -> Self {
        Self::from_vec(vec![0u8; len])
    }

    /// Take ownership of existing bytes without copying them
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        let storage = Arc::new(RwLock::new(bytes.into_boxed_slice()));
        // The address is taken after the box has reached its final place
        // SAFETY: `storage` was just created and no guard or other handle exists yet
        let base = unsafe { (*storage.data_ptr()).as_mut_ptr() } as usize;

        Self { storage, base, len }
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base address handed to the kernel
    pub fn address(&self) -> usize {
        self.base
    }

    /// Shared read access to the contents
    pub fn read(&self) -> MappedRwLockReadGuard<'_, [u8]> {
        RwLockReadGuard::map(self.storage.read(), |bytes| &**bytes)
    }

    /// Exclusive write access to the contents
    ///
    /// The guard exposes the slice only, so the storage can never be swapped out
    /// from under an address the kernel may be holding.
    pub fn write(&self) -> MappedRwLockWriteGuard<'_, [u8]> {
        RwLockWriteGuard::map(self.storage.write(), |bytes| &mut **bytes)
    }

    /// Copy the contents out
    pub fn to_vec(&self) -> Vec<u8> {
        self.read().to_vec()
    }

    /// Window of `len` bytes starting at `offset`
    pub fn view(&self, offset: usize, len: usize) -> IoctlResult<BufferView> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(BufferView {
                buffer: self.clone(),
                offset,
                len,
            }),
            _ => Err(IoctlError::InvalidArgument(
                format!(
                    "view {}..{} exceeds buffer of {} bytes",
                    offset,
                    offset.saturating_add(len),
                    self.len
                )
                .into(),
            )),
        }
    }

    /// Whether two handles share the same storage
    pub fn ptr_eq(&self, other: &IoctlBuffer) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }
}

impl fmt::Debug for IoctlBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoctlBuffer")
            .field("address", &format_args!("{:#x}", self.base))
            .field("len", &self.len)
            .finish()
    }
}

impl From<Vec<u8>> for IoctlBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_vec(bytes)
    }
}

/// A bounded window into an `IoctlBuffer`, passed to the kernel at its own offset
#[derive(Debug, Clone)]
pub struct BufferView {
    buffer: IoctlBuffer,
    offset: usize,
    len: usize,
}

impl BufferView {
    pub fn buffer(&self) -> &IoctlBuffer {
        &self.buffer
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Address of the first byte of the window
    pub fn address(&self) -> usize {
        self.buffer.address() + self.offset
    }

    /// Copy the windowed bytes out
    pub fn to_vec(&self) -> Vec<u8> {
        self.buffer.read()[self.offset..self.offset + self.len].to_vec()
    }
}

/// Caller-facing form of the optional `data` argument
#[derive(Debug, Clone, Default)]
pub enum IoctlData {
    /// No argument, passed as `0`
    #[default]
    Absent,
    /// Any caller integer, widened before range checking
    Int(i128),
    /// Address of a whole buffer
    Buffer(IoctlBuffer),
    /// Address of a window into a buffer
    View(BufferView),
}

impl IoctlData {
    /// Interpret a dynamically typed JSON value
    ///
    /// `null` is absent and integral numbers are values. Everything else is rejected.
    pub fn from_json(value: &Value) -> IoctlResult<Self> {
        match value {
            Value::Null => Ok(IoctlData::Absent),
            Value::Number(number) => {
                if let Some(v) = number.as_i64() {
                    Ok(IoctlData::Int(v as i128))
                } else if let Some(v) = number.as_u64() {
                    Ok(IoctlData::Int(v as i128))
                } else {
                    match number.as_f64() {
                        Some(v) if v.fract() == 0.0 && v.abs() <= MAX_SAFE_JSON_INTEGER => {
                            Ok(IoctlData::Int(v as i128))
                        }
                        _ => Err(IoctlError::unsupported_pointer()),
                    }
                }
            }
            _ => Err(IoctlError::unsupported_pointer()),
        }
    }

    /// Buffer kept alive by this argument, if it is passed by reference
    pub fn buffer(&self) -> Option<&IoctlBuffer> {
        match self {
            IoctlData::Buffer(buffer) => Some(buffer),
            IoctlData::View(view) => Some(view.buffer()),
            _ => None,
        }
    }
}

impl From<()> for IoctlData {
    fn from(_: ()) -> Self {
        IoctlData::Absent
    }
}

impl<T: Into<IoctlData>> From<Option<T>> for IoctlData {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl From<IoctlBuffer> for IoctlData {
    fn from(buffer: IoctlBuffer) -> Self {
        IoctlData::Buffer(buffer)
    }
}

impl From<&IoctlBuffer> for IoctlData {
    fn from(buffer: &IoctlBuffer) -> Self {
        IoctlData::Buffer(buffer.clone())
    }
}

impl From<BufferView> for IoctlData {
    fn from(view: BufferView) -> Self {
        IoctlData::View(view)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for IoctlData {
                fn from(value: $ty) -> Self {
                    IoctlData::Int(value as i128)
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, usize);

/// Representation handed to the foreign call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawArgument {
    /// Passed by value
    Value(u64),
    /// Passed by reference
    Address(usize),
}

impl RawArgument {
    /// The bits placed in the third ioctl argument
    pub fn bits(&self) -> u64 {
        match *self {
            RawArgument::Value(v) => v,
            RawArgument::Address(addr) => addr as u64,
        }
    }
}

/// Coerce a caller argument into its raw form
///
/// Integers are accepted anywhere in `i64::MIN..=u64::MAX`; negatives are
/// passed as their two's complement bits.
pub fn coerce(data: &IoctlData) -> IoctlResult<RawArgument> {
    match data {
        IoctlData::Absent => Ok(RawArgument::Value(0)),
        IoctlData::Int(v) => {
            if let Ok(unsigned) = u64::try_from(*v) {
                Ok(RawArgument::Value(unsigned))
            } else if let Ok(signed) = i64::try_from(*v) {
                Ok(RawArgument::Value(signed as u64))
            } else {
                Err(IoctlError::InvalidArgument(
                    format!("{} does not fit in 64 bits", v).into(),
                ))
            }
        }
        IoctlData::Buffer(buffer) => Ok(RawArgument::Address(buffer.address())),
        IoctlData::View(view) => Ok(RawArgument::Address(view.address())),
    }
}
