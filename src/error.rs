use alloc::{boxed::Box, string::ToString};
use core::fmt;

/// Errors raised while parsing, inspecting, or loading an ELF image.
///
/// Every variant carries a human-readable message describing what was
/// expected and what was found. Lookup operations signal absence with
/// `Ok(None)` rather than an error; an `Error` always means the request
/// itself could not be served.
#[derive(Debug)]
pub enum Error {
    /// The identification bytes or header fields do not describe a
    /// supported 32-bit ELF image.
    Format { msg: Box<str> },
    /// A table or entry extends past the mapped bounds of the file.
    Truncated { msg: Box<str> },
    /// The operation needs section data that header-only mode has not
    /// mapped yet.
    Mode { msg: Box<str> },
    /// The caller passed an index that is out of range for the table it
    /// addresses.
    Index { msg: Box<str> },
    /// A loadable segment could not be placed into memory.
    Load { msg: Box<str> },
    /// The underlying memory-mapping primitive failed.
    Mmap { msg: Box<str> },
    /// Reading from the underlying file failed.
    Io { msg: Box<str> },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Format { msg } => write!(f, "invalid ELF format: {msg}"),
            Error::Truncated { msg } => write!(f, "truncated ELF image: {msg}"),
            Error::Mode { msg } => write!(f, "unavailable in this access mode: {msg}"),
            Error::Index { msg } => write!(f, "index out of range: {msg}"),
            Error::Load { msg } => write!(f, "cannot load segments: {msg}"),
            Error::Mmap { msg } => write!(f, "memory mapping failed: {msg}"),
            Error::Io { msg } => write!(f, "io error: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

#[cold]
#[inline(never)]
pub(crate) fn format_error(msg: impl ToString) -> Error {
    Error::Format {
        msg: msg.to_string().into(),
    }
}

#[cold]
#[inline(never)]
pub(crate) fn truncated_error(msg: impl ToString) -> Error {
    Error::Truncated {
        msg: msg.to_string().into(),
    }
}

#[cold]
#[inline(never)]
pub(crate) fn mode_error(msg: impl ToString) -> Error {
    Error::Mode {
        msg: msg.to_string().into(),
    }
}

#[cold]
#[inline(never)]
pub(crate) fn index_error(msg: impl ToString) -> Error {
    Error::Index {
        msg: msg.to_string().into(),
    }
}

#[cold]
#[inline(never)]
pub(crate) fn load_error(msg: impl ToString) -> Error {
    Error::Load {
        msg: msg.to_string().into(),
    }
}

#[cold]
#[inline(never)]
pub(crate) fn map_error(msg: impl ToString) -> Error {
    Error::Mmap {
        msg: msg.to_string().into(),
    }
}

#[cold]
#[inline(never)]
pub(crate) fn io_error(msg: impl ToString) -> Error {
    Error::Io {
        msg: msg.to_string().into(),
    }
}
