//! Error mapping between stream errors, errno values and
//! `embedded_io::ErrorKind`.

use core::ffi::c_int;

use bstream::StreamError;

/// Convert errno to `embedded_io::ErrorKind`
#[must_use]
#[allow(clippy::match_same_arms)] // Common errno values are listed for documentation
pub fn errno_to_error_kind(errno: c_int) -> embedded_io::ErrorKind {
    match errno {
        1 | 13 => embedded_io::ErrorKind::PermissionDenied, // EPERM, EACCES
        2 => embedded_io::ErrorKind::NotFound,              // ENOENT
        4 => embedded_io::ErrorKind::Interrupted,           // EINTR
        9 | 22 | 29 => embedded_io::ErrorKind::InvalidInput, // EBADF, EINVAL, ESPIPE
        12 | 28 => embedded_io::ErrorKind::OutOfMemory,     // ENOMEM, ENOSPC (no space left)
        17 => embedded_io::ErrorKind::AlreadyExists,        // EEXIST
        24 => embedded_io::ErrorKind::Unsupported,          // EMFILE (too many open files)
        32 => embedded_io::ErrorKind::BrokenPipe,           // EPIPE
        // EIO, EAGAIN/EWOULDBLOCK
        5 | 11 => embedded_io::ErrorKind::Other,
        _ => embedded_io::ErrorKind::Other,
    }
}

/// Convert error kind to a static string description
#[must_use]
pub fn error_kind_to_str(kind: embedded_io::ErrorKind) -> &'static str {
    match kind {
        embedded_io::ErrorKind::NotFound => "not found",
        embedded_io::ErrorKind::PermissionDenied => "permission denied",
        embedded_io::ErrorKind::BrokenPipe => "broken pipe",
        embedded_io::ErrorKind::AlreadyExists => "already exists",
        embedded_io::ErrorKind::InvalidInput => "invalid input",
        embedded_io::ErrorKind::InvalidData => "invalid data",
        embedded_io::ErrorKind::TimedOut => "timed out",
        embedded_io::ErrorKind::Interrupted => "interrupted",
        embedded_io::ErrorKind::Unsupported => "unsupported",
        embedded_io::ErrorKind::OutOfMemory => "out of memory",
        embedded_io::ErrorKind::Other => "other error",
        _ => "unknown error",
    }
}

fn io_kind_to_error_kind(kind: std::io::ErrorKind) -> embedded_io::ErrorKind {
    match kind {
        std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
        std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
        std::io::ErrorKind::AlreadyExists => embedded_io::ErrorKind::AlreadyExists,
        std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
        std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
        std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
        std::io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
        std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
        std::io::ErrorKind::Unsupported => embedded_io::ErrorKind::Unsupported,
        std::io::ErrorKind::OutOfMemory => embedded_io::ErrorKind::OutOfMemory,
        _ => embedded_io::ErrorKind::Other,
    }
}

/// Kind of a stream error as seen by `embedded_io` callers.
#[must_use]
pub fn stream_error_kind(err: &StreamError) -> embedded_io::ErrorKind {
    match err {
        StreamError::Io(e) => match e.raw_os_error() {
            Some(errno) => errno_to_error_kind(errno),
            None => io_kind_to_error_kind(e.kind()),
        },
        StreamError::InvalidSeek { .. } => embedded_io::ErrorKind::InvalidInput,
        StreamError::CapacityExceeded { .. } => embedded_io::ErrorKind::OutOfMemory,
        StreamError::TypeError(_) | StreamError::Config(_) => embedded_io::ErrorKind::InvalidData,
        StreamError::NotOpen => embedded_io::ErrorKind::NotFound,
        _ => embedded_io::ErrorKind::Other,
    }
}

/// A [`StreamError`] carried through `embedded_io` traits. The message
/// leads with the error kind.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {inner}", kind = error_kind_to_str(stream_error_kind(.0)), inner = .0)]
pub struct StreamIoError(#[from] pub StreamError);

impl embedded_io::Error for StreamIoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        stream_error_kind(&self.0)
    }
}
