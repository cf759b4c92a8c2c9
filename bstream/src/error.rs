//! The stream error type.
//!
//! Every fallible operation returns `Result<_, StreamError>`. Callers that
//! prefer to raise use `?`, including into `std::io::Result` through the
//! `From<StreamError> for std::io::Error` conversion. [`StreamError::code`]
//! gives the category-qualified [`ErrorCode`] of any variant, which is what
//! crosses serialization boundaries.

use std::io;

use crate::error_category::{
    ErrorCode, StreamErrc, GENERIC_INVALID_SEEK, GENERIC_IO_ERROR,
};
use crate::types::{Offset, PolyTag, SeekAnchor};

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("read past end of stream")]
    ReadPastEndOfStream,

    #[error("invalid seek: offset {offset} from {anchor:?}")]
    InvalidSeek { offset: Offset, anchor: SeekAnchor },

    #[error("cannot downcast type tag {from} to type tag {to}")]
    InvalidPtrDowncast { from: PolyTag, to: PolyTag },

    #[error("type `{0}` is not registered in the stream context")]
    UnregisteredType(&'static str),

    #[error("invalid type tag {0}")]
    InvalidTag(PolyTag),

    #[error("type tag {0} names an abstract type")]
    AbstractNonPolyClass(PolyTag),

    #[error("capacity exceeded: {requested} bytes requested, limit is {limit}")]
    CapacityExceeded { requested: u64, limit: u64 },

    #[error("stream is not open")]
    NotOpen,

    #[error("invalid error category: {0}")]
    InvalidErrCategory(String),

    #[error("type error: {0}")]
    TypeError(String),

    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Code(ErrorCode),
}

impl StreamError {
    /// Category-qualified code of this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ReadPastEndOfStream => StreamErrc::ReadPastEndOfStream.into(),
            Self::InvalidSeek { .. } => ErrorCode::generic(GENERIC_INVALID_SEEK),
            Self::InvalidPtrDowncast { .. } => StreamErrc::InvalidPtrDowncast.into(),
            Self::UnregisteredType(_) => StreamErrc::UnregisteredType.into(),
            Self::InvalidTag(_) => StreamErrc::InvalidTag.into(),
            Self::AbstractNonPolyClass(_) => StreamErrc::AbstractNonPolyClass.into(),
            Self::CapacityExceeded { .. } => StreamErrc::CapacityExceeded.into(),
            Self::NotOpen => StreamErrc::NotOpen.into(),
            Self::InvalidErrCategory(_) => StreamErrc::InvalidErrCategory.into(),
            Self::TypeError(_) => StreamErrc::TypeError.into(),
            Self::InvalidState(_) => StreamErrc::InvalidState.into(),
            Self::InvalidOperation(_) | Self::Config(_) => StreamErrc::InvalidOperation.into(),
            Self::Io(e) => match e.raw_os_error() {
                Some(errno) => ErrorCode::system(errno),
                None => ErrorCode::generic(GENERIC_IO_ERROR),
            },
            Self::Code(code) => *code,
        }
    }

    /// Whether this error means the source ran out of bytes.
    #[must_use]
    pub fn is_end_of_stream(&self) -> bool {
        self.code().is(StreamErrc::ReadPastEndOfStream)
    }
}

impl From<StreamErrc> for StreamError {
    fn from(errc: StreamErrc) -> Self {
        match errc {
            StreamErrc::ReadPastEndOfStream => Self::ReadPastEndOfStream,
            StreamErrc::NotOpen => Self::NotOpen,
            other => Self::Code(other.into()),
        }
    }
}

impl From<ErrorCode> for StreamError {
    fn from(code: ErrorCode) -> Self {
        Self::Code(code)
    }
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        let kind = match err {
            // Keep the OS error as-is so `raw_os_error` survives.
            StreamError::Io(inner) => return inner,
            StreamError::ReadPastEndOfStream => io::ErrorKind::UnexpectedEof,
            StreamError::InvalidSeek { .. } => io::ErrorKind::InvalidInput,
            StreamError::CapacityExceeded { .. } => io::ErrorKind::OutOfMemory,
            StreamError::NotOpen => io::ErrorKind::NotConnected,
            StreamError::TypeError(_) | StreamError::Config(_) => io::ErrorKind::InvalidData,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
