//! Single contiguous in-memory buffer backends.

pub mod sink;
pub mod source;

pub use sink::{BufferSink, SinkBuf};
pub use source::{BufferSource, SliceBuf, SliceSource, SourceBuf};

/// Initial capacity of a buffer sink when none is given.
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

/// Upper bound on the size of a growable buffer sink.
pub const MAX_BUFFER_CAPACITY: usize = isize::MAX.unsigned_abs();
