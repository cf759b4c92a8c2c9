//! Binary streams with explicit byte order.
//!
//! Byte-level [`Sink`]s and [`Source`]s run a cursor over a window supplied
//! by a backend: a memory buffer, a sequence of buffer segments, or a file.
//! On top of them, [`OBStream`] and [`IBStream`] write and read typed values,
//! including objects of polymorphic hierarchies registered in a
//! [`StreamContext`].

pub mod buffer;
pub mod bufseq;
pub mod context;
pub mod endian;
pub mod error;
pub mod error_category;
pub mod file;
pub mod ibstream;
pub mod obstream;
pub mod serialize;
pub mod sink;
pub mod source;
pub mod types;

pub use buffer::{BufferSink, BufferSource, SliceSource};
pub use bufseq::{BufseqSink, BufseqSource};
pub use context::{default_context, ContextBuilder, ContextOptions, StreamContext};
pub use endian::Numeric;
pub use error::StreamError;
pub use error_category::{
    ErrorCategory, ErrorCategoryContext, ErrorCode, StreamErrc, BSTREAM_CATEGORY, GENERIC_CATEGORY,
    SYSTEM_CATEGORY,
};
pub use file::{FileSink, FileSource, HoleStrategy};
pub use ibstream::IBStream;
pub use obstream::OBStream;
pub use serialize::{Deserialize, Polymorphic, Serialize};
pub use sink::{ByteSink, Sink, SinkBackend, SinkCursor};
pub use source::{ByteSource, Source, SourceBackend, SourceCursor};
pub use types::{ByteOrder, Offset, OpenMode, PolyTag, Position, SeekAnchor, INVALID_TAG};
