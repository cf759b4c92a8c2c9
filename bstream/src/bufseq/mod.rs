//! Backends over a sequence of equally sized buffer segments.
//!
//! Writing never moves existing bytes: when a segment fills up the sink
//! moves on to the next one, allocating it if needed. Position `p` lives in
//! segment `p / segment_capacity` at index `p % segment_capacity`.

pub mod sink;
pub mod source;

pub use sink::{BufseqSink, HeapSegments, SegmentAllocator, SinkSegments};
pub use source::{BufseqSource, SourceSegments};

/// Segment capacity used when none is given.
pub const DEFAULT_SEGMENT_SIZE: usize = 16 * 1024;

/// Segment count limit used when none is given.
pub const DEFAULT_MAX_SEGMENTS: usize = 1 << 16;
