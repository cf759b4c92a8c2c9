//! File backends: one owned file descriptor plus one fixed-size buffer.
//!
//! Writes accumulate in the buffer and reach the file on flush as a single
//! positioned write. Seeking past the end of the file leaves a hole that is
//! read back as zeros.

pub mod sink;
pub mod source;

pub use sink::{FileSink, SinkFile};
pub use source::{FileSource, SourceFile};

/// Buffer size of file sinks and sources when none is given.
pub const DEFAULT_FILE_BUFFER_SIZE: usize = 16 * 1024;

/// How a file sink materializes the gap left by a write past the end of
/// the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HoleStrategy {
    /// Write zeros over the gap before the data that creates it.
    #[default]
    ZeroFill,
    /// Seek over the gap and let the file system create a sparse hole.
    Sparse,
}
