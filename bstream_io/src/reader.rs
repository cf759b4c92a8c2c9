//! Read from a bstream source through `embedded_io` or `std::io`.
//!
//! # Example
//!
//! ```
//! use bstream::{BufferSource, ByteOrder};
//! use bstream_io::SourceReader;
//! use embedded_io::Read;
//!
//! let mut reader = SourceReader::new(BufferSource::new(&b"my stream"[..], ByteOrder::BigEndian));
//!
//! let mut buffer = Vec::new();
//! let mut chunk = [0u8; 4];
//! loop {
//!     let n = reader.read(&mut chunk).unwrap();
//!     if n == 0 {
//!         break;
//!     }
//!     buffer.extend_from_slice(&chunk[..n]);
//! }
//! assert_eq!(buffer, b"my stream");
//! ```

use bstream::{Source, SourceBackend};

use crate::error_mapping::StreamIoError;
use crate::writer::{embedded_seek, std_seek};

pub struct SourceReader<B: SourceBackend> {
    source: Source<B>,
}

impl<B: SourceBackend> SourceReader<B> {
    #[must_use]
    pub fn new(source: Source<B>) -> Self {
        Self { source }
    }

    #[must_use]
    pub fn get_ref(&self) -> &Source<B> {
        &self.source
    }

    pub fn get_mut(&mut self) -> &mut Source<B> {
        &mut self.source
    }

    #[must_use]
    pub fn into_inner(self) -> Source<B> {
        self.source
    }
}

impl<B: SourceBackend> embedded_io::ErrorType for SourceReader<B> {
    type Error = StreamIoError;
}

impl<B: SourceBackend> embedded_io::Read for SourceReader<B> {
    fn read(&mut self, buf: &mut [u8]) -> core::result::Result<usize, Self::Error> {
        Ok(self.source.read_some(buf)?)
    }
}

impl<B: SourceBackend> embedded_io::Seek for SourceReader<B> {
    fn seek(&mut self, pos: embedded_io::SeekFrom) -> core::result::Result<u64, Self::Error> {
        let (offset, anchor) = embedded_seek(pos);
        Ok(self.source.seek(offset, anchor)?)
    }
}

impl<B: SourceBackend> std::io::Read for SourceReader<B> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(self.source.read_some(buf)?)
    }
}

impl<B: SourceBackend> std::io::Seek for SourceReader<B> {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        let (offset, anchor) = std_seek(pos);
        Ok(self.source.seek(offset, anchor)?)
    }
}

impl<B: SourceBackend + core::fmt::Debug> core::fmt::Debug for SourceReader<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SourceReader").field("source", &self.source).finish()
    }
}
