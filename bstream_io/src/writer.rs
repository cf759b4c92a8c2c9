//! Write to a bstream sink through `embedded_io` or `std::io`.
//!
//! # Example
//! ```
//! use bstream::{BufferSink, ByteOrder};
//! use bstream_io::SinkWriter;
//! use embedded_io::Write;
//!
//! let mut writer = SinkWriter::new(BufferSink::with_order(ByteOrder::BigEndian));
//! writer.write_all(b"Hello, world!").unwrap();
//! writer.flush().unwrap();
//! assert_eq!(writer.get_ref().get_buffer(), b"Hello, world!");
//! ```

use bstream::{Offset, SeekAnchor, Sink, SinkBackend};

use crate::error_mapping::StreamIoError;

pub struct SinkWriter<B: SinkBackend> {
    sink: Sink<B>,
}

impl<B: SinkBackend> SinkWriter<B> {
    #[must_use]
    pub fn new(sink: Sink<B>) -> Self {
        Self { sink }
    }

    #[must_use]
    pub fn get_ref(&self) -> &Sink<B> {
        &self.sink
    }

    pub fn get_mut(&mut self) -> &mut Sink<B> {
        &mut self.sink
    }

    #[must_use]
    pub fn into_inner(self) -> Sink<B> {
        self.sink
    }
}

pub(crate) fn embedded_seek(pos: embedded_io::SeekFrom) -> (Offset, SeekAnchor) {
    match pos {
        embedded_io::SeekFrom::Start(n) => (Offset::try_from(n).unwrap_or(Offset::MAX), SeekAnchor::Begin),
        embedded_io::SeekFrom::End(n) => (n, SeekAnchor::End),
        embedded_io::SeekFrom::Current(n) => (n, SeekAnchor::Current),
    }
}

pub(crate) fn std_seek(pos: std::io::SeekFrom) -> (Offset, SeekAnchor) {
    match pos {
        std::io::SeekFrom::Start(n) => (Offset::try_from(n).unwrap_or(Offset::MAX), SeekAnchor::Begin),
        std::io::SeekFrom::End(n) => (n, SeekAnchor::End),
        std::io::SeekFrom::Current(n) => (n, SeekAnchor::Current),
    }
}

impl<B: SinkBackend> embedded_io::ErrorType for SinkWriter<B> {
    type Error = StreamIoError;
}

impl<B: SinkBackend> embedded_io::Write for SinkWriter<B> {
    fn write(&mut self, buf: &[u8]) -> core::result::Result<usize, Self::Error> {
        self.sink.putn(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(self.sink.flush()?)
    }
}

impl<B: SinkBackend> embedded_io::Seek for SinkWriter<B> {
    fn seek(&mut self, pos: embedded_io::SeekFrom) -> core::result::Result<u64, Self::Error> {
        let (offset, anchor) = embedded_seek(pos);
        Ok(self.sink.seek(offset, anchor)?)
    }
}

impl<B: SinkBackend> std::io::Write for SinkWriter<B> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.sink.putn(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(self.sink.flush()?)
    }
}

impl<B: SinkBackend> std::io::Seek for SinkWriter<B> {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        let (offset, anchor) = std_seek(pos);
        Ok(self.sink.seek(offset, anchor)?)
    }
}

impl<B: SinkBackend + core::fmt::Debug> core::fmt::Debug for SinkWriter<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SinkWriter").field("sink", &self.sink).finish()
    }
}
