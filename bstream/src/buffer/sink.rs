//! Sink over one contiguous `Vec<u8>`.
//!
//! The window is the whole vector and `base_offset` is always 0. A growable
//! buffer reallocates on overflow to 3/2 of what the write needs, up to a
//! maximum ([`MAX_BUFFER_CAPACITY`] unless set lower); a fixed buffer reports
//! `CapacityExceeded` instead. Allocation failures are reported the same way.

use bytes::Bytes;

use super::{DEFAULT_BUFFER_SIZE, MAX_BUFFER_CAPACITY};
use crate::error::StreamError;
use crate::sink::{Sink, SinkBackend, SinkCursor};
use crate::types::{ByteOrder, Position};

/// Memory backend for [`BufferSink`].
#[derive(Debug)]
pub struct SinkBuf {
    buf: Vec<u8>,
    growable: bool,
    max_capacity: usize,
}

pub type BufferSink = Sink<SinkBuf>;

impl SinkBuf {
    fn limit(&self) -> usize {
        if self.growable {
            self.max_capacity
        } else {
            self.buf.len()
        }
    }

    fn grow(&mut self, needed: usize) -> Result<(), StreamError> {
        let limit = self.limit();
        let exceeded = || StreamError::CapacityExceeded {
            requested: needed as u64,
            limit: limit as u64,
        };
        if needed > limit {
            return Err(exceeded());
        }
        let len = self.buf.len();
        let cushioned = needed.saturating_add(needed / 2).min(limit);
        let new_len = if self.buf.try_reserve_exact(cushioned - len).is_ok() {
            cushioned
        } else if self.buf.try_reserve_exact(needed - len).is_ok() {
            needed
        } else {
            log::debug!("buffer sink: cannot allocate {needed} bytes");
            return Err(exceeded());
        };
        self.buf.resize(new_len, 0);
        Ok(())
    }
}

impl SinkBackend for SinkBuf {
    fn window(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    fn overflow(&mut self, cursor: &mut SinkCursor, requested: usize) -> Result<(), StreamError> {
        let needed = cursor.next().saturating_add(requested);
        if needed > self.buf.len() {
            self.grow(needed)?;
        }
        cursor.set_end(self.buf.len());
        Ok(())
    }

    fn jump(&mut self, cursor: &mut SinkCursor, target: Position) -> Result<(), StreamError> {
        let index = usize::try_from(target).map_err(|_| StreamError::CapacityExceeded {
            requested: target,
            limit: self.limit() as u64,
        })?;
        if index > self.buf.len() {
            self.grow(index)?;
        }
        let watermark = usize::try_from(cursor.high_watermark()).unwrap_or(usize::MAX);
        if index > watermark {
            self.buf[watermark..index].fill(0);
        }
        cursor.set_window(0, index, self.buf.len());
        Ok(())
    }

    fn is_valid_position(&self, _cursor: &SinkCursor, pos: Position) -> bool {
        pos <= self.limit() as Position
    }
}

impl Sink<SinkBuf> {
    /// Growable buffer sink with `capacity` bytes preallocated.
    #[must_use]
    pub fn new(capacity: usize, order: ByteOrder) -> Self {
        Self::from_vec(vec![0; capacity], order)
    }

    /// Growable buffer sink with the default capacity.
    #[must_use]
    pub fn with_order(order: ByteOrder) -> Self {
        Self::new(DEFAULT_BUFFER_SIZE, order)
    }

    /// Sink that fails with `CapacityExceeded` instead of growing.
    #[must_use]
    pub fn fixed(capacity: usize, order: ByteOrder) -> Self {
        let backend = SinkBuf {
            buf: vec![0; capacity],
            growable: false,
            max_capacity: capacity,
        };
        Self::with_window(backend, order, capacity)
    }

    /// Growable sink writing over an existing vector from position 0.
    ///
    /// The vector's spare capacity becomes part of the window; its old
    /// contents are not part of the stream.
    #[must_use]
    pub fn from_vec(mut buf: Vec<u8>, order: ByteOrder) -> Self {
        buf.resize(buf.capacity(), 0);
        let end = buf.len();
        let backend = SinkBuf {
            buf,
            growable: true,
            max_capacity: MAX_BUFFER_CAPACITY,
        };
        Self::with_window(backend, order, end)
    }

    /// Cap growth at `max_capacity` bytes.
    #[must_use]
    pub fn with_max_capacity(mut self, max_capacity: usize) -> Self {
        let backend = self.backend_mut();
        backend.max_capacity = max_capacity.max(backend.buf.len());
        self
    }

    /// Bytes currently allocated.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.backend().buf.len()
    }

    /// The written content, `size()` bytes long.
    #[must_use]
    pub fn get_buffer(&self) -> &[u8] {
        let size = usize::try_from(self.size()).unwrap_or(usize::MAX);
        let buf = &self.backend().buf;
        &buf[..size.min(buf.len())]
    }

    /// Mutable view of the written content.
    pub fn get_buffer_mut(&mut self) -> &mut [u8] {
        let size = usize::try_from(self.size()).unwrap_or(usize::MAX);
        let buf = &mut self.backend_mut().buf;
        let len = size.min(buf.len());
        &mut buf[..len]
    }

    /// Drop the content and start over at position 0, keeping the
    /// allocation.
    pub fn clear(&mut self) {
        let end = self.capacity();
        self.reset_cursor(end);
    }

    /// Take the written content out of the sink, leaving it empty with no
    /// allocation.
    pub fn release_buffer(&mut self) -> Vec<u8> {
        let size = usize::try_from(self.size()).unwrap_or(usize::MAX);
        let mut buf = std::mem::take(&mut self.backend_mut().buf);
        buf.truncate(size);
        self.reset_cursor(0);
        buf
    }

    /// As [`Sink::release_buffer`], as a shareable buffer.
    pub fn release_bytes(&mut self) -> Bytes {
        Bytes::from(self.release_buffer())
    }
}

impl Default for Sink<SinkBuf> {
    fn default() -> Self {
        Self::with_order(ByteOrder::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SeekAnchor;

    #[test]
    fn test_growth_keeps_content() {
        let mut sink = BufferSink::new(4, ByteOrder::BigEndian);
        sink.putn(b"hello world").unwrap();
        assert_eq!(sink.get_buffer(), b"hello world");
        assert!(sink.capacity() >= 11);
    }

    #[test]
    fn test_cushion_is_three_halves() {
        let mut sink = BufferSink::new(0, ByteOrder::BigEndian);
        sink.putn(&[1; 10]).unwrap();
        assert_eq!(sink.capacity(), 15);
    }

    #[test]
    fn test_max_capacity() {
        let mut sink = BufferSink::new(4, ByteOrder::BigEndian).with_max_capacity(6);
        sink.putn(b"abcdef").unwrap();
        let err = sink.put(b'g').unwrap_err();
        assert!(matches!(err, StreamError::CapacityExceeded { limit: 6, .. }));
        assert_eq!(sink.get_buffer(), b"abcdef");
    }

    #[test]
    fn test_fixed_rejects_seek_past_capacity() {
        let mut sink = BufferSink::fixed(8, ByteOrder::BigEndian);
        assert!(sink.seek(9, SeekAnchor::Begin).is_err());
        assert_eq!(sink.seek(8, SeekAnchor::Begin).unwrap(), 8);
    }

    #[test]
    fn test_seek_beyond_memory_fails_cleanly() {
        let mut sink = BufferSink::new(16, ByteOrder::BigEndian);
        sink.put(7).unwrap();
        match sink.seek(i64::MAX, SeekAnchor::Begin) {
            Ok(_) => {
                let err = sink.put(1).expect_err("Should refuse to allocate");
                assert!(matches!(err, StreamError::CapacityExceeded { .. }));
            }
            Err(err) => assert!(matches!(err, StreamError::InvalidSeek { .. })),
        }

        sink.seek(1, SeekAnchor::Begin).unwrap();
        sink.put(8).unwrap();
        assert_eq!(sink.get_buffer(), &[7, 8]);
    }

    #[test]
    fn test_seek_past_max_capacity_is_invalid() {
        let mut sink = BufferSink::new(4, ByteOrder::BigEndian).with_max_capacity(32);
        assert!(matches!(
            sink.seek(33, SeekAnchor::Begin),
            Err(StreamError::InvalidSeek { .. })
        ));
        assert_eq!(sink.seek(32, SeekAnchor::Begin).unwrap(), 32);
        assert!(matches!(
            sink.put(1),
            Err(StreamError::CapacityExceeded { limit: 32, .. })
        ));
    }

    #[test]
    fn test_jump_zero_fills_stale_bytes() {
        let mut sink = BufferSink::new(16, ByteOrder::BigEndian);
        sink.putn(&[0xaa; 8]).unwrap();
        sink.clear();
        sink.put(1).unwrap();
        sink.seek(4, SeekAnchor::Current).unwrap();
        sink.put(2).unwrap();
        assert_eq!(sink.get_buffer(), &[1, 0, 0, 0, 0, 2]);
    }

    #[test]
    fn test_release_buffer_empties_sink() {
        let mut sink = BufferSink::new(16, ByteOrder::BigEndian);
        sink.putn(b"abc").unwrap();
        assert_eq!(sink.release_buffer(), b"abc");
        assert_eq!(sink.size(), 0);
        assert_eq!(sink.capacity(), 0);
        sink.putn(b"de").unwrap();
        assert_eq!(sink.get_buffer(), b"de");
    }
}
