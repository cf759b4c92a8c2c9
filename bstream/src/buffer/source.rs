//! Sources over one contiguous in-memory buffer.
//!
//! [`BufferSource`] owns a reference-counted [`Bytes`] and hands out
//! zero-copy shared slices of it. [`SliceSource`] reads a borrowed slice.

use std::ops::Range;

use bytes::Bytes;

use crate::source::{Source, SourceBackend};
use crate::types::ByteOrder;

/// Memory backend for [`BufferSource`].
#[derive(Debug, Default)]
pub struct SourceBuf {
    data: Bytes,
}

pub type BufferSource = Source<SourceBuf>;

impl SourceBackend for SourceBuf {
    fn window(&self) -> &[u8] {
        &self.data
    }

    fn share(&self, range: Range<usize>) -> Option<Bytes> {
        Some(self.data.slice(range))
    }
}

impl Source<SourceBuf> {
    #[must_use]
    pub fn new(data: impl Into<Bytes>, order: ByteOrder) -> Self {
        let data = data.into();
        let end = data.len();
        Self::with_window(SourceBuf { data }, order, end)
    }

    /// The whole underlying buffer, independent of the read position.
    #[must_use]
    pub fn get_buffer(&self) -> &Bytes {
        &self.backend().data
    }

    /// Take the underlying buffer, leaving the source empty.
    pub fn release_buffer(&mut self) -> Bytes {
        let (cursor, backend) = self.parts_mut();
        cursor.set_window(0, 0, 0);
        std::mem::take(&mut backend.data)
    }
}

/// Borrowing backend for [`SliceSource`].
#[derive(Debug)]
pub struct SliceBuf<'a> {
    data: &'a [u8],
}

pub type SliceSource<'a> = Source<SliceBuf<'a>>;

impl SourceBackend for SliceBuf<'_> {
    fn window(&self) -> &[u8] {
        self.data
    }
}

impl<'a> Source<SliceBuf<'a>> {
    #[must_use]
    pub fn new(data: &'a [u8], order: ByteOrder) -> Self {
        Self::with_window(SliceBuf { data }, order, data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamError;
    use crate::types::SeekAnchor;
    use std::borrow::Cow;

    #[test]
    fn test_shared_slice_is_zero_copy() {
        let data = Bytes::from_static(b"0123456789");
        let mut source = BufferSource::new(data.clone(), ByteOrder::BigEndian);
        source.seek(2, SeekAnchor::Begin).unwrap();
        let part = source.get_shared_slice(4).unwrap();
        assert_eq!(&part[..], b"2345");
        assert_eq!(part.as_ptr(), data[2..].as_ptr());
        assert_eq!(source.position(), 6);
    }

    #[test]
    fn test_slice_source_borrows() {
        let data = [1u8, 2, 3, 4];
        let mut source = SliceSource::new(&data, ByteOrder::BigEndian);
        assert!(matches!(source.get_slice(3).unwrap(), Cow::Borrowed(&[1, 2, 3])));
        assert_eq!(source.remaining(), 1);
        assert!(matches!(
            source.get_slice(2),
            Err(StreamError::ReadPastEndOfStream)
        ));
    }

    #[test]
    fn test_release_buffer() {
        let mut source = BufferSource::new(vec![9u8; 3], ByteOrder::BigEndian);
        assert_eq!(source.release_buffer().len(), 3);
        assert_eq!(source.size(), 0);
        assert!(source.get().is_err());
    }
}
