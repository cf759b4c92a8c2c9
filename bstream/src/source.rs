//! Input cursor engine.
//!
//! A [`Source`] reads from a window supplied by its backend. When the window
//! is exhausted the backend's `underflow` hook maps the next one; a hook
//! that maps nothing signals the end of the stream.

use std::borrow::Cow;
use std::ops::Range;

use bytes::Bytes;

use crate::endian::{copy_ordered, is_reverse, Numeric};
use crate::error::StreamError;
use crate::sink::offset_from;
use crate::types::{ByteOrder, Offset, Position, SeekAnchor};

/// Position bookkeeping shared by every source backend.
#[derive(Debug, Clone)]
pub struct SourceCursor {
    base_offset: Position,
    next: usize,
    end: usize,
    reverse: bool,
}

impl SourceCursor {
    fn new(order: ByteOrder) -> Self {
        Self {
            base_offset: 0,
            next: 0,
            end: 0,
            reverse: is_reverse(order),
        }
    }

    #[must_use]
    pub fn base_offset(&self) -> Position {
        self.base_offset
    }

    #[must_use]
    pub fn next(&self) -> usize {
        self.next
    }

    #[must_use]
    pub fn end(&self) -> usize {
        self.end
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.base_offset + self.next as Position
    }

    #[must_use]
    pub fn available(&self) -> usize {
        self.end - self.next
    }

    /// Remap the window. Backends call this from their hooks.
    pub fn set_window(&mut self, base_offset: Position, next: usize, end: usize) {
        debug_assert!(next <= end, "inverted source window");
        self.base_offset = base_offset;
        self.next = next;
        self.end = end;
    }

    /// Move within the current window. Returns `false` if `pos` is outside.
    pub fn move_within_window(&mut self, pos: Position) -> bool {
        let Some(index) = pos
            .checked_sub(self.base_offset)
            .and_then(|i| usize::try_from(i).ok())
        else {
            return false;
        };
        if index > self.end {
            return false;
        }
        self.next = index;
        true
    }
}

/// Storage behind a [`Source`].
pub trait SourceBackend {
    /// The currently mapped window. Must be at least `cursor.end()` long.
    fn window(&self) -> &[u8];

    /// Map more bytes after an exhausted window and return how many are
    /// available. `Ok(0)` means end of stream.
    ///
    /// # Errors
    /// When the underlying read fails.
    fn underflow(&mut self, cursor: &mut SourceCursor) -> Result<usize, StreamError> {
        let _ = cursor;
        Ok(0)
    }

    /// Place the cursor at `pos`, already checked to be within `0..=size`.
    ///
    /// # Errors
    /// When the store cannot be positioned there.
    fn seek(&mut self, cursor: &mut SourceCursor, pos: Position) -> Result<(), StreamError> {
        if cursor.move_within_window(pos) {
            Ok(())
        } else {
            Err(StreamError::InvalidState("seek outside the mapped window"))
        }
    }

    fn size(&self, cursor: &SourceCursor) -> Position {
        cursor.base_offset() + cursor.end() as Position
    }

    /// Zero-copy view of a window range, if the backend shares its storage.
    fn share(&self, range: Range<usize>) -> Option<Bytes> {
        let _ = range;
        None
    }
}

/// Byte-oriented input stream over a backend.
pub struct Source<B: SourceBackend> {
    cursor: SourceCursor,
    order: ByteOrder,
    backend: B,
}

impl<B: SourceBackend> Source<B> {
    /// Wrap `backend` with an empty window; the first read calls
    /// `underflow` to map one.
    pub fn from_backend(backend: B, order: ByteOrder) -> Self {
        Self {
            cursor: SourceCursor::new(order),
            order,
            backend,
        }
    }

    pub(crate) fn with_window(backend: B, order: ByteOrder, end: usize) -> Self {
        let mut source = Self::from_backend(backend, order);
        source.cursor.set_window(0, 0, end);
        source
    }

    /// Read one byte.
    ///
    /// # Errors
    /// `ReadPastEndOfStream` at the end, or the underflow failure.
    pub fn get(&mut self) -> Result<u8, StreamError> {
        let byte = self.peek()?;
        self.cursor.next += 1;
        Ok(byte)
    }

    /// Next byte without consuming it.
    ///
    /// # Errors
    /// As [`Source::get`].
    pub fn peek(&mut self) -> Result<u8, StreamError> {
        if self.cursor.next >= self.cursor.end && self.underflow()? == 0 {
            return Err(StreamError::ReadPastEndOfStream);
        }
        Ok(self.backend.window()[self.cursor.next])
    }

    /// Fill `dst` completely.
    ///
    /// # Errors
    /// `ReadPastEndOfStream` if the stream ends first; the bytes read so far
    /// are consumed.
    pub fn getn(&mut self, dst: &mut [u8]) -> Result<usize, StreamError> {
        let mut done = 0;
        while done < dst.len() {
            if self.cursor.next >= self.cursor.end && self.underflow()? == 0 {
                return Err(StreamError::ReadPastEndOfStream);
            }
            done += self.copy_out(&mut dst[done..]);
        }
        Ok(done)
    }

    /// Read up to `dst.len()` bytes, `Ok(0)` at the end of the stream.
    ///
    /// # Errors
    /// The underflow failure.
    pub fn read_some(&mut self, dst: &mut [u8]) -> Result<usize, StreamError> {
        if dst.is_empty() {
            return Ok(0);
        }
        if self.cursor.next >= self.cursor.end && self.underflow()? == 0 {
            return Ok(0);
        }
        Ok(self.copy_out(dst))
    }

    /// Read a fixed-width number in the source's byte order.
    ///
    /// # Errors
    /// As [`Source::getn`].
    pub fn get_num<T: Numeric>(&mut self) -> Result<T, StreamError> {
        let size = std::mem::size_of::<T>();
        let mut bytes = T::Bytes::default();
        if self.cursor.end - self.cursor.next >= size {
            let next = self.cursor.next;
            copy_ordered(
                bytes.as_mut(),
                &self.backend.window()[next..next + size],
                self.cursor.reverse,
            );
            self.cursor.next += size;
            Ok(T::from_native_bytes(bytes))
        } else {
            self.getn(bytes.as_mut())?;
            let value = T::from_native_bytes(bytes);
            Ok(if self.cursor.reverse {
                value.swap_bytes()
            } else {
                value
            })
        }
    }

    /// `n` bytes, borrowed from the window when they are contiguous there.
    ///
    /// # Errors
    /// As [`Source::getn`].
    pub fn get_slice(&mut self, n: usize) -> Result<Cow<'_, [u8]>, StreamError> {
        if self.cursor.available() >= n {
            let start = self.cursor.next;
            self.cursor.next += n;
            return Ok(Cow::Borrowed(&self.backend.window()[start..start + n]));
        }
        let mut owned = vec![0u8; n];
        self.getn(&mut owned)?;
        Ok(Cow::Owned(owned))
    }

    /// `n` bytes as a reference-counted buffer; shares the backend's storage
    /// when it can.
    ///
    /// # Errors
    /// As [`Source::getn`].
    pub fn get_shared_slice(&mut self, n: usize) -> Result<Bytes, StreamError> {
        if self.cursor.available() >= n {
            let start = self.cursor.next;
            if let Some(shared) = self.backend.share(start..start + n) {
                self.cursor.next += n;
                return Ok(shared);
            }
        }
        let mut owned = vec![0u8; n];
        self.getn(&mut owned)?;
        Ok(Bytes::from(owned))
    }

    /// Move the read position.
    ///
    /// # Errors
    /// `InvalidSeek` if the target is outside `0..=size`, or the backend
    /// seek failure.
    pub fn seek(&mut self, offset: Offset, anchor: SeekAnchor) -> Result<Position, StreamError> {
        let origin = match anchor {
            SeekAnchor::Begin => 0,
            SeekAnchor::Current => self.position(),
            SeekAnchor::End => self.size(),
        };
        let size = self.size();
        let target = offset_from(origin, offset)
            .filter(|pos| *pos <= size)
            .ok_or(StreamError::InvalidSeek { offset, anchor })?;
        self.backend.seek(&mut self.cursor, target)?;
        Ok(target)
    }

    /// Move the read position to an absolute offset.
    ///
    /// # Errors
    /// As [`Source::seek`].
    pub fn set_position(&mut self, pos: Position) -> Result<Position, StreamError> {
        if pos > self.size() {
            return Err(StreamError::InvalidSeek {
                offset: Offset::try_from(pos).unwrap_or(Offset::MAX),
                anchor: SeekAnchor::Begin,
            });
        }
        self.backend.seek(&mut self.cursor, pos)?;
        Ok(pos)
    }

    /// Go back to the start of the stream.
    ///
    /// # Errors
    /// The backend seek failure.
    pub fn rewind(&mut self) -> Result<(), StreamError> {
        self.backend.seek(&mut self.cursor, 0)
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.cursor.position()
    }

    #[must_use]
    pub fn size(&self) -> Position {
        self.backend.size(&self.cursor)
    }

    /// Bytes between the read position and the end of the stream.
    #[must_use]
    pub fn remaining(&self) -> Position {
        self.size().saturating_sub(self.position())
    }

    /// Bytes readable without calling the backend.
    #[must_use]
    pub fn available(&self) -> usize {
        self.cursor.available()
    }

    #[must_use]
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    #[must_use]
    pub fn cursor(&self) -> &SourceCursor {
        &self.cursor
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut SourceCursor, &mut B) {
        (&mut self.cursor, &mut self.backend)
    }

    fn underflow(&mut self) -> Result<usize, StreamError> {
        self.backend.underflow(&mut self.cursor)
    }

    fn copy_out(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.cursor.available());
        let next = self.cursor.next;
        dst[..n].copy_from_slice(&self.backend.window()[next..next + n]);
        self.cursor.next += n;
        n
    }
}

impl<B: SourceBackend + std::fmt::Debug> std::fmt::Debug for Source<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("cursor", &self.cursor)
            .field("order", &self.order)
            .field("backend", &self.backend)
            .finish()
    }
}

/// Object-safe view of any [`Source`], used by typed streams.
pub trait ByteSource {
    fn get(&mut self) -> Result<u8, StreamError>;
    fn peek(&mut self) -> Result<u8, StreamError>;
    fn getn(&mut self, dst: &mut [u8]) -> Result<usize, StreamError>;
    fn get_u16(&mut self) -> Result<u16, StreamError>;
    fn get_u32(&mut self) -> Result<u32, StreamError>;
    fn get_u64(&mut self) -> Result<u64, StreamError>;
    fn seek(&mut self, offset: Offset, anchor: SeekAnchor) -> Result<Position, StreamError>;
    fn position(&self) -> Position;
    fn size(&self) -> Position;
    fn remaining(&self) -> Position;
}

impl<B: SourceBackend> ByteSource for Source<B> {
    fn get(&mut self) -> Result<u8, StreamError> {
        Source::get(self)
    }

    fn peek(&mut self) -> Result<u8, StreamError> {
        Source::peek(self)
    }

    fn getn(&mut self, dst: &mut [u8]) -> Result<usize, StreamError> {
        Source::getn(self, dst)
    }

    fn get_u16(&mut self) -> Result<u16, StreamError> {
        self.get_num()
    }

    fn get_u32(&mut self) -> Result<u32, StreamError> {
        self.get_num()
    }

    fn get_u64(&mut self) -> Result<u64, StreamError> {
        self.get_num()
    }

    fn seek(&mut self, offset: Offset, anchor: SeekAnchor) -> Result<Position, StreamError> {
        Source::seek(self, offset, anchor)
    }

    fn position(&self) -> Position {
        Source::position(self)
    }

    fn size(&self) -> Position {
        Source::size(self)
    }

    fn remaining(&self) -> Position {
        Source::remaining(self)
    }
}
