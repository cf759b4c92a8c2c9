//! Output cursor engine.
//!
//! A [`Sink`] owns a [`SinkCursor`] and a backend. The cursor tracks a window
//! over the backend's current mapping; the backend supplies the bytes of
//! that window and the hooks that move or grow it.
//!
//! ```text
//!   base_offset                                   absolute positions
//!       │
//!       ▼
//!       ┌──────────────┬───────────────┬─────────────┐
//!       │   written    │    dirty      │    free     │  window()
//!       └──────────────┴───────────────┴─────────────┘
//!       0         dirty_start         next          end   window indices
//! ```
//!
//! Seeks are lazy: a seek outside the clean window only records
//! `pending_seek`. The next write flushes the dirty range and asks the
//! backend to `jump`, so a run of seeks without writes costs nothing.

use crate::endian::{copy_ordered, is_reverse, Numeric};
use crate::error::StreamError;
use crate::types::{ByteOrder, Offset, Position, SeekAnchor};
use std::ops::Range;

/// Position bookkeeping shared by every sink backend.
#[derive(Debug, Clone)]
pub struct SinkCursor {
    base_offset: Position,
    high_watermark: Position,
    next: usize,
    end: usize,
    dirty_start: usize,
    dirty: bool,
    pending_seek: Option<Position>,
    reverse: bool,
}

impl SinkCursor {
    fn new(order: ByteOrder) -> Self {
        Self {
            base_offset: 0,
            high_watermark: 0,
            next: 0,
            end: 0,
            dirty_start: 0,
            dirty: false,
            pending_seek: None,
            reverse: is_reverse(order),
        }
    }

    /// Absolute position of window index 0.
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

    /// Absolute position of the write cursor, ignoring any pending seek.
    #[must_use]
    pub fn position(&self) -> Position {
        self.base_offset + self.next as Position
    }

    #[must_use]
    pub fn high_watermark(&self) -> Position {
        self.high_watermark
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn pending_seek(&self) -> Option<Position> {
        self.pending_seek
    }

    /// Window indices written since the last flush.
    #[must_use]
    pub fn dirty_range(&self) -> Option<Range<usize>> {
        self.dirty.then_some(self.dirty_start..self.next)
    }

    /// Largest position ever written: the high watermark, or the cursor if
    /// it is past the watermark with unflushed bytes.
    #[must_use]
    pub fn logical_size(&self) -> Position {
        if self.dirty {
            self.high_watermark.max(self.position())
        } else {
            self.high_watermark
        }
    }

    /// Remap the window. Backends call this from their hooks.
    pub fn set_window(&mut self, base_offset: Position, next: usize, end: usize) {
        debug_assert!(next <= end, "inverted sink window");
        self.base_offset = base_offset;
        self.next = next;
        self.end = end;
        if self.dirty_start > next {
            self.dirty_start = next;
        }
    }

    /// Change the window length without moving the cursor.
    pub fn set_end(&mut self, end: usize) {
        debug_assert!(self.next <= end, "inverted sink window");
        self.end = end;
    }

    /// Set the high watermark, also below its current value.
    pub fn force_high_watermark(&mut self, pos: Position) {
        self.high_watermark = pos;
    }

    fn raise_high_watermark(&mut self) {
        self.high_watermark = self.high_watermark.max(self.position());
    }

    fn touch(&mut self) {
        if !self.dirty {
            self.dirty = true;
            self.dirty_start = self.next;
        }
    }

    fn reset(&mut self) {
        let reverse = self.reverse;
        *self = Self {
            reverse,
            ..Self::new(ByteOrder::native())
        };
    }
}

/// Storage behind a [`Sink`].
///
/// Hooks receive the cursor so they can remap the window. The engine
/// guarantees the cursor is clean (nothing dirty) when `overflow` and `jump`
/// are called.
pub trait SinkBackend {
    /// The currently mapped window. Must be at least `cursor.end()` long.
    fn window(&mut self) -> &mut [u8];

    /// Make room after the cursor: at least one byte, `requested` if the
    /// backend can.
    ///
    /// # Errors
    /// When the store cannot grow or the underlying write fails.
    fn overflow(&mut self, cursor: &mut SinkCursor, requested: usize) -> Result<(), StreamError>;

    /// Persist `cursor.dirty_range()`.
    ///
    /// # Errors
    /// When the underlying write fails.
    fn flush(&mut self, cursor: &mut SinkCursor) -> Result<(), StreamError> {
        let _ = cursor;
        Ok(())
    }

    /// Remap the window so that the cursor sits at `target`.
    ///
    /// # Errors
    /// When the store cannot be positioned there.
    fn jump(&mut self, cursor: &mut SinkCursor, target: Position) -> Result<(), StreamError>;

    fn is_valid_position(&self, cursor: &SinkCursor, pos: Position) -> bool;

    fn size(&self, cursor: &SinkCursor) -> Position {
        cursor.logical_size()
    }
}

/// Byte-oriented output stream over a backend.
pub struct Sink<B: SinkBackend> {
    cursor: SinkCursor,
    order: ByteOrder,
    backend: B,
}

impl<B: SinkBackend> Sink<B> {
    /// Wrap `backend` with an empty window; the first write calls
    /// `overflow` to map one.
    pub fn from_backend(backend: B, order: ByteOrder) -> Self {
        Self {
            cursor: SinkCursor::new(order),
            order,
            backend,
        }
    }

    pub(crate) fn with_window(backend: B, order: ByteOrder, end: usize) -> Self {
        let mut sink = Self::from_backend(backend, order);
        sink.cursor.set_window(0, 0, end);
        sink
    }

    /// Write one byte.
    ///
    /// # Errors
    /// Propagates failures of the deferred jump, flush or overflow hooks.
    pub fn put(&mut self, byte: u8) -> Result<(), StreamError> {
        self.resolve_pending_seek()?;
        if self.cursor.next >= self.cursor.end {
            self.overflow(1)?;
        }
        self.cursor.touch();
        let next = self.cursor.next;
        self.backend.window()[next] = byte;
        self.cursor.next += 1;
        Ok(())
    }

    /// Write all of `src`.
    ///
    /// # Errors
    /// Propagates failures of the deferred jump, flush or overflow hooks.
    /// Bytes copied before the failure stay written.
    pub fn putn(&mut self, src: &[u8]) -> Result<(), StreamError> {
        self.resolve_pending_seek()?;
        let mut rest = src;
        while !rest.is_empty() {
            if self.cursor.next >= self.cursor.end {
                self.overflow(rest.len())?;
            }
            let n = rest.len().min(self.cursor.end - self.cursor.next);
            self.cursor.touch();
            let next = self.cursor.next;
            self.backend.window()[next..next + n].copy_from_slice(&rest[..n]);
            self.cursor.next += n;
            rest = &rest[n..];
        }
        Ok(())
    }

    /// Write `byte` `count` times.
    ///
    /// # Errors
    /// As [`Sink::putn`].
    pub fn filln(&mut self, byte: u8, count: usize) -> Result<(), StreamError> {
        self.resolve_pending_seek()?;
        let mut remaining = count;
        while remaining > 0 {
            if self.cursor.next >= self.cursor.end {
                self.overflow(remaining)?;
            }
            let n = remaining.min(self.cursor.end - self.cursor.next);
            self.cursor.touch();
            let next = self.cursor.next;
            self.backend.window()[next..next + n].fill(byte);
            self.cursor.next += n;
            remaining -= n;
        }
        Ok(())
    }

    /// Write a fixed-width number in the sink's byte order.
    ///
    /// # Errors
    /// As [`Sink::putn`]. A failing deferred jump aborts the write.
    pub fn put_num<T: Numeric>(&mut self, value: T) -> Result<(), StreamError> {
        self.resolve_pending_seek()?;
        let size = std::mem::size_of::<T>();
        if self.cursor.end - self.cursor.next >= size {
            let bytes = value.to_native_bytes();
            self.cursor.touch();
            let next = self.cursor.next;
            copy_ordered(
                &mut self.backend.window()[next..next + size],
                bytes.as_ref(),
                self.cursor.reverse,
            );
            self.cursor.next += size;
            Ok(())
        } else {
            let value = if self.cursor.reverse {
                value.swap_bytes()
            } else {
                value
            };
            self.putn(value.to_native_bytes().as_ref())
        }
    }

    /// Write out unflushed bytes.
    ///
    /// A pending seek stays pending.
    ///
    /// # Errors
    /// Propagates the backend flush failure; the sink stays dirty.
    pub fn flush(&mut self) -> Result<(), StreamError> {
        if self.cursor.dirty {
            log::trace!("sink: flush {:?}", self.cursor.dirty_range());
            self.backend.flush(&mut self.cursor)?;
            self.cursor.raise_high_watermark();
            self.cursor.dirty = false;
        }
        Ok(())
    }

    /// Move the write position.
    ///
    /// # Errors
    /// `InvalidSeek` if the target is negative or the backend rejects it.
    /// The sink is unchanged in that case.
    pub fn seek(&mut self, offset: Offset, anchor: SeekAnchor) -> Result<Position, StreamError> {
        let origin = match anchor {
            SeekAnchor::Begin => 0,
            SeekAnchor::Current => self.position(),
            SeekAnchor::End => self.size(),
        };
        let target = offset_from(origin, offset)
            .filter(|pos| self.backend.is_valid_position(&self.cursor, *pos))
            .ok_or(StreamError::InvalidSeek { offset, anchor })?;
        self.move_to(target);
        Ok(target)
    }

    /// Move the write position to an absolute offset.
    ///
    /// # Errors
    /// As [`Sink::seek`].
    pub fn set_position(&mut self, pos: Position) -> Result<Position, StreamError> {
        if !self.backend.is_valid_position(&self.cursor, pos) {
            return Err(StreamError::InvalidSeek {
                offset: Offset::try_from(pos).unwrap_or(Offset::MAX),
                anchor: SeekAnchor::Begin,
            });
        }
        self.move_to(pos);
        Ok(pos)
    }

    /// Current write position, including a pending seek.
    #[must_use]
    pub fn position(&self) -> Position {
        self.cursor.pending_seek.unwrap_or_else(|| self.cursor.position())
    }

    /// Logical size of the written content.
    #[must_use]
    pub fn size(&self) -> Position {
        self.backend.size(&self.cursor)
    }

    #[must_use]
    pub fn high_watermark(&self) -> Position {
        self.cursor.high_watermark
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.cursor.dirty
    }

    #[must_use]
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    #[must_use]
    pub fn cursor(&self) -> &SinkCursor {
        &self.cursor
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut SinkCursor, &mut B) {
        (&mut self.cursor, &mut self.backend)
    }

    /// Flush and apply a pending seek so that the cursor is clean and at
    /// `position()`.
    pub(crate) fn settle(&mut self) -> Result<(), StreamError> {
        self.resolve_pending_seek()?;
        self.flush()
    }

    /// Forget all content: empty window, zero watermark, no pending seek.
    pub(crate) fn reset_cursor(&mut self, end: usize) {
        self.cursor.reset();
        self.cursor.set_window(0, 0, end);
    }

    fn move_to(&mut self, target: Position) {
        let c = &mut self.cursor;
        if target == c.position() {
            c.pending_seek = None;
            return;
        }
        if !c.dirty && target >= c.base_offset && target <= c.high_watermark {
            if let Ok(index) = usize::try_from(target - c.base_offset) {
                if index <= c.end {
                    c.next = index;
                    c.pending_seek = None;
                    return;
                }
            }
        }
        if c.dirty {
            c.raise_high_watermark();
        }
        c.pending_seek = Some(target);
    }

    fn resolve_pending_seek(&mut self) -> Result<(), StreamError> {
        if let Some(target) = self.cursor.pending_seek {
            self.flush()?;
            log::trace!("sink: jump to {target}");
            self.backend.jump(&mut self.cursor, target)?;
            self.cursor.pending_seek = None;
        }
        Ok(())
    }

    fn overflow(&mut self, requested: usize) -> Result<(), StreamError> {
        self.flush()?;
        self.backend.overflow(&mut self.cursor, requested)?;
        if self.cursor.next >= self.cursor.end {
            return Err(StreamError::InvalidState("sink overflow made no room"));
        }
        Ok(())
    }
}

impl<B: SinkBackend> Drop for Sink<B> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::warn!("sink: flush on drop failed: {e}");
        }
    }
}

impl<B: SinkBackend + std::fmt::Debug> std::fmt::Debug for Sink<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sink")
            .field("cursor", &self.cursor)
            .field("order", &self.order)
            .field("backend", &self.backend)
            .finish()
    }
}

/// `origin + offset`, or `None` when the result is negative or overflows.
pub(crate) fn offset_from(origin: Position, offset: Offset) -> Option<Position> {
    if offset >= 0 {
        origin.checked_add(offset.unsigned_abs())
    } else {
        origin.checked_sub(offset.unsigned_abs())
    }
}

/// Object-safe view of any [`Sink`], used by typed streams.
pub trait ByteSink {
    fn put(&mut self, byte: u8) -> Result<(), StreamError>;
    fn putn(&mut self, src: &[u8]) -> Result<(), StreamError>;
    fn filln(&mut self, byte: u8, count: usize) -> Result<(), StreamError>;
    fn put_u16(&mut self, value: u16) -> Result<(), StreamError>;
    fn put_u32(&mut self, value: u32) -> Result<(), StreamError>;
    fn put_u64(&mut self, value: u64) -> Result<(), StreamError>;
    fn flush(&mut self) -> Result<(), StreamError>;
    fn seek(&mut self, offset: Offset, anchor: SeekAnchor) -> Result<Position, StreamError>;
    fn position(&self) -> Position;
    fn size(&self) -> Position;
}

impl<B: SinkBackend> ByteSink for Sink<B> {
    fn put(&mut self, byte: u8) -> Result<(), StreamError> {
        Sink::put(self, byte)
    }

    fn putn(&mut self, src: &[u8]) -> Result<(), StreamError> {
        Sink::putn(self, src)
    }

    fn filln(&mut self, byte: u8, count: usize) -> Result<(), StreamError> {
        Sink::filln(self, byte, count)
    }

    fn put_u16(&mut self, value: u16) -> Result<(), StreamError> {
        self.put_num(value)
    }

    fn put_u32(&mut self, value: u32) -> Result<(), StreamError> {
        self.put_num(value)
    }

    fn put_u64(&mut self, value: u64) -> Result<(), StreamError> {
        self.put_num(value)
    }

    fn flush(&mut self) -> Result<(), StreamError> {
        Sink::flush(self)
    }

    fn seek(&mut self, offset: Offset, anchor: SeekAnchor) -> Result<Position, StreamError> {
        Sink::seek(self, offset, anchor)
    }

    fn position(&self) -> Position {
        Sink::position(self)
    }

    fn size(&self) -> Position {
        Sink::size(self)
    }
}
