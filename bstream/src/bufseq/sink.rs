use std::collections::VecDeque;
use std::fmt;

use super::{DEFAULT_MAX_SEGMENTS, DEFAULT_SEGMENT_SIZE};
use crate::error::StreamError;
use crate::sink::{Sink, SinkBackend, SinkCursor};
use crate::types::{ByteOrder, Position};

/// Provides storage for new segments.
pub trait SegmentAllocator: Send + fmt::Debug {
    /// A zero-filled buffer of `capacity` bytes.
    fn allocate(&self, capacity: usize) -> Vec<u8>;
}

/// Allocates segments on the heap.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapSegments;

impl SegmentAllocator for HeapSegments {
    fn allocate(&self, capacity: usize) -> Vec<u8> {
        vec![0; capacity]
    }
}

/// Segment-sequence backend for [`BufseqSink`].
#[derive(Debug)]
pub struct SinkSegments {
    segments: VecDeque<Vec<u8>>,
    current: usize,
    segment_capacity: usize,
    max_segments: usize,
    allocator: Box<dyn SegmentAllocator>,
}

pub type BufseqSink = Sink<SinkSegments>;

impl SinkSegments {
    fn new_segment(&self) -> Vec<u8> {
        let mut segment = self.allocator.allocate(self.segment_capacity);
        segment.resize(self.segment_capacity, 0);
        segment
    }

    /// Largest position the sink can hold.
    fn max_size(&self) -> Position {
        (self.max_segments as Position).saturating_mul(self.segment_capacity as Position)
    }

    fn ensure_segment(&mut self, index: usize) -> Result<(), StreamError> {
        let missing = index.saturating_add(1).saturating_sub(self.segments.len());
        if missing == 0 {
            return Ok(());
        }
        let requested =
            (index as Position).saturating_add(1).saturating_mul(self.segment_capacity as Position);
        let limit = self.max_size();
        let exceeded = || StreamError::CapacityExceeded { requested, limit };
        if index >= self.max_segments {
            return Err(exceeded());
        }
        if self.segments.try_reserve(missing).is_err() {
            log::debug!("bufseq sink: cannot allocate {missing} segments");
            return Err(exceeded());
        }
        for _ in 0..missing {
            let segment = self.new_segment();
            self.segments.push_back(segment);
        }
        Ok(())
    }

    fn ensure_first_segment(&mut self) {
        if self.segments.is_empty() {
            let segment = self.new_segment();
            self.segments.push_back(segment);
        }
    }

    /// Zero the bytes of existing segments in `[from, to)`.
    fn zero_range(&mut self, from: Position, to: Position) {
        let cap = self.segment_capacity as Position;
        let mut pos = from;
        while pos < to {
            let Ok(index) = usize::try_from(pos / cap) else {
                return;
            };
            let Some(segment) = self.segments.get_mut(index) else {
                return;
            };
            let start = index as Position * cap;
            let lo = (pos - start) as usize;
            let hi = ((to - start).min(cap)) as usize;
            segment[lo..hi].fill(0);
            pos = start + hi as Position;
        }
    }

    fn locate(&self, pos: Position) -> Result<(usize, usize), StreamError> {
        let cap = self.segment_capacity as Position;
        let index = usize::try_from(pos / cap).map_err(|_| StreamError::CapacityExceeded {
            requested: pos,
            limit: usize::MAX as u64,
        })?;
        #[allow(clippy::cast_possible_truncation)]
        let offset = (pos % cap) as usize;
        Ok((index, offset))
    }
}

impl SinkBackend for SinkSegments {
    fn window(&mut self) -> &mut [u8] {
        match self.segments.get_mut(self.current) {
            Some(segment) => segment.as_mut_slice(),
            None => &mut [],
        }
    }

    fn overflow(&mut self, cursor: &mut SinkCursor, _requested: usize) -> Result<(), StreamError> {
        if cursor.next() < self.segment_capacity && self.current < self.segments.len() {
            cursor.set_end(self.segment_capacity);
            return Ok(());
        }
        let index = self.current + 1;
        self.ensure_segment(index)?;
        self.current = index;
        cursor.set_window(
            (index * self.segment_capacity) as Position,
            0,
            self.segment_capacity,
        );
        Ok(())
    }

    fn jump(&mut self, cursor: &mut SinkCursor, target: Position) -> Result<(), StreamError> {
        let (index, offset) = self.locate(target)?;
        self.ensure_segment(index)?;
        let watermark = cursor.high_watermark();
        if target > watermark {
            self.zero_range(watermark, target);
        }
        self.current = index;
        cursor.set_window(
            (index * self.segment_capacity) as Position,
            offset,
            self.segment_capacity,
        );
        Ok(())
    }

    fn is_valid_position(&self, _cursor: &SinkCursor, pos: Position) -> bool {
        pos <= self.max_size()
    }
}

impl Sink<SinkSegments> {
    #[must_use]
    pub fn new(segment_capacity: usize, order: ByteOrder) -> Self {
        Self::with_allocator(segment_capacity, order, Box::new(HeapSegments))
    }

    #[must_use]
    pub fn with_order(order: ByteOrder) -> Self {
        Self::new(DEFAULT_SEGMENT_SIZE, order)
    }

    /// Sink whose segments come from `allocator`.
    #[must_use]
    pub fn with_allocator(
        segment_capacity: usize,
        order: ByteOrder,
        allocator: Box<dyn SegmentAllocator>,
    ) -> Self {
        let mut backend = SinkSegments {
            segments: VecDeque::new(),
            current: 0,
            segment_capacity: segment_capacity.max(1),
            max_segments: DEFAULT_MAX_SEGMENTS,
            allocator,
        };
        backend.ensure_first_segment();
        let end = backend.segment_capacity;
        Self::with_window(backend, order, end)
    }

    /// Cap the number of segments; writes and seeks beyond
    /// `max_segments * segment_capacity` fail.
    #[must_use]
    pub fn with_max_segments(mut self, max_segments: usize) -> Self {
        let backend = self.backend_mut();
        backend.max_segments = max_segments.max(backend.segments.len()).max(1);
        self
    }

    #[must_use]
    pub fn segment_capacity(&self) -> usize {
        self.backend().segment_capacity
    }

    /// Segments allocated so far.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.backend().segments.len()
    }

    /// The written content as consecutive slices, `size()` bytes in total.
    #[must_use]
    pub fn get_buffers(&self) -> Vec<&[u8]> {
        let mut remaining = self.size();
        let mut buffers = Vec::new();
        for segment in &self.backend().segments {
            if remaining == 0 {
                break;
            }
            let len = usize::try_from(remaining).map_or(segment.len(), |r| r.min(segment.len()));
            buffers.push(&segment[..len]);
            remaining -= len as Position;
        }
        buffers
    }

    /// Take the written segments, the last one trimmed to the content, and
    /// start over with one fresh segment.
    pub fn release_buffers(&mut self) -> VecDeque<Vec<u8>> {
        let mut remaining = self.size();
        let (_, backend) = self.parts_mut();
        let mut segments = std::mem::take(&mut backend.segments);
        let mut kept = 0;
        for segment in &mut segments {
            if remaining == 0 {
                break;
            }
            let len = usize::try_from(remaining).map_or(segment.len(), |r| r.min(segment.len()));
            segment.truncate(len);
            remaining -= len as Position;
            kept += 1;
        }
        segments.truncate(kept);
        backend.current = 0;
        backend.ensure_first_segment();
        let end = backend.segment_capacity;
        self.reset_cursor(end);
        segments
    }

    /// Drop the content, keeping the first segment's allocation.
    pub fn clear(&mut self) {
        let (_, backend) = self.parts_mut();
        backend.segments.truncate(1);
        backend.current = 0;
        backend.ensure_first_segment();
        let end = backend.segment_capacity;
        self.reset_cursor(end);
    }
}

impl Default for Sink<SinkSegments> {
    fn default() -> Self {
        Self::with_order(ByteOrder::default())
    }
}
