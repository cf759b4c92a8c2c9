use std::ops::Range;

use bytes::Bytes;

use crate::error::StreamError;
use crate::source::{Source, SourceBackend, SourceCursor};
use crate::types::{ByteOrder, Position};

/// Segment-sequence backend for [`BufseqSource`].
#[derive(Debug, Default)]
pub struct SourceSegments {
    segments: Vec<Bytes>,
    starts: Vec<Position>,
    current: usize,
}

pub type BufseqSource = Source<SourceSegments>;

impl SourceSegments {
    fn total(&self) -> Position {
        match (self.starts.last(), self.segments.last()) {
            (Some(start), Some(last)) => start + last.len() as Position,
            _ => 0,
        }
    }

    fn map(&mut self, cursor: &mut SourceCursor, index: usize, next: usize) {
        self.current = index;
        match self.segments.get(index) {
            Some(segment) => cursor.set_window(self.starts[index], next, segment.len()),
            None => cursor.set_window(0, 0, 0),
        }
    }
}

impl SourceBackend for SourceSegments {
    fn window(&self) -> &[u8] {
        self.segments.get(self.current).map(|s| &s[..]).unwrap_or(&[])
    }

    fn underflow(&mut self, cursor: &mut SourceCursor) -> Result<usize, StreamError> {
        while self.current + 1 < self.segments.len() {
            let index = self.current + 1;
            self.map(cursor, index, 0);
            if cursor.end() > 0 {
                return Ok(cursor.end());
            }
        }
        Ok(0)
    }

    fn seek(&mut self, cursor: &mut SourceCursor, pos: Position) -> Result<(), StreamError> {
        if self.segments.is_empty() {
            cursor.set_window(0, 0, 0);
            return Ok(());
        }
        let index = self.starts.partition_point(|start| *start <= pos).saturating_sub(1);
        let next = usize::try_from(pos - self.starts[index])
            .map_err(|_| StreamError::InvalidState("segment offset overflow"))?;
        self.map(cursor, index, next);
        Ok(())
    }

    fn size(&self, _cursor: &SourceCursor) -> Position {
        self.total()
    }

    fn share(&self, range: Range<usize>) -> Option<Bytes> {
        self.segments.get(self.current).map(|s| s.slice(range))
    }
}

impl Source<SourceSegments> {
    /// Source reading `segments` back to back.
    #[must_use]
    pub fn new<I, S>(segments: I, order: ByteOrder) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Bytes>,
    {
        let segments: Vec<Bytes> = segments.into_iter().map(Into::into).collect();
        let mut starts = Vec::with_capacity(segments.len());
        let mut offset = 0;
        for segment in &segments {
            starts.push(offset);
            offset += segment.len() as Position;
        }
        let end = segments.first().map_or(0, Bytes::len);
        let backend = SourceSegments {
            segments,
            starts,
            current: 0,
        };
        Self::with_window(backend, order, end)
    }

    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.backend().segments.len()
    }
}
