use bstream::{ByteOrder, Position, Sink, SinkBackend, SinkCursor, StreamError};

use crate::store::{Fault, MockStore};

/// Sink backend writing to a [`MockStore`] through a small window.
#[derive(Debug)]
pub struct MockedSink {
    store: MockStore,
    buf: Vec<u8>,
}

impl MockedSink {
    #[must_use]
    pub fn new(store: &MockStore, window: usize) -> Self {
        Self {
            store: store.clone(),
            buf: vec![0; window.max(1)],
        }
    }
}

fn to_index(pos: Position) -> Result<usize, StreamError> {
    usize::try_from(pos).map_err(|_| StreamError::InvalidState("mock position overflow"))
}

impl SinkBackend for MockedSink {
    fn window(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    fn overflow(&mut self, cursor: &mut SinkCursor, _requested: usize) -> Result<(), StreamError> {
        self.store.enter(Fault::Overflow)?;
        cursor.set_window(cursor.position(), 0, self.buf.len());
        Ok(())
    }

    fn flush(&mut self, cursor: &mut SinkCursor) -> Result<(), StreamError> {
        self.store.enter(Fault::Flush)?;
        if let Some(range) = cursor.dirty_range() {
            let offset = to_index(cursor.base_offset())? + range.start;
            self.store.write_at(offset, &self.buf[range]);
        }
        cursor.set_window(cursor.position(), 0, self.buf.len());
        Ok(())
    }

    fn jump(&mut self, cursor: &mut SinkCursor, target: Position) -> Result<(), StreamError> {
        self.store.enter(Fault::Jump)?;
        cursor.set_window(target, 0, self.buf.len());
        Ok(())
    }

    fn is_valid_position(&self, _cursor: &SinkCursor, pos: Position) -> bool {
        usize::try_from(pos).is_ok()
    }
}

/// Sink over `store` with a `window`-byte buffer.
#[must_use]
pub fn mocked_sink(store: &MockStore, window: usize, order: ByteOrder) -> Sink<MockedSink> {
    Sink::from_backend(MockedSink::new(store, window), order)
}
