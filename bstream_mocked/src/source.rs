use bstream::{ByteOrder, Position, Source, SourceBackend, SourceCursor, StreamError};

use crate::store::{Fault, MockStore};

/// Source backend reading a [`MockStore`] through a small window.
#[derive(Debug)]
pub struct MockedSource {
    store: MockStore,
    buf: Vec<u8>,
}

impl MockedSource {
    #[must_use]
    pub fn new(store: &MockStore, window: usize) -> Self {
        Self {
            store: store.clone(),
            buf: vec![0; window.max(1)],
        }
    }
}

impl SourceBackend for MockedSource {
    fn window(&self) -> &[u8] {
        &self.buf
    }

    fn underflow(&mut self, cursor: &mut SourceCursor) -> Result<usize, StreamError> {
        self.store.enter(Fault::Underflow)?;
        let pos = cursor.position();
        let offset = usize::try_from(pos).map_err(|_| StreamError::InvalidState("mock position overflow"))?;
        let n = self.store.read_at(offset, &mut self.buf);
        cursor.set_window(pos, 0, n);
        Ok(n)
    }

    fn seek(&mut self, cursor: &mut SourceCursor, pos: Position) -> Result<(), StreamError> {
        self.store.enter(Fault::Seek)?;
        cursor.set_window(pos, 0, 0);
        Ok(())
    }

    fn size(&self, _cursor: &SourceCursor) -> Position {
        self.store.len() as Position
    }
}

/// Source over `store` with a `window`-byte buffer.
#[must_use]
pub fn mocked_source(store: &MockStore, window: usize, order: ByteOrder) -> Source<MockedSource> {
    Source::from_backend(MockedSource::new(store, window), order)
}
