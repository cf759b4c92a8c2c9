//! In-memory store shared by mocked sinks and sources.
//!
//! - `fail_next(fault)` makes the next call of that hook fail once.
//! - `hook_calls(fault)` counts how often a hook ran, failed or not.
//! - `contents` / `set_contents` access the stored bytes.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use bstream::StreamError;
use parking_lot::Mutex;

/// A backend hook that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Overflow,
    Flush,
    Jump,
    Underflow,
    Seek,
}

#[derive(Debug, Default)]
struct State {
    data: Vec<u8>,
    armed: Vec<Fault>,
    calls: HashMap<Fault, usize>,
}

#[derive(Debug, Clone, Default)]
pub struct MockStore {
    state: Arc<Mutex<State>>,
}

impl MockStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_contents(data: Vec<u8>) -> Self {
        let store = Self::new();
        store.set_contents(data);
        store
    }

    /// Make the next call of the `fault` hook fail. Arming twice fails the
    /// next two calls.
    pub fn fail_next(&self, fault: Fault) {
        self.state.lock().armed.push(fault);
    }

    pub fn clear_faults(&self) {
        self.state.lock().armed.clear();
    }

    #[must_use]
    pub fn hook_calls(&self, fault: Fault) -> usize {
        self.state.lock().calls.get(&fault).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.state.lock().data.clone()
    }

    pub fn set_contents(&self, data: Vec<u8>) {
        self.state.lock().data = data;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count a hook call and fail it if armed.
    pub(crate) fn enter(&self, fault: Fault) -> Result<(), StreamError> {
        let mut state = self.state.lock();
        *state.calls.entry(fault).or_insert(0) += 1;
        if let Some(index) = state.armed.iter().position(|armed| *armed == fault) {
            state.armed.remove(index);
            log::debug!("mock store: injected {fault:?} failure");
            return Err(StreamError::Io(io::Error::other(format!(
                "injected {fault:?} failure"
            ))));
        }
        Ok(())
    }

    /// Store `bytes` at `offset`, zero-extending the data if needed.
    pub(crate) fn write_at(&self, offset: usize, bytes: &[u8]) {
        let mut state = self.state.lock();
        let end = offset + bytes.len();
        if state.data.len() < end {
            state.data.resize(end, 0);
        }
        state.data[offset..end].copy_from_slice(bytes);
    }

    /// Copy stored bytes from `offset` into `dst`; returns the count.
    pub(crate) fn read_at(&self, offset: usize, dst: &mut [u8]) -> usize {
        let state = self.state.lock();
        let Some(available) = state.data.get(offset..) else {
            return 0;
        };
        let n = available.len().min(dst.len());
        dst[..n].copy_from_slice(&available[..n]);
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_fires_once() {
        let store = MockStore::new();
        store.fail_next(Fault::Flush);
        assert!(store.enter(Fault::Jump).is_ok());
        assert!(matches!(store.enter(Fault::Flush), Err(StreamError::Io(_))));
        assert!(store.enter(Fault::Flush).is_ok());
        assert_eq!(store.hook_calls(Fault::Flush), 2);
    }

    #[test]
    fn test_write_zero_extends() {
        let store = MockStore::new();
        store.write_at(3, b"ab");
        assert_eq!(store.contents(), vec![0, 0, 0, b'a', b'b']);
        let mut buf = [0u8; 4];
        assert_eq!(store.read_at(3, &mut buf), 2);
        assert_eq!(store.read_at(9, &mut buf), 0);
    }

    #[test]
    fn test_clones_share_state() {
        let store = MockStore::new();
        let other = store.clone();
        other.set_contents(b"xyz".to_vec());
        assert_eq!(store.len(), 3);
        store.fail_next(Fault::Seek);
        other.clear_faults();
        assert!(store.enter(Fault::Seek).is_ok());
    }
}
