//! Mocked stream backends for tests.
//!
//! Sinks and sources built here share a [`MockStore`]. Any backend hook can
//! be made to fail once with [`MockStore::fail_next`], which is how tests
//! check that failures propagate and leave the stream usable.

pub mod sink;
pub mod source;
pub mod store;

pub use sink::{mocked_sink, MockedSink};
pub use source::{mocked_source, MockedSource};
pub use store::{Fault, MockStore};
