//! `embedded_io` and `std::io` views of bstream sinks and sources.

mod error_mapping;
pub mod reader;
pub mod writer;

pub use error_mapping::{errno_to_error_kind, error_kind_to_str, stream_error_kind, StreamIoError};
pub use reader::SourceReader;
pub use writer::SinkWriter;
