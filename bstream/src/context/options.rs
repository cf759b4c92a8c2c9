use serde::{Deserialize, Serialize};

use crate::error::StreamError;
use crate::error_category::ErrorCategory;
use crate::types::ByteOrder;

/// Buffer size of context-built sinks and sources when none is configured.
pub const DEFAULT_CONTEXT_BUFFER_SIZE: usize = 64 * 1024;

/// Settings of a [`super::StreamContext`].
///
/// Loadable from JSON; missing fields take their defaults:
///
/// ```
/// use bstream::{ByteOrder, ContextOptions};
///
/// let options = ContextOptions::from_json(r#"{"byte_order": "little_endian"}"#).unwrap();
/// assert_eq!(options.byte_order(), ByteOrder::LittleEndian);
/// assert!(options.dedup_shared_ptrs());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextOptions {
    byte_order: ByteOrder,
    buffer_size: usize,
    dedup_shared_ptrs: bool,
    #[serde(skip)]
    error_categories: Vec<&'static dyn ErrorCategory>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::default(),
            buffer_size: DEFAULT_CONTEXT_BUFFER_SIZE,
            dedup_shared_ptrs: true,
            error_categories: Vec::new(),
        }
    }
}

impl ContextOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// `Config` for malformed JSON or unknown enum values.
    pub fn from_json(json: &str) -> Result<Self, StreamError> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    #[must_use]
    pub fn with_dedup_shared_ptrs(mut self, dedup: bool) -> Self {
        self.dedup_shared_ptrs = dedup;
        self
    }

    /// Categories indexed after the built-in ones, in this order.
    #[must_use]
    pub fn with_error_categories(mut self, categories: &[&'static dyn ErrorCategory]) -> Self {
        self.error_categories = categories.to_vec();
        self
    }

    #[must_use]
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    #[must_use]
    pub fn dedup_shared_ptrs(&self) -> bool {
        self.dedup_shared_ptrs
    }

    #[must_use]
    pub fn error_categories(&self) -> &[&'static dyn ErrorCategory] {
        &self.error_categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ContextOptions::default();
        assert_eq!(options.byte_order(), ByteOrder::BigEndian);
        assert_eq!(options.buffer_size(), 65536);
        assert!(options.dedup_shared_ptrs());
        assert!(options.error_categories().is_empty());
    }

    #[test]
    fn test_from_json() {
        let options = ContextOptions::from_json(
            r#"{"byte_order": "little_endian", "buffer_size": 128, "dedup_shared_ptrs": false}"#,
        )
        .unwrap();
        assert_eq!(options.byte_order(), ByteOrder::LittleEndian);
        assert_eq!(options.buffer_size(), 128);
        assert!(!options.dedup_shared_ptrs());
    }

    #[test]
    fn test_from_json_rejects_unknown_order() {
        let err = ContextOptions::from_json(r#"{"byte_order": "middle_endian"}"#).unwrap_err();
        assert!(matches!(err, StreamError::Config(_)));
    }
}
