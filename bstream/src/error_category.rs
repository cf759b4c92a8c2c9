//! Error categories and category-qualified error codes.
//!
//! An [`ErrorCode`] is a `(category, value)` pair. Categories are process-wide
//! statics identified by name. To move an error code across a serialization
//! boundary the category is replaced by its index in an
//! [`ErrorCategoryContext`], which both ends must build from the same list.

use std::collections::HashMap;
use std::fmt;

use crate::error::StreamError;

/// A family of error values with their own numbering.
///
/// Category names must be unique within a process.
pub trait ErrorCategory: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;
    fn message(&self, value: i32) -> String;
}

/// Operating-system error numbers (`errno`).
#[derive(Debug)]
pub struct SystemCategory;

impl ErrorCategory for SystemCategory {
    fn name(&self) -> &'static str {
        "system"
    }

    fn message(&self, value: i32) -> String {
        std::io::Error::from_raw_os_error(value).to_string()
    }
}

/// Portable error conditions, numbered like POSIX `errno`.
#[derive(Debug)]
pub struct GenericCategory;

/// `ESPIPE`: illegal seek.
pub const GENERIC_INVALID_SEEK: i32 = 29;
/// `EIO`: input/output error.
pub const GENERIC_IO_ERROR: i32 = 5;

impl ErrorCategory for GenericCategory {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn message(&self, value: i32) -> String {
        match value {
            GENERIC_INVALID_SEEK => "invalid seek".to_string(),
            GENERIC_IO_ERROR => "io error".to_string(),
            other => std::io::Error::from_raw_os_error(other).to_string(),
        }
    }
}

/// Errors raised by the stream engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StreamErrc {
    ReadPastEndOfStream = 1,
    TypeError,
    MemberCountError,
    ContextMismatch,
    InvalidErrCategory,
    InvalidPtrDowncast,
    AbstractNonPolyClass,
    InvalidOperation,
    InvalidState,
    UnregisteredType,
    InvalidTag,
    CapacityExceeded,
    NotOpen,
}

impl StreamErrc {
    const ALL: [StreamErrc; 13] = [
        Self::ReadPastEndOfStream,
        Self::TypeError,
        Self::MemberCountError,
        Self::ContextMismatch,
        Self::InvalidErrCategory,
        Self::InvalidPtrDowncast,
        Self::AbstractNonPolyClass,
        Self::InvalidOperation,
        Self::InvalidState,
        Self::UnregisteredType,
        Self::InvalidTag,
        Self::CapacityExceeded,
        Self::NotOpen,
    ];

    #[must_use]
    pub fn from_value(value: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| *e as i32 == value)
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::ReadPastEndOfStream => "read past end of stream",
            Self::TypeError => "type error",
            Self::MemberCountError => "member count error",
            Self::ContextMismatch => "context mismatch",
            Self::InvalidErrCategory => "invalid error category",
            Self::InvalidPtrDowncast => "invalid pointer downcast",
            Self::AbstractNonPolyClass => "abstract or non-polymorphic class",
            Self::InvalidOperation => "invalid operation",
            Self::InvalidState => "invalid state",
            Self::UnregisteredType => "type not registered in context",
            Self::InvalidTag => "invalid type tag",
            Self::CapacityExceeded => "capacity exceeded",
            Self::NotOpen => "stream not open",
        }
    }
}

/// The category of [`StreamErrc`] values.
#[derive(Debug)]
pub struct BstreamCategory;

impl ErrorCategory for BstreamCategory {
    fn name(&self) -> &'static str {
        "bstream"
    }

    fn message(&self, value: i32) -> String {
        match StreamErrc::from_value(value) {
            Some(errc) => errc.description().to_string(),
            None => format!("unknown bstream error {value}"),
        }
    }
}

pub static SYSTEM_CATEGORY: SystemCategory = SystemCategory;
pub static GENERIC_CATEGORY: GenericCategory = GenericCategory;
pub static BSTREAM_CATEGORY: BstreamCategory = BstreamCategory;

/// An error value qualified by its category.
#[derive(Clone, Copy)]
pub struct ErrorCode {
    value: i32,
    category: &'static dyn ErrorCategory,
}

impl ErrorCode {
    #[must_use]
    pub fn new(value: i32, category: &'static dyn ErrorCategory) -> Self {
        Self { value, category }
    }

    #[must_use]
    pub fn system(errno: i32) -> Self {
        Self::new(errno, &SYSTEM_CATEGORY)
    }

    #[must_use]
    pub fn generic(value: i32) -> Self {
        Self::new(value, &GENERIC_CATEGORY)
    }

    #[must_use]
    pub fn value(&self) -> i32 {
        self.value
    }

    #[must_use]
    pub fn category(&self) -> &'static dyn ErrorCategory {
        self.category
    }

    #[must_use]
    pub fn message(&self) -> String {
        self.category.message(self.value)
    }

    /// Whether this is the given engine error.
    #[must_use]
    pub fn is(&self, errc: StreamErrc) -> bool {
        *self == ErrorCode::from(errc)
    }
}

impl From<StreamErrc> for ErrorCode {
    fn from(errc: StreamErrc) -> Self {
        Self::new(errc as i32, &BSTREAM_CATEGORY)
    }
}

impl PartialEq for ErrorCode {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.category.name() == other.category.name()
    }
}

impl Eq for ErrorCode {}

impl fmt::Debug for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorCode")
            .field("category", &self.category.name())
            .field("value", &self.value)
            .finish()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.category.name(), self.value, self.message())
    }
}

/// Bidirectional map between error categories and wire indices.
///
/// The built-in categories always occupy indices 0 (`system`),
/// 1 (`generic`) and 2 (`bstream`); extra categories follow in the order
/// they were supplied.
#[derive(Clone)]
pub struct ErrorCategoryContext {
    categories: Vec<&'static dyn ErrorCategory>,
    indices: HashMap<&'static str, i32>,
}

impl ErrorCategoryContext {
    /// Context with the built-in categories followed by `extra`.
    ///
    /// Categories already present (by name) are not added twice.
    #[must_use]
    pub fn new(extra: &[&'static dyn ErrorCategory]) -> Self {
        let builtin: [&'static dyn ErrorCategory; 3] =
            [&SYSTEM_CATEGORY, &GENERIC_CATEGORY, &BSTREAM_CATEGORY];
        let mut ctx = Self {
            categories: Vec::with_capacity(builtin.len() + extra.len()),
            indices: HashMap::new(),
        };
        for category in builtin.into_iter().chain(extra.iter().copied()) {
            if ctx.indices.contains_key(category.name()) {
                continue;
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let index = ctx.categories.len() as i32;
            ctx.indices.insert(category.name(), index);
            ctx.categories.push(category);
        }
        ctx
    }

    /// # Errors
    /// `InvalidErrCategory` if the index is unknown.
    pub fn category_from_index(&self, index: i32) -> Result<&'static dyn ErrorCategory, StreamError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.categories.get(i).copied())
            .ok_or_else(|| StreamError::InvalidErrCategory(format!("index {index}")))
    }

    /// # Errors
    /// `InvalidErrCategory` if the category is not part of this context.
    pub fn index_of_category(&self, category: &dyn ErrorCategory) -> Result<i32, StreamError> {
        self.indices
            .get(category.name())
            .copied()
            .ok_or_else(|| StreamError::InvalidErrCategory(category.name().to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl Default for ErrorCategoryContext {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl fmt::Debug for ErrorCategoryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.categories.iter().map(|c| c.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct AppCategory;

    impl ErrorCategory for AppCategory {
        fn name(&self) -> &'static str {
            "app"
        }

        fn message(&self, value: i32) -> String {
            format!("app error {value}")
        }
    }

    static APP_CATEGORY: AppCategory = AppCategory;

    #[test]
    fn test_builtin_indices() {
        let ctx = ErrorCategoryContext::default();
        assert_eq!(ctx.len(), 3);
        assert_eq!(ctx.index_of_category(&SYSTEM_CATEGORY).unwrap(), 0);
        assert_eq!(ctx.index_of_category(&BSTREAM_CATEGORY).unwrap(), 2);
        assert_eq!(ctx.category_from_index(1).unwrap().name(), "generic");
    }

    #[test]
    fn test_extra_category_and_duplicates() {
        let ctx = ErrorCategoryContext::new(&[&APP_CATEGORY, &GENERIC_CATEGORY, &APP_CATEGORY]);
        assert_eq!(ctx.len(), 4);
        assert_eq!(ctx.index_of_category(&APP_CATEGORY).unwrap(), 3);
    }

    #[test]
    fn test_unknown_category() {
        let ctx = ErrorCategoryContext::default();
        let err = ctx.index_of_category(&APP_CATEGORY).unwrap_err();
        assert!(err.code().is(StreamErrc::InvalidErrCategory));
        assert!(ctx.category_from_index(7).is_err());
        assert!(ctx.category_from_index(-1).is_err());
    }

    #[test]
    fn test_error_code_equality_and_message() {
        let a = ErrorCode::from(StreamErrc::ReadPastEndOfStream);
        assert_eq!(a.value(), 1);
        assert_eq!(a, ErrorCode::new(1, &BSTREAM_CATEGORY));
        assert_ne!(a, ErrorCode::generic(1));
        assert_eq!(a.message(), "read past end of stream");
        assert_eq!(ErrorCode::generic(GENERIC_INVALID_SEEK).message(), "invalid seek");
    }
}
