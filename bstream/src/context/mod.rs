//! Stream context: configuration, error categories and the polymorphic type
//! registry, built once and shared read-only.
//!
//! ```text
//!   ContextBuilder ──build()──► StreamContext
//!     .concrete::<T>()            tags, downcast matrix, factories
//!     .abstract_type::<T>()       ErrorCategoryContext
//!     .base::<C, B>(..)           ContextOptions
//! ```

mod options;
mod registry;

use std::any::{type_name, Any, TypeId};
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use lazy_static::lazy_static;

pub use options::{ContextOptions, DEFAULT_CONTEXT_BUFFER_SIZE};
pub use registry::{RawFactory, SharedFactory, SharedObject};

use crate::buffer::{BufferSink, BufferSource};
use crate::bufseq::BufseqSink;
use crate::error::StreamError;
use crate::error_category::ErrorCategoryContext;
use crate::file::{FileSink, FileSource};
use crate::ibstream::IBStream;
use crate::serialize::Deserialize;
use crate::types::{ByteOrder, OpenMode, PolyTag, INVALID_TAG};
use registry::{BaseEdge, TypeEntry, TypeRegistry};

lazy_static! {
    static ref DEFAULT_CONTEXT: StreamContext = StreamContext::new(ContextOptions::default());
}

/// Process-wide context with default options and no registered types.
#[must_use]
pub fn default_context() -> &'static StreamContext {
    &DEFAULT_CONTEXT
}

pub struct StreamContext {
    options: ContextOptions,
    categories: ErrorCategoryContext,
    registry: TypeRegistry,
}

impl StreamContext {
    /// Context without registered types.
    #[must_use]
    pub fn new(options: ContextOptions) -> Self {
        let categories = ErrorCategoryContext::new(options.error_categories());
        Self {
            options,
            categories,
            registry: TypeRegistry::empty(),
        }
    }

    #[must_use]
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    #[must_use]
    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    #[must_use]
    pub fn byte_order(&self) -> ByteOrder {
        self.options.byte_order()
    }

    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.options.buffer_size()
    }

    #[must_use]
    pub fn dedup_shared_ptrs(&self) -> bool {
        self.options.dedup_shared_ptrs()
    }

    #[must_use]
    pub fn categories(&self) -> &ErrorCategoryContext {
        &self.categories
    }

    /// Number of registered types; tags are `0..type_count()`.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.registry.len()
    }

    /// Tag of the type with `type_id`, or [`INVALID_TAG`].
    #[must_use]
    pub fn get_type_tag(&self, type_id: TypeId) -> PolyTag {
        self.registry.tag_of(type_id)
    }

    /// Tag of `T`, or [`INVALID_TAG`].
    #[must_use]
    pub fn type_tag<T: ?Sized + 'static>(&self) -> PolyTag {
        self.get_type_tag(TypeId::of::<T>())
    }

    /// Whether an object of type `from` can be viewed as type `to`. False
    /// for tags outside the context.
    #[must_use]
    pub fn can_downcast(&self, from: PolyTag, to: PolyTag) -> bool {
        self.registry.can_downcast(from, to)
    }

    /// # Errors
    /// `InvalidTag` if `tag` is not in the context.
    pub fn check_tag(&self, tag: PolyTag) -> Result<(), StreamError> {
        self.registry.entry(tag).map(|_| ())
    }

    /// Check that an object tagged `from` can be returned as a `T`; gives
    /// the tag of `T`.
    ///
    /// # Errors
    /// `InvalidTag`, `UnregisteredType` for `T`, or `InvalidPtrDowncast`.
    pub fn check_downcast<T: ?Sized + 'static>(&self, from: PolyTag) -> Result<PolyTag, StreamError> {
        self.check_tag(from)?;
        let to = self.type_tag::<T>();
        if to == INVALID_TAG {
            return Err(StreamError::UnregisteredType(type_name::<T>()));
        }
        if !self.can_downcast(from, to) {
            return Err(StreamError::InvalidPtrDowncast { from, to });
        }
        Ok(to)
    }

    /// Deserialize a new object of the concrete type tagged `tag`, as a
    /// `Box<dyn Any>` holding the value. `Ok(None)` for an abstract type.
    ///
    /// # Errors
    /// `InvalidTag`, or the deserialization failure.
    pub fn create_raw_from_tag(
        &self,
        tag: PolyTag,
        is: &mut IBStream<'_>,
    ) -> Result<Option<Box<dyn Any>>, StreamError> {
        self.registry.create_raw(tag, is)
    }

    /// As [`StreamContext::create_raw_from_tag`], the value in an `Arc`.
    ///
    /// # Errors
    /// `InvalidTag`, or the deserialization failure.
    pub fn create_shared_from_tag(
        &self,
        tag: PolyTag,
        is: &mut IBStream<'_>,
    ) -> Result<Option<SharedObject>, StreamError> {
        self.registry.create_shared(tag, is)
    }

    /// Deserialize an object tagged `tag` and return it as a `Box<T>`, `T`
    /// being its type or one of its registered bases. The downcast is
    /// checked before anything is read.
    ///
    /// # Errors
    /// `InvalidTag`, `UnregisteredType`, `InvalidPtrDowncast`,
    /// `AbstractNonPolyClass`, or the deserialization failure.
    pub fn create_raw<T: ?Sized + 'static>(&self, tag: PolyTag, is: &mut IBStream<'_>) -> Result<Box<T>, StreamError> {
        self.check_downcast::<T>(tag)?;
        let object = self
            .create_raw_from_tag(tag, is)?
            .ok_or(StreamError::AbstractNonPolyClass(tag))?;
        self.cast_raw(tag, object)
    }

    /// As [`StreamContext::create_raw`], returning an `Arc<T>`.
    ///
    /// # Errors
    /// As [`StreamContext::create_raw`].
    pub fn create_shared<T: ?Sized + 'static>(&self, tag: PolyTag, is: &mut IBStream<'_>) -> Result<Arc<T>, StreamError> {
        self.check_downcast::<T>(tag)?;
        let object = self
            .create_shared_from_tag(tag, is)?
            .ok_or(StreamError::AbstractNonPolyClass(tag))?;
        self.cast_shared(tag, object)
    }

    /// Convert an object made by the factory of `tag` into a `Box<T>`.
    ///
    /// # Errors
    /// `UnregisteredType` or `InvalidPtrDowncast`.
    pub fn cast_raw<T: ?Sized + 'static>(&self, tag: PolyTag, object: Box<dyn Any>) -> Result<Box<T>, StreamError> {
        let to = self.check_downcast::<T>(tag)?;
        let object = self.registry.upcast_raw(tag, to, object)?;
        object
            .downcast::<Box<T>>()
            .map(|object| *object)
            .map_err(|_| StreamError::InvalidPtrDowncast { from: tag, to })
    }

    /// Convert an object made by the shared factory of `tag` into an
    /// `Arc<T>`.
    ///
    /// # Errors
    /// `UnregisteredType` or `InvalidPtrDowncast`.
    pub fn cast_shared<T: ?Sized + 'static>(&self, tag: PolyTag, object: SharedObject) -> Result<Arc<T>, StreamError> {
        let to = self.check_downcast::<T>(tag)?;
        let object = self.registry.upcast_shared(tag, to, object)?;
        object
            .downcast::<Arc<T>>()
            .map(|object| *object)
            .map_err(|_| StreamError::InvalidPtrDowncast { from: tag, to })
    }

    /// Growable memory sink of `buffer_size()` bytes in the context's order.
    #[must_use]
    pub fn memory_sink(&self) -> BufferSink {
        BufferSink::new(self.buffer_size(), self.byte_order())
    }

    /// Buffer-sequence sink with `buffer_size()` segments.
    #[must_use]
    pub fn bufseq_sink(&self) -> BufseqSink {
        BufseqSink::new(self.buffer_size(), self.byte_order())
    }

    /// # Errors
    /// If the file cannot be opened.
    pub fn file_sink(&self, path: impl AsRef<Path>, mode: OpenMode) -> Result<FileSink, StreamError> {
        let mut sink = FileSink::with_buffer_size(self.buffer_size(), self.byte_order());
        sink.open(path, mode)?;
        Ok(sink)
    }

    #[must_use]
    pub fn buffer_source(&self, data: impl Into<Bytes>) -> BufferSource {
        BufferSource::new(data, self.byte_order())
    }

    /// # Errors
    /// If the file cannot be opened.
    pub fn file_source(&self, path: impl AsRef<Path>) -> Result<FileSource, StreamError> {
        let mut source = FileSource::with_buffer_size(self.buffer_size(), self.byte_order());
        source.open(path)?;
        Ok(source)
    }
}

impl Default for StreamContext {
    fn default() -> Self {
        Self::new(ContextOptions::default())
    }
}

impl std::fmt::Debug for StreamContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamContext")
            .field("options", &self.options)
            .field("categories", &self.categories)
            .field("types", &self.registry.names().collect::<Vec<_>>())
            .finish()
    }
}

/// Collects types and base edges for a [`StreamContext`].
///
/// Tags follow registration order. Edges may be declared before or after
/// the types they connect.
#[derive(Default)]
pub struct ContextBuilder {
    options: ContextOptions,
    entries: Vec<TypeEntry>,
    bases: Vec<BaseEdge>,
}

impl ContextBuilder {
    #[must_use]
    pub fn options(mut self, options: ContextOptions) -> Self {
        self.options = options;
        self
    }

    /// Register a type that can be read back, with raw and shared factories.
    #[must_use]
    pub fn concrete<T: Deserialize + Send + Sync + 'static>(mut self) -> Self {
        self.entries.push(TypeEntry::concrete::<T>());
        self
    }

    /// Register a type that is only ever a base, such as a trait object.
    #[must_use]
    pub fn abstract_type<T: ?Sized + 'static>(mut self) -> Self {
        self.entries.push(TypeEntry::abstract_type::<T>());
        self
    }

    /// Declare that `C` can be viewed as `B`. The conversions are usually
    /// plain unsizing coercions:
    ///
    /// ```ignore
    /// builder.base::<Circle, dyn Shape>(|b| b, |a| a)
    /// ```
    #[must_use]
    pub fn base<C, B>(mut self, raw: fn(Box<C>) -> Box<B>, shared: fn(Arc<C>) -> Arc<B>) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        B: ?Sized + Send + Sync + 'static,
    {
        self.bases.push(BaseEdge::new(raw, shared));
        self
    }

    /// # Errors
    /// `InvalidOperation` for a type registered twice, `UnregisteredType`
    /// for a base edge naming an unregistered type.
    pub fn build(self) -> Result<StreamContext, StreamError> {
        let registry = TypeRegistry::build(self.entries, self.bases)?;
        let categories = ErrorCategoryContext::new(self.options.error_categories());
        log::debug!(
            "stream context: {} types, {} error categories",
            registry.len(),
            categories.len()
        );
        Ok(StreamContext {
            options: self.options,
            categories,
            registry,
        })
    }
}

impl std::fmt::Debug for ContextBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBuilder")
            .field("options", &self.options)
            .field("types", &self.entries.iter().map(TypeEntry::name).collect::<Vec<_>>())
            .field("bases", &self.bases.len())
            .finish()
    }
}
