//! Typed output stream.
//!
//! An [`OBStream`] writes [`Serialize`] values to any [`ByteSink`], using a
//! [`StreamContext`] to tag polymorphic objects and to number error
//! categories.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::StreamContext;
use crate::error::StreamError;
use crate::error_category::ErrorCode;
use crate::serialize::{Polymorphic, Serialize};
use crate::sink::ByteSink;
use crate::types::{Offset, Position, SeekAnchor, INVALID_TAG};

/// Reference number written before a shared object that follows in full.
pub const NEW_SHARED_OBJECT: u32 = 0;

pub struct OBStream<'a> {
    sink: &'a mut dyn ByteSink,
    context: &'a StreamContext,
    /// Shared objects already written, by address, with their reference numbers.
    shared: HashMap<usize, u32>,
    /// Keeps recorded objects alive so that their addresses stay unique.
    keep_alive: Vec<Box<dyn Any>>,
}

impl<'a> OBStream<'a> {
    pub fn new(sink: &'a mut dyn ByteSink, context: &'a StreamContext) -> Self {
        Self {
            sink,
            context,
            shared: HashMap::new(),
            keep_alive: Vec::new(),
        }
    }

    #[must_use]
    pub fn context(&self) -> &'a StreamContext {
        self.context
    }

    pub fn sink(&mut self) -> &mut dyn ByteSink {
        self.sink
    }

    /// Write `value`; chains.
    ///
    /// # Errors
    /// Propagates the value's serialization failure.
    pub fn write<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<&mut Self, StreamError> {
        value.serialize(self)?;
        Ok(self)
    }

    /// # Errors
    /// Propagates sink failures.
    pub fn write_u8(&mut self, value: u8) -> Result<(), StreamError> {
        self.sink.put(value)
    }

    /// # Errors
    /// Propagates sink failures.
    pub fn write_i8(&mut self, value: i8) -> Result<(), StreamError> {
        self.sink.put(value.to_ne_bytes()[0])
    }

    /// # Errors
    /// Propagates sink failures.
    pub fn write_u16(&mut self, value: u16) -> Result<(), StreamError> {
        self.sink.put_u16(value)
    }

    /// # Errors
    /// Propagates sink failures.
    pub fn write_i16(&mut self, value: i16) -> Result<(), StreamError> {
        self.sink.put_u16(u16::from_ne_bytes(value.to_ne_bytes()))
    }

    /// # Errors
    /// Propagates sink failures.
    pub fn write_u32(&mut self, value: u32) -> Result<(), StreamError> {
        self.sink.put_u32(value)
    }

    /// # Errors
    /// Propagates sink failures.
    pub fn write_i32(&mut self, value: i32) -> Result<(), StreamError> {
        self.sink.put_u32(u32::from_ne_bytes(value.to_ne_bytes()))
    }

    /// # Errors
    /// Propagates sink failures.
    pub fn write_u64(&mut self, value: u64) -> Result<(), StreamError> {
        self.sink.put_u64(value)
    }

    /// # Errors
    /// Propagates sink failures.
    pub fn write_i64(&mut self, value: i64) -> Result<(), StreamError> {
        self.sink.put_u64(u64::from_ne_bytes(value.to_ne_bytes()))
    }

    /// # Errors
    /// Propagates sink failures.
    pub fn write_f32(&mut self, value: f32) -> Result<(), StreamError> {
        self.sink.put_u32(value.to_bits())
    }

    /// # Errors
    /// Propagates sink failures.
    pub fn write_f64(&mut self, value: f64) -> Result<(), StreamError> {
        self.sink.put_u64(value.to_bits())
    }

    /// # Errors
    /// Propagates sink failures.
    pub fn write_bool(&mut self, value: bool) -> Result<(), StreamError> {
        self.sink.put(u8::from(value))
    }

    /// Element count of a sequence, as a `u64`.
    ///
    /// # Errors
    /// Propagates sink failures.
    pub fn write_count(&mut self, count: usize) -> Result<(), StreamError> {
        self.write_u64(count as u64)
    }

    /// Length-prefixed raw bytes.
    ///
    /// # Errors
    /// Propagates sink failures.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), StreamError> {
        self.write_count(bytes.len())?;
        self.sink.putn(bytes)
    }

    /// Length-prefixed UTF-8.
    ///
    /// # Errors
    /// Propagates sink failures.
    pub fn write_str(&mut self, s: &str) -> Result<(), StreamError> {
        self.write_bytes(s.as_bytes())
    }

    /// Bytes without a length prefix.
    ///
    /// # Errors
    /// Propagates sink failures.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<(), StreamError> {
        self.sink.putn(bytes)
    }

    /// Write an object through a base-type reference: its type tag, then its
    /// fields. `None` writes the invalid tag alone.
    ///
    /// # Errors
    /// `UnregisteredType` if the concrete type is not in the context.
    pub fn write_poly<T>(&mut self, value: Option<&T>) -> Result<(), StreamError>
    where
        T: Polymorphic + ?Sized,
    {
        let Some(value) = value else {
            return self.write_i32(INVALID_TAG);
        };
        let tag = self.tag_of(value)?;
        self.write_i32(tag)?;
        value.serialize(self)
    }

    /// Write a shared object: its type tag, a reference number, and the
    /// fields the first time the object is seen.
    ///
    /// With deduplication on, later writes of the same allocation only write
    /// the number of its first occurrence (counting from 1). Otherwise every
    /// write carries the fields.
    ///
    /// # Errors
    /// `UnregisteredType` if the concrete type is not in the context.
    pub fn write_shared<T>(&mut self, value: Option<&Arc<T>>) -> Result<(), StreamError>
    where
        T: Polymorphic + ?Sized,
    {
        let Some(value) = value else {
            return self.write_i32(INVALID_TAG);
        };
        let tag = self.tag_of(&**value)?;
        self.write_i32(tag)?;
        if !self.context.dedup_shared_ptrs() {
            self.write_u32(NEW_SHARED_OBJECT)?;
            return (**value).serialize(self);
        }

        let address = Arc::as_ptr(value).cast::<()>() as usize;
        if let Some(&reference) = self.shared.get(&address) {
            return self.write_u32(reference);
        }
        self.write_u32(NEW_SHARED_OBJECT)?;
        (**value).serialize(self)?;
        // Numbered after the fields, so nested shared objects come first.
        let reference = u32::try_from(self.shared.len() + 1)
            .map_err(|_| StreamError::InvalidState("too many shared objects"))?;
        self.shared.insert(address, reference);
        self.keep_alive.push(Box::new(Arc::clone(value)));
        Ok(())
    }

    /// Write an error code as its category's index in the context and its
    /// value.
    ///
    /// # Errors
    /// `InvalidErrCategory` if the category is not in the context.
    pub fn write_error_code(&mut self, code: &ErrorCode) -> Result<(), StreamError> {
        let index = self.context.categories().index_of_category(code.category())?;
        self.write_i32(index)?;
        self.write_i32(code.value())
    }

    /// # Errors
    /// Propagates sink failures.
    pub fn flush(&mut self) -> Result<(), StreamError> {
        self.sink.flush()
    }

    /// # Errors
    /// As the sink's seek.
    pub fn seek(&mut self, offset: Offset, anchor: SeekAnchor) -> Result<Position, StreamError> {
        self.sink.seek(offset, anchor)
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.sink.position()
    }

    fn tag_of<T: Polymorphic + ?Sized>(&self, value: &T) -> Result<i32, StreamError> {
        let tag = self.context.get_type_tag(value.poly_type_id());
        if tag == INVALID_TAG {
            return Err(StreamError::UnregisteredType(type_name::<T>()));
        }
        Ok(tag)
    }
}

impl std::fmt::Debug for OBStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OBStream")
            .field("position", &self.sink.position())
            .field("shared", &self.shared.len())
            .finish_non_exhaustive()
    }
}
