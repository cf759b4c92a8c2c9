//! Typed input stream, the reading side of [`crate::OBStream`].

use std::any::Any;
use std::sync::Arc;

use crate::context::{SharedObject, StreamContext};
use crate::error::StreamError;
use crate::error_category::ErrorCode;
use crate::obstream::NEW_SHARED_OBJECT;
use crate::serialize::Deserialize;
use crate::source::ByteSource;
use crate::types::{Offset, PolyTag, Position, SeekAnchor, INVALID_TAG};

pub struct IBStream<'a> {
    source: &'a mut dyn ByteSource,
    context: &'a StreamContext,
    /// Shared objects read so far; reference `k` is entry `k - 1`.
    shared: Vec<(PolyTag, SharedObject)>,
}

impl<'a> IBStream<'a> {
    pub fn new(source: &'a mut dyn ByteSource, context: &'a StreamContext) -> Self {
        Self {
            source,
            context,
            shared: Vec::new(),
        }
    }

    #[must_use]
    pub fn context(&self) -> &'a StreamContext {
        self.context
    }

    pub fn source(&mut self) -> &mut dyn ByteSource {
        self.source
    }

    /// Read a `T`.
    ///
    /// # Errors
    /// Propagates the value's deserialization failure.
    pub fn read<T: Deserialize>(&mut self) -> Result<T, StreamError> {
        T::deserialize(self)
    }

    /// # Errors
    /// `ReadPastEndOfStream` or the source failure.
    pub fn read_u8(&mut self) -> Result<u8, StreamError> {
        self.source.get()
    }

    /// # Errors
    /// `ReadPastEndOfStream` or the source failure.
    pub fn read_i8(&mut self) -> Result<i8, StreamError> {
        Ok(i8::from_ne_bytes([self.source.get()?]))
    }

    /// # Errors
    /// `ReadPastEndOfStream` or the source failure.
    pub fn read_u16(&mut self) -> Result<u16, StreamError> {
        self.source.get_u16()
    }

    /// # Errors
    /// `ReadPastEndOfStream` or the source failure.
    pub fn read_i16(&mut self) -> Result<i16, StreamError> {
        Ok(i16::from_ne_bytes(self.source.get_u16()?.to_ne_bytes()))
    }

    /// # Errors
    /// `ReadPastEndOfStream` or the source failure.
    pub fn read_u32(&mut self) -> Result<u32, StreamError> {
        self.source.get_u32()
    }

    /// # Errors
    /// `ReadPastEndOfStream` or the source failure.
    pub fn read_i32(&mut self) -> Result<i32, StreamError> {
        Ok(i32::from_ne_bytes(self.source.get_u32()?.to_ne_bytes()))
    }

    /// # Errors
    /// `ReadPastEndOfStream` or the source failure.
    pub fn read_u64(&mut self) -> Result<u64, StreamError> {
        self.source.get_u64()
    }

    /// # Errors
    /// `ReadPastEndOfStream` or the source failure.
    pub fn read_i64(&mut self) -> Result<i64, StreamError> {
        Ok(i64::from_ne_bytes(self.source.get_u64()?.to_ne_bytes()))
    }

    /// # Errors
    /// `ReadPastEndOfStream` or the source failure.
    pub fn read_f32(&mut self) -> Result<f32, StreamError> {
        Ok(f32::from_bits(self.source.get_u32()?))
    }

    /// # Errors
    /// `ReadPastEndOfStream` or the source failure.
    pub fn read_f64(&mut self) -> Result<f64, StreamError> {
        Ok(f64::from_bits(self.source.get_u64()?))
    }

    /// # Errors
    /// `TypeError` for a byte other than 0 or 1.
    pub fn read_bool(&mut self) -> Result<bool, StreamError> {
        match self.source.get()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(StreamError::TypeError(format!("{other} is not a bool"))),
        }
    }

    /// Element count written by [`crate::OBStream::write_count`].
    ///
    /// # Errors
    /// `TypeError` if the count does not fit `usize`.
    pub fn read_count(&mut self) -> Result<usize, StreamError> {
        let count = self.read_u64()?;
        usize::try_from(count).map_err(|_| StreamError::TypeError(format!("count {count} does not fit usize")))
    }

    /// Length-prefixed raw bytes.
    ///
    /// # Errors
    /// `ReadPastEndOfStream` if the stream is shorter than the prefix says.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>, StreamError> {
        let len = self.read_count()?;
        if len as Position > self.source.remaining() {
            return Err(StreamError::ReadPastEndOfStream);
        }
        let mut bytes = vec![0; len];
        self.source.getn(&mut bytes)?;
        Ok(bytes)
    }

    /// Length-prefixed UTF-8.
    ///
    /// # Errors
    /// As [`IBStream::read_bytes`]; `TypeError` for invalid UTF-8.
    pub fn read_string(&mut self) -> Result<String, StreamError> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|e| StreamError::TypeError(e.to_string()))
    }

    /// Fill `dst` with bytes written without a length prefix.
    ///
    /// # Errors
    /// `ReadPastEndOfStream` or the source failure.
    pub fn read_raw(&mut self, dst: &mut [u8]) -> Result<(), StreamError> {
        self.source.getn(dst).map(|_| ())
    }

    /// Read an object written by [`crate::OBStream::write_poly`] and return
    /// it as a `Box<T>`, where `T` is the concrete type or one of its
    /// registered bases.
    ///
    /// # Errors
    /// `InvalidTag` for an unknown tag, `InvalidPtrDowncast` if the object
    /// is not a `T`, `AbstractNonPolyClass` if the tag names an abstract type.
    pub fn read_poly<T: ?Sized + 'static>(&mut self) -> Result<Option<Box<T>>, StreamError> {
        let tag = self.read_i32()?;
        if tag == INVALID_TAG {
            return Ok(None);
        }
        let context = self.context;
        context.create_raw::<T>(tag, self).map(Some)
    }

    /// Read a shared object written by [`crate::OBStream::write_shared`].
    /// Repeated references resolve to the same allocation.
    ///
    /// # Errors
    /// As [`IBStream::read_poly`]; `InvalidState` for a reference to an
    /// object not read yet.
    pub fn read_shared<T: ?Sized + 'static>(&mut self) -> Result<Option<Arc<T>>, StreamError> {
        let tag = self.read_i32()?;
        if tag == INVALID_TAG {
            return Ok(None);
        }
        let context = self.context;
        context.check_downcast::<T>(tag)?;

        let reference = self.read_u32()?;
        let object = if reference == NEW_SHARED_OBJECT {
            let object = context
                .create_shared_from_tag(tag, self)?
                .ok_or(StreamError::AbstractNonPolyClass(tag))?;
            self.shared.push((tag, Arc::clone(&object)));
            object
        } else {
            let (recorded_tag, object) = usize::try_from(reference - 1)
                .ok()
                .and_then(|index| self.shared.get(index))
                .ok_or(StreamError::InvalidState("shared object reference out of range"))?;
            if *recorded_tag != tag {
                return Err(StreamError::InvalidState("shared object reference with mismatched tag"));
            }
            Arc::clone(object)
        };
        context.cast_shared::<T>(tag, object).map(Some)
    }

    /// Read an error code written by [`crate::OBStream::write_error_code`].
    ///
    /// # Errors
    /// `InvalidErrCategory` if the category index is not in the context.
    pub fn read_error_code(&mut self) -> Result<ErrorCode, StreamError> {
        let index = self.read_i32()?;
        let value = self.read_i32()?;
        let category = self.context.categories().category_from_index(index)?;
        Ok(ErrorCode::new(value, category))
    }

    /// Preallocation for `count` elements, bounded by the bytes left so that
    /// a corrupt count cannot exhaust memory.
    #[must_use]
    pub fn capacity_hint(&self, count: usize) -> usize {
        usize::try_from(self.source.remaining()).map_or(count, |remaining| count.min(remaining))
    }

    /// # Errors
    /// As the source's seek.
    pub fn seek(&mut self, offset: Offset, anchor: SeekAnchor) -> Result<Position, StreamError> {
        self.source.seek(offset, anchor)
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.source.position()
    }

    #[must_use]
    pub fn remaining(&self) -> Position {
        self.source.remaining()
    }

    /// Shared objects read so far, as `(tag, object)` pairs.
    #[must_use]
    pub fn shared_objects(&self) -> &[(PolyTag, Arc<dyn Any + Send + Sync>)] {
        &self.shared
    }
}

impl std::fmt::Debug for IBStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IBStream")
            .field("position", &self.source.position())
            .field("shared", &self.shared.len())
            .finish_non_exhaustive()
    }
}
