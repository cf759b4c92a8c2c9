//! Value (de)serialization traits and the implementations for std types.
//!
//! Wire format:
//! - numbers: fixed width, in the stream's byte order
//! - `bool`: one byte, 0 or 1
//! - strings, sequences, maps, sets: `u64` element count, then the elements
//! - `Option`: one presence byte, then the value if present
//! - tuples: the fields in order

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::{BuildHasher, Hash};
use std::time::Duration;

use crate::error::StreamError;
use crate::error_category::ErrorCode;
use crate::ibstream::IBStream;
use crate::obstream::OBStream;

/// A value that can be written to an [`OBStream`].
pub trait Serialize {
    /// # Errors
    /// Propagates sink failures.
    fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError>;
}

/// A value that can be constructed from an [`IBStream`].
pub trait Deserialize: Sized {
    /// # Errors
    /// Propagates source failures and malformed input.
    fn deserialize(is: &mut IBStream<'_>) -> Result<Self, StreamError>;
}

/// A type written through a base-type reference, with its type tag in front.
///
/// Base traits of a polymorphic hierarchy extend this trait so that
/// `dyn Base` knows the concrete type of the object behind it:
///
/// ```
/// use bstream::{OBStream, Polymorphic, Serialize, StreamError};
///
/// trait Shape: Polymorphic {
///     fn area(&self) -> f64;
/// }
///
/// struct Square(f64);
///
/// impl Serialize for Square {
///     fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError> {
///         os.write_f64(self.0)
///     }
/// }
///
/// impl Polymorphic for Square {}
///
/// impl Shape for Square {
///     fn area(&self) -> f64 {
///         self.0 * self.0
///     }
/// }
/// ```
pub trait Polymorphic: Any + Send + Sync + Serialize {
    /// `TypeId` of the concrete type.
    fn poly_type_id(&self) -> TypeId {
        TypeId::of::<Self>()
    }
}

macro_rules! impl_numbers {
    ($($t:ty => $write:ident, $read:ident;)*) => {$(
        impl Serialize for $t {
            fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError> {
                os.$write(*self)
            }
        }

        impl Deserialize for $t {
            fn deserialize(is: &mut IBStream<'_>) -> Result<Self, StreamError> {
                is.$read()
            }
        }
    )*};
}

impl_numbers! {
    u8 => write_u8, read_u8;
    i8 => write_i8, read_i8;
    u16 => write_u16, read_u16;
    i16 => write_i16, read_i16;
    u32 => write_u32, read_u32;
    i32 => write_i32, read_i32;
    u64 => write_u64, read_u64;
    i64 => write_i64, read_i64;
    f32 => write_f32, read_f32;
    f64 => write_f64, read_f64;
    bool => write_bool, read_bool;
}

impl Serialize for usize {
    fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError> {
        os.write_count(*self)
    }
}

impl Deserialize for usize {
    fn deserialize(is: &mut IBStream<'_>) -> Result<Self, StreamError> {
        let value = is.read_u64()?;
        usize::try_from(value).map_err(|_| StreamError::TypeError(format!("{value} does not fit usize")))
    }
}

impl Serialize for char {
    fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError> {
        os.write_u32(u32::from(*self))
    }
}

impl Deserialize for char {
    fn deserialize(is: &mut IBStream<'_>) -> Result<Self, StreamError> {
        let value = is.read_u32()?;
        char::from_u32(value).ok_or_else(|| StreamError::TypeError(format!("{value:#x} is not a char")))
    }
}

impl Serialize for str {
    fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError> {
        os.write_str(self)
    }
}

impl Serialize for String {
    fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError> {
        os.write_str(self)
    }
}

impl Deserialize for String {
    fn deserialize(is: &mut IBStream<'_>) -> Result<Self, StreamError> {
        is.read_string()
    }
}

impl<T: Serialize> Serialize for [T] {
    fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError> {
        os.write_count(self.len())?;
        self.iter().try_for_each(|item| item.serialize(os))
    }
}

impl<T: Serialize> Serialize for Vec<T> {
    fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError> {
        self.as_slice().serialize(os)
    }
}

impl<T: Deserialize> Deserialize for Vec<T> {
    fn deserialize(is: &mut IBStream<'_>) -> Result<Self, StreamError> {
        let count = is.read_count()?;
        let mut items = Vec::with_capacity(is.capacity_hint(count));
        for _ in 0..count {
            items.push(T::deserialize(is)?);
        }
        Ok(items)
    }
}

impl<T: Serialize> Serialize for VecDeque<T> {
    fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError> {
        os.write_count(self.len())?;
        self.iter().try_for_each(|item| item.serialize(os))
    }
}

impl<T: Deserialize> Deserialize for VecDeque<T> {
    fn deserialize(is: &mut IBStream<'_>) -> Result<Self, StreamError> {
        Vec::deserialize(is).map(VecDeque::from)
    }
}

impl<K: Serialize, V: Serialize> Serialize for BTreeMap<K, V> {
    fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError> {
        os.write_count(self.len())?;
        for (key, value) in self {
            key.serialize(os)?;
            value.serialize(os)?;
        }
        Ok(())
    }
}

impl<K: Deserialize + Ord, V: Deserialize> Deserialize for BTreeMap<K, V> {
    fn deserialize(is: &mut IBStream<'_>) -> Result<Self, StreamError> {
        let count = is.read_count()?;
        let mut map = BTreeMap::new();
        for _ in 0..count {
            let key = K::deserialize(is)?;
            let value = V::deserialize(is)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl<K: Serialize, V: Serialize, S> Serialize for HashMap<K, V, S> {
    fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError> {
        os.write_count(self.len())?;
        for (key, value) in self {
            key.serialize(os)?;
            value.serialize(os)?;
        }
        Ok(())
    }
}

impl<K, V, S> Deserialize for HashMap<K, V, S>
where
    K: Deserialize + Eq + Hash,
    V: Deserialize,
    S: BuildHasher + Default,
{
    fn deserialize(is: &mut IBStream<'_>) -> Result<Self, StreamError> {
        let count = is.read_count()?;
        let mut map = HashMap::with_capacity_and_hasher(is.capacity_hint(count), S::default());
        for _ in 0..count {
            let key = K::deserialize(is)?;
            let value = V::deserialize(is)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl<T: Serialize> Serialize for BTreeSet<T> {
    fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError> {
        os.write_count(self.len())?;
        self.iter().try_for_each(|item| item.serialize(os))
    }
}

impl<T: Deserialize + Ord> Deserialize for BTreeSet<T> {
    fn deserialize(is: &mut IBStream<'_>) -> Result<Self, StreamError> {
        Vec::deserialize(is).map(|items: Vec<T>| items.into_iter().collect())
    }
}

impl<T: Serialize, S> Serialize for HashSet<T, S> {
    fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError> {
        os.write_count(self.len())?;
        self.iter().try_for_each(|item| item.serialize(os))
    }
}

impl<T, S> Deserialize for HashSet<T, S>
where
    T: Deserialize + Eq + Hash,
    S: BuildHasher + Default,
{
    fn deserialize(is: &mut IBStream<'_>) -> Result<Self, StreamError> {
        Vec::deserialize(is).map(|items: Vec<T>| items.into_iter().collect())
    }
}

impl<T: Serialize> Serialize for Option<T> {
    fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError> {
        match self {
            Some(value) => {
                os.write_bool(true)?;
                value.serialize(os)
            }
            None => os.write_bool(false),
        }
    }
}

impl<T: Deserialize> Deserialize for Option<T> {
    fn deserialize(is: &mut IBStream<'_>) -> Result<Self, StreamError> {
        if is.read_bool()? {
            T::deserialize(is).map(Some)
        } else {
            Ok(None)
        }
    }
}

impl<T: Serialize + ?Sized> Serialize for Box<T> {
    fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError> {
        (**self).serialize(os)
    }
}

impl<T: Deserialize> Deserialize for Box<T> {
    fn deserialize(is: &mut IBStream<'_>) -> Result<Self, StreamError> {
        T::deserialize(is).map(Box::new)
    }
}

impl<A: Serialize, B: Serialize> Serialize for (A, B) {
    fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError> {
        self.0.serialize(os)?;
        self.1.serialize(os)
    }
}

impl<A: Deserialize, B: Deserialize> Deserialize for (A, B) {
    fn deserialize(is: &mut IBStream<'_>) -> Result<Self, StreamError> {
        let a = A::deserialize(is)?;
        let b = B::deserialize(is)?;
        Ok((a, b))
    }
}

impl<A: Serialize, B: Serialize, C: Serialize> Serialize for (A, B, C) {
    fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError> {
        self.0.serialize(os)?;
        self.1.serialize(os)?;
        self.2.serialize(os)
    }
}

impl<A: Deserialize, B: Deserialize, C: Deserialize> Deserialize for (A, B, C) {
    fn deserialize(is: &mut IBStream<'_>) -> Result<Self, StreamError> {
        let a = A::deserialize(is)?;
        let b = B::deserialize(is)?;
        let c = C::deserialize(is)?;
        Ok((a, b, c))
    }
}

impl Serialize for Duration {
    fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError> {
        os.write_u64(self.as_secs())?;
        os.write_u32(self.subsec_nanos())
    }
}

impl Deserialize for Duration {
    fn deserialize(is: &mut IBStream<'_>) -> Result<Self, StreamError> {
        let secs = is.read_u64()?;
        let nanos = is.read_u32()?;
        if nanos >= 1_000_000_000 {
            return Err(StreamError::TypeError(format!("{nanos} nanoseconds out of range")));
        }
        Ok(Duration::new(secs, nanos))
    }
}

impl Serialize for ErrorCode {
    fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError> {
        os.write_error_code(self)
    }
}

impl Deserialize for ErrorCode {
    fn deserialize(is: &mut IBStream<'_>) -> Result<Self, StreamError> {
        is.read_error_code()
    }
}
