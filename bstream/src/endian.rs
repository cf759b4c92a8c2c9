//! Byte-order codec for fixed-width numbers.
//!
//! Sinks and sources compute a single `reverse` flag when they are created
//! (`true` when the stream byte order differs from the host) and use the
//! [`Numeric`] primitives to move values without re-checking the order.

use crate::types::ByteOrder;

/// A fixed-width number that can be stored as raw bytes.
pub trait Numeric: Copy {
    /// `[u8; N]` where `N` is the width of the type.
    type Bytes: AsRef<[u8]> + AsMut<[u8]> + Default + Copy;

    fn to_native_bytes(self) -> Self::Bytes;
    fn from_native_bytes(bytes: Self::Bytes) -> Self;
    #[must_use]
    fn swap_bytes(self) -> Self;
}

macro_rules! impl_numeric_int {
    ($($t:ty),*) => {$(
        impl Numeric for $t {
            type Bytes = [u8; std::mem::size_of::<$t>()];

            #[inline]
            fn to_native_bytes(self) -> Self::Bytes {
                self.to_ne_bytes()
            }

            #[inline]
            fn from_native_bytes(bytes: Self::Bytes) -> Self {
                <$t>::from_ne_bytes(bytes)
            }

            #[inline]
            fn swap_bytes(self) -> Self {
                <$t>::swap_bytes(self)
            }
        }
    )*};
}

impl_numeric_int!(u8, i8, u16, i16, u32, i32, u64, i64);

macro_rules! impl_numeric_float {
    ($($t:ty),*) => {$(
        impl Numeric for $t {
            type Bytes = [u8; std::mem::size_of::<$t>()];

            #[inline]
            fn to_native_bytes(self) -> Self::Bytes {
                self.to_ne_bytes()
            }

            #[inline]
            fn from_native_bytes(bytes: Self::Bytes) -> Self {
                <$t>::from_ne_bytes(bytes)
            }

            #[inline]
            fn swap_bytes(self) -> Self {
                <$t>::from_bits(self.to_bits().swap_bytes())
            }
        }
    )*};
}

impl_numeric_float!(f32, f64);

/// Whether values must be byte-swapped to move between host and `order`.
#[must_use]
pub fn is_reverse(order: ByteOrder) -> bool {
    order != ByteOrder::native()
}

/// Bytes of `value` laid out in `order`.
#[must_use]
pub fn encode<T: Numeric>(value: T, order: ByteOrder) -> T::Bytes {
    if is_reverse(order) {
        value.swap_bytes().to_native_bytes()
    } else {
        value.to_native_bytes()
    }
}

/// Value stored as `bytes` in `order`.
#[must_use]
pub fn decode<T: Numeric>(bytes: T::Bytes, order: ByteOrder) -> T {
    let value = T::from_native_bytes(bytes);
    if is_reverse(order) {
        value.swap_bytes()
    } else {
        value
    }
}

/// Copy `src` into `dst`, reversing the byte order when `reverse` is set.
///
/// Both slices must have the same length.
#[inline]
pub(crate) fn copy_ordered(dst: &mut [u8], src: &[u8], reverse: bool) {
    if reverse {
        for (d, s) in dst.iter_mut().zip(src.iter().rev()) {
            *d = *s;
        }
    } else {
        dst.copy_from_slice(src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_layout() {
        assert_eq!(encode(0x0102_0304u32, ByteOrder::BigEndian), [1, 2, 3, 4]);
        assert_eq!(encode(0x0102u16, ByteOrder::LittleEndian), [2, 1]);
    }

    #[test]
    fn test_decode_inverts_encode() {
        let bytes = encode(-2i64, ByteOrder::BigEndian);
        assert_eq!(bytes[0], 0xff);
        assert_eq!(bytes[7], 0xfe);
        assert_eq!(decode::<i64>(bytes, ByteOrder::BigEndian), -2);
        let f = encode(1.5f64, ByteOrder::LittleEndian);
        assert_eq!(decode::<f64>(f, ByteOrder::LittleEndian), 1.5);
    }

    #[test]
    fn test_reverse_flag_matches_host() {
        assert!(!is_reverse(ByteOrder::native()));
        let other = match ByteOrder::native() {
            ByteOrder::BigEndian => ByteOrder::LittleEndian,
            ByteOrder::LittleEndian => ByteOrder::BigEndian,
        };
        assert!(is_reverse(other));
    }

    #[test]
    fn test_copy_ordered() {
        let mut dst = [0u8; 3];
        copy_ordered(&mut dst, &[1, 2, 3], true);
        assert_eq!(dst, [3, 2, 1]);
        copy_ordered(&mut dst, &[1, 2, 3], false);
        assert_eq!(dst, [1, 2, 3]);
    }
}
