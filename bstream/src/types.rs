//! Shared vocabulary types: positions, seek anchors, open modes, byte orders.

use serde::{Deserialize, Serialize};

/// Absolute byte position in a stream.
pub type Position = u64;

/// Signed displacement used by seek operations.
pub type Offset = i64;

/// Index of a type in a [`crate::StreamContext`].
pub type PolyTag = i32;

/// Tag for "no type"; also written on the wire for absent polymorphic values.
pub const INVALID_TAG: PolyTag = -1;

/// Reference point for a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekAnchor {
    Begin,
    Current,
    End,
}

/// Byte order of fixed-width numbers on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    BigEndian,
    LittleEndian,
}

impl ByteOrder {
    /// Byte order of the host.
    #[must_use]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::BigEndian
        } else {
            Self::LittleEndian
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self::BigEndian
    }
}

/// How a file sink is opened.
///
/// - `Truncate`: create if missing, discard existing content
/// - `Append`: create if missing, every write goes to the end of the file
/// - `AtEnd`: create if missing, start positioned at the end
/// - `AtBegin`: create if missing, start positioned at 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Truncate,
    Append,
    AtEnd,
    AtBegin,
}

impl OpenMode {
    /// Open options equivalent to this mode.
    #[must_use]
    pub fn to_open_options(self) -> std::fs::OpenOptions {
        let mut options = std::fs::OpenOptions::new();
        options.create(true);
        match self {
            Self::Truncate => options.write(true).truncate(true),
            Self::Append => options.append(true),
            Self::AtEnd | Self::AtBegin => options.write(true),
        };
        options
    }

    /// Whether the stream starts positioned at the end of the existing file.
    #[must_use]
    pub fn starts_at_end(self) -> bool {
        matches!(self, Self::AtEnd | Self::Append)
    }
}

impl Default for OpenMode {
    fn default() -> Self {
        Self::AtBegin
    }
}
