use crate::range::AddressRange;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The input is not valid Intel HEX.
    #[error("line {line}: {reason}")]
    Format { line: usize, reason: String },

    /// A record's own checksum byte does not match its contents.
    #[error("line {line}: record checksum {stored:#04x} does not match computed {computed:#04x}")]
    ChecksumMismatch { line: usize, stored: u8, computed: u8 },

    #[error("record size {0} is outside 1..=255")]
    RecordSize(usize),

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error("data encode error: {0}")]
    BinRwError(#[from] binrw::Error),
}

impl Error {
    pub(crate) fn format(line: usize, reason: impl Into<String>) -> Self {
        Self::Format {
            line,
            reason: reason.into(),
        }
    }
}

/// Checksum ranges that cannot be used against an image.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("no checksum ranges configured")]
    NoRanges,

    #[error("range {name:?} {range} is empty")]
    Empty { name: String, range: AddressRange },

    #[error("range {name:?} reads unpopulated address {address:#010x}")]
    Unpopulated { name: String, address: u32 },

    #[error("range {name:?} {range} overlaps checksum destination {destination}")]
    OverlapsDestination {
        name: String,
        range: AddressRange,
        destination: AddressRange,
    },

    #[error("checksum destination {0:#010x} does not fit a 32-bit value")]
    DestinationOutOfBounds(u32),
}
