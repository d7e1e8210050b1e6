//! Embed a 32-bit software checksum in Intel HEX firmware images.
//!
//! ## Pipeline
//!
//! 1. [ihex::load] the image into a sparse [MemoryImage], verifying every
//!    record's checksum.
//! 2. [range::resolve] the configured ranges into byte [Window]s, in
//!    configuration order.
//! 3. [checksum::compute] the sum of all words, modulo 2^32.
//! 4. [writeback::patch] the result into the image at the destination.
//! 5. [ihex::serialize] the image again.
//!
//! ## Checksum
//!
//! Each range is read as `word_width` sized words in `byte_order`. The words
//! are added with wraparound, starting from `seed`. A range whose length isn't
//! a multiple of the word size ends in a short word, which is zero-extended.
//!
//! The same `byte_order` is used to store the result: 4 bytes at
//! `destination`. Ranges are half-open (`start` inclusive, `end` exclusive)
//! and may not touch those 4 bytes.
//!
//! Unpopulated addresses inside a range are an error, unless a `fill` byte is
//! configured.

#[macro_use]
extern crate tracing;

pub mod checksum;
pub mod config;
mod error;
pub mod ihex;
mod image;
pub mod range;
pub mod writeback;

pub use crate::{
    checksum::{ByteOrder, ChecksumValue, WordWidth},
    config::ChecksumConfig,
    error::{Error, RangeError},
    image::{MemoryImage, StartAddress, DEFAULT_RECORD_SIZE},
    range::{AddressRange, SourceRange, Window},
};
pub type Result<T> = std::result::Result<T, Error>;

/// Computes the checksum of `image` as configured.
pub fn checksum_of(image: &MemoryImage, config: &ChecksumConfig) -> Result<ChecksumValue> {
    let windows = range::resolve(image, config)?;
    Ok(checksum::compute(
        &windows,
        config.word_width(),
        config.byte_order(),
        config.seed(),
    ))
}

/// Loads `text`, computes its checksum and returns the patched image.
pub fn embed(text: &str, config: &ChecksumConfig) -> Result<(ChecksumValue, MemoryImage)> {
    let image = ihex::load(text)?;
    let value = checksum_of(&image, config)?;
    let image = writeback::patch(image, config, value)?;
    Ok((value, image))
}
