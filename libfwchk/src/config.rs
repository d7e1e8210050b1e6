use crate::{
    checksum::{ByteOrder, WordWidth},
    range::SourceRange,
};

/// How to compute a checksum and where to put it.
///
/// Built once per run and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumConfig {
    ranges: Vec<SourceRange>,
    destination: u32,
    word_width: WordWidth,
    byte_order: ByteOrder,
    seed: u32,
    fill: Option<u8>,
}

impl ChecksumConfig {
    /// Checksum over `ranges` (in that order), stored at `destination`, using
    /// 32-bit little endian words, a zero seed and no gap filling.
    pub fn new(ranges: Vec<SourceRange>, destination: u32) -> Self {
        Self {
            ranges,
            destination,
            word_width: WordWidth::default(),
            byte_order: ByteOrder::default(),
            seed: 0,
            fill: None,
        }
    }

    pub fn with_word_width(mut self, word_width: WordWidth) -> Self {
        self.word_width = word_width;
        self
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    /// Byte used in place of unpopulated addresses inside a range.
    pub fn with_fill(mut self, fill: Option<u8>) -> Self {
        self.fill = fill;
        self
    }

    pub fn ranges(&self) -> &[SourceRange] {
        &self.ranges
    }

    pub fn destination(&self) -> u32 {
        self.destination
    }

    pub fn word_width(&self) -> WordWidth {
        self.word_width
    }

    /// Order used both for reading source words and writing the result.
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn fill(&self) -> Option<u8> {
        self.fill
    }
}
