use crate::range::Window;
use std::fmt;

/// Size of the words summed by [compute].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum WordWidth {
    Bits8,
    Bits16,
    #[default]
    Bits32,
}

impl WordWidth {
    pub fn bytes(self) -> usize {
        match self {
            Self::Bits8 => 1,
            Self::Bits16 => 2,
            Self::Bits32 => 4,
        }
    }
}

impl TryFrom<u32> for WordWidth {
    type Error = u32;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            8 => Ok(Self::Bits8),
            16 => Ok(Self::Bits16),
            32 => Ok(Self::Bits32),
            _ => Err(bits),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// Decodes a word of up to 4 bytes.
    ///
    /// A short word is zero-extended: its bytes become the low-order part of
    /// the value.
    pub fn read_word(self, bytes: &[u8]) -> u32 {
        debug_assert!(bytes.len() <= 4);
        let push = |acc: u32, b: &u8| (acc << 8) | u32::from(*b);
        match self {
            Self::Little => bytes.iter().rev().fold(0, push),
            Self::Big => bytes.iter().fold(0, push),
        }
    }
}

/// 32-bit software checksum.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChecksumValue(pub u32);

impl ChecksumValue {
    pub fn to_bytes(self, order: ByteOrder) -> [u8; 4] {
        match order {
            ByteOrder::Little => self.0.to_le_bytes(),
            ByteOrder::Big => self.0.to_be_bytes(),
        }
    }

    pub fn from_bytes(bytes: [u8; 4], order: ByteOrder) -> Self {
        Self(match order {
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        })
    }
}

impl fmt::Display for ChecksumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

/// Sums the words of each window, modulo 2^32, starting from `seed`.
///
/// Windows are split into words independently, so a window whose length isn't
/// a multiple of the word size ends with a short (zero-extended) word.
pub fn compute(
    windows: &[Window<'_>],
    width: WordWidth,
    order: ByteOrder,
    seed: u32,
) -> ChecksumValue {
    let sum = windows.iter().fold(seed, |acc, window| {
        acc.wrapping_add(window_sum(window, width, order))
    });
    ChecksumValue(sum)
}

fn window_sum(window: &Window<'_>, width: WordWidth, order: ByteOrder) -> u32 {
    let mut word = [0; 4];
    let mut filled = 0;
    let mut sum = 0u32;
    for byte in window.bytes() {
        word[filled] = byte;
        filled += 1;
        if filled == width.bytes() {
            sum = sum.wrapping_add(order.read_word(&word[..filled]));
            filled = 0;
        }
    }
    if filled > 0 {
        sum = sum.wrapping_add(order.read_word(&word[..filled]));
    }
    sum
}
