use std::collections::{btree_map, BTreeMap};
use std::ops::RangeBounds;

/// Default payload length of a data record when an image didn't come from a
/// file.
pub const DEFAULT_RECORD_SIZE: usize = 16;

/// Execution start address carried by an Intel HEX image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartAddress {
    /// Record type `03`: `CS:IP` pair for 80x86 real mode.
    Segment { cs: u16, ip: u16 },
    /// Record type `05`: 32-bit `EIP`.
    Linear(u32),
}

/// Sparse byte-addressed memory image.
///
/// Only addresses covered by a data record are populated. Equality compares
/// the populated bytes and the start address; the record size is only a hint
/// for serialization.
#[derive(Debug, Clone)]
pub struct MemoryImage {
    data: BTreeMap<u32, u8>,
    start: Option<StartAddress>,
    record_size: usize,
}

impl Default for MemoryImage {
    fn default() -> Self {
        Self {
            data: BTreeMap::new(),
            start: None,
            record_size: DEFAULT_RECORD_SIZE,
        }
    }
}

impl PartialEq for MemoryImage {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data && self.start == other.start
    }
}

impl Eq for MemoryImage {}

impl MemoryImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: u32) -> Option<u8> {
        self.data.get(&address).copied()
    }

    /// Number of populated addresses.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Populated `(address, byte)` pairs in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        self.data.iter().map(|(a, b)| (*a, *b))
    }

    pub fn range<R: RangeBounds<u32>>(&self, range: R) -> btree_map::Range<'_, u32, u8> {
        self.data.range(range)
    }

    pub fn start_address(&self) -> Option<StartAddress> {
        self.start
    }

    /// Maximum payload length of the data records emitted by
    /// [`serialize`][crate::ihex::serialize].
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Sets the data record payload length used when serializing.
    pub fn with_record_size(mut self, record_size: usize) -> crate::Result<Self> {
        if !(1..=usize::from(u8::MAX)).contains(&record_size) {
            return Err(crate::Error::RecordSize(record_size));
        }
        self.record_size = record_size;
        Ok(self)
    }

    /// Sets `address` to `value`, returning the previous value.
    pub(crate) fn insert(&mut self, address: u32, value: u8) -> Option<u8> {
        self.data.insert(address, value)
    }

    pub(crate) fn set_start_address(&mut self, start: StartAddress) {
        self.start = Some(start);
    }

    pub(crate) fn set_record_size(&mut self, record_size: usize) {
        self.record_size = record_size;
    }
}

#[cfg(test)]
impl MemoryImage {
    /// Builds an image with contiguous `bytes` at `base`.
    pub(crate) fn from_bytes(base: u32, bytes: &[u8]) -> Self {
        let mut image = Self::new();
        image.extend(base, bytes);
        image
    }

    pub(crate) fn extend(&mut self, base: u32, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            self.insert(base.wrapping_add(i as u32), *b);
        }
    }
}
