use crate::{config::ChecksumConfig, error::RangeError, image::MemoryImage};
use std::fmt;

/// Half-open address interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    pub start: u32,
    pub end: u32,
}

impl AddressRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn contains(&self, address: u32) -> bool {
        (self.start..self.end).contains(&address)
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#010x}, {:#010x})", self.start, self.end)
    }
}

/// A configured checksum input range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRange {
    pub name: String,
    pub range: AddressRange,
}

impl SourceRange {
    pub fn new(name: impl Into<String>, start: u32, end: u32) -> Self {
        Self {
            name: name.into(),
            range: AddressRange::new(start, end),
        }
    }
}

/// The bytes of one [SourceRange], read from the image on demand.
///
/// A window never copies the image, so a filled range over a large span costs
/// no memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window<'a> {
    pub range: AddressRange,
    image: &'a MemoryImage,
    fill: Option<u8>,
}

impl<'a> Window<'a> {
    pub(crate) fn new(range: AddressRange, image: &'a MemoryImage, fill: Option<u8>) -> Self {
        Self { range, image, fill }
    }

    pub fn start(&self) -> u32 {
        self.range.start
    }

    /// Bytes in address order. Unpopulated addresses read as the fill byte.
    pub fn bytes(&self) -> impl Iterator<Item = u8> + 'a {
        let fill = self.fill.unwrap_or_default();
        let mut populated = self.image.range(self.range.start..self.range.end).peekable();
        (self.range.start..self.range.end).map(move |address| {
            match populated.next_if(|(a, _)| **a == address) {
                Some((_, byte)) => *byte,
                None => fill,
            }
        })
    }
}

/// The four bytes the checksum is written to.
pub fn destination_span(destination: u32) -> Result<AddressRange, RangeError> {
    destination
        .checked_add(4)
        .map(|end| AddressRange::new(destination, end))
        .ok_or(RangeError::DestinationOutOfBounds(destination))
}

/// Fails if `source` is empty or touches the destination span.
pub(crate) fn check_source(
    source: &SourceRange,
    destination: &AddressRange,
) -> Result<(), RangeError> {
    if source.range.is_empty() {
        return Err(RangeError::Empty {
            name: source.name.clone(),
            range: source.range,
        });
    }
    if source.range.overlaps(destination) {
        return Err(RangeError::OverlapsDestination {
            name: source.name.clone(),
            range: source.range,
            destination: *destination,
        });
    }
    Ok(())
}

/// Reads the configured ranges out of `image`, in configuration order.
///
/// Every address in a range must be populated unless the configuration has a
/// fill byte, which then stands in for the missing bytes.
pub fn resolve<'a>(
    image: &'a MemoryImage,
    config: &ChecksumConfig,
) -> Result<Vec<Window<'a>>, RangeError> {
    if config.ranges().is_empty() {
        return Err(RangeError::NoRanges);
    }
    let destination = destination_span(config.destination())?;

    let mut windows = Vec::with_capacity(config.ranges().len());
    for (i, source) in config.ranges().iter().enumerate() {
        check_source(source, &destination)?;
        for earlier in &config.ranges()[..i] {
            if earlier.range.overlaps(&source.range) {
                warn!(
                    "range {:?} {} overlaps range {:?} {}; shared bytes are counted twice",
                    source.name, source.range, earlier.name, earlier.range
                );
            }
        }

        let window = read_window(image, source, config.fill())?;
        debug!(name = %source.name, range = %source.range, "resolved window");
        windows.push(window);
    }
    Ok(windows)
}

fn read_window<'a>(
    image: &'a MemoryImage,
    source: &SourceRange,
    fill: Option<u8>,
) -> Result<Window<'a>, RangeError> {
    let AddressRange { start, end } = source.range;
    if fill.is_none() {
        let mut next = start;
        for address in image.range(start..end).map(|(a, _)| *a).chain([end]) {
            if address != next {
                return Err(RangeError::Unpopulated {
                    name: source.name.clone(),
                    address: next,
                });
            }
            next = address.wrapping_add(1);
        }
    }

    Ok(Window::new(source.range, image, fill))
}
