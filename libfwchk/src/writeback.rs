use crate::{
    checksum::ChecksumValue,
    config::ChecksumConfig,
    image::MemoryImage,
    range::{check_source, destination_span},
    Result,
};

/// Stores `value` at the configured destination.
///
/// Existing bytes are overwritten and missing ones are added. The destination
/// is checked against every source range before anything is written, so on
/// error the image is unchanged.
pub fn patch(
    mut image: MemoryImage,
    config: &ChecksumConfig,
    value: ChecksumValue,
) -> Result<MemoryImage> {
    let destination = destination_span(config.destination())?;
    for source in config.ranges() {
        check_source(source, &destination)?;
    }

    let bytes = value.to_bytes(config.byte_order());
    for (address, byte) in (destination.start..destination.end).zip(bytes) {
        if let Some(prev) = image.insert(address, byte) {
            trace!("{address:#010x}: {prev:#04x} -> {byte:#04x}");
        } else {
            trace!("{address:#010x}: added {byte:#04x}");
        }
    }
    debug!("wrote {value} at {destination}");
    Ok(image)
}

/// Reads back a checksum stored at the configured destination.
///
/// Returns `None` if any of the four bytes is unpopulated.
pub fn stored(image: &MemoryImage, config: &ChecksumConfig) -> Option<ChecksumValue> {
    let start = config.destination();
    let mut bytes = [0u8; 4];
    for (i, b) in bytes.iter_mut().enumerate() {
        *b = image.get(start.checked_add(i as u32)?)?;
    }
    Some(ChecksumValue::from_bytes(bytes, config.byte_order()))
}
