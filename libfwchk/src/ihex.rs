//! Intel HEX reader and writer.
//!
//! ## Record format
//!
//! Each line is `:` followed by hex digits encoding:
//!
//! * `u8`: payload length
//! * `u16`: address offset (big endian)
//! * `u8`: [record type][RecordType]
//! * `length` bytes: payload
//! * `u8`: checksum, the two's complement of the sum of all previous bytes
//!
//! Data record addresses are relative to the last extended segment (`02`) or
//! extended linear (`04`) address record. Under a segment base the offset
//! wraps within the 64 KiB segment. The writer only emits `04` records.

use crate::{
    image::{MemoryImage, StartAddress},
    Error, Result,
};
use binrw::{binrw, BinRead, BinWrite};
use std::io::Cursor;

#[binrw]
#[brw(repr = u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    Data = 0x00,
    EndOfFile = 0x01,
    ExtendedSegmentAddress = 0x02,
    StartSegmentAddress = 0x03,
    ExtendedLinearAddress = 0x04,
    StartLinearAddress = 0x05,
}

/// One Intel HEX record, without its checksum byte.
///
/// The checksum is verified by [`HexRecord::parse`] and recalculated by
/// [`HexRecord::to_line`], so it never needs to be stored.
#[binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(big)]
pub struct HexRecord {
    #[bw(try_calc(u8::try_from(data.len())))]
    length: u8,

    pub offset: u16,
    pub kind: RecordType,

    #[br(count = length)]
    pub data: Vec<u8>,
}

/// Two's complement of the byte sum of `bytes`.
pub fn record_checksum(bytes: &[u8]) -> u8 {
    0u8.wrapping_sub(bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)))
}

impl HexRecord {
    /// Length, offset, type and checksum bytes.
    pub const MIN_LENGTH: usize = 5;

    pub fn new(kind: RecordType, offset: u16, data: Vec<u8>) -> Self {
        Self { offset, kind, data }
    }

    pub fn end_of_file() -> Self {
        Self::new(RecordType::EndOfFile, 0, Vec::new())
    }

    pub fn extended_linear_address(upper: u16) -> Self {
        Self::new(RecordType::ExtendedLinearAddress, 0, upper.to_be_bytes().to_vec())
    }

    pub fn start_address(start: StartAddress) -> Self {
        match start {
            StartAddress::Segment { cs, ip } => {
                let mut data = cs.to_be_bytes().to_vec();
                data.extend_from_slice(&ip.to_be_bytes());
                Self::new(RecordType::StartSegmentAddress, 0, data)
            }
            StartAddress::Linear(eip) => {
                Self::new(RecordType::StartLinearAddress, 0, eip.to_be_bytes().to_vec())
            }
        }
    }

    /// Parses the record on `line` (1-based, used for error reporting).
    pub fn parse(line: usize, text: &str) -> Result<Self> {
        let digits = text
            .strip_prefix(':')
            .ok_or_else(|| Error::format(line, "record does not start with ':'"))?;
        let bytes = hex::decode(digits)
            .map_err(|e| Error::format(line, format!("invalid hex digits: {e}")))?;
        if bytes.len() < Self::MIN_LENGTH {
            return Err(Error::format(
                line,
                format!(
                    "record is {} bytes, need at least {}",
                    bytes.len(),
                    Self::MIN_LENGTH
                ),
            ));
        }

        let (body, stored) = bytes.split_at(bytes.len() - 1);
        let stored = stored[0];
        let computed = record_checksum(body);
        if stored != computed {
            return Err(Error::ChecksumMismatch {
                line,
                stored,
                computed,
            });
        }

        let mut r = Cursor::new(body);
        let record = Self::read(&mut r).map_err(|e| match body[3] {
            t @ 0x06..=u8::MAX => Error::format(line, format!("unsupported record type {t:#04x}")),
            _ => Error::format(line, format!("malformed record: {e}")),
        })?;
        if r.position() != body.len() as u64 {
            return Err(Error::format(
                line,
                format!(
                    "length field says {} bytes, record carries {}",
                    body[0],
                    body.len() - 4
                ),
            ));
        }
        Ok(record)
    }

    /// Encodes the record as a line of text, without a line terminator.
    pub fn to_line(&self) -> Result<String> {
        let mut w = Cursor::new(Vec::with_capacity(self.data.len() + Self::MIN_LENGTH));
        self.write(&mut w)?;
        let mut bytes = w.into_inner();
        bytes.push(record_checksum(&bytes));
        Ok(format!(":{}", hex::encode_upper(bytes)))
    }

    fn payload<const N: usize>(&self, line: usize) -> Result<[u8; N]> {
        <[u8; N]>::try_from(self.data.as_slice()).map_err(|_| {
            Error::format(
                line,
                format!(
                    "{:?} record carries {} bytes, expected {N}",
                    self.kind,
                    self.data.len()
                ),
            )
        })
    }
}

/// Address base set by the last `02` or `04` record.
#[derive(Debug, Clone, Copy)]
enum Base {
    Segment(u32),
    Linear(u32),
}

impl Base {
    /// Address of payload byte `index` of a data record at `offset`.
    fn address(self, offset: u16, index: usize) -> Option<u32> {
        match self {
            Self::Segment(base) => {
                Some(base + u32::from(offset.wrapping_add(u16::try_from(index).ok()?)))
            }
            Self::Linear(base) => base
                .checked_add(u32::from(offset))?
                .checked_add(u32::try_from(index).ok()?),
        }
    }
}

/// Parses an Intel HEX file into a [MemoryImage].
///
/// Every record's checksum is verified before the record is used. The largest
/// data record payload becomes the image's record size.
pub fn load(text: &str) -> Result<MemoryImage> {
    let mut image = MemoryImage::new();
    let mut base = Base::Linear(0);
    let mut record_size = 0;
    let mut eof_line = None;
    let mut last_line = 0;

    for (i, raw) in text.lines().enumerate() {
        let line = i + 1;
        last_line = line;
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        if let Some(eof) = eof_line {
            return Err(Error::format(
                line,
                format!("record after end-of-file record on line {eof}"),
            ));
        }

        let record = HexRecord::parse(line, raw)?;
        match record.kind {
            RecordType::Data => {
                record_size = record_size.max(record.data.len());
                for (index, byte) in record.data.iter().enumerate() {
                    let address = base.address(record.offset, index).ok_or_else(|| {
                        Error::format(line, "data extends past the 32-bit address space")
                    })?;
                    match image.insert(address, *byte) {
                        Some(prev) if prev != *byte => {
                            return Err(Error::format(
                                line,
                                format!(
                                    "address {address:#010x} already holds {prev:#04x}, record sets {byte:#04x}"
                                ),
                            ));
                        }
                        _ => (),
                    }
                }
            }
            RecordType::EndOfFile => {
                record.payload::<0>(line)?;
                eof_line = Some(line);
            }
            RecordType::ExtendedSegmentAddress => {
                let segment = u16::from_be_bytes(record.payload::<2>(line)?);
                base = Base::Segment(u32::from(segment) << 4);
            }
            RecordType::ExtendedLinearAddress => {
                let upper = u16::from_be_bytes(record.payload::<2>(line)?);
                base = Base::Linear(u32::from(upper) << 16);
            }
            RecordType::StartSegmentAddress | RecordType::StartLinearAddress => {
                let [a, b, c, d] = record.payload::<4>(line)?;
                if image.start_address().is_some() {
                    return Err(Error::format(line, "duplicate start address record"));
                }
                image.set_start_address(if record.kind == RecordType::StartLinearAddress {
                    StartAddress::Linear(u32::from_be_bytes([a, b, c, d]))
                } else {
                    StartAddress::Segment {
                        cs: u16::from_be_bytes([a, b]),
                        ip: u16::from_be_bytes([c, d]),
                    }
                });
            }
        }
    }

    if eof_line.is_none() {
        return Err(Error::format(last_line + 1, "missing end-of-file record"));
    }
    if record_size > 0 {
        image.set_record_size(record_size);
    }
    debug!(
        bytes = image.len(),
        record_size = image.record_size(),
        "loaded image"
    );
    Ok(image)
}

/// Writes a [MemoryImage] as Intel HEX.
///
/// Contiguous bytes are packed into data records of up to
/// [`MemoryImage::record_size`] bytes; records never span a 64 KiB segment.
pub fn serialize(image: &MemoryImage) -> Result<String> {
    let record_size = image.record_size();
    if !(1..=usize::from(u8::MAX)).contains(&record_size) {
        return Err(Error::RecordSize(record_size));
    }

    let mut w = Writer {
        out: String::new(),
        segment: 0,
    };
    let mut run: Option<(u32, Vec<u8>)> = None;
    for (address, byte) in image.iter() {
        if let Some((start, bytes)) = &mut run {
            let next = u64::from(*start) + bytes.len() as u64;
            if u64::from(address) == next && bytes.len() < record_size && address & 0xffff != 0 {
                bytes.push(byte);
                continue;
            }
        }
        if let Some((start, bytes)) = run.replace((address, vec![byte])) {
            w.data(start, bytes)?;
        }
    }
    if let Some((start, bytes)) = run {
        w.data(start, bytes)?;
    }

    if let Some(start) = image.start_address() {
        w.record(&HexRecord::start_address(start))?;
    }
    w.record(&HexRecord::end_of_file())?;
    Ok(w.out)
}

struct Writer {
    out: String,
    segment: u16,
}

impl Writer {
    fn record(&mut self, record: &HexRecord) -> Result<()> {
        self.out.push_str(&record.to_line()?);
        self.out.push('\n');
        Ok(())
    }

    fn data(&mut self, address: u32, bytes: Vec<u8>) -> Result<()> {
        let [hi1, hi0, lo1, lo0] = address.to_be_bytes();
        let segment = u16::from_be_bytes([hi1, hi0]);
        if segment != self.segment {
            self.record(&HexRecord::extended_linear_address(segment))?;
            self.segment = segment;
        }
        self.record(&HexRecord::new(
            RecordType::Data,
            u16::from_be_bytes([lo1, lo0]),
            bytes,
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn format_line(r: Result<MemoryImage>) -> usize {
        match r {
            Err(Error::Format { line, .. }) => line,
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn single_record() -> Result<()> {
        let image = load(":0400000001020304F2\n:00000001FF\n")?;
        assert_eq!(image, MemoryImage::from_bytes(0, &[1, 2, 3, 4]));
        assert_eq!(image.record_size(), 4);
        assert_eq!(image.start_address(), None);
        Ok(())
    }

    #[test]
    fn tolerates_case_crlf_and_blank_lines() -> Result<()> {
        let image = load("\r\n:0400000001020304f2\r\n\r\n:00000001ff\r\n\n")?;
        assert_eq!(image, MemoryImage::from_bytes(0, &[1, 2, 3, 4]));
        Ok(())
    }

    #[test]
    fn tampered_payload() {
        // Last payload byte changed from 04 to 05 without fixing the checksum.
        let r = load(":0400000001020305F2\n:00000001FF\n");
        assert!(matches!(
            r,
            Err(Error::ChecksumMismatch {
                line: 1,
                stored: 0xf2,
                computed: 0xf1
            })
        ));
    }

    #[test]
    fn extended_addresses() -> Result<()> {
        let image = load(concat!(
            ":020000040800F2\n",
            ":0400000001020304F2\n",
            ":020000021000EC\n",
            ":01001000559A\n",
            ":00000001FF\n",
        ))?;
        let mut expected = MemoryImage::from_bytes(0x0800_0000, &[1, 2, 3, 4]);
        expected.extend(0x10010, &[0x55]);
        assert_eq!(image, expected);
        Ok(())
    }

    #[test]
    fn start_addresses() -> Result<()> {
        let image = load(":0400000508000123CB\n:00000001FF\n")?;
        assert_eq!(
            image.start_address(),
            Some(StartAddress::Linear(0x0800_0123))
        );

        let image = load(":0400000312345678E5\n:00000001FF\n")?;
        assert_eq!(
            image.start_address(),
            Some(StartAddress::Segment {
                cs: 0x1234,
                ip: 0x5678
            })
        );

        let r = load(":0400000508000123CB\n:0400000312345678E5\n:00000001FF\n");
        assert_eq!(format_line(r), 2);
        Ok(())
    }

    #[test]
    fn overlapping_records() -> Result<()> {
        let r = load(":0100000001FE\n:0100000002FD\n:00000001FF\n");
        assert_eq!(format_line(r), 2);

        let image = load(":0100000001FE\n:0100000001FE\n:00000001FF\n")?;
        assert_eq!(image, MemoryImage::from_bytes(0, &[1]));
        Ok(())
    }

    #[test]
    fn malformed_records() {
        assert_eq!(format_line(load(":0100000001FE\n")), 2);
        assert_eq!(
            format_line(load(":00000001FF\n:0100000001FE\n")),
            2
        );
        assert_eq!(format_line(load("0100000001FE\n:00000001FF\n")), 1);
        assert_eq!(format_line(load(":0100000001F\n:00000001FF\n")), 1);
        assert_eq!(format_line(load(":0000FF\n:00000001FF\n")), 1);
        assert_eq!(format_line(load(":0100000001XE\n:00000001FF\n")), 1);

        // Type 06 does not exist.
        match load(":00000006FA\n:00000001FF\n") {
            Err(Error::Format { line: 1, reason }) => assert!(reason.contains("0x06")),
            other => panic!("unexpected {other:?}"),
        }

        // Length field larger and smaller than the payload.
        assert_eq!(format_line(load(":0200000001FD\n:00000001FF\n")), 1);
        assert_eq!(format_line(load(":0000000001FF\n:00000001FF\n")), 1);

        // Extended address record with the wrong payload length.
        assert_eq!(format_line(load(":0100000408F3\n:00000001FF\n")), 1);
    }

    #[test]
    fn segment_offset_wraps() -> Result<()> {
        // Segment 0x1000, two bytes at offset 0xFFFF: the second wraps to the
        // start of the segment instead of spilling into the next one.
        let image = load(":020000021000EC\n:02FFFF000102FD\n:00000001FF\n")?;
        assert_eq!(
            image.iter().collect::<Vec<_>>(),
            vec![(0x10000, 2), (0x1ffff, 1)]
        );

        // A later 04 record switches back to linear addressing.
        let image = load(concat!(
            ":020000021000EC\n",
            ":020000040001F9\n",
            ":02FFFF000102FD\n",
            ":00000001FF\n",
        ))?;
        assert_eq!(
            image.iter().collect::<Vec<_>>(),
            vec![(0x1ffff, 1), (0x20000, 2)]
        );
        Ok(())
    }

    #[test]
    fn data_past_address_space() {
        // 0xFFFF0000 + 0xFFFF, two bytes: the second is at 0x1_0000_0000.
        let text = format!(
            "{}\n{}\n:00000001FF\n",
            HexRecord::extended_linear_address(0xffff).to_line().unwrap(),
            HexRecord::new(RecordType::Data, 0xffff, vec![1, 2])
                .to_line()
                .unwrap(),
        );
        assert_eq!(format_line(load(&text)), 2);
    }

    #[test]
    fn record_lines() -> Result<()> {
        assert_eq!(
            HexRecord::new(RecordType::Data, 0, vec![1, 2, 3, 4]).to_line()?,
            ":0400000001020304F2"
        );
        assert_eq!(HexRecord::end_of_file().to_line()?, ":00000001FF");
        assert_eq!(
            HexRecord::extended_linear_address(0x0800).to_line()?,
            ":020000040800F2"
        );
        assert_eq!(
            HexRecord::parse(7, ":0400000508000123CB")?,
            HexRecord::start_address(StartAddress::Linear(0x0800_0123))
        );
        Ok(())
    }

    #[test]
    fn serialize_splits_records() -> Result<()> {
        let bytes: Vec<u8> = (0..20).collect();
        let image = MemoryImage::from_bytes(0, &bytes);
        assert_eq!(
            serialize(&image)?,
            concat!(
                ":10000000000102030405060708090A0B0C0D0E0F78\n",
                ":0400100010111213A6\n",
                ":00000001FF\n",
            )
        );

        // Gap between 0x01 and 0x20.
        let mut image = MemoryImage::from_bytes(0, &[0x11, 0x22]);
        image.extend(0x20, &[0x33]);
        assert_eq!(
            serialize(&image)?,
            ":020000001122CB\n:0100200033AC\n:00000001FF\n"
        );
        Ok(())
    }

    #[test]
    fn serialize_segment_boundary() -> Result<()> {
        let image = MemoryImage::from_bytes(0xfffe, &[0xaa, 0xbb, 0xcc, 0xdd]);
        assert_eq!(
            serialize(&image)?,
            concat!(
                ":02FFFE00AABB9C\n",
                ":020000040001F9\n",
                ":02000000CCDD55\n",
                ":00000001FF\n",
            )
        );
        Ok(())
    }

    #[test]
    fn serialize_keeps_input_record_size() -> Result<()> {
        let bytes: Vec<u8> = (0..64).collect();
        let wide = MemoryImage::from_bytes(0x100, &bytes).with_record_size(32)?;
        let text = serialize(&wide)?;
        assert_eq!(text.lines().count(), 3);

        let reloaded = load(&text)?;
        assert_eq!(reloaded.record_size(), 32);
        assert_eq!(serialize(&reloaded)?, text);
        Ok(())
    }

    #[test]
    fn round_trip() -> Result<()> {
        let mut images = vec![MemoryImage::new(), MemoryImage::from_bytes(0, &[0xff])];

        let mut sparse = MemoryImage::new();
        for i in 0..40u32 {
            let base = i.wrapping_mul(0x0101_3579) & 0x0fff_fff0;
            sparse.extend(base, &[(i as u8).wrapping_mul(7); 37]);
        }
        sparse.set_start_address(StartAddress::Linear(0x0800_0401));
        images.push(sparse);

        let mut top = MemoryImage::from_bytes(0xffff_fff0, &[0x5a; 16]);
        top.extend(0x000f_fff8, &[0xa5; 17]);
        top.set_start_address(StartAddress::Segment { cs: 0xf000, ip: 0xfff0 });
        images.push(top);

        for image in images {
            for record_size in [1, 16, 255] {
                let image = image.clone().with_record_size(record_size)?;
                assert_eq!(load(&serialize(&image)?)?, image);
            }
        }
        Ok(())
    }
}
