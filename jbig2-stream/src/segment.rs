//! Segment header parsing (7.2).
//!
//! Headers arrive through an incremental buffer, so parsing works on
//! whatever prefix is available and reports a header that is not yet
//! complete instead of failing on it.

use alloc::vec::Vec;

use crate::error::{DecodeError, ParseError, Result, SegmentError, bail};
use crate::reader::Reader;

/// "The segment type is a number between 0 and 63, inclusive." (7.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SegmentType {
    /// 0
    SymbolDictionary,
    /// 4
    IntermediateTextRegion,
    /// 6
    ImmediateTextRegion,
    /// 7
    ImmediateLosslessTextRegion,
    /// 16
    PatternDictionary,
    /// 20
    IntermediateHalftoneRegion,
    /// 22
    ImmediateHalftoneRegion,
    /// 23
    ImmediateLosslessHalftoneRegion,
    /// 36
    IntermediateGenericRegion,
    /// 38
    ImmediateGenericRegion,
    /// 39
    ImmediateLosslessGenericRegion,
    /// 40
    IntermediateGenericRefinementRegion,
    /// 42
    ImmediateGenericRefinementRegion,
    /// 43
    ImmediateLosslessGenericRefinementRegion,
    /// 48
    PageInformation,
    /// 49
    EndOfPage,
    /// 50
    EndOfStripe,
    /// 51
    EndOfFile,
    /// 52
    Profiles,
    /// 53
    Tables,
    /// 54
    ColourPalette,
    /// 62
    Extension,
    /// Any value the standard reserves.
    Reserved(u8),
}

impl SegmentType {
    fn from_value(value: u8) -> Self {
        match value {
            0 => Self::SymbolDictionary,
            4 => Self::IntermediateTextRegion,
            6 => Self::ImmediateTextRegion,
            7 => Self::ImmediateLosslessTextRegion,
            16 => Self::PatternDictionary,
            20 => Self::IntermediateHalftoneRegion,
            22 => Self::ImmediateHalftoneRegion,
            23 => Self::ImmediateLosslessHalftoneRegion,
            36 => Self::IntermediateGenericRegion,
            38 => Self::ImmediateGenericRegion,
            39 => Self::ImmediateLosslessGenericRegion,
            40 => Self::IntermediateGenericRefinementRegion,
            42 => Self::ImmediateGenericRefinementRegion,
            43 => Self::ImmediateLosslessGenericRefinementRegion,
            48 => Self::PageInformation,
            49 => Self::EndOfPage,
            50 => Self::EndOfStripe,
            51 => Self::EndOfFile,
            52 => Self::Profiles,
            53 => Self::Tables,
            54 => Self::ColourPalette,
            62 => Self::Extension,
            other => Self::Reserved(other),
        }
    }

    /// Whether the data length may be 0xFFFFFFFF (7.2.7).
    fn allows_unknown_length(self) -> bool {
        matches!(
            self,
            Self::ImmediateGenericRegion | Self::ImmediateLosslessGenericRegion
        )
    }
}

/// A parsed segment header (7.2.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SegmentHeader {
    pub(crate) number: u32,
    pub(crate) segment_type: SegmentType,
    /// "Bit 7: Deferred non-retain."
    pub(crate) deferred_non_retain: bool,
    /// Referred-to segment numbers, each lower than `number`.
    pub(crate) referred_to: Vec<u32>,
    /// 0 if the segment is not associated with a page.
    pub(crate) page_association: u32,
    /// `None` if the length is unknown (0xFFFFFFFF).
    pub(crate) data_length: Option<u32>,
}

/// Parse the segment header at the start of `data`.
///
/// Returns the header and its length in bytes, or `None` if `data` ends
/// before the header does.
pub(crate) fn parse_header(data: &[u8]) -> Result<Option<(SegmentHeader, usize)>> {
    match parse_header_inner(data) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(DecodeError::Parse(ParseError::UnexpectedEof)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn parse_header_inner(data: &[u8]) -> Result<(SegmentHeader, usize)> {
    let mut reader = Reader::new(data);

    let number = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;
    let flags = reader.read_byte().ok_or(ParseError::UnexpectedEof)?;

    let segment_type = SegmentType::from_value(flags & 0x3F);
    let page_association_long = flags & 0x40 != 0;
    let deferred_non_retain = flags & 0x80 != 0;

    let count_and_retention = reader.read_byte().ok_or(ParseError::UnexpectedEof)?;
    let short_count = count_and_retention >> 5;

    let referred_count = match short_count {
        0..=4 => u32::from(short_count),
        5 | 6 => bail!(SegmentError::InvalidReferredCount),
        _ => {
            let rest = reader.read_bytes(3).ok_or(ParseError::UnexpectedEof)?;
            let count =
                u32::from_be_bytes([count_and_retention & 0x1F, rest[0], rest[1], rest[2]]);

            // One retain bit for this segment and one per referred-to segment.
            let retention_bytes = (count as usize + 1).div_ceil(8);
            reader
                .skip_bytes(retention_bytes)
                .ok_or(ParseError::UnexpectedEof)?;

            count
        }
    };

    let reference_size = if number <= 256 {
        1
    } else if number <= 65536 {
        2
    } else {
        4
    };

    // Make sure the whole list is buffered before building it, so that an
    // absurd count in a partial header costs nothing.
    let references_len = (referred_count as usize)
        .checked_mul(reference_size)
        .ok_or(ParseError::UnexpectedEof)?;
    if reader.remaining() < references_len {
        bail!(ParseError::UnexpectedEof);
    }

    let mut referred_to = Vec::new();
    for _ in 0..referred_count {
        let referred = match reference_size {
            1 => reader.read_byte().map(u32::from),
            2 => reader.read_u16().map(u32::from),
            _ => reader.read_u32(),
        }
        .ok_or(ParseError::UnexpectedEof)?;

        if referred >= number {
            bail!(SegmentError::InvalidReference);
        }

        referred_to.push(referred);
    }

    let page_association = if page_association_long {
        reader.read_u32().ok_or(ParseError::UnexpectedEof)?
    } else {
        u32::from(reader.read_byte().ok_or(ParseError::UnexpectedEof)?)
    };

    let data_length = match reader.read_u32().ok_or(ParseError::UnexpectedEof)? {
        0xFFFF_FFFF if segment_type.allows_unknown_length() => None,
        0xFFFF_FFFF => bail!(SegmentError::UnknownLength),
        length => Some(length),
    };

    let header = SegmentHeader {
        number,
        segment_type,
        deferred_non_retain,
        referred_to,
        page_association,
        data_length,
    };

    Ok((header, reader.offset()))
}

/// Find the length of an immediate generic region body whose header gave no
/// data length (7.2.7).
///
/// The body ends with a two byte marker followed by the four byte row count:
/// 0x00 0x00 for MMR coded regions and 0xFF 0xAC otherwise (7.4.6.4). The MMR
/// flag is the eighteenth byte of the body and the marker can only occur
/// after it. Returns `None` until the marker and row count are buffered.
pub(crate) fn find_unknown_length(body: &[u8]) -> Option<usize> {
    const FLAGS_OFFSET: usize = 17;

    let flags = *body.get(FLAGS_OFFSET)?;

    let marker: [u8; 2] = if flags & 0x01 != 0 {
        [0x00, 0x00]
    } else {
        [0xFF, 0xAC]
    };

    body[FLAGS_OFFSET + 1..]
        .windows(6)
        .position(|window| window[..2] == marker)
        .map(|position| FLAGS_OFFSET + 1 + position + 6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_header_example_1() {
        // T.88 7.2.8, example 1, completed with a data length.
        let data = [
            0x00, 0x00, 0x00, 0x20, // segment 32
            0x86, // type 6, deferred non-retain
            0x6B, // three referred-to segments
            0x02, 0x1E, 0x05, // segments 2, 30 and 5
            0x04, // page 4
            0x00, 0x00, 0x00, 0x10,
        ];

        let (header, len) = parse_header(&data).unwrap().unwrap();

        assert_eq!(len, data.len());
        assert_eq!(header.number, 32);
        assert_eq!(header.segment_type, SegmentType::ImmediateTextRegion);
        assert!(header.deferred_non_retain);
        assert_eq!(header.referred_to, vec![2, 30, 5]);
        assert_eq!(header.page_association, 4);
        assert_eq!(header.data_length, Some(16));
    }

    #[test]
    fn segment_header_example_2() {
        // T.88 7.2.8, example 2, completed with a data length.
        #[rustfmt::skip]
        let data = [
            0x00, 0x00, 0x02, 0x34, // segment 564
            0x40,                   // type 0, 4 byte page association
            0xE0, 0x00, 0x00, 0x09, // long form, nine referred-to segments
            0x02, 0xFD,             // retention bits
            0x01, 0x00,
            0x00, 0x02,
            0x00, 0x1E,
            0x00, 0x05,
            0x02, 0x00,
            0x02, 0x01,
            0x02, 0x02,
            0x02, 0x03,
            0x02, 0x04,
            0x00, 0x00, 0x04, 0x01, // page 1025
            0x00, 0x00, 0x00, 0x20,
        ];

        let (header, len) = parse_header(&data).unwrap().unwrap();

        assert_eq!(len, data.len());
        assert_eq!(header.number, 564);
        assert_eq!(header.segment_type, SegmentType::SymbolDictionary);
        assert!(!header.deferred_non_retain);
        assert_eq!(
            header.referred_to,
            vec![256, 2, 30, 5, 512, 513, 514, 515, 516]
        );
        assert_eq!(header.page_association, 1025);
        assert_eq!(header.data_length, Some(32));
    }

    #[test]
    fn partial_header_needs_more_input() {
        let data = [0x00, 0x00, 0x00, 0x20, 0x86, 0x6B, 0x02, 0x1E, 0x05, 0x04];

        for end in 0..data.len() {
            assert_eq!(parse_header(&data[..end]).unwrap(), None);
        }
    }

    #[test]
    fn four_byte_references() {
        let mut data = vec![0x00, 0x01, 0x00, 0x01, 0x00, 0x20];
        data.extend_from_slice(&0x0000_FFFF_u32.to_be_bytes());
        data.push(1);
        data.extend_from_slice(&0_u32.to_be_bytes());

        let (header, _) = parse_header(&data).unwrap().unwrap();
        assert_eq!(header.referred_to, vec![0xFFFF]);
    }

    #[test]
    fn invalid_headers() {
        // Count values 5 and 6 do not exist.
        let data = [0x00, 0x00, 0x00, 0x01, 0x00, 0xA0, 0x01, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(
            parse_header(&data).unwrap_err(),
            DecodeError::Segment(SegmentError::InvalidReferredCount)
        );

        // Referring to a later segment.
        let data = [0x00, 0x00, 0x00, 0x01, 0x00, 0x20, 0x02, 0x01, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(
            parse_header(&data).unwrap_err(),
            DecodeError::Segment(SegmentError::InvalidReference)
        );

        // Unknown length on a symbol dictionary.
        let data = [0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x01, 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(
            parse_header(&data).unwrap_err(),
            DecodeError::Segment(SegmentError::UnknownLength)
        );
    }

    #[test]
    fn reserved_types_are_kept() {
        let data = [0x00, 0x00, 0x00, 0x01, 0x3F, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
        let (header, _) = parse_header(&data).unwrap().unwrap();
        assert_eq!(header.segment_type, SegmentType::Reserved(63));
    }

    #[test]
    fn unknown_length_of_generic_region() {
        let mut body = vec![0_u8; 17];
        body.push(0x02);
        body.extend_from_slice(&[0x12, 0x34, 0xFF, 0x00, 0x56]);
        body.extend_from_slice(&[0xFF, 0xAC, 0x00, 0x00, 0x00]);

        // The row count is not complete yet.
        assert_eq!(find_unknown_length(&body), None);

        body.push(0x08);
        body.extend_from_slice(&[0xAA, 0xBB]);
        assert_eq!(find_unknown_length(&body), Some(body.len() - 2));

        let mut mmr = vec![0_u8; 17];
        mmr.push(0x01);
        mmr.extend_from_slice(&[0xFF, 0xAC, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04]);
        assert_eq!(find_unknown_length(&mmr), Some(mmr.len()));
        assert_eq!(find_unknown_length(&mmr[..10]), None);
    }
}
