//! Text region segment parsing and decoding (7.4.3, 6.4).

use super::{CombinationOperator, RegionSegmentInfo, parse_refinement_at_pixels};
use crate::arithmetic_decoder::ArithmeticDecoder;
use crate::error::{DecodeError, Feature, ParseError, Result, SymbolError, bail};
use crate::image::{Image, check_size};
use crate::integer_decoder::IntegerDecoder;
use crate::reader::Reader;
use crate::symbol_id_decoder::{SymbolIdDecoder, symbol_code_length};

/// The corner of a symbol instance that its coordinates refer to (REFCORNER).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReferenceCorner {
    BottomLeft,
    TopLeft,
    BottomRight,
    TopRight,
}

impl ReferenceCorner {
    fn from_value(value: u16) -> Self {
        match value & 0x03 {
            0 => Self::BottomLeft,
            1 => Self::TopLeft,
            2 => Self::BottomRight,
            _ => Self::TopRight,
        }
    }

    fn is_right(self) -> bool {
        matches!(self, Self::TopRight | Self::BottomRight)
    }

    fn is_bottom(self) -> bool {
        matches!(self, Self::BottomLeft | Self::BottomRight)
    }
}

/// Parsed text region segment data header (7.4.3.1).
#[derive(Debug, Clone)]
pub(crate) struct TextRegionHeader {
    pub(crate) region_info: RegionSegmentInfo,
    pub(crate) huffman: bool,
    pub(crate) refine: bool,
    /// LOGSBSTRIPS, SBSTRIPS is `1 << log_strips`.
    pub(crate) log_strips: u8,
    pub(crate) reference_corner: ReferenceCorner,
    pub(crate) transposed: bool,
    /// SBCOMBOP, how symbols are combined into the region.
    pub(crate) combination_operator: CombinationOperator,
    pub(crate) default_pixel: bool,
    /// SBDSOFFSET, added to every IADS delta.
    pub(crate) ds_offset: i8,
    pub(crate) num_instances: u32,
}

impl TextRegionHeader {
    fn strips(&self) -> i64 {
        1 << self.log_strips
    }
}

pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<TextRegionHeader> {
    let region_info = RegionSegmentInfo::parse(reader)?;
    let flags = reader.read_u16().ok_or(ParseError::UnexpectedEof)?;

    let huffman = flags & 0x0001 != 0;
    let refine = flags & 0x0002 != 0;
    let log_strips = ((flags >> 2) & 0x03) as u8;
    let reference_corner = ReferenceCorner::from_value(flags >> 4);
    let transposed = flags & 0x0040 != 0;
    let combination_operator = CombinationOperator::from_value(((flags >> 7) & 0x03) as u8)?;
    let default_pixel = flags & 0x0200 != 0;

    // A 5 bit two's complement value.
    let ds_offset = ((flags >> 10) & 0x1F) as i8;
    let ds_offset = if ds_offset & 0x10 != 0 { ds_offset - 32 } else { ds_offset };

    let refinement_template = (flags >> 15) as u8;

    if huffman {
        // The Huffman table selection flags.
        reader.read_u16().ok_or(ParseError::UnexpectedEof)?;
    }

    if refine && refinement_template == 0 {
        parse_refinement_at_pixels(reader)?;
    }

    let num_instances = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;

    Ok(TextRegionHeader {
        region_info,
        huffman,
        refine,
        log_strips,
        reference_corner,
        transposed,
        combination_operator,
        default_pixel,
        ds_offset,
        num_instances,
    })
}

/// The integer decoding procedures of an arithmetic coded text region.
struct TextRegionDecoders {
    iadt: IntegerDecoder,
    iafs: IntegerDecoder,
    iads: IntegerDecoder,
    iait: IntegerDecoder,
    iaid: SymbolIdDecoder,
}

impl TextRegionDecoders {
    fn new(num_symbols: u32) -> Self {
        Self {
            iadt: IntegerDecoder::new(),
            iafs: IntegerDecoder::new(),
            iads: IntegerDecoder::new(),
            iait: IntegerDecoder::new(),
            iaid: SymbolIdDecoder::new(symbol_code_length(num_symbols)),
        }
    }
}

/// Decode a complete text region segment, placing instances of `symbols`
/// (SBSYMS).
pub(crate) fn decode_region(
    data: &[u8],
    symbols: &[&Image],
    max_pixels: u64,
) -> Result<(RegionSegmentInfo, Image)> {
    let mut reader = Reader::new(data);
    let header = parse(&mut reader)?;

    if header.huffman {
        bail!(Feature::Huffman);
    }

    if header.refine {
        bail!(Feature::TextRefinement);
    }

    let info = header.region_info.clone();
    check_size(info.width, info.height, max_pixels)?;

    let encoded = reader.tail().ok_or(ParseError::UnexpectedEof)?;
    let mut decoder = ArithmeticDecoder::new(encoded);
    let image = decode(&header, &mut decoder, symbols)?;

    Ok((info, image))
}

/// The text region decoding procedure (6.4.5).
pub(crate) fn decode(
    header: &TextRegionHeader,
    decoder: &mut ArithmeticDecoder<'_>,
    symbols: &[&Image],
) -> Result<Image> {
    let info = &header.region_info;
    let mut region = Image::new_filled(info.width, info.height, header.default_pixel)?;

    if header.num_instances == 0 {
        return Ok(region);
    }

    if symbols.is_empty() {
        bail!(SymbolError::NoSymbols);
    }

    let mut ia = TextRegionDecoders::new(symbols.len() as u32);
    let strips = header.strips();
    let corner = header.reference_corner;
    let ds_offset = i64::from(header.ds_offset);

    let mut strip_t = -decode_int(&mut ia.iadt, decoder)? * strips;
    let mut first_s = 0_i64;
    let mut instances = 0_u32;

    while instances < header.num_instances {
        strip_t += decode_int(&mut ia.iadt, decoder)? * strips;

        let mut current_s = 0_i64;
        let mut first_in_strip = true;

        loop {
            if first_in_strip {
                first_s += decode_int(&mut ia.iafs, decoder)?;
                current_s = first_s;
                first_in_strip = false;
            } else {
                // OOB ends the strip.
                let Some(delta_s) = ia.iads.decode(decoder) else {
                    break;
                };
                current_s += i64::from(delta_s) + ds_offset;
            }

            if instances >= header.num_instances {
                bail!(SymbolError::TooManyInstances);
            }

            let current_t = if strips == 1 {
                0
            } else {
                decode_int(&mut ia.iait, decoder)?
            };
            let t = strip_t + current_t;

            let id = ia.iaid.decode(decoder) as usize;
            let symbol = *symbols.get(id).ok_or(SymbolError::OutOfRange)?;
            let width = i64::from(symbol.width());
            let height = i64::from(symbol.height());

            if !header.transposed && corner.is_right() {
                current_s += width - 1;
            } else if header.transposed && corner.is_bottom() {
                current_s += height - 1;
            }

            let s = current_s;
            let (x, y) = if header.transposed { (t, s) } else { (s, t) };
            let x = if corner.is_right() { x - width + 1 } else { x };
            let y = if corner.is_bottom() { y - height + 1 } else { y };

            region.compose(symbol, x, y, header.combination_operator);

            if !header.transposed && !corner.is_right() {
                current_s += width - 1;
            } else if header.transposed && !corner.is_bottom() {
                current_s += height - 1;
            }

            // Keep coordinates within a range where the sums above cannot
            // overflow; anything this far out is off the region anyway.
            let limit = i64::from(i32::MAX);
            if current_s.abs() > limit || first_s.abs() > limit || strip_t.abs() > limit {
                bail!(DecodeError::Overflow);
            }

            instances += 1;
        }
    }

    Ok(region)
}

/// Decode a value that must not be OOB.
fn decode_int(decoder: &mut IntegerDecoder, arith: &mut ArithmeticDecoder<'_>) -> Result<i64> {
    decoder
        .decode(arith)
        .map(i64::from)
        .ok_or(SymbolError::UnexpectedOob.into())
}
