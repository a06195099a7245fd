//! Generic region segment parsing and decoding (7.4.6, 6.2).

use alloc::vec;

use super::{AdaptiveTemplatePixel, RegionSegmentInfo, parse_generic_at_pixels};
use crate::arithmetic_decoder::{ArithmeticDecoder, Context};
use crate::error::{Feature, FormatError, ParseError, RegionError, Result, bail};
use crate::image::{Image, check_size};
use crate::reader::Reader;

/// The number of contexts of the largest supported template.
///
/// Template 1 forms a 13 bit context out of its neighbourhood (Figure 4).
pub(crate) const CONTEXT_COUNT: usize = 1 << 13;

/// Parameters of the generic region decoding procedure (Table 2).
#[derive(Debug, Clone)]
pub(crate) struct GenericRegionParams {
    pub(crate) mmr: bool,
    pub(crate) template: u8,
    pub(crate) tpgdon: bool,
    pub(crate) extended_template: bool,
    pub(crate) at_pixels: [AdaptiveTemplatePixel; 4],
}

impl GenericRegionParams {
    /// Parameters for a symbol bitmap of a symbol dictionary (6.5.8.1, Table 16).
    pub(crate) fn for_symbol(template: u8, at_pixels: [AdaptiveTemplatePixel; 4]) -> Self {
        Self {
            mmr: false,
            template,
            tpgdon: false,
            extended_template: false,
            at_pixels,
        }
    }
}

/// Parsed generic region segment data header (7.4.6.1).
#[derive(Debug, Clone)]
pub(crate) struct GenericRegionHeader {
    pub(crate) region_info: RegionSegmentInfo,
    pub(crate) params: GenericRegionParams,
}

/// The number of AT pixels stored for `template`.
pub(crate) fn at_pixel_count(template: u8) -> usize {
    if template == 0 { 4 } else { 1 }
}

pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<GenericRegionHeader> {
    let region_info = RegionSegmentInfo::parse(reader)?;
    let flags = reader.read_byte().ok_or(ParseError::UnexpectedEof)?;

    let mmr = flags & 0x01 != 0;
    let template = (flags >> 1) & 0x03;
    let tpgdon = flags & 0x08 != 0;
    let extended_template = flags & 0x10 != 0;

    if flags & 0xE0 != 0 {
        bail!(FormatError::ReservedBits);
    }

    // The extended template stores twelve AT pixels we could not place.
    if extended_template {
        bail!(Feature::ExtendedTemplate);
    }

    let at_pixels = if mmr {
        [AdaptiveTemplatePixel::NOMINAL_TEMPLATE1; 4]
    } else {
        parse_generic_at_pixels(reader, at_pixel_count(template))?
    };

    Ok(GenericRegionHeader {
        region_info,
        params: GenericRegionParams {
            mmr,
            template,
            tpgdon,
            extended_template,
            at_pixels,
        },
    })
}

/// Decode a complete generic region segment.
///
/// With `unknown_length`, `data` ends in the 4-byte row count that replaces
/// the height of the region info field (7.4.6.4).
pub(crate) fn decode_region(
    data: &[u8],
    unknown_length: bool,
    max_pixels: u64,
) -> Result<(RegionSegmentInfo, Image)> {
    let mut reader = Reader::new(data);
    let mut header = parse(&mut reader)?;
    let mut encoded = reader.tail().ok_or(ParseError::UnexpectedEof)?;

    if unknown_length {
        if encoded.len() < 4 {
            bail!(ParseError::UnexpectedEof);
        }

        let (head, tail) = encoded.split_at(encoded.len() - 4);
        let row_count = u32::from_be_bytes([tail[0], tail[1], tail[2], tail[3]]);

        if row_count > header.region_info.height {
            bail!(RegionError::InvalidDimension);
        }

        header.region_info.height = row_count;
        encoded = head;
    }

    let info = header.region_info;
    check_size(info.width, info.height, max_pixels)?;

    let mut image = Image::new(info.width, info.height)?;
    let mut decoder = ArithmeticDecoder::new(encoded);
    let mut contexts = vec![Context::default(); CONTEXT_COUNT];

    decode_bitmap(&header.params, &mut decoder, &mut contexts, &mut image)?;

    Ok((info, image))
}

/// Decode a bitmap with template based arithmetic coding (6.2.5).
///
/// `image` must be blank and gives the dimensions. `contexts` must hold at
/// least [`CONTEXT_COUNT`] entries; callers decoding several bitmaps with
/// shared statistics pass the same table.
pub(crate) fn decode_bitmap(
    params: &GenericRegionParams,
    decoder: &mut ArithmeticDecoder<'_>,
    contexts: &mut [Context],
    image: &mut Image,
) -> Result<()> {
    if params.mmr {
        bail!(Feature::Mmr);
    }

    if params.extended_template {
        bail!(Feature::ExtendedTemplate);
    }

    if params.template != 1 {
        bail!(Feature::GenericTemplate(params.template));
    }

    if params.tpgdon {
        bail!(Feature::Tpgdon);
    }

    if contexts.len() < CONTEXT_COUNT {
        bail!(RegionError::InvalidDimension);
    }

    let at = params.at_pixels[0];

    if at == AdaptiveTemplatePixel::NOMINAL_TEMPLATE1 {
        decode_template1(decoder, contexts, image);
    } else {
        decode_template1_with_at(decoder, contexts, image, at);
    }

    Ok(())
}

/// Template 1 with the nominal AT pixel at (3, -1).
///
/// The two rows above the current one are kept in rolling windows, which the
/// context is refreshed from after every pixel:
///
/// ```text
///   bit 12..9   row y-2: x-1 x x+1 x+2
///   bit  8..3   row y-1: x-2 x-1 x x+1 x+2 x+3
///   bit  2..0   row y:   x-3 x-2 x-1
/// ```
///
/// `line_m1` holds the row above shifted so that the byte of the current pixel
/// sits in bits 8..15, `line_m2` the row two above, additionally shifted left
/// by 5. The next byte of a reference row is pulled in only if it contains a
/// pixel inside the image.
fn decode_template1(decoder: &mut ArithmeticDecoder<'_>, contexts: &mut [Context], image: &mut Image) {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let stride = image.stride();
    let data = image.data_mut();

    for y in 0..height {
        let row_start = y * stride;
        let (above, rest) = data.split_at_mut(row_start);
        let line = &mut rest[..stride];

        let m1: &[u8] = if y >= 1 { &above[row_start - stride..] } else { &[] };
        let m2: &[u8] = if y >= 2 {
            &above[row_start - 2 * stride..row_start - stride]
        } else {
            &[]
        };

        let mut line_m1 = m1.first().copied().unwrap_or(0) as u32;
        let mut line_m2 = (m2.first().copied().unwrap_or(0) as u32) << 5;
        let mut context = ((line_m1 >> 1) & 0x1F8) | ((line_m2 >> 1) & 0x1E00);

        for x in (0..width).step_by(8) {
            let next = (x >> 3) + 1;
            let pull = x + 8 < width;

            let next_m1 = if pull { m1.get(next).copied().unwrap_or(0) } else { 0 };
            let next_m2 = if pull { m2.get(next).copied().unwrap_or(0) } else { 0 };
            line_m1 = (line_m1 << 8) | next_m1 as u32;
            line_m2 = (line_m2 << 8) | ((next_m2 as u32) << 5);

            let minor_width = (width - x).min(8) as u32;
            let mut result = 0_u8;

            for x_minor in 0..minor_width {
                let bit = decoder.decode(&mut contexts[context as usize]);
                result |= (bit as u8) << (7 - x_minor);

                context = ((context & 0x0EFB) << 1)
                    | bit
                    | ((line_m1 >> (8 - x_minor)) & 0x08)
                    | ((line_m2 >> (8 - x_minor)) & 0x200);
            }

            line[x >> 3] = result;
        }
    }
}

/// Template 1 with an arbitrary AT pixel, gathering the context pixel by pixel
/// (Figure 4).
fn decode_template1_with_at(
    decoder: &mut ArithmeticDecoder<'_>,
    contexts: &mut [Context],
    image: &mut Image,
    at: AdaptiveTemplatePixel,
) {
    let (at_x, at_y) = (at.x as i64, at.y as i64);

    for y in 0..image.height() {
        for x in 0..image.width() {
            let (xi, yi) = (x as i64, y as i64);
            let p = |dx: i64, dy: i64| image.pixel(xi + dx, yi + dy);

            let context = (p(-1, -2) << 12)
                | (p(0, -2) << 11)
                | (p(1, -2) << 10)
                | (p(2, -2) << 9)
                | (p(-2, -1) << 8)
                | (p(-1, -1) << 7)
                | (p(0, -1) << 6)
                | (p(1, -1) << 5)
                | (p(2, -1) << 4)
                | (p(at_x, at_y) << 3)
                | (p(-3, 0) << 2)
                | (p(-2, 0) << 1)
                | p(-1, 0);

            let bit = decoder.decode(&mut contexts[context as usize]);
            image.set_pixel(x, y, bit != 0);
        }
    }
}
