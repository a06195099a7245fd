//! Generic refinement region segment parsing and decoding (7.4.7, 6.3).

use alloc::vec;

use super::{AdaptiveTemplatePixel, RegionSegmentInfo, parse_refinement_at_pixels};
use crate::arithmetic_decoder::{ArithmeticDecoder, Context};
use crate::error::{Feature, FormatError, ParseError, RegionError, Result, bail};
use crate::image::{Image, check_size};
use crate::reader::Reader;

/// Template 1 forms a 10 bit context (Figure 13).
pub(crate) const CONTEXT_COUNT: usize = 1 << 10;

/// Parameters of the generic refinement region decoding procedure (Table 6).
#[derive(Debug, Clone)]
pub(crate) struct RefinementParams<'a> {
    pub(crate) template: u8,
    pub(crate) tpgron: bool,
    pub(crate) reference: &'a Image,
    /// GRREFERENCEDX, the reference pixel for (x, y) is (x - dx, y - dy).
    pub(crate) reference_dx: i32,
    pub(crate) reference_dy: i32,
    pub(crate) at_pixels: [AdaptiveTemplatePixel; 2],
}

#[derive(Debug, Clone)]
pub(crate) struct RefinementRegionHeader {
    pub(crate) region_info: RegionSegmentInfo,
    pub(crate) template: u8,
    pub(crate) tpgron: bool,
    pub(crate) at_pixels: [AdaptiveTemplatePixel; 2],
}

pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<RefinementRegionHeader> {
    let region_info = RegionSegmentInfo::parse(reader)?;
    let flags = reader.read_byte().ok_or(ParseError::UnexpectedEof)?;

    if flags & 0xFC != 0 {
        bail!(FormatError::ReservedBits);
    }

    let template = flags & 0x01;
    let tpgron = flags & 0x02 != 0;
    let at_pixels = if template == 0 {
        parse_refinement_at_pixels(reader)?
    } else {
        AdaptiveTemplatePixel::NOMINAL_REFINEMENT
    };

    Ok(RefinementRegionHeader {
        region_info,
        template,
        tpgron,
        at_pixels,
    })
}

/// Decode a complete generic refinement region segment.
///
/// `reference` produces the bitmap being refined for the parsed region info,
/// either a referred-to intermediate region or the part of the page under the
/// region (7.4.7.5). Its dimensions must match the region.
pub(crate) fn decode_region(
    data: &[u8],
    max_pixels: u64,
    reference: impl FnOnce(&RegionSegmentInfo) -> Result<Image>,
) -> Result<(RegionSegmentInfo, Image)> {
    let mut reader = Reader::new(data);
    let header = parse(&mut reader)?;
    let encoded = reader.tail().ok_or(ParseError::UnexpectedEof)?;

    let info = header.region_info;
    check_size(info.width, info.height, max_pixels)?;

    let reference = reference(&info)?;
    if reference.width() != info.width || reference.height() != info.height {
        bail!(RegionError::InvalidDimension);
    }

    let params = RefinementParams {
        template: header.template,
        tpgron: header.tpgron,
        reference: &reference,
        reference_dx: 0,
        reference_dy: 0,
        at_pixels: header.at_pixels,
    };

    let mut image = Image::new(info.width, info.height)?;
    let mut decoder = ArithmeticDecoder::new(encoded);
    let mut contexts = vec![Context::default(); CONTEXT_COUNT];

    decode_bitmap(&params, &mut decoder, &mut contexts, &mut image)?;

    Ok((info, image))
}

/// Decode a refinement bitmap (6.3.5.6) into the blank `image`.
pub(crate) fn decode_bitmap(
    params: &RefinementParams<'_>,
    decoder: &mut ArithmeticDecoder<'_>,
    contexts: &mut [Context],
    image: &mut Image,
) -> Result<()> {
    if params.template == 0 {
        bail!(Feature::RefinementTemplate0);
    }

    if params.tpgron {
        bail!(Feature::Tpgron);
    }

    if contexts.len() < CONTEXT_COUNT {
        bail!(RegionError::InvalidDimension);
    }

    let reference = params.reference;
    let dx = params.reference_dx as i64;
    let dy = params.reference_dy as i64;

    for y in 0..image.height() {
        for x in 0..image.width() {
            let (xi, yi) = (x as i64, y as i64);
            let (rx, ry) = (xi - dx, yi - dy);

            let own = |ox: i64, oy: i64| image.pixel(xi + ox, yi + oy);
            let refd = |ox: i64, oy: i64| reference.pixel(rx + ox, ry + oy);

            let context = own(-1, 0)
                | (own(1, -1) << 1)
                | (own(0, -1) << 2)
                | (own(-1, -1) << 3)
                | (refd(1, 1) << 4)
                | (refd(0, 1) << 5)
                | (refd(1, 0) << 6)
                | (refd(0, 0) << 7)
                | (refd(-1, 0) << 8)
                | (refd(0, -1) << 9);

            let bit = decoder.decode(&mut contexts[context as usize]);
            image.set_pixel(x, y, bit != 0);
        }
    }

    Ok(())
}
