//! Region segment information and the shared region decoding parameters.

pub(crate) mod generic;
pub(crate) mod generic_refinement;
pub(crate) mod symbol;
pub(crate) mod text;

use crate::error::{
    Feature, FormatError, ParseError, RegionError, Result, TemplateError, bail, err,
};
use crate::reader::Reader;

/// How a region bitmap is combined with the bitmap below it (7.4.1.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinationOperator {
    /// 0 OR
    Or,
    /// 1 AND
    And,
    /// 2 XOR
    Xor,
    /// 3 XNOR
    Xnor,
    /// 4 REPLACE
    Replace,
}

impl CombinationOperator {
    pub(crate) fn from_value(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Or),
            1 => Ok(Self::And),
            2 => Ok(Self::Xor),
            3 => Ok(Self::Xnor),
            4 => Ok(Self::Replace),
            _ => err!(RegionError::InvalidCombinationOperator),
        }
    }

    /// Combine eight destination pixels with eight source pixels.
    #[inline]
    pub(crate) fn apply(self, dst: u8, src: u8) -> u8 {
        match self {
            Self::Or => dst | src,
            Self::And => dst & src,
            Self::Xor => dst ^ src,
            Self::Xnor => !(dst ^ src),
            Self::Replace => src,
        }
    }
}

/// The region segment information field (7.4.1).
#[derive(Debug, Clone)]
pub(crate) struct RegionSegmentInfo {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) x_location: u32,
    pub(crate) y_location: u32,
    /// "Bits 0-2: External combination operator."
    pub(crate) combination_operator: CombinationOperator,
}

impl RegionSegmentInfo {
    /// The 17 bytes this field occupies in the segment data.
    pub(crate) const SIZE: usize = 17;

    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let width = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;
        let height = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;
        let x_location = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;
        let y_location = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;
        let flags = reader.read_byte().ok_or(ParseError::UnexpectedEof)?;

        // Bit 3 is the colour extension flag, which is not decoded.
        if flags & 0x08 != 0 {
            bail!(Feature::Colour);
        }

        if flags & 0xF0 != 0 {
            bail!(FormatError::ReservedBits);
        }

        Ok(Self {
            width,
            height,
            x_location,
            y_location,
            combination_operator: CombinationOperator::from_value(flags & 0x07)?,
        })
    }
}

/// An adaptive template pixel, relative to the pixel being decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AdaptiveTemplatePixel {
    pub(crate) x: i8,
    pub(crate) y: i8,
}

impl AdaptiveTemplatePixel {
    /// The AT pixel position template 1 uses unless told otherwise.
    pub(crate) const NOMINAL_TEMPLATE1: Self = Self { x: 3, y: -1 };

    /// The nominal refinement AT pixels of template 0 (Figure 12).
    pub(crate) const NOMINAL_REFINEMENT: [Self; 2] = [Self { x: -1, y: -1 }, Self { x: -1, y: -1 }];
}

/// Read `count` AT pixels for a generic region.
///
/// Generic AT pixels must refer to already decoded pixels, that is lie
/// above the current row or to the left on the current row (6.2.5.4).
pub(crate) fn parse_generic_at_pixels(
    reader: &mut Reader<'_>,
    count: usize,
) -> Result<[AdaptiveTemplatePixel; 4]> {
    let mut pixels = [AdaptiveTemplatePixel::NOMINAL_TEMPLATE1; 4];

    for pixel in pixels.iter_mut().take(count) {
        let x = reader.read_i8().ok_or(ParseError::UnexpectedEof)?;
        let y = reader.read_i8().ok_or(ParseError::UnexpectedEof)?;

        if y > 0 || (y == 0 && x >= 0) {
            bail!(TemplateError::InvalidAtPixel);
        }

        *pixel = AdaptiveTemplatePixel { x, y };
    }

    Ok(pixels)
}

/// Read the two refinement AT pixels (7.4.7.3).
///
/// Only the first one lies in the bitmap being decoded and is subject to the
/// causality constraint; the second one addresses the reference bitmap.
pub(crate) fn parse_refinement_at_pixels(
    reader: &mut Reader<'_>,
) -> Result<[AdaptiveTemplatePixel; 2]> {
    let mut pixels = AdaptiveTemplatePixel::NOMINAL_REFINEMENT;

    for pixel in &mut pixels {
        let x = reader.read_i8().ok_or(ParseError::UnexpectedEof)?;
        let y = reader.read_i8().ok_or(ParseError::UnexpectedEof)?;
        *pixel = AdaptiveTemplatePixel { x, y };
    }

    let first = pixels[0];
    if first.y > 0 || (first.y == 0 && first.x >= 0) {
        bail!(TemplateError::InvalidAtPixel);
    }

    Ok(pixels)
}
