//! Page information segments (7.4.8) and the pages being assembled.

use crate::decode::CombinationOperator;
use crate::error::{ParseError, RegionError, Result, bail};
use crate::image::{Image, check_size};
use crate::reader::Reader;

/// Parsed page information segment (7.4.8).
#[derive(Debug, Clone)]
pub(crate) struct PageInformation {
    pub(crate) width: u32,
    /// `None` if the height is not known up front (0xFFFFFFFF).
    pub(crate) height: Option<u32>,
    pub(crate) x_resolution: u32,
    pub(crate) y_resolution: u32,
    pub(crate) default_pixel: bool,
    pub(crate) default_operator: CombinationOperator,
    /// Whether regions may use their own combination operator. If not,
    /// every region is combined with `default_operator`.
    pub(crate) operator_override: bool,
    pub(crate) striped: bool,
    pub(crate) max_stripe_size: u16,
}

impl PageInformation {
    pub(crate) fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(data);

        let width = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;
        let height = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;
        let x_resolution = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;
        let y_resolution = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;
        let flags = reader.read_byte().ok_or(ParseError::UnexpectedEof)?;
        let striping = reader.read_u16().ok_or(ParseError::UnexpectedEof)?;

        // Bits 3-4 only have room for OR, AND, XOR and XNOR.
        let default_operator = CombinationOperator::from_value((flags >> 3) & 0x03)?;

        Ok(Self {
            width,
            height: (height != 0xFFFF_FFFF).then_some(height),
            x_resolution,
            y_resolution,
            default_pixel: flags & 0x04 != 0,
            default_operator,
            operator_override: flags & 0x40 != 0,
            striped: striping & 0x8000 != 0,
            max_stripe_size: striping & 0x7FFF,
        })
    }
}

/// The lifecycle of a [`Page`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// The page's image has been handed out by [`Decoder::page_out`].
    ///
    /// [`Decoder::page_out`]: crate::Decoder::page_out
    Free,
    /// Regions are still being added to the page.
    New,
    /// The page is finished and its image can be retrieved.
    Complete,
}

/// A page of the document and its bitmap.
#[derive(Debug, Clone)]
pub struct Page {
    number: u32,
    /// The page association of the page information segment.
    association: u32,
    info: PageInformation,
    state: PageState,
    image: Option<Image>,
    /// The row after the last end of stripe segment.
    end_row: Option<u32>,
}

impl Page {
    pub(crate) fn new(
        number: u32,
        association: u32,
        info: PageInformation,
        max_pixels: u64,
    ) -> Result<Self> {
        // A page of unknown height starts out one stripe high and grows.
        let height = info.height.unwrap_or(u32::from(info.max_stripe_size));

        check_size(info.width, height, max_pixels)?;
        let image = Image::new_filled(info.width, height, info.default_pixel)?;

        Ok(Self {
            number,
            association,
            info,
            state: PageState::New,
            image: Some(image),
            end_row: None,
        })
    }

    /// The 1-based page number, in order of appearance.
    pub fn number(&self) -> u32 {
        self.number
    }

    pub(crate) fn association(&self) -> u32 {
        self.association
    }

    /// The width of the page in pixels.
    pub fn width(&self) -> u32 {
        self.info.width
    }

    /// The height declared by the page information segment, `None` if the
    /// height is only known once the page is complete.
    pub fn declared_height(&self) -> Option<u32> {
        self.info.height
    }

    /// The current height of the page bitmap.
    pub fn height(&self) -> u32 {
        self.image.as_ref().map_or(0, Image::height)
    }

    /// Horizontal and vertical resolution in pixels per metre, 0 if unknown.
    pub fn resolution(&self) -> (u32, u32) {
        (self.info.x_resolution, self.info.y_resolution)
    }

    /// The value every pixel starts out with.
    pub fn default_pixel(&self) -> bool {
        self.info.default_pixel
    }

    /// The page's default combination operator.
    pub fn default_operator(&self) -> CombinationOperator {
        self.info.default_operator
    }

    /// Whether regions may combine with an operator other than
    /// [`Page::default_operator`].
    pub fn allows_operator_override(&self) -> bool {
        self.info.operator_override
    }

    /// Whether the page may be delivered in stripes.
    pub fn is_striped(&self) -> bool {
        self.info.striped
    }

    /// Where the page is in its lifecycle.
    pub fn state(&self) -> PageState {
        self.state
    }

    pub(crate) fn image(&self) -> Option<&Image> {
        self.image.as_ref()
    }

    /// Combine a region bitmap into the page at (x, y), with `op` unless the
    /// page forces its default operator.
    pub(crate) fn compose(
        &mut self,
        region: &Image,
        x: u32,
        y: u32,
        op: CombinationOperator,
        max_pixels: u64,
    ) -> Result<()> {
        let bottom = u64::from(y) + u64::from(region.height());

        if self.info.height.is_none() && bottom > u64::from(self.height()) {
            let Ok(bottom) = u32::try_from(bottom) else {
                bail!(RegionError::TooLarge);
            };
            self.grow(bottom, max_pixels)?;
        }

        let op = if self.info.operator_override {
            op
        } else {
            self.info.default_operator
        };

        if let Some(image) = &mut self.image {
            image.compose(region, i64::from(x), i64::from(y), op);
        }

        Ok(())
    }

    /// Handle an end of stripe segment ending at `end_row` (7.4.10).
    pub(crate) fn end_stripe(&mut self, end_row: u32, max_pixels: u64) -> Result<()> {
        if self.info.height.is_none() {
            self.grow(end_row.saturating_add(1), max_pixels)?;
        }

        self.end_row = Some(end_row.saturating_add(1));

        Ok(())
    }

    fn grow(&mut self, height: u32, max_pixels: u64) -> Result<()> {
        if height <= self.height() {
            return Ok(());
        }

        check_size(self.info.width, height, max_pixels)?;

        if let Some(image) = &mut self.image {
            image.resize_height(height, self.info.default_pixel)?;
        }

        Ok(())
    }

    /// Mark the page complete. A page of unknown height takes the height
    /// established by its last end of stripe segment.
    pub(crate) fn complete(&mut self) -> Result<()> {
        if self.state != PageState::New {
            return Ok(());
        }

        self.state = PageState::Complete;

        if let (None, Some(end_row), Some(image)) = (self.info.height, self.end_row, &mut self.image)
        {
            image.resize_height(end_row, self.info.default_pixel)?;
        }

        Ok(())
    }

    pub(crate) fn take_image(&mut self) -> Option<Image> {
        if self.state != PageState::Complete {
            return None;
        }

        self.state = PageState::Free;
        self.image.take()
    }
}
