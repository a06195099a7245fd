//! The decode session: feeds input through the file parser and dispatches
//! every complete segment to its region or dictionary decoder.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::ToString;
use alloc::vec::Vec;

use crate::decode::{RegionSegmentInfo, generic, generic_refinement, symbol, text};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{
    DecodeError, FormatError, ParseError, Result, SegmentError, SymbolError, bail,
};
use crate::file::{Event, FileHeader, FileParser};
use crate::image::Image;
use crate::page::{Page, PageInformation, PageState};
use crate::reader::Reader;
use crate::segment::{SegmentHeader, SegmentType};
use crate::symbol_store::{Dictionaries, SymbolStore};

/// Options for a [`Decoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// The input has no file header and consists of sequentially organised
    /// segments, as JBIG2 streams embedded in PDF do.
    pub embedded: bool,
    /// The most input bytes buffered at once. Exceeding it is a fatal error.
    pub max_buffer_size: usize,
    /// The most pixels of any single page or region bitmap.
    pub max_pixels: u64,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            embedded: false,
            max_buffer_size: 256 * 1024 * 1024,
            max_pixels: 1 << 30,
        }
    }
}

/// The result of [`Decoder::feed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// All buffered input was processed; more is needed to continue.
    NeedMoreInput,
    /// The end of file segment was reached. Further input is ignored.
    Finished,
}

/// The result of [`Decoder::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing can be done until more input is fed.
    NeedMoreInput,
    /// A header or segment was processed.
    Progressed,
    /// The end of file segment was reached.
    Finished,
}

/// Symbol dictionaries decoded from a global segment stream.
///
/// PDF stores segments shared by several JBIG2 images in a separate
/// `JBIG2Globals` stream. Decode it once and hand it to
/// [`Decoder::with_globals`] for every image that uses it.
#[derive(Debug, Clone)]
pub struct Globals {
    symbols: SymbolStore,
    dictionaries: Dictionaries,
}

impl Globals {
    /// Decode an embedded stream of global segments.
    pub fn decode(data: &[u8]) -> Result<Self> {
        Self::decode_with_options(data, DecodeOptions::default())
    }

    /// Decode an embedded stream of global segments with the limits of
    /// `options`. The stream is always read as embedded.
    pub fn decode_with_options(data: &[u8], options: DecodeOptions) -> Result<Self> {
        let mut decoder = Decoder::new(DecodeOptions {
            embedded: true,
            ..options
        });

        decoder.feed(data)?;

        if !decoder.session.pages.is_empty() {
            bail!(FormatError::UnexpectedPage);
        }

        if decoder.parser.has_partial_input() && !decoder.parser.is_finished() {
            bail!(ParseError::UnexpectedEof);
        }

        Ok(Self {
            symbols: decoder.session.symbols,
            dictionaries: decoder.session.dictionaries,
        })
    }

    /// The number of symbols all global dictionaries export together.
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }
}

/// An incremental JBIG2 decoder.
///
/// Input is pushed with [`Decoder::feed`] in chunks of any size. Completed
/// pages are taken out with [`Decoder::page_out`].
///
/// ```
/// use jbig2_stream::{DecodeOptions, Decoder, Status};
///
/// let mut decoder = Decoder::new(DecodeOptions::default());
///
/// // Only the first bytes of a file header.
/// let status = decoder.feed(&[0x97, 0x4A, 0x42]).unwrap();
/// assert_eq!(status, Status::NeedMoreInput);
/// assert!(decoder.page_out().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct Decoder {
    parser: FileParser,
    session: Session,
    failed: Option<DecodeError>,
}

impl Decoder {
    /// Create a decoder for a standalone file or, with
    /// [`DecodeOptions::embedded`], an embedded stream.
    pub fn new(options: DecodeOptions) -> Self {
        Self {
            parser: FileParser::new(options.embedded, options.max_buffer_size),
            session: Session::new(options, SymbolStore::new(), Dictionaries::new()),
            failed: None,
        }
    }

    /// Create a decoder whose segments may refer to the dictionaries of
    /// `globals`.
    pub fn with_globals(options: DecodeOptions, globals: &Globals) -> Self {
        Self {
            parser: FileParser::new(options.embedded, options.max_buffer_size),
            session: Session::new(
                options,
                globals.symbols.clone(),
                globals.dictionaries.clone(),
            ),
            failed: None,
        }
    }

    /// Append `data` to the input and decode as far as possible.
    ///
    /// Segments that fail to decode are skipped and reported through
    /// [`Decoder::diagnostics`]. Errors returned here are fatal: the decoder
    /// keeps returning the same error afterwards.
    pub fn feed(&mut self, data: &[u8]) -> Result<Status> {
        if let Some(e) = self.failed {
            return Err(e);
        }

        if let Err(e) = self.parser.push(data) {
            return Err(self.fail(e));
        }

        loop {
            match self.step()? {
                Step::Progressed => {}
                Step::NeedMoreInput => return Ok(Status::NeedMoreInput),
                Step::Finished => return Ok(Status::Finished),
            }
        }
    }

    /// Advance by a single header or segment using the buffered input.
    pub fn step(&mut self) -> Result<Step> {
        if let Some(e) = self.failed {
            return Err(e);
        }

        let event = match self.parser.next() {
            Ok(event) => event,
            Err(e) => {
                self.failed = Some(e);
                self.session.diagnostics.fatal(e.to_string());
                return Err(e);
            }
        };

        match event {
            Event::NeedMoreInput => Ok(Step::NeedMoreInput),
            Event::Progressed => Ok(Step::Progressed),
            Event::FileHeader(header) => {
                self.session.file_header(header);
                Ok(Step::Progressed)
            }
            Event::Segment(header, body) => {
                self.session.process(&header, body);
                Ok(Step::Progressed)
            }
            Event::Finished => Ok(Step::Finished),
        }
    }

    fn fail(&mut self, e: DecodeError) -> DecodeError {
        self.failed = Some(e);
        self.session.diagnostics.fatal(e.to_string());
        e
    }

    /// Take the image of the next completed page, in page order.
    pub fn page_out(&mut self) -> Option<Image> {
        let session = &mut self.session;

        while let Some(page) = session.pages.get_mut(session.next_out) {
            match page.state() {
                PageState::New => return None,
                PageState::Free => session.next_out += 1,
                PageState::Complete => {
                    session.next_out += 1;
                    return page.take_image();
                }
            }
        }

        None
    }

    /// Mark the current page complete, for streams that end without an end
    /// of page segment.
    pub fn complete_page(&mut self) {
        self.session.complete_current_page();
    }

    /// All pages seen so far.
    pub fn pages(&self) -> &[Page] {
        &self.session.pages
    }

    /// Everything reported while decoding, oldest first.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.session.diagnostics.records()
    }

    /// Take everything reported so far, leaving the record empty.
    ///
    /// Long running decoders should call this now and then, the decoder
    /// keeps every diagnostic until it is taken.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.session.diagnostics.take()
    }
}

/// Everything decoded so far.
#[derive(Debug, Clone)]
struct Session {
    options: DecodeOptions,
    pages: Vec<Page>,
    /// Index of the page regions are drawn on.
    current_page: Option<usize>,
    /// Index of the next page [`Decoder::page_out`] looks at.
    next_out: usize,
    symbols: SymbolStore,
    dictionaries: Dictionaries,
    /// Intermediate regions by segment number, until their page is complete.
    regions: BTreeMap<u32, Image>,
    diagnostics: Diagnostics,
}

impl Session {
    fn new(options: DecodeOptions, symbols: SymbolStore, dictionaries: Dictionaries) -> Self {
        Self {
            options,
            pages: Vec::new(),
            current_page: None,
            next_out: 0,
            symbols,
            dictionaries,
            regions: BTreeMap::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    fn file_header(&mut self, header: FileHeader) {
        let organisation = if header.sequential {
            "sequential"
        } else {
            "random-access"
        };

        let message = match header.page_count {
            Some(count) => format!("{organisation} file with {count} pages"),
            None => format!("{organisation} file with an unknown number of pages"),
        };
        self.diagnostics.info(None, message);

        if header.extended_templates || header.coloured_regions {
            self.diagnostics.debug(
                None,
                format!(
                    "file header flags: extended templates {}, coloured regions {}",
                    header.extended_templates, header.coloured_regions
                ),
            );
        }
    }

    /// Decode a segment, turning any error into a warning.
    fn process(&mut self, header: &SegmentHeader, body: &[u8]) {
        self.diagnostics.debug(
            Some(header.number),
            format!(
                "{:?}, page {}, refers to {:?}, {} bytes{}",
                header.segment_type,
                header.page_association,
                header.referred_to,
                body.len(),
                if header.deferred_non_retain {
                    ", deferred non-retain"
                } else {
                    ""
                }
            ),
        );

        if let Err(e) = self.dispatch(header, body) {
            self.diagnostics
                .warning(Some(header.number), format!("{e}, segment skipped"));
        }
    }

    fn dispatch(&mut self, header: &SegmentHeader, body: &[u8]) -> Result<()> {
        let max_pixels = self.options.max_pixels;

        match header.segment_type {
            SegmentType::SymbolDictionary => {
                let input = self.dictionaries.collect(&header.referred_to);
                let exports = symbol::decode(body, &input, &mut self.symbols, max_pixels)?;

                self.diagnostics.debug(
                    Some(header.number),
                    format!(
                        "{} input symbols, {} exported symbols",
                        input.len(),
                        exports.len()
                    ),
                );
                self.dictionaries
                    .insert(header.number, header.page_association, exports);
            }
            SegmentType::IntermediateTextRegion => {
                let (_, image) = self.text_region(header, body)?;
                self.regions.insert(header.number, image);
            }
            SegmentType::ImmediateTextRegion | SegmentType::ImmediateLosslessTextRegion => {
                let (info, image) = self.text_region(header, body)?;
                self.compose(&info, &image)?;
            }
            SegmentType::IntermediateGenericRegion => {
                let (_, image) =
                    generic::decode_region(body, header.data_length.is_none(), max_pixels)?;
                self.regions.insert(header.number, image);
            }
            SegmentType::ImmediateGenericRegion | SegmentType::ImmediateLosslessGenericRegion => {
                let (info, image) =
                    generic::decode_region(body, header.data_length.is_none(), max_pixels)?;
                self.compose(&info, &image)?;
            }
            SegmentType::IntermediateGenericRefinementRegion => {
                let (_, image) = self.refinement_region(header, body)?;
                self.regions.insert(header.number, image);
            }
            SegmentType::ImmediateGenericRefinementRegion
            | SegmentType::ImmediateLosslessGenericRefinementRegion => {
                let (info, image) = self.refinement_region(header, body)?;
                self.compose(&info, &image)?;
            }
            SegmentType::PageInformation => self.page_information(header, body)?,
            SegmentType::EndOfPage => self.complete_current_page(),
            SegmentType::EndOfStripe => {
                let end_row = Reader::new(body)
                    .read_u32()
                    .ok_or(ParseError::UnexpectedEof)?;
                let page = self.current_page_mut()?;
                page.end_stripe(end_row, max_pixels)?;
            }
            SegmentType::EndOfFile => self.complete_current_page(),
            SegmentType::PatternDictionary
            | SegmentType::IntermediateHalftoneRegion
            | SegmentType::ImmediateHalftoneRegion
            | SegmentType::ImmediateLosslessHalftoneRegion
            | SegmentType::Profiles
            | SegmentType::Tables
            | SegmentType::ColourPalette
            | SegmentType::Extension => {
                self.diagnostics.warning(
                    Some(header.number),
                    format!("{:?} segments are not supported, skipped", header.segment_type),
                );
            }
            SegmentType::Reserved(value) => {
                self.diagnostics.warning(
                    Some(header.number),
                    format!("reserved segment type {value}, skipped"),
                );
            }
        }

        Ok(())
    }

    fn text_region(
        &self,
        header: &SegmentHeader,
        body: &[u8],
    ) -> Result<(RegionSegmentInfo, Image)> {
        let ids = self.dictionaries.collect(&header.referred_to);
        let symbols = ids
            .iter()
            .map(|id| self.symbols.get(*id))
            .collect::<Option<Vec<&Image>>>()
            .ok_or(SymbolError::OutOfRange)?;

        text::decode_region(body, &symbols, self.options.max_pixels)
    }

    /// The reference of a refinement region is the region it refers to, or
    /// the part of the page it covers if it refers to none (7.4.7.5).
    fn refinement_region(
        &self,
        header: &SegmentHeader,
        body: &[u8],
    ) -> Result<(RegionSegmentInfo, Image)> {
        let max_pixels = self.options.max_pixels;

        if let Some(referred) = header.referred_to.first() {
            let reference = self
                .regions
                .get(referred)
                .ok_or(SegmentError::MissingRegion)?;

            generic_refinement::decode_region(body, max_pixels, |_| Ok(reference.clone()))
        } else {
            let page = self.current_page()?;
            let image = page.image().ok_or(FormatError::MissingPageInfo)?;

            generic_refinement::decode_region(body, max_pixels, |info| {
                image.sub_image(info.x_location, info.y_location, info.width, info.height)
            })
        }
    }

    fn compose(&mut self, info: &RegionSegmentInfo, image: &Image) -> Result<()> {
        let max_pixels = self.options.max_pixels;
        let page = self.current_page_mut()?;

        page.compose(
            image,
            info.x_location,
            info.y_location,
            info.combination_operator,
            max_pixels,
        )
    }

    fn page_information(&mut self, header: &SegmentHeader, body: &[u8]) -> Result<()> {
        self.complete_current_page();

        let info = PageInformation::parse(body)?;
        let number = u32::try_from(self.pages.len() + 1).map_err(|_| DecodeError::Overflow)?;
        let page = Page::new(
            number,
            header.page_association,
            info,
            self.options.max_pixels,
        )?;

        let height = match page.declared_height() {
            Some(height) => format!("{height}"),
            None => "unknown".to_string(),
        };
        self.diagnostics.info(
            None,
            format!("page {number}: {} x {height} pixels", page.width()),
        );

        self.current_page = Some(self.pages.len());
        self.pages.push(page);

        Ok(())
    }

    fn complete_current_page(&mut self) {
        let Some(index) = self.current_page.take() else {
            return;
        };

        let Some(page) = self.pages.get_mut(index) else {
            return;
        };

        match page.complete() {
            Ok(()) => self.diagnostics.info(
                None,
                format!(
                    "page {} complete, {} x {} pixels",
                    page.number(),
                    page.width(),
                    page.height()
                ),
            ),
            Err(e) => self
                .diagnostics
                .warning(None, format!("page {}: {e}", page.number())),
        }

        let association = page.association();

        // Intermediate regions belong to the page they were decoded for.
        self.regions.clear();
        self.release_dictionaries(association);
    }

    /// Drop the dictionaries of a completed page and the symbols only they
    /// exported. Segments of other pages may not refer to them.
    fn release_dictionaries(&mut self, association: u32) {
        let released = self.dictionaries.release_page(association);
        if released == 0 {
            return;
        }

        let before = self.symbols.len();
        self.symbols.retain(&self.dictionaries.live_symbols());

        self.diagnostics.debug(
            None,
            format!(
                "released {released} dictionaries and {} symbols of page {association}",
                before - self.symbols.len()
            ),
        );
    }

    fn current_page(&self) -> Result<&Page> {
        self.current_page
            .and_then(|index| self.pages.get(index))
            .ok_or(FormatError::MissingPageInfo.into())
    }

    fn current_page_mut(&mut self) -> Result<&mut Page> {
        self.current_page
            .and_then(|index| self.pages.get_mut(index))
            .ok_or(FormatError::MissingPageInfo.into())
    }
}
