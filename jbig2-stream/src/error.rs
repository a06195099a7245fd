//! Errors reported by the decoder.
//!
//! Every error is a small `Copy` value grouped by the stage that raised it.
//! Inside a segment body an error only skips that segment; see
//! [`Decoder::feed`](crate::Decoder::feed) for the errors that stop a stream.

use core::fmt;

/// Any error raised while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The data ended early.
    Parse(ParseError),
    /// File or page structure is malformed.
    Format(FormatError),
    /// A segment header is malformed or refers to something unusable.
    Segment(SegmentError),
    /// Region parameters are out of range.
    Region(RegionError),
    /// Adaptive template pixels are misplaced.
    Template(TemplateError),
    /// A symbol dictionary or text region is inconsistent.
    Symbol(SymbolError),
    /// The input buffer hit its limit.
    Buffer(BufferError),
    /// A coordinate or count left the representable range.
    Overflow,
    /// A feature of the format that this decoder does not implement.
    Unsupported(Feature),
}

/// Truncated data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// A field extends past the end of the available data.
    UnexpectedEof,
}

/// Malformed file or page structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    /// The file does not start with the JBIG2 identification string.
    InvalidHeader,
    /// A reserved bit is set.
    ReservedBits,
    /// A region segment appeared before any page information segment.
    MissingPageInfo,
    /// A page information segment appeared while decoding embedded globals.
    UnexpectedPage,
}

/// Malformed segment headers and references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentError {
    /// The referred-to segment count uses a reserved value.
    InvalidReferredCount,
    /// Segment refers to a segment number that is not lower than its own.
    InvalidReference,
    /// Only immediate generic regions may leave their data length unknown.
    UnknownLength,
    /// The referred-to region segment was never decoded.
    MissingRegion,
}

/// Invalid region parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionError {
    /// The combination operator is not one of the five defined ones.
    InvalidCombinationOperator,
    /// A width, height or row count does not fit.
    InvalidDimension,
    /// The bitmap would exceed [`DecodeOptions::max_pixels`](crate::DecodeOptions::max_pixels).
    TooLarge,
}

/// Invalid template configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateError {
    /// An AT pixel points at a pixel that is not decoded yet.
    InvalidAtPixel,
}

/// Inconsistent symbol dictionaries and text regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolError {
    /// A text region places instances but has no symbols.
    NoSymbols,
    /// More new symbols were decoded than the dictionary announced.
    TooManySymbols,
    /// A symbol ID past the end of the symbol list.
    OutOfRange,
    /// OOB where a value is required.
    UnexpectedOob,
    /// A height class or symbol width became negative.
    NegativeDimension,
    /// The export flags do not select exactly the announced number of symbols.
    ExportCountMismatch,
    /// The export run lengths run past the available symbols.
    ExportOverrun,
    /// A text region placed more instances than announced.
    TooManyInstances,
    /// A symbol dictionary kept decoding empty height classes.
    TooManyHeightClasses,
}

/// Incremental input errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// The buffered input exceeds [`DecodeOptions::max_buffer_size`](crate::DecodeOptions::max_buffer_size).
    LimitExceeded,
}

/// Optional parts of the format that are recognised but not decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// MMR (T.6) coded generic regions.
    Mmr,
    /// Typical prediction for generic direct coding.
    Tpgdon,
    /// Typical prediction for generic refinement coding.
    Tpgron,
    /// Generic region templates other than template 1.
    GenericTemplate(u8),
    /// Generic refinement template 0.
    RefinementTemplate0,
    /// Extended (12 AT pixel) generic templates.
    ExtendedTemplate,
    /// Huffman coded symbol dictionaries and text regions.
    Huffman,
    /// Refinement/aggregate coded symbol dictionaries.
    RefinementAggregate,
    /// Reuse of arithmetic contexts across symbol dictionaries.
    ContextReuse,
    /// Per-instance refinement in text regions.
    TextRefinement,
    /// Coloured region segments.
    Colour,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => fmt::Display::fmt(e, f),
            Self::Format(e) => fmt::Display::fmt(e, f),
            Self::Segment(e) => fmt::Display::fmt(e, f),
            Self::Region(e) => fmt::Display::fmt(e, f),
            Self::Template(e) => fmt::Display::fmt(e, f),
            Self::Symbol(e) => fmt::Display::fmt(e, f),
            Self::Buffer(e) => fmt::Display::fmt(e, f),
            Self::Overflow => f.write_str("coordinate overflow"),
            Self::Unsupported(feature) => write!(f, "{feature} is not yet supported"),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UnexpectedEof => "unexpected end of data",
        })
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidHeader => "not a JBIG2 file",
            Self::ReservedBits => "reserved bit set",
            Self::MissingPageInfo => "missing page information segment",
            Self::UnexpectedPage => "page information segment in global stream",
        })
    }
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidReferredCount => "reserved referred-to segment count",
            Self::InvalidReference => "reference to a later segment",
            Self::UnknownLength => "unknown data length outside a generic region",
            Self::MissingRegion => "referred-to region segment is missing",
        })
    }
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidCombinationOperator => "unknown combination operator",
            Self::InvalidDimension => "region dimensions out of range",
            Self::TooLarge => "region exceeds the image size limit",
        })
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidAtPixel => "AT pixel outside the causal neighbourhood",
        })
    }
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoSymbols => "text region without symbols",
            Self::TooManySymbols => "more new symbols than announced",
            Self::OutOfRange => "symbol ID out of range",
            Self::UnexpectedOob => "OOB where a value is required",
            Self::NegativeDimension => "negative symbol height or width",
            Self::ExportCountMismatch => "wrong number of exported symbols",
            Self::ExportOverrun => "export runs exceed the symbol count",
            Self::TooManyInstances => "more symbol instances than announced",
            Self::TooManyHeightClasses => "too many empty height classes",
        })
    }
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LimitExceeded => "input buffer limit exceeded",
        })
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mmr => f.write_str("MMR coding"),
            Self::Tpgdon => f.write_str("TPGDON"),
            Self::Tpgron => f.write_str("TPGRON"),
            Self::GenericTemplate(t) => write!(f, "generic region template {t}"),
            Self::RefinementTemplate0 => f.write_str("refinement template 0"),
            Self::ExtendedTemplate => f.write_str("extended generic template"),
            Self::Huffman => f.write_str("Huffman coding"),
            Self::RefinementAggregate => f.write_str("refinement/aggregate coding"),
            Self::ContextReuse => f.write_str("arithmetic context reuse"),
            Self::TextRefinement => f.write_str("text region refinement"),
            Self::Colour => f.write_str("colour extension"),
        }
    }
}

impl core::error::Error for DecodeError {}

/// `Error` for a category and the conversion into its [`DecodeError`] variant.
macro_rules! category {
    ($($category:ident => $variant:ident),* $(,)?) => {
        $(
            impl core::error::Error for $category {}

            impl From<$category> for DecodeError {
                fn from(e: $category) -> Self {
                    Self::$variant(e)
                }
            }
        )*
    };
}

category! {
    ParseError => Parse,
    FormatError => Format,
    SegmentError => Segment,
    RegionError => Region,
    TemplateError => Template,
    SymbolError => Symbol,
    BufferError => Buffer,
}

impl From<Feature> for DecodeError {
    fn from(feature: Feature) -> Self {
        Self::Unsupported(feature)
    }
}

/// Result type of the crate.
pub type Result<T> = core::result::Result<T, DecodeError>;

macro_rules! bail {
    ($err:expr) => {
        return Err($err.into())
    };
}

macro_rules! err {
    ($err:expr) => {
        Err($err.into())
    };
}

pub(crate) use bail;
pub(crate) use err;
