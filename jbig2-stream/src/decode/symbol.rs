//! Symbol dictionary segment parsing and decoding (7.4.2, 6.5).

use alloc::vec;
use alloc::vec::Vec;

use super::generic::{self, GenericRegionParams};
use super::{AdaptiveTemplatePixel, parse_generic_at_pixels, parse_refinement_at_pixels};
use crate::arithmetic_decoder::{ArithmeticDecoder, Context};
use crate::error::{Feature, FormatError, ParseError, Result, SymbolError, bail};
use crate::image::{Image, check_size};
use crate::integer_decoder::IntegerDecoder;
use crate::log::ldebug;
use crate::reader::Reader;
use crate::symbol_store::{SymbolId, SymbolStore};

/// Parsed symbol dictionary segment data header (7.4.2.1).
#[derive(Debug, Clone)]
pub(crate) struct SymbolDictionaryHeader {
    pub(crate) huffman: bool,
    pub(crate) refinement_aggregate: bool,
    pub(crate) context_used: bool,
    pub(crate) context_retained: bool,
    pub(crate) template: u8,
    pub(crate) at_pixels: [AdaptiveTemplatePixel; 4],
    pub(crate) num_exported_symbols: u32,
    pub(crate) num_new_symbols: u32,
}

pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<SymbolDictionaryHeader> {
    let flags = reader.read_u16().ok_or(ParseError::UnexpectedEof)?;

    let huffman = flags & 0x0001 != 0;
    let refinement_aggregate = flags & 0x0002 != 0;
    // Bits 2-7 select Huffman tables and are only meaningful with SDHUFF.
    let context_used = flags & 0x0100 != 0;
    let context_retained = flags & 0x0200 != 0;
    let template = ((flags >> 10) & 0x03) as u8;
    let refinement_template = ((flags >> 12) & 0x01) as u8;

    if flags & 0xE000 != 0 {
        bail!(FormatError::ReservedBits);
    }

    let at_pixels = if huffman {
        [AdaptiveTemplatePixel::NOMINAL_TEMPLATE1; 4]
    } else {
        parse_generic_at_pixels(reader, generic::at_pixel_count(template))?
    };

    if refinement_aggregate && refinement_template == 0 {
        parse_refinement_at_pixels(reader)?;
    }

    let num_exported_symbols = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;
    let num_new_symbols = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;

    Ok(SymbolDictionaryHeader {
        huffman,
        refinement_aggregate,
        context_used,
        context_retained,
        template,
        at_pixels,
        num_exported_symbols,
        num_new_symbols,
    })
}

/// Decode a symbol dictionary segment (6.5.5).
///
/// `input` are the symbols exported by the referred-to dictionaries
/// (SDINSYMS). Newly decoded symbols that end up exported are added to
/// `store`; the returned list is the dictionary's export list (SDEXSYMS).
pub(crate) fn decode(
    data: &[u8],
    input: &[SymbolId],
    store: &mut SymbolStore,
    max_pixels: u64,
) -> Result<Vec<SymbolId>> {
    let mut reader = Reader::new(data);
    let header = parse(&mut reader)?;

    if header.huffman {
        bail!(Feature::Huffman);
    }

    if header.refinement_aggregate {
        bail!(Feature::RefinementAggregate);
    }

    if header.context_used {
        bail!(Feature::ContextReuse);
    }

    if header.context_retained {
        ldebug!("dropping retained symbol dictionary contexts");
    }

    let num_input = input.len() as u64;
    if u64::from(header.num_exported_symbols) > num_input + u64::from(header.num_new_symbols) {
        bail!(SymbolError::ExportCountMismatch);
    }

    let encoded = reader.tail().ok_or(ParseError::UnexpectedEof)?;
    let mut decoder = ArithmeticDecoder::new(encoded);

    let new_symbols = decode_new_symbols(&header, &mut decoder, max_pixels)?;
    let flags = decode_export_flags(&mut decoder, input.len() + new_symbols.len())?;

    if flags.iter().filter(|exported| **exported).count() != header.num_exported_symbols as usize {
        bail!(SymbolError::ExportCountMismatch);
    }

    let (input_flags, new_flags) = flags.split_at(input.len());
    let mut exports = Vec::with_capacity(header.num_exported_symbols as usize);

    exports.extend(
        input
            .iter()
            .zip(input_flags)
            .filter(|(_, exported)| **exported)
            .map(|(id, _)| *id),
    );

    for (symbol, exported) in new_symbols.into_iter().zip(new_flags) {
        if *exported {
            exports.push(store.push(symbol));
        }
    }

    Ok(exports)
}

const MAX_EMPTY_HEIGHT_CLASSES: usize = 1 << 16;

/// Decode the height classes of new symbols (6.5.5, steps 3 and 4).
fn decode_new_symbols(
    header: &SymbolDictionaryHeader,
    decoder: &mut ArithmeticDecoder<'_>,
    max_pixels: u64,
) -> Result<Vec<Image>> {
    let params = GenericRegionParams::for_symbol(header.template, header.at_pixels);
    let mut contexts = vec![Context::default(); generic::CONTEXT_COUNT];

    let mut iadh = IntegerDecoder::new();
    let mut iadw = IntegerDecoder::new();

    let num_new = header.num_new_symbols as usize;
    let mut symbols = Vec::new();
    let mut height_class_height = 0_i64;
    let mut empty_classes = 0_usize;

    while symbols.len() < num_new {
        let delta_height = iadh.decode(decoder).ok_or(SymbolError::UnexpectedOob)?;
        height_class_height += i64::from(delta_height);

        let height =
            u32::try_from(height_class_height).map_err(|_| SymbolError::NegativeDimension)?;
        let mut width = 0_i64;
        let class_start = symbols.len();

        // An OOB delta width ends the height class.
        while let Some(delta_width) = iadw.decode(decoder) {
            width += i64::from(delta_width);

            let symbol_width = u32::try_from(width).map_err(|_| SymbolError::NegativeDimension)?;

            if symbols.len() == num_new {
                bail!(SymbolError::TooManySymbols);
            }

            check_size(symbol_width, height, max_pixels)?;

            let mut symbol = Image::new(symbol_width, height)?;
            generic::decode_bitmap(&params, decoder, &mut contexts, &mut symbol)?;
            symbols.push(symbol);
        }

        // Empty height classes are allowed, but a stream of nothing else
        // would never end.
        if symbols.len() == class_start {
            empty_classes += 1;
            if empty_classes > MAX_EMPTY_HEIGHT_CLASSES {
                bail!(SymbolError::TooManyHeightClasses);
            }
        }
    }

    Ok(symbols)
}

/// Decode which of the input and new symbols are exported (6.5.10).
///
/// Runs alternate between not exported and exported, starting with not
/// exported, and must add up to exactly `total`.
fn decode_export_flags(decoder: &mut ArithmeticDecoder<'_>, total: usize) -> Result<Vec<bool>> {
    let mut iaex = IntegerDecoder::new();
    let mut flags = Vec::with_capacity(total);
    let mut exported = false;
    let mut runs = 0_usize;

    while flags.len() < total {
        // Only empty runs could make this loop forever.
        runs += 1;
        if runs > 2 * total + 1 {
            bail!(SymbolError::ExportOverrun);
        }

        let run_length = iaex.decode(decoder).ok_or(SymbolError::UnexpectedOob)?;
        let run_length = usize::try_from(run_length).map_err(|_| SymbolError::ExportOverrun)?;

        if run_length > total - flags.len() {
            bail!(SymbolError::ExportOverrun);
        }

        flags.resize(flags.len() + run_length, exported);
        exported = !exported;
    }

    Ok(flags)
}
