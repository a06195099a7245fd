/*!
A memory-safe, pure-Rust streaming JBIG2 decoder.

`jbig2-stream` decodes bi-level images compressed as specified in ITU-T T.88
(also known as ISO/IEC 14492), the format PDF uses for scanned text. Input is
pushed in chunks of any size and pages are handed out as soon as they are
complete, so a stream can be decoded while it is still being downloaded.

The arithmetic coded parts of the format are supported: generic regions with
template 1, generic refinement regions with template 1, symbol dictionaries
and text regions. Segments using Huffman or MMR coding, other templates,
typical prediction or halftoning are skipped with a warning.

# Example
```rust,no_run
use jbig2_stream::{DecodeOptions, Decoder};

let data = std::fs::read("image.jb2").unwrap();

let mut decoder = Decoder::new(DecodeOptions::default());
for chunk in data.chunks(4096) {
    decoder.feed(chunk).unwrap();
}
decoder.complete_page();

while let Some(page) = decoder.page_out() {
    println!("{}x{} page", page.width(), page.height());
}
```

For a complete file at hand, [`decode`] does the same in one call.

# Features
- `std` (default): Use the standard library.
- `logging` (default): Forward diagnostics to the `log` crate.
- `image` (default): Convert pages to `image::GrayImage` with
  [`Image::to_luma8`].

# Safety
This crate forbids unsafe code via a crate-level attribute.
*/

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

mod arithmetic_decoder;
mod decode;
mod decoder;
mod diagnostics;
mod error;
mod file;
mod image;
mod integer_decoder;
mod log;
mod page;
mod reader;
mod segment;
mod symbol_id_decoder;
mod symbol_store;
mod word_stream;

use alloc::vec::Vec;

pub use decode::CombinationOperator;
pub use decoder::{DecodeOptions, Decoder, Globals, Status, Step};
pub use diagnostics::{Diagnostic, Severity};
pub use error::{
    BufferError, DecodeError, Feature, FormatError, ParseError, RegionError, Result, SegmentError,
    SymbolError, TemplateError,
};
pub use image::Image;
pub use page::{Page, PageState};

/// Decode all pages of a standalone JBIG2 file.
///
/// A last page without an end of page segment is returned as well.
pub fn decode(data: &[u8]) -> Result<Vec<Image>> {
    decode_with(data, DecodeOptions::default(), None)
}

/// Decode all pages of `data` with the given options, resolving references
/// to `globals` if given.
pub fn decode_with(
    data: &[u8],
    options: DecodeOptions,
    globals: Option<&Globals>,
) -> Result<Vec<Image>> {
    let mut decoder = match globals {
        Some(globals) => Decoder::with_globals(options, globals),
        None => Decoder::new(options),
    };

    decoder.feed(data)?;
    decoder.complete_page();

    let mut pages = Vec::new();
    while let Some(page) = decoder.page_out() {
        pages.push(page);
    }

    Ok(pages)
}
