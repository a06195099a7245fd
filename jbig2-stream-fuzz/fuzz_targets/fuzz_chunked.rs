#![no_main]

use jbig2_stream::{DecodeOptions, Decoder};
use libfuzzer_sys::fuzz_target;

// The first byte picks the chunk size and whether the rest is an embedded
// stream, so the incremental paths see every split point.
fuzz_target!(|data: &[u8]| {
    let Some((&control, data)) = data.split_first() else {
        return;
    };

    let options = DecodeOptions {
        embedded: control & 0x80 != 0,
        max_pixels: 1 << 24,
        ..DecodeOptions::default()
    };
    let chunk_size = usize::from(control & 0x7F) + 1;

    let mut decoder = Decoder::new(options);
    for chunk in data.chunks(chunk_size) {
        if decoder.feed(chunk).is_err() {
            break;
        }

        while decoder.page_out().is_some() {}
    }

    decoder.complete_page();
    while decoder.page_out().is_some() {}
});
