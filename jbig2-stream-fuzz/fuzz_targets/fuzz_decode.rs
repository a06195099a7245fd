#![no_main]

use jbig2_stream::{DecodeOptions, decode_with};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let options = DecodeOptions {
        max_pixels: 1 << 24,
        ..DecodeOptions::default()
    };

    let _ = decode_with(data, options, None);
});
