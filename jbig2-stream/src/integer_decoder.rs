//! Arithmetic integer decoding procedure (Annex A.2).

use alloc::vec;
use alloc::vec::Vec;

use crate::arithmetic_decoder::{ArithmeticDecoder, Context};

/// The magnitude classes of Figure A.1 as (number of value bits, offset).
///
/// A class is selected by a run of 1 bits terminated by a 0 bit, except for
/// the last class which is selected by the run alone.
const MAGNITUDE_CLASSES: [(u8, u32); 6] = [
    (2, 0),
    (4, 4),
    (6, 20),
    (8, 84),
    (12, 340),
    (32, 4436),
];

/// One arithmetic integer decoding procedure (IADH, IADW, IAEX, ...).
///
/// "Each arithmetic integer decoding procedure requires 512 bytes of storage
/// for its context memory." (A.2)
pub(crate) struct IntegerDecoder {
    contexts: Vec<Context>,
}

impl IntegerDecoder {
    pub(crate) fn new() -> Self {
        Self {
            contexts: vec![Context::default(); 512],
        }
    }

    /// Decode a signed integer, returning `None` for OOB.
    ///
    /// "The result of the integer arithmetic decoding procedure is equal to:
    /// V if S = 0; -V if S = 1 and V > 0; OOB if S = 1 and V = 0" (A.2)
    pub(crate) fn decode(&mut self, decoder: &mut ArithmeticDecoder<'_>) -> Option<i32> {
        let mut prev = 1_u32;

        let sign = self.decode_bit(decoder, &mut prev);

        let last = MAGNITUDE_CLASSES.len() - 1;
        let mut class = 0;

        while class < last && self.decode_bit(decoder, &mut prev) == 1 {
            class += 1;
        }

        let (bits, offset) = MAGNITUDE_CLASSES[class];
        let mut value = 0_u32;

        for _ in 0..bits {
            value = (value << 1) | self.decode_bit(decoder, &mut prev);
        }

        // Values of the 32-bit class do not fit an i32 in general; they wrap
        // like in a 32-bit implementation and callers check their ranges.
        let value = value.wrapping_add(offset) as i32;

        match (sign, value) {
            (0, v) => Some(v),
            (_, 0) => None,
            (_, v) => Some(v.wrapping_neg()),
        }
    }

    /// Decode a bit with context PREV and fold it into PREV (A.2, step 3).
    #[inline]
    fn decode_bit(&mut self, decoder: &mut ArithmeticDecoder<'_>, prev: &mut u32) -> u32 {
        let d = decoder.decode(&mut self.contexts[(*prev & 0x1FF) as usize]);

        // "PREV always contains the values of the eight most-recently-decoded
        // bits, plus a leading 1 bit" once more than eight bits were decoded.
        *prev = if *prev < 256 {
            (*prev << 1) | d
        } else {
            (((*prev << 1) | d) & 511) | 256
        };

        d
    }
}

#[cfg(test)]
mod tests {
    use super::IntegerDecoder;
    use crate::arithmetic_decoder::ArithmeticDecoder;

    #[test]
    fn decodes_deterministically() {
        let data = [0x84, 0xC7, 0x3B, 0xFC, 0xE1, 0xA1, 0x43, 0x04, 0x02, 0x20];

        let run = || {
            let mut decoder = ArithmeticDecoder::new(&data);
            let mut int_decoder = IntegerDecoder::new();
            (0..32)
                .map(|_| int_decoder.decode(&mut decoder))
                .collect::<Vec<_>>()
        };

        assert_eq!(run(), run());
    }
}
