//! Symbol ID (IAID) decoding procedure (A.3).

use alloc::vec;
use alloc::vec::Vec;

use crate::arithmetic_decoder::{ArithmeticDecoder, Context};

/// Decodes fixed-width symbol IDs as a walk down a binary trie of contexts.
pub(crate) struct SymbolIdDecoder {
    contexts: Vec<Context>,
    code_len: u32,
}

impl SymbolIdDecoder {
    /// Create a decoder for `SBSYMCODELEN` bit IDs.
    ///
    /// "The number of contexts required is 2^SBSYMCODELEN" (A.3). The context
    /// at index 0 is never used since PREV always carries a leading 1 bit.
    pub(crate) fn new(code_len: u32) -> Self {
        Self {
            contexts: vec![Context::default(); 1_usize << code_len],
            code_len,
        }
    }

    pub(crate) fn decode(&mut self, decoder: &mut ArithmeticDecoder<'_>) -> u32 {
        let mut prev = 1_u32;

        for _ in 0..self.code_len {
            let d = decoder.decode(&mut self.contexts[prev as usize]);
            prev = (prev << 1) | d;
        }

        prev - (1 << self.code_len)
    }
}

/// SBSYMCODELEN for a given number of symbols, `ceil(log2(num_symbols))`.
pub(crate) fn symbol_code_length(num_symbols: u32) -> u32 {
    32 - num_symbols.saturating_sub(1).leading_zeros()
}
