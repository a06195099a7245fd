//! Word-oriented access to arithmetic coded data.

/// Supplies the arithmetic decoder with 32-bit big-endian words.
///
/// Bytes past the end of the underlying buffer read as zero. The arithmetic
/// decoder is responsible for treating those positions as a marker, see
/// [`crate::arithmetic_decoder`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct WordStream<'a> {
    data: &'a [u8],
}

impl<'a> WordStream<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// The number of real bytes in the stream.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    /// The four bytes starting at `offset`, zero-padded past the end.
    #[inline]
    pub(crate) fn word_at(&self, offset: usize) -> u32 {
        if let Some(bytes) = offset
            .checked_add(4)
            .and_then(|end| self.data.get(offset..end))
        {
            return u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }

        let mut word = [0_u8; 4];
        let tail = self.data.get(offset..).unwrap_or(&[]);

        for (dst, src) in word.iter_mut().zip(tail) {
            *dst = *src;
        }

        u32::from_be_bytes(word)
    }
}
