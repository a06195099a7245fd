//! The MQ arithmetic decoder (Annex E).
//!
//! "The arithmetic decoding procedure receives an arithmetically coded bit
//! sequence and an associated sequence of context labels, and reconstructs
//! the original string of binary symbols." (E.1.1)
//!
//! The decoder follows the software conventions of Annex G (Figures G.1 to
//! G.3), where the C-register holds the complement of the coded data. Its
//! input comes from a [`WordStream`]; any byte position at or past the end of
//! the stream reads as 0xFF, so a truncated stream behaves exactly as if it
//! had been terminated with a marker and never reads outside its buffer.

use crate::word_stream::WordStream;

/// Per-context probability state (E.2.4), packed into one byte.
///
/// "Each context has associated with it an index, I(CX), which identifies a
/// particular probability estimate and its associated MPS value." (E.2.4)
///
/// The low seven bits hold I(CX), the top bit holds MPS(CX).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Context(u8);

impl Context {
    #[inline(always)]
    fn index(self) -> usize {
        (self.0 & 0x7F) as usize
    }

    #[inline(always)]
    fn mps(self) -> u32 {
        (self.0 >> 7) as u32
    }

    #[inline(always)]
    fn set(&mut self, index: u8, mps: u32) {
        self.0 = index | ((mps as u8) << 7);
    }
}

/// The arithmetic decoder state (E.3.1).
pub(crate) struct ArithmeticDecoder<'a> {
    stream: WordStream<'a>,
    /// "Chigh and Clow can be thought of as one 32-bit C-register" (E.3.1)
    c: u32,
    /// The A-register, the current interval size.
    a: u32,
    /// CT, the number of bits left in Clow before the next BYTEIN.
    ct: u32,
    /// BP, the position of the current byte B.
    bp: usize,
    /// The word starting at `word_pos`, used to serve B and B1.
    word: u32,
    word_pos: usize,
}

impl<'a> ArithmeticDecoder<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        let stream = WordStream::new(data);

        let mut decoder = ArithmeticDecoder {
            stream,
            c: 0,
            a: 0,
            ct: 0,
            bp: 0,
            word: stream.word_at(0),
            word_pos: 0,
        };

        decoder.initialize();

        decoder
    }

    /// Decode one binary decision with the given context (Figure G.2).
    #[inline(always)]
    pub(crate) fn decode(&mut self, context: &mut Context) -> u32 {
        let entry = &QE_TABLE[context.index()];
        let qe = entry.qe as u32;

        // "A = A - Qe(I(CX))"
        self.a -= qe;

        let d = if (self.c >> 16) < self.a {
            if self.a & 0x8000 != 0 {
                return context.mps();
            }

            let d = self.exchange_mps(context, entry);
            self.renormalize();
            d
        } else {
            // "Chigh = Chigh - A"
            self.c -= self.a << 16;

            let d = self.exchange_lps(context, entry);
            self.renormalize();
            d
        };

        debug_assert!((0x8000..=0xFFFF).contains(&self.a));

        d
    }

    /// The INITDEC procedure (Figure G.1).
    fn initialize(&mut self) {
        let (b, _) = self.current_bytes();

        // "C = (B XOR 0xFF) << 16"
        self.c = ((b as u32) ^ 0xFF) << 16;
        self.read_byte();

        // "C = C << 7; CT = CT - 7; A = 0x8000"
        self.c <<= 7;
        self.ct -= 7;
        self.a = 0x8000;
    }

    /// The BYTEIN procedure (Figure G.3).
    #[inline(always)]
    fn read_byte(&mut self) {
        let (b, b1) = self.current_bytes();

        if b == 0xFF {
            if b1 > 0x8F {
                // A marker; BP stays put so every further BYTEIN sees it again.
                self.ct = 8;
            } else {
                self.bp += 1;
                self.c = self.c.wrapping_add(0xFE00).wrapping_sub((b1 as u32) << 9);
                self.ct = 7;
            }
        } else {
            self.bp += 1;
            let (b, _) = self.current_bytes();
            self.c = self.c.wrapping_add(0xFF00).wrapping_sub((b as u32) << 8);
            self.ct = 8;
        }
    }

    /// The RENORMD procedure (Figure E.18).
    #[inline(always)]
    fn renormalize(&mut self) {
        loop {
            if self.ct == 0 {
                self.read_byte();
            }

            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;

            if self.a & 0x8000 != 0 {
                break;
            }
        }
    }

    /// The `MPS_EXCHANGE` procedure (Figure E.16).
    #[inline(always)]
    fn exchange_mps(&mut self, context: &mut Context, entry: &QeEntry) -> u32 {
        let mps = context.mps();

        if self.a < entry.qe as u32 {
            context.set(entry.nlps, mps ^ entry.switch as u32);
            1 - mps
        } else {
            context.set(entry.nmps, mps);
            mps
        }
    }

    /// The `LPS_EXCHANGE` procedure (Figure E.17).
    #[inline(always)]
    fn exchange_lps(&mut self, context: &mut Context, entry: &QeEntry) -> u32 {
        let mps = context.mps();
        let qe = entry.qe as u32;

        let d = if self.a < qe {
            context.set(entry.nmps, mps);
            mps
        } else {
            context.set(entry.nlps, mps ^ entry.switch as u32);
            1 - mps
        };

        self.a = qe;

        d
    }

    /// The byte at BP and the one after it, with the marker convention applied
    /// past the end of the stream.
    #[inline(always)]
    fn current_bytes(&mut self) -> (u8, u8) {
        if self.bp < self.word_pos || self.bp - self.word_pos > 2 {
            self.word_pos = self.bp;
            self.word = self.stream.word_at(self.bp);
        }

        let shift = (self.bp - self.word_pos) as u32 * 8;
        let len = self.stream.len();

        let b = if self.bp < len {
            (self.word >> (24 - shift)) as u8
        } else {
            0xFF
        };
        let b1 = if self.bp + 1 < len {
            (self.word >> (16 - shift)) as u8
        } else {
            0xFF
        };

        (b, b1)
    }

    #[cfg(test)]
    pub(crate) fn a_register(&self) -> u32 {
        self.a
    }
}

/// One row of "Table E.1 – Qe values and probability estimation process".
#[derive(Debug, Clone, Copy)]
struct QeEntry {
    qe: u16,
    nmps: u8,
    nlps: u8,
    switch: bool,
}

const fn qe(qe: u16, nmps: u8, nlps: u8, switch: bool) -> QeEntry {
    QeEntry {
        qe,
        nmps,
        nlps,
        switch,
    }
}

#[rustfmt::skip]
static QE_TABLE: [QeEntry; 47] = [
    qe(0x5601, 1, 1, true),    qe(0x3401, 2, 6, false),   qe(0x1801, 3, 9, false),
    qe(0x0AC1, 4, 12, false),  qe(0x0521, 5, 29, false),  qe(0x0221, 38, 33, false),
    qe(0x5601, 7, 6, true),    qe(0x5401, 8, 14, false),  qe(0x4801, 9, 14, false),
    qe(0x3801, 10, 14, false), qe(0x3001, 11, 17, false), qe(0x2401, 12, 18, false),
    qe(0x1C01, 13, 20, false), qe(0x1601, 29, 21, false), qe(0x5601, 15, 14, true),
    qe(0x5401, 16, 14, false), qe(0x5101, 17, 15, false), qe(0x4801, 18, 16, false),
    qe(0x3801, 19, 17, false), qe(0x3401, 20, 18, false), qe(0x3001, 21, 19, false),
    qe(0x2801, 22, 19, false), qe(0x2401, 23, 20, false), qe(0x2201, 24, 21, false),
    qe(0x1C01, 25, 22, false), qe(0x1801, 26, 23, false), qe(0x1601, 27, 24, false),
    qe(0x1401, 28, 25, false), qe(0x1201, 29, 26, false), qe(0x1101, 30, 27, false),
    qe(0x0AC1, 31, 28, false), qe(0x09C1, 32, 29, false), qe(0x08A1, 33, 30, false),
    qe(0x0521, 34, 31, false), qe(0x0441, 35, 32, false), qe(0x02A1, 36, 33, false),
    qe(0x0221, 37, 34, false), qe(0x0141, 38, 35, false), qe(0x0111, 39, 36, false),
    qe(0x0085, 40, 37, false), qe(0x0049, 41, 38, false), qe(0x0025, 42, 39, false),
    qe(0x0015, 43, 40, false), qe(0x0009, 44, 41, false), qe(0x0005, 45, 42, false),
    qe(0x0001, 45, 43, false), qe(0x5601, 46, 46, false),
];
