//! Helpers to build JBIG2 streams for the integration tests.
//!
//! Contains an MQ encoder (T.88 E.2) and encoders mirroring the integer, symbol
//! ID and generic region decoding procedures, plus builders for the segments
//! used by the tests.

#![allow(dead_code)]

use jbig2_stream::Image;

pub const FILE_HEADER_ID: [u8; 8] = [0x97, 0x4A, 0x42, 0x32, 0x0D, 0x0A, 0x1A, 0x0A];

#[rustfmt::skip]
const QE_TABLE: [(u32, usize, usize, bool); 47] = [
    (0x5601, 1, 1, true),    (0x3401, 2, 6, false),   (0x1801, 3, 9, false),
    (0x0AC1, 4, 12, false),  (0x0521, 5, 29, false),  (0x0221, 38, 33, false),
    (0x5601, 7, 6, true),    (0x5401, 8, 14, false),  (0x4801, 9, 14, false),
    (0x3801, 10, 14, false), (0x3001, 11, 17, false), (0x2401, 12, 18, false),
    (0x1C01, 13, 20, false), (0x1601, 29, 21, false), (0x5601, 15, 14, true),
    (0x5401, 16, 14, false), (0x5101, 17, 15, false), (0x4801, 18, 16, false),
    (0x3801, 19, 17, false), (0x3401, 20, 18, false), (0x3001, 21, 19, false),
    (0x2801, 22, 19, false), (0x2401, 23, 20, false), (0x2201, 24, 21, false),
    (0x1C01, 25, 22, false), (0x1801, 26, 23, false), (0x1601, 27, 24, false),
    (0x1401, 28, 25, false), (0x1201, 29, 26, false), (0x1101, 30, 27, false),
    (0x0AC1, 31, 28, false), (0x09C1, 32, 29, false), (0x08A1, 33, 30, false),
    (0x0521, 34, 31, false), (0x0441, 35, 32, false), (0x02A1, 36, 33, false),
    (0x0221, 37, 34, false), (0x0141, 38, 35, false), (0x0111, 39, 36, false),
    (0x0085, 40, 37, false), (0x0049, 41, 38, false), (0x0025, 42, 39, false),
    (0x0015, 43, 40, false), (0x0009, 44, 41, false), (0x0005, 45, 42, false),
    (0x0001, 45, 43, false), (0x5601, 46, 46, false),
];

/// Probability state of one context.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cx {
    index: usize,
    mps: u8,
}

/// The MQ encoder of T.88 E.2, with the byte stuffing of E.2.8.
#[derive(Debug)]
pub struct MqEncoder {
    a: u32,
    c: u32,
    ct: u32,
    b: u32,
    /// Whether `b` holds a real output byte yet.
    started: bool,
    out: Vec<u8>,
}

impl MqEncoder {
    pub fn new() -> Self {
        Self {
            a: 0x8000,
            c: 0,
            ct: 12,
            b: 0,
            started: false,
            out: Vec::new(),
        }
    }

    pub fn encode(&mut self, cx: &mut Cx, bit: u8) {
        let (qe, nmps, nlps, switch) = QE_TABLE[cx.index];
        self.a -= qe;

        if bit == cx.mps {
            if self.a & 0x8000 == 0 {
                if self.a < qe {
                    self.a = qe;
                } else {
                    self.c += qe;
                }
                cx.index = nmps;
                self.renormalize();
            } else {
                self.c += qe;
            }
        } else {
            if self.a < qe {
                self.c += qe;
            } else {
                self.a = qe;
            }
            if switch {
                cx.mps = 1 - cx.mps;
            }
            cx.index = nlps;
            self.renormalize();
        }
    }

    fn renormalize(&mut self) {
        loop {
            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;

            if self.ct == 0 {
                self.byte_out();
            }

            if self.a & 0x8000 != 0 {
                break;
            }
        }
    }

    fn emit(&mut self) {
        if self.started {
            self.out.push(self.b as u8);
        }
        self.started = true;
    }

    fn byte_out(&mut self) {
        if self.b == 0xFF {
            self.emit();
            self.b = (self.c >> 20) & 0xFF;
            self.c &= 0xFFFFF;
            self.ct = 7;
        } else if self.c < 0x0800_0000 {
            self.emit();
            self.b = (self.c >> 19) & 0xFF;
            self.c &= 0x7FFFF;
            self.ct = 8;
        } else {
            self.b += 1;
            if self.b == 0xFF {
                self.c &= 0x07FF_FFFF;
                self.emit();
                self.b = (self.c >> 20) & 0xFF;
                self.c &= 0xFFFFF;
                self.ct = 7;
            } else {
                self.emit();
                self.b = (self.c >> 19) & 0xFF;
                self.c &= 0x7FFFF;
                self.ct = 8;
            }
        }
    }

    /// Flush the encoder (E.2.9) and terminate the data with 0xFF 0xAC.
    pub fn finish(mut self) -> Vec<u8> {
        let temp = self.c + self.a;
        self.c |= 0xFFFF;
        if self.c >= temp {
            self.c -= 0x8000;
        }

        self.c <<= self.ct;
        self.byte_out();
        self.c <<= self.ct;
        self.byte_out();

        self.emit();
        if self.b != 0xFF {
            self.out.push(0xFF);
        }
        self.out.push(0xAC);

        self.out
    }
}

/// Mirror of one arithmetic integer decoding procedure (A.2).
pub struct IntegerEncoder {
    contexts: Vec<Cx>,
}

impl IntegerEncoder {
    pub fn new() -> Self {
        Self {
            contexts: vec![Cx::default(); 512],
        }
    }

    /// Encode `value`, `None` being OOB.
    pub fn encode(&mut self, mq: &mut MqEncoder, value: Option<i32>) {
        let (sign, magnitude) = match value {
            None => (1, 0_u32),
            Some(v) => (u8::from(v < 0), v.unsigned_abs()),
        };

        let (prefix, bits, offset): (&[u8], u32, u32) = match magnitude {
            0..=3 => (&[0], 2, 0),
            4..=19 => (&[1, 0], 4, 4),
            20..=83 => (&[1, 1, 0], 6, 20),
            84..=339 => (&[1, 1, 1, 0], 8, 84),
            340..=4435 => (&[1, 1, 1, 1, 0], 12, 340),
            _ => (&[1, 1, 1, 1, 1], 32, 4436),
        };

        let mut prev = 1_u32;
        self.bit(mq, &mut prev, sign);

        for &bit in prefix {
            self.bit(mq, &mut prev, bit);
        }

        let value = magnitude - offset;
        for i in (0..bits).rev() {
            self.bit(mq, &mut prev, ((value >> i) & 1) as u8);
        }
    }

    fn bit(&mut self, mq: &mut MqEncoder, prev: &mut u32, bit: u8) {
        mq.encode(&mut self.contexts[(*prev & 0x1FF) as usize], bit);

        let d = u32::from(bit);
        *prev = if *prev < 256 {
            (*prev << 1) | d
        } else {
            (((*prev << 1) | d) & 511) | 256
        };
    }
}

/// Mirror of the IAID procedure (A.3).
pub struct SymbolIdEncoder {
    contexts: Vec<Cx>,
    code_len: u32,
}

impl SymbolIdEncoder {
    pub fn new(code_len: u32) -> Self {
        Self {
            contexts: vec![Cx::default(); 1 << code_len],
            code_len,
        }
    }

    pub fn encode(&mut self, mq: &mut MqEncoder, id: u32) {
        let mut prev = 1_usize;

        for i in (0..self.code_len).rev() {
            let bit = ((id >> i) & 1) as u8;
            mq.encode(&mut self.contexts[prev], bit);
            prev = (prev << 1) | bit as usize;
        }
    }
}

/// A bitmap as rows of pixels, `true` being black.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub rows: Vec<Vec<bool>>,
}

impl Bitmap {
    /// Parse rows of `#` (black) and `.` (white).
    pub fn parse(rows: &[&str]) -> Self {
        let rows: Vec<Vec<bool>> = rows
            .iter()
            .map(|row| row.chars().map(|c| c == '#').collect())
            .collect();

        Self {
            width: rows.first().map_or(0, |row| row.len() as u32),
            height: rows.len() as u32,
            rows,
        }
    }

    /// A deterministic pseudo random bitmap.
    pub fn noise(width: u32, height: u32, seed: u32) -> Self {
        let mut state = seed.wrapping_mul(0x9E37_79B9) | 1;
        let rows = (0..height)
            .map(|_| {
                (0..width)
                    .map(|_| {
                        state ^= state << 13;
                        state ^= state >> 17;
                        state ^= state << 5;
                        state % 3 == 0
                    })
                    .collect()
            })
            .collect();

        Self {
            width,
            height,
            rows,
        }
    }

    pub fn blank(width: u32, height: u32, value: bool) -> Self {
        Self {
            width,
            height,
            rows: vec![vec![value; width as usize]; height as usize],
        }
    }

    /// Combine `src` into this bitmap at (x, y) with combination operator
    /// `operator` (0 OR, 1 AND, 2 XOR, 3 XNOR, 4 REPLACE).
    pub fn place(&mut self, src: &Bitmap, x: i64, y: i64, operator: u8) {
        for sy in 0..i64::from(src.height) {
            for sx in 0..i64::from(src.width) {
                let (dx, dy) = (x + sx, y + sy);
                if dx < 0 || dy < 0 || dx >= i64::from(self.width) || dy >= i64::from(self.height)
                {
                    continue;
                }

                let s = src.rows[sy as usize][sx as usize];
                let d = &mut self.rows[dy as usize][dx as usize];
                *d = match operator {
                    0 => *d | s,
                    1 => *d & s,
                    2 => *d ^ s,
                    3 => !(*d ^ s),
                    _ => s,
                };
            }
        }
    }

    /// A copy with the pixels at `points` inverted.
    pub fn flipped(&self, points: &[(usize, usize)]) -> Self {
        let mut bitmap = self.clone();
        for &(x, y) in points {
            bitmap.rows[y][x] = !bitmap.rows[y][x];
        }
        bitmap
    }

    pub fn get(&self, x: i64, y: i64) -> u32 {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return 0;
        }

        u32::from(self.rows[y as usize][x as usize])
    }

    pub fn from_image(image: &Image) -> Self {
        let rows = (0..image.height())
            .map(|y| (0..image.width()).map(|x| image.get_pixel(x, y)).collect())
            .collect();

        Self {
            width: image.width(),
            height: image.height(),
            rows,
        }
    }
}

/// Mirror of generic region decoding with template 1 and the nominal AT
/// pixel (6.2.5.3, Figure 4). `contexts` must hold 8192 entries.
pub fn encode_generic(mq: &mut MqEncoder, contexts: &mut [Cx], bitmap: &Bitmap) {
    for y in 0..i64::from(bitmap.height) {
        for x in 0..i64::from(bitmap.width) {
            let p = |dx: i64, dy: i64| bitmap.get(x + dx, y + dy);

            let context = (p(-1, -2) << 12)
                | (p(0, -2) << 11)
                | (p(1, -2) << 10)
                | (p(2, -2) << 9)
                | (p(-2, -1) << 8)
                | (p(-1, -1) << 7)
                | (p(0, -1) << 6)
                | (p(1, -1) << 5)
                | (p(2, -1) << 4)
                | (p(3, -1) << 3)
                | (p(-3, 0) << 2)
                | (p(-2, 0) << 1)
                | p(-1, 0);

            mq.encode(&mut contexts[context as usize], p(0, 0) as u8);
        }
    }
}

/// Mirror of generic refinement decoding with template 1 and no offset
/// between `bitmap` and `reference` (6.3.5.3, Figure 13). `contexts` must
/// hold 1024 entries.
pub fn encode_refinement(
    mq: &mut MqEncoder,
    contexts: &mut [Cx],
    bitmap: &Bitmap,
    reference: &Bitmap,
) {
    for y in 0..i64::from(bitmap.height) {
        for x in 0..i64::from(bitmap.width) {
            let own = |dx: i64, dy: i64| bitmap.get(x + dx, y + dy);
            let refd = |dx: i64, dy: i64| reference.get(x + dx, y + dy);

            let context = own(-1, 0)
                | (own(1, -1) << 1)
                | (own(0, -1) << 2)
                | (own(-1, -1) << 3)
                | (refd(1, 1) << 4)
                | (refd(0, 1) << 5)
                | (refd(1, 0) << 6)
                | (refd(0, 0) << 7)
                | (refd(-1, 0) << 8)
                | (refd(0, -1) << 9);

            mq.encode(&mut contexts[context as usize], own(0, 0) as u8);
        }
    }
}

/// A file header for a file with one page.
pub fn file_header(sequential: bool) -> Vec<u8> {
    let mut data = FILE_HEADER_ID.to_vec();
    data.push(u8::from(sequential));
    data.extend_from_slice(&1_u32.to_be_bytes());
    data
}

/// A segment header with a one byte page association.
pub fn segment_header(
    number: u32,
    segment_type: u8,
    referred_to: &[u32],
    page: u8,
    data_length: Option<u32>,
) -> Vec<u8> {
    assert!(referred_to.len() <= 4);

    let mut data = number.to_be_bytes().to_vec();
    data.push(segment_type);
    data.push((referred_to.len() as u8) << 5);

    for &referred in referred_to {
        if number <= 256 {
            data.push(referred as u8);
        } else if number <= 65536 {
            data.extend_from_slice(&(referred as u16).to_be_bytes());
        } else {
            data.extend_from_slice(&referred.to_be_bytes());
        }
    }

    data.push(page);
    data.extend_from_slice(&data_length.unwrap_or(0xFFFF_FFFF).to_be_bytes());
    data
}

/// A complete segment associated with page 1.
pub fn segment(number: u32, segment_type: u8, referred_to: &[u32], body: &[u8]) -> Vec<u8> {
    segment_on_page(number, segment_type, referred_to, 1, body)
}

/// A complete segment associated with `page`, 0 being no page.
pub fn segment_on_page(
    number: u32,
    segment_type: u8,
    referred_to: &[u32],
    page: u8,
    body: &[u8],
) -> Vec<u8> {
    let mut data = segment_header(
        number,
        segment_type,
        referred_to,
        page,
        Some(body.len() as u32),
    );
    data.extend_from_slice(body);
    data
}

/// Page information that lets regions use their own combination operator.
pub fn page_info(width: u32, height: Option<u32>, default_pixel: bool, striping: u16) -> Vec<u8> {
    let flags = 0x40 | if default_pixel { 0x04 } else { 0x00 };
    page_info_with_flags(width, height, flags, striping)
}

pub fn page_info_with_flags(width: u32, height: Option<u32>, flags: u8, striping: u16) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.unwrap_or(0xFFFF_FFFF).to_be_bytes());
    data.extend_from_slice(&0_u32.to_be_bytes());
    data.extend_from_slice(&0_u32.to_be_bytes());
    data.push(flags);
    data.extend_from_slice(&striping.to_be_bytes());
    data
}

pub fn region_info(width: u32, height: u32, x: u32, y: u32, operator: u8) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&x.to_be_bytes());
    data.extend_from_slice(&y.to_be_bytes());
    data.push(operator);
    data
}

/// The body of a generic region segment with template 1 and the nominal AT
/// pixel.
pub fn generic_region(bitmap: &Bitmap, x: u32, y: u32, operator: u8) -> Vec<u8> {
    let mut data = region_info(bitmap.width, bitmap.height, x, y, operator);
    data.push(0x02);
    data.extend_from_slice(&[0x03, 0xFF]);

    let mut mq = MqEncoder::new();
    let mut contexts = vec![Cx::default(); 1 << 13];
    encode_generic(&mut mq, &mut contexts, bitmap);
    data.extend(mq.finish());

    data
}

/// The body of a generic refinement region segment with template 1 that
/// refines `reference` into `bitmap`.
pub fn refinement_region(
    bitmap: &Bitmap,
    reference: &Bitmap,
    x: u32,
    y: u32,
    operator: u8,
) -> Vec<u8> {
    let mut data = region_info(bitmap.width, bitmap.height, x, y, operator);
    data.push(0x01);

    let mut mq = MqEncoder::new();
    let mut contexts = vec![Cx::default(); 1 << 10];
    encode_refinement(&mut mq, &mut contexts, bitmap, reference);
    data.extend(mq.finish());

    data
}

/// The body of a symbol dictionary with template 1 that defines `symbols`
/// and exports the input and new symbols selected by `exported`.
///
/// Every run of symbols of equal height becomes one height class.
pub fn symbol_dictionary(num_input: usize, symbols: &[Bitmap], exported: &[bool]) -> Vec<u8> {
    let mut classes: Vec<(u32, Vec<Bitmap>)> = Vec::new();

    for symbol in symbols {
        match classes.last_mut() {
            Some((height, class)) if *height == symbol.height => class.push(symbol.clone()),
            _ => classes.push((symbol.height, vec![symbol.clone()])),
        }
    }

    symbol_dictionary_classes(num_input, &classes, exported)
}

/// Like [`symbol_dictionary`], with explicit height classes. A class may be
/// empty.
pub fn symbol_dictionary_classes(
    num_input: usize,
    classes: &[(u32, Vec<Bitmap>)],
    exported: &[bool],
) -> Vec<u8> {
    let num_new: usize = classes.iter().map(|(_, class)| class.len()).sum();
    assert_eq!(exported.len(), num_input + num_new);

    let mut data = 0x0400_u16.to_be_bytes().to_vec();
    data.extend_from_slice(&[0x03, 0xFF]);
    let num_exported = exported.iter().filter(|e| **e).count() as u32;
    data.extend_from_slice(&num_exported.to_be_bytes());
    data.extend_from_slice(&(num_new as u32).to_be_bytes());

    let mut mq = MqEncoder::new();
    let mut contexts = vec![Cx::default(); 1 << 13];
    let mut iadh = IntegerEncoder::new();
    let mut iadw = IntegerEncoder::new();
    let mut iaex = IntegerEncoder::new();

    let mut height = 0_i32;
    for (class_height, class) in classes {
        iadh.encode(&mut mq, Some(*class_height as i32 - height));
        height = *class_height as i32;

        let mut width = 0_i32;
        for symbol in class {
            assert_eq!(symbol.height, *class_height);
            iadw.encode(&mut mq, Some(symbol.width as i32 - width));
            width = symbol.width as i32;
            encode_generic(&mut mq, &mut contexts, symbol);
        }
        iadw.encode(&mut mq, None);
    }

    // Runs alternate between not exported and exported.
    let mut current = false;
    let mut run = 0;
    for &flag in exported {
        if flag == current {
            run += 1;
        } else {
            iaex.encode(&mut mq, Some(run));
            current = flag;
            run = 1;
        }
    }
    iaex.encode(&mut mq, Some(run));

    data.extend(mq.finish());
    data
}

/// One symbol instance of a text region: symbol ID at (S, T).
#[derive(Debug, Clone, Copy)]
pub struct Instance {
    pub id: u32,
    pub s: i32,
    pub t: i32,
}

/// The text region flags besides SBCOMBOP.
#[derive(Debug, Clone, Copy)]
pub struct TextLayout {
    /// REFCORNER: 0 BOTTOMLEFT, 1 TOPLEFT, 2 BOTTOMRIGHT, 3 TOPRIGHT.
    pub corner: u8,
    pub transposed: bool,
    pub log_strips: u8,
    pub ds_offset: i8,
}

impl TextLayout {
    pub const TOP_LEFT: Self = Self {
        corner: 1,
        transposed: false,
        log_strips: 0,
        ds_offset: 0,
    };
}

/// The coded values of one symbol instance.
#[derive(Debug, Clone, Copy)]
pub struct CodedInstance {
    /// IAFS for the first instance of a strip, IADS for the others.
    pub delta_s: i32,
    /// IAIT, only coded with more than one strip.
    pub t: i32,
    pub id: u32,
}

/// The coded values of one strip: IADT and its instances.
#[derive(Debug, Clone)]
pub struct CodedStrip {
    pub delta_t: i32,
    pub instances: Vec<CodedInstance>,
}

/// The body of a text region that codes `strips` as they are.
pub fn coded_text_region(
    width: u32,
    height: u32,
    operator: u8,
    layout: TextLayout,
    num_symbols: usize,
    strips: &[CodedStrip],
) -> Vec<u8> {
    let mut data = region_info(width, height, 0, 0, 0);
    let flags: u16 = (u16::from(layout.log_strips) << 2)
        | (u16::from(layout.corner) << 4)
        | (u16::from(layout.transposed) << 6)
        | (u16::from(operator) << 7)
        | (((layout.ds_offset as u16) & 0x1F) << 10);
    data.extend_from_slice(&flags.to_be_bytes());

    let num_instances: usize = strips.iter().map(|strip| strip.instances.len()).sum();
    data.extend_from_slice(&(num_instances as u32).to_be_bytes());

    let mut mq = MqEncoder::new();
    let mut iadt = IntegerEncoder::new();
    let mut iafs = IntegerEncoder::new();
    let mut iads = IntegerEncoder::new();
    let mut iait = IntegerEncoder::new();
    let code_len = 32 - (num_symbols as u32).saturating_sub(1).leading_zeros();
    let mut iaid = SymbolIdEncoder::new(code_len);

    iadt.encode(&mut mq, Some(0));

    for strip in strips {
        iadt.encode(&mut mq, Some(strip.delta_t));

        for (i, instance) in strip.instances.iter().enumerate() {
            if i == 0 {
                iafs.encode(&mut mq, Some(instance.delta_s));
            } else {
                iads.encode(&mut mq, Some(instance.delta_s));
            }

            if layout.log_strips > 0 {
                iait.encode(&mut mq, Some(instance.t));
            }

            iaid.encode(&mut mq, instance.id);
        }

        iads.encode(&mut mq, None);
    }

    data.extend(mq.finish());
    data
}

/// The body of a text region with one strip per distinct T, TOPLEFT
/// reference corner and no transposition.
///
/// `instances` must be sorted by T and then by S, and `widths` gives the
/// width of every symbol.
pub fn text_region(
    width: u32,
    height: u32,
    operator: u8,
    widths: &[u32],
    instances: &[Instance],
) -> Vec<u8> {
    let mut strips: Vec<CodedStrip> = Vec::new();
    let mut strip_t = 0;
    let mut first_s = 0;
    let mut current_s = 0;

    for instance in instances {
        match strips.last_mut() {
            Some(strip) if instance.t == strip_t => strip.instances.push(CodedInstance {
                delta_s: instance.s - current_s,
                t: 0,
                id: instance.id,
            }),
            _ => {
                strips.push(CodedStrip {
                    delta_t: instance.t - strip_t,
                    instances: vec![CodedInstance {
                        delta_s: instance.s - first_s,
                        t: 0,
                        id: instance.id,
                    }],
                });
                strip_t = instance.t;
                first_s = instance.s;
            }
        }

        current_s = instance.s + widths[instance.id as usize] as i32 - 1;
    }

    coded_text_region(
        width,
        height,
        operator,
        TextLayout::TOP_LEFT,
        widths.len(),
        &strips,
    )
}
