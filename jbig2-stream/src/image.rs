//! Packed bi-level images and compositing.

use alloc::vec;
use alloc::vec::Vec;

use crate::decode::CombinationOperator;
use crate::error::{RegionError, Result, bail};

/// A packed 1 bit per pixel image.
///
/// Rows are stored top to bottom, each `stride` bytes long with the leftmost
/// pixel in the most significant bit. A set bit is a black pixel. The stride
/// is rounded up to a multiple of four bytes and padding bits past `width`
/// are always zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl Image {
    /// Create a white image.
    pub(crate) fn new(width: u32, height: u32) -> Result<Self> {
        let stride = stride_for(width);
        let Some(len) = stride.checked_mul(height as usize) else {
            bail!(RegionError::TooLarge);
        };

        Ok(Self {
            width,
            height,
            stride,
            data: vec![0; len],
        })
    }

    /// Create an image with every pixel set to `value`.
    pub(crate) fn new_filled(width: u32, height: u32, value: bool) -> Result<Self> {
        let mut image = Self::new(width, height)?;
        image.fill(value);
        Ok(image)
    }

    /// The width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The number of bytes per row.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// The packed pixel data, `stride * height` bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the image and return its packed pixel data.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Whether the pixel at (x, y) is black. Pixels outside the image are white.
    pub fn get_pixel(&self, x: u32, y: u32) -> bool {
        self.pixel(x as i64, y as i64) != 0
    }

    /// The pixel value at (x, y), or 0 outside the image.
    ///
    /// "All pixels lying outside the bounds of the actual bitmap have the
    /// value 0." (6.2.5.2)
    #[inline]
    pub(crate) fn pixel(&self, x: i64, y: i64) -> u32 {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return 0;
        }

        let byte = self.data[y as usize * self.stride + (x as usize >> 3)];
        ((byte >> (7 - (x & 7))) & 1) as u32
    }

    #[inline]
    pub(crate) fn set_pixel(&mut self, x: u32, y: u32, value: bool) {
        if x >= self.width || y >= self.height {
            return;
        }

        let idx = y as usize * self.stride + (x as usize >> 3);
        let mask = 0x80 >> (x & 7);

        if value {
            self.data[idx] |= mask;
        } else {
            self.data[idx] &= !mask;
        }
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[inline]
    pub(crate) fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.stride]
    }

    #[inline]
    pub(crate) fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        &mut self.data[start..start + self.stride]
    }

    /// Set every pixel to `value`, keeping the padding bits clear.
    pub(crate) fn fill(&mut self, value: bool) {
        if !value {
            self.data.fill(0);
            return;
        }

        let full_bytes = (self.width / 8) as usize;
        let rest = self.width % 8;

        for y in 0..self.height {
            let row = self.row_mut(y);
            row.fill(0);
            row[..full_bytes].fill(0xFF);

            if rest != 0 {
                row[full_bytes] = leading_mask(rest);
            }
        }
    }

    /// Change the height to `height` rows, filling new rows with `value`.
    pub(crate) fn resize_height(&mut self, height: u32, value: bool) -> Result<()> {
        if height <= self.height {
            self.data.truncate(height as usize * self.stride);
            self.height = height;
            return Ok(());
        }

        let grown = Self::new_filled(self.width, height - self.height, value)?;
        self.data.extend_from_slice(&grown.data);
        self.height = height;

        Ok(())
    }

    /// Copy the `width` x `height` rectangle at (x, y). Parts outside the
    /// image read as white.
    pub(crate) fn sub_image(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Self> {
        let mut image = Self::new(width, height)?;
        image.compose(self, -(x as i64), -(y as i64), CombinationOperator::Replace);
        Ok(image)
    }

    /// Combine `src` into this image with its top left corner at (x, y).
    ///
    /// Pixels of `src` falling outside this image are ignored.
    pub(crate) fn compose(&mut self, src: &Image, x: i64, y: i64, op: CombinationOperator) {
        if x == 0 && y == 0 && src.width == self.width && src.height == self.height {
            match op {
                CombinationOperator::Replace => {
                    self.data.copy_from_slice(&src.data);
                    return;
                }
                CombinationOperator::Or => {
                    for (d, s) in self.data.iter_mut().zip(&src.data) {
                        *d |= *s;
                    }
                    return;
                }
                _ => {}
            }
        }

        let x_start = x.max(0);
        let x_end = (x + src.width as i64).min(self.width as i64);
        let y_start = y.max(0);
        let y_end = (y + src.height as i64).min(self.height as i64);

        if x_start >= x_end || y_start >= y_end {
            return;
        }

        for dy in y_start..y_end {
            let sy = (dy - y) as u32;

            if x >= 0 && x % 8 == 0 {
                self.compose_row_aligned(src, sy, dy as u32, x as usize, (x_end - x) as u32, op);
            } else {
                for dx in x_start..x_end {
                    let s = src.pixel(dx - x, sy as i64);
                    let d = self.pixel(dx, dy);
                    self.set_pixel(dx as u32, dy as u32, op.apply(d as u8, s as u8) & 1 != 0);
                }
            }
        }
    }

    /// Combine `count` pixels of row `sy` of `src` into row `dy` starting at
    /// byte aligned column `x`.
    fn compose_row_aligned(
        &mut self,
        src: &Image,
        sy: u32,
        dy: u32,
        x: usize,
        count: u32,
        op: CombinationOperator,
    ) {
        let src_row = src.row(sy);
        let dst_row = self.row_mut(dy);
        let offset = x / 8;

        for (i, &s) in src_row.iter().enumerate().take(count.div_ceil(8) as usize) {
            let valid = (count - 8 * i as u32).min(8);
            let mask = leading_mask(valid);
            let d = dst_row[offset + i];
            let combined = op.apply(d, s);

            dst_row[offset + i] = (d & !mask) | (combined & mask);
        }
    }

    /// Convert into an 8-bit grayscale image where black pixels are 0.
    #[cfg(feature = "image")]
    pub fn to_luma8(&self) -> ::image::GrayImage {
        ::image::GrayImage::from_fn(self.width, self.height, |x, y| {
            ::image::Luma([if self.get_pixel(x, y) { 0 } else { 255 }])
        })
    }
}

/// Check that a `width` x `height` image stays within `max_pixels`.
pub(crate) fn check_size(width: u32, height: u32, max_pixels: u64) -> Result<()> {
    if width as u64 * height as u64 > max_pixels {
        bail!(RegionError::TooLarge);
    }

    Ok(())
}

/// A byte whose `count` most significant bits are set.
#[inline]
fn leading_mask(count: u32) -> u8 {
    (0xFF00_u16 >> count.min(8)) as u8
}

/// Row length in bytes, rounded up to whole 32-bit words.
fn stride_for(width: u32) -> usize {
    (width as usize).div_ceil(32) * 4
}
