//! Pixel buffers used by the pipeline.
//!
//! - [`GrayImage`]: owned 8-bit grayscale buffer, the working type of every stage.
//! - [`RasterImage`]: borrowed interleaved input of 1 to 4 channels, converted
//!   to grayscale once per detection call.
//! - [`FloatMap`]: owned single-channel f32 grid for gradients and accumulators.

use image::{DynamicImage, GrayAlphaImage, Luma, RgbImage, RgbaImage};

use crate::error::{Error, Result};
use crate::types::Rect;

/// Trait for accessing pixel intensities from an image.
pub trait ImageAccess {
    /// Image dimensions.
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

/// A simple grayscale image buffer implementing ImageAccess.
#[derive(Debug, Clone, PartialEq)]
pub struct GrayImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl GrayImage {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(data.len(), (width * height) as usize);
        Self {
            data,
            width,
            height,
        }
    }

    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Self
    where
        F: Fn(u32, u32) -> u8,
    {
        let mut data = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { data, width, height }
    }

    /// Convert any decoded image to grayscale.
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        Self::from(image.to_luma8())
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// In-bounds pixel read.
    #[inline]
    pub fn at(&self, x: u32, y: u32) -> u8 {
        self.data[(y * self.width + x) as usize]
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn max_intensity(&self) -> u8 {
        self.data.iter().copied().max().unwrap_or(0)
    }

    /// Copy out the part of the image covered by `rect`, clipped to bounds.
    pub fn crop(&self, rect: &Rect) -> GrayImage {
        let r = rect.clip_to(self.width, self.height);
        let mut data = Vec::with_capacity(r.area() as usize);
        for y in r.y as u32..r.y as u32 + r.height {
            let start = (y * self.width + r.x as u32) as usize;
            data.extend_from_slice(&self.data[start..start + r.width as usize]);
        }
        GrayImage::new(data, r.width, r.height)
    }

    /// Copy into an `image` crate buffer for use with `image::imageops`.
    pub fn to_luma(&self) -> image::GrayImage {
        image::ImageBuffer::from_fn(self.width, self.height, |x, y| Luma([self.at(x, y)]))
    }
}

impl From<image::GrayImage> for GrayImage {
    fn from(buffer: image::GrayImage) -> Self {
        let (width, height) = buffer.dimensions();
        Self::new(buffer.into_raw(), width, height)
    }
}

impl ImageAccess for GrayImage {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

/// Borrowed interleaved 8-bit raster, as handed over by a caller.
///
/// Channel layouts: 1 = gray, 2 = gray + alpha, 3 = RGB, 4 = RGBA.
/// The layout is only checked by [`RasterImage::to_gray`].
#[derive(Debug, Clone, Copy)]
pub struct RasterImage<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

impl<'a> RasterImage<'a> {
    pub const fn new(data: &'a [u8], width: u32, height: u32, channels: u8) -> Self {
        Self {
            data,
            width,
            height,
            channels,
        }
    }

    /// Convert to grayscale, rejecting unknown channel counts and short or long buffers.
    pub fn to_gray(&self) -> Result<GrayImage> {
        if !(1..=4).contains(&self.channels) {
            return Err(Error::UnsupportedRaster {
                channels: self.channels,
            });
        }
        let expected = self.width as usize * self.height as usize * self.channels as usize;
        if self.data.len() != expected {
            return Err(Error::RasterSize {
                width: self.width,
                height: self.height,
                channels: self.channels,
                expected,
                actual: self.data.len(),
            });
        }

        let raw = self.data.to_vec();
        let (w, h) = (self.width, self.height);
        let size_error = || Error::RasterSize {
            width: w,
            height: h,
            channels: self.channels,
            expected,
            actual: expected,
        };
        let dynamic = match self.channels {
            1 => return Ok(GrayImage::new(raw, w, h)),
            2 => DynamicImage::ImageLumaA8(GrayAlphaImage::from_raw(w, h, raw).ok_or_else(size_error)?),
            3 => DynamicImage::ImageRgb8(RgbImage::from_raw(w, h, raw).ok_or_else(size_error)?),
            _ => DynamicImage::ImageRgba8(RgbaImage::from_raw(w, h, raw).ok_or_else(size_error)?),
        };
        Ok(GrayImage::from_dynamic(&dynamic))
    }
}

/// Owned single-channel f32 grid in row-major layout.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatMap {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl FloatMap {
    /// Zero-initialized `width × height` map.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn from_gray(image: &GrayImage) -> Self {
        Self {
            width: image.width as usize,
            height: image.height as usize,
            data: image.data.iter().map(|&v| v as f32).collect(),
        }
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[self.idx(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        let i = self.idx(x, y);
        self.data[i] = v;
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[f32] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn transpose(&self) -> FloatMap {
        let mut out = FloatMap::new(self.height, self.width);
        for y in 0..self.height {
            for x in 0..self.width {
                out.set(y, x, self.get(x, y));
            }
        }
        out
    }

    /// Location and value of the maximum. Ties go to the first cell in row-major order.
    pub fn max_loc(&self) -> Option<(usize, usize, f32)> {
        self.max_loc_where(|_, _| true)
    }

    /// Like [`FloatMap::max_loc`], restricted to cells accepted by `keep`.
    pub fn max_loc_where<F>(&self, keep: F) -> Option<(usize, usize, f32)>
    where
        F: Fn(usize, usize) -> bool,
    {
        let mut best: Option<(usize, usize, f32)> = None;
        for y in 0..self.height {
            for (x, &v) in self.row(y).iter().enumerate() {
                if !keep(x, y) {
                    continue;
                }
                if best.map_or(true, |(_, _, b)| v > b) {
                    best = Some((x, y, v));
                }
            }
        }
        best
    }

    /// Population mean and standard deviation.
    pub fn mean_std(&self) -> (f32, f32) {
        if self.data.is_empty() {
            return (0.0, 0.0);
        }
        let n = self.data.len() as f64;
        let mean = self.data.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = self
            .data
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        (mean as f32, var.sqrt() as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_image_access() {
        // 3x3 checkerboard pattern
        let data = vec![
            0, 255, 0, //
            255, 0, 255, //
            0, 255, 0, //
        ];
        let img = GrayImage::new(data, 3, 3);

        assert_eq!(img.at(0, 0), 0);
        assert_eq!(img.at(1, 0), 255);
        assert_eq!(img.at(1, 1), 0);
        assert_eq!((img.width(), img.height()), (3, 3));
        assert_eq!(img.max_intensity(), 255);
    }

    #[test]
    fn crop_is_clipped_to_bounds() {
        let img = GrayImage::from_fn(10, 8, |x, y| (y * 10 + x) as u8);
        let crop = img.crop(&Rect::new(7, 6, 5, 5));
        assert_eq!(crop.width(), 3);
        assert_eq!(crop.height(), 2);
        assert_eq!(crop.at(0, 0), 67);
        assert_eq!(crop.at(2, 1), 79);
    }

    #[test]
    fn luma_round_trip_through_image_crate() {
        let img = GrayImage::from_fn(4, 3, |x, y| (x * 40 + y) as u8);
        let back = GrayImage::from(img.to_luma());
        assert_eq!(back, img);
    }

    #[test]
    fn raster_rejects_bad_channel_count() {
        let data = vec![0u8; 5 * 4 * 5];
        let raster = RasterImage::new(&data, 4, 5, 5);
        assert!(matches!(
            raster.to_gray(),
            Err(Error::UnsupportedRaster { channels: 5 })
        ));
    }

    #[test]
    fn raster_rejects_wrong_buffer_length() {
        let data = vec![0u8; 10];
        let raster = RasterImage::new(&data, 4, 4, 3);
        assert!(matches!(raster.to_gray(), Err(Error::RasterSize { .. })));
    }

    #[test]
    fn raster_rgb_converts_to_gray() {
        let data = vec![255u8, 255, 255, 0, 0, 0];
        let gray = RasterImage::new(&data, 2, 1, 3).to_gray().unwrap();
        assert_eq!(gray.at(0, 0), 255);
        assert_eq!(gray.at(1, 0), 0);
    }

    #[test]
    fn float_map_max_loc_prefers_first_in_row_major_order() {
        let mut map = FloatMap::new(4, 3);
        map.set(3, 0, 2.0);
        map.set(0, 2, 2.0);
        assert_eq!(map.max_loc(), Some((3, 0, 2.0)));
        assert_eq!(map.max_loc_where(|_, y| y > 0), Some((0, 2, 2.0)));
    }

    #[test]
    fn float_map_transpose_and_stats() {
        let mut map = FloatMap::new(3, 2);
        for (i, v) in map.data.iter_mut().enumerate() {
            *v = i as f32;
        }
        let t = map.transpose();
        assert_eq!((t.width, t.height), (2, 3));
        assert_eq!(t.get(1, 2), map.get(2, 1));

        let (mean, std) = map.mean_std();
        assert!((mean - 2.5).abs() < 1e-6);
        assert!((std - (35.0f32 / 12.0).sqrt()).abs() < 1e-5);
    }
}
