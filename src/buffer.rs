use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};

use crate::error::{CorrectionError, Result};
use crate::geometry::ImageBounds;

/// Decoded 8-bit image: interleaved channels, row-major, no row padding.
///
/// A buffer is never empty and never changes after construction. Every
/// pipeline stage that produces pixels allocates a new buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Bits per sample. Only 8-bit samples are supported.
    pub const BIT_DEPTH: u8 = 8;
    /// Largest supported channel count (RGBA).
    pub const MAX_CHANNELS: u8 = 4;

    /// Wrap raw samples, validating dimensions and length.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CorrectionError::invalid(format!(
                "image dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        if channels == 0 || channels > Self::MAX_CHANNELS {
            return Err(CorrectionError::invalid(format!(
                "unsupported channel count {}",
                channels
            )));
        }
        let expected = sample_count(width, height, channels)?;
        if data.len() != expected {
            return Err(CorrectionError::invalid(format!(
                "expected {} samples for {}x{}x{}, got {}",
                expected,
                width,
                height,
                channels,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Buffer filled with a single colour; the channel count is `pixel.len()`.
    pub fn from_pixel(width: u32, height: u32, pixel: &[u8]) -> Result<Self> {
        let channels = u8::try_from(pixel.len())
            .map_err(|_| CorrectionError::invalid("too many channels in fill pixel"))?;
        if channels == 0 || channels > Self::MAX_CHANNELS {
            return Err(CorrectionError::invalid(format!(
                "unsupported channel count {}",
                channels
            )));
        }
        let count = sample_count(width, height, channels)?;
        let data = pixel.iter().copied().cycle().take(count).collect();
        Self::new(width, height, channels, data)
    }

    /// Build a buffer by calling `f(x, y, pixel)` for every pixel in row-major
    /// order.
    pub fn from_fn<F>(width: u32, height: u32, channels: u8, mut f: F) -> Result<Self>
    where
        F: FnMut(u32, u32, &mut [u8]),
    {
        let count = sample_count(width, height, channels)?;
        let mut data = vec![0u8; count];
        if channels > 0 && width > 0 {
            for (i, px) in data.chunks_exact_mut(channels as usize).enumerate() {
                let x = (i % width as usize) as u32;
                let y = (i / width as usize) as u32;
                f(x, y, px);
            }
        }
        Self::new(width, height, channels, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn bit_depth(&self) -> u8 {
        Self::BIT_DEPTH
    }

    pub fn bounds(&self) -> ImageBounds {
        ImageBounds::new(self.width, self.height)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Samples of pixel `(x, y)`, or `None` outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixel_at(x, y))
    }

    /// Caller guarantees `x < width` and `y < height`.
    pub(crate) fn pixel_at(&self, x: u32, y: u32) -> &[u8] {
        let c = self.channels as usize;
        let start = (y as usize * self.width as usize + x as usize) * c;
        &self.data[start..start + c]
    }

    /// Convert to an `image` crate buffer of the matching colour type.
    pub fn to_dynamic(&self) -> Result<DynamicImage> {
        let (w, h) = (self.width, self.height);
        let data = self.data.clone();
        let image = match self.channels {
            1 => GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
            2 => GrayAlphaImage::from_raw(w, h, data).map(DynamicImage::ImageLumaA8),
            3 => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
            _ => RgbaImage::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
        };
        image.ok_or_else(|| CorrectionError::invalid("buffer does not fit image layout"))
    }
}

impl TryFrom<DynamicImage> for PixelBuffer {
    type Error = CorrectionError;

    /// 8-bit gray, gray-alpha, RGB and RGBA keep their layout; every other
    /// colour type is converted to RGBA8.
    fn try_from(image: DynamicImage) -> Result<Self> {
        let (width, height) = (image.width(), image.height());
        let (channels, data) = match image {
            DynamicImage::ImageLuma8(img) => (1, img.into_raw()),
            DynamicImage::ImageLumaA8(img) => (2, img.into_raw()),
            DynamicImage::ImageRgb8(img) => (3, img.into_raw()),
            DynamicImage::ImageRgba8(img) => (4, img.into_raw()),
            other => (4, other.to_rgba8().into_raw()),
        };
        Self::new(width, height, channels, data)
    }
}

fn sample_count(width: u32, height: u32, channels: u8) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(channels as usize))
        .ok_or_else(|| CorrectionError::invalid("image dimensions overflow"))
}
