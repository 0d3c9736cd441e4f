use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbaImage};

use crate::resource::error::{Error, Result};

/// Texel layout of an uploaded texture. Components are always unsigned bytes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PixelFormat {
    R8,
    Rg8,
    Rgba8,
    /// RGBA with sRGB-encoded color channels.
    Rgba8Srgb,
}

impl PixelFormat {
    pub const fn channels(self) -> u32 {
        match self {
            PixelFormat::R8 => 1,
            PixelFormat::Rg8 => 2,
            PixelFormat::Rgba8 | PixelFormat::Rgba8Srgb => 4,
        }
    }

    pub(crate) fn wgpu_format(self) -> wgpu::TextureFormat {
        match self {
            PixelFormat::R8 => wgpu::TextureFormat::R8Unorm,
            PixelFormat::Rg8 => wgpu::TextureFormat::Rg8Unorm,
            PixelFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
            PixelFormat::Rgba8Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        }
    }
}

/// Decoded pixels ready for upload.
///
/// Rows are stored bottom-up: row 0 is the bottom of the picture, so texture
/// coordinate `v = 0` addresses the bottom edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
}

impl TextureImage {
    /// Decodes an image file and converts it to `format`.
    pub fn load(path: impl AsRef<Path>, format: PixelFormat) -> Result<Self> {
        let path = path.as_ref();
        let decoded = image::open(path).map_err(|e| Error::asset(path, e))?;
        let image = Self::from_dynamic(decoded, format)?;
        log::debug!(
            "decoded '{}' ({}x{}, {:?})",
            path.display(),
            image.width,
            image.height,
            format
        );
        Ok(image)
    }

    /// Flips `image` vertically and converts it to `format`.
    pub fn from_dynamic(image: DynamicImage, format: PixelFormat) -> Result<Self> {
        let image = image.flipv();
        let (width, height) = (image.width(), image.height());
        let pixels = match format {
            PixelFormat::R8 => image.into_luma8().into_raw(),
            PixelFormat::Rg8 => image.into_luma_alpha8().into_raw(),
            PixelFormat::Rgba8 | PixelFormat::Rgba8Srgb => image.into_rgba8().into_raw(),
        };
        Self::from_raw(width, height, format, pixels)
    }

    /// Wraps bottom-up pixel rows as-is.
    pub fn from_raw(width: u32, height: u32, format: PixelFormat, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::config(format!("image has zero size ({width}x{height})")));
        }
        let expected = width as usize * height as usize * format.channels() as usize;
        if pixels.len() != expected {
            return Err(Error::config(format!(
                "{width}x{height} {format:?} image needs {expected} bytes, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channels(&self) -> u32 {
        self.format.channels()
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Texel at column `x`, row `y` (row 0 is the bottom), or `None` outside
    /// the image.
    pub fn texel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.texel_at(x, y))
    }

    /// Nearest-texel lookup with repeat wrapping, as the GPU sampler does it:
    /// whole coordinates wrap to the first texel, so `(1, 1)` reads the same
    /// texel as `(0, 0)`.
    pub fn sample_nearest(&self, u: f32, v: f32) -> &[u8] {
        let x = nearest_index(u, self.width);
        let y = nearest_index(v, self.height);
        self.texel_at(x, y)
    }

    // Callers keep `x < width` and `y < height`.
    fn texel_at(&self, x: u32, y: u32) -> &[u8] {
        let c = self.channels() as usize;
        let start = (y as usize * self.width as usize + x as usize) * c;
        &self.pixels[start..start + c]
    }

    /// Number of levels in a full mip chain for this image.
    pub fn full_mip_count(&self) -> u32 {
        mip_level_count(self.width, self.height)
    }

    /// Half-size copy for the next mip level (each side at least 1).
    pub fn downsample(&self) -> Result<Self> {
        let w = (self.width / 2).max(1);
        let h = (self.height / 2).max(1);
        let mismatch = || Error::config("pixel buffer does not match image size");

        let pixels = match self.format {
            PixelFormat::R8 => {
                let img = GrayImage::from_raw(self.width, self.height, self.pixels.clone())
                    .ok_or_else(mismatch)?;
                imageops::resize(&img, w, h, FilterType::Triangle).into_raw()
            }
            PixelFormat::Rg8 => {
                let img = GrayAlphaImage::from_raw(self.width, self.height, self.pixels.clone())
                    .ok_or_else(mismatch)?;
                imageops::resize(&img, w, h, FilterType::Triangle).into_raw()
            }
            PixelFormat::Rgba8 | PixelFormat::Rgba8Srgb => {
                let img = RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
                    .ok_or_else(mismatch)?;
                imageops::resize(&img, w, h, FilterType::Triangle).into_raw()
            }
        };
        Self::from_raw(w, h, self.format, pixels)
    }

    /// Levels 1.. of the mip chain, each half the size of the previous.
    pub fn mip_chain(&self, levels: u32) -> Result<Vec<TextureImage>> {
        let mut chain: Vec<TextureImage> = Vec::new();
        for _ in 1..levels {
            let next = chain.last().unwrap_or(self).downsample()?;
            chain.push(next);
        }
        Ok(chain)
    }
}

/// `floor(log2(max(w, h))) + 1`.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    u32::BITS - largest.leading_zeros()
}

fn nearest_index(coord: f32, size: u32) -> u32 {
    let wrapped = coord.rem_euclid(1.0);
    ((wrapped * size as f32) as u32).min(size - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const GREEN: [u8; 4] = [0, 255, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];
    const WHITE: [u8; 4] = [255, 255, 255, 255];

    // As seen on screen: top row red | green, bottom row blue | white.
    fn checkerboard() -> DynamicImage {
        let img = RgbaImage::from_fn(2, 2, |x, y| match (x, y) {
            (0, 0) => Rgba(RED),
            (1, 0) => Rgba(GREEN),
            (0, 1) => Rgba(BLUE),
            _ => Rgba(WHITE),
        });
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn flipped_checkerboard_corners() {
        let image = TextureImage::from_dynamic(checkerboard(), PixelFormat::Rgba8).unwrap();
        assert_eq!(image.texel(0, 0), Some(&BLUE[..]));
        assert_eq!(image.texel(1, 1), Some(&GREEN[..]));
        assert_eq!(image.sample_nearest(0.0, 0.0), BLUE);
        assert_eq!(image.sample_nearest(0.75, 0.75), GREEN);
        assert_eq!(image.sample_nearest(0.25, 0.75), RED);
        assert_eq!(image.sample_nearest(0.75, 0.25), WHITE);
    }

    #[test]
    fn whole_coordinates_wrap_to_the_first_texel() {
        let image = TextureImage::from_dynamic(checkerboard(), PixelFormat::Rgba8).unwrap();
        assert_eq!(image.sample_nearest(1.0, 1.0), BLUE);
        assert_eq!(image.sample_nearest(1.0, 0.75), RED);
        assert_eq!(image.sample_nearest(0.999, 0.999), GREEN);
    }

    #[test]
    fn sampling_repeats_outside_unit_range() {
        let image = TextureImage::from_dynamic(checkerboard(), PixelFormat::Rgba8).unwrap();
        assert_eq!(image.sample_nearest(1.25, 0.25), image.sample_nearest(0.25, 0.25));
        assert_eq!(image.sample_nearest(-0.75, 0.25), image.sample_nearest(0.25, 0.25));
    }

    #[test]
    fn texel_outside_the_image_is_none() {
        let image = TextureImage::from_dynamic(checkerboard(), PixelFormat::Rgba8).unwrap();
        assert_eq!(image.texel(2, 0), None);
        assert_eq!(image.texel(0, 2), None);
        assert_eq!(image.texel(u32::MAX, u32::MAX), None);
    }

    #[test]
    fn conversion_to_single_channel() {
        let image = TextureImage::from_dynamic(checkerboard(), PixelFormat::R8).unwrap();
        assert_eq!(image.channels(), 1);
        assert_eq!(image.pixels().len(), 4);
        assert_eq!(image.sample_nearest(0.75, 0.0), [255]);
    }

    #[test]
    fn raw_size_mismatch_is_rejected() {
        let err = TextureImage::from_raw(2, 2, PixelFormat::Rg8, vec![0; 7]).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(TextureImage::from_raw(0, 2, PixelFormat::R8, Vec::new()).is_err());
    }

    #[test]
    fn mip_counts() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 2), 2);
        assert_eq!(mip_level_count(256, 64), 9);
        assert_eq!(mip_level_count(300, 1), 9);
    }

    #[test]
    fn mip_chain_halves_down_to_one() {
        let image = TextureImage::from_raw(8, 2, PixelFormat::Rgba8, vec![200; 8 * 2 * 4]).unwrap();
        let chain = image.mip_chain(image.full_mip_count()).unwrap();
        let sizes: Vec<(u32, u32)> = chain.iter().map(|m| (m.width(), m.height())).collect();
        assert_eq!(sizes, [(4, 1), (2, 1), (1, 1)]);
        assert!(chain.iter().all(|m| m.pixels().iter().all(|&b| b == 200)));
    }

    #[test]
    fn missing_file_is_an_asset_error() {
        let err = TextureImage::load("no/such/texture.png", PixelFormat::Rgba8).unwrap_err();
        assert!(matches!(err, Error::AssetLoad { .. }));
    }
}
