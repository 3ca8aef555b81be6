//! Image primitives.
//!
//! Captures arrive as an owned RGB frame (`OwnedImage`); everything downstream
//! works on borrowed views (`Image<'a>`) so that cropping the HUD regions does
//! not copy pixels until a crop is actually encoded or fed to OCR.

use std::io::Cursor;

use anyhow::{Context, Result};

use crate::util::NormBox;

/// Owned RGB image (no alpha).
#[derive(Clone, Debug)]
pub struct OwnedImage {
    width: u32,
    height: u32,
    data: Vec<Color>,
}

impl OwnedImage {
    /// Build an `OwnedImage` from RGBA bytes (alpha is discarded).
    ///
    /// The buffer is expected to be tightly packed: `width * height * 4` bytes.
    pub fn from_rgba(width: usize, bytes: &[u8]) -> Self {
        let height = bytes.len() / width.max(1) / 4;
        let data = bytes
            .chunks_exact(4)
            .take(width * height)
            .map(|v| Color::new(v[0], v[1], v[2]))
            .collect::<Vec<_>>();

        Self {
            width: width as u32,
            height: height as u32,
            data,
        }
    }

    /// Decode an encoded image (PNG, JPEG, ...).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes).context("decode image")?.to_rgb8();
        let (width, height) = img.dimensions();
        let data = img.pixels().map(|p| Color::new(p.0[0], p.0[1], p.0[2])).collect();
        Ok(Self { width, height, data })
    }

    pub fn open(path: &std::path::Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("read image {}", path.display()))?;
        Self::decode(&bytes).with_context(|| format!("decode image {}", path.display()))
    }

    /// Solid-colour image; mostly useful for tests and placeholders.
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        Self {
            width,
            height,
            data: vec![color; (width * height) as usize],
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Resize to exactly `width` x `height`.
    ///
    /// Uses `fast_image_resize` (SIMD-optimized) and keeps output in `Vec<Color>`.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let width = width.max(1);
        let height = height.max(1);
        if (self.width, self.height) == (width, height) || self.data.is_empty() {
            return Ok(());
        }

        // SAFETY: `Color` is `#[repr(C)]` with 3 x `u8`, so it is layout-compatible
        // with `fast_image_resize::pixels::U8x3` (alignment 1).
        let src_pixels = unsafe {
            std::slice::from_raw_parts(
                self.data.as_ptr() as *const fast_image_resize::pixels::U8x3,
                self.data.len(),
            )
        };

        let src = fast_image_resize::images::ImageRef::from_pixels(self.width, self.height, src_pixels)
            .context("wrap source pixels")?;
        let mut dst = fast_image_resize::images::Image::new(width, height, fast_image_resize::PixelType::U8x3);

        let mut resizer = fast_image_resize::Resizer::new();
        let options = fast_image_resize::ResizeOptions::new().resize_alg(
            fast_image_resize::ResizeAlg::Interpolation(fast_image_resize::FilterType::CatmullRom),
        );
        resizer
            .resize(&src, &mut dst, &Some(options))
            .context("resize")?;

        self.data = dst
            .into_vec()
            .chunks_exact(3)
            .map(|px| Color::new(px[0], px[1], px[2]))
            .collect();
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Resize to the given height, preserving aspect ratio.
    pub fn resized_h(mut self, height: u32) -> Result<Self> {
        let height = height.max(1);
        let width = (self.width as u64 * height as u64 / self.height.max(1) as u64) as u32;
        self.resize(width, height)?;
        Ok(self)
    }

    /// Uniformly scale both sides by `factor`. Factors at or above 1 are a no-op.
    pub fn downscaled(mut self, factor: f32) -> Result<Self> {
        if !(factor > 0.0 && factor < 1.0) {
            return Ok(self);
        }
        let width = ((self.width as f32) * factor).round() as u32;
        let height = ((self.height as f32) * factor).round() as u32;
        self.resize(width, height)?;
        Ok(self)
    }

    /// Shrink so the height does not exceed `max_height`.
    pub fn capped_h(self, max_height: u32) -> Result<Self> {
        if self.height <= max_height {
            return Ok(self);
        }
        self.resized_h(max_height)
    }

    /// Create a borrowed view of this entire image.
    pub fn as_image(&self) -> Image<'_> {
        Image {
            x1: 0,
            y1: 0,
            x2: self.width,
            y2: self.height,
            true_width: self.width,
            data: &self.data,
        }
    }

    /// Convert to a grayscale `GrayImage` (luma).
    pub fn to_gray_image(&self) -> image::GrayImage {
        image::GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([self.data[(x + y * self.width) as usize].luma()])
        })
    }

    /// Create an RGB `OwnedImage` from a grayscale image (each pixel repeated into RGB).
    pub fn from_gray_as_rgb(gray: &image::GrayImage) -> Self {
        let (width, height) = gray.dimensions();
        let data = gray.pixels().map(|p| Color::new(p.0[0], p.0[0], p.0[0])).collect();
        Self { width, height, data }
    }
}

// ----------

/// Borrowed image view into an `OwnedImage`.
#[derive(Clone, Copy)]
pub struct Image<'a> {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
    true_width: u32,
    data: &'a [Color],
}

impl<'a> Image<'a> {
    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    #[inline(always)]
    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    #[inline(always)]
    fn pixel(&self, x: u32, y: u32) -> &Color {
        &self.data[(x + y * self.true_width) as usize]
    }

    pub fn to_owned_image(self) -> OwnedImage {
        let mut data = Vec::with_capacity((self.width() * self.height()) as usize);
        for y in self.y1..self.y2 {
            for x in self.x1..self.x2 {
                data.push(*self.pixel(x, y));
            }
        }

        OwnedImage {
            width: self.width(),
            height: self.height(),
            data,
        }
    }

    /// Packed RGB bytes, row-major.
    pub fn get_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity((self.width() * self.height() * 3) as usize);
        for y in self.y1..self.y2 {
            for x in self.x1..self.x2 {
                let clr = self.pixel(x, y);
                bytes.extend_from_slice(&[clr.r, clr.g, clr.b]);
            }
        }
        bytes
    }

    fn to_rgb_image(self) -> Result<image::RgbImage> {
        image::RgbImage::from_raw(self.width(), self.height(), self.get_bytes())
            .context("RgbImage::from_raw failed")
    }

    /// Encode as PNG in memory.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        self.to_rgb_image()?
            .write_to(&mut out, image::ImageFormat::Png)
            .context("encode png")?;
        Ok(out.into_inner())
    }

    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        self.to_rgb_image()?
            .save_with_format(path, image::ImageFormat::Png)
            .context("save png")
    }

    /// Create an arbitrary subimage (relative coordinates).
    pub fn sub_image(&self, x: u32, y: u32, width: u32, height: u32) -> Self {
        let x = x.min(self.width());
        let y = y.min(self.height());
        let width = width.min(self.width() - x);
        let height = height.min(self.height() - y);

        Self {
            x1: self.x1 + x,
            y1: self.y1 + y,
            x2: self.x1 + x + width,
            y2: self.y1 + y + height,
            true_width: self.true_width,
            data: self.data,
        }
    }

    /// Crop by a box expressed in fractions of this view's size.
    pub fn crop(&self, area: NormBox) -> Self {
        let (x, y, w, h) = area.to_pixels(self.width(), self.height());
        self.sub_image(x, y, w, h)
    }

    pub fn mean_luma(&self) -> u8 {
        let count = (self.width() as u64 * self.height() as u64).max(1);
        let mut sum = 0u64;
        for y in self.y1..self.y2 {
            for x in self.x1..self.x2 {
                sum += self.pixel(x, y).luma() as u64;
            }
        }
        (sum / count) as u8
    }

    /// Read a HUD number with OCR.
    ///
    /// Several binarizations of the crop are tried; the one whose text carries
    /// the most digits wins. Returns the raw text, which may be empty.
    pub fn get_digits(&self, ocr: &crate::ocr::Ocr) -> String {
        use imageproc::contrast::{ThresholdType, adaptive_threshold, equalize_histogram, otsu_level, threshold};

        if self.width() == 0 || self.height() == 0 {
            return String::new();
        }

        // Glyphs on the HUD are small; OCR does much better on larger ones.
        const MIN_H: u32 = 80;
        let mut base = self.to_owned_image();
        if base.height < MIN_H {
            match base.clone().resized_h(MIN_H) {
                Ok(upscaled) => base = upscaled,
                Err(err) => tracing::debug!(error = %err, "digit crop upscale failed"),
            }
        }

        // HUD digits are light on a darker badge; the fixed cut mirrors that.
        let fixed = {
            let mut gray = base.to_gray_image();
            if base.as_image().mean_luma() > 128 {
                image::imageops::invert(&mut gray);
            }
            OwnedImage::from_gray_as_rgb(&ensure_dark_text_on_light(threshold(
                &gray,
                120,
                ThresholdType::Binary,
            )))
        };

        let otsu = {
            let gray = equalize_histogram(&base.to_gray_image());
            let level = otsu_level(&gray);
            OwnedImage::from_gray_as_rgb(&ensure_dark_text_on_light(threshold(
                &gray,
                level,
                ThresholdType::Binary,
            )))
        };

        let adaptive = {
            let gray = equalize_histogram(&base.to_gray_image());
            OwnedImage::from_gray_as_rgb(&ensure_dark_text_on_light(adaptive_threshold(&gray, 7, 10)))
        };

        let mut best = String::new();
        let mut best_score = 0usize;
        for cand in [fixed, otsu, adaptive] {
            let text = ocr.get_text(cand.as_image());
            let score = text.chars().filter(char::is_ascii_digit).count();
            if score > best_score {
                best_score = score;
                best = text;
            }
        }

        if std::env::var("MCBUDDY_WRITE_IMAGE").as_deref() == Ok("1") {
            let name: String = best.chars().filter(char::is_ascii_digit).take(8).collect();
            if let Err(err) = self.save_png(format!("./debug_ocr_{name}.png")) {
                tracing::debug!(error = %err, "digit crop dump failed");
            }
        }

        best
    }
}

fn ensure_dark_text_on_light(mut bin: image::GrayImage) -> image::GrayImage {
    // If the image is mostly black, invert it so background becomes light.
    let white = bin.pixels().filter(|p| p.0[0] > 0).count();
    if white * 2 < (bin.width() * bin.height()) as usize {
        image::imageops::invert(&mut bin);
    }
    bin
}

// ----------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Self = Self::new(255, 255, 255);
    pub const BLACK: Self = Self::new(0, 0, 0);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Compute luma (grayscale intensity).
    pub fn luma(&self) -> u8 {
        let r = self.r as u32;
        let g = self.g as u32;
        let b = self.b as u32;
        ((299 * r + 587 * g + 114 * b) / 1000) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_uses_fractions_of_the_view() {
        let img = OwnedImage::filled(200, 100, Color::BLACK);
        let view = img.as_image();
        let crop = view.crop(NormBox::new(0.5, 0.5, 1.0, 1.0));
        assert_eq!((crop.width(), crop.height()), (100, 50));

        // Nested crops are relative to the parent view.
        let inner = crop.crop(NormBox::new(0.0, 0.0, 0.5, 0.5));
        assert_eq!((inner.width(), inner.height()), (50, 25));
    }

    #[test]
    fn downscale_preserves_aspect() {
        let img = OwnedImage::filled(1920, 1080, Color::WHITE).downscaled(0.5).unwrap();
        assert_eq!((img.width(), img.height()), (960, 540));

        let img = OwnedImage::filled(1920, 1080, Color::WHITE).capped_h(720).unwrap();
        assert_eq!((img.width(), img.height()), (1280, 720));

        let img = OwnedImage::filled(64, 32, Color::WHITE).downscaled(1.5).unwrap();
        assert_eq!((img.width(), img.height()), (64, 32));
    }

    #[test]
    fn png_roundtrip_keeps_pixels() {
        let img = OwnedImage::filled(8, 4, Color::new(10, 200, 30));
        let png = img.as_image().sub_image(2, 1, 4, 2).to_png().unwrap();
        let back = OwnedImage::decode(&png).unwrap();
        assert_eq!((back.width(), back.height()), (4, 2));
        assert_eq!(back.as_image().get_bytes()[..3], [10, 200, 30]);
    }

    #[test]
    fn save_png_surfaces_write_errors() {
        let dir = tempfile::tempdir().unwrap();
        let img = OwnedImage::filled(4, 4, Color::BLACK);
        assert!(img.as_image().save_png(dir.path().join("missing").join("crop.png")).is_err());

        let path = dir.path().join("crop.png");
        img.as_image().save_png(&path).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn rgba_drops_alpha() {
        let img = OwnedImage::from_rgba(2, &[1, 2, 3, 255, 4, 5, 6, 0]);
        assert_eq!((img.width(), img.height()), (2, 1));
        assert_eq!(img.as_image().get_bytes(), [1, 2, 3, 4, 5, 6]);
    }
}
