//! RGBA raster buffers that tiles are rendered into

use crate::geometry::PixelRect;
use serde::{Deserialize, Serialize};

/// An RGBA color, 8 bits per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color from `0xRRGGBB`
    pub const fn from_rgb(rgb: u32) -> Self {
        Self::new((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8, 255)
    }

    fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Pixel buffer in RGBA format (4 bytes per pixel, row-major)
///
/// Every tile is rendered into a `TILE_SIZE` x `TILE_SIZE` bitmap; the
/// placeholder uses a bitmap sized after the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Bitmap {
    /// Create a fully transparent bitmap
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, Rgba::TRANSPARENT)
    }

    /// Create a bitmap filled with a single color
    pub fn filled(width: u32, height: u32, color: Rgba) -> Self {
        let pixels = color
            .to_array()
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable raw RGBA bytes
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Size of the pixel data in bytes
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }

    /// Check if the bitmap is fully opaque
    pub fn is_opaque(&self) -> bool {
        self.pixels.chunks_exact(4).all(|rgba| rgba[3] == 255)
    }

    /// Color of a single pixel, `None` outside the bitmap
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        let offset = self.offset(x, y)?;
        let p = &self.pixels[offset..offset + 4];
        Some(Rgba::new(p[0], p[1], p[2], p[3]))
    }

    /// Set a single pixel; out-of-bounds writes are ignored
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgba) {
        if let Some(offset) = self.offset(x, y) {
            self.pixels[offset..offset + 4].copy_from_slice(&color.to_array());
        }
    }

    /// Fill the whole bitmap with a color
    pub fn fill(&mut self, color: Rgba) {
        let rgba = color.to_array();
        for chunk in self.pixels.chunks_exact_mut(4) {
            chunk.copy_from_slice(&rgba);
        }
    }

    /// Fill a rectangle, clipped to the bitmap bounds
    pub fn fill_rect(&mut self, rect: PixelRect, color: Rgba) {
        let left = rect.left.clamp(0, self.width as i32) as u32;
        let right = rect.right.clamp(0, self.width as i32) as u32;
        let top = rect.top.clamp(0, self.height as i32) as u32;
        let bottom = rect.bottom.clamp(0, self.height as i32) as u32;

        for y in top..bottom {
            for x in left..right {
                self.set_pixel(x, y, color);
            }
        }
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filled_bitmap() {
        let bitmap = Bitmap::filled(4, 2, Rgba::from_rgb(0x112233));
        assert_eq!(bitmap.byte_size(), 4 * 2 * 4);
        assert!(bitmap.is_opaque());
        assert_eq!(bitmap.pixel(3, 1), Some(Rgba::new(0x11, 0x22, 0x33, 255)));
        assert_eq!(bitmap.pixel(4, 0), None);
    }

    #[test]
    fn test_transparent_bitmap_is_not_opaque() {
        let bitmap = Bitmap::new(2, 2);
        assert!(!bitmap.is_opaque());
    }

    #[test]
    fn test_fill_rect_is_clipped() {
        let mut bitmap = Bitmap::filled(4, 4, Rgba::BLACK);
        bitmap.fill_rect(PixelRect::new(2, 2, 10, 10), Rgba::WHITE);

        assert_eq!(bitmap.pixel(1, 1), Some(Rgba::BLACK));
        assert_eq!(bitmap.pixel(2, 2), Some(Rgba::WHITE));
        assert_eq!(bitmap.pixel(3, 3), Some(Rgba::WHITE));
    }

    #[test]
    fn test_set_pixel_out_of_bounds_is_ignored() {
        let mut bitmap = Bitmap::filled(1, 1, Rgba::BLACK);
        bitmap.set_pixel(5, 5, Rgba::WHITE);
        assert_eq!(bitmap.pixel(0, 0), Some(Rgba::BLACK));
    }
}
