//! Packed one-bit-per-pixel opacity masks.
//!
//! Bit `i` lives in byte `i >> 3` at position `i & 7` (LSB-first) and maps to
//! pixel `(i % width, i / width)`. Masks used for tracing carry a transparent
//! border of `padding` pixels on every side.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::{PolygonizerError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "AlphaMaskWire")]
pub struct AlphaMask {
    width: u32,
    height: u32,
    padding: u32,
    #[serde(serialize_with = "base64_bits::serialize")]
    bits: Vec<u8>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlphaMaskWire {
    width: u32,
    height: u32,
    #[serde(default)]
    padding: u32,
    #[serde(deserialize_with = "base64_bits::deserialize")]
    bits: Vec<u8>,
}

impl TryFrom<AlphaMaskWire> for AlphaMask {
    type Error = PolygonizerError;

    fn try_from(wire: AlphaMaskWire) -> Result<Self> {
        AlphaMask::from_bits(wire.bits, wire.width, wire.height, wire.padding)
    }
}

/// Bytes needed to hold `pixels` bits
pub fn byte_len(pixels: usize) -> usize {
    (pixels + 7) >> 3
}

#[inline]
pub(crate) fn get_bit(bits: &[u8], idx: usize) -> u8 {
    (bits[idx >> 3] >> (idx & 7)) & 1
}

#[inline]
pub(crate) fn set_bit(bits: &mut [u8], idx: usize) {
    bits[idx >> 3] |= 1 << (idx & 7);
}

#[inline]
pub(crate) fn clear_bit(bits: &mut [u8], idx: usize) {
    bits[idx >> 3] &= !(1 << (idx & 7));
}

impl AlphaMask {
    /// Fully transparent mask of the given (already padded) size
    pub fn new(width: u32, height: u32, padding: u32) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            width,
            height,
            padding,
            bits: vec![0; byte_len(pixels)],
        }
    }

    /// Adopt an existing packed buffer
    pub fn from_bits(bits: Vec<u8>, width: u32, height: u32, padding: u32) -> Result<Self> {
        let expected = byte_len(width as usize * height as usize);
        if bits.len() != expected {
            return Err(PolygonizerError::LengthMismatch {
                expected,
                actual: bits.len(),
            });
        }
        if padding.saturating_mul(2) > width.min(height) {
            return Err(PolygonizerError::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            padding,
            bits,
        })
    }

    /// Pack the alpha channel of an RGBA image
    pub fn from_image(image: &RgbaImage, threshold: i32, padding: u32) -> Result<Self> {
        pack_alpha_mask(image.as_raw(), image.width(), image.height(), threshold, padding)
    }

    /// Padded width
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Padded height
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn padding(&self) -> u32 {
        self.padding
    }

    /// Width of the real image inside the border
    pub fn image_width(&self) -> u32 {
        self.width - 2 * self.padding
    }

    /// Height of the real image inside the border
    pub fn image_height(&self) -> u32 {
        self.height - 2 * self.padding
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    pub(crate) fn bits_mut(&mut self) -> &mut [u8] {
        &mut self.bits
    }

    pub fn into_bits(self) -> Vec<u8> {
        self.bits
    }

    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn get(&self, idx: usize) -> bool {
        get_bit(&self.bits, idx) == 1
    }

    pub fn get_xy(&self, x: u32, y: u32) -> bool {
        self.get(self.index(x, y))
    }

    pub fn set(&mut self, idx: usize) {
        set_bit(&mut self.bits, idx);
    }

    pub fn clear(&mut self, idx: usize) {
        clear_bit(&mut self.bits, idx);
    }

    /// Number of opaque pixels
    pub fn count_opaque(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// True when no pixel is opaque
    pub fn is_clear(&self) -> bool {
        self.bits.iter().all(|&b| b == 0)
    }
}

/// Pack an RGBA buffer into an opacity mask.
///
/// A pixel is opaque iff its alpha is at least `threshold` (clamped to
/// `0..=255`). With `padding > 0` the image is placed at offset
/// `(padding, padding)` inside a transparent border.
pub fn pack_alpha_mask(
    rgba: &[u8],
    width: u32,
    height: u32,
    threshold: i32,
    padding: u32,
) -> Result<AlphaMask> {
    if width > u16::MAX as u32 || height > u16::MAX as u32 || padding > u16::MAX as u32 {
        return Err(PolygonizerError::InvalidDimensions { width, height });
    }

    let pixels = width as usize * height as usize;
    let expected = pixels * 4;
    if rgba.len() < expected {
        return Err(PolygonizerError::LengthMismatch {
            expected,
            actual: rgba.len(),
        });
    }

    let threshold = threshold.clamp(0, 255) as u8;
    let padded_width = width + 2 * padding;
    let padded_height = height + 2 * padding;
    let mut mask = AlphaMask::new(padded_width, padded_height, padding);
    let bits = mask.bits_mut();

    if padding == 0 {
        for (i, px) in rgba[..expected].chunks_exact(4).enumerate() {
            if px[3] >= threshold {
                set_bit(bits, i);
            }
        }
        return Ok(mask);
    }

    let row_stride = width as usize * 4;
    for (y, row) in rgba[..expected].chunks_exact(row_stride.max(1)).enumerate() {
        let base = (y + padding as usize) * padded_width as usize + padding as usize;
        for (x, px) in row.chunks_exact(4).enumerate() {
            if px[3] >= threshold {
                set_bit(bits, base + x);
            }
        }
    }

    Ok(mask)
}

mod base64_bits {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bits: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bits))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba_from_alpha(alpha: &[u8]) -> Vec<u8> {
        alpha.iter().flat_map(|&a| [255, 0, 0, a]).collect()
    }

    #[test]
    fn test_packing_matches_threshold() {
        let width = 7u32;
        let height = 5u32;
        let alpha: Vec<u8> = (0..width * height).map(|i| ((i * 37) % 256) as u8).collect();
        let rgba = rgba_from_alpha(&alpha);

        for threshold in [0, 1, 64, 128, 200, 255] {
            let mask = pack_alpha_mask(&rgba, width, height, threshold, 0).expect("Should pack");
            assert_eq!(mask.bits().len(), byte_len(35));
            for (i, &a) in alpha.iter().enumerate() {
                assert_eq!(mask.get(i), a as i32 >= threshold, "pixel {i} threshold {threshold}");
            }
        }
    }

    #[test]
    fn test_padded_packing_offsets_interior() {
        let alpha = [255u8, 0, 0, 255];
        let rgba = rgba_from_alpha(&alpha);

        let mask = pack_alpha_mask(&rgba, 2, 2, 128, 2).expect("Should pack");
        assert_eq!((mask.width(), mask.height()), (6, 6));
        assert_eq!((mask.image_width(), mask.image_height()), (2, 2));
        assert!(mask.get_xy(2, 2));
        assert!(!mask.get_xy(3, 2));
        assert!(!mask.get_xy(2, 3));
        assert!(mask.get_xy(3, 3));
        assert_eq!(mask.count_opaque(), 2);
    }

    #[test]
    fn test_threshold_is_clamped() {
        let rgba = rgba_from_alpha(&[0, 255]);

        let low = pack_alpha_mask(&rgba, 2, 1, -40, 0).expect("Should pack");
        assert_eq!(low.count_opaque(), 2);

        let high = pack_alpha_mask(&rgba, 2, 1, 999, 0).expect("Should pack");
        assert_eq!(high.count_opaque(), 1);
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let rgba = vec![0u8; 15];
        match pack_alpha_mask(&rgba, 2, 2, 0, 2) {
            Err(PolygonizerError::LengthMismatch { expected, actual }) => {
                assert_eq!(expected, 16);
                assert_eq!(actual, 15);
            }
            other => panic!("Expected length mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_serde_encodes_bits_as_base64() {
        let rgba = rgba_from_alpha(&[255; 9]);
        let mask = pack_alpha_mask(&rgba, 3, 3, 1, 1).expect("Should pack");

        let json = serde_json::to_value(&mask).unwrap();
        assert!(json["bits"].is_string());

        let back: AlphaMask = serde_json::from_value(json).unwrap();
        assert_eq!(back, mask);
    }

    #[test]
    fn test_from_bits_checks_length() {
        assert!(AlphaMask::from_bits(vec![0; 2], 4, 4, 0).is_ok());
        assert!(AlphaMask::from_bits(vec![0; 3], 4, 4, 0).is_err());
    }
}
