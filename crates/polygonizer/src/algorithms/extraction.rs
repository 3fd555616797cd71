use tracing::{debug, trace, warn};

use crate::{
    algorithms::component::ComponentCollector,
    algorithms::marching_squares::ContourTracer,
    bitmask::{AlphaMask, get_bit},
    error::Result,
    traits::ContourExtractor,
    types::Contour,
};

/// Upper bound on contours produced from one mask
pub const MAX_CONTOURS: usize = 1_000_000;

/// Marching-squares outer contour extractor.
///
/// Produces exactly one contour per 4-connected opaque component; holes are
/// cleared together with their component and never traced.
#[derive(Debug, Clone)]
pub struct MarchingSquaresExtractor {
    pub max_contours: usize,
    /// Walk budget per contour, as a multiple of the mask's pixel count
    pub steps_per_pixel: usize,
}

impl Default for MarchingSquaresExtractor {
    fn default() -> Self {
        Self {
            max_contours: MAX_CONTOURS,
            steps_per_pixel: 4,
        }
    }
}

impl ContourExtractor for MarchingSquaresExtractor {
    fn extract_contours(&self, mask: &AlphaMask) -> Result<Vec<Contour>> {
        let mut scratch = mask.clone();
        Ok(self.extract_in_place(&mut scratch))
    }
}

impl MarchingSquaresExtractor {
    /// Trace every outer boundary, consuming the mask.
    ///
    /// On return every pixel inside the padding ring has been cleared, unless
    /// the contour budget ran out first.
    pub fn extract_in_place(&self, mask: &mut AlphaMask) -> Vec<Contour> {
        let Some(interior) = Interior::of(mask) else {
            return Vec::new();
        };

        let max_steps = self.steps_per_pixel.saturating_mul(mask.pixel_count());
        let mut collector = ComponentCollector::new();
        let mut tracer = ContourTracer::new();
        let mut contours = Vec::new();
        let mut cursor = (interior.min, interior.min);

        for _ in 0..self.max_contours {
            let Some(seed) = interior.next_opaque(mask, &mut cursor) else {
                debug!(contours = contours.len(), "mask exhausted");
                return contours;
            };

            let Some(component) = collector.collect_and_clear(mask, seed) else {
                continue;
            };
            component.restore(mask);

            match tracer.find_start_square(mask, component.leftmost) {
                Some(start) => {
                    let traced = tracer.trace(mask, start, max_steps);
                    trace!(
                        pixels = component.len(),
                        points = traced.contour.len(),
                        truncated = traced.truncated,
                        "traced component"
                    );
                    if !traced.contour.is_empty() {
                        contours.push(traced.contour);
                    }
                }
                None => warn!(
                    x = component.leftmost.0,
                    y = component.leftmost.1,
                    pixels = component.len(),
                    "no boundary square near component, skipping it"
                ),
            }

            component.clear(mask);
        }

        if interior.next_opaque(mask, &mut cursor).is_some() {
            warn!(max_contours = self.max_contours, "contour budget exhausted");
        }
        contours
    }
}

/// Trace all outer contours of a padded mask with default limits
pub fn extract_outer_contours(mask: &mut AlphaMask) -> Vec<Contour> {
    MarchingSquaresExtractor::default().extract_in_place(mask)
}

/// Pixel range strictly inside the padding ring (at least one pixel in).
#[derive(Debug, Clone, Copy)]
struct Interior {
    min: u32,
    max_x: u32,
    max_y: u32,
}

impl Interior {
    fn of(mask: &AlphaMask) -> Option<Self> {
        let inset = mask.padding().max(1);
        let max_x = mask.width().checked_sub(inset + 1)?;
        let max_y = mask.height().checked_sub(inset + 1)?;
        (max_x >= inset && max_y >= inset).then_some(Self {
            min: inset,
            max_x,
            max_y,
        })
    }

    /// Row-major scan for an opaque pixel, resuming at `cursor`.
    ///
    /// Everything before the cursor is already transparent: earlier seeds
    /// were the first opaque pixels in scan order and were cleared.
    fn next_opaque(&self, mask: &AlphaMask, cursor: &mut (u32, u32)) -> Option<usize> {
        let bits = mask.bits();
        let (mut x, mut y) = *cursor;

        while y <= self.max_y {
            let row = mask.index(0, y);
            while x <= self.max_x {
                let idx = row + x as usize;
                if get_bit(bits, idx) == 1 {
                    *cursor = (x, y);
                    return Some(idx);
                }
                x += 1;
            }
            x = self.min;
            y += 1;
        }

        *cursor = (self.min, y);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmask::pack_alpha_mask;

    fn mask_from_rows(rows: &[&str], padding: u32) -> AlphaMask {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        let rgba: Vec<u8> = rows
            .iter()
            .flat_map(|row| row.chars())
            .flat_map(|c| [0, 0, 0, if c == '#' { 255 } else { 0 }])
            .collect();
        pack_alpha_mask(&rgba, width, height, 128, padding).expect("Should pack")
    }

    #[test]
    fn test_block_in_padded_mask() {
        let mut mask = mask_from_rows(&["####", "####", "####", "####"], 2);
        assert_eq!((mask.width(), mask.height()), (8, 8));

        let contours = extract_outer_contours(&mut mask);
        assert_eq!(contours.len(), 1);

        let mut corners: Vec<[u16; 2]> = contours[0].points().collect();
        corners.sort();
        assert_eq!(corners, vec![[0, 0], [0, 4], [4, 0], [4, 4]]);
    }

    #[test]
    fn test_rectangle_yields_single_contour_and_clears_mask() {
        let mut mask = mask_from_rows(
            &[
                "..........",
                "..######..",
                "..######..",
                "..######..",
                "..........",
            ],
            2,
        );

        let contours = extract_outer_contours(&mut mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].len(), 4);
        assert_eq!(contours[0].bounding_box(), Some(([2, 1], [8, 4])));
        assert!(mask.is_clear());

        // Extraction is idempotent on the consumed mask
        assert!(extract_outer_contours(&mut mask).is_empty());
    }

    #[test]
    fn test_one_contour_per_component() {
        let mut mask = mask_from_rows(
            &[
                "##....#",
                "##...##",
                ".......",
                "..###..",
                "..#.#..",
                "..###..",
            ],
            2,
        );

        let contours = extract_outer_contours(&mut mask);
        assert_eq!(contours.len(), 3);
        assert!(mask.is_clear());
    }

    #[test]
    fn test_holes_are_not_traced() {
        let mut mask = mask_from_rows(&["#####", "#...#", "#...#", "#####"], 2);

        let contours = extract_outer_contours(&mut mask);
        assert_eq!(contours.len(), 1);
        assert!((contours[0].area() - 20.0).abs() < 1e-9);
        assert!(mask.is_clear());
    }

    #[test]
    fn test_contour_budget_truncates() {
        let mut mask = mask_from_rows(&["#.#.#"], 2);
        let extractor = MarchingSquaresExtractor {
            max_contours: 2,
            ..Default::default()
        };

        let contours = extractor.extract_in_place(&mut mask);
        assert_eq!(contours.len(), 2);
        assert_eq!(mask.count_opaque(), 1);
    }

    #[test]
    fn test_trait_leaves_input_untouched() {
        let mask = mask_from_rows(&["##", "##"], 2);
        let contours = MarchingSquaresExtractor::default()
            .extract_contours(&mask)
            .expect("Should extract");

        assert_eq!(contours.len(), 1);
        assert_eq!(mask.count_opaque(), 4);
    }

    #[test]
    fn test_empty_and_tiny_masks() {
        let mut empty = mask_from_rows(&["...", "..."], 2);
        assert!(extract_outer_contours(&mut empty).is_empty());

        let mut zero = AlphaMask::new(0, 0, 0);
        assert!(extract_outer_contours(&mut zero).is_empty());
    }

    #[test]
    fn test_single_pixel_contours() {
        let mut mask = mask_from_rows(&["#.", ".#"], 2);
        let contours = extract_outer_contours(&mut mask);

        assert_eq!(contours.len(), 2);
        for contour in &contours {
            assert_eq!(contour.len(), 4);
            assert!((contour.area() - 1.0).abs() < 1e-9);
        }
    }
}
