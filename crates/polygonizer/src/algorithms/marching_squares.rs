//! Marching-squares boundary walk over a packed mask.
//!
//! A square at `(x, y)` covers pixels `(x-1, y-1)`, `(x, y-1)`, `(x-1, y)`
//! and `(x, y)` with weights 1, 2, 4 and 8. Only squares whose four pixels
//! lie inside the mask are ever sampled.

use tracing::{trace, warn};

use crate::bitmask::{AlphaMask, byte_len, clear_bit, get_bit, set_bit};
use crate::types::Contour;

/// Half-size of the window scanned when none of the four squares around the
/// anchor pixel crosses the boundary.
pub const START_SEARCH_RADIUS: i64 = 8;

const START_OFFSETS: [(i64, i64); 4] = [(0, 0), (1, 0), (0, 1), (1, 1)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Up,
    Down,
    Left,
    Right,
}

impl Step {
    fn delta(self) -> (i64, i64) {
        match self {
            Step::Up => (0, -1),
            Step::Down => (0, 1),
            Step::Left => (-1, 0),
            Step::Right => (1, 0),
        }
    }
}

/// Square positions that can be sampled without leaving the mask.
#[derive(Debug, Clone, Copy)]
struct SquareBounds {
    max_x: i64,
    max_y: i64,
}

impl SquareBounds {
    fn of(mask: &AlphaMask) -> Self {
        Self {
            max_x: mask.width() as i64 - 1,
            max_y: mask.height() as i64 - 1,
        }
    }

    fn contains(&self, (x, y): (i64, i64)) -> bool {
        x >= 1 && y >= 1 && x <= self.max_x && y <= self.max_y
    }
}

/// 2x2 pattern value (0..=15) of the square at `(x, y)`
pub fn square_value(mask: &AlphaMask, x: u32, y: u32) -> u8 {
    let bits = mask.bits();
    let width = mask.width() as usize;
    let below = y as usize * width + x as usize;
    let above = below - width;

    get_bit(bits, above - 1)
        | (get_bit(bits, above) << 1)
        | (get_bit(bits, below - 1) << 2)
        | (get_bit(bits, below) << 3)
}

/// First-visit flags for saddle squares, scoped to a single trace.
///
/// Only the cells flagged during a trace are cleared on reset, so reusing
/// one instance across many small contours stays cheap.
#[derive(Debug, Default)]
pub struct SaddleToggles {
    bits: Vec<u8>,
    touched: Vec<usize>,
}

impl SaddleToggles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare for a trace over `cells` squares
    pub fn reset(&mut self, cells: usize) {
        if self.bits.len() != byte_len(cells) {
            self.bits = vec![0; byte_len(cells)];
            self.touched.clear();
            return;
        }
        for idx in self.touched.drain(..) {
            clear_bit(&mut self.bits, idx);
        }
    }

    /// Flip the flag of `cell`; true on a first (odd) visit
    pub fn flip(&mut self, cell: usize) -> bool {
        if get_bit(&self.bits, cell) == 1 {
            clear_bit(&mut self.bits, cell);
            false
        } else {
            set_bit(&mut self.bits, cell);
            self.touched.push(cell);
            true
        }
    }
}

/// Result of walking one boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub contour: Contour,
    /// The walk stopped before returning to its start square
    pub truncated: bool,
}

/// Walks outer boundaries of a padded mask.
#[derive(Debug, Default)]
pub struct ContourTracer {
    toggles: SaddleToggles,
}

impl ContourTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick a boundary-crossing square next to `anchor`.
    ///
    /// For the leftmost pixel of a component the square at the pixel itself
    /// always qualifies; the windowed fallback covers arbitrary anchors.
    pub fn find_start_square(&self, mask: &AlphaMask, anchor: (u32, u32)) -> Option<(u32, u32)> {
        let bounds = SquareBounds::of(mask);
        let (ax, ay) = (anchor.0 as i64, anchor.1 as i64);

        let crosses = |pos: (i64, i64)| {
            bounds.contains(pos) && {
                let value = square_value(mask, pos.0 as u32, pos.1 as u32);
                value != 0 && value != 15
            }
        };

        let candidates = START_OFFSETS.iter().map(|&(dx, dy)| (ax + dx, ay + dy));
        let window = (-START_SEARCH_RADIUS..=START_SEARCH_RADIUS).flat_map(|dy| {
            (-START_SEARCH_RADIUS..=START_SEARCH_RADIUS).map(move |dx| (ax + dx, ay + dy))
        });

        candidates
            .chain(window)
            .find(|&pos| crosses(pos))
            .map(|(x, y)| (x as u32, y as u32))
    }

    /// Follow the boundary from `start` until it closes or `max_steps` runs out.
    ///
    /// Runs of identical steps collapse into one segment, so only direction
    /// changes become vertices. Coordinates are shifted by the mask padding.
    pub fn trace(&mut self, mask: &AlphaMask, start: (u32, u32), max_steps: usize) -> Trace {
        let bounds = SquareBounds::of(mask);
        let width = mask.width() as i64;
        let padding = mask.padding() as i64;
        self.toggles.reset(mask.pixel_count());

        let start = (start.0 as i64, start.1 as i64);
        let mut cur = start;
        let mut prev: Option<Step> = None;
        let mut contour = Contour::with_capacity(64);
        let mut steps = 0usize;

        let truncated = loop {
            steps += 1;
            if steps > max_steps {
                warn!(max_steps, points = contour.len(), "contour step budget exhausted");
                break true;
            }
            if !bounds.contains(cur) {
                break true;
            }

            let cell = (cur.1 * width + cur.0) as usize;
            let step = match square_value(mask, cur.0 as u32, cur.1 as u32) {
                1 | 5 | 13 => Step::Up,
                8 | 10 | 11 => Step::Down,
                4 | 12 | 14 => Step::Left,
                2 | 3 | 7 => Step::Right,
                9 => {
                    if self.toggles.flip(cell) {
                        Step::Up
                    } else {
                        Step::Down
                    }
                }
                6 => {
                    if self.toggles.flip(cell) {
                        Step::Right
                    } else {
                        Step::Left
                    }
                }
                value => {
                    trace!(value, x = cur.0, y = cur.1, "walk reached a non-boundary square");
                    break true;
                }
            };

            let (dx, dy) = step.delta();
            cur = (cur.0 + dx, cur.1 + dy);

            let x = to_image_coord(cur.0, padding);
            let y = to_image_coord(cur.1, padding);
            if prev == Some(step) {
                contour.set_last(x, y);
            } else {
                contour.push(x, y);
            }
            prev = Some(step);

            if cur == start {
                break false;
            }
        };

        Trace { contour, truncated }
    }
}

fn to_image_coord(value: i64, padding: i64) -> u16 {
    (value - padding).clamp(0, u16::MAX as i64) as u16
}
