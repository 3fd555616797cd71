use crate::bitmask::{AlphaMask, clear_bit, get_bit, set_bit};

/// One 4-connected opaque blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Component {
    /// Mask indices of every pixel in the blob
    pub pixels: Vec<usize>,
    /// Minimum x, ties broken by minimum y
    pub leftmost: (u32, u32),
}

impl Component {
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Set every pixel of the component back to opaque
    pub fn restore(&self, mask: &mut AlphaMask) {
        let bits = mask.bits_mut();
        for &idx in &self.pixels {
            set_bit(bits, idx);
        }
    }

    /// Clear every pixel of the component
    pub fn clear(&self, mask: &mut AlphaMask) {
        let bits = mask.bits_mut();
        for &idx in &self.pixels {
            clear_bit(bits, idx);
        }
    }
}

/// Iterative flood fill over a packed mask.
///
/// The explicit stack is kept between calls so repeated collections on one
/// mask do not reallocate.
#[derive(Debug, Default)]
pub struct ComponentCollector {
    stack: Vec<usize>,
}

impl ComponentCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the component containing `seed` and clear it from the mask.
    ///
    /// Returns `None` when the seed pixel is transparent.
    pub fn collect_and_clear(&mut self, mask: &mut AlphaMask, seed: usize) -> Option<Component> {
        let width = mask.width() as usize;
        let height = mask.height() as usize;
        let bits = mask.bits_mut();

        if get_bit(bits, seed) == 0 {
            return None;
        }

        let mut pixels = Vec::new();
        let mut left = (seed % width, seed / width);

        self.stack.clear();
        clear_bit(bits, seed);
        self.stack.push(seed);
        pixels.push(seed);

        while let Some(idx) = self.stack.pop() {
            let x = idx % width;
            let y = idx / width;

            if x < left.0 || (x == left.0 && y < left.1) {
                left = (x, y);
            }

            let mut visit = |ni: usize| {
                if get_bit(bits, ni) == 1 {
                    clear_bit(bits, ni);
                    self.stack.push(ni);
                    pixels.push(ni);
                }
            };

            if x > 0 {
                visit(idx - 1);
            }
            if x + 1 < width {
                visit(idx + 1);
            }
            if y > 0 {
                visit(idx - width);
            }
            if y + 1 < height {
                visit(idx + width);
            }
        }

        Some(Component {
            pixels,
            leftmost: (left.0 as u32, left.1 as u32),
        })
    }
}
