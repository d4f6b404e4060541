//! Pixel-mask collision detection.
//!
//! Gates are not rectangles: the cap lip is wider than the shaft, and the
//! agent silhouette is an ellipse, so bounding boxes report strikes that never
//! grazed a pixel. A [`Mask`] stores one bit per cell, row major, and overlap
//! is tested word-wise against a second mask shifted by an integer offset.
//! Float positions are rounded to whole cells with a single rounding rule, so
//! results are reproducible for identical positions.

use crate::bird::Bird;
use crate::io::config::{BirdConfig, PipeConfig};
use crate::pipe::Pipe;

/// Bit raster silhouette.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    words_per_row: usize,
    bits: Vec<u64>,
}

impl Mask {
    fn blank(width: u32, height: u32) -> Self {
        let words_per_row = (width as usize).div_ceil(64);
        Self {
            width,
            height,
            words_per_row,
            bits: vec![0; words_per_row * height as usize],
        }
    }

    /// Solid ellipse inscribed in a `width x height` box.
    pub fn ellipse(width: u32, height: u32) -> Self {
        let mut mask = Self::blank(width, height);
        let cx = (f64::from(width) - 1.0) / 2.0;
        let cy = (f64::from(height) - 1.0) / 2.0;
        let rx = f64::from(width) / 2.0;
        let ry = f64::from(height) / 2.0;
        for y in 0..height {
            for x in 0..width {
                let nx = (f64::from(x) - cx) / rx;
                let ny = (f64::from(y) - cy) / ry;
                if nx * nx + ny * ny <= 1.0 {
                    mask.set(x, y);
                }
            }
        }
        mask
    }

    /// Bottom-gate footprint: full-width cap rows at the top of the sprite,
    /// then the shaft inset by `shaft_inset` cells on each side.
    pub fn gate(width: u32, height: u32, cap_height: u32, shaft_inset: u32) -> Self {
        let mut mask = Self::blank(width, height);
        let inset = shaft_inset.min(width / 2);
        for y in 0..height {
            let (x0, x1) = if y < cap_height {
                (0, width)
            } else {
                (inset, width - inset)
            };
            for x in x0..x1 {
                mask.set(x, y);
            }
        }
        mask
    }

    /// Mirror the rows top to bottom; turns the bottom gate into the top one.
    pub fn flipped_vertically(&self) -> Self {
        let mut mask = Self::blank(self.width, self.height);
        for y in 0..self.height {
            let src = self.row(self.height - 1 - y);
            let dst_start = y as usize * self.words_per_row;
            mask.bits[dst_start..dst_start + self.words_per_row].copy_from_slice(src);
        }
        mask
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of filled cells.
    pub fn count(&self) -> u32 {
        self.bits.iter().map(|word| word.count_ones()).sum()
    }

    pub fn filled(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let word = self.row(y)[x as usize >> 6];
        word >> (x & 63) & 1 == 1
    }

    /// True when any filled cell of `self` coincides with a filled cell of
    /// `other` placed at offset `(dx, dy)` in `self` coordinates.
    ///
    /// The boundary arithmetic runs in i64 so offsets at the i32 extremes,
    /// as a saturating float cast can produce, stay a plain miss.
    pub fn overlaps(&self, other: &Mask, dx: i32, dy: i32) -> bool {
        let dx = i64::from(dx);
        let dy = i64::from(dy);
        let y_first = dy.max(0);
        let y_last = i64::from(self.height).min(i64::from(other.height) + dy);
        if y_first >= y_last {
            return false;
        }
        if dx >= i64::from(self.width) || dx + i64::from(other.width) <= 0 {
            return false;
        }
        for y in y_first..y_last {
            let own = self.row(y as u32);
            let theirs = other.row((y - dy) as u32);
            for (index, &word) in own.iter().enumerate() {
                if word == 0 {
                    continue;
                }
                let window = Self::window(theirs, index as i64 * 64 - dx);
                if word & window != 0 {
                    return true;
                }
            }
        }
        false
    }

    fn set(&mut self, x: u32, y: u32) {
        let start = y as usize * self.words_per_row;
        self.bits[start + (x as usize >> 6)] |= 1u64 << (x & 63);
    }

    fn row(&self, y: u32) -> &[u64] {
        let start = y as usize * self.words_per_row;
        &self.bits[start..start + self.words_per_row]
    }

    /// Bits `[start, start + 64)` of a row, zero outside the row.
    fn window(row: &[u64], start: i64) -> u64 {
        let index = start.div_euclid(64);
        let shift = start.rem_euclid(64) as u32;
        let low = Self::word_at(row, index);
        if shift == 0 {
            low
        } else {
            let high = Self::word_at(row, index + 1);
            (low >> shift) | (high << (64 - shift))
        }
    }

    fn word_at(row: &[u64], index: i64) -> u64 {
        if index < 0 {
            0
        } else {
            row.get(index as usize).copied().unwrap_or(0)
        }
    }
}

/// Silhouettes shared by every collision test in an episode. All pipes use the
/// same geometry, so the three masks are rasterized once.
#[derive(Clone, Debug)]
pub struct CollisionShapes {
    pub bird: Mask,
    pub gate_top: Mask,
    pub gate_bottom: Mask,
}

impl CollisionShapes {
    pub fn new(bird: &BirdConfig, pipe: &PipeConfig) -> Self {
        let bird_mask = Mask::ellipse(bird.width, bird.height);
        let gate_bottom = Mask::gate(pipe.width, pipe.height, pipe.cap_height, pipe.shaft_inset);
        let gate_top = gate_bottom.flipped_vertically();
        Self {
            bird: bird_mask,
            gate_top,
            gate_bottom,
        }
    }

    /// Pixel-accurate test of one agent against both footprints of one gate.
    ///
    /// Offsets are the gate's sprite origin relative to the agent's, rounded
    /// to whole cells.
    pub fn pipe_strike(&self, bird: &Bird, pipe: &Pipe, cfg: &PipeConfig) -> bool {
        let dx = (pipe.x - bird.x).round() as i32;
        let top_dy = (pipe.top_origin(cfg) - bird.y).round() as i32;
        let bottom_dy = (pipe.gap_bottom(cfg) - bird.y).round() as i32;
        self.bird.overlaps(&self.gate_top, dx, top_dy)
            || self.bird.overlaps(&self.gate_bottom, dx, bottom_dy)
    }
}

#[cfg(test)]
mod tests {
    use super::Mask;
    use proptest::prelude::*;

    fn solid(width: u32, height: u32) -> Mask {
        Mask::gate(width, height, height, 0)
    }

    #[test]
    fn ellipse_fills_less_than_its_box_but_most_of_it() {
        let mask = Mask::ellipse(68, 48);
        let box_area = 68 * 48;
        assert!(mask.count() < box_area);
        // area of an inscribed ellipse is pi/4 of the box
        assert!(mask.count() > box_area / 2);
        assert!(mask.filled(34, 24));
        assert!(!mask.filled(0, 0));
        assert!(!mask.filled(67, 47));
    }

    #[test]
    fn gate_cap_is_wider_than_the_shaft() {
        let mask = Mask::gate(104, 640, 40, 4);
        // cap rows span the full width
        assert!(mask.filled(0, 0));
        assert!(mask.filled(103, 39));
        // shaft rows are inset on both sides
        assert!(!mask.filled(0, 40));
        assert!(!mask.filled(103, 640 - 1));
        assert!(mask.filled(4, 40));
        assert!(mask.filled(99, 640 - 1));
    }

    #[test]
    fn flip_mirrors_rows() {
        let gate = Mask::gate(104, 640, 40, 4);
        let flipped = gate.flipped_vertically();
        assert_eq!(gate.count(), flipped.count());
        // the cap ends up at the bottom
        assert!(flipped.filled(0, 639));
        assert!(!flipped.filled(0, 0));
    }

    #[test]
    fn bounding_box_contact_without_pixel_contact() {
        // a probe inside the shaft inset touches the box but not the mask
        let gate = Mask::gate(104, 640, 40, 4);
        let probe = solid(2, 2);
        // beside the shaft, below the cap: inside the bounding box
        assert!(!gate.overlaps(&probe, 0, 100));
        // the same column at cap height is a real strike
        assert!(gate.overlaps(&probe, 0, 10));
        // shifted onto the shaft it strikes again
        assert!(gate.overlaps(&probe, 6, 100));
    }

    #[test]
    fn disjoint_masks_never_overlap() {
        let a = solid(8, 8);
        let b = solid(8, 8);
        assert!(!a.overlaps(&b, 8, 0));
        assert!(!a.overlaps(&b, 0, 8));
        assert!(!a.overlaps(&b, -8, 0));
        assert!(a.overlaps(&b, 7, 0));
        assert!(a.overlaps(&b, -7, 7));
    }

    #[test]
    fn wide_masks_overlap_across_word_boundaries() {
        let a = solid(104, 3);
        let b = solid(104, 3);
        for dx in [-103, -64, -63, -1, 0, 1, 63, 64, 103] {
            assert!(a.overlaps(&b, dx, 0), "dx {dx}");
        }
        assert!(!a.overlaps(&b, 104, 0));
        assert!(!a.overlaps(&b, -104, 0));
    }

    #[test]
    fn offsets_at_the_integer_extremes_simply_miss() {
        let bird = Mask::ellipse(68, 48);
        let gate = Mask::gate(104, 640, 40, 4);
        for offset in [i32::MIN, i32::MIN + 1, i32::MAX] {
            assert!(!bird.overlaps(&gate, 0, offset), "dy {offset}");
            assert!(!bird.overlaps(&gate, offset, 0), "dx {offset}");
            assert!(!bird.overlaps(&gate, offset, offset), "both {offset}");
        }
    }

    fn overlaps_reference(a: &Mask, b: &Mask, dx: i32, dy: i32) -> bool {
        for y in 0..a.height() {
            for x in 0..a.width() {
                if !a.filled(x, y) {
                    continue;
                }
                let bx = x as i64 - i64::from(dx);
                let by = y as i64 - i64::from(dy);
                if bx < 0 || by < 0 {
                    continue;
                }
                if bx < i64::from(b.width())
                    && by < i64::from(b.height())
                    && b.filled(bx as u32, by as u32)
                {
                    return true;
                }
            }
        }
        false
    }

    proptest! {
        #[test]
        fn overlap_matches_the_cell_by_cell_reference(
            aw in 1u32..80,
            ah in 1u32..12,
            bw in 1u32..80,
            bh in 1u32..12,
            cap in 0u32..12,
            inset in 0u32..6,
            dx in -90i32..90,
            dy in -14i32..14,
        ) {
            let a = Mask::ellipse(aw, ah);
            let b = Mask::gate(bw, bh, cap.min(bh), inset);
            prop_assert_eq!(a.overlaps(&b, dx, dy), overlaps_reference(&a, &b, dx, dy));
        }

        #[test]
        fn overlap_is_symmetric_under_offset_negation(
            aw in 1u32..70,
            ah in 1u32..10,
            bw in 1u32..70,
            bh in 1u32..10,
            dx in -80i32..80,
            dy in -12i32..12,
        ) {
            let a = Mask::ellipse(aw, ah);
            let b = Mask::ellipse(bw, bh);
            prop_assert_eq!(a.overlaps(&b, dx, dy), b.overlaps(&a, -dx, -dy));
        }
    }
}
