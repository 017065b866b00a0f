//! Topological thinning of free space.
//!
//! [`skeletonize`] peels the Free region one border layer at a time until
//! only a one-cell-wide skeleton remains.  Each round runs four directional
//! sub-passes (north, south, east, west).  A sub-pass first collects every
//! foreground cell whose neighbour on that side is background, then visits
//! the collected cells in row-major order and deletes each one that is
//! still *simple* and not an endpoint.
//!
//! A cell is simple when its 8-connectivity Yokoi number is 1:
//!
//! ```text
//!  N8 = Σ_{k ∈ {0,2,4,6}} ( x̄_k − x̄_k · x̄_{k+1} · x̄_{k+2} )
//! ```
//!
//! where `x_0 … x_7` are the neighbours E, NE, N, NW, W, SW, S, SE and
//! `x̄ = 1 − x`.  Deleting a simple cell changes neither the 8-connected
//! components of the foreground nor the 4-connected components of the
//! background, so the skeleton has exactly as many pieces as the free
//! region it came from.

use tracing::debug;

use crate::threshold::{GridGeometry, ThresholdedGrid};

/// Neighbour ring for the Yokoi number: E, NE, N, NW, W, SW, S, SE as
/// `(dcol, drow)`; rows grow southwards.
const YOKOI_RING: [(isize, isize); 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Sub-pass order within a round: north, south, east, west borders.
const BORDERS: [(isize, isize); 4] = [(0, -1), (0, 1), (1, 0), (-1, 0)];

// ────────────────────────────────────────────────────────────────────────────
// SkeletonMask
// ────────────────────────────────────────────────────────────────────────────

/// Boolean grid of the same shape as the thresholded grid; `true` marks a
/// skeleton cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkeletonMask {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl SkeletonMask {
    /// Mask over `geometry` with the given row-major cells.
    ///
    /// Returns `None` if `cells` does not cover the geometry exactly.
    pub fn new(geometry: &GridGeometry, cells: Vec<bool>) -> Option<Self> {
        (cells.len() == geometry.len()).then_some(Self {
            width: geometry.width,
            height: geometry.height,
            cells,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Whether `(col, row)` is a skeleton cell.  Out of range reads `false`.
    #[inline]
    pub fn get(&self, col: usize, row: usize) -> bool {
        col < self.width && row < self.height && self.cells[row * self.width + col]
    }

    /// Whether the cell at `(col + dc, row + dr)` is a skeleton cell.
    #[inline]
    pub fn get_offset(&self, col: usize, row: usize, dc: isize, dr: isize) -> bool {
        match (col.checked_add_signed(dc), row.checked_add_signed(dr)) {
            (Some(c), Some(r)) => self.get(c, r),
            _ => false,
        }
    }

    fn clear(&mut self, col: usize, row: usize) {
        self.cells[row * self.width + col] = false;
    }

    /// Number of skeleton cells.
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.cells.iter().any(|&c| c)
    }

    /// Skeleton cells as `(col, row)` in row-major order.
    pub fn iter_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| **c)
            .map(|(i, _)| (i % self.width, i / self.width))
    }

    /// Number of 8-neighbours of `(col, row)` that are skeleton cells.
    pub fn neighbor_count(&self, col: usize, row: usize) -> usize {
        self.ring(col, row).iter().filter(|&&x| x).count()
    }

    fn ring(&self, col: usize, row: usize) -> [bool; 8] {
        YOKOI_RING.map(|(dc, dr)| self.get_offset(col, row, dc, dr))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// skeletonize
// ────────────────────────────────────────────────────────────────────────────

/// Thin the Free region of `grid` to a one-cell-wide skeleton.
///
/// Unknown cells count as background.  An empty free region yields an empty
/// mask.
pub fn skeletonize(grid: &ThresholdedGrid) -> SkeletonMask {
    let geometry = grid.geometry();
    let mut mask = SkeletonMask {
        width: geometry.width,
        height: geometry.height,
        cells: grid.cells().iter().map(|c| c.is_free()).collect(),
    };

    let mut rounds = 0usize;
    let mut removed_total = 0usize;
    let mut candidates: Vec<(usize, usize)> = Vec::new();
    loop {
        rounds += 1;
        let mut removed = 0usize;
        for &(dc, dr) in &BORDERS {
            candidates.clear();
            candidates.extend(
                mask.iter_cells()
                    .filter(|&(col, row)| !mask.get_offset(col, row, dc, dr)),
            );
            for &(col, row) in &candidates {
                if is_deletable(&mask.ring(col, row)) {
                    mask.clear(col, row);
                    removed += 1;
                }
            }
        }
        removed_total += removed;
        if removed == 0 {
            break;
        }
    }

    debug!(
        rounds,
        removed = removed_total,
        remaining = mask.count(),
        "Free space thinned"
    );
    mask
}

/// A cell may go when it is simple and has at least two neighbours.
fn is_deletable(ring: &[bool; 8]) -> bool {
    ring.iter().filter(|&&x| x).count() >= 2 && yokoi_number(ring) == 1
}

/// 8-connectivity Yokoi connectivity number of a neighbour ring.
fn yokoi_number(ring: &[bool; 8]) -> u8 {
    let bg = ring.map(|x| u8::from(!x));
    [0usize, 2, 4, 6]
        .iter()
        .map(|&k| bg[k] - bg[k] * bg[(k + 1) % 8] * bg[(k + 2) % 8])
        .sum()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
