//! Occupancy thresholding: raw grid → free / occupied / unknown cells.
//!
//! Raw cell values follow the ROS convention (percent occupancy, negative
//! for never-observed).  They are mapped onto the 0–255 image scale before
//! the comparison so that the configured threshold reads the same way as an
//! image-processing threshold would.

use topo_types::{OccupancyGridMsg, TopoError};
use tracing::debug;

use crate::config::ExtractionConfig;
use crate::transform::Point2;

/// Maximum accepted deviation between the grid resolution and the
/// configured one (metres).
const RESOLUTION_TOLERANCE: f32 = 1e-6;

// ────────────────────────────────────────────────────────────────────────────
// CellState
// ────────────────────────────────────────────────────────────────────────────

/// Binarised state of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Free,
    Occupied,
    Unknown,
}

impl CellState {
    pub fn is_free(self) -> bool {
        self == CellState::Free
    }
}

/// Classify a single raw value against `threshold` (0–255 scale).
///
/// Values above 100 saturate at 255.
pub fn classify_cell(raw: i8, threshold: u8) -> CellState {
    if raw < 0 {
        return CellState::Unknown;
    }
    let scaled = u32::from(raw.unsigned_abs().min(100)) * 255 / 100;
    if scaled < u32::from(threshold) {
        CellState::Free
    } else {
        CellState::Occupied
    }
}

// ────────────────────────────────────────────────────────────────────────────
// GridGeometry
// ────────────────────────────────────────────────────────────────────────────

/// Shape and placement of a grid in the robot-relative grid frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    pub width: usize,
    pub height: usize,
    /// Cell edge length (metres).
    pub resolution: f32,
    /// Corner of cell (0, 0) in the grid frame.
    pub origin: Point2,
}

impl GridGeometry {
    /// Row-major index of `(col, row)`.
    #[inline]
    pub fn index(&self, col: usize, row: usize) -> usize {
        row * self.width + col
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Metric centre of cell `(col, row)` in the grid frame.
    pub fn cell_center(&self, col: usize, row: usize) -> Point2 {
        Point2::new(
            self.origin.x + (col as f32 + 0.5) * self.resolution,
            self.origin.y + (row as f32 + 0.5) * self.resolution,
        )
    }

    /// `(col + dc, row + dr)` if it lies inside the grid.
    #[inline]
    pub fn offset(&self, col: usize, row: usize, dc: isize, dr: isize) -> Option<(usize, usize)> {
        let c = col.checked_add_signed(dc)?;
        let r = row.checked_add_signed(dr)?;
        (c < self.width && r < self.height).then_some((c, r))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ThresholdedGrid
// ────────────────────────────────────────────────────────────────────────────

/// A grid whose cells have been classified.  Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdedGrid {
    geometry: GridGeometry,
    cells: Vec<CellState>,
}

impl ThresholdedGrid {
    /// Build from already-classified cells (row-major).
    ///
    /// # Errors
    ///
    /// [`TopoError::MalformedInput`] if `cells.len()` does not match the
    /// geometry.
    pub fn from_cells(geometry: GridGeometry, cells: Vec<CellState>) -> Result<Self, TopoError> {
        if cells.len() != geometry.len() {
            return Err(TopoError::MalformedInput(format!(
                "{} cells for a {}x{} grid",
                cells.len(),
                geometry.width,
                geometry.height
            )));
        }
        Ok(Self { geometry, cells })
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn cells(&self) -> &[CellState] {
        &self.cells
    }

    /// State of `(col, row)`; out-of-range cells read as Unknown.
    pub fn get(&self, col: usize, row: usize) -> CellState {
        if col < self.geometry.width && row < self.geometry.height {
            self.cells[self.geometry.index(col, row)]
        } else {
            CellState::Unknown
        }
    }

    /// Number of Free cells.
    pub fn free_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_free()).count()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// threshold
// ────────────────────────────────────────────────────────────────────────────

/// Binarise `msg` with the configured threshold.
///
/// The grid must have the configured square shape and resolution.  The
/// origin's orientation is ignored: grids are assumed axis-aligned with the
/// grid frame.
///
/// # Errors
///
/// [`TopoError::MalformedInput`] when the shape, data length or resolution
/// do not match the configuration.
pub fn threshold(
    msg: &OccupancyGridMsg,
    config: &ExtractionConfig,
) -> Result<ThresholdedGrid, TopoError> {
    let expected = config.grid_cells();
    let width = msg.info.width as usize;
    let height = msg.info.height as usize;

    if width != expected || height != expected {
        return Err(TopoError::MalformedInput(format!(
            "grid is {width}x{height}, expected {expected}x{expected}"
        )));
    }
    if msg.data.len() != width * height {
        return Err(TopoError::MalformedInput(format!(
            "grid data has {} cells, expected {}",
            msg.data.len(),
            width * height
        )));
    }
    if (msg.info.resolution - config.resolution).abs() > RESOLUTION_TOLERANCE {
        return Err(TopoError::MalformedInput(format!(
            "grid resolution {} differs from configured {}",
            msg.info.resolution, config.resolution
        )));
    }

    let origin = &msg.info.origin.position;
    let geometry = GridGeometry {
        width,
        height,
        resolution: msg.info.resolution,
        origin: Point2::new(origin.x, origin.y),
    };

    let mut cells: Vec<CellState> = msg
        .data
        .iter()
        .map(|&raw| classify_cell(raw, config.occupancy_threshold))
        .collect();

    if config.mask_outside_fov {
        mask_outside_fov(&geometry, &mut cells, config);
    }

    let grid = ThresholdedGrid { geometry, cells };
    debug!(
        width,
        height,
        free = grid.free_count(),
        "Occupancy grid thresholded"
    );
    Ok(grid)
}

/// Force every cell whose centre is beyond the sensing radius, or outside
/// the sensing bearing range, to Unknown.
fn mask_outside_fov(geometry: &GridGeometry, cells: &mut [CellState], config: &ExtractionConfig) {
    let robot = Point2::default();
    for row in 0..geometry.height {
        for col in 0..geometry.width {
            let center = geometry.cell_center(col, row);
            let bearing = center.y.atan2(center.x);
            let outside = center.distance(robot) > config.scan_radius
                || bearing < config.scan_angle_min
                || bearing > config.scan_angle_max;
            if outside {
                cells[geometry.index(col, row)] = CellState::Unknown;
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::occupancy_grid_from_ascii;
    use topo_types::UNKNOWN_CELL;

    /// 2x2 cells at 5 cm.
    fn small_config() -> ExtractionConfig {
        ExtractionConfig {
            scan_radius: 0.05,
            ..ExtractionConfig::default()
        }
    }

    #[test]
    fn classify_cell_boundaries() {
        assert_eq!(classify_cell(UNKNOWN_CELL, 127), CellState::Unknown);
        assert_eq!(classify_cell(-100, 127), CellState::Unknown);
        assert_eq!(classify_cell(0, 127), CellState::Free);
        // 49 → 124, 50 → 127.
        assert_eq!(classify_cell(49, 127), CellState::Free);
        assert_eq!(classify_cell(50, 127), CellState::Occupied);
        assert_eq!(classify_cell(100, 127), CellState::Occupied);
    }

    #[test]
    fn values_above_100_saturate() {
        assert_eq!(classify_cell(i8::MAX, 255), CellState::Occupied);
        assert_eq!(classify_cell(i8::MAX, 254), CellState::Occupied);
        // 99 → 252.
        assert_eq!(classify_cell(99, 255), CellState::Free);
    }

    #[test]
    fn threshold_maps_every_cell() {
        let msg = occupancy_grid_from_ascii(&["#.", "?."], 0.05);
        let grid = threshold(&msg, &small_config()).unwrap();
        assert_eq!(
            grid.cells(),
            &[
                CellState::Occupied,
                CellState::Free,
                CellState::Unknown,
                CellState::Free
            ]
        );
        assert_eq!(grid.free_count(), 2);
    }

    #[test]
    fn threshold_rejects_wrong_shape() {
        let msg = occupancy_grid_from_ascii(&["...", "...", "..."], 0.05);
        let err = threshold(&msg, &small_config()).unwrap_err();
        assert!(matches!(err, TopoError::MalformedInput(_)));
    }

    #[test]
    fn threshold_rejects_short_data() {
        let mut msg = occupancy_grid_from_ascii(&["..", ".."], 0.05);
        msg.data.pop();
        assert!(matches!(
            threshold(&msg, &small_config()),
            Err(TopoError::MalformedInput(_))
        ));
    }

    #[test]
    fn threshold_rejects_resolution_mismatch() {
        let msg = occupancy_grid_from_ascii(&["..", ".."], 0.1);
        assert!(matches!(
            threshold(&msg, &small_config()),
            Err(TopoError::MalformedInput(_))
        ));
    }

    #[test]
    fn cell_center_is_origin_plus_half_cell() {
        let msg = occupancy_grid_from_ascii(&["..", ".."], 0.05);
        let grid = threshold(&msg, &small_config()).unwrap();
        let c = grid.geometry().cell_center(1, 0);
        assert!((c.x - 0.025).abs() < 1e-6);
        assert!((c.y + 0.025).abs() < 1e-6);
    }

    #[test]
    fn offset_stays_inside_grid() {
        let geometry = GridGeometry {
            width: 3,
            height: 2,
            resolution: 1.0,
            origin: Point2::default(),
        };
        assert_eq!(geometry.offset(0, 0, -1, 0), None);
        assert_eq!(geometry.offset(2, 1, 1, 0), None);
        assert_eq!(geometry.offset(1, 0, 1, 1), Some((2, 1)));
    }

    #[test]
    fn fov_mask_hides_cells_behind_robot() {
        // 12x12 grid centred on the robot; sensing sector ±45°.
        let rows: Vec<String> = (0..12).map(|_| ".".repeat(12)).collect();
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
        let msg = occupancy_grid_from_ascii(&rows, 0.05);
        let config = ExtractionConfig {
            scan_radius: 0.3,
            scan_angle_min: -std::f32::consts::FRAC_PI_4,
            scan_angle_max: std::f32::consts::FRAC_PI_4,
            mask_outside_fov: true,
            ..ExtractionConfig::default()
        };
        let grid = threshold(&msg, &config).unwrap();

        // Ahead of the robot (+X, on the axis): still free.
        assert_eq!(grid.get(8, 6), CellState::Free);
        // Behind the robot (−X): masked.
        assert_eq!(grid.get(2, 6), CellState::Unknown);
        // Far corner, beyond the radius: masked.
        assert_eq!(grid.get(11, 11), CellState::Unknown);
    }

    #[test]
    fn fov_mask_is_off_by_default() {
        let rows: Vec<String> = (0..4).map(|_| ".".repeat(4)).collect();
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
        let msg = occupancy_grid_from_ascii(&rows, 0.05);
        let config = ExtractionConfig {
            scan_radius: 0.1,
            ..ExtractionConfig::default()
        };
        let grid = threshold(&msg, &config).unwrap();
        assert_eq!(grid.free_count(), 16);
    }
}
