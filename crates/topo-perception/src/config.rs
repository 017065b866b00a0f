//! Extraction parameters, fixed at startup.

use serde::{Deserialize, Serialize};
use topo_types::TopoError;

/// Parameters of the sensing window and of the occupancy thresholding.
///
/// The grid shape is not configured directly: it is derived from
/// `scan_radius` and `resolution` (see [`ExtractionConfig::grid_cells`]) and
/// every incoming grid must match it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Bearing of the first sensed direction, robot frame (radians).
    pub scan_angle_min: f32,
    /// Bearing of the last sensed direction, robot frame (radians).
    pub scan_angle_max: f32,
    /// Maximum sensing range (metres).  The grid spans `2 * scan_radius`.
    pub scan_radius: f32,
    /// Cell edge length (metres).
    pub resolution: f32,
    /// Free/occupied cut-off on the 0–255 image scale.
    pub occupancy_threshold: u8,
    /// Force cells outside the sensing sector to Unknown before thinning.
    pub mask_outside_fov: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            scan_angle_min: -2.35,
            scan_angle_max: 2.35,
            scan_radius: 5.0,
            resolution: 0.05,
            occupancy_threshold: 127,
            mask_outside_fov: false,
        }
    }
}

impl ExtractionConfig {
    /// Number of cells along each side of the (square) grid.
    pub fn grid_cells(&self) -> usize {
        ((2.0 * self.scan_radius) / self.resolution).round() as usize
    }

    /// Reject parameter combinations that cannot describe a grid.
    pub fn validate(&self) -> Result<(), TopoError> {
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(TopoError::Config(format!(
                "resolution must be positive, got {}",
                self.resolution
            )));
        }
        if !(self.scan_radius.is_finite() && self.scan_radius > 0.0) {
            return Err(TopoError::Config(format!(
                "scan_radius must be positive, got {}",
                self.scan_radius
            )));
        }
        if self.scan_angle_min >= self.scan_angle_max {
            return Err(TopoError::Config(format!(
                "scan_angle_min {} must be below scan_angle_max {}",
                self.scan_angle_min, self.scan_angle_max
            )));
        }
        if self.grid_cells() == 0 {
            return Err(TopoError::Config(
                "scan_radius is smaller than half a cell".to_string(),
            ));
        }
        Ok(())
    }
}
