//! Hand-drawn grid and odometry fixtures.
//!
//! Used by the unit tests of this crate and of the runtime, and by the CLI
//! replay smoke tests.  Grids are drawn as ASCII art, top row first:
//!
//! | Char | Raw value | Meaning  |
//! |------|-----------|----------|
//! | `.`  | `0`       | free     |
//! | `#`  | `100`     | occupied |
//! | `?`  | `-1`      | unknown  |
//!
//! Row 0 of the drawing is row 0 of the grid (`data[0..width]`).

use topo_types::{
    GridInfo, Header, OccupancyGridMsg, OdometryMsg, PoseMsg, PoseWithCovariance, Stamp,
    UNKNOWN_CELL, Vec3,
};

use crate::transform::quaternion_from_yaw;

/// Frame id of every fixture grid.
pub const GRID_FRAME: &str = "base_link";

/// Build an occupancy grid from ASCII rows, centred on the robot.
///
/// Any character other than `.` and `?` reads as occupied.  All rows must
/// have the same length.
pub fn occupancy_grid_from_ascii(rows: &[&str], resolution: f32) -> OccupancyGridMsg {
    let height = rows.len();
    let width = rows.first().map_or(0, |r| r.chars().count());
    let data = rows
        .iter()
        .flat_map(|row| row.chars())
        .map(|ch| match ch {
            '.' => 0,
            '?' => UNKNOWN_CELL,
            _ => 100,
        })
        .collect();

    OccupancyGridMsg {
        header: Header::new(Stamp::default(), GRID_FRAME),
        info: GridInfo {
            resolution,
            width: width as u32,
            height: height as u32,
            origin: PoseMsg {
                position: Vec3::new(
                    -(width as f32) * resolution / 2.0,
                    -(height as f32) * resolution / 2.0,
                    0.0,
                ),
                ..PoseMsg::default()
            },
        },
        data,
    }
}

/// Build an `n`×`n` grid where `free(col, row)` decides each cell.
pub fn occupancy_grid_from_fn(
    n: usize,
    resolution: f32,
    free: impl Fn(usize, usize) -> bool,
) -> OccupancyGridMsg {
    let rows: Vec<String> = (0..n)
        .map(|row| {
            (0..n)
                .map(|col| if free(col, row) { '.' } else { '#' })
                .collect()
        })
        .collect();
    let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
    occupancy_grid_from_ascii(&rows, resolution)
}

/// 12×12 grid (5 cm cells) with a 4-cell wide east–west corridor.
pub fn corridor_grid() -> OccupancyGridMsg {
    occupancy_grid_from_fn(12, 0.05, |col, row| (4..=7).contains(&row) && (1..=10).contains(&col))
}

/// 15×15 grid (5 cm cells) with a 3-cell wide T: a bar across the top and
/// a stem running down the middle.
pub fn t_junction_grid() -> OccupancyGridMsg {
    occupancy_grid_from_fn(15, 0.05, |col, row| {
        ((1..=3).contains(&row) && (1..=13).contains(&col))
            || ((4..=12).contains(&row) && (6..=8).contains(&col))
    })
}

/// An odometry reading at `(x, y)` with heading `yaw`, in `odom`.
pub fn odometry(x: f32, y: f32, yaw: f32) -> OdometryMsg {
    OdometryMsg {
        header: Header::new(Stamp::default(), "odom"),
        child_frame_id: GRID_FRAME.to_string(),
        pose: PoseWithCovariance {
            pose: PoseMsg {
                position: Vec3::new(x, y, 0.0),
                orientation: quaternion_from_yaw(yaw),
            },
        },
    }
}
