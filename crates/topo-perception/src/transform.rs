//! Planar frame transforms.
//!
//! The extractor works in two frames: the robot-relative **grid frame**
//! (`base_link`), in which every grid update is expressed, and the fixed
//! **world frame** (`odom`), in which the robot pose and the target history
//! live.  A [`Pose`] is the rigid transform from the former to the latter:
//! to map a grid-frame point into the world, rotate it by the pose heading,
//! then add the pose position.
//!
//! # Example
//!
//! ```rust
//! use topo_perception::transform::{Point2, Pose};
//!
//! // Robot at (1, 2), facing +Y.
//! let pose = Pose::new(1.0, 2.0, std::f32::consts::FRAC_PI_2);
//!
//! // One metre ahead of the robot is (1, 3) in the world.
//! let world = pose.transform_point(Point2::new(1.0, 0.0));
//! assert!((world.x - 1.0).abs() < 1e-5);
//! assert!((world.y - 3.0).abs() < 1e-5);
//! ```

use serde::{Deserialize, Serialize};
use topo_types::{OdometryMsg, Quaternion, TopoError, Vec3};

// ────────────────────────────────────────────────────────────────────────────
// Point2
// ────────────────────────────────────────────────────────────────────────────

/// A point in the plane (metres).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: Self) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Lift into 3-D at height `z` (for marker points).
    pub fn with_z(self, z: f32) -> Vec3 {
        Vec3::new(self.x, self.y, z)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pose
// ────────────────────────────────────────────────────────────────────────────

/// Planar robot pose in the world frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    /// Heading, counter-clockwise from world +X (radians).
    pub heading: f32,
}

impl Pose {
    pub fn new(x: f32, y: f32, heading: f32) -> Self {
        Self { x, y, heading }
    }

    /// The identity pose: grid frame and world frame coincide.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Extract the planar pose from an odometry reading.
    ///
    /// Only the position's x/y and the yaw of the orientation are used.
    pub fn from_odometry(msg: &OdometryMsg) -> Self {
        let p = &msg.pose.pose;
        Self::new(p.position.x, p.position.y, yaw_from_quaternion(&p.orientation))
    }

    /// Position part of the pose.
    pub fn position(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }

    /// Map a grid-frame point into the world frame: rotate by `heading`,
    /// then translate by `(x, y)`.
    pub fn transform_point(&self, p: Point2) -> Point2 {
        let (sin, cos) = self.heading.sin_cos();
        Point2::new(
            p.x * cos - p.y * sin + self.x,
            p.x * sin + p.y * cos + self.y,
        )
    }

    /// The inverse transform (world frame → grid frame).
    pub fn inverse(&self) -> Self {
        let (sin, cos) = self.heading.sin_cos();
        Self::new(
            -(self.x * cos + self.y * sin),
            self.x * sin - self.y * cos,
            -self.heading,
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Free functions
// ────────────────────────────────────────────────────────────────────────────

/// Map a grid-frame point into the world frame with the pose, if one is
/// known.
///
/// # Errors
///
/// [`TopoError::UnknownPose`] when `pose` is `None`.
pub fn to_world(point: Point2, pose: Option<&Pose>) -> Result<Point2, TopoError> {
    pose.map(|p| p.transform_point(point))
        .ok_or(TopoError::UnknownPose)
}

/// Yaw (rotation about Z) of a unit quaternion:
/// `atan2(2(wz + xy), 1 − 2(y² + z²))`.
pub fn yaw_from_quaternion(q: &Quaternion) -> f32 {
    let t3 = 2.0 * (q.w * q.z + q.x * q.y);
    let t4 = 1.0 - 2.0 * (q.y * q.y + q.z * q.z);
    t3.atan2(t4)
}

/// Unit quaternion for a pure rotation of `yaw` radians about Z.
pub fn quaternion_from_yaw(yaw: f32) -> Quaternion {
    let (sin, cos) = (yaw * 0.5).sin_cos();
    Quaternion::new(0.0, 0.0, sin, cos)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
