//! `topo-types` – shared message, marker and error definitions.
//!
//! The inbound messages mirror the JSON shape of the ROS `nav_msgs`
//! messages the extractor consumes (`OccupancyGrid`, `Odometry`), and the
//! outbound [`Marker`] mirrors `visualization_msgs/Marker`, so that frames
//! relayed through a rosbridge endpoint deserialise without translation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Headers
// ────────────────────────────────────────────────────────────────────────────

/// A ROS-style timestamp (`builtin_interfaces/Time`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Stamp {
    pub sec: i32,
    #[serde(default)]
    pub nanosec: u32,
}

impl Stamp {
    pub fn new(sec: i32, nanosec: u32) -> Self {
        Self { sec, nanosec }
    }
}

impl std::fmt::Display for Stamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nanosec)
    }
}

/// Message header: acquisition time and the frame the payload is expressed in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub stamp: Stamp,
    #[serde(default)]
    pub frame_id: String,
}

impl Header {
    pub fn new(stamp: Stamp, frame_id: impl Into<String>) -> Self {
        Self {
            stamp,
            frame_id: frame_id.into(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Geometry payloads
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D vector / point (`geometry_msgs/Point`, `geometry_msgs/Vector3`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// An orientation quaternion (`geometry_msgs/Quaternion`).
///
/// The default value is the identity rotation, matching an omitted
/// orientation in a ROS message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub z: f32,
    #[serde(default = "one")]
    pub w: f32,
}

fn one() -> f32 {
    1.0
}

impl Quaternion {
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

/// Position plus orientation (`geometry_msgs/Pose`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseMsg {
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub orientation: Quaternion,
}

// ────────────────────────────────────────────────────────────────────────────
// Inbound messages
// ────────────────────────────────────────────────────────────────────────────

/// Raw cell value that marks a cell as never observed.
pub const UNKNOWN_CELL: i8 = -1;

/// Grid metadata (`nav_msgs/MapMetaData`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridInfo {
    /// Cell edge length in metres.
    pub resolution: f32,
    /// Number of columns.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
    /// Pose of the corner of cell (0, 0) in the robot-relative grid frame.
    #[serde(default)]
    pub origin: PoseMsg,
}

/// A robot-centred occupancy grid (`nav_msgs/OccupancyGrid`).
///
/// `data` is row-major (`data[row * width + col]`).  Values `0..=100` are
/// occupancy probabilities in percent; any negative value is
/// [`UNKNOWN_CELL`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OccupancyGridMsg {
    #[serde(default)]
    pub header: Header,
    pub info: GridInfo,
    pub data: Vec<i8>,
}

/// Pose part of an odometry message (`geometry_msgs/PoseWithCovariance`
/// without the covariance, which the extractor never reads).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseWithCovariance {
    #[serde(default)]
    pub pose: PoseMsg,
}

/// Robot odometry (`nav_msgs/Odometry`, pose part only).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OdometryMsg {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub child_frame_id: String,
    pub pose: PoseWithCovariance,
}

// ────────────────────────────────────────────────────────────────────────────
// Outbound markers
// ────────────────────────────────────────────────────────────────────────────

/// An RGBA colour with components in `[0, 1]` (`std_msgs/ColorRGBA`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorRgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ColorRgba {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Same colour with a different alpha.
    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }
}

/// Marker primitive type.  Serialised as the integer constants used by
/// `visualization_msgs/Marker`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum MarkerKind {
    LineList,
    Points,
}

impl From<MarkerKind> for i32 {
    fn from(kind: MarkerKind) -> Self {
        match kind {
            MarkerKind::LineList => 5,
            MarkerKind::Points => 8,
        }
    }
}

impl TryFrom<i32> for MarkerKind {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(MarkerKind::LineList),
            8 => Ok(MarkerKind::Points),
            other => Err(format!("unsupported marker type {other}")),
        }
    }
}

/// A renderable primitive (`visualization_msgs/Marker`, ADD action).
///
/// `colors` is parallel to `points`: one colour per point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub header: Header,
    pub ns: String,
    pub id: i32,
    #[serde(rename = "type")]
    pub kind: MarkerKind,
    pub scale: Vec3,
    pub points: Vec<Vec3>,
    pub colors: Vec<ColorRgba>,
}

impl Marker {
    /// An empty marker of the given kind.
    pub fn new(header: Header, ns: impl Into<String>, kind: MarkerKind, scale: Vec3) -> Self {
        Self {
            header,
            ns: ns.into(),
            id: 0,
            kind,
            scale,
            points: Vec::new(),
            colors: Vec::new(),
        }
    }

    /// Append one point with its colour.
    pub fn push(&mut self, point: Vec3, color: ColorRgba) {
        self.points.push(point);
        self.colors.push(color);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Events
// ────────────────────────────────────────────────────────────────────────────

/// Envelope routed over the internal event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"topo-middleware::rosbridge/odom"`
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` in a fresh envelope stamped with the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Everything that travels over the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// A local occupancy grid from the rasteriser.
    OccupancyGrid(OccupancyGridMsg),
    /// A robot odometry reading.
    Odometry(OdometryMsg),
    /// A rendered marker (nodes, edges or history).
    Marker(Marker),
    /// A grid update that produced no graph and was dropped.
    FrameSkipped { stamp: Stamp, reason: String },
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Workspace-wide error type.
///
/// `EmptyGraph`, `UnknownPose` and `MalformedInput` are scoped to a single
/// frame or operation; the remaining variants come from the transport and
/// configuration layers.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TopoError {
    #[error("Graph generation failed: skeleton yields no nodes")]
    EmptyGraph,

    #[error("Robot pose unknown")]
    UnknownPose,

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupancy_grid_parses_rosbridge_json() {
        let raw = r#"{
            "header": {"stamp": {"sec": 12, "nanosec": 5}, "frame_id": "base_link"},
            "info": {
                "resolution": 0.05, "width": 2, "height": 2,
                "origin": {"position": {"x": -0.05, "y": -0.05, "z": 0.0},
                           "orientation": {"x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0}}
            },
            "data": [0, 100, -1, 20]
        }"#;
        let grid: OccupancyGridMsg = serde_json::from_str(raw).unwrap();
        assert_eq!(grid.header.stamp, Stamp::new(12, 5));
        assert_eq!(grid.info.width, 2);
        assert_eq!(grid.data, vec![0, 100, UNKNOWN_CELL, 20]);
        assert!((grid.info.origin.position.x + 0.05).abs() < 1e-6);
    }

    #[test]
    fn omitted_orientation_defaults_to_identity() {
        let raw = r#"{"pose": {"pose": {"position": {"x": 1.0, "y": 2.0}}}}"#;
        let odom: OdometryMsg = serde_json::from_str(raw).unwrap();
        assert_eq!(odom.pose.pose.orientation, Quaternion::identity());
        assert!((odom.pose.pose.position.y - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn marker_kind_serialises_as_ros_constant() {
        let marker = Marker::new(
            Header::new(Stamp::default(), "odom"),
            "node",
            MarkerKind::Points,
            Vec3::new(0.1, 0.1, 0.0),
        );
        let json = serde_json::to_value(&marker).unwrap();
        assert_eq!(json["type"], 8);

        let back: Marker = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind, MarkerKind::Points);
    }

    #[test]
    fn unknown_marker_kind_is_rejected() {
        assert!(MarkerKind::try_from(2).is_err());
        assert_eq!(MarkerKind::try_from(5), Ok(MarkerKind::LineList));
    }

    #[test]
    fn marker_push_keeps_colors_parallel() {
        let mut marker = Marker::new(Header::default(), "edge", MarkerKind::LineList, Vec3::default());
        marker.push(Vec3::new(1.0, 0.0, 0.0), ColorRgba::new(1.0, 1.0, 1.0, 0.5));
        marker.push(Vec3::new(2.0, 0.0, 0.0), ColorRgba::new(1.0, 1.0, 1.0, 0.5));
        assert_eq!(marker.points.len(), marker.colors.len());
    }

    #[test]
    fn event_roundtrip() {
        let event = Event::new(
            "topo-middleware::rosbridge/odom",
            EventPayload::FrameSkipped {
                stamp: Stamp::new(3, 0),
                reason: TopoError::EmptyGraph.to_string(),
            },
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        assert_eq!(event.source, back.source);
    }

    #[test]
    fn stamp_display_pads_nanoseconds() {
        assert_eq!(Stamp::new(7, 42).to_string(), "7.000000042");
    }

    #[test]
    fn topo_error_display() {
        let err = TopoError::MalformedInput("width 10 != 200".to_string());
        assert!(err.to_string().contains("width 10"));
        assert_eq!(TopoError::UnknownPose.to_string(), "Robot pose unknown");
    }
}
