//! Graph and history → marker primitives.
//!
//! [`GraphPresenter::present`] renders one graph into a POINTS marker (one
//! point per node, coloured by [`NodeKind`]) and a LINE_LIST marker (two
//! points per edge).  Highlighting is a separate step on the rendered
//! [`TopologyMarkers`]: it only ever touches colour alpha, never the graph.
//!
//! | Element | Colour (RGBA) |
//! |---|---|
//! | Passage node, edge | (0.53, 0.9, 0.5, 0.2) |
//! | Intersection node | (1.0, 0.73, 0.0, 0.2) |
//! | Leaf node | (0.95, 0.37, 0.37, 0.2) |
//! | History point | (1.0, 1.0, 1.0, 0.5) |

use topo_perception::graph::{Edge, Graph, NodeKind};
use topo_perception::history::HistoryTracker;
use topo_perception::transform::{Point2, Pose};
use topo_types::{ColorRgba, Header, Marker, MarkerKind, Stamp, Vec3};

pub const NODE_COLOR: ColorRgba = ColorRgba::new(0.53, 0.9, 0.5, 0.2);
pub const EDGE_COLOR: ColorRgba = ColorRgba::new(0.53, 0.9, 0.5, 0.2);
pub const INTERSECTION_COLOR: ColorRgba = ColorRgba::new(1.0, 0.73, 0.0, 0.2);
pub const LEAF_COLOR: ColorRgba = ColorRgba::new(0.95, 0.37, 0.37, 0.2);
pub const HISTORY_COLOR: ColorRgba = ColorRgba::new(1.0, 1.0, 1.0, 0.5);

const NODE_SCALE: f32 = 0.1;
const EDGE_SCALE: f32 = 0.03;
const NODE_Z: f32 = 0.1;
const HISTORY_Z: f32 = 1.0;

/// Frame id of the robot-relative grid frame.
pub const GRID_FRAME_ID: &str = "base_link";
/// Frame id of the fixed world frame.
pub const WORLD_FRAME_ID: &str = "odom";

// ────────────────────────────────────────────────────────────────────────────
// MarkerFrame
// ────────────────────────────────────────────────────────────────────────────

/// The frame markers are emitted in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkerFrame {
    /// Positions as computed, in the grid frame.
    Grid,
    /// Positions mapped into the world frame with the given pose.
    World(Pose),
}

impl MarkerFrame {
    /// World frame when a pose is known, grid frame otherwise.
    pub fn for_pose(pose: Option<Pose>) -> Self {
        pose.map_or(MarkerFrame::Grid, MarkerFrame::World)
    }

    pub fn frame_id(&self) -> &'static str {
        match self {
            MarkerFrame::Grid => GRID_FRAME_ID,
            MarkerFrame::World(_) => WORLD_FRAME_ID,
        }
    }

    fn place(&self, p: Point2) -> Point2 {
        match self {
            MarkerFrame::Grid => p,
            MarkerFrame::World(pose) => pose.transform_point(p),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TopologyMarkers
// ────────────────────────────────────────────────────────────────────────────

/// Rendered graph: node points, edge lines and the edge list behind them.
#[derive(Debug, Clone, PartialEq)]
pub struct TopologyMarkers {
    pub nodes: Marker,
    pub edges: Marker,
    /// `edge_order[i]` drew points `2i` and `2i + 1` of `edges`.
    edge_order: Vec<Edge>,
}

impl TopologyMarkers {
    /// Set the alpha of node `index`.  Out-of-range indices are ignored.
    pub fn highlight_node(&mut self, index: usize, alpha: f32) {
        if let Some(color) = self.nodes.colors.get_mut(index) {
            color.a = alpha;
        }
    }

    /// Set the alpha of every drawn edge equal to `edge`, in either
    /// direction.
    pub fn highlight_edge(&mut self, edge: &Edge, alpha: f32) {
        for (i, drawn) in self.edge_order.iter().enumerate() {
            if drawn == edge {
                for color in &mut self.edges.colors[2 * i..2 * i + 2] {
                    color.a = alpha;
                }
            }
        }
    }

    /// Highlight the root node of `graph` and every edge touching it.
    pub fn highlight_root(&mut self, graph: &Graph, alpha: f32) {
        let Some(root) = graph.root else {
            return;
        };
        self.highlight_node(root, alpha);
        for edge in graph.incident_edges(root) {
            self.highlight_edge(edge, alpha);
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// GraphPresenter
// ────────────────────────────────────────────────────────────────────────────

/// Stateless marker renderer.
#[derive(Debug, Clone)]
pub struct GraphPresenter {
    /// Number of newest history points kept in the history marker.
    pub history_max_points: usize,
}

impl Default for GraphPresenter {
    fn default() -> Self {
        Self {
            history_max_points: 500,
        }
    }
}

impl GraphPresenter {
    pub fn new(history_max_points: usize) -> Self {
        Self { history_max_points }
    }

    /// Render `graph` in `frame`, stamped with `stamp`.
    pub fn present(&self, graph: &Graph, frame: MarkerFrame, stamp: Stamp) -> TopologyMarkers {
        let header = Header::new(stamp, frame.frame_id());

        let mut nodes = Marker::new(
            header.clone(),
            "node",
            MarkerKind::Points,
            Vec3::new(NODE_SCALE, NODE_SCALE, 0.0),
        );
        for node in &graph.nodes {
            let color = match node.kind {
                NodeKind::Leaf => LEAF_COLOR,
                NodeKind::Intersection => INTERSECTION_COLOR,
                NodeKind::Passage => NODE_COLOR,
            };
            nodes.push(frame.place(node.position).with_z(NODE_Z), color);
        }

        let mut edges = Marker::new(
            header,
            "edge",
            MarkerKind::LineList,
            Vec3::new(EDGE_SCALE, 0.0, 0.0),
        );
        let mut edge_order = Vec::with_capacity(graph.edges.len());
        for edge in &graph.edges {
            let (Some(&a), Some(&b)) = (nodes.points.get(edge.a), nodes.points.get(edge.b)) else {
                continue;
            };
            edges.push(a, EDGE_COLOR);
            edges.push(b, EDGE_COLOR);
            edge_order.push(*edge);
        }

        TopologyMarkers {
            nodes,
            edges,
            edge_order,
        }
    }

    /// Render the newest `history_max_points` entries of `history` as a
    /// POINTS marker in the world frame.
    pub fn present_history(&self, history: &HistoryTracker, stamp: Stamp) -> Marker {
        let mut marker = Marker::new(
            Header::new(stamp, WORLD_FRAME_ID),
            "intersection",
            MarkerKind::Points,
            Vec3::new(NODE_SCALE, NODE_SCALE, 0.0),
        );
        let points = history.points();
        let skip = points.len().saturating_sub(self.history_max_points);
        for p in &points[skip..] {
            marker.push(p.with_z(HISTORY_Z), HISTORY_COLOR);
        }
        marker
    }
}
