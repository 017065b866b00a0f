//! Navigation target selection.
//!
//! The current policy prefers branching points: among the Intersection
//! nodes (or every node, if the graph has none) pick the one nearest the
//! robot in the world frame.  Without a pose the lowest index wins.

use crate::graph::{Graph, Node, NodeKind};
use crate::transform::Pose;

/// Pick the root node of `graph`.
///
/// Returns `None` only for a graph without nodes.  Distance ties go to the
/// lower index, so the result is a pure function of the inputs.
pub fn select_root(graph: &Graph, pose: Option<&Pose>) -> Option<usize> {
    let intersections: Vec<&Node> = graph.nodes_of_kind(NodeKind::Intersection).collect();
    let candidates: Vec<&Node> = if intersections.is_empty() {
        graph.nodes.iter().collect()
    } else {
        intersections
    };

    match pose {
        None => candidates.iter().map(|n| n.index).min(),
        Some(pose) => {
            let robot = pose.position();
            candidates
                .iter()
                .map(|n| (pose.transform_point(n.position).distance(robot), n.index))
                .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
                .map(|(_, index)| index)
        }
    }
}
