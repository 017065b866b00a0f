//! Skeleton → topology graph.
//!
//! # Algorithm
//!
//! 1. Every skeleton cell whose 8-neighbour count is not 2 (tips, junction
//!    pixels, isolated cells) is a node candidate.
//! 2. 8-adjacent candidates are merged into one cluster, so that the two or
//!    three junction pixels a thinned crossing usually produces become a
//!    single node.  Clusters are numbered in row-major order of their first
//!    cell; the node sits on the cluster cell nearest the cluster centroid.
//! 3. From every cluster, each run of count-2 cells is walked until it hits
//!    a cluster again; the run becomes one [`Edge`].  Self loops with fewer
//!    than three cells are part of the junction and are dropped.
//! 4. Closed rings of count-2 cells that no cluster touches get an anchor
//!    node on their first cell and a loop edge.
//! 5. Degrees and [`NodeKind`]s are computed from the edges ([`classify`]).

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use topo_types::TopoError;
use tracing::{debug, warn};

use crate::skeleton::SkeletonMask;
use crate::threshold::GridGeometry;
use crate::transform::Point2;

/// 8-neighbourhood in row-major order, as `(dcol, drow)`.
const NEIGHBORS_8: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Loops shorter than this are junction noise.
const MIN_LOOP_CELLS: usize = 3;

// ────────────────────────────────────────────────────────────────────────────
// NodeKind
// ────────────────────────────────────────────────────────────────────────────

/// Connectivity class of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Dead end (degree 0 or 1).
    Leaf,
    /// Pass-through (degree 2).
    Passage,
    /// Branching point (degree ≥ 3).
    Intersection,
}

impl NodeKind {
    pub fn from_degree(degree: usize) -> Self {
        match degree {
            0 | 1 => NodeKind::Leaf,
            2 => NodeKind::Passage,
            _ => NodeKind::Intersection,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Node / Edge
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Position in [`Graph::nodes`].
    pub index: usize,
    /// Grid cell as `(col, row)`.
    pub cell: (usize, usize),
    /// Cell centre in the grid frame (metres).
    pub position: Point2,
    pub degree: usize,
    pub kind: NodeKind,
}

/// One skeleton path between two nodes.
///
/// Edges are unordered: `Edge::new(a, b, _) == Edge::new(b, a, _)` and both
/// hash the same.  The path length does not take part in equality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Edge {
    pub a: usize,
    pub b: usize,
    /// Number of skeleton cells strictly between the two nodes.
    pub length: usize,
}

impl Edge {
    pub fn new(a: usize, b: usize, length: usize) -> Self {
        Self { a, b, length }
    }

    /// Endpoints with the smaller index first.
    pub fn key(&self) -> (usize, usize) {
        (self.a.min(self.b), self.a.max(self.b))
    }

    pub fn touches(&self, node: usize) -> bool {
        self.a == node || self.b == node
    }

    pub fn is_loop(&self) -> bool {
        self.a == self.b
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Edge {}

impl Hash for Edge {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Graph
// ────────────────────────────────────────────────────────────────────────────

/// Topology of one grid update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Selected navigation target, an index into `nodes`.
    pub root: Option<usize>,
}

impl Graph {
    /// Number of edge endpoints at `node`; a loop counts twice.
    pub fn degree_of(&self, node: usize) -> usize {
        self.edges
            .iter()
            .map(|e| usize::from(e.a == node) + usize::from(e.b == node))
            .sum()
    }

    /// Edges with `node` as an endpoint.
    pub fn incident_edges(&self, node: usize) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.touches(node))
    }

    pub fn root_node(&self) -> Option<&Node> {
        self.root.and_then(|i| self.nodes.get(i))
    }

    /// Nodes of the given kind.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }
}

/// Recompute every node's degree from the edges and set its kind.
pub fn classify(graph: &mut Graph) {
    let mut degrees = vec![0usize; graph.nodes.len()];
    for edge in &graph.edges {
        degrees[edge.a] += 1;
        degrees[edge.b] += 1;
    }
    for (node, degree) in graph.nodes.iter_mut().zip(degrees) {
        node.degree = degree;
        node.kind = NodeKind::from_degree(degree);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// build_graph
// ────────────────────────────────────────────────────────────────────────────

/// Walk `mask` and build the node/edge graph, positions in `geometry`.
///
/// The result is classified and has no root.
///
/// # Errors
///
/// - [`TopoError::MalformedInput`] if `mask` and `geometry` differ in shape.
/// - [`TopoError::EmptyGraph`] if the skeleton yields no node.
pub fn build_graph(mask: &SkeletonMask, geometry: &GridGeometry) -> Result<Graph, TopoError> {
    if mask.width() != geometry.width || mask.height() != geometry.height {
        return Err(TopoError::MalformedInput(format!(
            "skeleton is {}x{}, geometry is {}x{}",
            mask.width(),
            mask.height(),
            geometry.width,
            geometry.height
        )));
    }

    let mut walker = Walker::new(mask, geometry);
    walker.find_clusters();
    let mut edges = walker.trace_branches();
    edges.extend(walker.trace_rings());

    let nodes = walker
        .clusters
        .iter()
        .enumerate()
        .map(|(index, cells)| {
            let cell = representative(cells);
            Node {
                index,
                cell,
                position: geometry.cell_center(cell.0, cell.1),
                degree: 0,
                kind: NodeKind::Leaf,
            }
        })
        .collect::<Vec<_>>();

    if nodes.is_empty() {
        return Err(TopoError::EmptyGraph);
    }

    let mut graph = Graph {
        nodes,
        edges,
        root: None,
    };
    classify(&mut graph);

    debug!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        intersections = graph.nodes_of_kind(NodeKind::Intersection).count(),
        "Topology graph built"
    );
    Ok(graph)
}

/// Cluster cell nearest the centroid; the first in row-major order wins
/// ties.  `cells` is sorted row-major and never empty.
fn representative(cells: &[(usize, usize)]) -> (usize, usize) {
    let n = cells.len() as f32;
    let mean_c = cells.iter().map(|c| c.0 as f32).sum::<f32>() / n;
    let mean_r = cells.iter().map(|c| c.1 as f32).sum::<f32>() / n;
    let dist = |&(c, r): &(usize, usize)| {
        let dc = c as f32 - mean_c;
        let dr = r as f32 - mean_r;
        dc * dc + dr * dr
    };
    cells
        .iter()
        .copied()
        .min_by(|a, b| dist(a).total_cmp(&dist(b)))
        .unwrap_or_default()
}

/// Bookkeeping for one graph build.
struct Walker<'a> {
    mask: &'a SkeletonMask,
    geometry: &'a GridGeometry,
    /// 8-neighbour count per cell (0 off the skeleton).
    counts: Vec<u8>,
    /// Cluster id per cell.
    cluster_of: Vec<Option<usize>>,
    /// Path cells already assigned to an edge.
    visited: Vec<bool>,
    /// Cells of each cluster, row-major.
    clusters: Vec<Vec<(usize, usize)>>,
    /// Upper bound on a single walk.
    max_steps: usize,
}

impl<'a> Walker<'a> {
    fn new(mask: &'a SkeletonMask, geometry: &'a GridGeometry) -> Self {
        let len = geometry.len();
        let mut counts = vec![0u8; len];
        for (col, row) in mask.iter_cells() {
            counts[geometry.index(col, row)] = mask.neighbor_count(col, row) as u8;
        }
        Self {
            mask,
            geometry,
            counts,
            cluster_of: vec![None; len],
            visited: vec![false; len],
            clusters: Vec::new(),
            max_steps: len,
        }
    }

    /// Skeleton 8-neighbours of `(col, row)` in row-major order.
    fn neighbors(&self, col: usize, row: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        NEIGHBORS_8.iter().filter_map(move |&(dc, dr)| {
            self.geometry
                .offset(col, row, dc, dr)
                .filter(|&(c, r)| self.mask.get(c, r))
        })
    }

    fn is_candidate(&self, col: usize, row: usize) -> bool {
        self.mask.get(col, row) && self.counts[self.geometry.index(col, row)] != 2
    }

    /// Flood-fill 8-adjacent node candidates into clusters.
    fn find_clusters(&mut self) {
        for row in 0..self.geometry.height {
            for col in 0..self.geometry.width {
                let idx = self.geometry.index(col, row);
                if !self.is_candidate(col, row) || self.cluster_of[idx].is_some() {
                    continue;
                }
                let id = self.clusters.len();
                self.cluster_of[idx] = Some(id);
                let mut cells = Vec::new();
                let mut stack = vec![(col, row)];
                while let Some((c, r)) = stack.pop() {
                    cells.push((c, r));
                    let next: Vec<_> = self
                        .neighbors(c, r)
                        .filter(|&(nc, nr)| {
                            self.is_candidate(nc, nr)
                                && self.cluster_of[self.geometry.index(nc, nr)].is_none()
                        })
                        .collect();
                    for (nc, nr) in next {
                        self.cluster_of[self.geometry.index(nc, nr)] = Some(id);
                        stack.push((nc, nr));
                    }
                }
                cells.sort_by_key(|&(c, r)| (r, c));
                self.clusters.push(cells);
            }
        }
    }

    /// Walk every branch leaving a cluster.
    fn trace_branches(&mut self) -> Vec<Edge> {
        let mut edges = Vec::new();
        for id in 0..self.clusters.len() {
            for i in 0..self.clusters[id].len() {
                let start = self.clusters[id][i];
                let exits: Vec<_> = self.neighbors(start.0, start.1).collect();
                for next in exits {
                    let idx = self.geometry.index(next.0, next.1);
                    if self.cluster_of[idx].is_some() || self.visited[idx] {
                        continue;
                    }
                    let Some((end, length)) = self.walk(start, next) else {
                        continue;
                    };
                    if end == id && length < MIN_LOOP_CELLS {
                        continue;
                    }
                    edges.push(Edge::new(id, end, length));
                }
            }
        }
        edges
    }

    /// Anchor and trace rings that no cluster touches.
    fn trace_rings(&mut self) -> Vec<Edge> {
        let mut edges = Vec::new();
        for row in 0..self.geometry.height {
            for col in 0..self.geometry.width {
                let idx = self.geometry.index(col, row);
                if !self.mask.get(col, row) || self.cluster_of[idx].is_some() || self.visited[idx]
                {
                    continue;
                }
                let id = self.clusters.len();
                self.cluster_of[idx] = Some(id);
                self.clusters.push(vec![(col, row)]);

                let Some(next) = self.neighbors(col, row).next() else {
                    continue;
                };
                if let Some((end, length)) = self.walk((col, row), next) {
                    edges.push(Edge::new(id, end, length));
                }
            }
        }
        edges
    }

    /// Follow count-2 cells from `prev → cur` until a cluster is reached.
    ///
    /// Returns the cluster id and the number of path cells, or `None` if the
    /// path dead-ends or exceeds `max_steps`.
    fn walk(&mut self, mut prev: (usize, usize), mut cur: (usize, usize)) -> Option<(usize, usize)> {
        let mut length = 0usize;
        loop {
            let idx = self.geometry.index(cur.0, cur.1);
            if let Some(id) = self.cluster_of[idx] {
                return Some((id, length));
            }
            self.visited[idx] = true;
            length += 1;
            if length > self.max_steps {
                warn!(
                    col = cur.0,
                    row = cur.1,
                    max_steps = self.max_steps,
                    "Skeleton walk exceeded step limit"
                );
                return None;
            }
            let next = self.neighbors(cur.0, cur.1).find(|&p| p != prev)?;
            prev = cur;
            cur = next;
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use crate::config::ExtractionConfig;
    use crate::fixtures::{corridor_grid, occupancy_grid_from_ascii, occupancy_grid_from_fn, t_junction_grid};
    use crate::skeleton::skeletonize;
    use crate::threshold::threshold;
    use topo_types::OccupancyGridMsg;

    fn graph_of(msg: &OccupancyGridMsg) -> Result<Graph, TopoError> {
        let config = ExtractionConfig {
            scan_radius: msg.info.width as f32 * 0.05 / 2.0,
            ..ExtractionConfig::default()
        };
        let grid = threshold(msg, &config)?;
        let mask = skeletonize(&grid);
        build_graph(&mask, grid.geometry())
    }

    fn cells(graph: &Graph) -> Vec<(usize, usize)> {
        graph.nodes.iter().map(|n| n.cell).collect()
    }

    fn assert_classification_consistent(graph: &Graph) {
        for node in &graph.nodes {
            assert_eq!(node.degree, graph.degree_of(node.index));
            assert_eq!(node.kind, NodeKind::from_degree(node.degree));
        }
    }

    // ── NodeKind ────────────────────────────────────────────────────────────

    #[test]
    fn kind_from_degree() {
        assert_eq!(NodeKind::from_degree(0), NodeKind::Leaf);
        assert_eq!(NodeKind::from_degree(1), NodeKind::Leaf);
        assert_eq!(NodeKind::from_degree(2), NodeKind::Passage);
        assert_eq!(NodeKind::from_degree(3), NodeKind::Intersection);
        assert_eq!(NodeKind::from_degree(usize::MAX), NodeKind::Intersection);
    }

    // ── Edge ────────────────────────────────────────────────────────────────

    #[test]
    fn edge_equality_is_unordered() {
        assert_eq!(Edge::new(1, 4, 3), Edge::new(4, 1, 3));
        assert_eq!(Edge::new(1, 4, 3), Edge::new(1, 4, 9));
        assert_ne!(Edge::new(1, 4, 3), Edge::new(1, 5, 3));
    }

    #[test]
    fn edge_hash_is_unordered() {
        let mut set = HashSet::new();
        set.insert(Edge::new(2, 7, 1));
        assert!(set.contains(&Edge::new(7, 2, 1)));
        assert!(!set.insert(Edge::new(7, 2, 5)));
        assert_eq!(set.len(), 1);
    }

    // ── Shapes ──────────────────────────────────────────────────────────────

    #[test]
    fn corridor_gives_two_leaves_and_one_edge() {
        let graph = graph_of(&corridor_grid()).unwrap();
        assert_eq!(cells(&graph), vec![(2, 6), (9, 6)]);
        assert_eq!(graph.edges, vec![Edge::new(0, 1, 6)]);
        assert_eq!(graph.edges[0].length, 6);
        assert!(graph.nodes.iter().all(|n| n.kind == NodeKind::Leaf));
        assert_eq!(graph.nodes_of_kind(NodeKind::Intersection).count(), 0);
        assert_eq!(graph.root, None);
    }

    #[test]
    fn t_junction_gives_one_intersection_and_three_leaves() {
        let graph = graph_of(&t_junction_grid()).unwrap();
        assert_eq!(cells(&graph), vec![(1, 2), (13, 2), (7, 3), (7, 11)]);

        let junction = &graph.nodes[2];
        assert_eq!(junction.kind, NodeKind::Intersection);
        assert_eq!(junction.degree, 3);
        assert_eq!(graph.nodes_of_kind(NodeKind::Leaf).count(), 3);

        let edges: HashSet<_> = graph.edges.iter().copied().collect();
        let expected: HashSet<_> = [Edge::new(0, 2, 0), Edge::new(1, 2, 0), Edge::new(2, 3, 0)]
            .into_iter()
            .collect();
        assert_eq!(edges, expected);
        assert_eq!(graph.incident_edges(2).count(), 3);
        assert_classification_consistent(&graph);
    }

    #[test]
    fn cross_merges_junction_pixels_into_one_node() {
        let msg = occupancy_grid_from_fn(15, 0.05, |col, row| {
            ((6..=8).contains(&row) && (1..=13).contains(&col))
                || ((6..=8).contains(&col) && (1..=13).contains(&row))
        });
        let graph = graph_of(&msg).unwrap();
        assert_eq!(graph.nodes.len(), 5);
        let centre = graph
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::Intersection)
            .unwrap();
        assert_eq!(centre.cell, (7, 7));
        assert_eq!(centre.degree, 4);
        assert_eq!(graph.nodes_of_kind(NodeKind::Leaf).count(), 4);
        assert_classification_consistent(&graph);
    }

    #[test]
    fn ring_gets_anchor_node_with_loop_edge() {
        let msg = occupancy_grid_from_fn(12, 0.05, |col, row| {
            let outer = (2..=9).contains(&row) && (2..=9).contains(&col);
            let inner = (4..=7).contains(&row) && (4..=7).contains(&col);
            outer && !inner
        });
        let graph = graph_of(&msg).unwrap();
        assert_eq!(cells(&graph), vec![(3, 3)]);
        assert_eq!(graph.edges.len(), 1);
        assert!(graph.edges[0].is_loop());
        assert_eq!(graph.edges[0].length, 18);
        assert_eq!(graph.nodes[0].degree, 2);
        assert_eq!(graph.nodes[0].kind, NodeKind::Passage);
    }

    #[test]
    fn isolated_cell_is_a_leaf_without_edges() {
        let mut rows = vec!["############"; 12];
        rows[5] = "#####.######";
        let graph = graph_of(&occupancy_grid_from_ascii(&rows, 0.05)).unwrap();
        assert_eq!(cells(&graph), vec![(5, 5)]);
        assert!(graph.edges.is_empty());
        assert_eq!(graph.nodes[0].degree, 0);
        assert_eq!(graph.nodes[0].kind, NodeKind::Leaf);
    }

    #[test]
    fn separate_regions_give_separate_components() {
        let msg = occupancy_grid_from_fn(12, 0.05, |col, row| {
            ((1..=3).contains(&row) && (1..=4).contains(&col))
                || ((7..=10).contains(&row) && (6..=10).contains(&col))
        });
        let graph = graph_of(&msg).unwrap();
        assert_eq!(graph.nodes.len(), 4);
        assert_eq!(graph.edges, vec![Edge::new(0, 1, 2), Edge::new(2, 3, 1)]);
    }

    #[test]
    fn all_occupied_grid_is_empty_graph() {
        let msg = occupancy_grid_from_fn(12, 0.05, |_, _| false);
        assert_eq!(graph_of(&msg), Err(TopoError::EmptyGraph));
    }

    #[test]
    fn node_positions_are_cell_centres() {
        let graph = graph_of(&corridor_grid()).unwrap();
        // Origin is (-0.3, -0.3); cell (2, 6) centre is (-0.175, 0.025).
        let p = graph.nodes[0].position;
        assert!((p.x + 0.175).abs() < 1e-5);
        assert!((p.y - 0.025).abs() < 1e-5);
    }

    #[test]
    fn shape_mismatch_is_malformed() {
        let grid = threshold(&corridor_grid(), &ExtractionConfig {
            scan_radius: 0.3,
            ..ExtractionConfig::default()
        })
        .unwrap();
        let mask = skeletonize(&grid);
        let other = GridGeometry {
            width: 5,
            ..*grid.geometry()
        };
        assert!(matches!(
            build_graph(&mask, &other),
            Err(TopoError::MalformedInput(_))
        ));
    }

    #[test]
    fn classify_recomputes_after_edit() {
        let mut graph = graph_of(&corridor_grid()).unwrap();
        graph.edges.push(Edge::new(0, 1, 4));
        graph.edges.push(Edge::new(0, 0, 5));
        classify(&mut graph);
        assert_eq!(graph.nodes[0].degree, 4);
        assert_eq!(graph.nodes[0].kind, NodeKind::Intersection);
        assert_eq!(graph.nodes[1].kind, NodeKind::Passage);
        assert_classification_consistent(&graph);
    }
}
