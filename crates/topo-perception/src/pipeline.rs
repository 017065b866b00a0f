//! One-call grid → graph extraction.

use topo_types::{OccupancyGridMsg, TopoError};
use tracing::{debug, instrument};

use crate::config::ExtractionConfig;
use crate::graph::{Graph, build_graph};
use crate::skeleton::skeletonize;
use crate::threshold::threshold;

/// Threshold, thin and walk `msg` into a classified graph.
///
/// The root is left unset; pick it with [`crate::root::select_root`] once
/// the robot pose is known.
///
/// # Errors
///
/// - [`TopoError::MalformedInput`] if the grid does not match `config`.
/// - [`TopoError::EmptyGraph`] if the free space has no skeleton.
#[instrument(skip_all, fields(stamp = %msg.header.stamp))]
pub fn extract(msg: &OccupancyGridMsg, config: &ExtractionConfig) -> Result<Graph, TopoError> {
    let grid = threshold(msg, config)?;
    let mask = skeletonize(&grid);
    if mask.is_empty() {
        debug!("No free space left after thinning");
        return Err(TopoError::EmptyGraph);
    }
    build_graph(&mask, grid.geometry())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{corridor_grid, occupancy_grid_from_fn, t_junction_grid};
    use crate::graph::NodeKind;

    fn config(cells: usize) -> ExtractionConfig {
        ExtractionConfig {
            scan_radius: cells as f32 * 0.05 / 2.0,
            ..ExtractionConfig::default()
        }
    }

    #[test]
    fn corridor_end_to_end() {
        let graph = extract(&corridor_grid(), &config(12)).unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
        assert!(graph.root.is_none());
    }

    #[test]
    fn t_junction_end_to_end() {
        let graph = extract(&t_junction_grid(), &config(15)).unwrap();
        assert_eq!(graph.nodes_of_kind(NodeKind::Intersection).count(), 1);
        assert_eq!(graph.nodes_of_kind(NodeKind::Leaf).count(), 3);
    }

    #[test]
    fn all_occupied_is_empty_graph() {
        let msg = occupancy_grid_from_fn(12, 0.05, |_, _| false);
        assert_eq!(extract(&msg, &config(12)), Err(TopoError::EmptyGraph));
    }

    #[test]
    fn wrong_shape_is_malformed() {
        assert!(matches!(
            extract(&corridor_grid(), &config(15)),
            Err(TopoError::MalformedInput(_))
        ));
    }

    #[test]
    fn default_window_accepts_200_cells() {
        let msg = occupancy_grid_from_fn(200, 0.05, |col, row| {
            (95..=104).contains(&row) && (10..=189).contains(&col)
        });
        let graph = extract(&msg, &ExtractionConfig::default()).unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert!(graph.nodes.iter().all(|n| n.kind == NodeKind::Leaf));
    }
}
