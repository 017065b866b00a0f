//! `topo-perception` – grid → topology extraction and target tracking.
//!
//! Turns a robot-centred occupancy grid into a small graph of places
//! (dead ends, corridors, junctions) and keeps track of where the selected
//! target lies in the fixed world frame.
//!
//! # Modules
//!
//! - [`config`] – [`ExtractionConfig`][config::ExtractionConfig]: sensing
//!   window, resolution and occupancy threshold.
//! - [`threshold`] – binarises the raw grid into free / occupied / unknown.
//! - [`skeleton`] – thins free space to a one-cell-wide skeleton that keeps
//!   its connectivity.
//! - [`graph`] – walks the skeleton into [`Graph`][graph::Graph] nodes and
//!   edges and classifies nodes by degree.
//! - [`root`] – picks the navigation target.
//! - [`transform`] – planar [`Pose`][transform::Pose] maths between the grid
//!   frame and the world frame.
//! - [`pose`] – [`PoseTracker`][pose::PoseTracker]: last-write-wins robot
//!   pose shared between the input streams.
//! - [`history`] – [`HistoryTracker`][history::HistoryTracker]: world-frame
//!   trace of past targets.
//! - [`pipeline`] – [`extract`][pipeline::extract]: threshold → skeleton →
//!   graph in one call.
//! - `fixtures` – ASCII grid and odometry builders, compiled for this
//!   crate's tests and behind the `test-fixtures` feature for downstream
//!   tests.
//!
//! # Example
//!
//! ```rust
//! use topo_perception::config::ExtractionConfig;
//! use topo_perception::pipeline::extract;
//! use topo_perception::root::select_root;
//! use topo_types::{GridInfo, OccupancyGridMsg};
//!
//! // 12×12 cells of 5 cm with an east–west corridor through the middle.
//! let data = (0..144)
//!     .map(|i| {
//!         let (col, row) = (i % 12, i / 12);
//!         if (4..=7).contains(&row) && (1..=10).contains(&col) { 0 } else { 100 }
//!     })
//!     .collect();
//! let msg = OccupancyGridMsg {
//!     info: GridInfo { resolution: 0.05, width: 12, height: 12, ..GridInfo::default() },
//!     data,
//!     ..OccupancyGridMsg::default()
//! };
//!
//! let config = ExtractionConfig { scan_radius: 0.3, ..ExtractionConfig::default() };
//! let mut graph = extract(&msg, &config).unwrap();
//! graph.root = select_root(&graph, None);
//! assert_eq!(graph.root, Some(0));
//! ```

pub mod config;
#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;
pub mod graph;
pub mod history;
pub mod pipeline;
pub mod pose;
pub mod root;
pub mod skeleton;
pub mod threshold;
pub mod transform;
