//! [`TopologyExtractor`] – the per-stream callback owner.
//!
//! Wires the extraction pipeline to the event bus:
//!
//! 1. **Odometry** (`Topic::Odometry`) – the planar pose is written into the
//!    shared [`PoseTracker`].  Nothing else happens on this stream.
//! 2. **Grid** (`Topic::Area`) – the grid is thresholded, thinned and walked
//!    into a [`Graph`]; the root is selected with the latest pose; node and
//!    edge markers are rendered with the root highlighted and published.
//!    When a pose is known the root is mapped into the world frame, appended
//!    to the [`HistoryTracker`] and the history marker is republished.
//!
//! A grid update that fails (empty skeleton, malformed message) is logged,
//! reported on `Topic::Diagnostics` and dropped; the pose and history are
//! left untouched and the next update is processed normally.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use topo_middleware::EventBus;
//! use topo_perception::config::ExtractionConfig;
//! use topo_runtime::extractor::TopologyExtractor;
//! use topo_runtime::presenter::GraphPresenter;
//!
//! # async fn demo() -> Result<(), topo_types::TopoError> {
//! let bus = Arc::new(EventBus::default());
//! let extractor = TopologyExtractor::new(
//!     ExtractionConfig::default(),
//!     GraphPresenter::default(),
//!     Arc::clone(&bus),
//! )?;
//! let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
//! let handle = extractor.spawn(stop_rx);
//! // … feed grids and odometry through the bus …
//! stop_tx.send_replace(true);
//! let extractor = handle.await.expect("extractor task panicked");
//! println!("{} targets tracked", extractor.history().len());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use topo_middleware::{EventBus, Topic, TopicReceiver};
use topo_perception::config::ExtractionConfig;
use topo_perception::graph::Graph;
use topo_perception::history::HistoryTracker;
use topo_perception::pipeline::extract;
use topo_perception::pose::PoseTracker;
use topo_perception::root::select_root;
use topo_perception::transform::{Point2, Pose, to_world};
use topo_types::{Event, EventPayload, OccupancyGridMsg, OdometryMsg, Stamp, TopoError};
use tracing::{debug, info, warn};

use crate::presenter::{GraphPresenter, MarkerFrame, TopologyMarkers};

const SOURCE: &str = "topo-runtime::extractor";

/// Alpha given to the root node and its edges.
const ROOT_ALPHA: f32 = 1.0;

// ────────────────────────────────────────────────────────────────────────────
// FrameOutcome
// ────────────────────────────────────────────────────────────────────────────

/// What became of one grid update.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Markers were published.
    Published {
        stamp: Stamp,
        nodes: usize,
        edges: usize,
        root: Option<usize>,
        /// World-frame target appended to the history, if a pose was known.
        target: Option<Point2>,
    },
    /// The update produced no graph and was dropped.
    Skipped { stamp: Stamp, reason: TopoError },
}

impl FrameOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, FrameOutcome::Published { .. })
    }

    pub fn stamp(&self) -> Stamp {
        match self {
            FrameOutcome::Published { stamp, .. } | FrameOutcome::Skipped { stamp, .. } => *stamp,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TopologyExtractor
// ────────────────────────────────────────────────────────────────────────────

/// Owner of the grid and odometry callbacks.
pub struct TopologyExtractor {
    config: ExtractionConfig,
    presenter: GraphPresenter,
    pose: PoseTracker,
    history: HistoryTracker,
    bus: Arc<EventBus>,
    last_graph: Option<Graph>,
}

impl TopologyExtractor {
    /// Build an extractor publishing on `bus`.
    ///
    /// # Errors
    ///
    /// [`TopoError::Config`] if `config` does not describe a grid.
    pub fn new(
        config: ExtractionConfig,
        presenter: GraphPresenter,
        bus: Arc<EventBus>,
    ) -> Result<Self, TopoError> {
        config.validate()?;
        info!(
            grid_cells = config.grid_cells(),
            resolution = config.resolution,
            threshold = config.occupancy_threshold,
            "Topology extractor configured"
        );
        Ok(Self {
            config,
            presenter,
            pose: PoseTracker::new(),
            history: HistoryTracker::new(),
            bus,
            last_graph: None,
        })
    }

    // ────────────────────────────────────────────────────────────────────────
    // Accessors
    // ────────────────────────────────────────────────────────────────────────

    /// A handle on the shared pose cell.
    pub fn pose_tracker(&self) -> PoseTracker {
        self.pose.clone()
    }

    pub fn history(&self) -> &HistoryTracker {
        &self.history
    }

    /// Graph of the most recent published frame.
    pub fn last_graph(&self) -> Option<&Graph> {
        self.last_graph.as_ref()
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    // ────────────────────────────────────────────────────────────────────────
    // Callbacks
    // ────────────────────────────────────────────────────────────────────────

    /// Store the pose carried by `msg`.
    pub fn handle_odometry(&self, msg: &OdometryMsg) -> Pose {
        self.pose.update_from_odometry(msg)
    }

    /// Process one grid update end to end.
    pub fn handle_grid(&mut self, msg: &OccupancyGridMsg) -> FrameOutcome {
        let stamp = msg.header.stamp;
        let pose = self.pose.get();

        let mut graph = match extract(msg, &self.config) {
            Ok(graph) => graph,
            Err(reason) => {
                warn!(%stamp, %reason, "Graph generation failed; frame skipped");
                self.publish(
                    Topic::Diagnostics,
                    EventPayload::FrameSkipped {
                        stamp,
                        reason: reason.to_string(),
                    },
                );
                return FrameOutcome::Skipped { stamp, reason };
            }
        };

        graph.root = select_root(&graph, pose.as_ref());

        let mut markers: TopologyMarkers =
            self.presenter.present(&graph, MarkerFrame::for_pose(pose), stamp);
        markers.highlight_root(&graph, ROOT_ALPHA);
        self.publish(Topic::Nodes, EventPayload::Marker(markers.nodes));
        self.publish(Topic::Edges, EventPayload::Marker(markers.edges));

        let target = self.track_target(&graph, pose.as_ref(), stamp);

        info!(
            %stamp,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            root = ?graph.root,
            history = self.history.len(),
            "Topology published"
        );

        let outcome = FrameOutcome::Published {
            stamp,
            nodes: graph.nodes.len(),
            edges: graph.edges.len(),
            root: graph.root,
            target,
        };
        self.last_graph = Some(graph);
        outcome
    }

    /// Map the root into the world frame and extend the history.
    fn track_target(&mut self, graph: &Graph, pose: Option<&Pose>, stamp: Stamp) -> Option<Point2> {
        let root = graph.root_node()?;
        match to_world(root.position, pose) {
            Ok(target) => {
                self.history.record(target);
                let marker = self.presenter.present_history(&self.history, stamp);
                self.publish(Topic::History, EventPayload::Marker(marker));
                Some(target)
            }
            Err(e) => {
                debug!(%stamp, reason = %e, "History unchanged");
                None
            }
        }
    }

    fn publish(&self, topic: Topic, payload: EventPayload) {
        if let Err(e) = self.bus.publish_to(topic, Event::new(SOURCE, payload)) {
            warn!(%topic, error = %e, "Publish failed");
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Event loop
    // ────────────────────────────────────────────────────────────────────────

    /// Subscribe to the input topics now, then run the loop on a new task.
    ///
    /// The task hands the extractor back once `shutdown` flips to `true` or
    /// its sender is dropped.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<Self> {
        let area = self.bus.subscribe_to(Topic::Area);
        let odom = self.bus.subscribe_to(Topic::Odometry);
        tokio::spawn(self.run_with(area, odom, shutdown))
    }

    /// Process grid and odometry events until `shutdown`.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Self {
        let area = self.bus.subscribe_to(Topic::Area);
        let odom = self.bus.subscribe_to(Topic::Odometry);
        self.run_with(area, odom, shutdown).await
    }

    async fn run_with(
        mut self,
        mut area: TopicReceiver,
        mut odom: TopicReceiver,
        mut shutdown: watch::Receiver<bool>,
    ) -> Self {
        info!("Topology extractor running");
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                event = area.next_event() => {
                    let Some(event) = event else { break };
                    match event.payload {
                        EventPayload::OccupancyGrid(grid) => {
                            self.handle_grid(&grid);
                        }
                        other => debug!(payload = ?other, "Ignoring non-grid event on area topic"),
                    }
                }
                event = odom.next_event() => {
                    let Some(event) = event else { break };
                    match event.payload {
                        EventPayload::Odometry(msg) => {
                            self.handle_odometry(&msg);
                        }
                        other => debug!(payload = ?other, "Ignoring non-odometry event on odom topic"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!(history = self.history.len(), "Topology extractor stopped");
        self
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
