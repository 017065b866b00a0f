//! Latest robot pose, shared between the odometry and grid streams.
//!
//! [`PoseTracker`] is a last-write-wins cell: every odometry reading
//! replaces the previous pose outright, and a grid update reads whatever
//! was written last.  No history is kept and no filtering is applied.
//!
//! The cell is a [`tokio::sync::watch`] channel, so readers always see a
//! whole pose and never block on a writer.  Clones share the same cell.

use std::sync::Arc;

use tokio::sync::watch;
use topo_types::OdometryMsg;
use tracing::trace;

use crate::transform::Pose;

#[derive(Debug, Clone)]
pub struct PoseTracker {
    tx: Arc<watch::Sender<Option<Pose>>>,
}

impl Default for PoseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PoseTracker {
    /// A tracker with no pose yet.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Replace the current pose.
    pub fn set(&self, pose: Pose) {
        self.tx.send_replace(Some(pose));
    }

    /// The last pose written, or `None` before the first write.
    pub fn get(&self) -> Option<Pose> {
        *self.tx.borrow()
    }

    /// Derive the planar pose from `msg` and store it.
    pub fn update_from_odometry(&self, msg: &OdometryMsg) -> Pose {
        let pose = Pose::from_odometry(msg);
        trace!(x = pose.x, y = pose.y, heading = pose.heading, "Pose updated");
        self.set(pose);
        pose
    }
}
