//! World-frame trace of past navigation targets.

use serde::{Deserialize, Serialize};

use crate::transform::Point2;

/// Append-only list of target positions in the world frame.
///
/// Points are kept in insertion order and are never removed or merged;
/// trimming for display happens in the presenter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryTracker {
    points: Vec<Point2>,
}

impl HistoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, point: Point2) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<Point2> {
        self.points.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order_without_dedup() {
        let mut history = HistoryTracker::new();
        assert!(history.is_empty());
        history.record(Point2::new(1.0, 0.0));
        history.record(Point2::new(1.0, 0.0));
        history.record(Point2::new(2.0, 0.0));
        assert_eq!(history.len(), 3);
        assert_eq!(history.points()[0], history.points()[1]);
        assert_eq!(history.last(), Some(Point2::new(2.0, 0.0)));
    }
}
