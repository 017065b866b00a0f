//! `topo replay` – feed a recorded session through the extractor.
//!
//! The input holds one rosbridge publish frame per line, as a rosbridge
//! client would have received them (`/topology/area` and `/odom`).  Blank
//! lines and lines starting with `#` are skipped.  Frames are processed in
//! file order, so the interleaving of grids and odometry is reproduced
//! exactly.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use topo_middleware::RosbridgeFrame;
use topo_runtime::{FrameOutcome, TopologyExtractor};
use topo_types::{EventPayload, TopoError};
use tracing::warn;

/// Counters for one replay run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub grids: usize,
    pub published: usize,
    pub skipped: usize,
    pub odometry: usize,
    /// Lines that could not be decoded.
    pub rejected: usize,
    /// Lines that were valid frames on a topic the extractor does not read.
    pub ignored: usize,
}

/// Replay every frame from `reader` into `extractor`.
///
/// `on_frame` is called once per grid update with its outcome.  Stops early,
/// without error, once `shutdown` is set.
///
/// # Errors
///
/// [`TopoError::MalformedInput`] if the input cannot be read.
pub fn replay<R: BufRead>(
    reader: R,
    extractor: &mut TopologyExtractor,
    shutdown: &AtomicBool,
    mut on_frame: impl FnMut(&FrameOutcome),
) -> Result<ReplaySummary, TopoError> {
    let mut summary = ReplaySummary::default();

    for (n, line) in reader.lines().enumerate() {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let line = line.map_err(|e| TopoError::MalformedInput(format!("line {}: {e}", n + 1)))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let decoded = RosbridgeFrame::parse(line).and_then(RosbridgeFrame::into_event);
        let event = match decoded {
            Ok(Some((_, event))) => event,
            Ok(None) => {
                summary.ignored += 1;
                continue;
            }
            Err(e) => {
                warn!(line = n + 1, error = %e, "Skipping undecodable frame");
                summary.rejected += 1;
                continue;
            }
        };

        match event.payload {
            EventPayload::OccupancyGrid(grid) => {
                let outcome = extractor.handle_grid(&grid);
                summary.grids += 1;
                if outcome.is_published() {
                    summary.published += 1;
                } else {
                    summary.skipped += 1;
                }
                on_frame(&outcome);
            }
            EventPayload::Odometry(odom) => {
                extractor.handle_odometry(&odom);
                summary.odometry += 1;
            }
            _ => summary.ignored += 1,
        }
    }

    Ok(summary)
}

/// One coloured status line for a grid update.
pub fn format_outcome(outcome: &FrameOutcome) -> String {
    match outcome {
        FrameOutcome::Published {
            stamp,
            nodes,
            edges,
            root,
            target,
        } => {
            let root = root.map_or_else(|| "-".to_string(), |r| r.to_string());
            let target = target.map_or_else(
                || "pose unknown".dimmed().to_string(),
                |t| format!("target ({:.2}, {:.2})", t.x, t.y),
            );
            format!(
                "  {} {}  {} nodes, {} edges, root {}  {}",
                "✓".green().bold(),
                stamp.to_string().dimmed(),
                nodes,
                edges,
                root.bold(),
                target
            )
        }
        FrameOutcome::Skipped { stamp, reason } => format!(
            "  {} {}  {}",
            "✗".yellow().bold(),
            stamp.to_string().dimmed(),
            reason.to_string().yellow()
        ),
    }
}

/// Closing line of a replay.
pub fn format_summary(summary: &ReplaySummary) -> String {
    format!(
        "  {} grids ({} published, {} skipped), {} odometry, {} rejected",
        summary.grids.to_string().bold(),
        summary.published.to_string().green(),
        summary.skipped.to_string().yellow(),
        summary.odometry,
        summary.rejected
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;
    use topo_middleware::{EventBus, Topic};
    use topo_perception::config::ExtractionConfig;
    use topo_perception::fixtures::{occupancy_grid_from_fn, odometry, t_junction_grid};
    use topo_runtime::GraphPresenter;
    use topo_types::Stamp;

    fn extractor() -> TopologyExtractor {
        let config = ExtractionConfig {
            scan_radius: 0.375,
            ..ExtractionConfig::default()
        };
        TopologyExtractor::new(config, GraphPresenter::default(), Arc::new(EventBus::default()))
            .unwrap()
    }

    fn frame(topic: Topic, msg: impl serde::Serialize) -> String {
        RosbridgeFrame::publish(topic, serde_json::to_value(msg).unwrap())
            .to_json()
            .unwrap()
    }

    fn session() -> String {
        [
            "# recorded session".to_string(),
            frame(Topic::Area, t_junction_grid()),
            frame(Topic::Odometry, odometry(1.0, 0.0, 0.0)),
            String::new(),
            frame(Topic::Area, t_junction_grid()),
            frame(Topic::Area, occupancy_grid_from_fn(15, 0.05, |_, _| false)),
            "{ not json".to_string(),
            r#"{"op":"publish","topic":"/cmd_vel","msg":{}}"#.to_string(),
        ]
        .join("\n")
    }

    #[test]
    fn replays_session_in_order() {
        let mut extractor = extractor();
        let mut outcomes = Vec::new();
        let summary = replay(
            Cursor::new(session()),
            &mut extractor,
            &AtomicBool::new(false),
            |o| outcomes.push(o.clone()),
        )
        .unwrap();

        assert_eq!(
            summary,
            ReplaySummary {
                grids: 3,
                published: 2,
                skipped: 1,
                odometry: 1,
                rejected: 1,
                ignored: 1,
            }
        );
        // Only the grid after the odometry reached the history.
        assert_eq!(extractor.history().len(), 1);
        assert!(matches!(outcomes[0], FrameOutcome::Published { target: None, .. }));
        assert!(matches!(outcomes[1], FrameOutcome::Published { target: Some(_), .. }));
        assert!(matches!(outcomes[2], FrameOutcome::Skipped { reason: TopoError::EmptyGraph, .. }));
    }

    #[test]
    fn shutdown_stops_before_next_line() {
        let mut extractor = extractor();
        let summary = replay(
            Cursor::new(session()),
            &mut extractor,
            &AtomicBool::new(true),
            |_| {},
        )
        .unwrap();
        assert_eq!(summary, ReplaySummary::default());
    }

    #[test]
    fn outcome_lines_mention_counts_and_reason() {
        colored::control::set_override(false);
        let published = FrameOutcome::Published {
            stamp: Stamp::new(3, 5),
            nodes: 4,
            edges: 3,
            root: Some(2),
            target: None,
        };
        let line = format_outcome(&published);
        assert!(line.contains("4 nodes, 3 edges, root 2"));
        assert!(line.contains("3.000000005"));

        let skipped = FrameOutcome::Skipped {
            stamp: Stamp::new(3, 0),
            reason: TopoError::EmptyGraph,
        };
        assert!(format_outcome(&skipped).contains("skeleton yields no nodes"));
    }
}
