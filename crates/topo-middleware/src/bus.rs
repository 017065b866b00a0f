//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! Traffic is partitioned into six [`Topic`] lanes, one per ROS topic the
//! extractor reads or writes:
//!
//! | Topic | ROS name | Traffic |
//! |---|---|---|
//! | [`Topic::Area`] | `/topology/area` | Local occupancy grids (inbound) |
//! | [`Topic::Odometry`] | `/odom` | Robot odometry (inbound) |
//! | [`Topic::Nodes`] | `/topology/nodes` | Node markers (outbound) |
//! | [`Topic::Edges`] | `/topology/edges` | Edge markers (outbound) |
//! | [`Topic::History`] | `/topology/history` | Target history marker (outbound) |
//! | [`Topic::Diagnostics`] | `/topology/diagnostics` | Skipped-frame reports |

use topo_types::{Event, TopoError};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Routing lanes on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Area,
    Odometry,
    Nodes,
    Edges,
    History,
    Diagnostics,
}

impl Topic {
    pub const ALL: [Topic; 6] = [
        Topic::Area,
        Topic::Odometry,
        Topic::Nodes,
        Topic::Edges,
        Topic::History,
        Topic::Diagnostics,
    ];

    /// Topics the extractor publishes markers on.
    pub const MARKERS: [Topic; 3] = [Topic::Nodes, Topic::Edges, Topic::History];

    /// The ROS topic name this lane mirrors.
    pub fn ros_name(self) -> &'static str {
        match self {
            Topic::Area => "/topology/area",
            Topic::Odometry => "/odom",
            Topic::Nodes => "/topology/nodes",
            Topic::Edges => "/topology/edges",
            Topic::History => "/topology/history",
            Topic::Diagnostics => "/topology/diagnostics",
        }
    }

    /// Inverse of [`Topic::ros_name`].
    pub fn from_ros_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.ros_name() == name)
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.ros_name())
    }
}

/// Shared event bus.  Clone it cheaply – all clones share the same
/// underlying broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    area: broadcast::Sender<Event>,
    odometry: broadcast::Sender<Event>,
    nodes: broadcast::Sender<Event>,
    edges: broadcast::Sender<Event>,
    history: broadcast::Sender<Event>,
    diagnostics: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (area, _) = broadcast::channel(capacity);
        let (odometry, _) = broadcast::channel(capacity);
        let (nodes, _) = broadcast::channel(capacity);
        let (edges, _) = broadcast::channel(capacity);
        let (history, _) = broadcast::channel(capacity);
        let (diagnostics, _) = broadcast::channel(capacity);
        Self {
            area,
            odometry,
            nodes,
            edges,
            history,
            diagnostics,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event.
    /// Returns `Ok(0)` when no subscribers are currently listening on the
    /// topic; outbound markers are routinely published with nobody
    /// watching.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, TopoError> {
        let sender = self.topic_sender(topic);
        if sender.receiver_count() == 0 {
            return Ok(0);
        }
        sender
            .send(event)
            .map_err(|e| TopoError::Channel(format!("send on {topic} failed: {e}")))
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Area => &self.area,
            Topic::Odometry => &self.odometry,
            Topic::Nodes => &self.nodes,
            Topic::Edges => &self.edges,
            Topic::History => &self.history,
            Topic::Diagnostics => &self.diagnostics,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Topic-based receiver
// ────────────────────────────────────────────────────────────────────────────

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
#[derive(Debug)]
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Wait for the next event, logging and skipping over lag.
    ///
    /// Returns `None` once the bus is closed.
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = %self.topic, lagged_by = n, "TopicReceiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive; `None` when nothing is queued.
    pub fn try_next(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(topic = %self.topic, lagged_by = n, "TopicReceiver lagged");
                }
                Err(_) => return None,
            }
        }
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topo_types::{EventPayload, OdometryMsg};

    fn make_event(source: &str) -> Event {
        Event::new(source, EventPayload::Odometry(OdometryMsg::default()))
    }

    #[test]
    fn ros_names_round_trip() {
        for topic in Topic::ALL {
            assert_eq!(Topic::from_ros_name(topic.ros_name()), Some(topic));
        }
        assert_eq!(Topic::from_ros_name("/cmd_vel"), None);
        assert_eq!(Topic::Odometry.to_string(), "/odom");
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::default();
        assert_eq!(bus.publish_to(Topic::Nodes, make_event("test")), Ok(0));
    }

    /// Two independent subscribers on the same topic both receive the event.
    #[tokio::test]
    async fn topic_multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut subscriber1 = bus.subscribe_to(Topic::Odometry);
        let mut subscriber2 = bus.subscribe_to(Topic::Odometry);

        let event = make_event("rosbridge::odom");
        assert_eq!(bus.publish_to(Topic::Odometry, event.clone())?, 2);

        let recv1 = subscriber1.recv().await?;
        let recv2 = subscriber2.recv().await?;

        assert_eq!(recv1.id, event.id, "subscriber 1 got wrong event");
        assert_eq!(recv2.id, event.id, "subscriber 2 got wrong event");
        Ok(())
    }

    /// A subscriber on `Area` must not receive events published to
    /// `Odometry`.
    #[tokio::test]
    async fn topic_subscriber_does_not_receive_other_topic_events() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut area_sub = bus.subscribe_to(Topic::Area);
        let _odom_sub = bus.subscribe_to(Topic::Odometry);

        bus.publish_to(Topic::Odometry, make_event("rosbridge::odom"))?;

        let result = tokio::time::timeout(std::time::Duration::from_millis(50), area_sub.recv()).await;
        assert!(result.is_err(), "Area subscriber must not receive an Odometry event");
        Ok(())
    }

    /// Flooding a low-capacity channel while a subscriber sleeps must produce
    /// a `Lagged` error rather than panicking or blocking.
    #[tokio::test]
    async fn topic_channel_lag_on_slow_subscriber() {
        const CAPACITY: usize = 64;
        let bus = EventBus::new(CAPACITY);
        let mut slow_sub = bus.subscribe_to(Topic::Area);

        for _ in 0..1_000 {
            let _ = bus.publish_to(Topic::Area, make_event("flood::area"));
        }

        let result = slow_sub.recv().await;
        assert!(
            matches!(result, Err(broadcast::error::RecvError::Lagged(_))),
            "expected Lagged error, got: {result:?}"
        );
    }

    #[tokio::test]
    async fn try_next_skips_lag() {
        let bus = EventBus::new(4);
        let mut sub = bus.subscribe_to(Topic::History);
        let mut last = None;
        for _ in 0..10 {
            let event = make_event("flood::history");
            last = Some(event.id);
            bus.publish_to(Topic::History, event).unwrap();
        }
        // The oldest six were dropped; the first delivered one is #7.
        let mut seen = Vec::new();
        while let Some(event) = sub.try_next() {
            seen.push(event.id);
        }
        assert_eq!(seen.len(), 4);
        assert_eq!(seen.last().copied(), last);
    }

    #[tokio::test]
    async fn next_event_returns_none_when_bus_dropped() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe_to(Topic::Diagnostics);
        drop(bus);
        assert!(sub.next_event().await.is_none());
    }
}
