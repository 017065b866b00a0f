//! rosbridge-protocol adapter.
//!
//! This module provides [`RosBridge`], which:
//!
//! 1. **Ingests** rosbridge publish frames
//!    (`{"op":"publish","topic":…,"msg":…}`) carrying occupancy grids on
//!    `/topology/area` and odometry on `/odom`, and republishes them as
//!    [`Event`]s on the matching bus [`Topic`].
//!
//! 2. **Serves** a WebSocket endpoint.  Every client receives the marker
//!    traffic (`/topology/nodes`, `/topology/edges`, `/topology/history`)
//!    as rosbridge publish frames, and may itself send publish frames that
//!    are ingested as above.
//!
//! The same frame format is used by `topo replay` for recorded sessions.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use topo_types::{Event, EventPayload, OccupancyGridMsg, OdometryMsg, TopoError};
use tracing::{debug, error, info, warn};

use crate::bus::{EventBus, Topic};

const SOURCE_AREA: &str = "topo-middleware::rosbridge/area";
const SOURCE_ODOM: &str = "topo-middleware::rosbridge/odom";

// ────────────────────────────────────────────────────────────────────────────
// Frames
// ────────────────────────────────────────────────────────────────────────────

/// One rosbridge protocol frame.  Only `publish` frames carry data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosbridgeFrame {
    pub op: String,
    pub topic: String,
    #[serde(default)]
    pub msg: serde_json::Value,
}

impl RosbridgeFrame {
    /// A `publish` frame for `topic` carrying `msg`.
    pub fn publish(topic: Topic, msg: serde_json::Value) -> Self {
        Self {
            op: "publish".to_string(),
            topic: topic.ros_name().to_string(),
            msg,
        }
    }

    /// Parse a JSON text frame.
    pub fn parse(text: &str) -> Result<Self, TopoError> {
        serde_json::from_str(text).map_err(|e| TopoError::Serialization(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, TopoError> {
        serde_json::to_string(self).map_err(|e| TopoError::Serialization(e.to_string()))
    }

    /// Decode an inbound frame into the bus topic and event it maps to.
    ///
    /// Returns `Ok(None)` for frames that are not publishes on an inbound
    /// topic.
    ///
    /// # Errors
    ///
    /// [`TopoError::Serialization`] if the payload does not match the
    /// topic's message type.
    pub fn into_event(self) -> Result<Option<(Topic, Event)>, TopoError> {
        if self.op != "publish" {
            return Ok(None);
        }
        let decoded = match Topic::from_ros_name(&self.topic) {
            Some(Topic::Area) => {
                let grid: OccupancyGridMsg = decode(self.msg, &self.topic)?;
                (Topic::Area, Event::new(SOURCE_AREA, EventPayload::OccupancyGrid(grid)))
            }
            Some(Topic::Odometry) => {
                let odom: OdometryMsg = decode(self.msg, &self.topic)?;
                (Topic::Odometry, Event::new(SOURCE_ODOM, EventPayload::Odometry(odom)))
            }
            _ => return Ok(None),
        };
        Ok(Some(decoded))
    }

    /// Encode an outbound bus event as a publish frame.
    ///
    /// Returns `Ok(None)` for events that have no rosbridge representation.
    pub fn from_event(topic: Topic, event: &Event) -> Result<Option<Self>, TopoError> {
        let msg = match &event.payload {
            EventPayload::Marker(marker) => serde_json::to_value(marker),
            EventPayload::OccupancyGrid(grid) => serde_json::to_value(grid),
            EventPayload::Odometry(odom) => serde_json::to_value(odom),
            EventPayload::FrameSkipped { .. } => return Ok(None),
        }
        .map_err(|e| TopoError::Serialization(e.to_string()))?;
        Ok(Some(Self::publish(topic, msg)))
    }
}

fn decode<T: serde::de::DeserializeOwned>(msg: serde_json::Value, topic: &str) -> Result<T, TopoError> {
    serde_json::from_value(msg).map_err(|e| TopoError::Serialization(format!("{topic}: {e}")))
}

// ────────────────────────────────────────────────────────────────────────────
// RosBridge
// ────────────────────────────────────────────────────────────────────────────

/// Bridge between rosbridge clients and the internal [`EventBus`].
#[derive(Clone)]
pub struct RosBridge {
    bus: Arc<EventBus>,
}

impl RosBridge {
    /// Create a new bridge backed by `bus`.
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// Publish an occupancy grid on [`Topic::Area`].
    pub fn ingest_grid(&self, grid: OccupancyGridMsg) -> Result<usize, TopoError> {
        self.bus.publish_to(
            Topic::Area,
            Event::new(SOURCE_AREA, EventPayload::OccupancyGrid(grid)),
        )
    }

    /// Publish an odometry reading on [`Topic::Odometry`].
    pub fn ingest_odometry(&self, odom: OdometryMsg) -> Result<usize, TopoError> {
        self.bus.publish_to(
            Topic::Odometry,
            Event::new(SOURCE_ODOM, EventPayload::Odometry(odom)),
        )
    }

    /// Parse a rosbridge text frame and publish it on its topic.
    ///
    /// Returns the topic the frame was routed to, or `None` when the frame
    /// was not an inbound publish.
    pub fn ingest_text(&self, text: &str) -> Result<Option<Topic>, TopoError> {
        let Some((topic, event)) = RosbridgeFrame::parse(text)?.into_event()? else {
            return Ok(None);
        };
        self.bus.publish_to(topic, event)?;
        Ok(Some(topic))
    }

    // ────────────────────────────────────────────────────────────────────────
    // WebSocket server
    // ────────────────────────────────────────────────────────────────────────

    /// Bind `addr` and serve WebSocket clients until the task is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`TopoError::Channel`] if the TCP listener cannot be bound.
    pub async fn run_ws_server(self, addr: SocketAddr) -> Result<(), TopoError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TopoError::Channel(format!("ws bind error on {addr}: {e}")))?;
        self.serve(listener).await;
        Ok(())
    }

    /// Accept clients on an already-bound listener.
    pub async fn serve(self, listener: TcpListener) {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "rosbridge WebSocket endpoint listening");
        }
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let bridge = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = bridge.handle_ws_client(stream, peer).await {
                            error!(peer = %peer, error = %e, "ws client error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "ws accept error");
                }
            }
        }
    }

    async fn handle_ws_client(&self, stream: TcpStream, peer: SocketAddr) -> Result<(), TopoError> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| TopoError::Channel(format!("ws handshake from {peer}: {e}")))?;
        debug!(peer = %peer, "ws client connected");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let [mut nodes, mut edges, mut history] = Topic::MARKERS.map(|t| self.bus.subscribe_to(t));

        loop {
            let outbound = tokio::select! {
                event = nodes.next_event() => event.map(|e| (Topic::Nodes, e)),
                event = edges.next_event() => event.map(|e| (Topic::Edges, e)),
                event = history.next_event() => event.map(|e| (Topic::History, e)),
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            warn!(peer = %peer, error = %e, "ws read error");
                            break;
                        }
                        Some(Ok(Message::Text(text))) => {
                            if let Err(e) = self.ingest_text(text.as_str()) {
                                warn!(peer = %peer, error = %e, "Rejected inbound frame");
                            }
                        }
                        Some(Ok(_)) => {}
                    }
                    continue;
                }
            };

            let Some((topic, event)) = outbound else {
                break;
            };
            let Some(frame) = RosbridgeFrame::from_event(topic, &event)? else {
                continue;
            };
            if ws_tx.send(Message::Text(frame.to_json()?.into())).await.is_err() {
                break;
            }
        }

        debug!(peer = %peer, "ws client disconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topo_types::{ColorRgba, Header, Marker, MarkerKind, Stamp, Vec3};

    const AREA_FRAME: &str = r#"{"op":"publish","topic":"/topology/area","msg":{
        "header":{"stamp":{"sec":4,"nanosec":0},"frame_id":"base_link"},
        "info":{"resolution":0.05,"width":2,"height":1},
        "data":[0,100]}}"#;

    const ODOM_FRAME: &str = r#"{"op":"publish","topic":"/odom","msg":{
        "pose":{"pose":{"position":{"x":1.5,"y":-0.5,"z":0.0},
                        "orientation":{"x":0.0,"y":0.0,"z":0.0,"w":1.0}}}}}"#;

    fn make_bridge() -> (Arc<EventBus>, RosBridge) {
        let bus = Arc::new(EventBus::default());
        let bridge = RosBridge::new(Arc::clone(&bus));
        (bus, bridge)
    }

    fn marker() -> Marker {
        let mut marker = Marker::new(
            Header::new(Stamp::new(4, 0), "odom"),
            "node",
            MarkerKind::Points,
            Vec3::new(0.1, 0.1, 0.0),
        );
        marker.push(Vec3::new(1.0, 2.0, 0.1), ColorRgba::new(1.0, 0.73, 0.0, 0.2));
        marker
    }

    #[test]
    fn area_frame_decodes_to_grid_event() {
        let (topic, event) = RosbridgeFrame::parse(AREA_FRAME)
            .unwrap()
            .into_event()
            .unwrap()
            .unwrap();
        assert_eq!(topic, Topic::Area);
        assert_eq!(event.source, SOURCE_AREA);
        let EventPayload::OccupancyGrid(grid) = event.payload else {
            panic!("expected OccupancyGrid");
        };
        assert_eq!(grid.data, vec![0, 100]);
        assert_eq!(grid.header.stamp, Stamp::new(4, 0));
    }

    #[test]
    fn non_publish_and_unknown_topics_are_ignored() {
        let subscribe = RosbridgeFrame::parse(r#"{"op":"subscribe","topic":"/odom"}"#).unwrap();
        assert!(subscribe.into_event().unwrap().is_none());

        let other = RosbridgeFrame::parse(r#"{"op":"publish","topic":"/cmd_vel","msg":{}}"#).unwrap();
        assert!(other.into_event().unwrap().is_none());
    }

    #[test]
    fn mistyped_payload_is_a_serialization_error() {
        let frame = RosbridgeFrame::parse(r#"{"op":"publish","topic":"/odom","msg":{"pose":7}}"#).unwrap();
        assert!(matches!(frame.into_event(), Err(TopoError::Serialization(_))));
        assert!(matches!(
            RosbridgeFrame::parse("not json"),
            Err(TopoError::Serialization(_))
        ));
    }

    #[test]
    fn marker_event_encodes_as_publish_frame() {
        let event = Event::new("test", EventPayload::Marker(marker()));
        let frame = RosbridgeFrame::from_event(Topic::Nodes, &event).unwrap().unwrap();
        assert_eq!(frame.op, "publish");
        assert_eq!(frame.topic, "/topology/nodes");
        assert_eq!(frame.msg["type"], 8);
        assert_eq!(frame.msg["header"]["frame_id"], "odom");
    }

    #[test]
    fn skipped_frames_are_not_forwarded() {
        let event = Event::new(
            "test",
            EventPayload::FrameSkipped {
                stamp: Stamp::default(),
                reason: "empty".into(),
            },
        );
        assert!(RosbridgeFrame::from_event(Topic::Diagnostics, &event).unwrap().is_none());
    }

    #[tokio::test]
    async fn ingest_text_routes_by_topic() {
        let (bus, bridge) = make_bridge();
        let mut area = bus.subscribe_to(Topic::Area);
        let mut odom = bus.subscribe_to(Topic::Odometry);

        assert_eq!(bridge.ingest_text(ODOM_FRAME).unwrap(), Some(Topic::Odometry));
        assert_eq!(bridge.ingest_text(AREA_FRAME).unwrap(), Some(Topic::Area));

        let event = odom.recv().await.unwrap();
        let EventPayload::Odometry(msg) = event.payload else {
            panic!("expected Odometry");
        };
        assert!((msg.pose.pose.position.x - 1.5).abs() < f32::EPSILON);
        assert!(matches!(area.recv().await.unwrap().payload, EventPayload::OccupancyGrid(_)));
    }

    #[tokio::test]
    async fn ws_client_receives_markers_and_feeds_grids() {
        let (bus, bridge) = make_bridge();
        let mut area = bus.subscribe_to(Topic::Area);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(bridge.serve(listener));

        let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .unwrap();

        // Inbound: the server subscribes before reading, so once the grid is
        // on the bus the marker lanes are live too.
        client.send(Message::Text(AREA_FRAME.to_string().into())).await.unwrap();
        let event = tokio::time::timeout(std::time::Duration::from_secs(2), area.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event.payload, EventPayload::OccupancyGrid(_)));

        // Outbound.
        bus.publish_to(Topic::Edges, Event::new("test", EventPayload::Marker(marker())))
            .unwrap();
        let reply = tokio::time::timeout(std::time::Duration::from_secs(2), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let Message::Text(text) = reply else {
            panic!("expected a text frame");
        };
        let frame = RosbridgeFrame::parse(text.as_str()).unwrap();
        assert_eq!(frame.topic, "/topology/edges");
    }
}
