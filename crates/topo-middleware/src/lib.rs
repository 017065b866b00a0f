//! `topo-middleware` – message transport.
//!
//! Routes grids, odometry and markers between the extractor and the
//! outside world without caring about their meaning.
//!
//! # Modules
//!
//! - [`bus`] – Headless, typed, topic-based publish/subscribe event bus built
//!   on Tokio broadcast channels.
//! - [`rosbridge`] – rosbridge-protocol JSON frames and a WebSocket endpoint
//!   that feeds inbound grids and odometry onto the bus and streams marker
//!   traffic back out.

pub mod bus;
pub mod rosbridge;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use rosbridge::{RosBridge, RosbridgeFrame};
