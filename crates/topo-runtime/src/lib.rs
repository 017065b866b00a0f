//! `topo-runtime` – the extraction node.
//!
//! # Modules
//!
//! - [`extractor`] – [`TopologyExtractor`][extractor::TopologyExtractor]:
//!   owns the grid and odometry callbacks, runs the pipeline per grid update
//!   and publishes markers on the bus.
//! - [`presenter`] – [`GraphPresenter`][presenter::GraphPresenter]: renders
//!   graphs and the target history into markers, with node and edge
//!   highlighting.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with an optional OTLP span exporter.

pub mod extractor;
pub mod presenter;
pub mod telemetry;

pub use extractor::{FrameOutcome, TopologyExtractor};
pub use presenter::{GraphPresenter, MarkerFrame, TopologyMarkers};
pub use telemetry::{TracerProviderGuard, init_tracing};
