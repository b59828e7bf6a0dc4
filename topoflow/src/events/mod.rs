//! Build event sinks.
//!
//! The compiler reports each phase of a build to an [`EventSink`] under a
//! dotted event name. The names are collected here so sinks and tests agree.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Emitted before the stage graph is built.
pub const BUILD_STARTED: &str = "topology.build_started";
/// Emitted once the stage graph validates.
pub const GRAPH_BUILT: &str = "topology.graph_built";
/// Emitted once locations, work units and storage grants exist.
pub const MATERIALIZED: &str = "topology.materialized";
/// Emitted once edges, invocation grants and the plan are resolved.
pub const WIRED: &str = "topology.wired";
/// Emitted with the topology summary on success.
pub const BUILD_COMPLETED: &str = "topology.build_completed";
/// Emitted with the error payload on failure.
pub const BUILD_FAILED: &str = "topology.build_failed";
