//! # Topoflow
//!
//! A compiler from declarative pipeline descriptions to deployable
//! topologies.
//!
//! A pipeline is an ordered list of stages, each naming the location it
//! reads and the location it writes. Topoflow turns that description into:
//!
//! - **Locations**: one storage location per distinct name, with lifecycle policy
//! - **Work units**: one compute unit per stage, with its I/O environment
//! - **Grants**: least-privilege storage access and, for push orchestration,
//!   invocation rights between adjacent stages
//! - **Wiring**: edges, plus a checkpointed plan for scheduled orchestration
//!
//! Builds are all-or-nothing: a pipeline that fails validation, has two
//! writers on one location, or links stages in a cycle yields an error and
//! no topology.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use topoflow::prelude::*;
//!
//! let spec = PipelineSpec::new("etl")
//!     .with_stage(StageSpec::new("fetch", "src/fetch").writes("raw"))
//!     .with_stage(StageSpec::new("load", "src/load").reads("raw"));
//!
//! let topology = TopologyCompiler::default().compile(&spec)?;
//! println!("{}", topology.to_json_pretty()?);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{CompilerConfig, ContainerDefaults, FunctionDefaults, LocationPolicy};
    pub use crate::core::{
        AccessMode, Edge, EdgeKind, Grant, GrantMode, GrantResource, Location, Orchestration,
        Plan, PlanStep, Topology, Trigger, TriggerTarget, WorkUnit, WorkUnitSettings,
    };
    pub use crate::errors::{
        ContractErrorInfo, CyclicGraphError, GraphValidationError, TopologyError,
        WriteConflictError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{
        LocationOverride, PipelineSpec, StageGraph, StageSpec, TopologyCompiler, WorkUnitKind,
    };
}
