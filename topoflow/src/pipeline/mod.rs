//! Pipeline compilation.
//!
//! This module provides:
//! - Pipeline specifications (the input description)
//! - The validated stage graph
//! - Resource materialization (locations, work units, storage grants)
//! - Wiring resolution (edges, invocation grants, scheduled plans)
//! - The [`TopologyCompiler`] facade running all three phases

mod compiler;
mod graph;
mod materializer;
mod spec;
mod wiring;

#[cfg(test)]
mod integration_tests;

pub use compiler::TopologyCompiler;
pub use graph::{StageGraph, StageLink, StageNode};
pub use materializer::{MaterializedResources, ResourceMaterializer};
pub use spec::{LocationOverride, PipelineSpec, StageSpec, WorkUnitKind};
pub use wiring::{checkpoint_name, Wiring, WiringResolver};
