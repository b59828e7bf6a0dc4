//! Core domain model types for topoflow.
//!
//! This module contains the types shared across the compiler:
//! - Orchestration, access-mode and edge-kind enums
//! - The materialized topology and its parts

mod modes;
mod topology;

pub use modes::{AccessMode, EdgeKind, GrantMode, Orchestration};
pub use topology::{
    Checkpoint, Edge, Grant, GrantResource, Location, Plan, PlanStep, Topology, Trigger,
    TriggerTarget, WorkUnit, WorkUnitSettings, ENV_DESTINATION_BUCKET, ENV_SOURCE_BUCKET,
};
