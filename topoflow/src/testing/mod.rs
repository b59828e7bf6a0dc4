//! Testing utilities for topology builds.
//!
//! This module provides:
//! - Reference pipeline specifications
//! - Assertions over compiled topologies

mod assertions;
mod fixtures;

pub use assertions::{
    assert_grant, assert_invocation_grant_count, assert_no_grant, assert_storage_grant_count,
};
pub use fixtures::{
    linear_pipeline, six_stage_pipeline, two_stage_pipeline, REFERENCE_SCHEDULE,
};
