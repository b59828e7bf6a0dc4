//! Span timing and attributes for topology builds.

use crate::core::Orchestration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

/// Span attributes for one topology build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildSpanAttributes {
    /// Pipeline name.
    pub pipeline: String,
    /// Orchestration mode.
    pub orchestration: Orchestration,
    /// Number of stages.
    pub stages: usize,
    /// Number of locations.
    pub locations: Option<usize>,
    /// Number of grants of any kind.
    pub grants: Option<usize>,
    /// Build duration in milliseconds.
    pub duration_ms: Option<f64>,
    /// Contract code of the failure, if any.
    pub error_code: Option<String>,
}

impl BuildSpanAttributes {
    /// Creates attributes for a build of `pipeline`.
    #[must_use]
    pub fn new(pipeline: impl Into<String>, orchestration: Orchestration, stages: usize) -> Self {
        Self {
            pipeline: pipeline.into(),
            orchestration,
            stages,
            ..Self::default()
        }
    }

    /// Records resource counts.
    #[must_use]
    pub fn with_counts(mut self, locations: usize, grants: usize) -> Self {
        self.locations = Some(locations);
        self.grants = Some(grants);
        self
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Sets the error code.
    #[must_use]
    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    /// Flattens to dotted string attributes.
    #[must_use]
    pub fn to_attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();

        attrs.insert("pipeline.name".to_string(), self.pipeline.clone());
        attrs.insert(
            "pipeline.orchestration".to_string(),
            self.orchestration.to_string(),
        );
        attrs.insert("pipeline.stages".to_string(), self.stages.to_string());

        if let Some(v) = self.locations {
            attrs.insert("topology.locations".to_string(), v.to_string());
        }
        if let Some(v) = self.grants {
            attrs.insert("topology.grants".to_string(), v.to_string());
        }
        if let Some(v) = self.duration_ms {
            attrs.insert("build.duration_ms".to_string(), v.to_string());
        }
        if let Some(ref v) = self.error_code {
            attrs.insert("build.error_code".to_string(), v.clone());
        }

        attrs
    }
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finishes the span and returns the duration.
    #[must_use]
    pub fn finish(self) -> f64 {
        let elapsed = self.elapsed_ms();
        tracing::debug!(span = %self.name, duration_ms = elapsed, "Span finished");
        elapsed
    }
}
