//! Topology compiler.
//!
//! Runs the three build phases in order (graph, materialize, wire) and
//! assembles the [`Topology`]. Every phase is reported to the configured
//! [`EventSink`].

use super::{PipelineSpec, ResourceMaterializer, StageGraph, WiringResolver};
use crate::config::CompilerConfig;
use crate::core::Topology;
use crate::errors::TopologyError;
use crate::events::{self, EventSink, NoOpEventSink};
use crate::observability::{BuildSpanAttributes, SpanTimer};
use std::fmt;
use std::sync::Arc;

/// Compiles pipeline specifications into topologies.
#[derive(Clone)]
pub struct TopologyCompiler {
    config: CompilerConfig,
    events: Arc<dyn EventSink>,
}

impl fmt::Debug for TopologyCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopologyCompiler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for TopologyCompiler {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}

impl TopologyCompiler {
    /// Creates a compiler with the given configuration.
    #[must_use]
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compiles a pipeline specification.
    ///
    /// The build is all-or-nothing: on error no partial topology escapes.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by configuration validation or by any
    /// build phase.
    pub fn compile(&self, spec: &PipelineSpec) -> Result<Topology, TopologyError> {
        let timer = SpanTimer::start("topology.compile");
        let attrs = BuildSpanAttributes::new(&spec.name, spec.orchestration, spec.stages.len());

        self.events.emit(
            events::BUILD_STARTED,
            Some(serde_json::json!({
                "pipeline": spec.name,
                "orchestration": spec.orchestration,
                "stages": spec.stages.len(),
            })),
        );

        match self.build(spec) {
            Ok(topology) => {
                let attrs = attrs
                    .with_counts(topology.locations.len(), topology.grants.len())
                    .with_duration_ms(timer.finish());
                tracing::info!(
                    pipeline = %topology.name,
                    orchestration = %topology.orchestration,
                    locations = topology.locations.len(),
                    work_units = topology.work_units.len(),
                    grants = topology.grants.len(),
                    edges = topology.edges.len(),
                    "Topology built"
                );
                self.events.emit(
                    events::BUILD_COMPLETED,
                    serde_json::to_value(attrs.to_attributes()).ok(),
                );
                Ok(topology)
            }
            Err(err) => {
                let duration_ms = timer.finish();
                let attrs = match err.code() {
                    Some(code) => attrs.with_error_code(code),
                    None => attrs,
                }
                .with_duration_ms(duration_ms);
                tracing::info!(
                    pipeline = %spec.name,
                    code = err.code().unwrap_or("-"),
                    duration_ms,
                    "Topology build failed: {}",
                    err
                );
                let mut payload = err.to_json();
                payload["attributes"] = serde_json::json!(attrs.to_attributes());
                self.events.emit(events::BUILD_FAILED, Some(payload));
                Err(err)
            }
        }
    }

    /// Parses a JSON pipeline specification and compiles it.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::Serialization`] for malformed JSON, otherwise
    /// as [`TopologyCompiler::compile`].
    pub fn compile_json(&self, json: &str) -> Result<Topology, TopologyError> {
        let spec = PipelineSpec::from_json_str(json)?;
        self.compile(&spec)
    }

    fn build(&self, spec: &PipelineSpec) -> Result<Topology, TopologyError> {
        self.config.validate()?;

        let graph = StageGraph::build(spec)?;
        self.events.emit(
            events::GRAPH_BUILT,
            Some(serde_json::json!({
                "stages": graph.stage_count(),
                "links": graph.links().len(),
                "explicitLinks": graph.has_explicit_links(),
            })),
        );

        let resources = ResourceMaterializer::new(&self.config).materialize(&graph)?;
        self.events.emit(
            events::MATERIALIZED,
            Some(serde_json::json!({
                "locations": resources.locations.len(),
                "workUnits": resources.work_units.len(),
                "storageGrants": resources.grants.len(),
            })),
        );

        let wiring = WiringResolver::resolve(&graph, graph.orchestration())?;
        self.events.emit(
            events::WIRED,
            Some(serde_json::json!({
                "edges": wiring.edges.len(),
                "invocationGrants": wiring.invocation_grants.len(),
                "order": wiring.order,
            })),
        );

        let mut grants = resources.grants;
        grants.extend(wiring.invocation_grants);

        Ok(Topology {
            name: graph.name().to_string(),
            orchestration: graph.orchestration(),
            branching: graph.is_branching(),
            locations: resources.locations,
            work_units: resources.work_units,
            grants,
            edges: wiring.edges,
            plan: wiring.plan,
            trigger: wiring.trigger,
        })
    }
}
