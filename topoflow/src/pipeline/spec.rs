//! Pipeline and stage specifications.
//!
//! These are the inputs to the compiler. They deserialize from the JSON
//! pipeline description format (camelCase keys) and can also be assembled in
//! code with the builder-style `with_*` methods.

use crate::config::LocationPolicy;
use crate::core::{Orchestration, Topology, WorkUnitSettings};
use crate::errors::TopologyError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// What kind of compute runs a stage, with optional per-stage overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkUnitKind {
    /// A serverless function.
    #[serde(rename_all = "camelCase")]
    Function {
        /// Runtime override.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        runtime: Option<String>,
        /// Handler override.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        handler: Option<String>,
    },
    /// A long-running container service.
    #[serde(rename_all = "camelCase")]
    Container {
        /// CPU units override.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cpu: Option<u32>,
        /// Memory override in MiB.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        memory_mib: Option<u32>,
        /// Task count override.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        desired_count: Option<u32>,
    },
}

impl Default for WorkUnitKind {
    fn default() -> Self {
        Self::Function {
            runtime: None,
            handler: None,
        }
    }
}

impl WorkUnitKind {
    /// A container work unit using the configured defaults.
    #[must_use]
    pub fn container() -> Self {
        Self::Container {
            cpu: None,
            memory_mib: None,
            desired_count: None,
        }
    }
}

/// Per-location policy override. Unset fields fall back to the compiler
/// configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationOverride {
    /// Versioning override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versioned: Option<bool>,
    /// Teardown override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destroy_on_teardown: Option<bool>,
    /// Auto-delete override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_delete_objects: Option<bool>,
}

impl LocationOverride {
    /// Applies the override on top of a base policy.
    #[must_use]
    pub fn apply(&self, base: LocationPolicy) -> LocationPolicy {
        LocationPolicy {
            versioned: self.versioned.unwrap_or(base.versioned),
            destroy_on_teardown: self.destroy_on_teardown.unwrap_or(base.destroy_on_teardown),
            auto_delete_objects: self.auto_delete_objects.unwrap_or(base.auto_delete_objects),
        }
    }

    /// An override pinning every field to the given policy.
    #[must_use]
    pub fn pinned(policy: LocationPolicy) -> Self {
        Self {
            versioned: Some(policy.versioned),
            destroy_on_teardown: Some(policy.destroy_on_teardown),
            auto_delete_objects: Some(policy.auto_delete_objects),
        }
    }
}

/// Specification for a single stage in a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSpec {
    /// The unique id of the stage.
    pub id: String,
    /// Opaque reference to the code or container the stage runs.
    pub work_unit_ref: String,
    /// Location the stage reads from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_location: Option<String>,
    /// Location the stage writes to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_location: Option<String>,
    /// Stages whose completion triggers this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub predecessors: Vec<String>,
    /// Stages this one triggers on completion.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub successors: Vec<String>,
    /// Free-text description carried onto the work unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Compute kind.
    #[serde(default)]
    pub kind: WorkUnitKind,
}

impl StageSpec {
    /// Creates a new stage specification.
    #[must_use]
    pub fn new(id: impl Into<String>, work_unit_ref: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            work_unit_ref: work_unit_ref.into(),
            input_location: None,
            output_location: None,
            predecessors: Vec::new(),
            successors: Vec::new(),
            description: None,
            kind: WorkUnitKind::default(),
        }
    }

    /// Sets the input location.
    #[must_use]
    pub fn reads(mut self, location: impl Into<String>) -> Self {
        self.input_location = Some(location.into());
        self
    }

    /// Sets the output location.
    #[must_use]
    pub fn writes(mut self, location: impl Into<String>) -> Self {
        self.output_location = Some(location.into());
        self
    }

    /// Adds an explicit predecessor.
    #[must_use]
    pub fn with_predecessor(mut self, stage: impl Into<String>) -> Self {
        self.predecessors.push(stage.into());
        self
    }

    /// Adds an explicit successor.
    #[must_use]
    pub fn with_successor(mut self, stage: impl Into<String>) -> Self {
        self.successors.push(stage.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the compute kind.
    #[must_use]
    pub fn with_kind(mut self, kind: WorkUnitKind) -> Self {
        self.kind = kind;
        self
    }

    /// Returns true if the stage declares explicit links.
    #[must_use]
    pub fn has_explicit_links(&self) -> bool {
        !self.predecessors.is_empty() || !self.successors.is_empty()
    }
}

/// Specification for an entire pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSpec {
    /// The pipeline name.
    pub name: String,
    /// Stages in declaration order.
    #[serde(default)]
    pub stages: Vec<StageSpec>,
    /// How stages are chained at runtime.
    #[serde(default)]
    pub orchestration: Orchestration,
    /// Recurrence expression for the pipeline trigger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    /// Allows more than one source or sink stage.
    #[serde(default)]
    pub branching: bool,
    /// Per-location policy overrides.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub locations: BTreeMap<String, LocationOverride>,
}

impl PipelineSpec {
    /// Creates a new, empty pipeline specification.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            orchestration: Orchestration::default(),
            schedule: None,
            branching: false,
            locations: BTreeMap::new(),
        }
    }

    /// Appends a stage.
    #[must_use]
    pub fn with_stage(mut self, stage: StageSpec) -> Self {
        self.stages.push(stage);
        self
    }

    /// Sets the orchestration mode.
    #[must_use]
    pub fn with_orchestration(mut self, orchestration: Orchestration) -> Self {
        self.orchestration = orchestration;
        self
    }

    /// Sets the schedule expression.
    #[must_use]
    pub fn with_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    /// Declares the pipeline as branching.
    #[must_use]
    pub fn branching(mut self) -> Self {
        self.branching = true;
        self
    }

    /// Adds a policy override for a location.
    #[must_use]
    pub fn with_location_override(
        mut self,
        location: impl Into<String>,
        policy: LocationOverride,
    ) -> Self {
        self.locations.insert(location.into(), policy);
        self
    }

    /// Parses a specification from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, TopologyError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a specification file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TopologyError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serializes the specification as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, TopologyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reconstructs a specification from a materialized topology.
    ///
    /// Stages come back in the topology's work-unit order, locations from the
    /// `source_bucket` / `destination_bucket` entries, links from the edge set
    /// (as explicit successors) and location policies pinned to what was
    /// materialized. Compiling the result yields the same grants.
    #[must_use]
    pub fn from_topology(topology: &Topology) -> Self {
        let mut spec = Self::new(&topology.name).with_orchestration(topology.orchestration);
        spec.branching = topology.branching;
        spec.schedule = topology.trigger.as_ref().map(|t| t.schedule.clone());

        for unit in &topology.work_units {
            let mut stage = StageSpec::new(&unit.id, &unit.runtime_ref);
            stage.input_location = unit.source_location().map(str::to_string);
            stage.output_location = unit.destination_location().map(str::to_string);
            stage.description = unit.description.clone();
            stage.kind = match &unit.settings {
                WorkUnitSettings::Function { runtime, handler } => WorkUnitKind::Function {
                    runtime: Some(runtime.clone()),
                    handler: Some(handler.clone()),
                },
                WorkUnitSettings::Container {
                    cpu,
                    memory_mib,
                    desired_count,
                } => WorkUnitKind::Container {
                    cpu: Some(*cpu),
                    memory_mib: Some(*memory_mib),
                    desired_count: Some(*desired_count),
                },
            };
            stage.successors = topology
                .edges
                .iter()
                .filter(|edge| edge.from == unit.id)
                .map(|edge| edge.to.clone())
                .collect();
            spec.stages.push(stage);
        }

        for location in &topology.locations {
            spec.locations
                .insert(location.id.clone(), LocationOverride::pinned(location.policy));
        }

        spec
    }
}
