//! The materialized topology handed to the external deployment engine.

use super::{EdgeKind, GrantMode, Orchestration};
use crate::config::LocationPolicy;
use crate::errors::TopologyError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Environment key naming the location a work unit reads from.
pub const ENV_SOURCE_BUCKET: &str = "source_bucket";
/// Environment key naming the location a work unit writes to.
pub const ENV_DESTINATION_BUCKET: &str = "destination_bucket";

/// A durable storage tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Location identifier.
    pub id: String,
    /// Retention and teardown policy.
    #[serde(flatten)]
    pub policy: LocationPolicy,
}

/// Kind-specific settings of a work unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkUnitSettings {
    /// A serverless function.
    Function {
        /// Runtime identifier.
        runtime: String,
        /// Entrypoint.
        handler: String,
    },
    /// A container service.
    #[serde(rename_all = "camelCase")]
    Container {
        /// CPU units.
        cpu: u32,
        /// Memory limit in MiB.
        memory_mib: u32,
        /// Number of tasks kept running.
        desired_count: u32,
    },
}

/// The compute unit executed for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkUnit {
    /// Work unit identifier (the stage id).
    pub id: String,
    /// Opaque reference to the code or container.
    pub runtime_ref: String,
    /// Kind-specific settings.
    pub settings: WorkUnitSettings,
    /// Declared configuration: `source_bucket` and `destination_bucket`.
    pub env_vars: BTreeMap<String, String>,
    /// Free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl WorkUnit {
    /// The location this unit reads from, if any.
    #[must_use]
    pub fn source_location(&self) -> Option<&str> {
        self.env_vars
            .get(ENV_SOURCE_BUCKET)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// The location this unit writes to, if any.
    #[must_use]
    pub fn destination_location(&self) -> Option<&str> {
        self.env_vars
            .get(ENV_DESTINATION_BUCKET)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// What a grant authorizes access to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "kebab-case")]
pub enum GrantResource {
    /// A storage location.
    Location(String),
    /// Another work unit.
    WorkUnit(String),
}

impl GrantResource {
    /// The referenced identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Location(id) | Self::WorkUnit(id) => id,
        }
    }
}

/// A permission edge from a work unit to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    /// The work unit receiving the permission.
    pub principal: String,
    /// The resource the permission applies to.
    pub resource: GrantResource,
    /// The permission.
    pub mode: GrantMode,
}

impl Grant {
    /// Returns true for grants on storage locations.
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(self.resource, GrantResource::Location(_))
    }
}

/// "Completion of `from` may trigger start of `to`."
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Source stage.
    pub from: String,
    /// Target stage.
    pub to: String,
    /// How the edge is realized.
    pub kind: EdgeKind,
}

/// A named no-op recording where the pipeline's data now resides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Marker name.
    pub name: String,
    /// Location the data was written to, if the stage writes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// One step of a scheduled plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    /// The stage executed.
    pub stage: String,
    /// The work unit invoked by the workflow engine.
    pub work_unit: String,
    /// Marker entered once the stage succeeds.
    pub checkpoint: Checkpoint,
    /// Successor stages in declaration order. Empty for a terminal step.
    #[serde(default)]
    pub next: Vec<String>,
}

/// The ordered, possibly branching plan held by the workflow engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Plan name.
    pub name: String,
    /// Stages the engine starts with, in declaration order.
    pub entry: Vec<String>,
    /// Steps in topological order.
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Stage ids in plan order.
    #[must_use]
    pub fn stage_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.stage.as_str()).collect()
    }

    /// Number of checkpoints (one per step).
    #[must_use]
    pub fn checkpoint_count(&self) -> usize {
        self.steps.len()
    }
}

/// What a recurring trigger starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TriggerTarget {
    /// The scheduled plan.
    Plan {
        /// Plan name.
        name: String,
    },
    /// Entry work units, invoked directly.
    WorkUnits {
        /// Work unit ids.
        ids: Vec<String>,
    },
}

/// A time-based recurring trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    /// Schedule expression.
    pub schedule: String,
    /// What the trigger starts.
    pub target: TriggerTarget,
}

/// A fully materialized pipeline topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    /// Pipeline name.
    pub name: String,
    /// Orchestration mode the topology was wired for.
    pub orchestration: Orchestration,
    /// Whether multiple sources/sinks were allowed.
    #[serde(default)]
    pub branching: bool,
    /// Storage locations in order of first reference.
    pub locations: Vec<Location>,
    /// Work units in stage declaration order.
    pub work_units: Vec<WorkUnit>,
    /// Storage grants followed by invocation grants.
    pub grants: Vec<Grant>,
    /// Stage edges.
    pub edges: Vec<Edge>,
    /// Scheduled plan (scheduled-sequence only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    /// Recurring trigger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,
}

impl Topology {
    /// Finds a location by id.
    #[must_use]
    pub fn location(&self, id: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.id == id)
    }

    /// Finds a work unit by id.
    #[must_use]
    pub fn work_unit(&self, id: &str) -> Option<&WorkUnit> {
        self.work_units.iter().find(|w| w.id == id)
    }

    /// Grants on storage locations.
    pub fn storage_grants(&self) -> impl Iterator<Item = &Grant> {
        self.grants.iter().filter(|g| g.is_storage())
    }

    /// Grants allowing one work unit to invoke another.
    pub fn invocation_grants(&self) -> impl Iterator<Item = &Grant> {
        self.grants.iter().filter(|g| !g.is_storage())
    }

    /// Looks up the grant a principal holds on a resource.
    #[must_use]
    pub fn grant(&self, principal: &str, resource: &GrantResource) -> Option<&Grant> {
        self.grants
            .iter()
            .find(|g| g.principal == principal && &g.resource == resource)
    }

    /// Serializes the topology as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, TopologyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Stable SHA-256 digest of the topology's canonical JSON form.
    ///
    /// Two builds of the same specification always produce the same
    /// fingerprint; any change to locations, units, grants, edges, plan or
    /// trigger changes it.
    pub fn fingerprint(&self) -> Result<String, TopologyError> {
        let canonical = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        Ok(hex::encode(hasher.finalize()))
    }
}
