//! Resource materializer.
//!
//! Turns a [`StageGraph`] into concrete storage locations, work units and
//! the storage grants each work unit needs. Locations are single-producer,
//! multi-consumer: a second writer is a [`WriteConflictError`].

use super::{StageGraph, StageNode, WorkUnitKind};
use crate::config::CompilerConfig;
use crate::core::{
    AccessMode, Grant, GrantResource, Location, WorkUnit, WorkUnitSettings,
    ENV_DESTINATION_BUCKET, ENV_SOURCE_BUCKET,
};
use crate::errors::WriteConflictError;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Locations, work units and storage grants for one pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedResources {
    /// One location per distinct name, in order of first reference.
    pub locations: Vec<Location>,
    /// One work unit per stage, in declaration order.
    pub work_units: Vec<WorkUnit>,
    /// One grant per (work unit, location) pair, in order of first request.
    pub grants: Vec<Grant>,
    /// Stage indices reading each location, in declaration order.
    pub consumers: BTreeMap<String, Vec<usize>>,
    /// The stage index writing each location.
    pub producers: BTreeMap<String, usize>,
}

/// Allocates resources for a stage graph.
#[derive(Debug, Clone, Copy)]
pub struct ResourceMaterializer<'a> {
    config: &'a CompilerConfig,
}

impl<'a> ResourceMaterializer<'a> {
    /// Creates a materializer using the given configuration defaults.
    #[must_use]
    pub fn new(config: &'a CompilerConfig) -> Self {
        Self { config }
    }

    /// Materializes the graph.
    ///
    /// # Errors
    ///
    /// Returns a [`WriteConflictError`] if two stages write the same location.
    pub fn materialize(&self, graph: &StageGraph) -> Result<MaterializedResources, WriteConflictError> {
        let mut location_order: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut consumers: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut producers: BTreeMap<String, usize> = BTreeMap::new();
        let mut requests = GrantRequests::default();

        for (i, stage) in graph.stages().iter().enumerate() {
            if let Some(input) = &stage.input {
                note_location(&mut location_order, &mut seen, input);
                consumers.entry(input.clone()).or_default().push(i);
                requests.request(&stage.id, input, AccessMode::Read);
            }

            if let Some(output) = &stage.output {
                note_location(&mut location_order, &mut seen, output);
                if let Some(&writer) = producers.get(output) {
                    let writers = vec![graph.stages()[writer].id.clone(), stage.id.clone()];
                    tracing::debug!(location = %output, ?writers, "Write conflict");
                    return Err(WriteConflictError::new(output.clone(), writers));
                }
                producers.insert(output.clone(), i);
                requests.request(&stage.id, output, AccessMode::Write);
            }
        }

        for location in &location_order {
            match (producers.contains_key(location), consumers.contains_key(location)) {
                (false, _) => tracing::warn!(
                    pipeline = %graph.name(),
                    location = %location,
                    "Location is read but no stage writes it; expecting an external feed"
                ),
                (true, false) => tracing::warn!(
                    pipeline = %graph.name(),
                    location = %location,
                    "Location is written but no stage reads it"
                ),
                (true, true) => {}
            }
        }

        let locations = location_order
            .into_iter()
            .map(|id| {
                let policy = graph
                    .location_overrides()
                    .get(&id)
                    .map_or(self.config.locations, |o| o.apply(self.config.locations));
                Location { id, policy }
            })
            .collect();

        let work_units = graph
            .stages()
            .iter()
            .map(|stage| self.work_unit(stage))
            .collect();

        Ok(MaterializedResources {
            locations,
            work_units,
            grants: requests.into_grants(),
            consumers,
            producers,
        })
    }

    fn work_unit(&self, stage: &StageNode) -> WorkUnit {
        let settings = match &stage.kind {
            WorkUnitKind::Function { runtime, handler } => WorkUnitSettings::Function {
                runtime: runtime
                    .clone()
                    .unwrap_or_else(|| self.config.function.runtime.clone()),
                handler: handler
                    .clone()
                    .unwrap_or_else(|| self.config.function.handler.clone()),
            },
            WorkUnitKind::Container {
                cpu,
                memory_mib,
                desired_count,
            } => WorkUnitSettings::Container {
                cpu: cpu.unwrap_or(self.config.container.cpu),
                memory_mib: memory_mib.unwrap_or(self.config.container.memory_mib),
                desired_count: desired_count.unwrap_or(self.config.container.desired_count),
            },
        };

        let env_vars = BTreeMap::from([
            (
                ENV_SOURCE_BUCKET.to_string(),
                stage.input.clone().unwrap_or_default(),
            ),
            (
                ENV_DESTINATION_BUCKET.to_string(),
                stage.output.clone().unwrap_or_default(),
            ),
        ]);

        WorkUnit {
            id: stage.id.clone(),
            runtime_ref: stage.work_unit_ref.clone(),
            settings,
            env_vars,
            description: stage.description.clone(),
        }
    }
}

fn note_location(order: &mut Vec<String>, seen: &mut HashSet<String>, location: &str) {
    if seen.insert(location.to_string()) {
        order.push(location.to_string());
    }
}

/// Accumulates requested access per (principal, location), merging modes.
#[derive(Debug, Default)]
struct GrantRequests {
    order: Vec<(String, String)>,
    modes: HashMap<(String, String), AccessMode>,
}

impl GrantRequests {
    fn request(&mut self, principal: &str, location: &str, mode: AccessMode) {
        let key = (principal.to_string(), location.to_string());
        match self.modes.get_mut(&key) {
            Some(existing) => *existing |= mode,
            None => {
                self.order.push(key.clone());
                self.modes.insert(key, mode);
            }
        }
    }

    fn into_grants(mut self) -> Vec<Grant> {
        self.order
            .into_iter()
            .filter_map(|key| {
                let mode = self.modes.remove(&key)?;
                let (principal, location) = key;
                Some(Grant {
                    principal,
                    resource: GrantResource::Location(location),
                    mode: mode.into(),
                })
            })
            .collect()
    }
}
