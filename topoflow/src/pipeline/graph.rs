//! Stage graph model.
//!
//! Validates a [`PipelineSpec`] and turns it into an immutable graph of
//! stages indexed by declaration order. Links come from explicit
//! predecessor/successor declarations when any stage has them, and from
//! declaration order otherwise.

use super::{LocationOverride, PipelineSpec, StageSpec, WorkUnitKind};
use crate::core::Orchestration;
use crate::errors::{
    GraphValidationError, CODE_BAD_IDENTIFIER, CODE_DANGLING_LINK, CODE_DEAD_LOCATION,
    CODE_DUPLICATE_STAGE, CODE_EMPTY_NAME, CODE_ENDPOINTS, CODE_NO_STAGES, CODE_SCHEDULE,
};
use crate::utils::{validate_identifier, validate_schedule};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// A validated stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageNode {
    /// Stage id.
    pub id: String,
    /// Opaque work-unit reference.
    pub work_unit_ref: String,
    /// Input location, if any.
    pub input: Option<String>,
    /// Output location, if any.
    pub output: Option<String>,
    /// Compute kind.
    pub kind: WorkUnitKind,
    /// Free-text description.
    pub description: Option<String>,
}

impl StageNode {
    /// A stage without input.
    #[must_use]
    pub fn is_source(&self) -> bool {
        self.input.is_none()
    }

    /// A stage without output.
    #[must_use]
    pub fn is_sink(&self) -> bool {
        self.output.is_none()
    }

    fn from_spec(spec: &StageSpec) -> Self {
        Self {
            id: spec.id.clone(),
            work_unit_ref: spec.work_unit_ref.clone(),
            input: present(spec.input_location.as_ref()),
            output: present(spec.output_location.as_ref()),
            kind: spec.kind.clone(),
            description: spec.description.clone(),
        }
    }
}

/// An empty location reference means "none", matching the work-unit
/// environment contract.
fn present(location: Option<&String>) -> Option<String> {
    location.filter(|l| !l.is_empty()).cloned()
}

/// A directed link between two stages, by declaration index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StageLink {
    /// Index of the upstream stage.
    pub from: usize,
    /// Index of the downstream stage.
    pub to: usize,
}

/// A validated, immutable graph of stages.
#[derive(Debug, Clone)]
pub struct StageGraph {
    name: String,
    orchestration: Orchestration,
    schedule: Option<String>,
    branching: bool,
    stages: Vec<StageNode>,
    index: HashMap<String, usize>,
    links: Vec<StageLink>,
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
    explicit_links: bool,
    location_overrides: BTreeMap<String, LocationOverride>,
}

impl StageGraph {
    /// Validates a pipeline specification and builds its stage graph.
    ///
    /// # Errors
    ///
    /// Returns a [`GraphValidationError`] for a blank name, no stages,
    /// malformed identifiers, duplicate stage ids, dangling links, extra
    /// sources or sinks without branching, policy overrides for
    /// unreferenced locations, or an invalid schedule.
    pub fn build(spec: &PipelineSpec) -> Result<Self, GraphValidationError> {
        if spec.name.trim().is_empty() {
            return Err(GraphValidationError::new(
                CODE_EMPTY_NAME,
                "Pipeline name cannot be empty or whitespace-only",
            ));
        }

        if spec.stages.is_empty() {
            return Err(GraphValidationError::new(
                CODE_NO_STAGES,
                format!("Pipeline '{}' has no stages", spec.name),
            ));
        }

        let stages: Vec<StageNode> = spec.stages.iter().map(StageNode::from_spec).collect();
        check_identifiers(&stages)?;
        let index = index_stages(&stages)?;
        let explicit_links = spec.stages.iter().any(StageSpec::has_explicit_links);
        let links = resolve_links(&spec.stages, &index, explicit_links)?;

        if !spec.branching {
            check_endpoints(&spec.name, &stages)?;
        }
        check_overrides(&stages, &spec.locations)?;

        if let Some(schedule) = &spec.schedule {
            validate_schedule(schedule).map_err(|err| {
                GraphValidationError::new(CODE_SCHEDULE, err.to_string())
            })?;
        }

        let mut successors = vec![Vec::new(); stages.len()];
        let mut predecessors = vec![Vec::new(); stages.len()];
        for link in &links {
            successors[link.from].push(link.to);
            predecessors[link.to].push(link.from);
        }

        tracing::debug!(
            pipeline = %spec.name,
            stages = stages.len(),
            links = links.len(),
            explicit_links,
            "Stage graph built"
        );

        Ok(Self {
            name: spec.name.clone(),
            orchestration: spec.orchestration,
            schedule: spec.schedule.as_ref().map(|s| s.trim().to_string()),
            branching: spec.branching,
            stages,
            index,
            links,
            successors,
            predecessors,
            explicit_links,
            location_overrides: spec.locations.clone(),
        })
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the requested orchestration mode.
    #[must_use]
    pub fn orchestration(&self) -> Orchestration {
        self.orchestration
    }

    /// Returns the schedule expression, if any.
    #[must_use]
    pub fn schedule(&self) -> Option<&str> {
        self.schedule.as_deref()
    }

    /// Whether extra sources and sinks are allowed.
    #[must_use]
    pub fn is_branching(&self) -> bool {
        self.branching
    }

    /// Returns the stages in declaration order.
    #[must_use]
    pub fn stages(&self) -> &[StageNode] {
        &self.stages
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Looks up a stage by id.
    #[must_use]
    pub fn stage(&self, id: &str) -> Option<&StageNode> {
        self.index.get(id).map(|&i| &self.stages[i])
    }

    /// Declaration index of a stage.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Links sorted by (source index, target index).
    #[must_use]
    pub fn links(&self) -> &[StageLink] {
        &self.links
    }

    /// Whether links came from explicit declarations.
    #[must_use]
    pub fn has_explicit_links(&self) -> bool {
        self.explicit_links
    }

    /// Downstream stage indices, in declaration order.
    #[must_use]
    pub fn successors(&self, index: usize) -> &[usize] {
        &self.successors[index]
    }

    /// Upstream stage indices, in declaration order.
    #[must_use]
    pub fn predecessors(&self, index: usize) -> &[usize] {
        &self.predecessors[index]
    }

    /// Per-location policy overrides.
    #[must_use]
    pub fn location_overrides(&self) -> &BTreeMap<String, LocationOverride> {
        &self.location_overrides
    }
}

fn check_identifiers(stages: &[StageNode]) -> Result<(), GraphValidationError> {
    for stage in stages {
        validate_identifier("stage", &stage.id).map_err(|err| {
            GraphValidationError::new(CODE_BAD_IDENTIFIER, err.to_string())
                .with_stages(vec![stage.id.clone()])
        })?;

        for location in stage.input.iter().chain(stage.output.iter()) {
            validate_identifier("location", location).map_err(|err| {
                GraphValidationError::new(CODE_BAD_IDENTIFIER, err.to_string())
                    .with_stages(vec![stage.id.clone()])
                    .with_locations(vec![location.clone()])
            })?;
        }
    }
    Ok(())
}

fn index_stages(stages: &[StageNode]) -> Result<HashMap<String, usize>, GraphValidationError> {
    let mut index = HashMap::with_capacity(stages.len());
    for (i, stage) in stages.iter().enumerate() {
        if index.insert(stage.id.clone(), i).is_some() {
            return Err(GraphValidationError::new(
                CODE_DUPLICATE_STAGE,
                format!("Stage '{}' is declared more than once", stage.id),
            )
            .with_stages(vec![stage.id.clone()]));
        }
    }
    Ok(index)
}

fn resolve_links(
    specs: &[StageSpec],
    index: &HashMap<String, usize>,
    explicit: bool,
) -> Result<Vec<StageLink>, GraphValidationError> {
    if !explicit {
        return Ok((1..specs.len())
            .map(|to| StageLink { from: to - 1, to })
            .collect());
    }

    let lookup = |stage: &StageSpec, other: &str, relation: &str| {
        index.get(other).copied().ok_or_else(|| {
            GraphValidationError::new(
                CODE_DANGLING_LINK,
                format!(
                    "Stage '{}' names unknown {} '{}'",
                    stage.id, relation, other
                ),
            )
            .with_stages(vec![stage.id.clone(), other.to_string()])
        })
    };

    let mut links = BTreeSet::new();
    for (i, stage) in specs.iter().enumerate() {
        for successor in &stage.successors {
            let to = lookup(stage, successor, "successor")?;
            links.insert(StageLink { from: i, to });
        }
        for predecessor in &stage.predecessors {
            let from = lookup(stage, predecessor, "predecessor")?;
            links.insert(StageLink { from, to: i });
        }
    }
    Ok(links.into_iter().collect())
}

fn check_endpoints(name: &str, stages: &[StageNode]) -> Result<(), GraphValidationError> {
    let sources: Vec<String> = stages
        .iter()
        .filter(|s| s.is_source())
        .map(|s| s.id.clone())
        .collect();
    let sinks: Vec<String> = stages
        .iter()
        .filter(|s| s.is_sink())
        .map(|s| s.id.clone())
        .collect();

    if sources.len() <= 1 && sinks.len() <= 1 {
        return Ok(());
    }

    let mut offending: Vec<String> = Vec::new();
    if sources.len() > 1 {
        offending.extend(sources.iter().cloned());
    }
    if sinks.len() > 1 {
        for sink in &sinks {
            if !offending.contains(sink) {
                offending.push(sink.clone());
            }
        }
    }

    Err(GraphValidationError::new(
        CODE_ENDPOINTS,
        format!(
            "Pipeline '{name}' has {} source(s) [{}] and {} sink(s) [{}] but does not declare branching",
            sources.len(),
            sources.join(", "),
            sinks.len(),
            sinks.join(", "),
        ),
    )
    .with_stages(offending))
}

fn check_overrides(
    stages: &[StageNode],
    overrides: &BTreeMap<String, LocationOverride>,
) -> Result<(), GraphValidationError> {
    let referenced: HashSet<&str> = stages
        .iter()
        .flat_map(|s| s.input.iter().chain(s.output.iter()))
        .map(String::as_str)
        .collect();

    let dead: Vec<String> = overrides
        .keys()
        .filter(|name| !referenced.contains(name.as_str()))
        .cloned()
        .collect();

    if dead.is_empty() {
        Ok(())
    } else {
        Err(GraphValidationError::new(
            CODE_DEAD_LOCATION,
            format!(
                "Policy given for location(s) no stage references: {}",
                dead.join(", ")
            ),
        )
        .with_locations(dead))
    }
}
