//! Wiring resolver.
//!
//! Derives stage edges from a [`StageGraph`] and realizes them for the chosen
//! orchestration mode: invocation grants between work units for `push`, or a
//! checkpointed plan for the workflow engine for `scheduled-sequence`.
//! Ordering is topological with declaration order as the tie-break, so
//! repeated builds of the same graph always agree.

use super::StageGraph;
use crate::core::{
    Checkpoint, Edge, EdgeKind, Grant, GrantMode, GrantResource, Orchestration, Plan, PlanStep,
    Trigger, TriggerTarget,
};
use crate::errors::CyclicGraphError;
use std::collections::BTreeSet;

/// The resolved wiring of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wiring {
    /// Stage ids in topological order.
    pub order: Vec<String>,
    /// One edge per link.
    pub edges: Vec<Edge>,
    /// Invocation grants (push only).
    pub invocation_grants: Vec<Grant>,
    /// The scheduled plan (scheduled-sequence only).
    pub plan: Option<Plan>,
    /// The recurring trigger, when the pipeline has a schedule.
    pub trigger: Option<Trigger>,
}

/// Resolves edges, ordering and orchestration artifacts.
#[derive(Debug, Clone, Copy, Default)]
pub struct WiringResolver;

impl WiringResolver {
    /// Resolves the wiring of `graph` for `orchestration`.
    ///
    /// # Errors
    ///
    /// Returns a [`CyclicGraphError`] if the links do not form a DAG.
    pub fn resolve(
        graph: &StageGraph,
        orchestration: Orchestration,
    ) -> Result<Wiring, CyclicGraphError> {
        if let Some(cycle) = find_cycle(graph) {
            tracing::debug!(pipeline = %graph.name(), ?cycle, "Cycle in stage links");
            return Err(CyclicGraphError::new(cycle));
        }

        let order = topological_order(graph);
        let stages = graph.stages();
        let kind = EdgeKind::from(orchestration);

        let edges: Vec<Edge> = graph
            .links()
            .iter()
            .map(|link| Edge {
                from: stages[link.from].id.clone(),
                to: stages[link.to].id.clone(),
                kind,
            })
            .collect();

        let entry: Vec<String> = (0..stages.len())
            .filter(|&i| graph.predecessors(i).is_empty())
            .map(|i| stages[i].id.clone())
            .collect();

        let (invocation_grants, plan) = match orchestration {
            Orchestration::Push => {
                let grants = edges
                    .iter()
                    .map(|edge| Grant {
                        principal: edge.from.clone(),
                        resource: GrantResource::WorkUnit(edge.to.clone()),
                        mode: GrantMode::Invoke,
                    })
                    .collect();
                (grants, None)
            }
            Orchestration::ScheduledSequence => {
                (Vec::new(), Some(build_plan(graph, &order, entry.clone())))
            }
        };

        let trigger = graph.schedule().map(|schedule| Trigger {
            schedule: schedule.to_string(),
            target: match orchestration {
                Orchestration::Push => TriggerTarget::WorkUnits { ids: entry },
                Orchestration::ScheduledSequence => TriggerTarget::Plan {
                    name: graph.name().to_string(),
                },
            },
        });

        Ok(Wiring {
            order: order.iter().map(|&i| stages[i].id.clone()).collect(),
            edges,
            invocation_grants,
            plan,
            trigger,
        })
    }
}

/// Name of the marker entered after `stage` succeeds.
#[must_use]
pub fn checkpoint_name(stage: &str, output: Option<&str>) -> String {
    match output {
        Some(location) => format!("data_arrived_in_{location}"),
        None => format!("{stage}_completed"),
    }
}

fn build_plan(graph: &StageGraph, order: &[usize], entry: Vec<String>) -> Plan {
    let stages = graph.stages();
    let steps = order
        .iter()
        .map(|&i| {
            let stage = &stages[i];
            PlanStep {
                stage: stage.id.clone(),
                work_unit: stage.id.clone(),
                checkpoint: Checkpoint {
                    name: checkpoint_name(&stage.id, stage.output.as_deref()),
                    location: stage.output.clone(),
                },
                next: graph
                    .successors(i)
                    .iter()
                    .map(|&j| stages[j].id.clone())
                    .collect(),
            }
        })
        .collect();

    Plan {
        name: graph.name().to_string(),
        entry,
        steps,
    }
}

/// Depth-first search in declaration order; returns the first cycle found
/// as a path whose first and last entries are the same stage.
///
/// Iterative over an explicit stack of `(stage, next successor position)`
/// frames.
fn find_cycle(graph: &StageGraph) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; graph.stage_count()];
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for start in 0..graph.stage_count() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        marks[start] = Mark::InProgress;
        stack.push((start, 0));

        while let Some(frame) = stack.last_mut() {
            let (node, position) = *frame;
            let Some(&next) = graph.successors(node).get(position) else {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            };
            frame.1 += 1;

            match marks[next] {
                Mark::InProgress => {
                    let from = stack.iter().position(|&(n, _)| n == next).unwrap_or(0);
                    let stages = graph.stages();
                    let mut cycle: Vec<String> = stack[from..]
                        .iter()
                        .map(|&(n, _)| stages[n].id.clone())
                        .collect();
                    cycle.push(stages[next].id.clone());
                    return Some(cycle);
                }
                Mark::Unvisited => {
                    marks[next] = Mark::InProgress;
                    stack.push((next, 0));
                }
                Mark::Done => {}
            }
        }
    }
    None
}

/// Kahn's algorithm; the ready set always yields the lowest declaration index.
fn topological_order(graph: &StageGraph) -> Vec<usize> {
    let n = graph.stage_count();
    let mut in_degree = vec![0usize; n];
    for link in graph.links() {
        in_degree[link.to] += 1;
    }

    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(node) = ready.pop_first() {
        order.push(node);
        for &next in graph.successors(node) {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.insert(next);
            }
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{PipelineSpec, StageSpec};

    fn diamond() -> PipelineSpec {
        PipelineSpec::new("diamond")
            .branching()
            .with_stage(StageSpec::new("fetch", "src/f").writes("raw").with_successor("left").with_successor("right"))
            .with_stage(StageSpec::new("right", "src/r").reads("raw").writes("r_out").with_successor("merge"))
            .with_stage(StageSpec::new("left", "src/l").reads("raw").writes("l_out").with_successor("merge"))
            .with_stage(StageSpec::new("merge", "src/m").reads("l_out"))
    }

    #[test]
    fn test_topological_order_uses_declaration_tie_break() {
        let graph = StageGraph::build(&diamond()).unwrap();
        let wiring = WiringResolver::resolve(&graph, Orchestration::Push).unwrap();
        assert_eq!(wiring.order, vec!["fetch", "right", "left", "merge"]);
    }

    #[test]
    fn test_order_respects_links_declared_backwards() {
        let spec = PipelineSpec::new("backwards")
            .with_stage(StageSpec::new("load", "src/l").reads("x").with_predecessor("fetch"))
            .with_stage(StageSpec::new("fetch", "src/f").writes("x"));

        let graph = StageGraph::build(&spec).unwrap();
        let wiring = WiringResolver::resolve(&graph, Orchestration::ScheduledSequence).unwrap();
        assert_eq!(wiring.order, vec!["fetch", "load"]);
        assert_eq!(wiring.plan.unwrap().entry, vec!["fetch".to_string()]);
    }

    #[test]
    fn test_push_emits_invoke_grants() {
        let graph = StageGraph::build(&diamond()).unwrap();
        let wiring = WiringResolver::resolve(&graph, Orchestration::Push).unwrap();

        assert_eq!(wiring.edges.len(), 4);
        assert!(wiring.edges.iter().all(|e| e.kind == EdgeKind::Push));
        assert_eq!(wiring.invocation_grants.len(), 4);
        assert_eq!(
            wiring.invocation_grants[0],
            Grant {
                principal: "fetch".to_string(),
                resource: GrantResource::WorkUnit("right".to_string()),
                mode: GrantMode::Invoke,
            }
        );
        assert!(wiring.plan.is_none());
    }

    #[test]
    fn test_scheduled_sequence_plan_branches_in_declaration_order() {
        let graph = StageGraph::build(&diamond()).unwrap();
        let wiring = WiringResolver::resolve(&graph, Orchestration::ScheduledSequence).unwrap();

        assert!(wiring.invocation_grants.is_empty());
        let plan = wiring.plan.unwrap();
        assert_eq!(plan.steps[0].next, vec!["right".to_string(), "left".to_string()]);
        assert_eq!(plan.steps[0].checkpoint.name, "data_arrived_in_raw");
        assert_eq!(plan.steps[3].checkpoint.name, "merge_completed");
        assert_eq!(plan.steps[3].checkpoint.location, None);
        assert!(plan.steps[3].next.is_empty());
    }

    #[test]
    fn test_two_stage_cycle() {
        let spec = PipelineSpec::new("loop")
            .with_stage(StageSpec::new("a", "src/a").writes("x").with_successor("b"))
            .with_stage(StageSpec::new("b", "src/b").reads("x").with_successor("a"));

        let graph = StageGraph::build(&spec).unwrap();
        let err = WiringResolver::resolve(&graph, Orchestration::Push).unwrap_err();
        assert_eq!(err.cycle_path, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_self_link_is_a_cycle() {
        let spec = PipelineSpec::new("self")
            .with_stage(StageSpec::new("a", "src/a").reads("x").writes("x").with_successor("a"));

        let graph = StageGraph::build(&spec).unwrap();
        let err = WiringResolver::resolve(&graph, Orchestration::ScheduledSequence).unwrap_err();
        assert_eq!(err.cycle_path, vec!["a", "a"]);
    }

    #[test]
    fn test_long_cycle_reports_full_path() {
        let n = 50_000;
        let mut spec = PipelineSpec::new("ring").branching();
        for i in 0..n {
            let next = format!("stage{}", (i + 1) % n);
            spec = spec.with_stage(StageSpec::new(format!("stage{i}"), "src/s").with_successor(next));
        }

        let graph = StageGraph::build(&spec).unwrap();
        let err = WiringResolver::resolve(&graph, Orchestration::Push).unwrap_err();
        assert_eq!(err.cycle_path.len(), n + 1);
        assert_eq!(err.cycle_path[0], "stage0");
        assert_eq!(err.cycle_path[1], "stage1");
        assert_eq!(err.cycle_path[n], "stage0");
    }

    #[test]
    fn test_trigger_targets() {
        let spec = diamond().with_schedule("rate(1 hour)");
        let graph = StageGraph::build(&spec).unwrap();

        let push = WiringResolver::resolve(&graph, Orchestration::Push).unwrap();
        assert_eq!(
            push.trigger.unwrap().target,
            TriggerTarget::WorkUnits {
                ids: vec!["fetch".to_string()]
            }
        );

        let scheduled = WiringResolver::resolve(&graph, Orchestration::ScheduledSequence).unwrap();
        let trigger = scheduled.trigger.unwrap();
        assert_eq!(trigger.schedule, "rate(1 hour)");
        assert_eq!(
            trigger.target,
            TriggerTarget::Plan {
                name: "diamond".to_string()
            }
        );
    }

    #[test]
    fn test_checkpoint_name() {
        assert_eq!(checkpoint_name("fetch", Some("source")), "data_arrived_in_source");
        assert_eq!(checkpoint_name("load", None), "load_completed");
    }
}
