//! End-to-end tests for topology compilation.

#[cfg(test)]
mod tests {
    use crate::core::{
        EdgeKind, GrantMode, GrantResource, Orchestration, TriggerTarget, ENV_DESTINATION_BUCKET,
        ENV_SOURCE_BUCKET,
    };
    use crate::errors::TopologyError;
    use crate::events::{self, CollectingEventSink};
    use crate::pipeline::{PipelineSpec, StageSpec, TopologyCompiler};
    use crate::testing::{
        assert_grant, assert_invocation_grant_count, assert_no_grant, assert_storage_grant_count,
        linear_pipeline, six_stage_pipeline, REFERENCE_SCHEDULE,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn location(id: &str) -> GrantResource {
        GrantResource::Location(id.to_string())
    }

    fn unit(id: &str) -> GrantResource {
        GrantResource::WorkUnit(id.to_string())
    }

    #[test]
    fn test_six_stage_push() {
        let topology = TopologyCompiler::default()
            .compile(&six_stage_pipeline(Orchestration::Push))
            .unwrap();

        assert_eq!(topology.work_units.len(), 6);
        let locations: Vec<&str> = topology.locations.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(locations, vec!["source", "raw", "staging", "curated"]);

        assert_storage_grant_count(&topology, 8);
        assert_invocation_grant_count(&topology, 5);
        assert!(topology.grants[..8].iter().all(|g| g.is_storage()));

        assert_grant(&topology, "fetch", &location("source"), GrantMode::Write);
        assert_grant(&topology, "validate", &location("source"), GrantMode::Read);
        assert_grant(&topology, "validate", &location("raw"), GrantMode::Write);
        assert_grant(&topology, "load", &location("curated"), GrantMode::Read);
        assert_no_grant(&topology, "qualitycheck", &location("staging"));

        for (from, to) in [
            ("fetch", "validate"),
            ("validate", "transform"),
            ("transform", "qualitycheck"),
            ("qualitycheck", "cdc"),
            ("cdc", "load"),
        ] {
            assert_grant(&topology, from, &unit(to), GrantMode::Invoke);
        }
        assert_no_grant(&topology, "load", &unit("fetch"));

        assert!(topology.edges.iter().all(|e| e.kind == EdgeKind::Push));
        assert!(topology.plan.is_none());
        assert!(topology.trigger.is_none());
    }

    #[test]
    fn test_six_stage_scheduled_sequence() {
        let push = TopologyCompiler::default()
            .compile(&six_stage_pipeline(Orchestration::Push))
            .unwrap();
        let topology = TopologyCompiler::default()
            .compile(&six_stage_pipeline(Orchestration::ScheduledSequence))
            .unwrap();

        assert_eq!(topology.locations, push.locations);
        assert_eq!(
            topology.storage_grants().collect::<Vec<_>>(),
            push.storage_grants().collect::<Vec<_>>()
        );
        assert_invocation_grant_count(&topology, 0);

        let plan = topology.plan.as_ref().unwrap();
        assert_eq!(
            plan.stage_ids(),
            vec!["fetch", "validate", "transform", "qualitycheck", "cdc", "load"]
        );
        assert_eq!(plan.checkpoint_count(), 6);
        assert_eq!(plan.entry, vec!["fetch".to_string()]);

        let checkpoints: Vec<&str> = plan
            .steps
            .iter()
            .map(|s| s.checkpoint.name.as_str())
            .collect();
        assert_eq!(
            checkpoints,
            vec![
                "data_arrived_in_source",
                "data_arrived_in_raw",
                "data_arrived_in_staging",
                "qualitycheck_completed",
                "data_arrived_in_curated",
                "load_completed",
            ]
        );

        let trigger = topology.trigger.as_ref().unwrap();
        assert_eq!(trigger.schedule, REFERENCE_SCHEDULE);
        assert_eq!(
            trigger.target,
            TriggerTarget::Plan {
                name: "etl".to_string()
            }
        );
    }

    #[test]
    fn test_two_writers_on_one_location() {
        let spec = PipelineSpec::new("clash")
            .with_stage(StageSpec::new("a", "src/a").writes("staging"))
            .with_stage(StageSpec::new("b", "src/b").reads("raw").writes("staging"))
            .with_stage(StageSpec::new("c", "src/c").reads("staging"));

        let err = TopologyCompiler::default().compile(&spec).unwrap_err();
        match err {
            TopologyError::WriteConflict(conflict) => {
                assert_eq!(conflict.location, "staging");
                assert_eq!(conflict.writers, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected a write conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_mutual_successors_form_a_cycle() {
        let spec = PipelineSpec::new("loop")
            .with_stage(StageSpec::new("A", "src/a").writes("a_out").with_successor("B"))
            .with_stage(StageSpec::new("B", "src/b").reads("a_out").with_successor("A"));

        for orchestration in [Orchestration::Push, Orchestration::ScheduledSequence] {
            let err = TopologyCompiler::default()
                .compile(&spec.clone().with_orchestration(orchestration))
                .unwrap_err();
            match err {
                TopologyError::CyclicGraph(cycle) => {
                    assert_eq!(cycle.cycle_path, vec!["A", "B", "A"]);
                }
                other => panic!("expected a cycle, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_locations_and_grants_deduplicated() {
        let spec = PipelineSpec::new("fan")
            .branching()
            .with_stage(StageSpec::new("fetch", "src/f").writes("raw"))
            .with_stage(StageSpec::new("compact", "src/c").reads("raw").writes("raw2"))
            .with_stage(StageSpec::new("rewrite", "src/r").reads("raw2").writes("raw2"));

        let err = TopologyCompiler::default().compile(&spec).unwrap_err();
        assert!(matches!(err, TopologyError::WriteConflict(_)));

        let spec = PipelineSpec::new("fan")
            .branching()
            .with_stage(StageSpec::new("fetch", "src/f").writes("raw"))
            .with_stage(StageSpec::new("audit", "src/a").reads("raw"))
            .with_stage(StageSpec::new("compact", "src/c").reads("raw").writes("raw2"))
            .with_stage(StageSpec::new("inplace", "src/i").reads("lake").writes("lake"));

        let topology = TopologyCompiler::default().compile(&spec).unwrap();
        let ids: Vec<&str> = topology.locations.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["raw", "raw2", "lake"]);

        let on_lake: Vec<_> = topology
            .storage_grants()
            .filter(|g| g.resource == location("lake"))
            .collect();
        assert_eq!(on_lake.len(), 1);
        assert_eq!(on_lake[0].mode, GrantMode::ReadWrite);

        let mut pairs: Vec<(&str, &str)> = topology
            .storage_grants()
            .map(|g| (g.principal.as_str(), g.resource.id()))
            .collect();
        let total = pairs.len();
        pairs.sort_unstable();
        pairs.dedup();
        assert_eq!(pairs.len(), total);
    }

    #[test]
    fn test_work_unit_env_contract() {
        let topology = TopologyCompiler::default()
            .compile(&six_stage_pipeline(Orchestration::Push))
            .unwrap();

        for unit in &topology.work_units {
            assert_eq!(unit.env_vars.len(), 2, "unit {}", unit.id);
            assert!(unit.env_vars.contains_key(ENV_SOURCE_BUCKET));
            assert!(unit.env_vars.contains_key(ENV_DESTINATION_BUCKET));
        }

        let gate = topology.work_unit("qualitycheck").unwrap();
        assert_eq!(gate.source_location(), None);
        assert_eq!(gate.destination_location(), None);
    }

    #[test]
    fn test_round_trip_through_topology() {
        for orchestration in [Orchestration::Push, Orchestration::ScheduledSequence] {
            let compiler = TopologyCompiler::default();
            let first = compiler.compile(&six_stage_pipeline(orchestration)).unwrap();

            let rebuilt = PipelineSpec::from_topology(&first);
            let second = compiler.compile(&rebuilt).unwrap();

            assert_eq!(second.grants, first.grants);
            assert_eq!(second, first);
        }
    }

    #[test]
    fn test_round_trip_explicit_diamond_with_schedule() {
        let spec = |orchestration| {
            PipelineSpec::new("diamond")
                .branching()
                .with_orchestration(orchestration)
                .with_schedule("rate(1 hour)")
                .with_stage(
                    StageSpec::new("merge", "src/merge")
                        .reads("left_out")
                        .with_predecessor("left")
                        .with_predecessor("right"),
                )
                .with_stage(
                    StageSpec::new("left", "src/left")
                        .reads("raw")
                        .writes("left_out")
                        .with_predecessor("fetch"),
                )
                .with_stage(
                    StageSpec::new("right", "src/right")
                        .reads("raw")
                        .writes("right_out")
                        .with_predecessor("fetch"),
                )
                .with_stage(StageSpec::new("fetch", "src/fetch").writes("raw"))
        };

        for orchestration in [Orchestration::Push, Orchestration::ScheduledSequence] {
            let compiler = TopologyCompiler::default();
            let first = compiler.compile(&spec(orchestration)).unwrap();
            assert_eq!(first.edges.len(), 4);
            assert!(first.trigger.is_some());

            let rebuilt = PipelineSpec::from_topology(&first);
            assert_eq!(rebuilt.schedule.as_deref(), Some("rate(1 hour)"));
            let second = compiler.compile(&rebuilt).unwrap();

            assert_eq!(second.edges, first.edges);
            assert_eq!(second.grants, first.grants);
            assert_eq!(second.plan, first.plan);
            assert_eq!(second.trigger, first.trigger);
            assert_eq!(second, first);
        }
    }

    #[test]
    fn test_long_chain_compiles() {
        let stages = 50_000;
        let compiler = TopologyCompiler::default();

        let scheduled = compiler
            .compile(&linear_pipeline(stages, Orchestration::ScheduledSequence))
            .unwrap();
        let plan = scheduled.plan.as_ref().unwrap();
        assert_eq!(plan.steps.len(), stages);
        assert_eq!(plan.entry, vec!["stage0".to_string()]);
        assert_eq!(plan.steps[stages - 1].stage, "stage49999");
        assert_eq!(scheduled.locations.len(), stages - 1);

        let push = compiler
            .compile(&linear_pipeline(stages, Orchestration::Push))
            .unwrap();
        assert_invocation_grant_count(&push, stages - 1);
        assert_storage_grant_count(&push, 2 * (stages - 1));
    }

    #[test]
    fn test_same_spec_same_fingerprint() {
        let compiler = TopologyCompiler::default();
        let spec = six_stage_pipeline(Orchestration::ScheduledSequence);

        let a = compiler.compile(&spec).unwrap().fingerprint().unwrap();
        let b = compiler.compile(&spec).unwrap().fingerprint().unwrap();
        assert_eq!(a, b);

        let other = compiler
            .compile(&six_stage_pipeline(Orchestration::Push))
            .unwrap()
            .fingerprint()
            .unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn test_branching_plan_follows_declaration_order() {
        let spec = PipelineSpec::new("fanout")
            .branching()
            .with_orchestration(Orchestration::ScheduledSequence)
            .with_stage(
                StageSpec::new("ingest", "src/i")
                    .writes("landing")
                    .with_successor("profile")
                    .with_successor("archive"),
            )
            .with_stage(StageSpec::new("archive", "src/a").reads("landing"))
            .with_stage(StageSpec::new("profile", "src/p").reads("landing").writes("stats"));

        let topology = TopologyCompiler::default().compile(&spec).unwrap();
        let plan = topology.plan.unwrap();

        assert_eq!(plan.stage_ids(), vec!["ingest", "archive", "profile"]);
        assert_eq!(
            plan.steps[0].next,
            vec!["archive".to_string(), "profile".to_string()]
        );
        assert_eq!(plan.steps[2].checkpoint.location.as_deref(), Some("stats"));
    }

    #[test]
    fn test_push_schedule_triggers_entry_units() {
        let spec = six_stage_pipeline(Orchestration::Push).with_schedule("rate(1 day)");
        let topology = TopologyCompiler::default().compile(&spec).unwrap();

        assert_eq!(
            topology.trigger.unwrap().target,
            TriggerTarget::WorkUnits {
                ids: vec!["fetch".to_string()]
            }
        );
    }

    #[test]
    fn test_events_follow_build_phases() {
        let sink = Arc::new(CollectingEventSink::new());
        let compiler = TopologyCompiler::default().with_event_sink(sink.clone());

        compiler
            .compile(&six_stage_pipeline(Orchestration::Push))
            .unwrap();
        let completed = sink.events_of_type(events::BUILD_COMPLETED);
        assert_eq!(completed.len(), 1);
        let payload = completed[0].1.clone().unwrap();
        assert_eq!(payload["pipeline.name"], "etl");
        assert_eq!(payload["topology.grants"], "13");

        sink.clear();
        let spec = PipelineSpec::new("loop")
            .with_stage(StageSpec::new("A", "src/a").writes("x").with_successor("B"))
            .with_stage(StageSpec::new("B", "src/b").reads("x").with_successor("A"));
        assert!(compiler.compile(&spec).is_err());

        assert_eq!(
            sink.event_types(),
            vec![
                events::BUILD_STARTED,
                events::GRAPH_BUILT,
                events::MATERIALIZED,
                events::BUILD_FAILED,
            ]
        );
        let failed = sink.events_of_type(events::BUILD_FAILED);
        assert_eq!(failed[0].1.as_ref().unwrap()["code"], "TOPO-003-CYCLE");
    }
}
