//! Reference pipeline specifications.

use crate::core::Orchestration;
use crate::pipeline::{PipelineSpec, StageSpec};

/// Schedule attached to the scheduled variant of the reference pipeline.
pub const REFERENCE_SCHEDULE: &str = "cron(0/15 * * * ? *)";

/// The six-stage ETL reference pipeline.
///
/// `fetch -> validate -> transform -> qualitycheck -> cdc -> load` over the
/// locations `source`, `raw`, `staging` and `curated`. The quality check is
/// a gate: it touches no location, so the pipeline declares branching. The
/// scheduled-sequence variant also carries [`REFERENCE_SCHEDULE`].
#[must_use]
pub fn six_stage_pipeline(orchestration: Orchestration) -> PipelineSpec {
    let spec = PipelineSpec::new("etl")
        .with_orchestration(orchestration)
        .branching()
        .with_stage(
            StageSpec::new("fetch", "src/0_fetch_data")
                .writes("source")
                .with_description("Fetches data from a datasource into the source location"),
        )
        .with_stage(
            StageSpec::new("validate", "src/1_validate_data")
                .reads("source")
                .writes("raw"),
        )
        .with_stage(
            StageSpec::new("transform", "src/2_transform_data")
                .reads("raw")
                .writes("staging"),
        )
        .with_stage(StageSpec::new("qualitycheck", "src/3_quality_check"))
        .with_stage(
            StageSpec::new("cdc", "src/4_calculate_cdc")
                .reads("staging")
                .writes("curated"),
        )
        .with_stage(StageSpec::new("load", "src/5_load_data").reads("curated"));

    match orchestration {
        Orchestration::Push => spec,
        Orchestration::ScheduledSequence => spec.with_schedule(REFERENCE_SCHEDULE),
    }
}

/// A minimal `fetch -> load` pipeline over one location.
#[must_use]
pub fn two_stage_pipeline() -> PipelineSpec {
    PipelineSpec::new("pair")
        .with_stage(StageSpec::new("fetch", "src/fetch").writes("raw"))
        .with_stage(StageSpec::new("load", "src/load").reads("raw"))
}

/// A linear chain of `stages` stages, each handing off through its own
/// location.
#[must_use]
pub fn linear_pipeline(stages: usize, orchestration: Orchestration) -> PipelineSpec {
    let mut spec = PipelineSpec::new(format!("chain-{stages}")).with_orchestration(orchestration);
    for i in 0..stages {
        let mut stage = StageSpec::new(format!("stage{i}"), format!("src/stage{i}"));
        if i > 0 {
            stage = stage.reads(format!("loc{}", i - 1));
        }
        if i + 1 < stages {
            stage = stage.writes(format!("loc{i}"));
        }
        spec = spec.with_stage(stage);
    }
    spec
}
