use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use topoflow::config::CompilerConfig;
use topoflow::core::{Orchestration, Topology};
use topoflow::errors::TopologyError;
use topoflow::events::LoggingEventSink;
use topoflow::observability::{init_tracing, LogFormat};
use topoflow::pipeline::{PipelineSpec, TopologyCompiler};
use topoflow::testing::six_stage_pipeline;

#[derive(Parser, Debug)]
#[command(name = "topoflow")]
#[command(about = "Compiles pipeline descriptions into deployable topologies")]
#[command(version)]
struct Cli {
    /// Log output format (filter with TOPOFLOW_LOG).
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Pretty)]
    log_format: LogFormatArg,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a pipeline specification into a topology document.
    Compile(CompileArgs),
    /// Check that a pipeline specification compiles.
    Validate(SpecArgs),
    /// Print resource counts and the topology fingerprint.
    Summary(SpecArgs),
    /// Print the six-stage reference pipeline specification.
    Example(ExampleArgs),
}

#[derive(clap::Args, Debug)]
struct SpecArgs {
    /// Pipeline specification (JSON).
    #[arg(long)]
    spec: PathBuf,
    /// Compiler configuration (JSON).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct CompileArgs {
    #[command(flatten)]
    input: SpecArgs,
    /// Write the topology here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Emit single-line JSON.
    #[arg(long)]
    compact: bool,
}

#[derive(clap::Args, Debug)]
struct ExampleArgs {
    #[arg(long, value_enum, default_value_t = OrchestrationArg::Push)]
    orchestration: OrchestrationArg,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OrchestrationArg {
    Push,
    ScheduledSequence,
}

impl From<OrchestrationArg> for Orchestration {
    fn from(arg: OrchestrationArg) -> Self {
        match arg {
            OrchestrationArg::Push => Self::Push,
            OrchestrationArg::ScheduledSequence => Self::ScheduledSequence,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format.into());

    let result = match cli.command {
        Commands::Compile(args) => compile_command(&args),
        Commands::Validate(args) => validate_command(&args),
        Commands::Summary(args) => summary_command(&args),
        Commands::Example(args) => example_command(&args),
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}

fn compile_command(args: &CompileArgs) -> Result<ExitCode> {
    let topology = compile_spec(&args.input)?;

    let mut document = if args.compact {
        serde_json::to_string(&topology)?
    } else {
        serde_json::to_string_pretty(&topology)?
    };
    document.push('\n');

    match &args.out {
        Some(path) => {
            std::fs::write(path, document)
                .with_context(|| format!("failed to write topology to {}", path.display()))?;
            tracing::info!(path = %path.display(), "Topology written");
        }
        None => print!("{document}"),
    }
    Ok(ExitCode::SUCCESS)
}

fn validate_command(args: &SpecArgs) -> Result<ExitCode> {
    let spec = load_spec(&args.spec)?;
    let compiler = load_compiler(args.config.as_deref())?;

    match compiler.compile(&spec) {
        Ok(topology) => {
            println!(
                "ok: '{}' ({}) compiles to {} work units, {} locations, {} grants",
                topology.name,
                topology.orchestration,
                topology.work_units.len(),
                topology.locations.len(),
                topology.grants.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            println!("invalid: {}", describe_failure(&err));
            Ok(ExitCode::from(1))
        }
    }
}

fn summary_command(args: &SpecArgs) -> Result<ExitCode> {
    let topology = compile_spec(args)?;
    let fingerprint = topology.fingerprint()?;

    println!("pipeline:          {}", topology.name);
    println!("orchestration:     {}", topology.orchestration);
    println!("locations:         {}", topology.locations.len());
    println!("work units:        {}", topology.work_units.len());
    println!("storage grants:    {}", topology.storage_grants().count());
    println!("invocation grants: {}", topology.invocation_grants().count());
    println!(
        "plan steps:        {}",
        topology.plan.as_ref().map_or(0, |plan| plan.steps.len())
    );
    println!("fingerprint:       {fingerprint}");
    Ok(ExitCode::SUCCESS)
}

fn example_command(args: &ExampleArgs) -> Result<ExitCode> {
    let spec = six_stage_pipeline(args.orchestration.into());
    println!("{}", spec.to_json_pretty()?);
    Ok(ExitCode::SUCCESS)
}

fn compile_spec(args: &SpecArgs) -> Result<Topology> {
    let spec = load_spec(&args.spec)?;
    let compiler = load_compiler(args.config.as_deref())?;
    compiler
        .compile(&spec)
        .map_err(|err| anyhow::anyhow!(describe_failure(&err)))
        .with_context(|| format!("failed to compile {}", args.spec.display()))
}

fn load_spec(path: &Path) -> Result<PipelineSpec> {
    PipelineSpec::from_path(path)
        .with_context(|| format!("failed to read pipeline spec {}", path.display()))
}

fn load_compiler(config: Option<&Path>) -> Result<TopologyCompiler> {
    let config = match config {
        Some(path) => CompilerConfig::from_path(path)
            .with_context(|| format!("failed to read compiler config {}", path.display()))?,
        None => CompilerConfig::default(),
    };
    Ok(TopologyCompiler::new(config).with_event_sink(Arc::new(LoggingEventSink::debug())))
}

fn describe_failure(err: &TopologyError) -> String {
    let mut text = match err.code() {
        Some(code) => format!("[{code}] {err}"),
        None => err.to_string(),
    };
    if let Some(hint) = err.error_info().and_then(|info| info.fix_hint.as_deref()) {
        if !hint.is_empty() {
            text.push_str(" (hint: ");
            text.push_str(hint);
            text.push(')');
        }
    }
    text
}
