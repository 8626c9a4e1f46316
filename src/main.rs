use anyhow::{Context, Result};
use clap::{builder::PossibleValue, Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use poolbench::{
    device::Device,
    estimate_work,
    report::{JsonReporter, LogReporter, Reporter},
    sweep::{self, SweepKind, PARAM_SWEEPS},
    BenchConfig, BenchRunner, PoolParams, PooledShape, ShapeParams,
};

/// Average pooling throughput benchmark
#[derive(Parser)]
#[command(name = "poolbench", version)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sweep, or all of them
    Run(RunArgs),

    /// List every sweep with its varied parameter and values
    List,

    /// Print pooled shape and estimated work without running anything
    Estimate(EstimateArgs),
}

/// A single sweep, or `all` of them in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunTarget {
    Sweep(SweepKind),
    All,
}

impl RunTarget {
    fn kinds(self) -> Vec<SweepKind> {
        match self {
            RunTarget::Sweep(kind) => vec![kind],
            RunTarget::All => SweepKind::value_variants().to_vec(),
        }
    }
}

impl ValueEnum for RunTarget {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            RunTarget::Sweep(SweepKind::Alexnet),
            RunTarget::Sweep(SweepKind::InputSize),
            RunTarget::Sweep(SweepKind::FilterSize),
            RunTarget::Sweep(SweepKind::ChannelsIn),
            RunTarget::Sweep(SweepKind::BatchSize),
            RunTarget::Sweep(SweepKind::Groups),
            RunTarget::Sweep(SweepKind::NumFilters),
            RunTarget::All,
        ]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        match self {
            RunTarget::Sweep(kind) => kind.to_possible_value(),
            RunTarget::All => Some(PossibleValue::new("all").help("Every sweep in turn")),
        }
    }
}

#[derive(Args)]
struct RunArgs {
    #[arg(value_enum, value_name = "SWEEP", default_value = "input-size")]
    target: RunTarget,

    /// Execution device, defaults to accelerator when ACCELERATOR is set
    #[arg(short, long, value_enum)]
    device: Option<Device>,

    /// Forward passes per trial, defaults to NUM_RUNS or 10
    #[arg(short, long)]
    runs: Option<usize>,

    /// Run one untimed pass before starting the timer
    #[arg(long)]
    exclude_first_call: bool,

    /// Write results as JSON lines to stdout instead of logging them
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct EstimateArgs {
    #[arg(long, default_value_t = 50)]
    batch: usize,
    #[arg(long, default_value_t = 384)]
    channels: usize,
    #[arg(long, default_value_t = 55)]
    height: usize,
    /// Defaults to the height
    #[arg(long)]
    width: Option<usize>,
    #[arg(long, default_value_t = 3)]
    kernel: usize,
    #[arg(long, default_value_t = 0)]
    pad: usize,
    #[arg(long, default_value_t = 1)]
    stride: usize,
    #[arg(long, default_value_t = 256)]
    num_output: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::List => {
            list();
            Ok(())
        }
        Commands::Estimate(args) => estimate(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = BenchConfig::from_env()?;
    if let Some(device) = args.device {
        config.device = device;
    }
    if let Some(runs) = args.runs {
        anyhow::ensure!(runs > 0, "--runs must be positive");
        config.runs = runs;
    }
    config.include_first_call = !args.exclude_first_call;

    info!(
        "device: {}, {} runs per trial, first call {}",
        config.device,
        config.runs,
        if config.include_first_call { "timed" } else { "untimed" }
    );

    let runner = BenchRunner::new(config);
    let mut reporter: Box<dyn Reporter> = if args.json {
        Box::new(JsonReporter::new(std::io::stdout().lock()))
    } else {
        Box::new(LogReporter)
    };

    for kind in args.target.kinds() {
        sweep::run_sweep(&runner, kind.description(), &kind.points(), reporter.as_mut())
            .with_context(|| format!("sweep '{}' aborted", kind.description()))?;
    }

    Ok(())
}

fn list() {
    for sweep in PARAM_SWEEPS.iter() {
        let kind = sweep
            .kind
            .to_possible_value()
            .map(|v| v.get_name().to_owned())
            .unwrap_or_default();
        println!(
            "{kind:<12} {:<20} varies {:<12} over {:?}",
            sweep.description,
            sweep.varies.to_string(),
            sweep.values()
        );
    }
    println!("{:<12} {:<20} five fixed layer shapes", "alexnet", "alexnet");
}

fn estimate(args: EstimateArgs) -> Result<()> {
    anyhow::ensure!(
        args.batch > 0 && args.channels > 0 && args.height > 0 && args.width != Some(0),
        "input dimensions must be positive"
    );
    anyhow::ensure!(
        args.kernel > 0 && args.stride > 0,
        "kernel and stride must be positive"
    );

    let shape = ShapeParams::new(
        args.batch,
        args.channels,
        args.height,
        args.width.unwrap_or(args.height),
    );
    let params = PoolParams::new(args.kernel, args.pad, args.stride, args.num_output);
    let pooled = PooledShape::from_params(&shape, &params);

    println!(
        "input {:?} -> pooled {}x{}, {} gflops",
        shape.dims(),
        pooled.height,
        pooled.width,
        estimate_work(&shape, &params)
    );
    Ok(())
}
