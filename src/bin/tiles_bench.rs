use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tiles_bench::benches;
use tiles_bench::dataset::InputFill;
use tiles_bench::harness::{
    BenchConfig, CalibrationConfig, MonotonicClock, DEFAULT_COLLISION_TABLE_SIZE,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MIN_SECONDS,
};
use tiles_bench::scenario::{BenchmarkScenario, DEFAULT_SCENARIOS};
use tiles_bench::schema::{RunMeta, TilesBenchReport};
use tiles_bench::tiles::DEFAULT_MEMORY_SIZE;
use tiles_bench::{Layout, TableMode};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    /// One line per scenario.
    Text,
    /// A single JSON report.
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "tiles-bench")]
#[command(about = "Self-calibrating ns-per-call benchmark for the tile coder")]
struct Args {
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// How input vectors are filled.
    #[arg(long, value_enum, default_value_t = InputFill::Random)]
    input_fill: InputFill,

    /// Minimum duration of the final timed batch, in seconds.
    #[arg(long, default_value_t = DEFAULT_MIN_SECONDS)]
    min_seconds: f64,

    /// Give up calibrating a scenario after this many attempts.
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    max_attempts: u32,

    /// Size of the index space in modulo and indexed modes.
    #[arg(long, default_value_t = DEFAULT_MEMORY_SIZE)]
    memory_size: usize,

    #[arg(long, value_enum, default_value_t = TableMode::Modulo)]
    table_mode: TableMode,

    /// Which input dimensions are tiled together.
    #[arg(long, value_enum, default_value_t = Layout::Joint)]
    layout: Layout,

    /// Collision table size (power of two) in collision mode.
    #[arg(long, default_value_t = DEFAULT_COLLISION_TABLE_SIZE)]
    collision_table_size: usize,

    /// Scenario as NAME:INPUTS:TILINGS. Can be provided multiple times; replaces the defaults.
    #[arg(long, value_name = "SCENARIO", action = clap::ArgAction::Append)]
    scenario: Vec<BenchmarkScenario>,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Where to write the report. If omitted, prints to stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn now_utc_unix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("unix:{secs}")
}

fn git_sha_short() -> Option<String> {
    std::env::var("GIT_SHA")
        .ok()
        .or_else(|| std::env::var("GITHUB_SHA").ok())
        .map(|s| s.chars().take(12).collect())
}

fn input_fill_name(fill: InputFill) -> String {
    fill.to_possible_value()
        .map(|v| v.get_name().to_string())
        .unwrap_or_default()
}

fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    if !(args.min_seconds > 0.0 && args.min_seconds.is_finite()) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "--min-seconds must be a positive number",
        ));
    }

    let cfg = BenchConfig {
        seed: args.seed,
        input_fill: args.input_fill,
        calibration: CalibrationConfig {
            min_seconds: args.min_seconds,
            max_attempts: args.max_attempts,
        },
        memory_size: args.memory_size,
        collision_table_size: args.collision_table_size,
        table_mode: args.table_mode,
        layout: args.layout,
    };
    let scenarios: &[BenchmarkScenario] = if args.scenario.is_empty() {
        DEFAULT_SCENARIOS
    } else {
        &args.scenario
    };

    let mut sink: Box<dyn Write> = match &args.out {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    let clock = MonotonicClock::new();

    match args.format {
        Format::Text => {
            benches::tiles::run(&clock, &cfg, scenarios, &mut sink)?;
        }
        Format::Json => {
            let outcomes = benches::tiles::run(&clock, &cfg, scenarios, &mut io::sink())?;
            let report = TilesBenchReport {
                run: RunMeta {
                    schema_version: 1,
                    bench_version: env!("CARGO_PKG_VERSION").to_string(),
                    seed: cfg.seed,
                    input_fill: input_fill_name(cfg.input_fill),
                    min_seconds: cfg.calibration.min_seconds,
                    max_attempts: cfg.calibration.max_attempts,
                    timestamp_utc: now_utc_unix(),
                    git_sha: git_sha_short(),
                },
                measurements: outcomes.iter().map(|o| o.to_measurement()).collect(),
            };
            let json = serde_json::to_string_pretty(&report).map_err(io::Error::other)?;
            writeln!(sink, "{json}")?;
        }
    }

    sink.flush()
}
