//! Command-line entry point for the injection/bisection bandwidth benchmark.
//!
//! ```text
//! inbibw --size 4m --iters 200 --all
//! inbibw bisection --transport local --ranks 8 --ranks-per-node 4
//! mpiexec -n 64 inbibw --transport mpi --inject
//! inbibw hostfile filter hosts.txt --filter bad_nodes.txt
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info, LevelFilter};

use inbibw::config::DEFAULT_ITERATIONS;
use inbibw::hostfile::{self, DEFAULT_FILTERED, DEFAULT_SORTED};
use inbibw::{
    parse_size, run_suite, Config, ConsoleReporter, JobEnvironment, LocalCluster, Pattern,
    Result, TestSelection, Transport,
};

#[derive(Parser)]
#[command(
    name = "inbibw",
    version,
    about = "Measure injection and bisection bandwidth of a cluster network",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Enable debug log messages
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(flatten)]
    bench: BenchArgs,

    #[command(subcommand)]
    command: Option<CommandArg>,
}

#[derive(clap::Args)]
struct BenchArgs {
    /// Run a single test (same as --inject or --bisection)
    #[arg(value_enum)]
    mode: Option<Mode>,

    /// Message size, with an optional k, m or g suffix (binary multiples)
    #[arg(long, env = "INBIBW_SIZE", default_value = "1m")]
    size: String,

    /// Timed iterations per test
    #[arg(long, env = "INBIBW_ITERS", default_value_t = DEFAULT_ITERATIONS, allow_negative_numbers = true)]
    iters: i64,

    /// Run the injection test
    #[arg(long)]
    inject: bool,

    /// Run the bisection test
    #[arg(long)]
    bisection: bool,

    /// Run both tests (the default when no test is selected)
    #[arg(long)]
    all: bool,

    /// Check received payloads after each test
    #[arg(long)]
    validate: bool,

    /// Message-passing layer to run on
    #[arg(long, value_enum, default_value_t = TransportArg::Local)]
    transport: TransportArg,

    /// Participants of the in-process group
    #[arg(long, default_value_t = 4)]
    ranks: usize,

    /// Participants per emulated node of the in-process group [default: all on one node]
    #[arg(long)]
    ranks_per_node: Option<usize>,
}

#[derive(Subcommand)]
enum CommandArg {
    /// Prepare hostfiles for a launch
    Hostfile {
        #[command(subcommand)]
        action: HostfileAction,
    },
}

#[derive(Subcommand)]
enum HostfileAction {
    /// Write a sorted copy of a hostfile
    Sort {
        /// Hostfile to read
        infile: PathBuf,

        /// Output file; a free name is derived if it exists
        #[arg(short, long, default_value = DEFAULT_SORTED)]
        outfile: PathBuf,
    },
    /// Write a copy of a hostfile without the hosts listed in another file
    Filter {
        /// Hostfile to read
        infile: PathBuf,

        /// Hosts to remove, one per line
        #[arg(short, long)]
        filter: PathBuf,

        /// Output file; a free name is derived if it exists
        #[arg(short, long, default_value = DEFAULT_FILTERED)]
        outfile: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Injection,
    Bisection,
}

impl From<Mode> for Pattern {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Injection => Pattern::Injection,
            Mode::Bisection => Pattern::Bisection,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportArg {
    /// Threads in this process, one per participant
    Local,
    /// MPI processes started by mpiexec/srun
    Mpi,
}

/// Configure the logger level and formating string.
fn setup_logger(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::builder()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .init();
}

fn build_config(args: &BenchArgs) -> Result<Config> {
    let message_size = parse_size(&args.size)?;
    let tests = TestSelection::from_flags(
        args.inject,
        args.bisection,
        args.all,
        args.mode.map(Pattern::from),
    );
    Ok(Config::new(message_size, args.iters, tests)?.with_validation(args.validate))
}

fn log_job_environment() {
    match JobEnvironment::detect() {
        Some(job) => info!("{job}"),
        None => info!("Not running under SLURM"),
    }
}

fn run_local(args: &BenchArgs) -> Result<()> {
    let config = build_config(args)?;
    let cluster = LocalCluster::new(args.ranks, args.ranks_per_node.unwrap_or(args.ranks))?;
    log_job_environment();
    info!(
        "In-process group of {} participants on {} emulated node(s)",
        cluster.size(),
        cluster.node_count()
    );

    cluster.run(|world| {
        let node = world.split_shared()?;
        let mut reporter = ConsoleReporter::stdout();
        run_suite(&world, &node, &config, &mut reporter).map(|_| ())
    })?;
    Ok(())
}

#[cfg(feature = "mpi")]
fn run_mpi(args: &BenchArgs) -> Result<()> {
    use inbibw::mpi::Mpi;

    let mpi = Mpi::init()?;
    let world = mpi.world();
    let coordinator = world.rank() == 0;

    // Every participant parses the same arguments, so a bad one stops the
    // whole job; only the coordinator says why.
    let config = match build_config(args) {
        Ok(config) => config,
        Err(e) => {
            if coordinator {
                error!("{e}");
            }
            world.abort(1)
        }
    };

    if coordinator {
        log_job_environment();
        if let Ok(version) = Mpi::version() {
            info!("{version}");
        }
    }

    let outcome = world.split_shared().and_then(|node| {
        let mut reporter = ConsoleReporter::stdout();
        run_suite(&world, &node, &config, &mut reporter).map(|_| ())
    });
    if let Err(e) = outcome {
        error!("Rank {}: {e}", world.rank());
        world.abort(1)
    }

    drop(world);
    drop(mpi);
    Ok(())
}

#[cfg(not(feature = "mpi"))]
fn run_mpi(_args: &BenchArgs) -> Result<()> {
    Err(inbibw::Error::Configuration(
        "this binary was built without the `mpi` feature; use --transport local".into(),
    ))
}

fn run_hostfile(action: HostfileAction) -> Result<()> {
    let written = match action {
        HostfileAction::Sort { infile, outfile } => hostfile::sort_file(&infile, &outfile)?,
        HostfileAction::Filter {
            infile,
            filter,
            outfile,
        } => hostfile::filter_file(&infile, &filter, &outfile)?,
    };
    println!("{}", written.display());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logger(cli.debug);

    let result = match cli.command {
        Some(CommandArg::Hostfile { action }) => run_hostfile(action),
        None => match cli.bench.transport {
            TransportArg::Local => run_local(&cli.bench),
            TransportArg::Mpi => run_mpi(&cli.bench),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
