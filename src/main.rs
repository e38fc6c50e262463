use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use gtfs_structures::{Gtfs, GtfsReader};
use log::info;

use raptor_eval::network::Timestamp;
use raptor_eval::query::DEFAULT_SEED;
use raptor_eval::{
    generate_random_queries, run_benchmark, utils, BoundedMcRaptor, Csa, McRaptor, Network, NetworkBuilder, Raptor,
    ReportWriter, SavingsAnalysis, SavingsConfig,
};

#[derive(Parser)]
#[command(name = "raptor-eval")]
#[command(about = "Benchmarks public transit journey planners and measures walking savings of bounded Pareto sets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run random queries through one engine and report the average number of journeys
    Benchmark {
        #[command(flatten)]
        network: NetworkArgs,
        #[arg(long, value_enum, default_value_t = Engine::Raptor)]
        engine: Engine,
        /// Number of random queries
        #[arg(long)]
        queries: usize,
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,
        /// Only used by the bounded engine
        #[arg(long, default_value_t = 1.)]
        arrival_slack: f64,
        /// Only used by the bounded engine
        #[arg(long, default_value_t = 1.)]
        trip_slack: f64,
    },
    /// Compute the walking savings of bounded McRAPTOR over RAPTOR for a grid of slacks
    Savings {
        #[command(flatten)]
        network: NetworkArgs,
        /// Number of random queries per slack configuration
        #[arg(long)]
        queries: usize,
        /// Tab-separated report file
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,
        /// Descending savings thresholds, comma separated
        #[arg(long, value_delimiter = ',')]
        thresholds: Vec<f64>,
        /// Comma separated
        #[arg(long, value_delimiter = ',')]
        arrival_slacks: Vec<f64>,
        /// Comma separated
        #[arg(long, value_delimiter = ',')]
        trip_slacks: Vec<f64>,
    },
    /// Print the Pareto set of a single journey between two named stops
    Query {
        #[command(flatten)]
        network: NetworkArgs,
        /// Name (or name prefix) of the start stop
        #[arg(long)]
        from: String,
        /// Name (or name prefix) of the destination stop
        #[arg(long)]
        to: String,
        /// Departure time (HH:MM:SS)
        #[arg(long)]
        time: String,
    },
}

#[derive(Args)]
struct NetworkArgs {
    /// GTFS zip file or directory
    #[arg(long)]
    gtfs: PathBuf,
    /// Service date (YYYY-MM-DD)
    #[arg(long)]
    date: NaiveDate,
    /// Minimum transfer time in seconds
    #[arg(long, default_value_t = 3 * 60)]
    transfer_time: Timestamp,
    /// Longest generated footpath in seconds
    #[arg(long, default_value_t = 5 * 60)]
    max_walking_time: Timestamp,
    /// Walking speed in metres per second
    #[arg(long, default_value_t = 1.4)]
    walking_speed: f64,
}

#[derive(Clone, Copy, ValueEnum)]
enum Engine {
    Raptor,
    McRaptor,
    BoundedMcRaptor,
    Csa,
}

fn load_gtfs(path: &Path) -> Result<Gtfs, Box<dyn std::error::Error>> {
    // On large networks GTFS parsing can overflow the stack, so we increase the stack size for this call.
    const GTFS_STACK_SIZE: usize = 8 * 1024 * 1024;
    let path = path.to_string_lossy().into_owned();
    let gtfs = std::thread::Builder::new()
        .stack_size(GTFS_STACK_SIZE)
        .spawn(move || GtfsReader::default().read_shapes(false).read(&path))?
        .join()
        .map_err(|_| "GTFS loading thread panicked")??;
    Ok(gtfs)
}

fn load_network(args: &NetworkArgs) -> Result<Network, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let gtfs = load_gtfs(&args.gtfs)?;
    info!("GTFS loaded in {:.2}s", start.elapsed().as_secs_f64());

    let mut builder = NetworkBuilder::from_gtfs(&gtfs, args.date)?;
    let num_footpaths = builder.generate_footpaths(args.max_walking_time, args.walking_speed);
    info!("Generated {num_footpaths} footpaths.");
    let network = builder.build(args.transfer_time);
    network.print_stats();
    Ok(network)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    match cli.command {
        Commands::Benchmark { network, engine, queries, seed, arrival_slack, trip_slack } => {
            let network = load_network(&network)?;
            let queries = generate_random_queries(network.num_stops(), queries, seed)?;
            let summary = match engine {
                Engine::Raptor => run_benchmark(&mut Raptor::new(&network), &queries)?,
                Engine::McRaptor => run_benchmark(&mut McRaptor::new(&network), &queries)?,
                Engine::BoundedMcRaptor => {
                    let mut planner = BoundedMcRaptor::new(&network);
                    planner.set_slacks(arrival_slack, trip_slack);
                    run_benchmark(&mut planner, &queries)?
                }
                Engine::Csa => run_benchmark(&mut Csa::new(&network), &queries)?,
            };
            println!("{summary}");
        }
        Commands::Savings { network, queries, output, seed, thresholds, arrival_slacks, trip_slacks } => {
            let defaults = SavingsConfig::default();
            let config = SavingsConfig {
                thresholds: if thresholds.is_empty() { defaults.thresholds } else { thresholds },
                arrival_slacks: if arrival_slacks.is_empty() { defaults.arrival_slacks } else { arrival_slacks },
                trip_slacks: if trip_slacks.is_empty() { defaults.trip_slacks } else { trip_slacks },
            };
            // Reject a bad grid or an empty query set before loading the network or creating the output.
            let analysis = SavingsAnalysis::new(config)?;
            SavingsAnalysis::require_queries(queries)?;

            let network = load_network(&network)?;
            let queries = generate_random_queries(network.num_stops(), queries, seed)?;
            let mut report = ReportWriter::create(&output)?;
            let mut planner = BoundedMcRaptor::new(&network);
            let start = Instant::now();
            let rows = analysis.run(&mut planner, &queries, &mut report)?;
            info!("Wrote {} rows to {} in {:.2}s", rows.len(), output.display(), start.elapsed().as_secs_f64());
        }
        Commands::Query { network, from, to, time } => {
            let departure_time = utils::parse_time(&time)?;
            let network = load_network(&network)?;
            let source = network.get_stop_idx_from_name(&from).ok_or_else(|| format!("No stop named {from}"))?;
            let target = network.get_stop_idx_from_name(&to).ok_or_else(|| format!("No stop named {to}"))?;

            println!();
            println!("Start: {} at time {}", network.get_stop(source as usize).name, utils::get_time_str(departure_time));
            println!("End: {}", network.get_stop(target as usize).name);
            println!();

            let mut raptor = Raptor::new(&network);
            raptor.run_query(source, departure_time, target);
            println!("RAPTOR:");
            for label in raptor.anchor_labels() {
                println!("{label}");
            }

            let mut mc_raptor = McRaptor::new(&network);
            mc_raptor.run_query(source, departure_time, target);
            println!("McRAPTOR:");
            let mut labels = mc_raptor.results().to_vec();
            labels.sort_unstable_by_key(|label| (label.number_of_trips, label.arrival_time));
            for label in labels {
                println!("{label}");
            }
        }
    }

    Ok(())
}
