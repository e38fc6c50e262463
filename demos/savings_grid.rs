use std::io::stdout;

use raptor_eval::{BoundedMcRaptor, ReportWriter, SavingsAnalysis, SavingsConfig};

use dev_utils::{build_example_network, get_example_queries};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let network = build_example_network();
    network.print_stats();
    let queries = get_example_queries(&network, 200);

    let analysis = SavingsAnalysis::new(SavingsConfig::default())?;
    let mut planner = BoundedMcRaptor::new(&network);
    let mut report = ReportWriter::new(stdout().lock());
    analysis.run(&mut planner, &queries, &mut report)?;

    Ok(())
}
