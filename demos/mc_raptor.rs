use raptor_eval::{BoundedMcRaptor, McRaptor};

use dev_utils::get_example_scenario;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (network, start, start_time, end) = get_example_scenario();
    network.print_stats();

    let mut mc_raptor = McRaptor::new(&network);
    mc_raptor.run_query(start, start_time, end);
    println!("Full Pareto set:");
    for label in mc_raptor.results() {
        println!("{label}");
    }

    // Allow journeys up to 20% longer and with 50% more trips than the fastest ones.
    let mut bounded = BoundedMcRaptor::new(&network);
    bounded.run_query(start, start_time, end, 1.2, 1.5);
    println!("Anchors:");
    for label in bounded.anchor_labels() {
        println!("{label}");
    }
    println!("Within slack:");
    for label in bounded.results() {
        let marker = if label.is_anchor_label(bounded.anchor_labels()) { "*" } else { " " };
        println!("{marker} {label}");
    }

    Ok(())
}
