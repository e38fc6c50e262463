use raptor_eval::{utils, Csa, Raptor};

use dev_utils::get_example_scenario;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (network, start, start_time, end) = get_example_scenario();
    network.print_stats();
    println!(
        "{} -> {} at {}",
        network.get_stop(start as usize).name,
        network.get_stop(end as usize).name,
        utils::get_time_str(start_time)
    );

    let mut raptor = Raptor::new(&network);
    raptor.run_query(start, start_time, end);
    println!("RAPTOR:");
    if raptor.anchor_labels().is_empty() {
        println!("No journey found.");
    }
    for label in raptor.anchor_labels() {
        println!("{label}");
    }

    // CSA only answers the earliest arrival.
    let mut csa = Csa::new(&network);
    csa.run_query(start, start_time, end);
    println!("CSA:");
    match csa.result() {
        Some(label) => println!("{label}"),
        None => println!("No journey found."),
    }

    Ok(())
}
