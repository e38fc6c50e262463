use raptor_eval::network::{Coordinates, StopIndex, Timestamp, TripStop};
use raptor_eval::query::DEFAULT_SEED;
use raptor_eval::{generate_random_queries, utils, Network, NetworkBuilder, Query};

// Common example data for the integration tests and benchmarks.

/// Stops per side of the example grid.
pub const GRID_SIZE: usize = 6;

// Roughly 300 metres between neighbouring intersections, around the latitude of Melbourne.
const ORIGIN: Coordinates = Coordinates { latitude: -37.80, longitude: 144.95 };
const LATITUDE_STEP: f64 = 0.0027;
const LONGITUDE_STEP: f64 = 0.0034;
// The two platforms of an intersection are about 60 metres apart.
const PLATFORM_OFFSET: f64 = 0.0007;

const FIRST_DEPARTURE: Timestamp = 5 * 3600;
const LAST_DEPARTURE: Timestamp = 24 * 3600;
const HEADWAY: Timestamp = 10 * 60;
const TIME_BETWEEN_STOPS: Timestamp = 2 * 60;

pub fn get_example_transfer_time() -> Timestamp {
    2 * 60 // 2 minutes transfer time.
}

// Long enough to change platforms, too short to walk to the next intersection.
// This keeps the footpaths transitively closed.
pub fn get_example_max_walking_time() -> Timestamp {
    2 * 60
}

pub fn get_example_walking_speed() -> f64 {
    1.4
}

#[derive(Clone, Copy)]
enum Platform {
    Horizontal,
    Vertical,
}

fn stop_at(row: usize, col: usize, platform: Platform) -> StopIndex {
    let offset = match platform {
        Platform::Horizontal => 0,
        Platform::Vertical => GRID_SIZE * GRID_SIZE,
    };
    (offset + row * GRID_SIZE + col) as StopIndex
}

fn add_line(builder: &mut NetworkBuilder, line: &str, stops: &[StopIndex], offset: Timestamp) {
    let mut first_departure = FIRST_DEPARTURE + offset;
    while first_departure < LAST_DEPARTURE {
        let trip: Vec<TripStop> = stops
            .iter()
            .enumerate()
            .map(|(i, &stop)| {
                let time = first_departure + i as Timestamp * TIME_BETWEEN_STOPS;
                TripStop { stop, arrival_time: time, departure_time: time }
            })
            .collect();
        // Trips built here are always valid.
        builder.add_trip(line, &trip).unwrap();
        first_departure += HEADWAY;
    }
}

/// A `GRID_SIZE` x `GRID_SIZE` grid of intersections, with a line along every row and column in
/// both directions. Row lines and column lines stop at separate platforms, joined by a footpath.
pub fn build_example_network() -> Network {
    let mut builder = NetworkBuilder::new();
    for (platform, prefix, shift) in [(Platform::Horizontal, "H", 0.), (Platform::Vertical, "V", PLATFORM_OFFSET)] {
        for row in 0..GRID_SIZE {
            for col in 0..GRID_SIZE {
                let location = Coordinates {
                    latitude: ORIGIN.latitude + row as f64 * LATITUDE_STEP,
                    longitude: ORIGIN.longitude + col as f64 * LONGITUDE_STEP + shift,
                };
                let idx = builder.add_stop(&format!("{prefix}{row}-{col}"), &format!("Grid {prefix}{row}-{col}"), Some(location));
                debug_assert_eq!(idx, stop_at(row, col, platform));
            }
        }
    }

    for i in 0..GRID_SIZE {
        // Stagger the lines so that transfers need some waiting.
        let offset = (i as Timestamp * 3 % 10) * 60;
        let mut row: Vec<StopIndex> = (0..GRID_SIZE).map(|col| stop_at(i, col, Platform::Horizontal)).collect();
        let mut col: Vec<StopIndex> = (0..GRID_SIZE).map(|row| stop_at(row, i, Platform::Vertical)).collect();
        add_line(&mut builder, &format!("E{i}"), &row, offset);
        add_line(&mut builder, &format!("S{i}"), &col, offset + 60);
        row.reverse();
        col.reverse();
        add_line(&mut builder, &format!("W{i}"), &row, offset + 120);
        add_line(&mut builder, &format!("N{i}"), &col, offset + 180);
    }

    builder.generate_footpaths(get_example_max_walking_time(), get_example_walking_speed());
    builder.build(get_example_transfer_time())
}

pub fn get_example_start_time() -> Timestamp {
    utils::parse_time("08:30:00").unwrap()
}

pub fn get_example_start_stop_idx(network: &Network) -> StopIndex {
    network.get_stop_idx_from_name("Grid H0-0").unwrap()
}

pub fn get_example_end_stop_idx(network: &Network) -> StopIndex {
    network.get_stop_idx_from_name(&format!("Grid V{}-{}", GRID_SIZE - 1, GRID_SIZE - 1)).unwrap()
}

pub fn get_example_scenario() -> (Network, StopIndex, Timestamp, StopIndex) {
    let network = build_example_network();
    let start = get_example_start_stop_idx(&network);
    let start_time = get_example_start_time();
    let end = get_example_end_stop_idx(&network);
    (network, start, start_time, end)
}

pub fn get_example_queries(network: &Network, query_count: usize) -> Vec<Query> {
    generate_random_queries(network.num_stops(), query_count, DEFAULT_SEED).unwrap()
}
