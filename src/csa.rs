use crate::journey::ArrivalLabel;
use crate::network::{Network, StopIndex, Timestamp};
use crate::planner::JourneyPlanner;
use crate::profiler::{AggregateProfiler, Metric, Phase, Profiler};
use crate::query::Query;

#[derive(Clone, Copy)]
struct TauEntry {
    // Earliest arrival time at the stop.
    time: Timestamp,
    number_of_trips: u8,
    // Earliest time a trip can be boarded at the stop. Arrivals by trip need the transfer time first,
    // walking straight from the source does not, so this can come from a later arrival than `time`.
    ready_time: Timestamp,
    ready_trips: u8,
}

impl Default for TauEntry {
    fn default() -> Self {
        Self {
            time: Timestamp::MAX,
            number_of_trips: 0,
            ready_time: Timestamp::MAX,
            ready_trips: 0,
        }
    }
}

impl TauEntry {
    // Returns true if the arrival time improved.
    fn update(&mut self, time: Timestamp, ready_time: Timestamp, number_of_trips: u8) -> bool {
        if ready_time < self.ready_time {
            self.ready_time = ready_time;
            self.ready_trips = number_of_trips;
        }
        if time < self.time {
            self.time = time;
            self.number_of_trips = number_of_trips;
            true
        } else {
            false
        }
    }
}

/// Connection scan algorithm (CSA) for earliest arrival queries.
pub struct Csa<'a, P: Profiler = AggregateProfiler> {
    network: &'a Network,
    profiler: P,
    tau: Vec<TauEntry>,
    // Number of trips after boarding each trip, or None if the trip has not been reached.
    trip_reached: Vec<Option<u8>>,
    result: Option<ArrivalLabel>,
}

impl<'a> Csa<'a> {
    pub fn new(network: &'a Network) -> Self {
        Self::with_profiler(network, AggregateProfiler::new())
    }
}

impl<'a, P: Profiler> Csa<'a, P> {
    pub fn with_profiler(network: &'a Network, profiler: P) -> Self {
        Self {
            network,
            profiler,
            tau: vec![TauEntry::default(); network.num_stops()],
            trip_reached: vec![None; network.num_trips],
            result: None,
        }
    }

    pub fn result(&self) -> Option<ArrivalLabel> {
        self.result
    }

    /// # Panics
    /// If `source` or `target` is not a stop of the network.
    pub fn run_query(&mut self, source: StopIndex, departure_time: Timestamp, target: StopIndex) {
        self.profiler.start_query();
        self.tau.fill(TauEntry::default());
        self.trip_reached.fill(None);

        let network = self.network;
        let source = source as usize;
        let target = target as usize;

        // Walking from the source does not need a transfer buffer before boarding.
        self.tau[source].update(departure_time, departure_time, 0);
        self.profiler.start_phase();
        for footpath in network.get_footpaths(source) {
            self.profiler.count(Metric::FootpathsRelaxed);
            let time = departure_time.saturating_add(footpath.duration);
            self.tau[footpath.target as usize].update(time, time, 0);
        }
        self.profiler.done_phase(Phase::InitialTransfers);

        // Start Criterion Optimisation: Binary search start connection.
        let start_connection = network.connections.partition_point(|connection| connection.departure_time < departure_time);
        self.profiler.start_phase();

        for connection in &network.connections[start_connection..] {
            if connection.departure_time >= self.tau[target].time {
                break;
            }
            self.profiler.count(Metric::ConnectionsScanned);

            let trip_idx = connection.trip as usize;
            let departure_idx = connection.departure_idx as usize;
            let number_of_trips = match self.trip_reached[trip_idx] {
                Some(number_of_trips) => number_of_trips,
                None => {
                    if self.tau[departure_idx].ready_time > connection.departure_time {
                        // Unreachable.
                        continue;
                    }
                    let number_of_trips = self.tau[departure_idx].ready_trips.saturating_add(1);
                    self.trip_reached[trip_idx] = Some(number_of_trips);
                    number_of_trips
                }
            };

            let arrival_idx = connection.arrival_idx as usize;
            let arrival_time = connection.arrival_time;
            let ready_time = arrival_time.saturating_add(network.transfer_times[arrival_idx]);
            if self.tau[arrival_idx].update(arrival_time, ready_time, number_of_trips) {
                for footpath in network.get_footpaths(arrival_idx) {
                    self.profiler.count(Metric::FootpathsRelaxed);
                    let walk_target = footpath.target as usize;
                    let time = arrival_time.saturating_add(footpath.duration);
                    let ready_time = time.saturating_add(network.transfer_times[walk_target]);
                    self.tau[walk_target].update(time, ready_time, number_of_trips);
                }
            }
        }
        self.profiler.done_phase(Phase::ScanConnections);

        let entry = self.tau[target];
        self.result = (entry.time != Timestamp::MAX).then_some(ArrivalLabel {
            arrival_time: entry.time,
            number_of_trips: entry.number_of_trips,
        });
        self.profiler.done_query();
    }
}

impl<P: Profiler> JourneyPlanner for Csa<'_, P> {
    type Profiler = P;

    fn run(&mut self, query: &Query) {
        self.run_query(query.source, query.departure_time, query.target);
    }

    fn num_journeys(&self) -> usize {
        self.result.iter().count()
    }

    fn profiler(&self) -> &P {
        &self.profiler
    }
}
