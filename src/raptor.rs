use arrayvec::ArrayVec;

use crate::journey::ArrivalLabel;
use crate::network::{Network, StopIndex, Timestamp};
use crate::planner::JourneyPlanner;
use crate::profiler::{AggregateProfiler, Metric, Phase, Profiler};
use crate::query::Query;
use crate::utils;

/// Number of rounds, including the walking-only round 0. At most `MAX_ROUNDS - 1` trips per journey.
pub const MAX_ROUNDS: usize = 8;

// Buffers for round-based earliest-arrival search. Reused across queries.
pub(crate) struct RaptorSearch<'a> {
    network: &'a Network,
    // τ[p][i] = earliest known arrival time at stop p with up to i trips.
    tau: Vec<[Timestamp; MAX_ROUNDS]>,
    // τ*[p] = earliest known arrival time at stop p.
    tau_star: Vec<Timestamp>,
    // Array for recording which stops have been marked in the current round.
    marked_stops: Vec<bool>,
    // The equivalent of the set Q in the paper.
    earliest_stop_for_route: Vec<Option<usize>>,
    footpath_sources: Vec<usize>,
    anchor_labels: ArrayVec<ArrivalLabel, MAX_ROUNDS>,
}

impl<'a> RaptorSearch<'a> {
    pub(crate) fn new(network: &'a Network) -> Self {
        let num_stops = network.num_stops();
        Self {
            network,
            tau: vec![[Timestamp::MAX; MAX_ROUNDS]; num_stops],
            tau_star: vec![Timestamp::MAX; num_stops],
            marked_stops: vec![false; num_stops],
            earliest_stop_for_route: vec![None; network.num_routes()],
            footpath_sources: Vec::new(),
            anchor_labels: ArrayVec::new(),
        }
    }

    pub(crate) fn anchor_labels(&self) -> &[ArrivalLabel] {
        &self.anchor_labels
    }

    pub(crate) fn earliest_arrival(&self) -> Option<Timestamp> {
        self.anchor_labels.last().map(|label| label.arrival_time)
    }

    fn clear(&mut self) {
        self.tau.fill([Timestamp::MAX; MAX_ROUNDS]);
        self.tau_star.fill(Timestamp::MAX);
        self.marked_stops.fill(false);
        self.anchor_labels.clear();
    }

    pub(crate) fn run<P: Profiler>(&mut self, profiler: &mut P, source: StopIndex, departure_time: Timestamp, target: StopIndex) {
        self.clear();
        let source = source as usize;
        let target = target as usize;

        // Set initial departure time from start station.
        self.tau[source][0] = departure_time;
        self.tau_star[source] = departure_time;
        self.marked_stops[source] = true;
        profiler.start_phase();
        self.relax_footpaths(profiler, 0, target);
        profiler.done_phase(Phase::InitialTransfers);
        self.collect_anchor_label(0, target);

        for k in 1..MAX_ROUNDS {
            profiler.count(Metric::Rounds);

            // Stage 1: arrival times carry over from the previous round.
            for tau in self.tau.iter_mut() {
                tau[k] = tau[k - 1];
            }

            profiler.start_phase();
            self.collect_routes();
            profiler.done_phase(Phase::CollectRoutes);
            profiler.start_phase();
            self.scan_routes(profiler, k, target);
            profiler.done_phase(Phase::ScanRoutes);
            profiler.start_phase();
            self.relax_footpaths(profiler, k, target);
            profiler.done_phase(Phase::IntermediateTransfers);
            self.collect_anchor_label(k, target);

            if utils::is_zero(&self.marked_stops) {
                break;
            }
        }
    }

    // A round only produces an anchor if it strictly improves the arrival at the target.
    fn collect_anchor_label(&mut self, k: usize, target: usize) {
        let arrival_time = self.tau[target][k];
        if arrival_time != Timestamp::MAX && self.earliest_arrival().map_or(true, |best| arrival_time < best) {
            self.anchor_labels.push(ArrivalLabel { arrival_time, number_of_trips: k as u8 });
        }
    }

    // Find the earliest marked stop of every route serving a marked stop, then unmark all stops.
    fn collect_routes(&mut self) {
        let network = self.network;
        self.earliest_stop_for_route.fill(None);
        for marked_stop in self.marked_stops
            .iter()
            .enumerate()
            .filter_map(|(i, &marked)| if marked { Some(i) } else { None })
        {
            for &route_idx in network.stops[marked_stop].get_routes(&network.stop_routes) {
                let route_idx = route_idx as usize;
                let route = &network.routes[route_idx];
                let earliest_stop_in_route_order =
                    self.earliest_stop_for_route[route_idx].unwrap_or(route.num_stops as usize);

                for (stop_order, &route_stop) in route.get_stops(&network.route_stops).iter().enumerate() {
                    if stop_order >= earliest_stop_in_route_order {
                        break;
                    }
                    if route_stop as usize == marked_stop {
                        // Update the earliest touched stop for route.
                        self.earliest_stop_for_route[route_idx] = Some(stop_order);
                        break;
                    }
                }
            }
        }
        self.marked_stops.fill(false);
    }

    fn scan_routes<P: Profiler>(&mut self, profiler: &mut P, k: usize, target: usize) {
        let network = self.network;
        for (route_idx, earliest_stop_order) in self.earliest_stop_for_route
            .iter()
            .enumerate()
            .filter_map(|(i, stop)| stop.map(|s| (i, s)))
        {
            profiler.count(Metric::RoutesScanned);
            let route = &network.routes[route_idx];

            // The trip we are currently on, if any.
            let mut boarded_trip: Option<usize> = None;
            for (stop_order, &stop_idx) in route
                .get_stops(&network.route_stops)
                .iter()
                .enumerate()
                .skip(earliest_stop_order)
            {
                let stop_idx = stop_idx as usize;

                // Can the arrival time at this stop be improved in this round?
                let mut current_departure_time = None;
                if let Some(trip_idx) = boarded_trip {
                    let trip = route.get_trip(trip_idx, &network.stop_times);
                    let arrival_time = trip[stop_order].arrival_time;
                    current_departure_time = Some(trip[stop_order].departure_time);
                    if arrival_time < self.tau_star[stop_idx].min(self.tau_star[target]) {
                        self.tau[stop_idx][k] = arrival_time;
                        self.tau_star[stop_idx] = arrival_time;
                        self.marked_stops[stop_idx] = true;
                    }
                }

                // NOTE: Why is this after the code to update this stop?
                // Because there are two cases where we update the current trip:
                // 1. This is the first stop in the trip. The stop was therefore set by the previous round.
                // 2. This is a subsequent stop in the trip, where another route has reached it faster. Similarly, it has already been updated to the fastest time.

                // Ignore transfer time for first round.
                let transfer_time = if k > 1 { network.transfer_times[stop_idx] } else { 0 };
                let ready_time = self.tau[stop_idx][k - 1].saturating_add(transfer_time);

                // Can we catch an earlier trip at this stop?
                if current_departure_time.map_or(true, |departure_time| ready_time <= departure_time) {
                    // Compute et(r, p).
                    let num_stops = route.num_stops as usize;
                    let current_trip_idx = boarded_trip.unwrap_or(route.num_trips as usize);

                    // Because the trip index can only ever decrease, we start from the next earliest trip and work our way back.
                    // Thus, all trips are accessed at most once each round.
                    let found_trip_idx = (0..current_trip_idx)
                        .rev()
                        .map(|trip_idx| {
                            let stop_time_idx = trip_idx * num_stops + stop_order;
                            (trip_idx, network.stop_times[route.stop_times_idx + stop_time_idx].departure_time)
                        })
                        .take_while(|&(_, departure_time)| ready_time <= departure_time)
                        .last();

                    if let Some((found_trip_idx, _)) = found_trip_idx {
                        boarded_trip = Some(found_trip_idx);
                    }
                }
            }
        }
    }

    // One footpath hop from every stop improved by the route scan of this round.
    fn relax_footpaths<P: Profiler>(&mut self, profiler: &mut P, k: usize, target: usize) {
        let network = self.network;
        self.footpath_sources.clear();
        self.footpath_sources.extend(
            self.marked_stops.iter().enumerate().filter_map(|(i, &marked)| if marked { Some(i) } else { None }),
        );

        for &stop_idx in self.footpath_sources.iter() {
            let departure_time = self.tau[stop_idx][k];
            for footpath in network.get_footpaths(stop_idx) {
                profiler.count(Metric::FootpathsRelaxed);
                let target_stop = footpath.target as usize;
                let arrival_time = departure_time.saturating_add(footpath.duration);
                if arrival_time < self.tau_star[target_stop].min(self.tau_star[target]) {
                    self.tau[target_stop][k] = arrival_time;
                    self.tau_star[target_stop] = arrival_time;
                    self.marked_stops[target_stop] = true;
                }
            }
        }
    }
}

/// Round-based public transit routing over (arrival time, number of trips).
pub struct Raptor<'a, P: Profiler = AggregateProfiler> {
    search: RaptorSearch<'a>,
    profiler: P,
}

impl<'a> Raptor<'a> {
    pub fn new(network: &'a Network) -> Self {
        Self::with_profiler(network, AggregateProfiler::new())
    }
}

impl<'a, P: Profiler> Raptor<'a, P> {
    pub fn with_profiler(network: &'a Network, profiler: P) -> Self {
        Self { search: RaptorSearch::new(network), profiler }
    }

    /// # Panics
    /// If `source` or `target` is not a stop of the network.
    pub fn run_query(&mut self, source: StopIndex, departure_time: Timestamp, target: StopIndex) {
        self.profiler.start_query();
        self.search.run(&mut self.profiler, source, departure_time, target);
        self.profiler.done_query();
    }

    /// One label per round that improved the arrival at the target, ordered by number of trips.
    pub fn anchor_labels(&self) -> &[ArrivalLabel] {
        self.search.anchor_labels()
    }

    pub fn earliest_arrival(&self) -> Option<Timestamp> {
        self.search.earliest_arrival()
    }
}

impl<P: Profiler> JourneyPlanner for Raptor<'_, P> {
    type Profiler = P;

    fn run(&mut self, query: &Query) {
        self.run_query(query.source, query.departure_time, query.target);
    }

    fn num_journeys(&self) -> usize {
        self.anchor_labels().len()
    }

    fn profiler(&self) -> &P {
        &self.profiler
    }
}
