use arrayvec::ArrayVec;

use crate::journey::{ArrivalLabel, WalkingParetoLabel};
use crate::network::{Network, StopIndex, Timestamp, TripIndex, WalkingDistance};
use crate::planner::{BoundedParetoPlanner, JourneyPlanner};
use crate::profiler::{AggregateProfiler, Metric, NoProfiler, Phase, Profiler};
use crate::query::Query;
use crate::raptor::{RaptorSearch, MAX_ROUNDS};

pub(crate) trait Dominance {
    fn dominates(&self, other: &Self) -> bool;
}

// Label at a stop. The number of trips is implied by the round of the bag holding it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Label {
    pub(crate) arrival_time: Timestamp,
    pub(crate) walking_distance: WalkingDistance,
}

impl Dominance for Label {
    fn dominates(&self, other: &Label) -> bool {
        self.arrival_time <= other.arrival_time && self.walking_distance <= other.walking_distance
    }
}

// Label while riding a route. An earlier trip arrives earlier at every later stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RouteLabel {
    pub(crate) trip_idx: TripIndex,
    pub(crate) walking_distance: WalkingDistance,
}

impl Dominance for RouteLabel {
    fn dominates(&self, other: &RouteLabel) -> bool {
        self.trip_idx <= other.trip_idx && self.walking_distance <= other.walking_distance
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Bag<L> {
    pub(crate) labels: Vec<L>,
}

impl<L> Default for Bag<L> {
    fn default() -> Self {
        Bag { labels: Vec::new() }
    }
}

impl<L: Dominance + Copy> Bag<L> {
    pub(crate) const fn new() -> Self {
        Bag { labels: Vec::new() }
    }

    pub(crate) fn clear(&mut self) {
        self.labels.clear();
    }

    pub(crate) fn is_dominated(&self, label: &L) -> bool {
        self.labels.iter().any(|existing| existing.dominates(label))
    }

    // Adds a label to the bag, discarding labels it dominates.
    // Returns true if the label was added <=> the bag was modified.
    pub(crate) fn add(&mut self, new_label: L) -> bool {
        // Equal labels count as dominated, so the first one seen is kept.
        if self.is_dominated(&new_label) {
            return false;
        }
        self.labels.retain(|label| !new_label.dominates(label));
        self.labels.push(new_label);
        true
    }
}

/// Slack box around one anchor label. Labels outside every box are pruned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ArrivalBound {
    pub(crate) latest_arrival: Timestamp,
    pub(crate) max_trips: u8,
}

impl ArrivalBound {
    pub(crate) fn relax(anchor: &ArrivalLabel, departure_time: Timestamp, arrival_slack: f64, trip_slack: f64) -> Self {
        let travel_time = anchor.arrival_time.saturating_sub(departure_time) as f64;
        let latest_arrival = departure_time.saturating_add((travel_time * arrival_slack).floor() as Timestamp);
        let max_trips = (anchor.number_of_trips as f64 * trip_slack).floor().min(u8::MAX as f64) as u8;
        ArrivalBound { latest_arrival, max_trips }
    }

    fn admits(&self, arrival_time: Timestamp, number_of_trips: usize) -> bool {
        arrival_time <= self.latest_arrival && number_of_trips <= self.max_trips as usize
    }
}

pub(crate) type Bounds = ArrayVec<ArrivalBound, MAX_ROUNDS>;

// McRAPTOR over (arrival time, trips, walking distance). Buffers are reused across queries.
pub(crate) struct McRaptorSearch<'a> {
    network: &'a Network,
    // bags[k * num_stops + p] = labels created at stop p in round k.
    bags: Vec<Bag<Label>>,
    // Non-dominated labels at each stop over all rounds so far.
    best_bags: Vec<Bag<Label>>,
    marked_stops: Vec<bool>,
    earliest_stop_for_route: Vec<Option<usize>>,
    route_bag: Bag<RouteLabel>,
    pending_labels: Vec<(usize, Label)>,
    bounds: Option<Bounds>,
    results: Vec<WalkingParetoLabel>,
}

impl<'a> McRaptorSearch<'a> {
    pub(crate) fn new(network: &'a Network) -> Self {
        let num_stops = network.num_stops();
        Self {
            network,
            bags: vec![Bag::new(); MAX_ROUNDS * num_stops],
            best_bags: vec![Bag::new(); num_stops],
            marked_stops: vec![false; num_stops],
            earliest_stop_for_route: vec![None; network.num_routes()],
            route_bag: Bag::new(),
            pending_labels: Vec::new(),
            bounds: None,
            results: Vec::new(),
        }
    }

    pub(crate) fn results(&self) -> &[WalkingParetoLabel] {
        &self.results
    }

    fn bag_idx(&self, k: usize, stop: usize) -> usize {
        k * self.network.num_stops() + stop
    }

    fn clear(&mut self) {
        self.bags.iter_mut().for_each(Bag::clear);
        self.best_bags.iter_mut().for_each(Bag::clear);
        self.marked_stops.fill(false);
        self.results.clear();
    }

    pub(crate) fn run<P: Profiler>(
        &mut self,
        profiler: &mut P,
        source: StopIndex,
        departure_time: Timestamp,
        target: StopIndex,
        bounds: Option<Bounds>,
    ) {
        self.clear();
        self.bounds = bounds;
        let source = source as usize;
        let target = target as usize;

        let initial_label = Label { arrival_time: departure_time, walking_distance: 0 };
        if self.add_label(profiler, 0, source, target, initial_label) {
            profiler.start_phase();
            self.relax_footpaths(profiler, 0, target);
            profiler.done_phase(Phase::InitialTransfers);
        }

        let mut last_round = 0;
        for k in 1..MAX_ROUNDS {
            if !self.marked_stops.contains(&true) {
                break;
            }
            profiler.count(Metric::Rounds);
            last_round = k;

            profiler.start_phase();
            self.collect_routes();
            profiler.done_phase(Phase::CollectRoutes);
            profiler.start_phase();
            self.scan_routes(profiler, k, target);
            profiler.done_phase(Phase::ScanRoutes);
            profiler.start_phase();
            self.relax_footpaths(profiler, k, target);
            profiler.done_phase(Phase::IntermediateTransfers);
        }

        for k in 0..=last_round {
            let bag = &self.bags[self.bag_idx(k, target)];
            self.results.extend(bag.labels.iter().map(|label| WalkingParetoLabel {
                arrival_time: label.arrival_time,
                number_of_trips: k as u8,
                walking_distance: label.walking_distance,
            }));
        }
    }

    fn within_bounds(&self, arrival_time: Timestamp, k: usize) -> bool {
        match &self.bounds {
            Some(bounds) => bounds.iter().any(|bound| bound.admits(arrival_time, k)),
            None => true,
        }
    }

    // Target pruning, local pruning, then insertion into the bag of round k.
    fn add_label<P: Profiler>(&mut self, profiler: &mut P, k: usize, stop: usize, target: usize, label: Label) -> bool {
        if !self.within_bounds(label.arrival_time, k)
            || self.best_bags[target].is_dominated(&label)
            || self.best_bags[stop].is_dominated(&label)
        {
            return false;
        }
        profiler.count(Metric::LabelsCreated);
        self.best_bags[stop].add(label);
        let idx = self.bag_idx(k, stop);
        self.bags[idx].add(label);
        self.marked_stops[stop] = true;
        true
    }

    fn collect_routes(&mut self) {
        let network = self.network;
        self.earliest_stop_for_route.fill(None);
        for (marked_stop, _) in self.marked_stops.iter().enumerate().filter(|&(_, &marked)| marked) {
            for &route_idx in network.stops[marked_stop].get_routes(&network.stop_routes) {
                let route_idx = route_idx as usize;
                let route = &network.routes[route_idx];
                let earliest = self.earliest_stop_for_route[route_idx].unwrap_or(route.num_stops as usize);
                if let Some(stop_order) = route
                    .get_stops(&network.route_stops)[..earliest]
                    .iter()
                    .position(|&stop| stop as usize == marked_stop)
                {
                    self.earliest_stop_for_route[route_idx] = Some(stop_order);
                }
            }
        }
        self.marked_stops.fill(false);
    }

    fn scan_routes<P: Profiler>(&mut self, profiler: &mut P, k: usize, target: usize) {
        let network = self.network;
        let mut route_bag = std::mem::take(&mut self.route_bag);
        let mut pending_labels = std::mem::take(&mut self.pending_labels);

        for route_idx in 0..self.earliest_stop_for_route.len() {
            let Some(earliest_stop_order) = self.earliest_stop_for_route[route_idx] else {
                continue;
            };
            profiler.count(Metric::RoutesScanned);
            let route = &network.routes[route_idx];
            route_bag.clear();

            for (stop_order, &stop_idx) in route
                .get_stops(&network.route_stops)
                .iter()
                .enumerate()
                .skip(earliest_stop_order)
            {
                let stop_idx = stop_idx as usize;

                // Alight: every label riding the route arrives here.
                pending_labels.extend(route_bag.labels.iter().map(|route_label| {
                    let trip = route.get_trip(route_label.trip_idx as usize, &network.stop_times);
                    (stop_idx, Label { arrival_time: trip[stop_order].arrival_time, walking_distance: route_label.walking_distance })
                }));
                for (stop, label) in pending_labels.drain(..) {
                    self.add_label(profiler, k, stop, target, label);
                }

                // Board: labels from the previous round catch the earliest trip they can.
                if stop_order + 1 == route.num_stops as usize {
                    break;
                }
                let transfer_time = if k > 1 { network.transfer_times[stop_idx] } else { 0 };
                let previous_bag = &self.bags[self.bag_idx(k - 1, stop_idx)];
                for label in previous_bag.labels.iter() {
                    let ready_time = label.arrival_time.saturating_add(transfer_time);
                    if let Some(trip_idx) = route.earliest_trip(stop_order, ready_time, &network.stop_times) {
                        route_bag.add(RouteLabel { trip_idx, walking_distance: label.walking_distance });
                    }
                }
            }
        }

        self.route_bag = route_bag;
        self.pending_labels = pending_labels;
    }

    // One footpath hop from every label created by the route scan of this round.
    fn relax_footpaths<P: Profiler>(&mut self, profiler: &mut P, k: usize, target: usize) {
        let network = self.network;
        let mut pending_labels = std::mem::take(&mut self.pending_labels);

        for (stop_idx, _) in self.marked_stops.iter().enumerate().filter(|&(_, &marked)| marked) {
            let bag = &self.bags[self.bag_idx(k, stop_idx)];
            for footpath in network.get_footpaths(stop_idx) {
                profiler.count(Metric::FootpathsRelaxed);
                pending_labels.extend(bag.labels.iter().map(|label| {
                    (footpath.target as usize, Label {
                        arrival_time: label.arrival_time.saturating_add(footpath.duration),
                        walking_distance: label.walking_distance.saturating_add(footpath.duration),
                    })
                }));
            }
        }
        for (stop, label) in pending_labels.drain(..) {
            self.add_label(profiler, k, stop, target, label);
        }

        self.pending_labels = pending_labels;
    }
}

/// Multi-criteria RAPTOR optimising arrival time, number of trips and walking distance.
pub struct McRaptor<'a, P: Profiler = AggregateProfiler> {
    search: McRaptorSearch<'a>,
    profiler: P,
}

impl<'a> McRaptor<'a> {
    pub fn new(network: &'a Network) -> Self {
        Self::with_profiler(network, AggregateProfiler::new())
    }
}

impl<'a, P: Profiler> McRaptor<'a, P> {
    pub fn with_profiler(network: &'a Network, profiler: P) -> Self {
        Self { search: McRaptorSearch::new(network), profiler }
    }

    /// # Panics
    /// If `source` or `target` is not a stop of the network.
    pub fn run_query(&mut self, source: StopIndex, departure_time: Timestamp, target: StopIndex) {
        self.profiler.start_query();
        self.search.run(&mut self.profiler, source, departure_time, target, None);
        self.profiler.done_query();
    }

    pub fn results(&self) -> &[WalkingParetoLabel] {
        self.search.results()
    }
}

impl<P: Profiler> JourneyPlanner for McRaptor<'_, P> {
    type Profiler = P;

    fn run(&mut self, query: &Query) {
        self.run_query(query.source, query.departure_time, query.target);
    }

    fn num_journeys(&self) -> usize {
        self.results().len()
    }

    fn profiler(&self) -> &P {
        &self.profiler
    }
}

/// McRAPTOR restricted to journeys within the slack of a RAPTOR anchor journey.
///
/// Each query first runs RAPTOR to get the anchor labels, then McRAPTOR pruned by the
/// relaxed anchors. A label `(t, k)` survives if some anchor `(ta, ka)` has
/// `t - dep <= arrival_slack * (ta - dep)` and `k <= trip_slack * ka`.
pub struct BoundedMcRaptor<'a, P: Profiler = AggregateProfiler> {
    anchor_search: RaptorSearch<'a>,
    search: McRaptorSearch<'a>,
    profiler: P,
    arrival_slack: f64,
    trip_slack: f64,
}

impl<'a> BoundedMcRaptor<'a> {
    pub fn new(network: &'a Network) -> Self {
        Self::with_profiler(network, AggregateProfiler::new())
    }
}

impl<'a, P: Profiler> BoundedMcRaptor<'a, P> {
    pub fn with_profiler(network: &'a Network, profiler: P) -> Self {
        Self {
            anchor_search: RaptorSearch::new(network),
            search: McRaptorSearch::new(network),
            profiler,
            arrival_slack: 1.,
            trip_slack: 1.,
        }
    }

    /// Slacks used by `JourneyPlanner::run`.
    pub fn set_slacks(&mut self, arrival_slack: f64, trip_slack: f64) {
        self.arrival_slack = arrival_slack;
        self.trip_slack = trip_slack;
    }

    /// # Panics
    /// If `source` or `target` is not a stop of the network.
    pub fn run_query(&mut self, source: StopIndex, departure_time: Timestamp, target: StopIndex, arrival_slack: f64, trip_slack: f64) {
        self.profiler.start_query();
        self.anchor_search.run(&mut NoProfiler, source, departure_time, target);
        let bounds: Bounds = self.anchor_search
            .anchor_labels()
            .iter()
            .map(|anchor| ArrivalBound::relax(anchor, departure_time, arrival_slack, trip_slack))
            .collect();
        self.search.run(&mut self.profiler, source, departure_time, target, Some(bounds));
        self.profiler.done_query();
    }

    pub fn results(&self) -> &[WalkingParetoLabel] {
        self.search.results()
    }

    pub fn anchor_labels(&self) -> &[ArrivalLabel] {
        self.anchor_search.anchor_labels()
    }
}

impl<P: Profiler> JourneyPlanner for BoundedMcRaptor<'_, P> {
    type Profiler = P;

    fn run(&mut self, query: &Query) {
        self.run_query(query.source, query.departure_time, query.target, self.arrival_slack, self.trip_slack);
    }

    fn num_journeys(&self) -> usize {
        self.results().len()
    }

    fn profiler(&self) -> &P {
        &self.profiler
    }
}

impl<P: Profiler> BoundedParetoPlanner for BoundedMcRaptor<'_, P> {
    fn run_bounded(&mut self, query: &Query, arrival_slack: f64, trip_slack: f64) {
        self.run_query(query.source, query.departure_time, query.target, arrival_slack, trip_slack);
    }

    fn results(&self) -> &[WalkingParetoLabel] {
        self.search.results()
    }

    fn anchor_labels(&self) -> &[ArrivalLabel] {
        self.anchor_search.anchor_labels()
    }
}
