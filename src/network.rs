use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use chrono::NaiveDate;
use gtfs_structures::Gtfs;
use log::{info, warn};

use crate::utils;

// Timestamp is seconds since midnight.
pub type Timestamp = u32;
pub type StopIndex = u32;
pub type RouteIndex = u32;
pub type TripIndex = u32;
// Walking distance is measured as the time spent walking, in seconds.
pub type WalkingDistance = u32;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Trip on line {0} has fewer than two stops.")]
    TripTooShort(String),
    #[error("Stop index {0} does not exist.")]
    UnknownStop(StopIndex),
    #[error("Trip on line {line} goes back in time at stop order {stop_order}.")]
    NonMonotonicTrip { line: String, stop_order: usize },
    #[error("GTFS stop {0} is referenced by a trip but not defined.")]
    UnknownGtfsStop(String),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    const EARTH_RADIUS: f64 = 6_371_000.0;

    // Great circle distance in metres.
    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        let lat_a = self.latitude.to_radians();
        let lat_b = other.latitude.to_radians();
        let d_lat = lat_b - lat_a;
        let d_lon = (other.longitude - self.longitude).to_radians();
        let h = (d_lat / 2.).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.).sin().powi(2);
        2. * Self::EARTH_RADIUS * h.sqrt().asin()
    }
}

pub struct Route {
    pub line: Rc<str>,
    pub num_stops: StopIndex,
    pub num_trips: TripIndex,
    pub route_stops_idx: usize,
    pub stop_times_idx: usize,
}

impl Route {
    pub fn get_stops<'a>(&self, route_stops: &'a [StopIndex]) -> &'a [StopIndex] {
        &route_stops[self.route_stops_idx..(self.route_stops_idx + self.num_stops as usize)]
    }

    pub fn get_trip<'a>(&self, trip: usize, stop_times: &'a [StopTime]) -> &'a [StopTime] {
        let start = self.stop_times_idx + trip * self.num_stops as usize;
        let end = start + self.num_stops as usize;
        &stop_times[start..end]
    }

    // Binary search for the earliest trip departing `stop_order` no earlier than `ready_time`.
    // Trips within a route are sorted and assumed not to overtake each other.
    pub fn earliest_trip(&self, stop_order: usize, ready_time: Timestamp, stop_times: &[StopTime]) -> Option<TripIndex> {
        let num_stops = self.num_stops as usize;
        let departure = |trip: usize| stop_times[self.stop_times_idx + trip * num_stops + stop_order].departure_time;

        let (mut low, mut high) = (0, self.num_trips as usize);
        while low < high {
            let mid = low + (high - low) / 2;
            if departure(mid) < ready_time {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        (low < self.num_trips as usize).then_some(low as TripIndex)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StopTime {
    pub arrival_time: Timestamp,
    pub departure_time: Timestamp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Footpath {
    pub target: StopIndex,
    pub duration: Timestamp,
}

pub struct Stop {
    pub name: Box<str>,
    pub location: Option<Coordinates>,
    pub routes_idx: usize,
    pub num_routes: usize,
    pub footpaths_idx: usize,
    pub num_footpaths: usize,
}

impl Stop {
    pub fn new(name: &str, location: Option<Coordinates>) -> Self {
        Self {
            name: name.into(),
            location,
            routes_idx: 0,
            num_routes: 0,
            footpaths_idx: 0,
            num_footpaths: 0,
        }
    }

    pub fn get_routes<'a>(&self, stop_routes: &'a [RouteIndex]) -> &'a [RouteIndex] {
        &stop_routes[self.routes_idx..(self.routes_idx + self.num_routes)]
    }

    pub fn get_footpaths<'a>(&self, footpaths: &'a [Footpath]) -> &'a [Footpath] {
        &footpaths[self.footpaths_idx..(self.footpaths_idx + self.num_footpaths)]
    }
}

// One elementary hop of a trip, used by the connection scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Connection {
    pub trip: TripIndex, // Global trip index, unique across routes.
    pub departure_idx: StopIndex,
    pub departure_time: Timestamp,
    pub arrival_idx: StopIndex,
    pub arrival_time: Timestamp,
}

pub struct Network {
    pub routes: Vec<Route>,
    pub stops: Vec<Stop>,
    pub stop_index: HashMap<String, StopIndex>,
    pub stop_times: Vec<StopTime>,
    pub stop_routes: Vec<RouteIndex>,
    pub route_stops: Vec<StopIndex>,
    pub footpaths: Vec<Footpath>,
    pub transfer_times: Vec<Timestamp>,
    pub connections: Vec<Connection>,
    pub num_trips: usize,
}

impl Network {
    /// Timetable of all trips running on `journey_date`, without footpaths.
    pub fn from_gtfs(gtfs: &Gtfs, journey_date: NaiveDate, default_transfer_time: Timestamp) -> Result<Self, NetworkError> {
        let builder = NetworkBuilder::from_gtfs(gtfs, journey_date)?;
        let network = builder.build(default_transfer_time);
        info!(
            "Network built for {journey_date}: {} stops, {} routes, {} trips.",
            network.num_stops(),
            network.num_routes(),
            network.num_trips
        );
        Ok(network)
    }

    pub fn get_stop(&self, stop: usize) -> &Stop { &self.stops[stop] }

    pub fn get_stop_idx(&self, stop_id: &str) -> Option<StopIndex> { self.stop_index.get(stop_id).copied() }

    // Exact name match first, otherwise the first stop whose name starts with `name`.
    pub fn get_stop_idx_from_name(&self, name: &str) -> Option<StopIndex> {
        self.stops
            .iter()
            .position(|stop| &*stop.name == name)
            .or_else(|| self.stops.iter().position(|stop| stop.name.starts_with(name)))
            .map(|idx| idx as StopIndex)
    }

    pub fn num_stops(&self) -> usize { self.stops.len() }

    pub fn num_routes(&self) -> usize { self.routes.len() }

    pub fn num_trips(&self, route_idx: usize) -> usize { self.routes[route_idx].num_trips as usize }

    pub fn get_trip(&self, route_idx: usize, trip_idx: usize) -> &[StopTime] {
        let route = &self.routes[route_idx];
        route.get_trip(trip_idx, &self.stop_times)
    }

    pub fn get_footpaths(&self, stop: usize) -> &[Footpath] {
        self.stops[stop].get_footpaths(&self.footpaths)
    }

    pub fn print_stats(&self) {
        let num_lines = self.routes.iter().map(|route| &route.line).collect::<HashSet<_>>().len();
        println!("Network with {} stops, {} routes on {} lines, {} trips, {} footpaths and {} connections.",
                 self.num_stops(),
                 self.num_routes(),
                 num_lines,
                 self.num_trips,
                 self.footpaths.len(),
                 self.connections.len(),
        );
    }

    fn build_connections(&mut self) {
        let mut connections = Vec::with_capacity(self.stop_times.len());
        let mut global_trip = 0;
        for route in self.routes.iter() {
            let stops = route.get_stops(&self.route_stops);
            for trip_idx in 0..route.num_trips as usize {
                let trip = route.get_trip(trip_idx, &self.stop_times);
                for (i, pair) in trip.windows(2).enumerate() {
                    connections.push(Connection {
                        trip: global_trip,
                        departure_idx: stops[i],
                        departure_time: pair[0].departure_time,
                        arrival_idx: stops[i + 1],
                        arrival_time: pair[1].arrival_time,
                    });
                }
                global_trip += 1;
            }
        }
        // Stable, so consecutive connections of a trip keep their order when departing at the same time.
        connections.sort_by_key(|connection| connection.departure_time);
        self.connections = connections;
        self.num_trips = global_trip as usize;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TripStop {
    pub stop: StopIndex,
    pub arrival_time: Timestamp,
    pub departure_time: Timestamp,
}

struct PendingRoute {
    line: Rc<str>,
    stops: Vec<StopIndex>,
    trips: Vec<Vec<StopTime>>,
}

// Collects stops, trips and footpaths, and lays them out into a `Network`.
#[derive(Default)]
pub struct NetworkBuilder {
    stops: Vec<Stop>,
    stop_index: HashMap<String, StopIndex>,
    routes: Vec<PendingRoute>,
    route_lookup: HashMap<Vec<StopIndex>, usize>,
    footpaths: Vec<(StopIndex, Footpath)>,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops and the trips running on `journey_date`, ready for footpaths to be added.
    ///
    /// Stops are indexed in GTFS id order. Trips with unusable stop times are skipped with a warning.
    pub fn from_gtfs(gtfs: &Gtfs, journey_date: NaiveDate) -> Result<Self, NetworkError> {
        let mut builder = NetworkBuilder::new();

        // Sort by id so that stop indices are stable between runs.
        let mut stop_ids: Vec<&String> = gtfs.stops.keys().collect();
        stop_ids.sort_unstable();
        for id in stop_ids {
            let stop = &gtfs.stops[id];
            let location = match (stop.latitude, stop.longitude) {
                (Some(latitude), Some(longitude)) => Some(Coordinates { latitude, longitude }),
                _ => None,
            };
            builder.add_stop(id, stop.name.as_deref().unwrap_or(id), location);
        }

        let mut trip_ids: Vec<&String> = gtfs.trips.keys().collect();
        trip_ids.sort_unstable();
        let mut num_skipped = 0;
        'trips: for trip_id in trip_ids {
            let trip = &gtfs.trips[trip_id];
            // Only consider trips that run on the given date.
            if !utils::does_trip_run(gtfs, trip, journey_date) {
                continue;
            }

            let line = gtfs.routes
                .get(trip.route_id.as_str())
                .and_then(|route| route.short_name.as_deref())
                .unwrap_or(trip.route_id.as_str());

            let mut trip_stops = Vec::with_capacity(trip.stop_times.len());
            for stop_time in trip.stop_times.iter() {
                let stop = builder
                    .get_stop_idx(stop_time.stop.id.as_str())
                    .ok_or_else(|| NetworkError::UnknownGtfsStop(stop_time.stop.id.clone()))?;
                let (arrival_time, departure_time) = match (stop_time.arrival_time, stop_time.departure_time) {
                    (Some(arrival), Some(departure)) => (arrival, departure),
                    (Some(time), None) | (None, Some(time)) => (time, time),
                    (None, None) => {
                        warn!("Skipping trip {trip_id}: stop {} has no times.", stop_time.stop.id);
                        num_skipped += 1;
                        continue 'trips;
                    }
                };
                trip_stops.push(TripStop { stop, arrival_time, departure_time });
            }

            if let Err(e) = builder.add_trip(line, &trip_stops) {
                warn!("Skipping trip {trip_id}: {e}");
                num_skipped += 1;
            }
        }
        if num_skipped > 0 {
            warn!("Skipped {num_skipped} trips with unusable stop times.");
        }

        Ok(builder)
    }

    pub fn add_stop(&mut self, id: &str, name: &str, location: Option<Coordinates>) -> StopIndex {
        if let Some(&idx) = self.stop_index.get(id) {
            return idx;
        }
        let idx = self.stops.len() as StopIndex;
        self.stops.push(Stop::new(name, location));
        self.stop_index.insert(id.to_owned(), idx);
        idx
    }

    pub fn get_stop_idx(&self, id: &str) -> Option<StopIndex> {
        self.stop_index.get(id).copied()
    }

    pub fn num_stops(&self) -> usize {
        self.stops.len()
    }

    fn check_stop(&self, stop: StopIndex) -> Result<(), NetworkError> {
        if (stop as usize) < self.stops.len() {
            Ok(())
        } else {
            Err(NetworkError::UnknownStop(stop))
        }
    }

    // Trips visiting the exact same sequence of stops are grouped into one route.
    pub fn add_trip(&mut self, line: &str, trip_stops: &[TripStop]) -> Result<(), NetworkError> {
        if trip_stops.len() < 2 {
            return Err(NetworkError::TripTooShort(line.to_owned()));
        }
        let mut previous_departure = 0;
        for (stop_order, trip_stop) in trip_stops.iter().enumerate() {
            self.check_stop(trip_stop.stop)?;
            if trip_stop.arrival_time < previous_departure || trip_stop.departure_time < trip_stop.arrival_time {
                return Err(NetworkError::NonMonotonicTrip { line: line.to_owned(), stop_order });
            }
            previous_departure = trip_stop.departure_time;
        }

        let stops: Vec<StopIndex> = trip_stops.iter().map(|trip_stop| trip_stop.stop).collect();
        let stop_times = trip_stops
            .iter()
            .map(|trip_stop| StopTime { arrival_time: trip_stop.arrival_time, departure_time: trip_stop.departure_time })
            .collect();

        let route_idx = match self.route_lookup.get(&stops) {
            Some(&idx) => idx,
            None => {
                let idx = self.routes.len();
                self.route_lookup.insert(stops.clone(), idx);
                self.routes.push(PendingRoute { line: Rc::from(line), stops, trips: Vec::new() });
                idx
            }
        };
        self.routes[route_idx].trips.push(stop_times);
        Ok(())
    }

    pub fn add_footpath(&mut self, from: StopIndex, to: StopIndex, duration: Timestamp) -> Result<(), NetworkError> {
        self.check_stop(from)?;
        self.check_stop(to)?;
        if from != to {
            self.footpaths.push((from, Footpath { target: to, duration }));
        }
        Ok(())
    }

    // Connects every pair of located stops that can be walked between within `max_walking_time`.
    // Returns the number of footpaths added.
    pub fn generate_footpaths(&mut self, max_walking_time: Timestamp, walking_speed: f64) -> usize {
        let located: Vec<(StopIndex, Coordinates)> = self.stops
            .iter()
            .enumerate()
            .filter_map(|(idx, stop)| stop.location.map(|location| (idx as StopIndex, location)))
            .collect();

        let num_footpaths = self.footpaths.len();
        for (i, &(from, from_location)) in located.iter().enumerate() {
            for &(to, to_location) in &located[i + 1..] {
                let duration = (from_location.distance_to(&to_location) / walking_speed).ceil();
                if duration <= max_walking_time as f64 {
                    let duration = duration as Timestamp;
                    self.footpaths.push((from, Footpath { target: to, duration }));
                    self.footpaths.push((to, Footpath { target: from, duration }));
                }
            }
        }
        self.footpaths.len() - num_footpaths
    }

    pub fn build(self, default_transfer_time: Timestamp) -> Network {
        let NetworkBuilder { mut stops, stop_index, routes: pending_routes, mut footpaths, .. } = self;

        // Construct routes, which point to a series of stops and stop times.
        let mut routes = Vec::with_capacity(pending_routes.len());
        let mut route_stops = Vec::new();
        let mut stop_times = Vec::new();
        let mut routes_for_stop = vec![Vec::new(); stops.len()];
        for pending in pending_routes {
            // Trips that overtake each other end up on separate routes with the same stops.
            for trips in split_overtaking_trips(pending.trips) {
                let route_idx = routes.len() as RouteIndex;
                routes.push(Route {
                    line: Rc::clone(&pending.line),
                    num_stops: pending.stops.len() as StopIndex,
                    num_trips: trips.len() as TripIndex,
                    route_stops_idx: route_stops.len(),
                    stop_times_idx: stop_times.len(),
                });
                for &stop in pending.stops.iter() {
                    let stop_routes: &mut Vec<RouteIndex> = &mut routes_for_stop[stop as usize];
                    // A route visiting a stop twice is only listed once.
                    if !stop_routes.contains(&route_idx) {
                        stop_routes.push(route_idx);
                    }
                }
                route_stops.extend_from_slice(&pending.stops);
                for trip in trips {
                    stop_times.extend(trip);
                }
            }
        }

        // Index the routes for a given stop.
        let mut stop_routes = Vec::new();
        for (stop, routes) in stops.iter_mut().zip(routes_for_stop) {
            stop.routes_idx = stop_routes.len();
            stop.num_routes = routes.len();
            stop_routes.extend(routes);
        }

        // Keep only the fastest footpath between each pair of stops.
        footpaths.sort_unstable_by_key(|(from, footpath)| (*from, footpath.target, footpath.duration));
        footpaths.dedup_by_key(|(from, footpath)| (*from, footpath.target));
        let mut flat_footpaths = Vec::with_capacity(footpaths.len());
        let mut next = 0;
        for (stop_idx, stop) in stops.iter_mut().enumerate() {
            stop.footpaths_idx = flat_footpaths.len();
            while next < footpaths.len() && footpaths[next].0 as usize == stop_idx {
                flat_footpaths.push(footpaths[next].1);
                next += 1;
            }
            stop.num_footpaths = flat_footpaths.len() - stop.footpaths_idx;
        }

        let transfer_times = vec![default_transfer_time; stops.len()];

        let mut network = Network {
            routes,
            stops,
            stop_index,
            stop_times,
            stop_routes,
            route_stops,
            footpaths: flat_footpaths,
            transfer_times,
            connections: Vec::new(),
            num_trips: 0,
        };
        network.build_connections();
        network
    }
}

// Sorts trips by first departure and groups them so that within a group no trip arrives or departs
// anywhere before the trip ahead of it. Each trip joins the first group it can follow.
fn split_overtaking_trips(mut trips: Vec<Vec<StopTime>>) -> Vec<Vec<Vec<StopTime>>> {
    trips.sort_by_key(|trip| trip[0].departure_time);
    let mut groups: Vec<Vec<Vec<StopTime>>> = Vec::new();
    for trip in trips {
        match groups.iter_mut().find(|group| group.last().is_some_and(|ahead| follows(ahead, &trip))) {
            Some(group) => group.push(trip),
            None => groups.push(vec![trip]),
        }
    }
    groups
}

fn follows(ahead: &[StopTime], trip: &[StopTime]) -> bool {
    ahead
        .iter()
        .zip(trip)
        .all(|(a, b)| a.arrival_time <= b.arrival_time && a.departure_time <= b.departure_time)
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::test_network::*;

    fn trip_stop(stop: StopIndex, time: Timestamp) -> TripStop {
        TripStop { stop, arrival_time: time, departure_time: time }
    }

    #[test]
    fn trips_with_the_same_stops_share_a_route() {
        let mut builder = NetworkBuilder::new();
        let a = builder.add_stop("a", "Alpha", None);
        let b = builder.add_stop("b", "Beta", None);
        assert_eq!(builder.add_stop("a", "Alpha again", None), a);

        builder.add_trip("1", &[trip_stop(a, 200), trip_stop(b, 300)]).unwrap();
        builder.add_trip("1", &[trip_stop(a, 100), trip_stop(b, 150)]).unwrap();
        builder.add_trip("1", &[trip_stop(b, 100), trip_stop(a, 150)]).unwrap();
        let network = builder.build(0);

        assert_eq!(network.num_routes(), 2);
        assert_eq!(network.num_trips(0), 2);
        // Sorted by departure.
        assert_eq!(network.get_trip(0, 0)[0].departure_time, 100);
        assert_eq!(network.get_stop(a as usize).get_routes(&network.stop_routes), &[0, 1]);
        assert_eq!(network.connections.len(), 3);
        assert_eq!(network.num_trips, 3);
        assert!(network.connections.windows(2).all(|pair| pair[0].departure_time <= pair[1].departure_time));
    }

    #[test]
    fn overtaking_trips_are_split_into_separate_routes() {
        let network = local_and_express();
        assert_eq!(network.num_routes(), 2);
        assert_eq!(network.num_trips, 2);
        for route in &network.routes {
            assert_eq!(route.get_stops(&network.route_stops), &[A, B, C]);
            assert_eq!(route.num_trips, 1);
        }
        // The local leaves first and keeps the first route.
        assert_eq!(network.get_trip(0, 0)[2].arrival_time, EIGHT_AM + 30 * 60);
        assert_eq!(network.get_trip(1, 0)[2].arrival_time, EIGHT_AM + 12 * 60);
        assert_eq!(network.get_stop(B as usize).get_routes(&network.stop_routes), &[0, 1]);
    }

    #[test]
    fn trips_that_keep_their_order_stay_on_one_route() {
        let trip = |departure: Timestamp, arrival: Timestamp| {
            vec![
                StopTime { arrival_time: departure, departure_time: departure },
                StopTime { arrival_time: arrival, departure_time: arrival },
            ]
        };
        // The trip leaving at 200 overtakes the one leaving at 100, and the trip leaving at 300 follows it.
        let groups = split_overtaking_trips(vec![trip(300, 350), trip(100, 500), trip(200, 250)]);
        assert_eq!(groups, vec![vec![trip(100, 500)], vec![trip(200, 250), trip(300, 350)]]);

        let groups = split_overtaking_trips(vec![trip(200, 600), trip(100, 500), trip(150, 400)]);
        assert_eq!(groups, vec![vec![trip(100, 500), trip(200, 600)], vec![trip(150, 400)]]);
    }

    #[test]
    fn invalid_trips_are_rejected() {
        let mut builder = NetworkBuilder::new();
        let a = builder.add_stop("a", "Alpha", None);
        let b = builder.add_stop("b", "Beta", None);
        assert_eq!(builder.add_trip("1", &[trip_stop(a, 100)]), Err(NetworkError::TripTooShort("1".into())));
        assert_eq!(builder.add_trip("1", &[trip_stop(a, 100), trip_stop(7, 200)]), Err(NetworkError::UnknownStop(7)));
        assert_eq!(
            builder.add_trip("1", &[trip_stop(a, 100), trip_stop(b, 50)]),
            Err(NetworkError::NonMonotonicTrip { line: "1".into(), stop_order: 1 })
        );
    }

    #[test]
    fn earliest_trip_is_found_by_departure() {
        let mut builder = NetworkBuilder::new();
        let a = builder.add_stop("a", "Alpha", None);
        let b = builder.add_stop("b", "Beta", None);
        for departure in [100, 200, 300] {
            builder.add_trip("1", &[trip_stop(a, departure), trip_stop(b, departure + 50)]).unwrap();
        }
        let network = builder.build(0);
        let route = &network.routes[0];

        assert_eq!(route.earliest_trip(0, 0, &network.stop_times), Some(0));
        assert_eq!(route.earliest_trip(0, 200, &network.stop_times), Some(1));
        assert_eq!(route.earliest_trip(0, 201, &network.stop_times), Some(2));
        assert_eq!(route.earliest_trip(0, 301, &network.stop_times), None);
    }

    #[test]
    fn footpaths_are_generated_from_coordinates() {
        let mut builder = NetworkBuilder::new();
        // Roughly 111 metres apart.
        let a = builder.add_stop("a", "Alpha", Some(Coordinates { latitude: 0.0, longitude: 0.0 }));
        let b = builder.add_stop("b", "Beta", Some(Coordinates { latitude: 0.001, longitude: 0.0 }));
        builder.add_stop("c", "Gamma", Some(Coordinates { latitude: 1.0, longitude: 0.0 }));
        builder.add_stop("d", "Delta", None);

        assert_eq!(builder.generate_footpaths(120, 1.0), 2);
        // A slower duplicate is dropped when building.
        builder.add_footpath(a, b, 500).unwrap();
        let network = builder.build(0);

        let footpaths = network.get_footpaths(a as usize);
        assert_eq!(footpaths.len(), 1);
        assert_eq!(footpaths[0].target, b);
        assert_eq!(footpaths[0].duration, 112);
        assert_eq!(network.get_footpaths(b as usize)[0].target, a);
        assert!(network.get_footpaths(2).is_empty());
    }

    #[test]
    fn stops_are_found_by_name() {
        let network = walk_or_ride();
        assert_eq!(network.get_stop_idx_from_name("Stop C"), Some(C));
        assert_eq!(network.get_stop_idx_from_name("Stop"), Some(A));
        assert_eq!(network.get_stop_idx_from_name("Nowhere"), None);
        assert_eq!(network.get_stop_idx("D"), Some(D));
    }
}
